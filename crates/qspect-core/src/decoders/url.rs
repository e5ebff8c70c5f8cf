//! # Offset-Walking URL Decoder
//!
//! `QUrl`: a private block of flat fields read at strictly increasing byte
//! offsets, reassembled into the URL text.
//!
//! ## Layout
//!
//! ```text
//! QUrlPrivate: +0   ref count (4)
//!              +4   port (4), -1 when absent
//!              +8   scheme    (QString, 24)
//!              +32  userName  (QString, 24)
//!              +56  password  (QString, 24) — skipped, never decoded
//!              +80  host      (QString, 24)
//!              +104 path      (QString, 24)
//!              +128 query     (QString, 24)
//!              +152 fragment  (QString, 24)
//! ```
//!
//! The password member is version-gated in the composition; the cursor
//! advances over it by size without reading. Any failure while walking
//! degrades to the facade's own formatter and, failing that, to the fixed
//! `<uninitialized>` token — this decoder never propagates a hard failure.

use tracing::debug;

use crate::decoders::text::{read_qstring, ARRAY_DATA_BYTES};
use crate::decoders::{DecodeContext, Decoder};
use crate::error::DecodeResult;
use crate::memory::TypedRef;
use crate::render::Rendered;

/// Fallback token when neither the walk nor the facade can render the URL.
pub(crate) const UNINITIALIZED: &str = "<uninitialized>";

const URL_PORT: u64 = 4;
const URL_SCHEME: u64 = 8;

/// `QUrl` decoder.
pub struct QUrlDecoder;

impl QUrlDecoder
{
    fn compose(ctx: DecodeContext<'_>, addr: u64) -> DecodeResult<Option<String>>
    {
        let d = ctx.mem.read_ptr(addr)?;
        if d == 0 {
            return Ok(None);
        }

        let port = ctx.mem.read_i32(d + URL_PORT)?;

        let mut cursor = d + URL_SCHEME;
        let mut next_string = |skip: bool| -> DecodeResult<String> {
            let field = cursor;
            cursor += ARRAY_DATA_BYTES;
            if skip {
                return Ok(String::new());
            }
            read_qstring(ctx.mem, field)
        };

        let scheme = next_string(false)?;
        let user_name = next_string(false)?;
        let _password = next_string(true)?;
        let host = next_string(false)?;
        let path = next_string(false)?;
        let query = next_string(false)?;
        let fragment = next_string(false)?;

        let mut url = String::new();
        if !scheme.is_empty() {
            url.push_str(&scheme);
            url.push_str("://");
        }
        if !user_name.is_empty() {
            url.push_str(&user_name);
            url.push('@');
        }
        url.push_str(&host);
        if port >= 0 {
            url.push_str(&format!(":{port}"));
        }
        url.push_str(&path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        if !fragment.is_empty() {
            url.push('#');
            url.push_str(&fragment);
        }
        Ok(Some(url))
    }
}

impl Decoder for QUrlDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        match Self::compose(ctx, value.addr) {
            Ok(Some(url)) => Rendered::text(url),
            Ok(None) => {
                // Default-constructed QUrl: nothing to walk. The facade may
                // still know better.
                match ctx.mem.format_value(value) {
                    Some(native) => Rendered::text(native),
                    None => Rendered::display(UNINITIALIZED),
                }
            }
            Err(err) => {
                debug!(addr = format_args!("{:#x}", value.addr), %err, "QUrl walk failed");
                match ctx.mem.format_value(value) {
                    Some(native) => Rendered::text(native),
                    None => Rendered::display(UNINITIALIZED),
                }
            }
        }
    }
}
