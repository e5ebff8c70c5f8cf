//! # Delegated Map Decoder
//!
//! `QMap`: the backing balanced tree lives behind a pimpl this catalogue
//! does not re-interpret. The facade's own formatter knows the standard
//! tree layout; delegate to it, with the fixed token as the last resort.

use crate::decoders::url::UNINITIALIZED;
use crate::decoders::{DecodeContext, Decoder};
use crate::memory::TypedRef;
use crate::render::Rendered;

/// `QMap<K, V>` decoder.
pub struct QMapDecoder;

impl Decoder for QMapDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        match ctx.mem.format_value(value) {
            Some(native) => Rendered::display(native),
            None => Rendered::display(UNINITIALIZED),
        }
    }
}
