//! # Persistent Model Index Decoder
//!
//! `QPersistentModelIndex`: a pointer to a shared block whose head embeds
//! the plain index fields, read as a flat offset walk:
//! row (4), column (4), internal id (8), model pointer (8).

use tracing::debug;

use crate::decoders::{DecodeContext, Decoder};
use crate::error::DecodeResult;
use crate::memory::TypedRef;
use crate::render::Rendered;

const IDX_COLUMN: u64 = 4;
const IDX_INTERNAL: u64 = 8;
const IDX_MODEL: u64 = 16;

/// `QPersistentModelIndex` decoder.
pub struct QPersistentModelIndexDecoder;

impl QPersistentModelIndexDecoder
{
    fn render(ctx: DecodeContext<'_>, addr: u64) -> DecodeResult<Option<String>>
    {
        let d = ctx.mem.read_ptr(addr)?;
        if d == 0 {
            return Ok(None);
        }
        let row = ctx.mem.read_i32(d)?;
        let column = ctx.mem.read_i32(d + IDX_COLUMN)?;
        let internal = ctx.mem.read_u64(d + IDX_INTERNAL)?;
        let model = ctx.mem.read_ptr(d + IDX_MODEL)?;
        Ok(Some(format!(
            "QPersistentModelIndex(row = {row}, column = {column}, internal = {internal:#x}, model = {model:#x})"
        )))
    }
}

impl Decoder for QPersistentModelIndexDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        match Self::render(ctx, value.addr) {
            Ok(Some(display)) => Rendered::display(display),
            Ok(None) => Rendered::display("QPersistentModelIndex(invalid)"),
            Err(err) => {
                debug!(addr = format_args!("{:#x}", value.addr), %err, "QPersistentModelIndex unreadable");
                match ctx.mem.format_value(value) {
                    Some(native) => Rendered::display(native),
                    None => Rendered::display("QPersistentModelIndex(invalid)"),
                }
            }
        }
    }
}
