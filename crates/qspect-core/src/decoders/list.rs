//! # Sequence Decoder
//!
//! `QList<T>`: a flat contiguous buffer behind the common array-data triple.
//! Children are computed by plain pointer arithmetic from the element size
//! the host resolved for `T`.

use tracing::debug;

use crate::decoders::text::{ARRAY_DATA_PTR, ARRAY_DATA_SIZE};
use crate::decoders::{DecodeContext, Decoder};
use crate::memory::TypedRef;
use crate::render::{Child, Rendered};

/// `QList<T>` decoder.
pub struct QListDecoder;

impl Decoder for QListDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        let elem = match value.ty.arg(0) {
            Some(elem) => elem.clone(),
            None => {
                debug!(ty = %value.ty.name, "QList without a resolved element type");
                return Rendered::display(format!("{} (unknown element type)", value.ty.name));
            }
        };

        let (data, size) = match (
            ctx.mem.read_ptr(value.addr + ARRAY_DATA_PTR),
            ctx.mem.read_i64(value.addr + ARRAY_DATA_SIZE),
        ) {
            (Ok(data), Ok(size)) => (data, size.max(0) as usize),
            (Err(err), _) | (_, Err(err)) => {
                debug!(addr = format_args!("{:#x}", value.addr), %err, "QList unreadable");
                return Rendered::display(format!("{} (unreadable)", value.ty.name));
            }
        };

        if size == 0 || data == 0 {
            return Rendered::display(format!("QList<{}> (empty)", elem.name));
        }

        let display = format!("QList<{}> (size = {size})", elem.name);
        let stride = elem.size;
        let children =
            (0..size).map(move |i| Child::new(format!("[{i}]"), TypedRef::new(data + i as u64 * stride, elem.clone())));
        Rendered::with_children(display, size, Box::new(children))
    }
}
