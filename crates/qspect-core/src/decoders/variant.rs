//! # Type-Erased Value Decoder
//!
//! `QVariant`: a 24-byte payload area followed by a packed control word.
//!
//! The control word's low two bits are flags (bit 0: payload lives behind a
//! shared ref-counted block; bit 1: the variant is null); masking them off
//! yields the address of the runtime type descriptor, whose name field
//! finally says what the payload bytes are. Resolution is a single lookup
//! keyed by that name — first a fixed table of C++ scalar layouts, then the
//! catalogue for Qt types stored inline — with an opaque fallback for
//! everything else. No dynamic dispatch chains.
//!
//! Shared payloads are rendered as an opaque address. That is a deliberate
//! depth limit: the block's internals beyond the header are not
//! re-interpreted.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::debug;

use crate::decoders::{DecodeContext, Decoder};
use crate::error::DecodeResult;
use crate::memory::{MemoryAccess, TypeDesc, TypedRef};
use crate::render::{DisplayHint, Rendered};

/// Offset of the control word after the inline payload area.
const CONTROL_OFFSET: u64 = 24;
/// Size of the inline payload area.
const PAYLOAD_BYTES: usize = 24;

const FLAG_SHARED: u64 = 0x1;
const FLAG_NULL: u64 = 0x2;
const FLAG_MASK: u64 = 0x3;

// Runtime type descriptor (metatype interface) offsets.
const DESC_SIZE: u64 = 4;
const DESC_NAME: u64 = 24;
/// Type names are short; anything longer than this is garbage anyway.
const NAME_MAX: usize = 256;

/// How to render one C++ scalar payload.
#[derive(Debug, Clone, Copy)]
enum ScalarKind
{
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

/// Fixed table of the C++ scalar layouts the variant can hold inline.
static SCALARS: Lazy<HashMap<&'static str, ScalarKind>> = Lazy::new(|| {
    HashMap::from([
        ("bool", ScalarKind::Bool),
        ("char", ScalarKind::I8),
        ("signed char", ScalarKind::I8),
        ("qint8", ScalarKind::I8),
        ("unsigned char", ScalarKind::U8),
        ("quint8", ScalarKind::U8),
        ("short", ScalarKind::I16),
        ("qint16", ScalarKind::I16),
        ("unsigned short", ScalarKind::U16),
        ("quint16", ScalarKind::U16),
        ("int", ScalarKind::I32),
        ("qint32", ScalarKind::I32),
        ("unsigned int", ScalarKind::U32),
        ("uint", ScalarKind::U32),
        ("quint32", ScalarKind::U32),
        ("long", ScalarKind::I64),
        ("long long", ScalarKind::I64),
        ("qlonglong", ScalarKind::I64),
        ("qint64", ScalarKind::I64),
        ("unsigned long", ScalarKind::U64),
        ("unsigned long long", ScalarKind::U64),
        ("qulonglong", ScalarKind::U64),
        ("quint64", ScalarKind::U64),
        ("float", ScalarKind::F32),
        ("double", ScalarKind::F64),
    ])
});

fn read_scalar(mem: &dyn MemoryAccess, addr: u64, kind: ScalarKind) -> DecodeResult<String>
{
    Ok(match kind {
        ScalarKind::Bool => if mem.read_u8(addr)? != 0 { "true" } else { "false" }.to_string(),
        ScalarKind::I8 => (mem.read_u8(addr)? as i8).to_string(),
        ScalarKind::U8 => mem.read_u8(addr)?.to_string(),
        ScalarKind::I16 => (mem.read_u16(addr)? as i16).to_string(),
        ScalarKind::U16 => mem.read_u16(addr)?.to_string(),
        ScalarKind::I32 => mem.read_i32(addr)?.to_string(),
        ScalarKind::U32 => mem.read_u32(addr)?.to_string(),
        ScalarKind::I64 => mem.read_i64(addr)?.to_string(),
        ScalarKind::U64 => mem.read_u64(addr)?.to_string(),
        ScalarKind::F32 => f32::from_bits(mem.read_u32(addr)?).to_string(),
        ScalarKind::F64 => f64::from_bits(mem.read_u64(addr)?).to_string(),
    })
}

/// `QVariant` decoder.
pub struct QVariantDecoder;

impl QVariantDecoder
{
    /// Render the payload once the type name is known.
    fn render_payload(ctx: DecodeContext<'_>, payload: u64, control: u64, desc: u64, name: &str)
    -> DecodeResult<String>
    {
        if control & FLAG_SHARED != 0 {
            // Payload is a pointer to a ref-counted block; stop at its
            // address rather than guessing at the block's innards.
            let block = ctx.mem.read_ptr(payload)?;
            return Ok(format!("{block:#x}"));
        }

        if name.ends_with('*') {
            let pointee = ctx.mem.read_ptr(payload)?;
            return Ok(format!("{pointee:#x}"));
        }

        if let Some(&kind) = SCALARS.get(name) {
            return read_scalar(ctx.mem, payload, kind);
        }

        if let Some(decoder) = ctx.catalogue.resolve(name) {
            let size = u64::from(ctx.mem.read_u32(desc + DESC_SIZE)?);
            let inner = decoder.decode(ctx, &TypedRef::new(payload, TypeDesc::new(name, size, 8)));
            return Ok(match inner.hint {
                Some(DisplayHint::String) => format!("\"{}\"", inner.display),
                _ => inner.display,
            });
        }

        // Unknown layout: dump the raw payload bytes opaquely.
        let size = ctx.mem.read_u32(desc + DESC_SIZE)? as usize;
        let bytes = ctx.mem.read_bytes(payload, size.clamp(1, PAYLOAD_BYTES))?;
        let hex = bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ");
        Ok(format!("<{hex}>"))
    }

    fn render(ctx: DecodeContext<'_>, value: &TypedRef) -> DecodeResult<String>
    {
        let control = ctx.mem.read_u64(value.addr + CONTROL_OFFSET)?;
        if control & FLAG_NULL != 0 {
            return Ok("QVariant(null)".to_string());
        }

        let desc = control & !FLAG_MASK;
        if desc == 0 {
            return Ok("QVariant(null)".to_string());
        }

        let name_ptr = ctx.mem.read_ptr(desc + DESC_NAME)?;
        let name = String::from_utf8_lossy(&ctx.mem.read_cstr(name_ptr, NAME_MAX)?).into_owned();
        let rendered = Self::render_payload(ctx, value.addr, control, desc, &name)?;
        Ok(format!("QVariant(type = \"{name}\", value = {rendered})"))
    }
}

impl Decoder for QVariantDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        match Self::render(ctx, value) {
            Ok(display) => Rendered::display(display),
            Err(err) => {
                debug!(addr = format_args!("{:#x}", value.addr), %err, "QVariant unreadable");
                Rendered::display("QVariant(<unreadable>)")
            }
        }
    }
}
