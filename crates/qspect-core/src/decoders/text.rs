//! # String-Family Decoders
//!
//! `QString`, `QByteArray`, `QChar`, and the borrowed view types.
//!
//! These are the trivial fixed-offset readers of the catalogue: a header
//! pointer or size plus a data pointer, no algorithm beyond direct field
//! extraction. They matter because the container decoders compose them —
//! the URL decoder walks seven `QString` members, the timezone decoder reads
//! an embedded `QByteArray` identifier, and the variant decoder re-enters
//! them for inline string payloads.
//!
//! ## Layout
//!
//! `QString`, `QByteArray`, and `QList` all start with the same 24-byte
//! array-data triple: shared header pointer at +0, data pointer at +8,
//! element count at +16. The views are `{size, data}` pairs instead.

use tracing::debug;

use crate::decoders::{DecodeContext, Decoder};
use crate::error::DecodeResult;
use crate::memory::{MemoryAccess, TypeDesc, TypedRef};
use crate::render::{Child, Rendered};

/// Offset of the data pointer inside the array-data triple.
pub(crate) const ARRAY_DATA_PTR: u64 = 8;
/// Offset of the element count inside the array-data triple.
pub(crate) const ARRAY_DATA_SIZE: u64 = 16;
/// Size of the array-data triple, and so of `QString`/`QByteArray` itself.
pub(crate) const ARRAY_DATA_BYTES: u64 = 24;

/// Decode a UTF-16LE byte run, replacing unpaired surrogates.
fn utf16_lossy(bytes: &[u8]) -> String
{
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    char::decode_utf16(units.iter().copied())
        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Decode a Latin-1 byte run (every byte is a code point).
fn latin1_lossy(bytes: &[u8]) -> String
{
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Read the `QString` at `addr` as a host string.
///
/// A null data pointer or non-positive size reads as the empty string, which
/// is also what a default-constructed `QString` holds.
pub(crate) fn read_qstring(mem: &dyn MemoryAccess, addr: u64) -> DecodeResult<String>
{
    let data = mem.read_ptr(addr + ARRAY_DATA_PTR)?;
    let size = mem.read_i64(addr + ARRAY_DATA_SIZE)?;
    if data == 0 || size <= 0 {
        return Ok(String::new());
    }
    let bytes = mem.read_bytes(data, (size as usize) * 2)?;
    Ok(utf16_lossy(&bytes))
}

/// Read the `QByteArray` at `addr` as raw bytes.
pub(crate) fn read_qbytearray(mem: &dyn MemoryAccess, addr: u64) -> DecodeResult<Vec<u8>>
{
    let data = mem.read_ptr(addr + ARRAY_DATA_PTR)?;
    let size = mem.read_i64(addr + ARRAY_DATA_SIZE)?;
    if data == 0 || size <= 0 {
        return Ok(Vec::new());
    }
    mem.read_bytes(data, size as usize)
}

/// `QString`: UTF-16 array-data triple.
pub struct QStringDecoder;

impl Decoder for QStringDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        match read_qstring(ctx.mem, value.addr) {
            Ok(text) => Rendered::text(text),
            Err(err) => {
                debug!(addr = format_args!("{:#x}", value.addr), %err, "QString unreadable");
                Rendered::text("")
            }
        }
    }
}

/// `QByteArray`: byte array-data triple, with per-byte children.
pub struct QByteArrayDecoder;

impl Decoder for QByteArrayDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        let (data, size) = match (
            ctx.mem.read_ptr(value.addr + ARRAY_DATA_PTR),
            ctx.mem.read_i64(value.addr + ARRAY_DATA_SIZE),
        ) {
            (Ok(data), Ok(size)) if data != 0 && size > 0 => (data, size as usize),
            (Ok(_), Ok(_)) => return Rendered::text(""),
            (Err(err), _) | (_, Err(err)) => {
                debug!(addr = format_args!("{:#x}", value.addr), %err, "QByteArray unreadable");
                return Rendered::text("");
            }
        };

        let display = match ctx.mem.read_bytes(data, size) {
            Ok(bytes) => latin1_lossy(&bytes),
            Err(err) => {
                debug!(data = format_args!("{data:#x}"), %err, "QByteArray payload unreadable");
                String::new()
            }
        };

        let elem = TypeDesc::new("char", 1, 1);
        let children = (0..size).map(move |i| Child::new(format!("[{i}]"), TypedRef::new(data + i as u64, elem.clone())));
        let mut rendered = Rendered::with_children(display, size, Box::new(children));
        rendered.hint = Some(crate::render::DisplayHint::String);
        rendered
    }
}

/// `QChar`: a single UTF-16 code unit.
pub struct QCharDecoder;

impl Decoder for QCharDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        match ctx.mem.read_u16(value.addr) {
            Ok(ucs) => {
                let ch = char::from_u32(u32::from(ucs)).unwrap_or(char::REPLACEMENT_CHARACTER);
                Rendered::text(ch.to_string())
            }
            Err(err) => {
                debug!(addr = format_args!("{:#x}", value.addr), %err, "QChar unreadable");
                Rendered::text("")
            }
        }
    }
}

/// Character encoding of a borrowed string view.
#[derive(Debug, Clone, Copy)]
pub enum ViewEncoding
{
    /// `QLatin1String`: one byte per code point
    Latin1,
    /// `QStringView`: UTF-16, two bytes per unit
    Utf16,
    /// `QUtf8StringView`: UTF-8
    Utf8,
}

impl ViewEncoding
{
    fn bytes_per_unit(self) -> u64
    {
        match self {
            Self::Latin1 | Self::Utf8 => 1,
            Self::Utf16 => 2,
        }
    }
}

/// The borrowed view family: `{size, data}` with a per-type encoding.
///
/// Unlike the owning types these hold size first and data second.
pub struct StringViewDecoder
{
    encoding: ViewEncoding,
}

impl StringViewDecoder
{
    /// Create a view decoder for the given encoding.
    pub fn new(encoding: ViewEncoding) -> Self
    {
        Self { encoding }
    }

    fn read(&self, mem: &dyn MemoryAccess, addr: u64) -> DecodeResult<String>
    {
        let size = mem.read_i64(addr)?;
        let data = mem.read_ptr(addr + 8)?;
        if data == 0 || size <= 0 {
            return Ok(String::new());
        }
        let bytes = mem.read_bytes(data, (size as u64 * self.encoding.bytes_per_unit()) as usize)?;
        Ok(match self.encoding {
            ViewEncoding::Latin1 => latin1_lossy(&bytes),
            ViewEncoding::Utf16 => utf16_lossy(&bytes),
            ViewEncoding::Utf8 => String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

impl Decoder for StringViewDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        match self.read(ctx.mem, value.addr) {
            Ok(text) => Rendered::text(text),
            Err(err) => {
                debug!(addr = format_args!("{:#x}", value.addr), %err, "string view unreadable");
                Rendered::text("")
            }
        }
    }
}
