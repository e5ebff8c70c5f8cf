//! # Memory Access Facade
//!
//! The boundary between the decoders and whatever supplies the raw bytes.
//!
//! In production the inspection host (a debugger holding the inspected
//! process frozen) implements [`MemoryAccess`]. For tests and the CLI
//! harness, [`SnapshotMemory`] serves a frozen byte image from the host
//! process's own heap.
//!
//! Decoders only ever *read*. Every read is immediate and bounded; there is
//! no caching, no write path, and no retained reference past a single decode
//! call.
//!
//! ## Addressing
//!
//! Addresses are `u64` values in the inspected process's address space.
//! Address 0 is never readable: decoders rely on that to treat null backing
//! pointers as "empty/invalid" rather than faulting.

use crate::error::{DecodeError, DecodeResult};

/// Description of a concrete type in the inspected process
///
/// Carries just enough for a decoder to do address arithmetic: the declared
/// name, byte size, alignment, and (for templated containers) the resolved
/// template arguments. The inspection host produces these from its own debug
/// information; the decoders never derive them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDesc
{
    /// Declared type name, e.g. `QString` or `QHash<int,QString>`
    pub name: String,
    /// Size of one instance in bytes
    pub size: u64,
    /// Required alignment in bytes
    pub align: u64,
    /// Resolved template arguments, in declaration order
    pub args: Vec<TypeDesc>,
}

impl TypeDesc
{
    /// Create a descriptor for a non-templated type.
    pub fn new(name: impl Into<String>, size: u64, align: u64) -> Self
    {
        Self {
            name: name.into(),
            size,
            align,
            args: Vec::new(),
        }
    }

    /// Create a descriptor for a templated type with resolved arguments.
    pub fn with_args(name: impl Into<String>, size: u64, align: u64, args: Vec<TypeDesc>) -> Self
    {
        Self {
            name: name.into(),
            size,
            align,
            args,
        }
    }

    /// The name truncated before the first template delimiter
    ///
    /// `QHash<int,QString>` yields `QHash`; a non-templated name is returned
    /// unchanged.
    pub fn base_name(&self) -> &str
    {
        match self.name.find('<') {
            Some(pos) => &self.name[..pos],
            None => &self.name,
        }
    }

    /// Resolved template argument at `index`, if the host supplied one.
    pub fn arg(&self, index: usize) -> Option<&TypeDesc>
    {
        self.args.get(index)
    }
}

/// A typed reference into the inspected process
///
/// An (address, declared type) pair. Never owned by a decoder and valid only
/// for the duration of one decode call; the host is expected to keep the
/// inspected process frozen for that long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedRef
{
    /// Address of the value in the inspected process
    pub addr: u64,
    /// Declared type of the value at that address
    pub ty: TypeDesc,
}

impl TypedRef
{
    /// Create a typed reference.
    pub fn new(addr: u64, ty: TypeDesc) -> Self
    {
        Self { addr, ty }
    }

    /// Whether the backing address is null.
    pub fn is_null(&self) -> bool
    {
        self.addr == 0
    }
}

/// Read access to the inspected process's memory
///
/// Implemented by the inspection host. Only [`MemoryAccess::read_bytes`] is
/// required; the integer and pointer helpers are derived from it and assume
/// a little-endian target.
///
/// `format_value` is the host-native fallback formatter: some decoders
/// degrade to it when a layout walk fails, and the `QMap` decoder delegates
/// to it outright (the balanced tree behind `QMap` lives in host-formatted
/// territory the catalogue does not re-interpret).
pub trait MemoryAccess
{
    /// Read `len` bytes at `addr`.
    ///
    /// ## Errors
    ///
    /// Returns [`DecodeError::UnreadableMemory`] if any byte in the range is
    /// not readable. Partial reads are not returned; a decode either sees
    /// the bytes it asked for or falls back.
    fn read_bytes(&self, addr: u64, len: usize) -> DecodeResult<Vec<u8>>;

    /// Pointer width of the inspected process in bytes.
    fn pointer_width(&self) -> usize
    {
        8
    }

    /// Host-native rendering of a value, if the host has one.
    ///
    /// The default implementation has no opinion; debugger-backed hosts
    /// typically route this to their own expression formatter.
    fn format_value(&self, _value: &TypedRef) -> Option<String>
    {
        None
    }

    /// Read one byte.
    fn read_u8(&self, addr: u64) -> DecodeResult<u8>
    {
        Ok(self.read_bytes(addr, 1)?[0])
    }

    /// Read a little-endian `u16`.
    fn read_u16(&self, addr: u64) -> DecodeResult<u16>
    {
        let bytes = self.read_bytes(addr, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a little-endian `u32`.
    fn read_u32(&self, addr: u64) -> DecodeResult<u32>
    {
        let bytes = self.read_bytes(addr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian `u64`.
    fn read_u64(&self, addr: u64) -> DecodeResult<u64>
    {
        let bytes = self.read_bytes(addr, 8)?;
        Ok(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Read a little-endian `i32`.
    fn read_i32(&self, addr: u64) -> DecodeResult<i32>
    {
        Ok(self.read_u32(addr)? as i32)
    }

    /// Read a little-endian `i64`.
    fn read_i64(&self, addr: u64) -> DecodeResult<i64>
    {
        Ok(self.read_u64(addr)? as i64)
    }

    /// Read a pointer-sized value.
    fn read_ptr(&self, addr: u64) -> DecodeResult<u64>
    {
        match self.pointer_width() {
            4 => Ok(u64::from(self.read_u32(addr)?)),
            _ => self.read_u64(addr),
        }
    }

    /// Read a NUL-terminated byte run, up to `max` bytes.
    ///
    /// Reads byte-by-byte so a string ending just before an unmapped page
    /// does not fail on bytes past its terminator. An unreadable first byte
    /// is still an error; running off the readable region after that returns
    /// what was read.
    fn read_cstr(&self, addr: u64, max: usize) -> DecodeResult<Vec<u8>>
    {
        let mut out = Vec::new();
        for i in 0..max as u64 {
            let byte = match self.read_u8(addr + i) {
                Ok(byte) => byte,
                Err(err) if out.is_empty() => return Err(err),
                Err(_) => break,
            };
            if byte == 0 {
                break;
            }
            out.push(byte);
        }
        Ok(out)
    }
}

/// A frozen byte image of (part of) an inspected process
///
/// The reference [`MemoryAccess`] implementation: a contiguous run of bytes
/// mapped at a fixed base address. Tests build fixtures into one of these
/// with the `poke_*` methods; the CLI harness loads one from disk.
///
/// Reads outside the image, and any read at address 0, fail with
/// [`DecodeError::UnreadableMemory`].
#[derive(Debug, Clone)]
pub struct SnapshotMemory
{
    base: u64,
    bytes: Vec<u8>,
}

impl SnapshotMemory
{
    /// Create an image of `len` zero bytes mapped at `base`.
    ///
    /// ## Panics
    ///
    /// Panics if `base` is 0; the null page must stay unreadable.
    pub fn with_capacity(base: u64, len: usize) -> Self
    {
        assert!(base != 0, "snapshot cannot be mapped at the null page");
        Self {
            base,
            bytes: vec![0u8; len],
        }
    }

    /// Wrap an existing byte image mapped at `base`.
    ///
    /// ## Panics
    ///
    /// Panics if `base` is 0.
    pub fn from_bytes(base: u64, bytes: Vec<u8>) -> Self
    {
        assert!(base != 0, "snapshot cannot be mapped at the null page");
        Self { base, bytes }
    }

    /// Base address the image is mapped at.
    pub fn base(&self) -> u64
    {
        self.base
    }

    /// Length of the image in bytes.
    pub fn len(&self) -> usize
    {
        self.bytes.len()
    }

    /// Whether the image is empty.
    pub fn is_empty(&self) -> bool
    {
        self.bytes.is_empty()
    }

    fn offset_of(&self, addr: u64, len: usize) -> Option<usize>
    {
        if addr < self.base {
            return None;
        }
        let offset = usize::try_from(addr - self.base).ok()?;
        let end = offset.checked_add(len)?;
        if end > self.bytes.len() {
            return None;
        }
        Some(offset)
    }

    /// Write raw bytes into the image.
    ///
    /// ## Panics
    ///
    /// Panics if the range falls outside the image. Fixture construction is
    /// the only intended caller, where that is a bug in the fixture.
    pub fn poke_bytes(&mut self, addr: u64, bytes: &[u8])
    {
        let offset = self
            .offset_of(addr, bytes.len())
            .unwrap_or_else(|| panic!("poke outside snapshot: {addr:#x} + {}", bytes.len()));
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Write one byte.
    pub fn poke_u8(&mut self, addr: u64, value: u8)
    {
        self.poke_bytes(addr, &[value]);
    }

    /// Write a little-endian `u16`.
    pub fn poke_u16(&mut self, addr: u64, value: u16)
    {
        self.poke_bytes(addr, &value.to_le_bytes());
    }

    /// Write a little-endian `u32`.
    pub fn poke_u32(&mut self, addr: u64, value: u32)
    {
        self.poke_bytes(addr, &value.to_le_bytes());
    }

    /// Write a little-endian `u64`.
    pub fn poke_u64(&mut self, addr: u64, value: u64)
    {
        self.poke_bytes(addr, &value.to_le_bytes());
    }

    /// Write a little-endian `i32`.
    pub fn poke_i32(&mut self, addr: u64, value: i32)
    {
        self.poke_bytes(addr, &value.to_le_bytes());
    }

    /// Write a little-endian `i64`.
    pub fn poke_i64(&mut self, addr: u64, value: i64)
    {
        self.poke_bytes(addr, &value.to_le_bytes());
    }

    /// Write a pointer-sized value.
    pub fn poke_ptr(&mut self, addr: u64, value: u64)
    {
        self.poke_u64(addr, value);
    }
}

impl MemoryAccess for SnapshotMemory
{
    fn read_bytes(&self, addr: u64, len: usize) -> DecodeResult<Vec<u8>>
    {
        if len == 0 {
            return Ok(Vec::new());
        }
        if addr == 0 {
            return Err(DecodeError::UnreadableMemory { addr, len });
        }
        match self.offset_of(addr, len) {
            Some(offset) => Ok(self.bytes[offset..offset + len].to_vec()),
            None => Err(DecodeError::UnreadableMemory { addr, len }),
        }
    }
}
