//! Shared fixture plumbing: a bump-allocated snapshot image plus helpers
//! that lay values out exactly the way the decoders expect to find them.

#![allow(dead_code)]

use qspect_core::{SnapshotMemory, TypeDesc};

pub const FIXTURE_BASE: u64 = 0x10000;
pub const FIXTURE_LEN: usize = 64 * 1024;

/// A snapshot image with a bump allocator on top.
pub struct Fixture
{
    pub mem: SnapshotMemory,
    next: u64,
}

impl Fixture
{
    pub fn new() -> Self
    {
        Self {
            mem: SnapshotMemory::with_capacity(FIXTURE_BASE, FIXTURE_LEN),
            next: FIXTURE_BASE,
        }
    }

    /// Reserve `len` bytes at the given alignment and return their address.
    pub fn alloc(&mut self, len: u64, align: u64) -> u64
    {
        let align = align.max(1);
        let addr = self.next.div_ceil(align) * align;
        self.next = addr + len;
        assert!(
            self.next <= FIXTURE_BASE + FIXTURE_LEN as u64,
            "fixture image exhausted"
        );
        addr
    }

    /// Write a QString array-data triple at `at`, allocating the UTF-16
    /// payload elsewhere in the image.
    pub fn put_qstring(&mut self, at: u64, text: &str)
    {
        let units: Vec<u16> = text.encode_utf16().collect();
        let data = self.alloc((units.len().max(1) * 2) as u64, 2);
        for (i, unit) in units.iter().enumerate() {
            self.mem.poke_u16(data + i as u64 * 2, *unit);
        }
        self.mem.poke_ptr(at, data); // header pointer; the decoders never follow it
        self.mem.poke_ptr(at + 8, data);
        self.mem.poke_i64(at + 16, units.len() as i64);
    }

    /// Allocate a standalone QString and return its address.
    pub fn alloc_qstring(&mut self, text: &str) -> u64
    {
        let at = self.alloc(24, 8);
        self.put_qstring(at, text);
        at
    }

    /// Write a QByteArray array-data triple at `at`.
    pub fn put_qbytearray(&mut self, at: u64, bytes: &[u8])
    {
        let data = self.alloc(bytes.len().max(1) as u64, 1);
        self.mem.poke_bytes(data, bytes);
        self.mem.poke_ptr(at, data);
        self.mem.poke_ptr(at + 8, data);
        self.mem.poke_i64(at + 16, bytes.len() as i64);
    }

    /// Allocate a standalone QByteArray and return its address.
    pub fn alloc_qbytearray(&mut self, bytes: &[u8]) -> u64
    {
        let at = self.alloc(24, 8);
        self.put_qbytearray(at, bytes);
        at
    }

    /// Allocate a NUL-terminated C string and return its address.
    pub fn alloc_cstr(&mut self, text: &str) -> u64
    {
        let at = self.alloc(text.len() as u64 + 1, 1);
        self.mem.poke_bytes(at, text.as_bytes());
        self.mem.poke_u8(at + text.len() as u64, 0);
        at
    }
}

pub fn ty(name: &str, size: u64, align: u64) -> TypeDesc
{
    TypeDesc::new(name, size, align)
}

pub fn ty_int() -> TypeDesc
{
    TypeDesc::new("int", 4, 4)
}

pub fn ty_qstring() -> TypeDesc
{
    TypeDesc::new("QString", 24, 8)
}

// ---------------------------------------------------------------------------
// Span-indexed hash fixtures
// ---------------------------------------------------------------------------

/// Header/span/slot layout constants mirrored by the hash fixtures.
pub const SPAN_STRIDE: u64 = 144;
pub const SPAN_ENTRIES: u64 = 128;
pub const SLOT_UNUSED: u8 = 0xff;

/// A hand-rolled span table under construction.
pub struct HashFixture
{
    /// Address of the `Data` header
    pub d: u64,
    /// Address of the span array
    pub spans: u64,
    /// Entry array address per span
    pub entries: Vec<u64>,
    /// Next free entry offset per span
    used: Vec<u8>,
    num_buckets: u64,
    entry_size: u64,
}

impl HashFixture
{
    /// Lay out a table of `num_buckets` buckets (a multiple of 128) whose
    /// entries are `entry_size` bytes, with room for `capacity` entries per
    /// span. All slots start unused.
    pub fn new(f: &mut Fixture, num_buckets: u64, entry_size: u64, capacity: u64) -> Self
    {
        assert!(num_buckets % 128 == 0);
        let nspans = num_buckets / 128;

        let d = f.alloc(40, 8);
        let spans = f.alloc(nspans * SPAN_STRIDE, 8);
        let mut entries = Vec::new();
        for span in 0..nspans {
            let span_addr = spans + span * SPAN_STRIDE;
            for slot in 0..128 {
                f.mem.poke_u8(span_addr + slot, SLOT_UNUSED);
            }
            let entry_array = f.alloc(capacity * entry_size, 8);
            f.mem.poke_ptr(span_addr + SPAN_ENTRIES, entry_array);
            entries.push(entry_array);
        }

        f.mem.poke_u32(d, 1); // ref count
        f.mem.poke_u64(d + 8, 0); // live entry count, bumped per insert
        f.mem.poke_u64(d + 16, num_buckets);
        f.mem.poke_u64(d + 24, 0); // seed
        f.mem.poke_ptr(d + 32, spans);

        Self {
            d,
            spans,
            entries,
            used: vec![0; nspans as usize],
            num_buckets,
            entry_size,
        }
    }

    /// Occupy `bucket` with a fresh entry and return the entry's address.
    pub fn occupy(&mut self, f: &mut Fixture, bucket: u64) -> u64
    {
        assert!(bucket < self.num_buckets);
        let span = (bucket >> 7) as usize;
        let local = bucket & 127;
        let offset = self.used[span];
        self.used[span] += 1;
        f.mem.poke_u8(self.spans + span as u64 * SPAN_STRIDE + local, offset);
        let size = f.mem.read_u64_at(self.d + 8);
        f.mem.poke_u64(self.d + 8, size + 1);
        self.entries[span] + u64::from(offset) * self.entry_size
    }

    /// Override the stored live-entry count (for corruption fixtures).
    pub fn set_size(&self, f: &mut Fixture, size: u64)
    {
        f.mem.poke_u64(self.d + 8, size);
    }

    /// Allocate a `QHash`-style handle (one pointer) pointing at this table.
    pub fn handle(&self, f: &mut Fixture) -> u64
    {
        let at = f.alloc(8, 8);
        f.mem.poke_ptr(at, self.d);
        at
    }

    /// Allocate a `QMultiHash`-style handle: the data pointer plus the
    /// flattened value count.
    pub fn multi_handle(&self, f: &mut Fixture, total: i64) -> u64
    {
        let at = f.alloc(16, 8);
        f.mem.poke_ptr(at, self.d);
        f.mem.poke_i64(at + 8, total);
        at
    }
}

/// Tiny read-back helper so fixtures can bump counters they already wrote.
pub trait SnapshotReadBack
{
    fn read_u64_at(&self, addr: u64) -> u64;
}

impl SnapshotReadBack for SnapshotMemory
{
    fn read_u64_at(&self, addr: u64) -> u64
    {
        use qspect_core::MemoryAccess;
        self.read_bytes(addr, 8)
            .map(|b| u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .unwrap_or(0)
    }
}
