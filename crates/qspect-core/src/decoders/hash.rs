//! # Span-Indexed Hash Decoder
//!
//! `QHash`, `QMultiHash`, and `QSet`: Qt6's open-addressing hash table,
//! organized into fixed-size spans of 128 slots.
//!
//! ## Layout
//!
//! The handle holds one pointer to a `Data` header:
//!
//! ```text
//! Data:  +0  ref count (4)
//!        +8  live entry count (8)
//!        +16 bucket count (8)
//!        +24 seed (8)
//!        +32 span array pointer (8)
//! Span:  +0   slot offsets, one byte per slot (128)
//!        +128 entry array pointer (8)
//!        +136 allocated / next-free bookkeeping
//!        stride 144
//! ```
//!
//! A bucket index splits as `span = bucket >> 7`, `local = bucket & 127`.
//! The slot byte is either `0xff` (unused) or an index into that span's
//! compact entry array. Entry layout is derived from the resolved key and
//! value types by ordinary struct packing.
//!
//! `QMultiHash` entries hold the key and a forward chain pointer; each chain
//! node is `{value, next}`. A live bucket's chain is never empty when first
//! visited — only the tail transition yields null, which is the
//! advance-to-next-bucket signal. Any other appearance of an "impossible"
//! state (a used bucket whose slot holds the sentinel, more entries than the
//! header reports, a chain cycle) is treated as a malformed layout: logged,
//! iteration stops, and the host keeps whatever was yielded so far. Nothing
//! here may take the host down.
//!
//! ## Cursor
//!
//! The walk state is two integers (bucket, chain position) plus a small
//! queue of children already split out of the current entry. The sequence is
//! restartable only by decoding again from scratch.

use std::collections::VecDeque;

use smallvec::SmallVec;
use tracing::warn;

use crate::decoders::{DecodeContext, Decoder};
use crate::error::{DecodeError, DecodeResult};
use crate::memory::{MemoryAccess, TypeDesc, TypedRef};
use crate::render::{Child, Rendered};

const SPAN_SHIFT: u32 = 7;
const LOCAL_MASK: u64 = 127;
const SLOT_UNUSED: u8 = 0xff;

const DATA_SIZE: u64 = 8;
const DATA_NUM_BUCKETS: u64 = 16;
const DATA_SPANS: u64 = 32;

const SPAN_ENTRIES: u64 = 128;
const SPAN_STRIDE: u64 = 144;

/// Offset of the flattened value count inside a `QMultiHash` handle.
const MULTI_SIZE: u64 = 8;

fn align_up(value: u64, align: u64) -> u64
{
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

/// Byte layout of one entry, derived from the resolved key/value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeLayout
{
    /// Offset of the value (or chain pointer) after the key
    value_offset: u64,
    /// Stride between consecutive entries in a span's entry array
    size: u64,
}

/// `{key, value}` packing for single-valued entries.
fn node_layout(key: &TypeDesc, value: &TypeDesc) -> NodeLayout
{
    let value_offset = align_up(key.size, value.align);
    let align = key.align.max(value.align);
    NodeLayout {
        value_offset,
        size: align_up(value_offset + value.size, align.max(1)),
    }
}

/// Key-only packing for set entries.
fn key_only_layout(key: &TypeDesc) -> NodeLayout
{
    NodeLayout {
        value_offset: 0,
        size: align_up(key.size, key.align.max(1)),
    }
}

/// `{key, chain*}` packing for multi-valued entries.
fn multi_node_layout(key: &TypeDesc, ptr_width: u64) -> NodeLayout
{
    let value_offset = align_up(key.size, ptr_width);
    NodeLayout {
        value_offset,
        size: align_up(value_offset + ptr_width, key.align.max(ptr_width)),
    }
}

/// Offset of the `next` pointer inside a `{value, next}` chain node.
fn chain_next_offset(value: &TypeDesc, ptr_width: u64) -> u64
{
    align_up(value.size, ptr_width)
}

/// The hash table's header fields, read once per decode.
#[derive(Debug, Clone, Copy)]
struct TableHeader
{
    size: u64,
    num_buckets: u64,
    spans: u64,
}

/// Read the header behind the handle at `addr`. `Ok(None)` means a null
/// backing pointer, i.e. an empty table.
fn load_header(mem: &dyn MemoryAccess, addr: u64) -> DecodeResult<Option<TableHeader>>
{
    let d = mem.read_ptr(addr)?;
    if d == 0 {
        return Ok(None);
    }
    let size = mem.read_u64(d + DATA_SIZE)?;
    let num_buckets = mem.read_u64(d + DATA_NUM_BUCKETS)?;
    let spans = mem.read_ptr(d + DATA_SPANS)?;
    if num_buckets > 0 && spans == 0 {
        return Err(DecodeError::MalformedLayout(format!(
            "hash data at {d:#x} reports {num_buckets} buckets but a null span array"
        )));
    }
    Ok(Some(TableHeader {
        size,
        num_buckets,
        spans,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkMode
{
    /// One value per key (`QHash`)
    Single,
    /// Chained values per key (`QMultiHash`)
    Multi,
    /// Keys only (`QSet`)
    KeysOnly,
}

/// Lazy cursor over the live entries of a span-indexed hash table.
struct HashCursor<'m>
{
    mem: &'m dyn MemoryAccess,
    header: TableHeader,
    mode: WalkMode,
    key_ty: TypeDesc,
    value_ty: Option<TypeDesc>,
    node: NodeLayout,
    chain_next: u64,
    /// Next bucket to inspect
    bucket: u64,
    /// Current chain node, 0 when not inside a chain
    chain: u64,
    /// Entry address of the bucket the chain hangs off (key source)
    node_addr: u64,
    /// Chain nodes already visited for the current bucket, for cycle checks
    visited: SmallVec<[u64; 8]>,
    /// Entries yielded so far, bounded by the reported size
    emitted: u64,
    /// Reported entry count; anything past this is corruption
    limit: u64,
    /// Running child index used for labels
    index: usize,
    queue: VecDeque<Child>,
    done: bool,
}

impl<'m> HashCursor<'m>
{
    #[allow(clippy::too_many_arguments)]
    fn new(
        mem: &'m dyn MemoryAccess,
        header: TableHeader,
        mode: WalkMode,
        key_ty: TypeDesc,
        value_ty: Option<TypeDesc>,
        node: NodeLayout,
        chain_next: u64,
        limit: u64,
    ) -> Self
    {
        Self {
            mem,
            header,
            mode,
            key_ty,
            value_ty,
            node,
            chain_next,
            bucket: 0,
            chain: 0,
            node_addr: 0,
            visited: SmallVec::new(),
            emitted: 0,
            limit,
            index: 0,
            queue: VecDeque::new(),
            done: false,
        }
    }

    fn push_child(&mut self, addr: u64, ty: &TypeDesc)
    {
        self.queue.push_back(Child::new(self.index.to_string(), TypedRef::new(addr, ty.clone())));
        self.index += 1;
    }

    /// Emit one entry (key, and value where the mode has one) into the
    /// queue, honoring the reported-size bound.
    fn emit_entry(&mut self, key_addr: u64, value_addr: Option<u64>)
    {
        if self.emitted >= self.limit {
            warn!(
                limit = self.limit,
                "hash table yields more entries than its header reports; stopping walk"
            );
            self.done = true;
            return;
        }
        self.emitted += 1;
        let key_ty = self.key_ty.clone();
        self.push_child(key_addr, &key_ty);
        if let (Some(addr), Some(ty)) = (value_addr, self.value_ty.clone()) {
            self.push_child(addr, &ty);
        }
    }

    /// Advance `self.bucket` to the next used bucket, or mark the walk done
    /// when the bucket space is exhausted.
    fn advance_to_used_bucket(&mut self) -> DecodeResult<()>
    {
        while self.bucket < self.header.num_buckets {
            if self.slot_offset(self.bucket)? != SLOT_UNUSED {
                return Ok(());
            }
            self.bucket += 1;
        }
        self.done = true;
        Ok(())
    }

    /// Address of the span covering `bucket`.
    ///
    /// All span arithmetic is checked: a hostile header can place the span
    /// array high enough that unchecked arithmetic wraps into unrelated
    /// memory.
    fn span_addr(&self, bucket: u64) -> DecodeResult<u64>
    {
        (bucket >> SPAN_SHIFT)
            .checked_mul(SPAN_STRIDE)
            .and_then(|offset| self.header.spans.checked_add(offset))
            .ok_or_else(|| {
                DecodeError::MalformedLayout(format!(
                    "span address for bucket {bucket} overflows (span array at {:#x})",
                    self.header.spans
                ))
            })
    }

    fn slot_offset(&self, bucket: u64) -> DecodeResult<u8>
    {
        let slot = self
            .span_addr(bucket)?
            .checked_add(bucket & LOCAL_MASK)
            .ok_or_else(|| {
                DecodeError::MalformedLayout(format!("slot address for bucket {bucket} overflows"))
            })?;
        self.mem.read_u8(slot)
    }

    /// Resolve the entry address for a bucket already known to be used.
    ///
    /// The slot is re-read here; finding the unused sentinel after
    /// [`Self::advance_to_used_bucket`] saw the bucket as used means the
    /// layout (or our reading of it) is wrong, and the walk must not guess
    /// its way past that.
    fn bucket_entry(&self, bucket: u64) -> DecodeResult<u64>
    {
        let offset = self.slot_offset(bucket)?;
        if offset == SLOT_UNUSED {
            return Err(DecodeError::MalformedLayout(format!(
                "bucket {bucket} is used but its span slot holds the unused sentinel"
            )));
        }
        let entries_ptr = self
            .span_addr(bucket)?
            .checked_add(SPAN_ENTRIES)
            .ok_or_else(|| {
                DecodeError::MalformedLayout(format!(
                    "entry-array pointer address for bucket {bucket} overflows"
                ))
            })?;
        let entries = self.mem.read_ptr(entries_ptr)?;
        if entries == 0 {
            return Err(DecodeError::MalformedLayout(format!(
                "span {} has occupied slots but a null entry array",
                bucket >> SPAN_SHIFT
            )));
        }
        u64::from(offset)
            .checked_mul(self.node.size)
            .and_then(|byte_offset| entries.checked_add(byte_offset))
            .ok_or_else(|| {
                DecodeError::MalformedLayout(format!(
                    "entry address for bucket {bucket} overflows (entry array at {entries:#x})"
                ))
            })
    }

    /// Walk one step: either the next chained value of the current bucket,
    /// or the next used bucket. Fills the queue with one entry's children.
    fn step(&mut self) -> DecodeResult<()>
    {
        // Mid-chain: same key, next chained value.
        if self.mode == WalkMode::Multi && self.chain != 0 {
            let value_addr = self.chain;
            let next = self.mem.read_ptr(self.chain + self.chain_next)?;
            if next != 0 && self.visited.contains(&next) {
                return Err(DecodeError::MalformedLayout(format!(
                    "chain cycle through {next:#x} in bucket {}",
                    self.bucket
                )));
            }
            self.visited.push(next);
            self.emit_entry(self.node_addr, Some(value_addr));
            self.chain = next;
            if self.chain == 0 {
                // Tail reached: the empty chain is the move-on signal.
                self.bucket += 1;
            }
            return Ok(());
        }

        self.advance_to_used_bucket()?;
        if self.done {
            return Ok(());
        }
        let node_addr = self.bucket_entry(self.bucket)?;

        match self.mode {
            WalkMode::Single => {
                self.emit_entry(node_addr, Some(node_addr + self.node.value_offset));
                self.bucket += 1;
            }
            WalkMode::KeysOnly => {
                self.emit_entry(node_addr, None);
                self.bucket += 1;
            }
            WalkMode::Multi => {
                let chain = self.mem.read_ptr(node_addr + self.node.value_offset)?;
                if chain == 0 {
                    // A used bucket always carries at least one value.
                    return Err(DecodeError::MalformedLayout(format!(
                        "bucket {} is used but its chain is empty",
                        self.bucket
                    )));
                }
                self.node_addr = node_addr;
                self.chain = chain;
                self.visited.clear();
                self.visited.push(chain);
                // The first chained value is emitted by the next step.
            }
        }
        Ok(())
    }
}

impl Iterator for HashCursor<'_>
{
    type Item = Child;

    fn next(&mut self) -> Option<Child>
    {
        loop {
            if let Some(child) = self.queue.pop_front() {
                return Some(child);
            }
            if self.done {
                return None;
            }
            if let Err(err) = self.step() {
                warn!(%err, "hash walk stopped early");
                self.done = true;
                return None;
            }
        }
    }
}

fn container_display(base: &str, args: &[&TypeDesc], size: u64) -> String
{
    let args = args.iter().map(|ty| ty.name.as_str()).collect::<Vec<_>>().join(", ");
    format!("{base}<{args}> (size = {size})")
}

/// `QHash<K, V>` decoder: one value per key.
pub struct QHashDecoder;

impl Decoder for QHashDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        let (Some(key_ty), Some(value_ty)) = (value.ty.arg(0), value.ty.arg(1)) else {
            warn!(ty = %value.ty.name, "QHash without resolved key/value types");
            return Rendered::display(format!("{} (unknown element types)", value.ty.name));
        };

        let header = match load_header(ctx.mem, value.addr) {
            Ok(Some(header)) => header,
            Ok(None) => {
                let display = container_display("QHash", &[key_ty, value_ty], 0);
                return Rendered::with_children(display, 0, Box::new(std::iter::empty()));
            }
            Err(err) => {
                warn!(addr = format_args!("{:#x}", value.addr), %err, "QHash header unreadable");
                return Rendered::display(format!("{} (unreadable)", value.ty.name));
            }
        };

        let display = container_display("QHash", &[key_ty, value_ty], header.size);
        let node = node_layout(key_ty, value_ty);
        let cursor = HashCursor::new(
            ctx.mem,
            header,
            WalkMode::Single,
            key_ty.clone(),
            Some(value_ty.clone()),
            node,
            0,
            header.size,
        );
        // Keys and values are flattened into the child stream.
        Rendered::with_children(display, (header.size * 2) as usize, Box::new(cursor))
    }
}

/// `QMultiHash<K, V>` decoder: chained values per key.
///
/// The handle carries the hash pointer plus a separate flattened value
/// count; the chain walk is bounded by that count.
pub struct QMultiHashDecoder;

impl Decoder for QMultiHashDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        let (Some(key_ty), Some(value_ty)) = (value.ty.arg(0), value.ty.arg(1)) else {
            warn!(ty = %value.ty.name, "QMultiHash without resolved key/value types");
            return Rendered::display(format!("{} (unknown element types)", value.ty.name));
        };

        let total = match ctx.mem.read_i64(value.addr + MULTI_SIZE) {
            Ok(total) => total.max(0) as u64,
            Err(err) => {
                warn!(addr = format_args!("{:#x}", value.addr), %err, "QMultiHash size unreadable");
                return Rendered::display(format!("{} (unreadable)", value.ty.name));
            }
        };

        let header = match load_header(ctx.mem, value.addr) {
            Ok(Some(header)) => header,
            Ok(None) => {
                let display = container_display("QMultiHash", &[key_ty, value_ty], 0);
                return Rendered::with_children(display, 0, Box::new(std::iter::empty()));
            }
            Err(err) => {
                warn!(addr = format_args!("{:#x}", value.addr), %err, "QMultiHash header unreadable");
                return Rendered::display(format!("{} (unreadable)", value.ty.name));
            }
        };

        let ptr_width = ctx.mem.pointer_width() as u64;
        let display = container_display("QMultiHash", &[key_ty, value_ty], total);
        let node = multi_node_layout(key_ty, ptr_width);
        let cursor = HashCursor::new(
            ctx.mem,
            header,
            WalkMode::Multi,
            key_ty.clone(),
            Some(value_ty.clone()),
            node,
            chain_next_offset(value_ty, ptr_width),
            total,
        );
        Rendered::with_children(display, (total * 2) as usize, Box::new(cursor))
    }
}

/// `QSet<T>` decoder: exactly a hash table over keys with no attached
/// values, so the children are the hash walk's keys renumbered 0..n-1.
pub struct QSetDecoder;

impl Decoder for QSetDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        let Some(key_ty) = value.ty.arg(0) else {
            warn!(ty = %value.ty.name, "QSet without a resolved key type");
            return Rendered::display(format!("{} (unknown element type)", value.ty.name));
        };

        let header = match load_header(ctx.mem, value.addr) {
            Ok(Some(header)) => header,
            Ok(None) => {
                let display = container_display("QSet", &[key_ty], 0);
                return Rendered::with_children(display, 0, Box::new(std::iter::empty()));
            }
            Err(err) => {
                warn!(addr = format_args!("{:#x}", value.addr), %err, "QSet header unreadable");
                return Rendered::display(format!("{} (unreadable)", value.ty.name));
            }
        };

        let display = container_display("QSet", &[key_ty], header.size);
        let node = key_only_layout(key_ty);
        let cursor = HashCursor::new(
            ctx.mem,
            header,
            WalkMode::KeysOnly,
            key_ty.clone(),
            None,
            node,
            0,
            header.size,
        );
        Rendered::with_children(display, header.size as usize, Box::new(cursor))
    }
}
