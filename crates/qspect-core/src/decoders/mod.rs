//! # Decoders
//!
//! Per-type decoding strategies for the Qt6 catalogue.
//!
//! Each decoder knows the private, version-specific layout of exactly one
//! type (or one templated family) and walks it with exact field order and
//! bit widths. None of them ever fails hard: a broken walk degrades to a
//! placeholder token and a `tracing` event, because the host must always get
//! *some* string back.
//!
//! Decoders re-enter the catalogue for nested values (a set wraps the hash
//! walk, the URL decoder reads seven strings, the variant decoder
//! re-dispatches on a runtime type name), so every decode call carries a
//! [`DecodeContext`] bundling the memory facade with the catalogue that
//! dispatched it.

pub mod datetime;
pub mod hash;
pub mod list;
pub mod map;
pub mod model;
pub mod text;
pub mod url;
pub mod variant;

use crate::catalogue::Catalogue;
use crate::memory::{MemoryAccess, TypedRef};
use crate::render::Rendered;

/// Everything a decoder needs for one decode call
///
/// Cheap to copy; both references outlive the call and any lazy child
/// sequence it returns.
#[derive(Clone, Copy)]
pub struct DecodeContext<'m>
{
    /// Read access to the frozen inspected process
    pub mem: &'m dyn MemoryAccess,
    /// The catalogue that dispatched this call, for nested re-dispatch
    pub catalogue: &'m Catalogue,
}

/// One decoding strategy
///
/// Implementations are stateless; all per-call state lives in the returned
/// [`Rendered`] (and its lazy child cursor, if any).
pub trait Decoder: Send + Sync
{
    /// Decode the value behind `value` into a display string and children.
    ///
    /// Must not panic and must not return an error: every failure mode
    /// degrades to a placeholder display string.
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>;
}
