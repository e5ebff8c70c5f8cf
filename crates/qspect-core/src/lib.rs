//! # qspect-core
//!
//! Version-exact decoders for Qt6's private in-memory value representations.
//!
//! An inspection host (a debugger holding a process frozen) hands this crate
//! a typed address and raw memory access; the crate hands back a display
//! string and, for containers, a lazy sequence of labelled child references.
//! The host needs no semantic knowledge of Qt at all — every layout detail
//! (span-indexed hash tables, tagged short/long temporal cells, packed
//! runtime type tags, flat private structs) is encoded by hand in here, per
//! type and per rendering version.
//!
//! ## Guarantees
//!
//! - Inspected memory is only ever read, never written or retained.
//! - No decode call fails hard: broken layouts and unreadable memory
//!   degrade to placeholder tokens plus `tracing` events, because the
//!   inspected process must never be destabilized by an inspection failure.
//! - Decoding is idempotent over frozen memory: the same reference decodes
//!   to the same output every time.
//!
//! ## Entry point
//!
//! Build a [`Catalogue`] (one per session), then feed it [`TypedRef`]s:
//!
//! ```rust
//! use qspect_core::{Catalogue, SnapshotMemory, TypeDesc, TypedRef};
//!
//! let mut image = SnapshotMemory::with_capacity(0x1000, 16);
//! image.poke_i64(0x1000, 2_440_588); // a QDate holding 1970-01-01
//!
//! let catalogue = Catalogue::qt6();
//! let value = TypedRef::new(0x1000, TypeDesc::new("QDate", 8, 8));
//! let rendered = catalogue.decode(&image, &value).unwrap();
//! assert_eq!(rendered.display, "1970-01-01");
//! ```

pub mod catalogue;
pub mod decoders;
pub mod error;
pub mod memory;
pub mod render;

pub use catalogue::{Catalogue, MatchRule};
pub use decoders::{DecodeContext, Decoder};
pub use error::{DecodeError, DecodeResult};
pub use memory::{MemoryAccess, SnapshotMemory, TypeDesc, TypedRef};
pub use render::{Child, DisplayHint, Rendered};
