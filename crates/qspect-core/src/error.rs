//! # Error Types
//!
//! Error handling for decode operations.
//!
//! We use `thiserror` to generate `Error` trait implementations and messages.
//!
//! Nothing here is fatal to the inspection host: every public decode entry
//! point catches these errors and degrades to a placeholder string, because
//! the inspected process must never be destabilized by a failed decode. The
//! taxonomy exists so decoders can pick the right fallback:
//!
//! 1. **`UnknownType`**: no catalogue entry matches; the host falls back to
//!    its own default rendering.
//! 2. **`InvalidEncoding`**: a discriminant or sentinel maps to no known
//!    case; rendered as an inline error token.
//! 3. **`MalformedLayout`**: a structural invariant the walk depends on is
//!    violated; logged, and the decode returns a best-effort string.
//! 4. **`UnreadableMemory`**: the memory facade cannot satisfy a read; each
//!    decoder degrades to a narrower fallback.

use thiserror::Error;

/// Main error type for decode operations
///
/// Each variant corresponds to a recoverable condition; see the module docs
/// for which fallback applies to which variant.
#[derive(Error, Debug)]
pub enum DecodeError
{
    /// No decoder is registered for the declared type name
    ///
    /// This is an expected outcome, not a failure: the catalogue only covers
    /// a fixed set of Qt6 types, and the host renders everything else with
    /// its own generic formatter.
    #[error("No decoder registered for type '{0}'")]
    UnknownType(String),

    /// A discriminant or sentinel value maps to no known case
    ///
    /// Example: a time-spec field outside the four known values. The decode
    /// still succeeds; the offending field renders as an error token.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// A structural invariant the decoding algorithm depends on is violated
    ///
    /// Example: a hash bucket found "used" whose span slot holds the unused
    /// sentinel. This indicates either memory corruption in the inspected
    /// process or a layout mismatch against the Qt version being decoded.
    #[error("Malformed layout: {0}")]
    MalformedLayout(String),

    /// The memory facade could not satisfy a read
    ///
    /// Bad address, freed memory, or a read past the end of a frozen
    /// snapshot image all land here.
    #[error("Unreadable memory at {addr:#x} ({len} bytes)")]
    UnreadableMemory
    {
        /// Address of the failed read
        addr: u64,
        /// Number of bytes requested
        len: usize,
    },
}

/// Convenience type alias for `Result<T, DecodeError>`
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
