//! Error types for canonical ABI boundary operations.

use thiserror::Error;

/// Errors raised while decoding (lifting) guest values or lowering host
/// values at the canonical ABI boundary.
///
/// Every variant carries the offending logical type name and the raw
/// value/range needed to reproduce the failure in a test. Decoding is
/// all-or-nothing per value: a nested failure anywhere inside a list or
/// record aborts the decode of the containing value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// A discriminant (bool, enum, variant tag, or an unknown flag bit
    /// under the rejecting policy) outside the declared case set.
    #[error("invalid discriminant {discriminant} for {ty} with {num_cases} cases")]
    InvalidDiscriminant {
        ty: String,
        discriminant: u32,
        num_cases: usize,
    },

    /// An integer carried in a wider core slot that does not fit the
    /// declared narrow width.
    #[error("value {value} out of range for {ty}: must be between {min} and {max}")]
    OutOfRange {
        ty: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A 32-bit value that is not a valid Unicode scalar value.
    #[error("{0:#x} is not a valid char")]
    InvalidChar(u32),

    /// An address/length pair that exceeds the guest memory's current
    /// size. Always fatal to the call; nothing is partially read.
    #[error("memory access at {addr} with length {len} exceeds memory size {memory_size}")]
    MemoryOutOfBounds {
        addr: u32,
        len: u32,
        memory_size: usize,
    },

    /// A guest string whose bytes are not valid UTF-8.
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,

    /// A host-produced value whose shape does not match the declared
    /// result type, or a core slot of the wrong kind.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// A staging buffer too small for the requested access. Internal
    /// guard when lowering into caller-provided regions.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

impl DecodeError {
    /// Shorthand for a [`DecodeError::TypeMismatch`].
    pub fn type_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}
