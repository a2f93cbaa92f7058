//! Unified error type for the wit-boundary library.

use thiserror::Error;

use crate::abi::DecodeError;
use crate::adapter::AdapterError;

/// Unified error type for all boundary-layer operations.
///
/// Wraps the module-specific error types so callers can use a single
/// error type throughout their embedding.
///
/// # Example
///
/// ```ignore
/// use wit_boundary::{Adapter, Result};
///
/// fn call(adapter: &Adapter) -> Result<()> {
///     adapter.invoke("ping", &mut host, &args, &mut memory)?;
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Error from canonical ABI decoding or lowering.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Error from the call adapter (including host application errors).
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// A [`Result`] type alias using the unified [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns `true` if this is a boundary error: a contract violation
    /// by the guest or malformed memory, as opposed to the host
    /// implementation's own application-level failure.
    pub fn is_boundary(&self) -> bool {
        match self {
            Error::Decode(_) => true,
            Error::Adapter(e) => e.is_boundary(),
        }
    }

    /// Returns `true` if this is an application error raised by the host
    /// implementation itself.
    pub fn is_application(&self) -> bool {
        !self.is_boundary()
    }
}
