//! Host-side canonical ABI boundary layer.
//!
//! This library is the seam between a WebAssembly guest and
//! host-implemented functions under the component model's canonical ABI.
//! It decodes and strictly validates the values a guest passes across
//! the boundary (attacker-controllable bit patterns from registers or
//! linear memory), flattens logical argument lists into the core-Wasm
//! calling convention, and lowers host results back.
//!
//! # Quick Start
//!
//! ```ignore
//! use wit_boundary::prelude::*;
//!
//! // Describe the exported function
//! let mut registry = SignatureRegistry::new();
//! registry.register(
//!     Signature::new("add")
//!         .param("a", Type::U32)
//!         .param("b", Type::U32)
//!         .result(Type::U64),
//! );
//!
//! // Adapt a call: core args in, validated values to the host, core results out
//! let adapter = Adapter::new(registry);
//! let mut host = |args: Vec<Value>| -> anyhow::Result<Option<Value>> {
//!     let (Value::U32(a), Value::U32(b)) = (&args[0], &args[1]) else { unreachable!() };
//!     Ok(Some(Value::U64(*a as u64 + *b as u64)))
//! };
//! let results = adapter.invoke(
//!     "add",
//!     &mut host,
//!     &[CoreValue::I32(1), CoreValue::I32(2)],
//!     &mut LinearMemory::new(),
//! )?;
//! ```
//!
//! # Modules
//!
//! - [`abi`] - Canonical ABI decoding, validation, and lowering
//! - [`adapter`] - Argument flattening and the host call adapter
//!
//! # Feature Flags
//!
//! - `logging` - Enable library-level tracing (consumers provide their
//!   own subscriber)

pub mod abi;
pub mod adapter;
mod error;
mod logging;
pub mod prelude;

// Re-export the unified error type
pub use error::{Error, Result};

// Re-export ABI types at crate root for convenience
pub use abi::{
    CoreType, CoreValue, DecodeError, GuestMemory, Lifter, LinearMemory, Lowerer, Type,
    UnknownBits, Value,
};

// Re-export adapter types at crate root for convenience
pub use adapter::{Adapter, AdapterError, FlatteningPlan, HostFunc, Signature, SignatureRegistry};
