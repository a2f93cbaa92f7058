//! Convenient re-exports for common usage patterns.
//!
//! This module provides a single import to bring all commonly used types
//! into scope.
//!
//! # Example
//!
//! ```ignore
//! use wit_boundary::prelude::*;
//!
//! let mut registry = SignatureRegistry::new();
//! registry.register(Signature::new("add").param("a", Type::U32).param("b", Type::U32).result(Type::U32));
//! let adapter = Adapter::new(registry);
//! ```

// Unified error handling
pub use crate::error::{Error, Result};

// ABI types
pub use crate::abi::{
    CoreType, CoreValue, DecodeError, EnumType, Field, FlagsType, GuestMemory, Lifter,
    LinearMemory, Lowerer, RecordType, ResultType, Type, UnknownBits, Value, VariantType,
};

// Call adapter types
pub use crate::adapter::{
    Adapter, AdapterError, FlatteningPlan, HostFunc, Signature, SignatureRegistry,
};
