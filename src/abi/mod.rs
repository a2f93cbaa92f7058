//! Canonical ABI decoding, validation, and lowering.
//!
//! This module is the value-marshalling half of the boundary layer: it
//! converts between logical interface-typed values and their canonical
//! ABI representation (core scalars and guest linear memory bytes),
//! validating every untrusted bit pattern on the way in.
//!
//! # Module Organization
//!
//! - [`error`]: Error taxonomy for boundary failures
//! - [`types`]: Logical types and their layout/core representation
//! - [`value`]: Decoded host-side values
//! - [`memory`]: Guest linear memory collaborator
//! - [`buffer`]: Low-level checked buffer helpers
//! - [`lift`]: Decoding and validation of guest values
//! - [`lower`]: Lowering host values back to the guest

pub mod buffer;
mod error;
mod lift;
mod lower;
mod memory;
mod types;
mod value;

pub use error::DecodeError;
pub use lift::{CoreSlots, Lifter, UnknownBits};
pub use lower::Lowerer;
pub use memory::{GuestMemory, LinearMemory};
pub use types::{
    Case, CoreType, CoreValue, DiscriminantSize, EnumType, Field, FlagsRepr, FlagsType,
    RecordType, ResultType, Type, VariantType,
};
pub use value::Value;
