//! Argument flattening and the host call adapter.
//!
//! # Module Organization
//!
//! - [`signature`]: Function signatures and the read-only registry
//! - [`plan`]: Flattening plans and the register-spill policy
//! - [`invoke`]: The adapter itself, host dispatch, adapter errors

mod invoke;
mod plan;
mod signature;

pub use invoke::{Adapter, AdapterError, HostFunc};
pub use plan::{FlatteningPlan, ParamsPassing, ResultPassing, MAX_FLAT_PARAMS, MAX_FLAT_RESULTS};
pub use signature::{Param, Signature, SignatureRegistry};
