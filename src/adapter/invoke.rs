//! The call adapter: un-flatten core arguments, dispatch, lower results.
//!
//! One guest-to-host call is fully decoded, dispatched, and its result
//! fully lowered before [`Adapter::invoke`] returns; there is no
//! suspension point inside. Concurrent calls share nothing mutable here
//! except the plan cache, which is lock-guarded and effectively
//! write-once per signature.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::abi::{
    CoreSlots, CoreValue, DecodeError, GuestMemory, Lifter, Lowerer, UnknownBits, Value,
};
use crate::logging::{debug, trace};

use super::plan::{FlatteningPlan, ParamsPassing, ResultPassing};
use super::signature::{Signature, SignatureRegistry};

/// A host-implemented function, typed in decoded values.
///
/// One implementation per exported function; a flat capability set, no
/// hierarchy. The adapter only ever calls this with fully validated
/// arguments. An `Err` is an application-level failure, opaque to the
/// boundary layer and reported distinctly from decode errors.
pub trait HostFunc {
    fn call(&mut self, args: Vec<Value>) -> anyhow::Result<Option<Value>>;
}

impl<F> HostFunc for F
where
    F: FnMut(Vec<Value>) -> anyhow::Result<Option<Value>>,
{
    fn call(&mut self, args: Vec<Value>) -> anyhow::Result<Option<Value>> {
        self(args)
    }
}

/// Errors surfaced by [`Adapter::invoke`].
///
/// Boundary errors (everything except [`Application`]) indicate a
/// contract violation by the guest or malformed memory; they are
/// deterministic for the same bytes and never retried.
///
/// [`Application`]: AdapterError::Application
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("no signature registered for function '{0}'")]
    UnknownFunction(String),

    #[error("core argument count mismatch for '{func}': expected {expected}, got {got}")]
    ArityMismatch {
        func: String,
        expected: usize,
        got: usize,
    },

    /// Parameter `index` (0-based, declaration order) failed to decode.
    /// The host implementation was not invoked.
    #[error("parameter {index} ('{name}') failed to decode")]
    Parameter {
        index: usize,
        name: String,
        #[source]
        source: DecodeError,
    },

    /// The host-produced result did not lower against the declared type.
    #[error("result failed to lower")]
    Result(#[source] DecodeError),

    /// The host implementation's own failure, propagated as-is.
    #[error("host implementation failed")]
    Application(#[source] anyhow::Error),
}

impl AdapterError {
    /// Whether this is a boundary error (as opposed to an application
    /// error raised by the host implementation itself).
    pub fn is_boundary(&self) -> bool {
        !matches!(self, AdapterError::Application(_))
    }
}

/// Drives decoding, dispatch, and lowering for host-exposed functions.
///
/// Owns the signature registry and a lazily built plan cache. Safe to
/// share across threads driving independent guest instances; plans are
/// immutable once published and a losing racer simply discards its
/// freshly computed copy.
pub struct Adapter {
    registry: SignatureRegistry,
    plans: RwLock<HashMap<String, Arc<FlatteningPlan>>>,
    unknown_bits: UnknownBits,
}

impl Adapter {
    pub fn new(registry: SignatureRegistry) -> Self {
        Self {
            registry,
            plans: RwLock::new(HashMap::new()),
            unknown_bits: UnknownBits::default(),
        }
    }

    /// Set the fixed policy for unknown flag bits used by every decode
    /// this adapter performs.
    pub fn with_unknown_bits(mut self, policy: UnknownBits) -> Self {
        self.unknown_bits = policy;
        self
    }

    /// The flattening plan for a registered function, building and
    /// caching it on first use.
    pub fn plan(&self, func: &str) -> Result<Arc<FlatteningPlan>, AdapterError> {
        if let Some(plan) = read_lock(&self.plans).get(func) {
            return Ok(Arc::clone(plan));
        }
        let signature = self
            .registry
            .get(func)
            .ok_or_else(|| AdapterError::UnknownFunction(func.to_string()))?;
        let plan = Arc::new(FlatteningPlan::build(&signature));
        trace!(func, core_params = plan.core_param_count, "built flattening plan");
        let mut plans = write_lock(&self.plans);
        // Another thread may have inserted meanwhile; keep the winner.
        Ok(Arc::clone(
            plans
                .entry(func.to_string())
                .or_insert(plan),
        ))
    }

    /// Adapt one call: decode and validate every parameter, dispatch to
    /// the host implementation, lower the result.
    ///
    /// If any parameter fails to decode the host implementation is never
    /// invoked and the error identifies the failing parameter.
    pub fn invoke<M: GuestMemory>(
        &self,
        func: &str,
        host: &mut dyn HostFunc,
        core_args: &[CoreValue],
        memory: &mut M,
    ) -> Result<Vec<CoreValue>, AdapterError> {
        let signature = self
            .registry
            .get(func)
            .ok_or_else(|| AdapterError::UnknownFunction(func.to_string()))?;
        let plan = self.plan(func)?;

        if core_args.len() != plan.core_param_count {
            return Err(AdapterError::ArityMismatch {
                func: func.to_string(),
                expected: plan.core_param_count,
                got: core_args.len(),
            });
        }

        let args = self.decode_params(&signature, &plan, core_args, &*memory)?;
        debug!(func, args = args.len(), "dispatching to host implementation");
        let result = host.call(args).map_err(AdapterError::Application)?;
        lower_result(&signature, &plan, result, core_args, memory)
    }

    /// Un-flatten the core arguments into logical positions, decoding
    /// each in declaration order.
    fn decode_params<M: GuestMemory>(
        &self,
        signature: &Signature,
        plan: &FlatteningPlan,
        core_args: &[CoreValue],
        memory: &M,
    ) -> Result<Vec<Value>, AdapterError> {
        let lifter = Lifter::new(memory).with_unknown_bits(self.unknown_bits);
        let mut args = Vec::with_capacity(signature.params.len());

        match &plan.params {
            ParamsPassing::Direct(seqs) => {
                let n: usize = seqs.iter().map(Vec::len).sum();
                let param_args =
                    core_args
                        .get(..n)
                        .ok_or_else(|| AdapterError::ArityMismatch {
                            func: signature.name.clone(),
                            expected: plan.core_param_count,
                            got: core_args.len(),
                        })?;
                let mut slots = CoreSlots::new(param_args);
                for (index, param) in signature.params.iter().enumerate() {
                    let value = lifter.lift_core(&param.ty, &mut slots).map_err(|source| {
                        AdapterError::Parameter {
                            index,
                            name: param.name.clone(),
                            source,
                        }
                    })?;
                    args.push(value);
                }
            }
            ParamsPassing::Indirect { offsets, .. } => {
                let base = match core_args.first() {
                    Some(CoreValue::I32(v)) => *v as u32,
                    other => {
                        return Err(AdapterError::Parameter {
                            index: 0,
                            name: "<argument area>".to_string(),
                            source: DecodeError::type_mismatch(
                                "i32 argument-area pointer",
                                format!("{other:?}"),
                            ),
                        });
                    }
                };
                for (index, (param, offset)) in
                    signature.params.iter().zip(offsets).enumerate()
                {
                    let value = lifter
                        .lift_memory(&param.ty, base + offset)
                        .map_err(|source| AdapterError::Parameter {
                            index,
                            name: param.name.clone(),
                            source,
                        })?;
                    args.push(value);
                }
            }
        }
        Ok(args)
    }
}

/// Lower the host-produced value per the plan and hand the core results
/// back to the guest.
fn lower_result<M: GuestMemory>(
    signature: &Signature,
    plan: &FlatteningPlan,
    result: Option<Value>,
    core_args: &[CoreValue],
    memory: &mut M,
) -> Result<Vec<CoreValue>, AdapterError> {
    match &plan.result {
        ResultPassing::None => match result {
            None => Ok(Vec::new()),
            Some(value) => Err(AdapterError::Result(DecodeError::type_mismatch(
                "no result",
                value.kind_name(),
            ))),
        },
        ResultPassing::Direct(_) | ResultPassing::Indirect { .. } => {
            let ty = signature.result.as_ref().ok_or_else(|| {
                AdapterError::Result(DecodeError::type_mismatch("declared result type", "none"))
            })?;
            let value = result.ok_or_else(|| {
                AdapterError::Result(DecodeError::type_mismatch(ty.kind_name(), "no value"))
            })?;
            let mut lowerer = Lowerer::new(memory);
            match &plan.result {
                ResultPassing::Direct(_) => {
                    let mut out = Vec::new();
                    lowerer
                        .lower_core(&value, ty, &mut out)
                        .map_err(AdapterError::Result)?;
                    Ok(out)
                }
                _ => {
                    let retptr = match core_args.last() {
                        Some(CoreValue::I32(v)) => *v as u32,
                        other => {
                            return Err(AdapterError::Result(DecodeError::type_mismatch(
                                "i32 return-area pointer",
                                format!("{other:?}"),
                            )));
                        }
                    };
                    lowerer
                        .lower_memory(&value, ty, retptr)
                        .map_err(AdapterError::Result)?;
                    Ok(vec![CoreValue::I32(retptr as i32)])
                }
            }
        }
    }
}

fn read_lock<'a, K, V>(lock: &'a RwLock<HashMap<K, V>>) -> RwLockReadGuard<'a, HashMap<K, V>> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock<'a, K, V>(lock: &'a RwLock<HashMap<K, V>>) -> RwLockWriteGuard<'a, HashMap<K, V>> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
