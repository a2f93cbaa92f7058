//! Flattening plans: how a signature maps onto the core calling
//! convention.
//!
//! A plan is a pure function of a signature, derived once and never
//! mutated mid-call. Each parameter contributes a statically known
//! number of core scalar slots; when the summed count exceeds the
//! canonical ABI register budget, the whole argument list spills into a
//! guest-allocated argument area reached through a single pointer.

use crate::abi::buffer::align_to;
use crate::abi::CoreType;

use super::signature::Signature;

/// Maximum core scalar slots for a flattened parameter list.
pub const MAX_FLAT_PARAMS: usize = 16;
/// Maximum core scalar slots for a flattened result.
pub const MAX_FLAT_RESULTS: usize = 1;

/// How the parameter list travels across the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamsPassing {
    /// Every parameter arrives as its own core scalar sequence, in
    /// declaration order.
    Direct(Vec<Vec<CoreType>>),
    /// The whole list spills: one i32 pointer to a record-style argument
    /// area with each parameter at a naturally aligned running offset.
    Indirect {
        offsets: Vec<u32>,
        size: u32,
        align: u32,
    },
}

/// How the result travels back.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPassing {
    /// No declared result.
    None,
    /// Returned inline as core scalars (at most [`MAX_FLAT_RESULTS`]).
    Direct(Vec<CoreType>),
    /// Written into a caller-provided return area whose pointer arrives
    /// as the final core argument; the adapter returns that pointer.
    Indirect { size: u32, align: u32 },
}

/// The derived flattening of one signature.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatteningPlan {
    pub params: ParamsPassing,
    pub result: ResultPassing,
    /// Total core arguments the caller must supply, including a spilled
    /// argument-area pointer and/or a return-area pointer.
    pub core_param_count: usize,
}

impl FlatteningPlan {
    /// Build the plan for a signature. Pure and deterministic; safe to
    /// cache keyed by the signature it was built from.
    pub fn build(signature: &Signature) -> Self {
        let per_param: Vec<Vec<CoreType>> = signature
            .params
            .iter()
            .map(|p| p.ty.flat_types())
            .collect();
        let total: usize = per_param.iter().map(Vec::len).sum();

        let params = if total <= MAX_FLAT_PARAMS {
            ParamsPassing::Direct(per_param)
        } else {
            ParamsPassing::Indirect {
                offsets: argument_area_offsets(signature),
                size: argument_area_size(signature),
                align: argument_area_align(signature),
            }
        };

        let result = match &signature.result {
            None => ResultPassing::None,
            Some(ty) => {
                let flats = ty.flat_types();
                if flats.len() <= MAX_FLAT_RESULTS {
                    ResultPassing::Direct(flats)
                } else {
                    ResultPassing::Indirect {
                        size: ty.byte_size(),
                        align: ty.alignment(),
                    }
                }
            }
        };

        let mut core_param_count = match &params {
            ParamsPassing::Direct(_) => total,
            ParamsPassing::Indirect { .. } => 1,
        };
        if matches!(result, ResultPassing::Indirect { .. }) {
            core_param_count += 1;
        }

        FlatteningPlan {
            params,
            result,
            core_param_count,
        }
    }
}

fn argument_area_offsets(signature: &Signature) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(signature.params.len());
    let mut cursor = 0u32;
    for param in &signature.params {
        let offset = align_to(cursor, param.ty.alignment());
        offsets.push(offset);
        cursor = offset + param.ty.byte_size();
    }
    offsets
}

fn argument_area_align(signature: &Signature) -> u32 {
    signature
        .params
        .iter()
        .map(|p| p.ty.alignment())
        .max()
        .unwrap_or(1)
}

fn argument_area_size(signature: &Signature) -> u32 {
    let end = argument_area_offsets(signature)
        .last()
        .copied()
        .zip(signature.params.last())
        .map(|(off, p)| off + p.ty.byte_size())
        .unwrap_or(0);
    align_to(end, argument_area_align(signature))
}
