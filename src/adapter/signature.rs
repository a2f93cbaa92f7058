//! Function signatures and the read-only signature registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::abi::Type;

/// A named, typed parameter position.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// The logical signature of a host-exposed function: ordered parameter
/// types and an optional result type.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Param>,
    pub result: Option<Type>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            result: None,
        }
    }

    /// Append a parameter, preserving declaration order.
    pub fn param(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn result(mut self, ty: Type) -> Self {
        self.result = Some(ty);
        self
    }
}

/// Supplies the signature for each exported function name. Populated at
/// setup time, read-only at call time.
#[derive(Debug, Default, Clone)]
pub struct SignatureRegistry {
    by_name: HashMap<String, Arc<Signature>>,
}

impl SignatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signature under its own function name.
    pub fn register(&mut self, signature: Signature) {
        self.by_name
            .insert(signature.name.clone(), Arc::new(signature));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Signature>> {
        self.by_name.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl FromIterator<Signature> for SignatureRegistry {
    fn from_iter<I: IntoIterator<Item = Signature>>(iter: I) -> Self {
        let mut registry = Self::new();
        for signature in iter {
            registry.register(signature);
        }
        registry
    }
}
