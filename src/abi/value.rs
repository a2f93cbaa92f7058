//! Host-side decoded values.
//!
//! A [`Value`] is owned by the call that produced it and never aliases
//! guest memory: strings, lists, and records are copied out during
//! decoding, so the guest may free or mutate its memory after the call
//! returns without affecting the host's view.

/// An in-host representation of a logical type instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    S8(i8),
    U8(u8),
    S16(i16),
    U16(u16),
    S32(i32),
    U32(u32),
    S64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    String(String),
    /// The name of the selected enum case.
    Enum(String),
    /// The names of the set bits, in declaration order.
    Flags(Vec<String>),
    List(Vec<Value>),
    /// Field name/value pairs in declaration order.
    Record(Vec<(String, Value)>),
    Variant {
        case: String,
        payload: Option<Box<Value>>,
    },
    Result(Result<Option<Box<Value>>, Option<Box<Value>>>),
}

impl Value {
    /// Short kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::S8(_) => "s8",
            Value::U8(_) => "u8",
            Value::S16(_) => "s16",
            Value::U16(_) => "u16",
            Value::S32(_) => "s32",
            Value::U32(_) => "u32",
            Value::S64(_) => "s64",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Enum(_) => "enum",
            Value::Flags(_) => "flags",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Variant { .. } => "variant",
            Value::Result(_) => "result",
        }
    }

    /// Build a record value from name/value pairs.
    pub fn record(fields: impl IntoIterator<Item = (impl Into<String>, Value)>) -> Self {
        Value::Record(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    /// Build a flags value from set-bit names.
    pub fn flags(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Value::Flags(names.into_iter().map(Into::into).collect())
    }

    /// Build a variant value.
    pub fn variant(case: impl Into<String>, payload: Option<Value>) -> Self {
        Value::Variant {
            case: case.into(),
            payload: payload.map(Box::new),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
