//! Logical interface types and their canonical ABI layout.
//!
//! [`Type`] is a closed, recursive sum type over the interface types the
//! boundary layer understands. Every type has a well-defined memory
//! layout (byte size and alignment, wasm32) plus a core representation:
//! the ordered sequence of core scalar kinds it flattens to at the call
//! boundary.

use super::buffer::align_to;

/// The four core-Wasm scalar kinds a value can flatten to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreType {
    I32,
    I64,
    F32,
    F64,
}

/// A value occupying one core scalar slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoreValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl CoreValue {
    /// The kind of slot this value occupies.
    pub fn core_type(&self) -> CoreType {
        match self {
            CoreValue::I32(_) => CoreType::I32,
            CoreValue::I64(_) => CoreType::I64,
            CoreValue::F32(_) => CoreType::F32,
            CoreValue::F64(_) => CoreType::F64,
        }
    }
}

/// Width of an enum/variant discriminant: the smallest unsigned integer
/// covering the case count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscriminantSize {
    U8,
    U16,
    U32,
}

impl DiscriminantSize {
    /// Discriminant width for a type with `num_cases` cases.
    pub fn from_count(num_cases: usize) -> Self {
        if num_cases <= 0x100 {
            DiscriminantSize::U8
        } else if num_cases <= 0x10000 {
            DiscriminantSize::U16
        } else {
            DiscriminantSize::U32
        }
    }

    pub fn byte_size(&self) -> u32 {
        match self {
            DiscriminantSize::U8 => 1,
            DiscriminantSize::U16 => 2,
            DiscriminantSize::U32 => 4,
        }
    }

    pub fn alignment(&self) -> u32 {
        self.byte_size()
    }
}

/// Backing integer width for a flags type: the smallest of 8/16/32/64
/// bits holding all declared flags. At most 64 named bits are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagsRepr {
    U8,
    U16,
    U32,
    U64,
}

impl FlagsRepr {
    pub fn from_count(num_flags: usize) -> Self {
        if num_flags <= 8 {
            FlagsRepr::U8
        } else if num_flags <= 16 {
            FlagsRepr::U16
        } else if num_flags <= 32 {
            FlagsRepr::U32
        } else {
            FlagsRepr::U64
        }
    }

    pub fn byte_size(&self) -> u32 {
        match self {
            FlagsRepr::U8 => 1,
            FlagsRepr::U16 => 2,
            FlagsRepr::U32 => 4,
            FlagsRepr::U64 => 8,
        }
    }

    pub fn alignment(&self) -> u32 {
        self.byte_size()
    }

    pub fn core_type(&self) -> CoreType {
        match self {
            FlagsRepr::U64 => CoreType::I64,
            _ => CoreType::I32,
        }
    }
}

/// An enumeration: ordered named cases, discriminant = case index.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub cases: Vec<String>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, cases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            cases: cases.into_iter().map(Into::into).collect(),
        }
    }

    pub fn tag(&self) -> DiscriminantSize {
        DiscriminantSize::from_count(self.cases.len())
    }
}

/// A bit-flags type: named bits backed by [`FlagsRepr`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlagsType {
    pub name: String,
    pub flags: Vec<String>,
}

impl FlagsType {
    /// Build a flags type. Signatures are host-authored, so exceeding
    /// the 64-bit backing limit is a programming error, not guest input.
    ///
    /// # Panics
    ///
    /// Panics if more than 64 flags are declared.
    pub fn new(name: impl Into<String>, flags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let name = name.into();
        let flags: Vec<String> = flags.into_iter().map(Into::into).collect();
        assert!(
            flags.len() <= 64,
            "flags type '{name}' declares more than 64 flags"
        );
        Self { name, flags }
    }

    pub fn repr(&self) -> FlagsRepr {
        FlagsRepr::from_count(self.flags.len())
    }

    /// Bit mask covering every declared flag.
    pub fn known_mask(&self) -> u64 {
        if self.flags.len() >= 64 {
            u64::MAX
        } else {
            (1u64 << self.flags.len()) - 1
        }
    }
}

/// A named, typed record field, optionally pinned to an explicit byte
/// offset. Explicit offsets may be irregular (unaligned) on purpose;
/// the decoder reads fields at declared offsets, never at recomputed
/// natural ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub offset: Option<u32>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            offset: None,
        }
    }

    pub fn at_offset(name: impl Into<String>, ty: Type, offset: u32) -> Self {
        Self {
            name: name.into(),
            ty,
            offset: Some(offset),
        }
    }
}

/// A record: ordered sequence of named, typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<Field>,
}

impl RecordType {
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = Field>) -> Self {
        Self {
            name: name.into(),
            fields: fields.into_iter().collect(),
        }
    }

    /// Byte offset of each field. Fields with an explicit offset use it
    /// verbatim; the rest are placed at naturally aligned running
    /// offsets after the previous field.
    pub fn field_offsets(&self) -> Vec<u32> {
        let mut offsets = Vec::with_capacity(self.fields.len());
        let mut cursor = 0u32;
        for field in &self.fields {
            let offset = field
                .offset
                .unwrap_or_else(|| align_to(cursor, field.ty.alignment()));
            offsets.push(offset);
            cursor = offset + field.ty.byte_size();
        }
        offsets
    }

    pub fn alignment(&self) -> u32 {
        self.fields
            .iter()
            .map(|f| f.ty.alignment())
            .max()
            .unwrap_or(1)
    }

    pub fn byte_size(&self) -> u32 {
        let end = self
            .field_offsets()
            .iter()
            .zip(&self.fields)
            .map(|(off, f)| off + f.ty.byte_size())
            .max()
            .unwrap_or(0);
        align_to(end, self.alignment())
    }
}

/// One case of a variant, with an optional payload type.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub name: String,
    pub ty: Option<Type>,
}

impl Case {
    pub fn new(name: impl Into<String>, ty: Option<Type>) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A variant: tagged union of named cases.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantType {
    pub name: String,
    pub cases: Vec<Case>,
}

impl VariantType {
    pub fn new(name: impl Into<String>, cases: impl IntoIterator<Item = Case>) -> Self {
        Self {
            name: name.into(),
            cases: cases.into_iter().collect(),
        }
    }

    pub fn tag(&self) -> DiscriminantSize {
        DiscriminantSize::from_count(self.cases.len())
    }

    fn payload_types(&self) -> impl Iterator<Item = &Type> {
        self.cases.iter().filter_map(|c| c.ty.as_ref())
    }

    pub fn payload_alignment(&self) -> u32 {
        self.payload_types().map(Type::alignment).max().unwrap_or(1)
    }

    /// Offset of the payload area relative to the start of the variant.
    pub fn payload_offset(&self) -> u32 {
        align_to(self.tag().byte_size(), self.payload_alignment())
    }

    pub fn alignment(&self) -> u32 {
        self.tag().alignment().max(self.payload_alignment())
    }

    pub fn byte_size(&self) -> u32 {
        let payload = self.payload_types().map(Type::byte_size).max().unwrap_or(0);
        align_to(self.payload_offset() + payload, self.alignment())
    }

    /// Joined core representation of the payload area, shared by all
    /// cases per the canonical ABI join rule.
    pub fn payload_flat_types(&self) -> Vec<CoreType> {
        join_flat_types(self.payload_types())
    }
}

/// A result type: ok/err union with optional payloads on either side.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultType {
    pub ok: Option<Box<Type>>,
    pub err: Option<Box<Type>>,
}

impl ResultType {
    pub fn new(ok: Option<Type>, err: Option<Type>) -> Self {
        Self {
            ok: ok.map(Box::new),
            err: err.map(Box::new),
        }
    }

    fn payload_types(&self) -> impl Iterator<Item = &Type> {
        self.ok
            .as_deref()
            .into_iter()
            .chain(self.err.as_deref())
    }

    pub fn payload_alignment(&self) -> u32 {
        self.payload_types().map(Type::alignment).max().unwrap_or(1)
    }

    /// Discriminant is a single byte (two cases).
    pub fn payload_offset(&self) -> u32 {
        align_to(1, self.payload_alignment())
    }

    pub fn alignment(&self) -> u32 {
        self.payload_alignment()
    }

    pub fn byte_size(&self) -> u32 {
        let payload = self.payload_types().map(Type::byte_size).max().unwrap_or(0);
        align_to(self.payload_offset() + payload, self.alignment())
    }

    pub fn payload_flat_types(&self) -> Vec<CoreType> {
        join_flat_types(self.payload_types())
    }
}

/// A logical interface type with a canonical ABI layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Bool,
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    F32,
    F64,
    Char,
    String,
    Enum(EnumType),
    Flags(FlagsType),
    List(Box<Type>),
    Record(RecordType),
    Variant(VariantType),
    Result(ResultType),
}

impl Type {
    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    /// Size in bytes when stored in guest linear memory (wasm32).
    pub fn byte_size(&self) -> u32 {
        match self {
            Type::Bool | Type::S8 | Type::U8 => 1,
            Type::S16 | Type::U16 => 2,
            Type::S32 | Type::U32 | Type::F32 | Type::Char => 4,
            Type::S64 | Type::U64 | Type::F64 => 8,
            // ptr + len pair
            Type::String | Type::List(_) => 8,
            Type::Enum(e) => e.tag().byte_size(),
            Type::Flags(f) => f.repr().byte_size(),
            Type::Record(r) => r.byte_size(),
            Type::Variant(v) => v.byte_size(),
            Type::Result(r) => r.byte_size(),
        }
    }

    /// Natural alignment when stored in guest linear memory. The decoder
    /// never requires addresses to honor it; it only drives layout
    /// computation for records, variants, and argument areas.
    pub fn alignment(&self) -> u32 {
        match self {
            Type::Bool | Type::S8 | Type::U8 => 1,
            Type::S16 | Type::U16 => 2,
            Type::S32 | Type::U32 | Type::F32 | Type::Char => 4,
            Type::S64 | Type::U64 | Type::F64 => 8,
            Type::String | Type::List(_) => 4,
            Type::Enum(e) => e.tag().alignment(),
            Type::Flags(f) => f.repr().alignment(),
            Type::Record(r) => r.alignment(),
            Type::Variant(v) => v.alignment(),
            Type::Result(r) => r.alignment(),
        }
    }

    /// Append the core scalar kinds this type flattens to.
    pub fn push_flat_types(&self, out: &mut Vec<CoreType>) {
        match self {
            Type::Bool
            | Type::S8
            | Type::U8
            | Type::S16
            | Type::U16
            | Type::S32
            | Type::U32
            | Type::Char => out.push(CoreType::I32),
            Type::S64 | Type::U64 => out.push(CoreType::I64),
            Type::F32 => out.push(CoreType::F32),
            Type::F64 => out.push(CoreType::F64),
            Type::String | Type::List(_) => {
                out.push(CoreType::I32);
                out.push(CoreType::I32);
            }
            Type::Enum(_) => out.push(CoreType::I32),
            Type::Flags(f) => out.push(f.repr().core_type()),
            Type::Record(r) => {
                for field in &r.fields {
                    field.ty.push_flat_types(out);
                }
            }
            Type::Variant(v) => {
                out.push(CoreType::I32);
                out.extend(v.payload_flat_types());
            }
            Type::Result(r) => {
                out.push(CoreType::I32);
                out.extend(r.payload_flat_types());
            }
        }
    }

    /// The ordered core representation of this type.
    pub fn flat_types(&self) -> Vec<CoreType> {
        let mut out = Vec::new();
        self.push_flat_types(&mut out);
        out
    }

    /// Number of core scalar slots this type flattens to.
    pub fn flat_count(&self) -> usize {
        self.flat_types().len()
    }

    /// Short kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Type::Bool => "bool",
            Type::S8 => "s8",
            Type::U8 => "u8",
            Type::S16 => "s16",
            Type::U16 => "u16",
            Type::S32 => "s32",
            Type::U32 => "u32",
            Type::S64 => "s64",
            Type::U64 => "u64",
            Type::F32 => "f32",
            Type::F64 => "f64",
            Type::Char => "char",
            Type::String => "string",
            Type::Enum(_) => "enum",
            Type::Flags(_) => "flags",
            Type::List(_) => "list",
            Type::Record(_) => "record",
            Type::Variant(_) => "variant",
            Type::Result(_) => "result",
        }
    }
}

/// Canonical ABI join of two core types sharing a payload slot.
fn join(a: CoreType, b: CoreType) -> CoreType {
    use CoreType::*;
    match (a, b) {
        (x, y) if x == y => x,
        (I32, F32) | (F32, I32) => I32,
        _ => I64,
    }
}

/// Position-wise join of the flat representations of several payload
/// types, producing the slot sequence shared by every case.
fn join_flat_types<'a>(types: impl Iterator<Item = &'a Type>) -> Vec<CoreType> {
    let mut joined: Vec<CoreType> = Vec::new();
    for ty in types {
        let flat = ty.flat_types();
        for (i, ct) in flat.into_iter().enumerate() {
            match joined.get_mut(i) {
                Some(slot) => *slot = join(*slot, ct),
                None => joined.push(ct),
            }
        }
    }
    joined
}
