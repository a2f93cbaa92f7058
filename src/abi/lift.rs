//! Decoding and strict validation of guest values (lifting).
//!
//! This is the one place where untrusted bit patterns from the guest are
//! converted into host values. Every rule here is mandatory: a violation
//! short-circuits the whole decode with a typed [`DecodeError`] and never
//! silently coerces.
//!
//! Values arrive either as core scalars already in registers
//! ([`Lifter::lift_core`]) or behind an address in guest linear memory
//! ([`Lifter::lift_memory`]). All memory reads are byte-granular and
//! bounds-checked; a misaligned base address decodes identically to an
//! aligned one.

use super::buffer::{read_array, read_byte};
use super::error::DecodeError;
use super::memory::GuestMemory;
use super::types::{
    CoreType, CoreValue, DiscriminantSize, EnumType, FlagsRepr, FlagsType, RecordType, ResultType,
    Type, VariantType,
};
use super::value::Value;
use crate::logging::warn;

/// Policy for flag bits outside the declared set. A fixed, documented
/// choice made at [`Lifter`] construction, never varied per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownBits {
    /// Fail the decode with an invalid-discriminant error (default).
    #[default]
    Reject,
    /// Drop unknown bits; only declared flags survive the decode.
    Ignore,
}

/// Cursor over the core scalar values of a flattened argument list.
#[derive(Debug)]
pub struct CoreSlots<'a> {
    values: &'a [CoreValue],
    pos: usize,
}

impl<'a> CoreSlots<'a> {
    pub fn new(values: &'a [CoreValue]) -> Self {
        Self { values, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.pos)
    }

    fn next(&mut self) -> Result<CoreValue, DecodeError> {
        let value = self
            .values
            .get(self.pos)
            .copied()
            .ok_or_else(|| DecodeError::type_mismatch("core value", "end of core arguments"))?;
        self.pos += 1;
        Ok(value)
    }

    fn take_i32(&mut self) -> Result<i32, DecodeError> {
        match self.next()? {
            CoreValue::I32(v) => Ok(v),
            other => Err(DecodeError::type_mismatch("i32", format!("{other:?}"))),
        }
    }

    fn take_i64(&mut self) -> Result<i64, DecodeError> {
        match self.next()? {
            CoreValue::I64(v) => Ok(v),
            other => Err(DecodeError::type_mismatch("i64", format!("{other:?}"))),
        }
    }

    fn take_f32(&mut self) -> Result<f32, DecodeError> {
        match self.next()? {
            CoreValue::F32(v) => Ok(v),
            other => Err(DecodeError::type_mismatch("f32", format!("{other:?}"))),
        }
    }

    fn take_f64(&mut self) -> Result<f64, DecodeError> {
        match self.next()? {
            CoreValue::F64(v) => Ok(v),
            other => Err(DecodeError::type_mismatch("f64", format!("{other:?}"))),
        }
    }
}

/// Decoder/validator for guest values.
pub struct Lifter<'m, M: GuestMemory> {
    memory: &'m M,
    unknown_bits: UnknownBits,
}

impl<'m, M: GuestMemory> Lifter<'m, M> {
    pub fn new(memory: &'m M) -> Self {
        Self {
            memory,
            unknown_bits: UnknownBits::default(),
        }
    }

    /// Set the policy for flag bits outside the declared set.
    pub fn with_unknown_bits(mut self, policy: UnknownBits) -> Self {
        self.unknown_bits = policy;
        self
    }

    /// Decode a value passed directly as core scalars.
    ///
    /// Narrow integer widths are carried sign/zero-extended in a wider
    /// core slot and are re-validated against the narrow bound here, not
    /// trusted from the wider slot.
    pub fn lift_core(&self, ty: &Type, slots: &mut CoreSlots<'_>) -> Result<Value, DecodeError> {
        match ty {
            Type::Bool => match slots.take_i32()? {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                other => Err(DecodeError::InvalidDiscriminant {
                    ty: "bool".to_string(),
                    discriminant: other as u32,
                    num_cases: 2,
                }),
            },
            Type::U8 => {
                let v = narrow("u8", slots.take_i32()? as i64, 0, u8::MAX as i64)?;
                Ok(Value::U8(v as u8))
            }
            Type::S8 => {
                let v = narrow("s8", slots.take_i32()? as i64, i8::MIN as i64, i8::MAX as i64)?;
                Ok(Value::S8(v as i8))
            }
            Type::U16 => {
                let v = narrow("u16", slots.take_i32()? as i64, 0, u16::MAX as i64)?;
                Ok(Value::U16(v as u16))
            }
            Type::S16 => {
                let v = narrow("s16", slots.take_i32()? as i64, i16::MIN as i64, i16::MAX as i64)?;
                Ok(Value::S16(v as i16))
            }
            // Full-width integers reinterpret the slot's bit pattern;
            // every pattern is in range by construction.
            Type::S32 => Ok(Value::S32(slots.take_i32()?)),
            Type::U32 => Ok(Value::U32(slots.take_i32()? as u32)),
            Type::S64 => Ok(Value::S64(slots.take_i64()?)),
            Type::U64 => Ok(Value::U64(slots.take_i64()? as u64)),
            Type::F32 => Ok(Value::F32(slots.take_f32()?)),
            Type::F64 => Ok(Value::F64(slots.take_f64()?)),
            Type::Char => lift_char(slots.take_i32()? as u32),
            Type::String => {
                let ptr = slots.take_i32()? as u32;
                let len = slots.take_i32()? as u32;
                self.read_string(ptr, len)
            }
            Type::Enum(e) => lift_enum(e, slots.take_i32()? as u32),
            Type::Flags(f) => {
                let bits = match f.repr().core_type() {
                    CoreType::I64 => slots.take_i64()? as u64,
                    _ => slots.take_i32()? as u32 as u64,
                };
                self.lift_flags(f, bits)
            }
            Type::List(elem) => {
                let ptr = slots.take_i32()? as u32;
                let len = slots.take_i32()? as u32;
                self.lift_list(elem, ptr, len)
            }
            Type::Record(r) => {
                let mut fields = Vec::with_capacity(r.fields.len());
                for field in &r.fields {
                    let value = self.lift_core(&field.ty, slots)?;
                    fields.push((field.name.clone(), value));
                }
                Ok(Value::Record(fields))
            }
            Type::Variant(v) => self.lift_variant_core(v, slots),
            Type::Result(r) => self.lift_result_core(r, slots),
        }
    }

    /// Decode a value stored in guest linear memory at `addr`.
    ///
    /// The address carries no alignment guarantee; decoding reads the
    /// value's region through the bounds-checked memory collaborator and
    /// parses it byte-wise.
    pub fn lift_memory(&self, ty: &Type, addr: u32) -> Result<Value, DecodeError> {
        let region = self.memory.read_bytes(addr, ty.byte_size())?;
        self.lift_from(region, ty, 0)
    }

    /// Decode a value from a byte region at the given offset. Offsets are
    /// used verbatim; explicit irregular record offsets decode the same
    /// as natural ones.
    fn lift_from(&self, region: &[u8], ty: &Type, offset: u32) -> Result<Value, DecodeError> {
        match ty {
            Type::Bool => match read_byte(region, offset)? {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                other => Err(DecodeError::InvalidDiscriminant {
                    ty: "bool".to_string(),
                    discriminant: other as u32,
                    num_cases: 2,
                }),
            },
            Type::U8 => Ok(Value::U8(read_byte(region, offset)?)),
            Type::S8 => Ok(Value::S8(read_byte(region, offset)? as i8)),
            Type::U16 => Ok(Value::U16(u16::from_le_bytes(read_array(region, offset)?))),
            Type::S16 => Ok(Value::S16(i16::from_le_bytes(read_array(region, offset)?))),
            Type::U32 => Ok(Value::U32(u32::from_le_bytes(read_array(region, offset)?))),
            Type::S32 => Ok(Value::S32(i32::from_le_bytes(read_array(region, offset)?))),
            Type::U64 => Ok(Value::U64(u64::from_le_bytes(read_array(region, offset)?))),
            Type::S64 => Ok(Value::S64(i64::from_le_bytes(read_array(region, offset)?))),
            Type::F32 => Ok(Value::F32(f32::from_le_bytes(read_array(region, offset)?))),
            Type::F64 => Ok(Value::F64(f64::from_le_bytes(read_array(region, offset)?))),
            Type::Char => lift_char(u32::from_le_bytes(read_array(region, offset)?)),
            Type::String => {
                let ptr = u32::from_le_bytes(read_array(region, offset)?);
                let len = u32::from_le_bytes(read_array(region, offset + 4)?);
                self.read_string(ptr, len)
            }
            Type::Enum(e) => lift_enum(e, read_discriminant(region, offset, e.tag())?),
            Type::Flags(f) => {
                let bits = match f.repr() {
                    FlagsRepr::U8 => read_byte(region, offset)? as u64,
                    FlagsRepr::U16 => u16::from_le_bytes(read_array(region, offset)?) as u64,
                    FlagsRepr::U32 => u32::from_le_bytes(read_array(region, offset)?) as u64,
                    FlagsRepr::U64 => u64::from_le_bytes(read_array(region, offset)?),
                };
                self.lift_flags(f, bits)
            }
            Type::List(elem) => {
                let ptr = u32::from_le_bytes(read_array(region, offset)?);
                let len = u32::from_le_bytes(read_array(region, offset + 4)?);
                self.lift_list(elem, ptr, len)
            }
            Type::Record(r) => self.lift_record(region, r, offset),
            Type::Variant(v) => {
                let disc = read_discriminant(region, offset, v.tag())?;
                let case = v.cases.get(disc as usize).ok_or_else(|| {
                    DecodeError::InvalidDiscriminant {
                        ty: v.name.clone(),
                        discriminant: disc,
                        num_cases: v.cases.len(),
                    }
                })?;
                let payload = match &case.ty {
                    Some(payload_ty) => Some(Box::new(self.lift_from(
                        region,
                        payload_ty,
                        offset + v.payload_offset(),
                    )?)),
                    None => None,
                };
                Ok(Value::Variant {
                    case: case.name.clone(),
                    payload,
                })
            }
            Type::Result(r) => {
                let disc = read_byte(region, offset)?;
                let payload_offset = offset + r.payload_offset();
                match disc {
                    0 => {
                        let ok = match r.ok.as_deref() {
                            Some(ty) => Some(Box::new(self.lift_from(region, ty, payload_offset)?)),
                            None => None,
                        };
                        Ok(Value::Result(Ok(ok)))
                    }
                    1 => {
                        let err = match r.err.as_deref() {
                            Some(ty) => Some(Box::new(self.lift_from(region, ty, payload_offset)?)),
                            None => None,
                        };
                        Ok(Value::Result(Err(err)))
                    }
                    other => Err(DecodeError::InvalidDiscriminant {
                        ty: "result".to_string(),
                        discriminant: other as u32,
                        num_cases: 2,
                    }),
                }
            }
        }
    }

    fn lift_record(&self, region: &[u8], r: &RecordType, offset: u32) -> Result<Value, DecodeError> {
        let offsets = r.field_offsets();
        let mut fields = Vec::with_capacity(r.fields.len());
        for (field, field_off) in r.fields.iter().zip(offsets) {
            let value = self.lift_from(region, &field.ty, offset + field_off)?;
            fields.push((field.name.clone(), value));
        }
        Ok(Value::Record(fields))
    }

    /// Copy a guest string out of memory, validating UTF-8.
    fn read_string(&self, ptr: u32, len: u32) -> Result<Value, DecodeError> {
        let bytes = self.memory.read_bytes(ptr, len)?;
        let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
        Ok(Value::String(s.to_string()))
    }

    /// Decode `len` elements starting at `ptr`. Element addresses are
    /// `ptr + i * elem_size`; `ptr` itself may be arbitrarily misaligned
    /// and every element read stays byte-granular.
    fn lift_list(&self, elem: &Type, ptr: u32, len: u32) -> Result<Value, DecodeError> {
        let elem_size = elem.byte_size();
        // Zero-sized elements make the byte probe below vacuous; bound
        // the claimed count by the memory size instead so a hostile
        // length still fails before any allocation proportional to it.
        if elem_size == 0 && len as usize > self.memory.size() {
            return Err(DecodeError::MemoryOutOfBounds {
                addr: ptr,
                len,
                memory_size: self.memory.size(),
            });
        }
        // One up-front bounds probe so a hostile length fails before any
        // allocation proportional to it.
        let total = len as u64 * elem_size as u64;
        if total > u32::MAX as u64 {
            return Err(DecodeError::MemoryOutOfBounds {
                addr: ptr,
                len: u32::MAX,
                memory_size: self.memory.size(),
            });
        }
        self.memory.read_bytes(ptr, total as u32)?;

        let mut items = Vec::with_capacity(len as usize);
        for i in 0..len {
            let addr = (ptr as u64 + i as u64 * elem_size as u64) as u32;
            let region = self.memory.read_bytes(addr, elem_size)?;
            items.push(self.lift_from(region, elem, 0)?);
        }
        Ok(Value::List(items))
    }

    fn lift_flags(&self, f: &FlagsType, bits: u64) -> Result<Value, DecodeError> {
        let unknown = bits & !f.known_mask();
        if unknown != 0 {
            match self.unknown_bits {
                UnknownBits::Reject => {
                    return Err(DecodeError::InvalidDiscriminant {
                        ty: f.name.clone(),
                        discriminant: unknown.trailing_zeros(),
                        num_cases: f.flags.len(),
                    });
                }
                UnknownBits::Ignore => {
                    warn!(flags = %f.name, unknown, "ignoring unknown flag bits");
                }
            }
        }
        let active = f
            .flags
            .iter()
            .enumerate()
            .filter(|(i, _)| (bits >> i) & 1 == 1)
            .map(|(_, name)| name.clone())
            .collect();
        Ok(Value::Flags(active))
    }

    fn lift_variant_core(
        &self,
        v: &VariantType,
        slots: &mut CoreSlots<'_>,
    ) -> Result<Value, DecodeError> {
        let disc = slots.take_i32()? as u32;
        let case = v
            .cases
            .get(disc as usize)
            .ok_or_else(|| DecodeError::InvalidDiscriminant {
                ty: v.name.clone(),
                discriminant: disc,
                num_cases: v.cases.len(),
            })?;
        let payload = self.lift_joined_payload(case.ty.as_ref(), &v.payload_flat_types(), slots)?;
        Ok(Value::Variant {
            case: case.name.clone(),
            payload,
        })
    }

    fn lift_result_core(
        &self,
        r: &ResultType,
        slots: &mut CoreSlots<'_>,
    ) -> Result<Value, DecodeError> {
        let disc = slots.take_i32()? as u32;
        let joined = r.payload_flat_types();
        match disc {
            0 => {
                let ok = self.lift_joined_payload(r.ok.as_deref(), &joined, slots)?;
                Ok(Value::Result(Ok(ok)))
            }
            1 => {
                let err = self.lift_joined_payload(r.err.as_deref(), &joined, slots)?;
                Ok(Value::Result(Err(err)))
            }
            other => Err(DecodeError::InvalidDiscriminant {
                ty: "result".to_string(),
                discriminant: other,
                num_cases: 2,
            }),
        }
    }

    /// Consume a joined payload slot sequence and re-decode the selected
    /// case's value from it. Slots beyond the case's own representation
    /// are padding and are discarded after being consumed.
    fn lift_joined_payload(
        &self,
        payload_ty: Option<&Type>,
        joined: &[CoreType],
        slots: &mut CoreSlots<'_>,
    ) -> Result<Option<Box<Value>>, DecodeError> {
        let mut raw = Vec::with_capacity(joined.len());
        for _ in joined {
            raw.push(slots.next()?);
        }
        let Some(ty) = payload_ty else {
            return Ok(None);
        };
        let flats = ty.flat_types();
        let mut narrowed = Vec::with_capacity(flats.len());
        for (i, want) in flats.iter().enumerate() {
            let have = raw
                .get(i)
                .copied()
                .ok_or_else(|| DecodeError::type_mismatch("payload core value", "missing slot"))?;
            narrowed.push(reinterpret(have, *want)?);
        }
        let mut inner = CoreSlots::new(&narrowed);
        Ok(Some(Box::new(self.lift_core(ty, &mut inner)?)))
    }
}

/// Re-validate a narrow integer carried in a wider core slot.
fn narrow(ty: &'static str, value: i64, min: i64, max: i64) -> Result<i64, DecodeError> {
    if value < min || value > max {
        Err(DecodeError::OutOfRange {
            ty,
            value,
            min,
            max,
        })
    } else {
        Ok(value)
    }
}

/// A char must be a Unicode scalar value: in `[0, 0x10FFFF]` and outside
/// the surrogate range `[0xD800, 0xDFFF]`.
fn lift_char(code: u32) -> Result<Value, DecodeError> {
    char::from_u32(code)
        .map(Value::Char)
        .ok_or(DecodeError::InvalidChar(code))
}

fn lift_enum(e: &EnumType, disc: u32) -> Result<Value, DecodeError> {
    let case = e
        .cases
        .get(disc as usize)
        .ok_or_else(|| DecodeError::InvalidDiscriminant {
            ty: e.name.clone(),
            discriminant: disc,
            num_cases: e.cases.len(),
        })?;
    Ok(Value::Enum(case.clone()))
}

fn read_discriminant(
    region: &[u8],
    offset: u32,
    tag: DiscriminantSize,
) -> Result<u32, DecodeError> {
    match tag {
        DiscriminantSize::U8 => Ok(read_byte(region, offset)? as u32),
        DiscriminantSize::U16 => Ok(u16::from_le_bytes(read_array(region, offset)?) as u32),
        DiscriminantSize::U32 => Ok(u32::from_le_bytes(read_array(region, offset)?)),
    }
}

/// Reinterpret a joined payload slot as the core type a specific case
/// expects. The join rule only ever widens, so narrowing back is a pure
/// bit-pattern operation.
fn reinterpret(have: CoreValue, want: CoreType) -> Result<CoreValue, DecodeError> {
    use CoreType as T;
    use CoreValue as V;
    match (have, want) {
        (V::I32(v), T::I32) => Ok(V::I32(v)),
        (V::I32(v), T::F32) => Ok(V::F32(f32::from_bits(v as u32))),
        (V::I64(v), T::I64) => Ok(V::I64(v)),
        (V::I64(v), T::I32) => Ok(V::I32(v as i32)),
        (V::I64(v), T::F32) => Ok(V::F32(f32::from_bits(v as u32))),
        (V::I64(v), T::F64) => Ok(V::F64(f64::from_bits(v as u64))),
        (V::F32(v), T::F32) => Ok(V::F32(v)),
        (V::F64(v), T::F64) => Ok(V::F64(v)),
        (have, want) => Err(DecodeError::type_mismatch(
            format!("{want:?}"),
            format!("{have:?}"),
        )),
    }
}
