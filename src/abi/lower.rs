//! Lowering host values back across the boundary.
//!
//! The adapter lowers an already-validated host value either into core
//! scalars (direct results) or into a caller-provided memory region
//! (indirect results and spilled arguments). Host-produced values are
//! shape-matched against the declared type while lowering; anything
//! deeper than shape was the host implementation's responsibility.

use super::buffer::{write_byte, write_slice};
use super::error::DecodeError;
use super::memory::GuestMemory;
use super::types::{
    CoreType, CoreValue, DiscriminantSize, EnumType, FlagsRepr, FlagsType, Type, VariantType,
};
use super::value::Value;

/// Lowers host values into core scalars and guest memory.
pub struct Lowerer<'m, M: GuestMemory> {
    memory: &'m mut M,
}

impl<'m, M: GuestMemory> Lowerer<'m, M> {
    pub fn new(memory: &'m mut M) -> Self {
        Self { memory }
    }

    /// Flatten a value into core scalar slots in canonical order.
    pub fn lower_core(
        &mut self,
        value: &Value,
        ty: &Type,
        out: &mut Vec<CoreValue>,
    ) -> Result<(), DecodeError> {
        match (ty, value) {
            (Type::Bool, Value::Bool(b)) => out.push(CoreValue::I32(*b as i32)),
            (Type::U8, Value::U8(v)) => out.push(CoreValue::I32(*v as i32)),
            (Type::S8, Value::S8(v)) => out.push(CoreValue::I32(*v as i32)),
            (Type::U16, Value::U16(v)) => out.push(CoreValue::I32(*v as i32)),
            (Type::S16, Value::S16(v)) => out.push(CoreValue::I32(*v as i32)),
            (Type::U32, Value::U32(v)) => out.push(CoreValue::I32(*v as i32)),
            (Type::S32, Value::S32(v)) => out.push(CoreValue::I32(*v)),
            (Type::U64, Value::U64(v)) => out.push(CoreValue::I64(*v as i64)),
            (Type::S64, Value::S64(v)) => out.push(CoreValue::I64(*v)),
            (Type::F32, Value::F32(v)) => out.push(CoreValue::F32(*v)),
            (Type::F64, Value::F64(v)) => out.push(CoreValue::F64(*v)),
            (Type::Char, Value::Char(c)) => out.push(CoreValue::I32(*c as u32 as i32)),
            (Type::String, Value::String(s)) => {
                let (ptr, len) = self.write_string(s)?;
                out.push(CoreValue::I32(ptr as i32));
                out.push(CoreValue::I32(len as i32));
            }
            (Type::Enum(e), Value::Enum(case)) => {
                out.push(CoreValue::I32(enum_discriminant(e, case)? as i32));
            }
            (Type::Flags(f), Value::Flags(names)) => {
                let bits = flag_bits(f, names)?;
                match f.repr().core_type() {
                    CoreType::I64 => out.push(CoreValue::I64(bits as i64)),
                    _ => out.push(CoreValue::I32(bits as u32 as i32)),
                }
            }
            (Type::List(elem), Value::List(items)) => {
                let (ptr, len) = self.lower_list(items, elem)?;
                out.push(CoreValue::I32(ptr as i32));
                out.push(CoreValue::I32(len as i32));
            }
            (Type::Record(r), Value::Record(fields)) => {
                for field in &r.fields {
                    let value = record_field(fields, &field.name)?;
                    self.lower_core(value, &field.ty, out)?;
                }
            }
            (Type::Variant(v), Value::Variant { case, payload }) => {
                let disc = variant_discriminant(v, case)?;
                out.push(CoreValue::I32(disc as i32));
                let case_ty = v
                    .cases
                    .get(disc as usize)
                    .and_then(|c| c.ty.as_ref());
                self.lower_joined_payload(
                    payload.as_deref(),
                    case_ty,
                    &v.payload_flat_types(),
                    out,
                )?;
            }
            (Type::Result(r), Value::Result(res)) => {
                let joined = r.payload_flat_types();
                match res {
                    Ok(ok) => {
                        out.push(CoreValue::I32(0));
                        self.lower_joined_payload(ok.as_deref(), r.ok.as_deref(), &joined, out)?;
                    }
                    Err(err) => {
                        out.push(CoreValue::I32(1));
                        self.lower_joined_payload(err.as_deref(), r.err.as_deref(), &joined, out)?;
                    }
                }
            }
            (ty, value) => return Err(mismatch(ty, value)),
        }
        Ok(())
    }

    /// Write a value's canonical bytes into a caller-provided region at
    /// `addr`. The region itself is allocated by the guest; only nested
    /// variable-size payloads go through the allocator seam.
    pub fn lower_memory(&mut self, value: &Value, ty: &Type, addr: u32) -> Result<(), DecodeError> {
        let mut buf = vec![0u8; ty.byte_size() as usize];
        self.lower_into(value, ty, &mut buf, 0)?;
        self.memory.write_bytes(addr, &buf)
    }

    fn lower_into(
        &mut self,
        value: &Value,
        ty: &Type,
        buf: &mut [u8],
        offset: u32,
    ) -> Result<(), DecodeError> {
        match (ty, value) {
            (Type::Bool, Value::Bool(b)) => write_byte(buf, offset, *b as u8)?,
            (Type::U8, Value::U8(v)) => write_byte(buf, offset, *v)?,
            (Type::S8, Value::S8(v)) => write_byte(buf, offset, *v as u8)?,
            (Type::U16, Value::U16(v)) => write_slice(buf, offset, &v.to_le_bytes())?,
            (Type::S16, Value::S16(v)) => write_slice(buf, offset, &v.to_le_bytes())?,
            (Type::U32, Value::U32(v)) => write_slice(buf, offset, &v.to_le_bytes())?,
            (Type::S32, Value::S32(v)) => write_slice(buf, offset, &v.to_le_bytes())?,
            (Type::U64, Value::U64(v)) => write_slice(buf, offset, &v.to_le_bytes())?,
            (Type::S64, Value::S64(v)) => write_slice(buf, offset, &v.to_le_bytes())?,
            (Type::F32, Value::F32(v)) => write_slice(buf, offset, &v.to_le_bytes())?,
            (Type::F64, Value::F64(v)) => write_slice(buf, offset, &v.to_le_bytes())?,
            (Type::Char, Value::Char(c)) => {
                write_slice(buf, offset, &(*c as u32).to_le_bytes())?;
            }
            (Type::String, Value::String(s)) => {
                let (ptr, len) = self.write_string(s)?;
                write_slice(buf, offset, &ptr.to_le_bytes())?;
                write_slice(buf, offset + 4, &len.to_le_bytes())?;
            }
            (Type::Enum(e), Value::Enum(case)) => {
                write_discriminant(buf, offset, e.tag(), enum_discriminant(e, case)?)?;
            }
            (Type::Flags(f), Value::Flags(names)) => {
                let bits = flag_bits(f, names)?;
                match f.repr() {
                    FlagsRepr::U8 => write_byte(buf, offset, bits as u8)?,
                    FlagsRepr::U16 => write_slice(buf, offset, &(bits as u16).to_le_bytes())?,
                    FlagsRepr::U32 => write_slice(buf, offset, &(bits as u32).to_le_bytes())?,
                    FlagsRepr::U64 => write_slice(buf, offset, &bits.to_le_bytes())?,
                }
            }
            (Type::List(elem), Value::List(items)) => {
                let (ptr, len) = self.lower_list(items, elem)?;
                write_slice(buf, offset, &ptr.to_le_bytes())?;
                write_slice(buf, offset + 4, &len.to_le_bytes())?;
            }
            (Type::Record(r), Value::Record(fields)) => {
                let offsets = r.field_offsets();
                for (field, field_off) in r.fields.iter().zip(offsets) {
                    let value = record_field(fields, &field.name)?;
                    self.lower_into(value, &field.ty, buf, offset + field_off)?;
                }
            }
            (Type::Variant(v), Value::Variant { case, payload }) => {
                let disc = variant_discriminant(v, case)?;
                write_discriminant(buf, offset, v.tag(), disc)?;
                let case_ty = v.cases.get(disc as usize).and_then(|c| c.ty.as_ref());
                if let (Some(payload), Some(payload_ty)) = (payload.as_deref(), case_ty) {
                    self.lower_into(payload, payload_ty, buf, offset + v.payload_offset())?;
                }
            }
            (Type::Result(r), Value::Result(res)) => {
                let payload_offset = offset + r.payload_offset();
                match res {
                    Ok(ok) => {
                        write_byte(buf, offset, 0)?;
                        if let (Some(v), Some(ty)) = (ok.as_deref(), r.ok.as_deref()) {
                            self.lower_into(v, ty, buf, payload_offset)?;
                        }
                    }
                    Err(err) => {
                        write_byte(buf, offset, 1)?;
                        if let (Some(v), Some(ty)) = (err.as_deref(), r.err.as_deref()) {
                            self.lower_into(v, ty, buf, payload_offset)?;
                        }
                    }
                }
            }
            (ty, value) => return Err(mismatch(ty, value)),
        }
        Ok(())
    }

    /// Place string contents through the allocator seam and return the
    /// (ptr, len) pair.
    fn write_string(&mut self, s: &str) -> Result<(u32, u32), DecodeError> {
        let ptr = self.memory.alloc(s.len() as u32, 1)?;
        self.memory.write_bytes(ptr, s.as_bytes())?;
        Ok((ptr, s.len() as u32))
    }

    fn lower_list(&mut self, items: &[Value], elem: &Type) -> Result<(u32, u32), DecodeError> {
        let elem_size = elem.byte_size();
        let total = items.len() as u64 * elem_size as u64;
        if total > u32::MAX as u64 {
            return Err(DecodeError::BufferTooSmall {
                needed: total as usize,
                available: self.memory.size(),
            });
        }
        let ptr = self.memory.alloc(total as u32, elem.alignment())?;
        for (i, item) in items.iter().enumerate() {
            let mut buf = vec![0u8; elem_size as usize];
            self.lower_into(item, elem, &mut buf, 0)?;
            let addr = (ptr as u64 + i as u64 * elem_size as u64) as u32;
            self.memory.write_bytes(addr, &buf)?;
        }
        Ok((ptr, items.len() as u32))
    }

    /// Lower a case payload into the joined slot sequence, widening each
    /// scalar to the joined kind and zero-padding the unused tail slots.
    fn lower_joined_payload(
        &mut self,
        payload: Option<&Value>,
        payload_ty: Option<&Type>,
        joined: &[CoreType],
        out: &mut Vec<CoreValue>,
    ) -> Result<(), DecodeError> {
        let mut own: Vec<CoreValue> = Vec::new();
        if let (Some(value), Some(ty)) = (payload, payload_ty) {
            self.lower_core(value, ty, &mut own)?;
        }
        for (i, want) in joined.iter().enumerate() {
            match own.get(i) {
                Some(have) => out.push(widen(*have, *want)?),
                None => out.push(zero(*want)),
            }
        }
        Ok(())
    }
}

fn mismatch(ty: &Type, value: &Value) -> DecodeError {
    DecodeError::type_mismatch(ty.kind_name(), value.kind_name())
}

fn record_field<'v>(fields: &'v [(String, Value)], name: &str) -> Result<&'v Value, DecodeError> {
    fields
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v)
        .ok_or_else(|| DecodeError::type_mismatch(format!("field '{name}'"), "missing"))
}

fn enum_discriminant(e: &EnumType, case: &str) -> Result<u32, DecodeError> {
    e.cases
        .iter()
        .position(|c| c == case)
        .map(|i| i as u32)
        .ok_or_else(|| DecodeError::type_mismatch(format!("case of enum '{}'", e.name), case))
}

fn variant_discriminant(v: &VariantType, case: &str) -> Result<u32, DecodeError> {
    v.cases
        .iter()
        .position(|c| c.name == case)
        .map(|i| i as u32)
        .ok_or_else(|| DecodeError::type_mismatch(format!("case of variant '{}'", v.name), case))
}

fn flag_bits(f: &FlagsType, names: &[String]) -> Result<u64, DecodeError> {
    let mut bits = 0u64;
    for name in names {
        let pos = f
            .flags
            .iter()
            .position(|fl| fl == name)
            .ok_or_else(|| DecodeError::type_mismatch(format!("flag of '{}'", f.name), name))?;
        bits |= 1u64 << pos;
    }
    Ok(bits)
}

fn write_discriminant(
    buf: &mut [u8],
    offset: u32,
    tag: DiscriminantSize,
    value: u32,
) -> Result<(), DecodeError> {
    match tag {
        DiscriminantSize::U8 => write_byte(buf, offset, value as u8),
        DiscriminantSize::U16 => write_slice(buf, offset, &(value as u16).to_le_bytes()),
        DiscriminantSize::U32 => write_slice(buf, offset, &value.to_le_bytes()),
    }
}

/// Widen a case-specific scalar to the joined slot kind.
fn widen(have: CoreValue, want: CoreType) -> Result<CoreValue, DecodeError> {
    use CoreType as T;
    use CoreValue as V;
    match (have, want) {
        (V::I32(v), T::I32) => Ok(V::I32(v)),
        (V::I32(v), T::I64) => Ok(V::I64(v as i64)),
        (V::I64(v), T::I64) => Ok(V::I64(v)),
        (V::F32(v), T::F32) => Ok(V::F32(v)),
        (V::F32(v), T::I32) => Ok(V::I32(v.to_bits() as i32)),
        (V::F32(v), T::I64) => Ok(V::I64(v.to_bits() as i64)),
        (V::F64(v), T::F64) => Ok(V::F64(v)),
        (V::F64(v), T::I64) => Ok(V::I64(v.to_bits() as i64)),
        (have, want) => Err(DecodeError::type_mismatch(
            format!("{want:?}"),
            format!("{have:?}"),
        )),
    }
}

fn zero(ct: CoreType) -> CoreValue {
    match ct {
        CoreType::I32 => CoreValue::I32(0),
        CoreType::I64 => CoreValue::I64(0),
        CoreType::F32 => CoreValue::F32(0.0),
        CoreType::F64 => CoreValue::F64(0.0),
    }
}
