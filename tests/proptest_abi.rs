//! Property-based round-trip tests for lifting and lowering.
//!
//! Lowering a host value and lifting it back must reproduce the value
//! exactly, both through core scalar slots and through linear memory.
//! Validation properties run alongside: every out-of-range bit pattern
//! must be rejected, never coerced.

use proptest::prelude::*;
use wit_boundary::abi::CoreSlots;
use wit_boundary::prelude::*;

/// Lower through core scalar slots and lift back.
fn core_roundtrip(ty: &Type, value: &Value) -> Value {
    let mut memory = LinearMemory::new();
    let mut slots = Vec::new();
    Lowerer::new(&mut memory)
        .lower_core(value, ty, &mut slots)
        .unwrap();
    Lifter::new(&memory)
        .lift_core(ty, &mut CoreSlots::new(&slots))
        .unwrap()
}

/// Lower into linear memory and lift back from the same address.
fn memory_roundtrip(ty: &Type, value: &Value) -> Value {
    let mut memory = LinearMemory::new();
    let addr = memory.alloc(ty.byte_size(), ty.alignment()).unwrap();
    Lowerer::new(&mut memory)
        .lower_memory(value, ty, addr)
        .unwrap();
    Lifter::new(&memory).lift_memory(ty, addr).unwrap()
}

/// Lift a single core slot without any memory behind it.
fn lift_one(ty: &Type, core: CoreValue) -> std::result::Result<Value, DecodeError> {
    let memory = LinearMemory::new();
    Lifter::new(&memory).lift_core(ty, &mut CoreSlots::new(&[core]))
}

fn sample_enum() -> EnumType {
    EnumType::new("color", ["red", "green", "blue"])
}

fn sample_flags() -> FlagsType {
    FlagsType::new("perm", ["read", "write", "exec", "suid"])
}

proptest! {
    #[test]
    fn roundtrip_bool(v in any::<bool>()) {
        prop_assert_eq!(core_roundtrip(&Type::Bool, &Value::Bool(v)), Value::Bool(v));
        prop_assert_eq!(memory_roundtrip(&Type::Bool, &Value::Bool(v)), Value::Bool(v));
    }

    #[test]
    fn roundtrip_u8(v in any::<u8>()) {
        prop_assert_eq!(core_roundtrip(&Type::U8, &Value::U8(v)), Value::U8(v));
        prop_assert_eq!(memory_roundtrip(&Type::U8, &Value::U8(v)), Value::U8(v));
    }

    #[test]
    fn roundtrip_s8(v in any::<i8>()) {
        prop_assert_eq!(core_roundtrip(&Type::S8, &Value::S8(v)), Value::S8(v));
        prop_assert_eq!(memory_roundtrip(&Type::S8, &Value::S8(v)), Value::S8(v));
    }

    #[test]
    fn roundtrip_u16(v in any::<u16>()) {
        prop_assert_eq!(core_roundtrip(&Type::U16, &Value::U16(v)), Value::U16(v));
        prop_assert_eq!(memory_roundtrip(&Type::U16, &Value::U16(v)), Value::U16(v));
    }

    #[test]
    fn roundtrip_s16(v in any::<i16>()) {
        prop_assert_eq!(core_roundtrip(&Type::S16, &Value::S16(v)), Value::S16(v));
        prop_assert_eq!(memory_roundtrip(&Type::S16, &Value::S16(v)), Value::S16(v));
    }

    #[test]
    fn roundtrip_u32(v in any::<u32>()) {
        prop_assert_eq!(core_roundtrip(&Type::U32, &Value::U32(v)), Value::U32(v));
        prop_assert_eq!(memory_roundtrip(&Type::U32, &Value::U32(v)), Value::U32(v));
    }

    #[test]
    fn roundtrip_s32(v in any::<i32>()) {
        prop_assert_eq!(core_roundtrip(&Type::S32, &Value::S32(v)), Value::S32(v));
        prop_assert_eq!(memory_roundtrip(&Type::S32, &Value::S32(v)), Value::S32(v));
    }

    #[test]
    fn roundtrip_u64(v in any::<u64>()) {
        prop_assert_eq!(core_roundtrip(&Type::U64, &Value::U64(v)), Value::U64(v));
        prop_assert_eq!(memory_roundtrip(&Type::U64, &Value::U64(v)), Value::U64(v));
    }

    #[test]
    fn roundtrip_s64(v in any::<i64>()) {
        prop_assert_eq!(core_roundtrip(&Type::S64, &Value::S64(v)), Value::S64(v));
        prop_assert_eq!(memory_roundtrip(&Type::S64, &Value::S64(v)), Value::S64(v));
    }

    #[test]
    fn roundtrip_f32_preserves_bits(v in any::<f32>()) {
        for got in [
            core_roundtrip(&Type::F32, &Value::F32(v)),
            memory_roundtrip(&Type::F32, &Value::F32(v)),
        ] {
            match got {
                Value::F32(g) => prop_assert_eq!(g.to_bits(), v.to_bits()),
                other => prop_assert!(false, "expected f32, got {:?}", other),
            }
        }
    }

    #[test]
    fn roundtrip_f64_preserves_bits(v in any::<f64>()) {
        for got in [
            core_roundtrip(&Type::F64, &Value::F64(v)),
            memory_roundtrip(&Type::F64, &Value::F64(v)),
        ] {
            match got {
                Value::F64(g) => prop_assert_eq!(g.to_bits(), v.to_bits()),
                other => prop_assert!(false, "expected f64, got {:?}", other),
            }
        }
    }

    #[test]
    fn roundtrip_char(v in any::<char>()) {
        prop_assert_eq!(core_roundtrip(&Type::Char, &Value::Char(v)), Value::Char(v));
        prop_assert_eq!(memory_roundtrip(&Type::Char, &Value::Char(v)), Value::Char(v));
    }

    #[test]
    fn roundtrip_string(s in ".*") {
        let value = Value::String(s);
        prop_assert_eq!(core_roundtrip(&Type::String, &value), value.clone());
        prop_assert_eq!(memory_roundtrip(&Type::String, &value), value);
    }

    #[test]
    fn roundtrip_list_u32(items in proptest::collection::vec(any::<u32>(), 0..32)) {
        let ty = Type::list(Type::U32);
        let value = Value::List(items.into_iter().map(Value::U32).collect());
        prop_assert_eq!(core_roundtrip(&ty, &value), value.clone());
        prop_assert_eq!(memory_roundtrip(&ty, &value), value);
    }

    #[test]
    fn roundtrip_record(a in any::<u8>(), b in any::<u64>(), s in ".*") {
        let ty = Type::Record(RecordType::new(
            "mixed",
            [
                Field::new("a", Type::U8),
                Field::new("b", Type::U64),
                Field::new("s", Type::String),
            ],
        ));
        let value = Value::record([
            ("a", Value::U8(a)),
            ("b", Value::U64(b)),
            ("s", Value::String(s)),
        ]);
        prop_assert_eq!(core_roundtrip(&ty, &value), value.clone());
        prop_assert_eq!(memory_roundtrip(&ty, &value), value);
    }

    #[test]
    fn roundtrip_enum(idx in 0usize..3) {
        let e = sample_enum();
        let case = e.cases[idx].clone();
        let ty = Type::Enum(e);
        let value = Value::Enum(case);
        prop_assert_eq!(core_roundtrip(&ty, &value), value.clone());
        prop_assert_eq!(memory_roundtrip(&ty, &value), value);
    }

    #[test]
    fn roundtrip_flags(bits in 0u8..16) {
        let f = sample_flags();
        let names: Vec<String> = f
            .flags
            .iter()
            .enumerate()
            .filter(|(i, _)| (bits >> i) & 1 == 1)
            .map(|(_, n)| n.clone())
            .collect();
        let ty = Type::Flags(f);
        let value = Value::Flags(names);
        prop_assert_eq!(core_roundtrip(&ty, &value), value.clone());
        prop_assert_eq!(memory_roundtrip(&ty, &value), value);
    }

    #[test]
    fn roundtrip_variant(value in variant_strategy()) {
        let ty = Type::Variant(sample_variant());
        prop_assert_eq!(core_roundtrip(&ty, &value), value.clone());
        prop_assert_eq!(memory_roundtrip(&ty, &value), value);
    }

    #[test]
    fn roundtrip_result(value in result_strategy()) {
        let ty = Type::Result(ResultType::new(Some(Type::U32), Some(Type::String)));
        prop_assert_eq!(core_roundtrip(&ty, &value), value.clone());
        prop_assert_eq!(memory_roundtrip(&ty, &value), value);
    }

    // Validation properties: no out-of-range pattern survives a lift.

    #[test]
    fn rejects_u8_out_of_range(v in 256i32..) {
        prop_assert!(matches!(
            lift_one(&Type::U8, CoreValue::I32(v)),
            Err(DecodeError::OutOfRange { ty: "u8", .. })
        ), "expected OutOfRange for u8");
    }

    #[test]
    fn rejects_u8_negative(v in i32::MIN..0) {
        prop_assert!(matches!(
            lift_one(&Type::U8, CoreValue::I32(v)),
            Err(DecodeError::OutOfRange { ty: "u8", .. })
        ), "expected OutOfRange for u8");
    }

    #[test]
    fn rejects_s16_out_of_range(v in 32768i32..) {
        prop_assert!(matches!(
            lift_one(&Type::S16, CoreValue::I32(v)),
            Err(DecodeError::OutOfRange { ty: "s16", .. })
        ), "expected OutOfRange for s16");
    }

    #[test]
    fn rejects_bool_beyond_one(v in 2i32..) {
        prop_assert!(matches!(
            lift_one(&Type::Bool, CoreValue::I32(v)),
            Err(DecodeError::InvalidDiscriminant { .. })
        ), "expected InvalidDiscriminant for bool");
    }

    #[test]
    fn rejects_surrogate_chars(code in 0xD800u32..=0xDFFF) {
        prop_assert_eq!(
            lift_one(&Type::Char, CoreValue::I32(code as i32)),
            Err(DecodeError::InvalidChar(code))
        );
    }

    #[test]
    fn rejects_chars_beyond_unicode(code in 0x11_0000u32..) {
        prop_assert_eq!(
            lift_one(&Type::Char, CoreValue::I32(code as i32)),
            Err(DecodeError::InvalidChar(code))
        );
    }

    #[test]
    fn rejects_enum_discriminant_past_cases(disc in 3u32..10_000) {
        let ty = Type::Enum(sample_enum());
        prop_assert!(matches!(
            lift_one(&ty, CoreValue::I32(disc as i32)),
            Err(DecodeError::InvalidDiscriminant { num_cases: 3, .. })
        ), "expected InvalidDiscriminant with 3 cases");
    }
}

fn sample_variant() -> VariantType {
    use wit_boundary::abi::Case;
    VariantType::new(
        "shape",
        [
            Case::new("empty", None),
            Case::new("count", Some(Type::U32)),
            Case::new("scale", Some(Type::F64)),
        ],
    )
}

fn variant_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::variant("empty", None)),
        any::<u32>().prop_map(|v| Value::variant("count", Some(Value::U32(v)))),
        any::<u64>()
            .prop_map(f64::from_bits)
            .prop_filter("NaN breaks structural equality", |f| !f.is_nan())
            .prop_map(|f| Value::variant("scale", Some(Value::F64(f)))),
    ]
}

fn result_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<u32>().prop_map(|v| Value::Result(Ok(Some(Box::new(Value::U32(v)))))),
        ".*".prop_map(|s: String| Value::Result(Err(Some(Box::new(Value::String(s)))))),
    ]
}
