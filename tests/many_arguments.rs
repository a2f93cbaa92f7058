//! Argument flattening at and past the register budget.
//!
//! Sixteen flat scalars travel directly; the seventeenth pushes the whole
//! argument list through a single pointer into a guest-allocated argument
//! area. Either way the host sees logical positions in declaration order.

use wit_boundary::adapter::{ParamsPassing, MAX_FLAT_PARAMS};
use wit_boundary::prelude::*;

fn u32_signature(name: &str, n: usize) -> Signature {
    let mut signature = Signature::new(name);
    for i in 0..n {
        signature = signature.param(format!("a{}", i + 1), Type::U32);
    }
    signature
}

fn adapter_for(signature: Signature) -> Adapter {
    let mut registry = SignatureRegistry::new();
    registry.register(signature);
    Adapter::new(registry)
}

#[test]
fn sixteen_arguments_arrive_in_declaration_order() {
    let adapter = adapter_for(u32_signature("many", MAX_FLAT_PARAMS));
    let core_args: Vec<CoreValue> = (1..=16).map(CoreValue::I32).collect();

    let mut seen = Vec::new();
    let mut host = |args: Vec<Value>| -> anyhow::Result<Option<Value>> {
        seen = args;
        Ok(None)
    };
    let mut memory = LinearMemory::new();
    let results = adapter
        .invoke("many", &mut host, &core_args, &mut memory)
        .unwrap();

    assert!(results.is_empty());
    let expected: Vec<Value> = (1..=16).map(Value::U32).collect();
    assert_eq!(seen, expected);
}

#[test]
fn seventeenth_argument_spills_the_whole_list() {
    let adapter = adapter_for(u32_signature("spill", 17));
    let plan = adapter.plan("spill").unwrap();
    assert_eq!(plan.core_param_count, 1);
    let offsets = match &plan.params {
        ParamsPassing::Indirect { offsets, size, .. } => {
            assert_eq!(*size, 68);
            offsets.clone()
        }
        other => panic!("expected spilled parameters, got {other:?}"),
    };

    // Lay the argument area out the way a guest would, at a deliberately
    // misaligned base.
    let base = 0x101u32;
    let mut memory = LinearMemory::new();
    for (i, offset) in offsets.iter().enumerate() {
        memory.write(base + offset, &(100 + i as u32).to_le_bytes());
    }

    let mut seen = Vec::new();
    let mut host = |args: Vec<Value>| -> anyhow::Result<Option<Value>> {
        seen = args;
        Ok(None)
    };
    adapter
        .invoke(
            "spill",
            &mut host,
            &[CoreValue::I32(base as i32)],
            &mut memory,
        )
        .unwrap();

    let expected: Vec<Value> = (0..17).map(|i| Value::U32(100 + i)).collect();
    assert_eq!(seen, expected);
}

#[test]
fn mixed_types_spill_with_natural_offsets() {
    // u64 forces 8-byte alignment inside the argument area; a string
    // element is its (ptr, len) pair.
    let mut signature = Signature::new("mixed");
    for i in 0..15 {
        signature = signature.param(format!("n{i}"), Type::U32);
    }
    signature = signature.param("big", Type::U64).param("s", Type::String);
    let adapter = adapter_for(signature);

    let plan = adapter.plan("mixed").unwrap();
    let offsets = match &plan.params {
        ParamsPassing::Indirect { offsets, align, .. } => {
            assert_eq!(*align, 8);
            // 15 u32s end at 60; u64 rounds up to 64; string pair at 72.
            assert_eq!(offsets.get(15), Some(&64));
            assert_eq!(offsets.get(16), Some(&72));
            offsets.clone()
        }
        other => panic!("expected spilled parameters, got {other:?}"),
    };

    let base = 0x40u32;
    let mut memory = LinearMemory::new();
    memory.write(0x400, b"spilled");
    for i in 0..15u32 {
        if let Some(offset) = offsets.get(i as usize) {
            memory.write(base + offset, &i.to_le_bytes());
        }
    }
    memory.write(base + 64, &0xDEAD_BEEF_CAFE_F00Du64.to_le_bytes());
    memory.write(base + 72, &0x400u32.to_le_bytes());
    memory.write(base + 76, &7u32.to_le_bytes());

    let mut seen = Vec::new();
    let mut host = |args: Vec<Value>| -> anyhow::Result<Option<Value>> {
        seen = args;
        Ok(None)
    };
    adapter
        .invoke(
            "mixed",
            &mut host,
            &[CoreValue::I32(base as i32)],
            &mut memory,
        )
        .unwrap();

    let mut expected: Vec<Value> = (0..15).map(Value::U32).collect();
    expected.push(Value::U64(0xDEAD_BEEF_CAFE_F00D));
    expected.push(Value::from("spilled"));
    assert_eq!(seen, expected);
}

#[test]
fn spilled_arguments_still_validate() {
    // Validation applies identically to spilled parameters: an invalid
    // bool inside the argument area fails the call with its position.
    let mut signature = Signature::new("spill-bool");
    for i in 0..16 {
        signature = signature.param(format!("n{i}"), Type::U32);
    }
    signature = signature.param("flag", Type::Bool);
    let adapter = adapter_for(signature);

    let base = 0x10u32;
    let mut memory = LinearMemory::new();
    for i in 0..16u32 {
        memory.write(base + i * 4, &i.to_le_bytes());
    }
    memory.write(base + 64, &[7]); // not 0 or 1

    let mut called = false;
    let mut host = |_: Vec<Value>| -> anyhow::Result<Option<Value>> {
        called = true;
        Ok(None)
    };
    let err = adapter
        .invoke(
            "spill-bool",
            &mut host,
            &[CoreValue::I32(base as i32)],
            &mut memory,
        )
        .expect_err("invalid spilled bool must fail");
    assert!(!called);
    match err {
        AdapterError::Parameter {
            index: 16,
            name,
            source: DecodeError::InvalidDiscriminant { discriminant: 7, .. },
        } => assert_eq!(name, "flag"),
        other => panic!("expected parameter 16 failure, got {other:?}"),
    }
}

#[test]
fn scalar_result_returns_directly() {
    let adapter = adapter_for(
        Signature::new("add")
            .param("a", Type::U32)
            .param("b", Type::U32)
            .result(Type::U32),
    );
    let mut host = |args: Vec<Value>| -> anyhow::Result<Option<Value>> {
        match (args.first(), args.get(1)) {
            (Some(Value::U32(a)), Some(Value::U32(b))) => Ok(Some(Value::U32(a + b))),
            _ => Err(anyhow::anyhow!("bad args")),
        }
    };
    let mut memory = LinearMemory::new();
    let results = adapter
        .invoke(
            "add",
            &mut host,
            &[CoreValue::I32(2), CoreValue::I32(40)],
            &mut memory,
        )
        .unwrap();
    assert_eq!(results, vec![CoreValue::I32(42)]);
}

#[test]
fn composite_result_goes_through_return_area() {
    let point = RecordType::new(
        "point",
        [Field::new("x", Type::U32), Field::new("y", Type::U32)],
    );
    let adapter = adapter_for(
        Signature::new("get-point")
            .param("which", Type::U32)
            .result(Type::Record(point.clone())),
    );

    let mut host = |_: Vec<Value>| -> anyhow::Result<Option<Value>> {
        Ok(Some(Value::record([
            ("x", Value::U32(7)),
            ("y", Value::U32(11)),
        ])))
    };
    let retptr = 0x20u32;
    let mut memory = LinearMemory::with_size(0x40);
    // Caller supplies the return-area pointer as the final core argument.
    let results = adapter
        .invoke(
            "get-point",
            &mut host,
            &[CoreValue::I32(5), CoreValue::I32(retptr as i32)],
            &mut memory,
        )
        .unwrap();

    // The adapter hands back the same pointer and the record lands there.
    assert_eq!(results, vec![CoreValue::I32(retptr as i32)]);
    let lifted = Lifter::new(&memory)
        .lift_memory(&Type::Record(point), retptr)
        .unwrap();
    assert_eq!(
        lifted,
        Value::record([("x", Value::U32(7)), ("y", Value::U32(11))])
    );
}

#[test]
fn unknown_function_is_reported() {
    let adapter = adapter_for(u32_signature("known", 1));
    let mut host = |_: Vec<Value>| -> anyhow::Result<Option<Value>> { Ok(None) };
    let mut memory = LinearMemory::new();
    let err = adapter
        .invoke("unknown", &mut host, &[CoreValue::I32(0)], &mut memory)
        .expect_err("unknown function must fail");
    match err {
        AdapterError::UnknownFunction(name) => assert_eq!(name, "unknown"),
        other => panic!("expected UnknownFunction, got {other:?}"),
    }
}

#[test]
fn arity_mismatch_is_reported() {
    let adapter = adapter_for(u32_signature("two", 2));
    let mut host = |_: Vec<Value>| -> anyhow::Result<Option<Value>> { Ok(None) };
    let mut memory = LinearMemory::new();
    let err = adapter
        .invoke("two", &mut host, &[CoreValue::I32(0)], &mut memory)
        .expect_err("short argument list must fail");
    match err {
        AdapterError::ArityMismatch { expected: 2, got: 1, .. } => {}
        other => panic!("expected ArityMismatch, got {other:?}"),
    }
}
