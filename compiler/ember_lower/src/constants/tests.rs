#![allow(clippy::unwrap_used)]

use ember_ir::{Attr, Op, Type};
use num_bigint::BigInt;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::test_helpers::{builder, builder_for, define, loc};
use crate::LowerError;

fn const_of(b: &ModuleBuilder, v: ValueId) -> Attr {
    let func = b.current_function().unwrap();
    match b.module().function(func).defining_op(v) {
        Some(Op::Const(attr)) => attr.clone(),
        other => panic!("expected a constant, found {other:?}"),
    }
}

#[test]
fn atoms_zero_and_one_fold_to_booleans() {
    let mut b = builder();
    define(&mut b, "m:f/0", 0);
    let f = b.build_constant_atom(&loc(), 0, "false").unwrap();
    let t = b.build_constant_atom(&loc(), 1, "true").unwrap();
    let ok = b.build_constant_atom(&loc(), 2, "ok").unwrap();

    assert_eq!(const_of(&b, f), Attr::Bool(false));
    assert_eq!(const_of(&b, t), Attr::Bool(true));
    assert_eq!(b.value_type(t).unwrap(), Type::Boolean);
    assert_eq!(const_of(&b, ok), atom_attr(2, "ok"));
    assert_eq!(b.value_type(ok).unwrap(), Type::Atom);
}

#[test]
fn atom_attr_never_folds() {
    assert_eq!(atom_attr(1, "true").ty(), Type::Atom);
}

#[test]
fn integers_use_the_target_immediate_width() {
    for (triple, bits) in [
        ("x86_64-unknown-linux-gnu", 47),
        ("aarch64-apple-darwin", 60),
        ("wasm32-unknown-unknown", 28),
    ] {
        let mut b = builder_for(triple);
        define(&mut b, "m:f/0", 0);
        let v = b.build_constant_int(&loc(), 42).unwrap();
        assert_eq!(const_of(&b, v), int_attr(42, bits), "{triple}");
        assert_eq!(b.value_type(v).unwrap(), Type::Fixnum);
    }
}

#[test]
fn oversized_integer_becomes_bigint() {
    let mut b = builder_for("wasm32-unknown-unknown");
    define(&mut b, "m:f/0", 0);
    let v = b.build_constant_int(&loc(), 1 << 40).unwrap();
    assert_eq!(b.value_type(v).unwrap(), Type::BigInt);
    assert_eq!(
        const_of(&b, v),
        Attr::BigInt {
            value: BigInt::from(1i64 << 40),
            width: 64
        }
    );
}

#[test]
fn bigint_literal_is_parsed_base_ten() {
    let mut b = builder();
    define(&mut b, "m:f/0", 0);
    let v = b
        .build_constant_bigint(&loc(), "123456789012345678901234567890", 128)
        .unwrap();
    let expected = BigInt::parse_bytes(b"123456789012345678901234567890", 10).unwrap();
    assert_eq!(
        const_of(&b, v),
        Attr::BigInt {
            value: expected,
            width: 128
        }
    );
}

#[test]
fn malformed_bigint_literal_is_fatal() {
    assert_eq!(
        bigint_attr("12ab", 64),
        Err(LowerError::InvalidBigInt {
            literal: "12ab".to_owned()
        })
    );
}

#[test]
fn bigint_literal_must_fit_its_width() {
    assert_eq!(
        bigint_attr("300", 8),
        Err(LowerError::BigIntOverflow {
            literal: "300".to_owned(),
            width: 8
        })
    );
    assert_eq!(
        bigint_attr("128", 8),
        Err(LowerError::BigIntOverflow {
            literal: "128".to_owned(),
            width: 8
        })
    );
    assert!(bigint_attr("127", 8).is_ok());
    assert!(bigint_attr("-128", 8).is_ok());
    assert!(bigint_attr("-129", 8).is_err());
    assert!(bigint_attr("0", 0).is_err());
}

#[test]
fn empty_list_is_nil() {
    let mut b = builder();
    define(&mut b, "m:f/0", 0);
    let v = b.build_constant_list(&loc(), vec![]).unwrap();
    assert_eq!(const_of(&b, v), Attr::Nil);
    assert_eq!(b.value_type(v).unwrap(), Type::Nil);

    let l = b
        .build_constant_list(&loc(), vec![int_attr(1, 47), nil_attr()])
        .unwrap();
    assert_eq!(b.value_type(l).unwrap(), Type::List);
}

#[test]
fn aggregates_nest_attributes() {
    let mut b = builder();
    define(&mut b, "m:f/0", 0);
    let inner = tuple_attr(vec![atom_attr(5, "a"), float_attr(1.5)]);
    let v = b
        .build_constant_tuple(&loc(), vec![inner.clone(), binary_attr(b"hi".to_vec(), 1, 2)])
        .unwrap();
    assert_eq!(b.value_type(v).unwrap(), Type::Tuple(2));
    let Attr::Tuple(elements) = const_of(&b, v) else {
        panic!("expected a tuple constant");
    };
    assert_eq!(elements[0], inner);
}

#[test]
fn map_constant_requires_keys_and_values() {
    let mut b = builder();
    define(&mut b, "m:f/0", 0);
    let good = vec![MapAttrEntry::new(atom_attr(5, "a"), int_attr(1, 47))];
    let v = b.build_constant_map(&loc(), good).unwrap();
    assert_eq!(b.value_type(v).unwrap(), Type::Map);

    let missing_key = vec![
        MapAttrEntry::new(atom_attr(5, "a"), int_attr(1, 47)),
        MapAttrEntry {
            key: None,
            value: Some(nil_attr()),
        },
    ];
    assert_eq!(
        b.build_constant_map(&loc(), missing_key),
        Err(LowerError::MissingMapConstantKey { index: 1 })
    );
    let missing_value = vec![MapAttrEntry {
        key: Some(nil_attr()),
        value: None,
    }];
    assert_eq!(
        map_attr(missing_value),
        Err(LowerError::MissingMapConstantValue { index: 0 })
    );
}

#[test]
fn float_and_binary_constants_are_typed() {
    let mut b = builder();
    define(&mut b, "m:f/0", 0);
    let f = b.build_constant_float(&loc(), 2.5).unwrap();
    let bin = b.build_constant_binary(&loc(), b"abc".to_vec(), 0, 0).unwrap();
    assert_eq!(b.value_type(f).unwrap(), Type::Float);
    assert_eq!(b.value_type(bin).unwrap(), Type::Binary);
}

proptest! {
    #[test]
    fn immediate_range_matches_width(value in any::<i64>(), bits in 2u32..64) {
        let half = 1i128 << (bits - 1);
        let expected = (-half..half).contains(&i128::from(value));
        prop_assert_eq!(fits_immediate(value, bits), expected);
    }
}
