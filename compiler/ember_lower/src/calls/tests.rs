#![allow(clippy::unwrap_used)]

use ember_ir::{ArithOp, Attr, CallFlags, CatchTypeKind, CmpOp, Op, Terminator, Type};
use pretty_assertions::assert_eq;

use super::{parse_symbol, CallSite, Intrinsic};
use crate::test_helpers::{
    block, builder, builder_for, call_flags, count_ops, define, loc, simulate, term, Oracle,
    Outcome, Sim,
};
use crate::types::tag;
use crate::{runtime, ClosureDescriptor, LowerError, ModuleBuilder, TypeDescriptor};

fn site(args: Vec<ember_ir::ValueId>) -> CallSite {
    CallSite::new(loc(), args)
}

/// Return the current block's first argument.
fn return_arg(b: &mut ModuleBuilder, at: ember_ir::BlockId) {
    b.position_at_end(at).unwrap();
    let v = b.current_block_argument(0).unwrap();
    b.build_return(&loc(), Some(v)).unwrap();
}

/// An error block taking `(kind, reason, trace)` that returns the reason.
fn err_block(b: &mut ModuleBuilder, func: ember_ir::FuncId) -> ember_ir::BlockId {
    let err = block(b, func, 3);
    let here = b.current_block().unwrap();
    b.position_at_end(err).unwrap();
    let reason = b.current_block_argument(1).unwrap();
    b.build_return(&loc(), Some(reason)).unwrap();
    b.position_at_end(here).unwrap();
    err
}

// ── Symbols ─────────────────────────────────────────────────────────

#[test]
fn symbols_carry_an_arity() {
    assert_eq!(parse_symbol("m:f/2").unwrap(), ("m:f", 2));
    assert_eq!(parse_symbol("erlang://2").unwrap(), ("erlang:/", 2));
    for bad in ["m:f", "m:f/x", "/2", ""] {
        assert_eq!(
            parse_symbol(bad),
            Err(LowerError::InvalidCallSymbol {
                symbol: bad.to_owned()
            })
        );
    }
}

#[test]
fn invalid_symbol_is_rejected_before_emission() {
    let mut b = builder();
    define(&mut b, "m:f/0", 0);
    assert!(matches!(
        b.build_static_call("nonsense", &site(vec![]).tail()),
        Err(LowerError::InvalidCallSymbol { .. })
    ));
    assert!(b.module().function_by_name("nonsense").is_none());
}

// ── Tail calls ──────────────────────────────────────────────────────

#[test]
fn tail_call_is_musttail_when_arities_match() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    b.build_static_call("m:g/1", &site(vec![x]).tail()).unwrap();
    assert_eq!(call_flags(b.module(), decl.func, "m:g/1"), vec![CallFlags::MUSTTAIL]);
    assert!(matches!(
        b.module().function(decl.func).block(decl.entry).terminator(),
        Some(Terminator::Return { values }) if values.len() == 1
    ));
    assert!(b.finish().success);
}

#[test]
fn tail_call_with_other_arity_is_only_hinted() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    b.build_static_call("m:g/2", &site(vec![x, x]).tail()).unwrap();
    assert_eq!(call_flags(b.module(), decl.func, "m:g/2"), vec![CallFlags::TAIL]);
    assert!(b.finish().success);
}

#[test]
fn wasm_tail_calls_are_always_musttail() {
    let mut b = builder_for("wasm32-unknown-unknown");
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    b.build_static_call("m:g/2", &site(vec![x, x]).tail()).unwrap();
    assert_eq!(call_flags(b.module(), decl.func, "m:g/2"), vec![CallFlags::MUSTTAIL]);
}

// ── Ordinary calls ──────────────────────────────────────────────────

#[test]
fn ordinary_call_is_hinted_and_continues() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let ok = block(&mut b, decl.func, 2);
    b.build_static_call("m:g/1", &site(vec![x]).ok(ok).ok_args(vec![x]))
        .unwrap();
    b.position_at_end(ok).unwrap();
    let carried = b.current_block_argument(1).unwrap();
    b.build_return(&loc(), Some(carried)).unwrap();

    assert_eq!(call_flags(b.module(), decl.func, "m:g/1"), vec![CallFlags::TAIL]);
    let run = simulate(b.module(), decl.func, &[Sim::Int(3)], &mut Oracle::default());
    assert_eq!(run.calls, vec!["m:g/1".to_owned()]);
    assert_eq!(run.block_args[&ok], vec![Sim::Unknown, Sim::Int(3)]);
    assert_eq!(run.outcome, Outcome::Return(vec![Sim::Int(3)]));
    assert!(b.finish().success);
}

#[test]
fn call_without_continuation_returns_result() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/0", 0);
    b.build_static_call("m:g/0", &site(vec![])).unwrap();
    assert!(matches!(
        b.module().function(decl.func).block(decl.entry).terminator(),
        Some(Terminator::Return { .. })
    ));
    assert!(b.finish().success);
}

#[test]
fn arguments_are_cast_to_declared_parameters() {
    let mut b = builder();
    b.declare_function("m:g/1", &[TypeDescriptor::simple(tag::FIXNUM)], Some(&term()))
        .unwrap();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    b.build_static_call("m:g/1", &site(vec![x]).tail()).unwrap();

    let f = b.module().function(decl.func);
    assert_eq!(
        f.block(decl.entry).body()[0].op,
        Op::Cast {
            value: x,
            to: Type::Fixnum
        }
    );
    assert!(b.finish().success);
}

#[test]
fn unknown_callee_is_forward_declared() {
    let mut b = builder();
    define(&mut b, "m:f/0", 0);
    let nil = b.build_constant_nil(&loc()).unwrap();
    b.build_static_call("other:g/1", &site(vec![nil]).tail()).unwrap();
    let g = b.module().function_by_name("other:g/1").unwrap();
    let g = b.module().function(g);
    assert!(g.is_declaration());
    assert_eq!(g.signature().params, vec![Type::Term]);
    assert_eq!(g.signature().results, vec![Type::Term]);
}

// ── Invokes ─────────────────────────────────────────────────────────

#[test]
fn fallible_call_becomes_invoke_with_landing_pad() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let ok = block(&mut b, decl.func, 1);
    let err = err_block(&mut b, decl.func);
    b.build_static_call("m:g/1", &site(vec![x]).ok(ok).err(err)).unwrap();
    return_arg(&mut b, ok);

    let module = b.module();
    let f = module.function(decl.func);
    let Some(Terminator::Invoke { normal, unwind, .. }) = f.block(decl.entry).terminator() else {
        panic!("expected an invoke");
    };
    assert_eq!(*normal, ok);
    assert!(matches!(
        f.block(*unwind).body()[0].op,
        Op::LandingPad { .. }
    ));
    assert_eq!(f.value_type(f.block(err).params()[2]), &Type::TraceRef);

    let normal_run = simulate(module, decl.func, &[Sim::Nil], &mut Oracle::default());
    assert!(normal_run.reached(ok));
    assert!(!normal_run.reached(err));

    let mut throwing = Oracle {
        invoke_throws: true,
        ..Oracle::default()
    };
    let unwind_run = simulate(module, decl.func, &[Sim::Nil], &mut throwing);
    assert!(unwind_run.reached(err));
    assert!(!unwind_run.reached(ok));
    assert!(b.finish().success);
}

#[test]
fn tail_position_ignores_error_block() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let err = err_block(&mut b, decl.func);
    b.build_static_call("m:g/1", &site(vec![x]).err(err).tail()).unwrap();
    let f = b.module().function(decl.func);
    assert_eq!(count_ops(f, |op| matches!(op, Op::LandingPad { .. })), 0);
}

#[test]
fn landing_pad_is_reused_per_error_block() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let mid = block(&mut b, decl.func, 1);
    let ok = block(&mut b, decl.func, 1);
    let err = err_block(&mut b, decl.func);
    b.build_static_call("m:g/1", &site(vec![x]).ok(mid).err(err)).unwrap();
    b.position_at_end(mid).unwrap();
    let y = b.current_block_argument(0).unwrap();
    b.build_static_call("m:h/1", &site(vec![y]).ok(ok).err(err)).unwrap();
    return_arg(&mut b, ok);

    let f = b.module().function(decl.func);
    assert_eq!(count_ops(f, |op| matches!(op, Op::LandingPad { .. })), 1);
    assert_eq!(count_ops(f, |op| matches!(op, Op::CatchType(_))), 1);
    assert!(matches!(
        f.block(decl.entry).body()[0].op,
        Op::CatchType(CatchTypeKind::Null)
    ));
    assert!(b.finish().success);
}

#[test]
fn seh_targets_catch_through_type_info_global() {
    let mut b = builder_for("x86_64-pc-windows-msvc");
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let ok = block(&mut b, decl.func, 1);
    let err = err_block(&mut b, decl.func);
    b.build_static_call("m:g/1", &site(vec![x]).ok(ok).err(err)).unwrap();
    return_arg(&mut b, ok);

    let global = b.module().global_by_name(runtime::ERROR_TYPE_INFO).unwrap();
    assert!(!b.module().global(global).external);
    let f = b.module().function(decl.func);
    assert_eq!(
        f.block(decl.entry).body()[0].op,
        Op::CatchType(CatchTypeKind::Global(global))
    );
    assert!(b.finish().success);
}

#[test]
fn dwarf_targets_declare_no_type_info() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let ok = block(&mut b, decl.func, 1);
    let err = err_block(&mut b, decl.func);
    b.build_static_call("m:g/1", &site(vec![x]).ok(ok).err(err)).unwrap();
    assert!(b.module().global_by_name(runtime::ERROR_TYPE_INFO).is_none());
}

#[test]
fn invoke_without_continuation_synthesizes_a_return() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let err = err_block(&mut b, decl.func);
    b.build_static_call("m:g/1", &site(vec![x]).err(err)).unwrap();

    let run = simulate(b.module(), decl.func, &[Sim::Nil], &mut Oracle::default());
    assert_eq!(run.outcome, Outcome::Return(vec![Sim::Unknown]));
    assert!(b.finish().success);
}

#[test]
fn invoke_result_is_cast_on_the_way_to_a_typed_continuation() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let ok = b
        .append_block(decl.func, &[TypeDescriptor::simple(tag::FIXNUM)])
        .unwrap();
    let err = err_block(&mut b, decl.func);
    b.build_static_call("m:g/1", &site(vec![x]).ok(ok).err(err)).unwrap();
    return_arg(&mut b, ok);

    let f = b.module().function(decl.func);
    let Some(Terminator::Invoke { normal, .. }) = f.block(decl.entry).terminator() else {
        panic!("expected an invoke");
    };
    assert_ne!(*normal, ok);
    assert!(matches!(
        f.block(*normal).body()[0].op,
        Op::Cast { to: Type::Fixnum, .. }
    ));
    assert!(b.finish().success);
}

#[test]
fn error_block_needs_three_parameters() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let err = block(&mut b, decl.func, 2);
    assert_eq!(
        b.build_static_call("m:g/1", &site(vec![x]).err(err)),
        Err(LowerError::MissingBlockArgument {
            block: err,
            expected: 3,
            found: 2
        })
    );
}

// ── Closures and dynamic calls ──────────────────────────────────────

#[test]
fn closure_without_env_is_called_directly() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let closure = b
        .build_closure(&ClosureDescriptor {
            loc: loc(),
            callee: "m:lambda/1".to_owned(),
            arity: 1,
            env: vec![],
        })
        .unwrap();
    b.build_closure_call(closure, &site(vec![x]).tail()).unwrap();

    assert_eq!(call_flags(b.module(), decl.func, "m:lambda/1").len(), 1);
    assert!(b.module().function_by_name(runtime::APPLY_2).is_none());
    assert!(b.finish().success);
}

#[test]
fn closure_with_env_goes_through_apply() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let closure = b
        .build_closure(&ClosureDescriptor {
            loc: loc(),
            callee: "m:lambda/2".to_owned(),
            arity: 2,
            env: vec![x],
        })
        .unwrap();
    b.build_closure_call(closure, &site(vec![x]).tail()).unwrap();

    let module = b.module();
    assert_eq!(call_flags(module, decl.func, runtime::APPLY_2).len(), 1);
    assert!(call_flags(module, decl.func, "m:lambda/2").is_empty());
    // [x | nil]
    assert_eq!(
        count_ops(module.function(decl.func), |op| matches!(op, Op::Cons { .. })),
        1
    );
    assert!(b.finish().success);
}

#[test]
fn unknown_closure_goes_through_apply() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/2", 2);
    let fun = b.block_argument(decl.entry, 0).unwrap();
    let arg = b.block_argument(decl.entry, 1).unwrap();
    let ok = block(&mut b, decl.func, 1);
    b.build_closure_call(fun, &site(vec![arg]).ok(ok)).unwrap();
    return_arg(&mut b, ok);

    let run = simulate(b.module(), decl.func, &[Sim::Unknown, Sim::Nil], &mut Oracle::default());
    assert_eq!(run.calls, vec![runtime::APPLY_2.to_owned()]);
    assert!(b.finish().success);
}

#[test]
fn dynamic_call_uses_apply_three_with_proper_list() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/4", 4);
    let params = b.module().function(decl.func).block(decl.entry).params().to_vec();
    b.build_global_dynamic_call(params[0], params[1], &site(vec![params[2], params[3]]).tail())
        .unwrap();

    let module = b.module();
    let f = module.function(decl.func);
    let apply = module.function_by_name(runtime::APPLY_3).unwrap();
    assert_eq!(module.function(apply).signature().params.len(), 3);
    // [a, b | nil]
    assert_eq!(count_ops(f, |op| matches!(op, Op::Cons { .. })), 2);
    assert_eq!(count_ops(f, |op| matches!(op, Op::Const(Attr::Nil))), 1);
    let args = f
        .block(decl.entry)
        .body()
        .iter()
        .find_map(|inst| match &inst.op {
            Op::Call { args, .. } => Some(args.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(&args[..2], &params[..2]);
    // The list is cast to apply/3's term parameter.
    let list = match f.defining_op(args[2]) {
        Some(Op::Cast { value, to: Type::Term }) => *value,
        other => panic!("expected a cast to term, got {other:?}"),
    };
    assert!(matches!(f.defining_op(list), Some(Op::Cons { .. })));
    assert!(b.finish().success);
}

// ── Intrinsics ──────────────────────────────────────────────────────

#[test]
fn intrinsic_table_covers_operators() {
    assert_eq!(
        Intrinsic::from_symbol("erlang:+/2"),
        Some(Intrinsic::Arith(ArithOp::Add))
    );
    assert_eq!(
        Intrinsic::from_symbol("erlang:-/1"),
        Some(Intrinsic::Arith(ArithOp::Neg))
    );
    assert_eq!(
        Intrinsic::from_symbol("erlang:=/=/2"),
        Some(Intrinsic::Compare(CmpOp::Ne, true))
    );
    assert_eq!(
        Intrinsic::from_symbol("erlang:is_function/1"),
        Some(Intrinsic::IsType(Type::Closure))
    );
    assert_eq!(Intrinsic::from_symbol("erlang:spawn/1"), None);
    assert_eq!(Intrinsic::Raise3.arity(), 3);
    assert_eq!(Intrinsic::Arith(ArithOp::Neg).arity(), 1);
    assert_eq!(Intrinsic::IsType(Type::Map).arity(), 1);
}

#[test]
fn arithmetic_intrinsic_is_inlined() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/2", 2);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let y = b.block_argument(decl.entry, 1).unwrap();
    let ok = block(&mut b, decl.func, 1);
    b.build_static_call("erlang:+/2", &site(vec![x, y]).ok(ok)).unwrap();
    return_arg(&mut b, ok);

    let module = b.module();
    assert!(module.function_by_name("erlang:+/2").is_none());
    let f = module.function(decl.func);
    assert_eq!(
        count_ops(f, |op| matches!(op, Op::Arith { op: ArithOp::Add, .. })),
        1
    );
    assert_eq!(count_ops(f, |op| matches!(op, Op::Call { .. })), 0);
    assert!(b.finish().success);
}

#[test]
fn comparison_intrinsic_narrows_continuation() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/2", 2);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let y = b.block_argument(decl.entry, 1).unwrap();
    let ok = block(&mut b, decl.func, 1);
    b.build_static_call("erlang:/=/2", &site(vec![x, y]).ok(ok)).unwrap();

    let f = b.module().function(decl.func);
    assert_eq!(f.value_type(f.block(ok).params()[0]), &Type::I1);
    assert_eq!(
        count_ops(f, |op| matches!(op, Op::Cmp { op: CmpOp::Eq, strict: false, .. })),
        1
    );
    return_arg(&mut b, ok);
    let run = simulate(b.module(), decl.func, &[Sim::Int(1), Sim::Int(2)], &mut Oracle::default());
    assert_eq!(run.outcome, Outcome::Return(vec![Sim::Bool(true)]));
    assert!(b.finish().success);
}

#[test]
fn tail_intrinsic_returns_immediately() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    b.build_static_call("erlang:is_atom/1", &site(vec![x]).tail()).unwrap();
    let run = simulate(b.module(), decl.func, &[Sim::Atom(5)], &mut Oracle::flags(&[false]));
    assert_eq!(run.outcome, Outcome::Return(vec![Sim::Bool(false)]));
    assert!(b.finish().success);
}

#[test]
fn error_intrinsics_throw_with_their_class() {
    for (symbol, arity, class) in [
        ("erlang:error/1", 1, runtime::ERROR_ATOM),
        ("erlang:error/2", 2, runtime::ERROR_ATOM),
        ("erlang:exit/1", 1, runtime::EXIT_ATOM),
        ("erlang:throw/1", 1, runtime::THROW_ATOM),
    ] {
        let mut b = builder();
        let decl = define(&mut b, "m:f/2", 2);
        let params = b.module().function(decl.func).block(decl.entry).params().to_vec();
        let ok = block(&mut b, decl.func, 1);
        b.build_static_call(symbol, &site(params[..arity].to_vec()).ok(ok))
            .unwrap();

        let run = simulate(b.module(), decl.func, &[Sim::Nil, Sim::Nil], &mut Oracle::default());
        assert_eq!(run.outcome, Outcome::Throw { kind: Sim::Atom(class) }, "{symbol}");
        assert!(!run.reached(ok), "{symbol} must not fall through");
    }
}

#[test]
fn error_two_wraps_reason_and_location() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/2", 2);
    let params = b.module().function(decl.func).block(decl.entry).params().to_vec();
    b.build_static_call("erlang:error/2", &site(params.clone())).unwrap();

    let f = b.module().function(decl.func);
    let Some(Terminator::Throw { reason, .. }) = f.block(decl.entry).terminator() else {
        panic!("expected a throw");
    };
    assert_eq!(
        f.defining_op(*reason),
        Some(&Op::Tuple {
            elements: params.clone()
        })
    );
}

#[test]
fn raise_forwards_its_arguments() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/3", 3);
    let params = b.module().function(decl.func).block(decl.entry).params().to_vec();
    b.build_static_call("erlang:raise/3", &site(params.clone())).unwrap();
    assert_eq!(
        b.module().function(decl.func).block(decl.entry).terminator(),
        Some(&Terminator::Throw {
            kind: params[0],
            reason: params[1],
            trace: params[2]
        })
    );
}

#[test]
fn fail_calls_the_runtime() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    let ok = block(&mut b, decl.func, 1);
    b.build_static_call("erlang:fail/1", &site(vec![x]).ok(ok)).unwrap();
    return_arg(&mut b, ok);
    assert_eq!(
        call_flags(b.module(), decl.func, runtime::BUILTIN_FAIL),
        vec![CallFlags::TAIL]
    );
    assert!(b.finish().success);
}

#[test]
fn intrinsic_arity_is_checked() {
    let mut b = builder();
    let decl = define(&mut b, "m:f/1", 1);
    let x = b.block_argument(decl.entry, 0).unwrap();
    assert_eq!(
        b.build_static_call("erlang:+/2", &site(vec![x]).tail()),
        Err(LowerError::IntrinsicArity {
            symbol: "erlang:+/2".to_owned(),
            expected: 2,
            found: 1
        })
    );
}
