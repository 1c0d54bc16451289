//! Test helpers for lowering tests.
//!
//! Besides small constructors for common setups, this provides a tiny
//! interpreter over the emitted control-flow graph so tests can assert on
//! where control goes for given inputs rather than on the exact shape of
//! the emitted instructions.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;

use ember_ir::{Attr, BlockId, CallFlags, CmpOp, FuncId, Function, Module, Op, Terminator, ValueId};
use rustc_hash::FxHashMap;

use crate::{FunctionDecl, LowerConfig, ModuleBuilder, TargetInfo, TypeDescriptor};

pub(crate) fn loc() -> ember_ir::Location {
    ember_ir::Location::file_line_col("test.erl", 1, 1)
}

pub(crate) fn term() -> TypeDescriptor {
    TypeDescriptor::opaque()
}

pub(crate) fn builder() -> ModuleBuilder {
    ModuleBuilder::new(LowerConfig::new("test"))
}

pub(crate) fn builder_for(triple: &str) -> ModuleBuilder {
    let target = TargetInfo::from_triple(triple).unwrap();
    ModuleBuilder::new(LowerConfig::new("test").with_target(target))
}

/// Define `name` with `arity` opaque parameters and an opaque result.
pub(crate) fn define(b: &mut ModuleBuilder, name: &str, arity: usize) -> FunctionDecl {
    let params = vec![term(); arity];
    b.create_function(name, &params, Some(&term())).unwrap()
}

/// Append a block with `arity` opaque parameters to `func`.
pub(crate) fn block(b: &mut ModuleBuilder, func: FuncId, arity: usize) -> BlockId {
    b.append_block(func, &vec![term(); arity]).unwrap()
}

/// Number of instructions in `func` whose operation satisfies `pred`.
pub(crate) fn count_ops(func: &Function, pred: impl Fn(&Op) -> bool) -> usize {
    func.layout()
        .iter()
        .flat_map(|&b| func.block(b).body())
        .filter(|inst| pred(&inst.op))
        .count()
}

/// Flags of every call in `func` to the function named `callee`.
pub(crate) fn call_flags(module: &Module, func: FuncId, callee: &str) -> Vec<CallFlags> {
    let target = module.function_by_name(callee);
    let f = module.function(func);
    f.layout()
        .iter()
        .flat_map(|&b| f.block(b).body())
        .filter_map(|inst| match &inst.op {
            Op::Call { callee, flags, .. } if Some(*callee) == target => Some(*flags),
            _ => None,
        })
        .collect()
}

// ── CFG simulation ──────────────────────────────────────────────────

/// Abstract run-time value.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Sim {
    Bool(bool),
    Int(i64),
    Atom(u64),
    Nil,
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Outcome {
    Return(Vec<Sim>),
    Throw { kind: Sim },
    Unreachable,
    /// Reached a block with no terminator.
    Stuck(BlockId),
}

#[derive(Clone, Debug)]
pub(crate) struct Run {
    pub visited: Vec<BlockId>,
    /// Names of called functions, in order, including invokes.
    pub calls: Vec<String>,
    /// Arguments each visited block received.
    pub block_args: FxHashMap<BlockId, Vec<Sim>>,
    pub outcome: Outcome,
}

impl Run {
    pub(crate) fn reached(&self, block: BlockId) -> bool {
        self.visited.contains(&block)
    }
}

/// Answers for operations the simulator cannot evaluate.
#[derive(Clone, Debug, Default)]
pub(crate) struct Oracle {
    /// Outcomes of fallible steps and opaque tests, consumed in order.
    pub flags: VecDeque<bool>,
    /// Status reported by receive waits.
    pub receive_status: i8,
    /// Whether invokes unwind.
    pub invoke_throws: bool,
}

impl Oracle {
    pub(crate) fn flags(flags: &[bool]) -> Self {
        Oracle {
            flags: flags.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn next_flag(&mut self) -> Sim {
        Sim::Bool(self.flags.pop_front().unwrap_or(true))
    }
}

/// Run `func` from its entry block with `params`.
pub(crate) fn simulate(module: &Module, func: FuncId, params: &[Sim], oracle: &mut Oracle) -> Run {
    let f = module.function(func);
    let mut env: FxHashMap<ValueId, Sim> = FxHashMap::default();
    let mut run = Run {
        visited: Vec::new(),
        calls: Vec::new(),
        block_args: FxHashMap::default(),
        outcome: Outcome::Unreachable,
    };
    let mut current = f.entry().unwrap();
    let mut incoming: Vec<Sim> = params.to_vec();

    for _ in 0..1000 {
        let blk = f.block(current);
        run.visited.push(current);
        for (&p, v) in blk.params().iter().zip(&incoming) {
            env.insert(p, v.clone());
        }
        run.block_args.insert(current, incoming.clone());

        for inst in blk.body() {
            let values = eval_op(module, &inst.op, &env, oracle, &mut run.calls, inst.results.len());
            for (&r, v) in inst.results.iter().zip(values) {
                env.insert(r, v);
            }
        }

        let get = |v: &ValueId| env.get(v).cloned().unwrap_or(Sim::Unknown);
        let (next, args) = match blk.terminator() {
            None => {
                run.outcome = Outcome::Stuck(current);
                return run;
            }
            Some(Terminator::Return { values }) => {
                run.outcome = Outcome::Return(values.iter().map(get).collect());
                return run;
            }
            Some(Terminator::Throw { kind, .. }) => {
                run.outcome = Outcome::Throw { kind: get(kind) };
                return run;
            }
            Some(Terminator::Unreachable) => {
                run.outcome = Outcome::Unreachable;
                return run;
            }
            Some(Terminator::Br { dest, args }) => (*dest, args.iter().map(get).collect()),
            Some(Terminator::CondBr {
                cond,
                then_dest,
                then_args,
                else_dest,
                else_args,
            }) => match get(cond) {
                Sim::Bool(true) => (*then_dest, then_args.iter().map(get).collect()),
                Sim::Bool(false) => (*else_dest, else_args.iter().map(get).collect()),
                other => panic!("branch on non-boolean {other:?} in {current}"),
            },
            Some(Terminator::Invoke {
                callee,
                normal,
                normal_args,
                unwind,
                ..
            }) => {
                run.calls.push(module.function(*callee).name().to_owned());
                if oracle.invoke_throws {
                    (*unwind, Vec::new())
                } else {
                    let results = module.function(*callee).signature().results.len();
                    let mut args = vec![Sim::Unknown; results];
                    args.extend(normal_args.iter().map(get));
                    (*normal, args)
                }
            }
        };
        current = next;
        incoming = args;
    }
    panic!("simulation did not terminate");
}

fn eval_op(
    module: &Module,
    op: &Op,
    env: &FxHashMap<ValueId, Sim>,
    oracle: &mut Oracle,
    calls: &mut Vec<String>,
    num_results: usize,
) -> Vec<Sim> {
    let get = |v: &ValueId| env.get(v).cloned().unwrap_or(Sim::Unknown);
    match op {
        Op::Const(attr) => vec![match attr {
            Attr::Bool(b) => Sim::Bool(*b),
            Attr::Int { value, .. } => Sim::Int(*value),
            Attr::I8(v) => Sim::Int(i64::from(*v)),
            Attr::Atom { id, .. } => Sim::Atom(*id),
            Attr::Nil => Sim::Nil,
            _ => Sim::Unknown,
        }],
        Op::Cast { value, .. } => vec![get(value)],
        Op::Cmp { op, lhs, rhs, .. } => vec![compare(*op, &get(lhs), &get(rhs), oracle)],
        Op::MapPut { .. } | Op::BinaryPush { .. } => vec![Sim::Unknown, oracle.next_flag()],
        Op::BinaryMatch { .. } => vec![Sim::Unknown, Sim::Unknown, oracle.next_flag()],
        Op::IsType { .. } | Op::IsTuple { .. } | Op::MapContainsKey { .. } | Op::Logical { .. } => {
            vec![oracle.next_flag()]
        }
        Op::ReceiveWait { .. } => vec![Sim::Int(i64::from(oracle.receive_status))],
        Op::Call { callee, .. } => {
            calls.push(module.function(*callee).name().to_owned());
            vec![Sim::Unknown; num_results]
        }
        _ => vec![Sim::Unknown; num_results],
    }
}

fn compare(op: CmpOp, lhs: &Sim, rhs: &Sim, oracle: &mut Oracle) -> Sim {
    if *lhs == Sim::Unknown || *rhs == Sim::Unknown {
        return oracle.next_flag();
    }
    match (op, lhs, rhs) {
        (CmpOp::Eq, _, _) => Sim::Bool(lhs == rhs),
        (CmpOp::Ne, _, _) => Sim::Bool(lhs != rhs),
        (CmpOp::Lt, Sim::Int(a), Sim::Int(b)) => Sim::Bool(a < b),
        (CmpOp::Le, Sim::Int(a), Sim::Int(b)) => Sim::Bool(a <= b),
        (CmpOp::Gt, Sim::Int(a), Sim::Int(b)) => Sim::Bool(a > b),
        (CmpOp::Ge, Sim::Int(a), Sim::Int(b)) => Sim::Bool(a >= b),
        _ => oracle.next_flag(),
    }
}
