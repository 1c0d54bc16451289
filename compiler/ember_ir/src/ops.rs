//! Instructions and terminators.
//!
//! Every block holds a list of [`Inst`] followed by exactly one
//! [`Terminator`]. Instruction result types are fixed by the operation
//! (see [`Op::fixed_result_types`]) except for calls, whose results come
//! from the callee signature.

use bitflags::bitflags;
use smallvec::{smallvec, SmallVec};

use crate::{Attr, BlockId, FuncId, GlobalId, Location, Type, ValueId};

// ── Operator kinds ──────────────────────────────────────────────────

/// Term comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Term arithmetic. `Neg` is unary; everything else is binary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ArithOp {
    Add,
    Sub,
    Neg,
    Mul,
    /// Integer division.
    Div,
    Rem,
    /// Float division.
    FDiv,
    Bsl,
    Bsr,
    Band,
    Bor,
    Bxor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum LogicalOp {
    And,
    Or,
}

/// Single-key map operation: `Insert` fails if the key exists,
/// `Update` fails if it does not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum MapPutKind {
    Insert,
    Update,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Endianness {
    Big,
    Little,
    Native,
}

/// Encoding of one binary segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum BinarySpecifier {
    Bytes { unit: u8 },
    Bits { unit: u8 },
    Utf8 { endianness: Endianness },
    Utf16 { endianness: Endianness },
    Utf32 { endianness: Endianness },
    Integer { unit: u8, endianness: Endianness, signed: bool },
    Float { unit: u8, endianness: Endianness },
}

/// Source of the landing-pad catch-type descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum CatchTypeKind {
    /// Catch-all null descriptor (DWARF/EHABI unwinding).
    Null,
    /// Address of a module-level type-info global (SEH unwinding).
    Global(GlobalId),
}

bitflags! {
    /// Call-site attributes.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
    pub struct CallFlags: u8 {
        /// Tail-call hint; the backend may reuse the frame.
        const TAIL = 1 << 0;
        /// Guaranteed tail call.
        const MUSTTAIL = 1 << 1;
        /// Callee never returns.
        const NORETURN = 1 << 2;
    }
}

// ── Instructions ────────────────────────────────────────────────────

/// A non-terminator operation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Op {
    Const(Attr),
    Cast { value: ValueId, to: Type },
    Cmp { op: CmpOp, strict: bool, lhs: ValueId, rhs: ValueId },
    Arith { op: ArithOp, operands: SmallVec<[ValueId; 2]> },
    Logical { op: LogicalOp, lhs: ValueId, rhs: ValueId },
    IsType { value: ValueId, ty: Type },
    /// Tuple test of any arity, or of the arity held in `arity`.
    IsTuple { value: ValueId, arity: Option<ValueId> },
    Print { args: Vec<ValueId> },

    // ── Term construction ───────────────────────────────────────────
    Cons { head: ValueId, tail: ValueId },
    Tuple { elements: Vec<ValueId> },
    Map { entries: Vec<(ValueId, ValueId)> },
    Closure { callee: FuncId, env: Vec<ValueId> },
    UnpackEnv { env: ValueId, index: u32 },

    // ── Fallible protocols ──────────────────────────────────────────
    MapPut { kind: MapPutKind, map: ValueId, key: ValueId, value: ValueId },
    BinaryStart,
    BinaryPush {
        builder: ValueId,
        value: ValueId,
        size: Option<ValueId>,
        spec: BinarySpecifier,
    },
    BinaryFinish { builder: ValueId },
    ReceiveStart { timeout: ValueId },
    ReceiveWait { handle: ValueId },
    ReceiveMessage { handle: ValueId },
    ReceiveDone { handle: ValueId },

    // ── Exceptions ──────────────────────────────────────────────────
    TraceCapture,
    TraceConstruct { trace: ValueId },
    CatchType(CatchTypeKind),
    LandingPad { catch_type: ValueId },

    Call { callee: FuncId, args: Vec<ValueId>, flags: CallFlags },

    // ── Matching helpers ────────────────────────────────────────────
    ListHead { list: ValueId },
    ListTail { list: ValueId },
    TupleElement { tuple: ValueId, index: u32 },
    MapContainsKey { map: ValueId, key: ValueId },
    MapGet { map: ValueId, key: ValueId },
    BinaryMatch {
        bin: ValueId,
        spec: BinarySpecifier,
        size: Option<ValueId>,
    },
}

impl Op {
    /// Result types determined by the operation alone.
    ///
    /// Returns `None` for calls, whose results depend on the callee.
    pub fn fixed_result_types(&self) -> Option<SmallVec<[Type; 3]>> {
        let tys: SmallVec<[Type; 3]> = match self {
            Op::Const(attr) => smallvec![attr.ty()],
            Op::Cast { to, .. } => smallvec![to.clone()],
            Op::Cmp { .. }
            | Op::Logical { .. }
            | Op::IsType { .. }
            | Op::IsTuple { .. }
            | Op::MapContainsKey { .. } => smallvec![Type::I1],
            Op::Arith { .. }
            | Op::Print { .. }
            | Op::UnpackEnv { .. }
            | Op::ReceiveMessage { .. }
            | Op::TraceConstruct { .. }
            | Op::ListHead { .. }
            | Op::ListTail { .. }
            | Op::TupleElement { .. }
            | Op::MapGet { .. } => smallvec![Type::Term],
            Op::Cons { .. } => smallvec![Type::boxed(Type::Cons)],
            Op::Tuple { elements } => {
                #[allow(clippy::cast_possible_truncation)]
                let arity = elements.len() as u32;
                smallvec![Type::boxed(Type::Tuple(arity))]
            }
            Op::Map { .. } => smallvec![Type::boxed(Type::Map)],
            Op::Closure { .. } => smallvec![Type::boxed(Type::Closure)],
            Op::MapPut { .. } => smallvec![Type::boxed(Type::Map), Type::I1],
            Op::BinaryStart => smallvec![Type::BinaryBuilder],
            Op::BinaryPush { .. } => smallvec![Type::BinaryBuilder, Type::I1],
            Op::BinaryFinish { .. } => smallvec![Type::Binary],
            Op::ReceiveStart { .. } => smallvec![Type::ReceiveRef],
            Op::ReceiveWait { .. } => smallvec![Type::I8],
            Op::ReceiveDone { .. } => SmallVec::new(),
            Op::TraceCapture => smallvec![Type::TraceRef],
            Op::CatchType(_) => smallvec![Type::ptr(Type::I8)],
            Op::LandingPad { .. } => smallvec![Type::Atom, Type::Term, Type::TraceRef],
            Op::BinaryMatch { .. } => smallvec![Type::Term, Type::Binary, Type::I1],
            Op::Call { .. } => return None,
        };
        Some(tys)
    }

    /// All values this operation reads, in operand order.
    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        let mut out = SmallVec::new();
        self.visit_operands(|v| out.push(v));
        out
    }

    fn visit_operands(&self, mut f: impl FnMut(ValueId)) {
        match self {
            Op::Const(_) | Op::BinaryStart | Op::TraceCapture | Op::CatchType(_) => {}
            Op::Cast { value, .. } | Op::IsType { value, .. } => f(*value),
            Op::IsTuple { value, arity } => {
                f(*value);
                if let Some(arity) = arity {
                    f(*arity);
                }
            }
            Op::Cmp { lhs, rhs, .. } | Op::Logical { lhs, rhs, .. } => {
                f(*lhs);
                f(*rhs);
            }
            Op::Arith { operands, .. } => operands.iter().copied().for_each(f),
            Op::Print { args } | Op::Call { args, .. } => args.iter().copied().for_each(f),
            Op::Tuple { elements } => elements.iter().copied().for_each(f),
            Op::Closure { env, .. } => env.iter().copied().for_each(f),
            Op::Cons { head, tail } => {
                f(*head);
                f(*tail);
            }
            Op::Map { entries } => {
                for (k, v) in entries {
                    f(*k);
                    f(*v);
                }
            }
            Op::UnpackEnv { env, .. } => f(*env),
            Op::MapPut { map, key, value, .. } => {
                f(*map);
                f(*key);
                f(*value);
            }
            Op::BinaryPush {
                builder,
                value,
                size,
                ..
            } => {
                f(*builder);
                f(*value);
                if let Some(size) = size {
                    f(*size);
                }
            }
            Op::BinaryFinish { builder } => f(*builder),
            Op::ReceiveStart { timeout } => f(*timeout),
            Op::ReceiveWait { handle }
            | Op::ReceiveMessage { handle }
            | Op::ReceiveDone { handle } => f(*handle),
            Op::TraceConstruct { trace } => f(*trace),
            Op::LandingPad { catch_type } => f(*catch_type),
            Op::ListHead { list } | Op::ListTail { list } => f(*list),
            Op::TupleElement { tuple, .. } => f(*tuple),
            Op::MapContainsKey { map, key } | Op::MapGet { map, key } => {
                f(*map);
                f(*key);
            }
            Op::BinaryMatch { bin, size, .. } => {
                f(*bin);
                if let Some(size) = size {
                    f(*size);
                }
            }
        }
    }

    /// Replace every use of `from` with `to`.
    pub fn substitute(&mut self, from: ValueId, to: ValueId) {
        let sub = |v: &mut ValueId| {
            if *v == from {
                *v = to;
            }
        };
        self.visit_operands_mut(sub);
    }

    fn visit_operands_mut(&mut self, mut f: impl FnMut(&mut ValueId)) {
        match self {
            Op::Const(_) | Op::BinaryStart | Op::TraceCapture | Op::CatchType(_) => {}
            Op::Cast { value, .. } | Op::IsType { value, .. } => f(value),
            Op::IsTuple { value, arity } => {
                f(value);
                if let Some(arity) = arity {
                    f(arity);
                }
            }
            Op::Cmp { lhs, rhs, .. } | Op::Logical { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Op::Arith { operands, .. } => operands.iter_mut().for_each(f),
            Op::Print { args } | Op::Call { args, .. } => args.iter_mut().for_each(f),
            Op::Tuple { elements } => elements.iter_mut().for_each(f),
            Op::Closure { env, .. } => env.iter_mut().for_each(f),
            Op::Cons { head, tail } => {
                f(head);
                f(tail);
            }
            Op::Map { entries } => {
                for (k, v) in entries {
                    f(k);
                    f(v);
                }
            }
            Op::UnpackEnv { env, .. } => f(env),
            Op::MapPut { map, key, value, .. } => {
                f(map);
                f(key);
                f(value);
            }
            Op::BinaryPush {
                builder,
                value,
                size,
                ..
            } => {
                f(builder);
                f(value);
                if let Some(size) = size {
                    f(size);
                }
            }
            Op::BinaryFinish { builder } => f(builder),
            Op::ReceiveStart { timeout } => f(timeout),
            Op::ReceiveWait { handle }
            | Op::ReceiveMessage { handle }
            | Op::ReceiveDone { handle } => f(handle),
            Op::TraceConstruct { trace } => f(trace),
            Op::LandingPad { catch_type } => f(catch_type),
            Op::ListHead { list } | Op::ListTail { list } => f(list),
            Op::TupleElement { tuple, .. } => f(tuple),
            Op::MapContainsKey { map, key } | Op::MapGet { map, key } => {
                f(map);
                f(key);
            }
            Op::BinaryMatch { bin, size, .. } => {
                f(bin);
                if let Some(size) = size {
                    f(size);
                }
            }
        }
    }

    /// Short mnemonic used by the printer and in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Const(_) => "const",
            Op::Cast { .. } => "cast",
            Op::Cmp { .. } => "cmp",
            Op::Arith { .. } => "arith",
            Op::Logical { .. } => "logical",
            Op::IsType { .. } => "is_type",
            Op::IsTuple { .. } => "is_tuple",
            Op::Print { .. } => "print",
            Op::Cons { .. } => "cons",
            Op::Tuple { .. } => "tuple",
            Op::Map { .. } => "map",
            Op::Closure { .. } => "closure",
            Op::UnpackEnv { .. } => "unpack_env",
            Op::MapPut {
                kind: MapPutKind::Insert,
                ..
            } => "map.insert",
            Op::MapPut {
                kind: MapPutKind::Update,
                ..
            } => "map.update",
            Op::BinaryStart => "binary.start",
            Op::BinaryPush { .. } => "binary.push",
            Op::BinaryFinish { .. } => "binary.finish",
            Op::ReceiveStart { .. } => "receive.start",
            Op::ReceiveWait { .. } => "receive.wait",
            Op::ReceiveMessage { .. } => "receive.message",
            Op::ReceiveDone { .. } => "receive.done",
            Op::TraceCapture => "trace.capture",
            Op::TraceConstruct { .. } => "trace.construct",
            Op::CatchType(_) => "catch_type",
            Op::LandingPad { .. } => "landingpad",
            Op::Call { .. } => "call",
            Op::ListHead { .. } => "list.head",
            Op::ListTail { .. } => "list.tail",
            Op::TupleElement { .. } => "tuple.get",
            Op::MapContainsKey { .. } => "map.contains",
            Op::MapGet { .. } => "map.get",
            Op::BinaryMatch { .. } => "binary.match",
        }
    }
}

/// An operation with its results and source location.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Inst {
    pub op: Op,
    pub results: SmallVec<[ValueId; 2]>,
    pub loc: Location,
}

// ── Terminators ─────────────────────────────────────────────────────

/// Block exit.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Terminator {
    Br {
        dest: BlockId,
        args: Vec<ValueId>,
    },
    CondBr {
        cond: ValueId,
        then_dest: BlockId,
        then_args: Vec<ValueId>,
        else_dest: BlockId,
        else_args: Vec<ValueId>,
    },
    Return {
        values: Vec<ValueId>,
    },
    Unreachable,
    /// Raise an exception; never falls through.
    Throw {
        kind: ValueId,
        reason: ValueId,
        trace: ValueId,
    },
    /// Call that transfers to `normal` on return and `unwind` on exception.
    ///
    /// The callee's results become the leading parameters of `normal`,
    /// followed by `normal_args`. The unwind edge carries no arguments.
    Invoke {
        callee: FuncId,
        args: Vec<ValueId>,
        normal: BlockId,
        normal_args: Vec<ValueId>,
        unwind: BlockId,
    },
}

impl Terminator {
    /// Successor blocks, in edge order.
    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            Terminator::Br { dest, .. } => smallvec![*dest],
            Terminator::CondBr {
                then_dest,
                else_dest,
                ..
            } => smallvec![*then_dest, *else_dest],
            Terminator::Invoke { normal, unwind, .. } => smallvec![*normal, *unwind],
            Terminator::Return { .. } | Terminator::Unreachable | Terminator::Throw { .. } => {
                SmallVec::new()
            }
        }
    }

    /// All values this terminator reads.
    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        match self {
            Terminator::Br { args, .. } => args.iter().copied().collect(),
            Terminator::CondBr {
                cond,
                then_args,
                else_args,
                ..
            } => std::iter::once(*cond)
                .chain(then_args.iter().copied())
                .chain(else_args.iter().copied())
                .collect(),
            Terminator::Return { values } => values.iter().copied().collect(),
            Terminator::Unreachable => SmallVec::new(),
            Terminator::Throw {
                kind,
                reason,
                trace,
            } => smallvec![*kind, *reason, *trace],
            Terminator::Invoke {
                args, normal_args, ..
            } => args.iter().chain(normal_args.iter()).copied().collect(),
        }
    }

    /// Replace every use of `from` with `to`.
    pub fn substitute(&mut self, from: ValueId, to: ValueId) {
        let sub = |v: &mut ValueId| {
            if *v == from {
                *v = to;
            }
        };
        match self {
            Terminator::Br { args, .. } => args.iter_mut().for_each(sub),
            Terminator::CondBr {
                cond,
                then_args,
                else_args,
                ..
            } => {
                sub(cond);
                then_args.iter_mut().for_each(&sub);
                else_args.iter_mut().for_each(sub);
            }
            Terminator::Return { values } => values.iter_mut().for_each(sub),
            Terminator::Unreachable => {}
            Terminator::Throw {
                kind,
                reason,
                trace,
            } => {
                sub(kind);
                sub(reason);
                sub(trace);
            }
            Terminator::Invoke {
                args, normal_args, ..
            } => args.iter_mut().chain(normal_args.iter_mut()).for_each(sub),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Terminator::Br { .. } => "br",
            Terminator::CondBr { .. } => "cond_br",
            Terminator::Return { .. } => "return",
            Terminator::Unreachable => "unreachable",
            Terminator::Throw { .. } => "throw",
            Terminator::Invoke { .. } => "invoke",
        }
    }
}

/// A terminator with its source location.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockExit {
    pub kind: Terminator,
    pub loc: Location,
}
