//! Calls the engine expands inline instead of emitting.

use ember_ir::{ArithOp, Attr, CallFlags, CmpOp, Location, Op, Signature, Type, ValueId};
use tracing::trace;

use super::CallSite;
use crate::builder::ModuleBuilder;
use crate::error::{LowerError, LowerResult};
use crate::runtime;

/// Built-in functions recognized by their fully qualified symbol.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Error1,
    Error2,
    Exit1,
    Throw1,
    Raise3,
    Fail1,
    Print1,
    Arith(ArithOp),
    And,
    Or,
    /// `op`, strictness.
    Compare(CmpOp, bool),
    IsType(Type),
    IsTuple,
    IsTupleOfArity,
}

impl Intrinsic {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let intrinsic = match symbol {
            "erlang:error/1" => Intrinsic::Error1,
            "erlang:error/2" => Intrinsic::Error2,
            "erlang:exit/1" => Intrinsic::Exit1,
            "erlang:throw/1" => Intrinsic::Throw1,
            "erlang:raise/3" => Intrinsic::Raise3,
            "erlang:fail/1" => Intrinsic::Fail1,
            "erlang:print/1" => Intrinsic::Print1,
            "erlang:+/2" => Intrinsic::Arith(ArithOp::Add),
            "erlang:-/1" => Intrinsic::Arith(ArithOp::Neg),
            "erlang:-/2" => Intrinsic::Arith(ArithOp::Sub),
            "erlang:*/2" => Intrinsic::Arith(ArithOp::Mul),
            "erlang:div/2" => Intrinsic::Arith(ArithOp::Div),
            "erlang:rem/2" => Intrinsic::Arith(ArithOp::Rem),
            "erlang://2" => Intrinsic::Arith(ArithOp::FDiv),
            "erlang:bsl/2" => Intrinsic::Arith(ArithOp::Bsl),
            "erlang:bsr/2" => Intrinsic::Arith(ArithOp::Bsr),
            "erlang:band/2" => Intrinsic::Arith(ArithOp::Band),
            "erlang:bor/2" => Intrinsic::Arith(ArithOp::Bor),
            "erlang:bxor/2" => Intrinsic::Arith(ArithOp::Bxor),
            "erlang:and/2" => Intrinsic::And,
            "erlang:or/2" => Intrinsic::Or,
            "erlang:=:=/2" => Intrinsic::Compare(CmpOp::Eq, true),
            "erlang:=/=/2" => Intrinsic::Compare(CmpOp::Ne, true),
            "erlang:==/2" => Intrinsic::Compare(CmpOp::Eq, false),
            "erlang:/=/2" => Intrinsic::Compare(CmpOp::Ne, false),
            "erlang:</2" => Intrinsic::Compare(CmpOp::Lt, false),
            "erlang:=</2" => Intrinsic::Compare(CmpOp::Le, false),
            "erlang:>/2" => Intrinsic::Compare(CmpOp::Gt, false),
            "erlang:>=/2" => Intrinsic::Compare(CmpOp::Ge, false),
            "erlang:is_integer/1" => Intrinsic::IsType(Type::Integer),
            "erlang:is_number/1" => Intrinsic::IsType(Type::Number),
            "erlang:is_float/1" => Intrinsic::IsType(Type::Float),
            "erlang:is_atom/1" => Intrinsic::IsType(Type::Atom),
            "erlang:is_boolean/1" => Intrinsic::IsType(Type::Boolean),
            "erlang:is_nil/1" => Intrinsic::IsType(Type::Nil),
            "erlang:is_list/1" => Intrinsic::IsType(Type::List),
            "erlang:is_map/1" => Intrinsic::IsType(Type::Map),
            "erlang:is_binary/1" => Intrinsic::IsType(Type::Binary),
            "erlang:is_function/1" => Intrinsic::IsType(Type::Closure),
            "erlang:is_reference/1" => Intrinsic::IsType(Type::Reference),
            "erlang:is_tuple/1" => Intrinsic::IsTuple,
            "erlang:is_tuple/2" => Intrinsic::IsTupleOfArity,
            _ => return None,
        };
        Some(intrinsic)
    }

    pub fn arity(&self) -> usize {
        match self {
            Intrinsic::Raise3 => 3,
            Intrinsic::Error2
            | Intrinsic::And
            | Intrinsic::Or
            | Intrinsic::Compare(..)
            | Intrinsic::IsTupleOfArity => 2,
            Intrinsic::Arith(ArithOp::Neg) => 1,
            Intrinsic::Arith(_) => 2,
            Intrinsic::Error1
            | Intrinsic::Exit1
            | Intrinsic::Throw1
            | Intrinsic::Fail1
            | Intrinsic::Print1
            | Intrinsic::IsType(_)
            | Intrinsic::IsTuple => 1,
        }
    }
}

impl ModuleBuilder {
    pub(super) fn lower_intrinsic(
        &mut self,
        symbol: &str,
        intrinsic: Intrinsic,
        site: &CallSite,
    ) -> LowerResult<()> {
        let loc = &site.loc;
        let args = site.args.as_slice();
        if args.len() != intrinsic.arity() {
            return Err(LowerError::IntrinsicArity {
                symbol: symbol.to_owned(),
                expected: intrinsic.arity(),
                found: args.len(),
            });
        }
        trace!(?intrinsic, "expanding intrinsic");

        let result = match intrinsic {
            Intrinsic::Error1 => {
                return self.raise_class(loc, runtime::ERROR_ATOM, "error", args[0]);
            }
            Intrinsic::Error2 => {
                let reason = self.build_tuple(loc, &[args[0], args[1]])?;
                return self.raise_class(loc, runtime::ERROR_ATOM, "error", reason);
            }
            Intrinsic::Exit1 => {
                return self.raise_class(loc, runtime::EXIT_ATOM, "exit", args[0]);
            }
            Intrinsic::Throw1 => {
                return self.raise_class(loc, runtime::THROW_ATOM, "throw", args[0]);
            }
            Intrinsic::Raise3 => return self.build_throw(loc, args[0], args[1], args[2]),
            Intrinsic::Fail1 => {
                let fail = self.module.declare_function(
                    runtime::BUILTIN_FAIL,
                    Signature::new(vec![Type::Term], vec![Type::Term]),
                );
                let arg = self.as_term(loc, args[0])?;
                self.emit_typed(
                    loc,
                    Op::Call {
                        callee: fail,
                        args: vec![arg],
                        flags: CallFlags::TAIL,
                    },
                    &[Type::Term],
                )?[0]
            }
            Intrinsic::Print1 => self.build_print(loc, args)?,
            Intrinsic::Arith(op) => self.emit1(
                loc,
                Op::Arith {
                    op,
                    operands: args.iter().copied().collect(),
                },
            )?,
            Intrinsic::And => self.build_logical_and(loc, args)?,
            Intrinsic::Or => self.build_logical_or(loc, args)?,
            Intrinsic::Compare(op, strict) => self.build_compare(loc, op, args[0], args[1], strict)?,
            Intrinsic::IsType(ty) => self.emit1(loc, Op::IsType { value: args[0], ty })?,
            Intrinsic::IsTuple => self.emit1(
                loc,
                Op::IsTuple {
                    value: args[0],
                    arity: None,
                },
            )?,
            Intrinsic::IsTupleOfArity => self.build_is_tuple_with_arity(loc, args[0], args[1])?,
        };

        if site.is_tail {
            return self.build_return(loc, Some(result));
        }
        self.continue_with(loc, vec![result], site)
    }

    /// Raise `reason` with a fresh trace under the exception class atom `id`.
    fn raise_class(
        &mut self,
        loc: &Location,
        id: u64,
        name: &str,
        reason: ValueId,
    ) -> LowerResult<()> {
        let kind = self.build_constant_attr(
            loc,
            Attr::Atom {
                id,
                name: name.to_owned(),
            },
        )?;
        let trace = self.emit1(loc, Op::TraceCapture)?;
        self.build_throw(loc, kind, reason, trace)
    }
}
