//! Term construction, predicates and operators.

use ember_ir::{CmpOp, FuncId, Location, LogicalOp, Op, Type, ValueId};
use tracing::trace;

use crate::builder::ModuleBuilder;
use crate::calls::parse_symbol;
use crate::error::{LowerError, LowerResult};
use crate::types::{TypeDescriptor, TypeTag};

/// A closure to allocate: the function it wraps and its captured values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosureDescriptor {
    pub loc: Location,
    /// Fully qualified symbol of the underlying function.
    pub callee: String,
    pub arity: usize,
    pub env: Vec<ValueId>,
}

impl ModuleBuilder {
    // ── Constructors ────────────────────────────────────────────────

    pub fn build_cons(&mut self, loc: &Location, head: ValueId, tail: ValueId) -> LowerResult<ValueId> {
        let head = self.as_term(loc, head)?;
        let tail = self.as_term(loc, tail)?;
        self.emit1(loc, Op::Cons { head, tail })
    }

    pub fn build_tuple(&mut self, loc: &Location, elements: &[ValueId]) -> LowerResult<ValueId> {
        let elements = self.all_as_term(loc, elements)?;
        self.emit1(loc, Op::Tuple { elements })
    }

    pub fn build_map(
        &mut self,
        loc: &Location,
        entries: &[(ValueId, ValueId)],
    ) -> LowerResult<ValueId> {
        let mut out = Vec::with_capacity(entries.len());
        for &(k, v) in entries {
            out.push((self.as_term(loc, k)?, self.as_term(loc, v)?));
        }
        self.emit1(loc, Op::Map { entries: out })
    }

    /// Allocate a closure over `desc.callee`, declaring it if unknown.
    pub fn build_closure(&mut self, desc: &ClosureDescriptor) -> LowerResult<ValueId> {
        parse_symbol(&desc.callee)?;
        let callee: FuncId = self.get_or_declare_callee(&desc.callee, desc.arity);
        let env = self.all_as_term(&desc.loc, &desc.env)?;
        trace!(callee = %desc.callee, env = env.len(), "building closure");
        self.emit1(&desc.loc, Op::Closure { callee, env })
    }

    /// Extract `size` captured values from a closure environment.
    pub fn build_unpack_env(
        &mut self,
        loc: &Location,
        env: ValueId,
        size: u32,
    ) -> LowerResult<Vec<ValueId>> {
        if size == 0 {
            return Err(LowerError::EmptyEnv);
        }
        let env = self.cast_if_needed(loc, env, &Type::ptr(Type::Env(size)))?;
        (0..size)
            .map(|index| self.emit1(loc, Op::UnpackEnv { env, index }))
            .collect()
    }

    /// A list of `elements`, where the last element is the tail.
    ///
    /// An empty slice yields nil.
    pub(crate) fn build_list(&mut self, loc: &Location, elements: &[ValueId]) -> LowerResult<ValueId> {
        let Some((&last, init)) = elements.split_last() else {
            return self.build_constant_nil(loc);
        };
        let mut acc = self.as_term(loc, last)?;
        for &head in init.iter().rev() {
            acc = self.build_cons(loc, head, acc)?;
        }
        Ok(acc)
    }

    // ── Predicates and operators ────────────────────────────────────

    pub fn build_is_type(
        &mut self,
        loc: &Location,
        value: ValueId,
        ty: &TypeDescriptor,
    ) -> LowerResult<ValueId> {
        let ty = TypeTag::try_from(ty)?.to_type();
        self.emit1(loc, Op::IsType { value, ty })
    }

    pub fn build_is_tuple_with_arity(
        &mut self,
        loc: &Location,
        value: ValueId,
        arity: ValueId,
    ) -> LowerResult<ValueId> {
        self.emit1(
            loc,
            Op::IsTuple {
                value,
                arity: Some(arity),
            },
        )
    }

    /// Compare two terms. Inequality is equality compared to `false`.
    pub fn build_compare(
        &mut self,
        loc: &Location,
        op: CmpOp,
        lhs: ValueId,
        rhs: ValueId,
        strict: bool,
    ) -> LowerResult<ValueId> {
        if op != CmpOp::Ne {
            return self.emit1(loc, Op::Cmp { op, strict, lhs, rhs });
        }
        let eq = self.emit1(
            loc,
            Op::Cmp {
                op: CmpOp::Eq,
                strict,
                lhs,
                rhs,
            },
        )?;
        let no = self.emit1(loc, Op::Const(ember_ir::Attr::Bool(false)))?;
        self.emit1(
            loc,
            Op::Cmp {
                op: CmpOp::Eq,
                strict: true,
                lhs: eq,
                rhs: no,
            },
        )
    }

    pub fn build_logical_and(&mut self, loc: &Location, operands: &[ValueId]) -> LowerResult<ValueId> {
        self.build_logical(loc, LogicalOp::And, operands)
    }

    pub fn build_logical_or(&mut self, loc: &Location, operands: &[ValueId]) -> LowerResult<ValueId> {
        self.build_logical(loc, LogicalOp::Or, operands)
    }

    fn build_logical(
        &mut self,
        loc: &Location,
        op: LogicalOp,
        operands: &[ValueId],
    ) -> LowerResult<ValueId> {
        let [first, rest @ ..] = operands else {
            return Err(LowerError::TooFewLogicalOperands { found: 0 });
        };
        if rest.is_empty() {
            return Err(LowerError::TooFewLogicalOperands { found: 1 });
        }
        rest.iter().try_fold(*first, |lhs, &rhs| {
            self.emit1(loc, Op::Logical { op, lhs, rhs })
        })
    }

    pub fn build_print(&mut self, loc: &Location, args: &[ValueId]) -> LowerResult<ValueId> {
        self.emit1(loc, Op::Print { args: args.to_vec() })
    }

    fn all_as_term(&mut self, loc: &Location, values: &[ValueId]) -> LowerResult<Vec<ValueId>> {
        values.iter().map(|&v| self.as_term(loc, v)).collect()
    }
}
