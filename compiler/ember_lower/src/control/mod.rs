//! Control-flow lowering: branches, conditional dispatch, returns.

use ember_ir::{Attr, BlockId, CmpOp, FuncId, Location, Op, Terminator, Type, ValueId};
use tracing::debug;

use crate::builder::ModuleBuilder;
use crate::error::LowerResult;

/// A branch destination and the values passed to its parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub block: BlockId,
    pub args: Vec<ValueId>,
}

impl Edge {
    pub fn new(block: BlockId, args: Vec<ValueId>) -> Self {
        Edge { block, args }
    }

    /// An edge carrying no arguments.
    pub fn to(block: BlockId) -> Self {
        Edge {
            block,
            args: Vec::new(),
        }
    }
}

impl From<BlockId> for Edge {
    fn from(block: BlockId) -> Self {
        Edge::to(block)
    }
}

impl ModuleBuilder {
    /// Check an edge's destination and argument handles.
    pub(crate) fn check_edge(&self, func: FuncId, edge: &Edge) -> LowerResult<()> {
        self.check_block(func, edge.block)?;
        self.check_values(func, &edge.args)
    }

    /// Unconditional branch.
    pub fn build_br(&mut self, loc: &Location, edge: Edge) -> LowerResult<()> {
        let args = self.coerce_edge_args(loc, edge.block, &edge.args)?;
        self.terminate(
            loc,
            Terminator::Br {
                dest: edge.block,
                args,
            },
        )
    }

    /// Two-way branch on an `i1` condition.
    pub fn build_cond_br(
        &mut self,
        loc: &Location,
        cond: ValueId,
        then_edge: Edge,
        else_edge: Edge,
    ) -> LowerResult<()> {
        let then_args = self.coerce_edge_args(loc, then_edge.block, &then_edge.args)?;
        let else_args = self.coerce_edge_args(loc, else_edge.block, &else_edge.args)?;
        self.terminate(
            loc,
            Terminator::CondBr {
                cond,
                then_dest: then_edge.block,
                then_args,
                else_dest: else_edge.block,
                else_args,
            },
        )
    }

    /// Dispatch on the truthiness of `value`.
    ///
    /// Without an `otherwise` destination, or when `value` is statically a
    /// boolean, this is one strict comparison against `true` and a two-way
    /// branch. Otherwise the block is split after a synthesized `false`
    /// constant: the first half tests for `true` (→ `yes`), the second
    /// tests for `false` (→ `no`), and every other value goes to `otherwise`.
    pub fn build_if(
        &mut self,
        loc: &Location,
        value: ValueId,
        yes: Edge,
        no: Edge,
        otherwise: Option<Edge>,
    ) -> LowerResult<()> {
        let ty = self.value_type(value)?;
        let func = self.cursor()?.func;
        for edge in [Some(&yes), Some(&no), otherwise.as_ref()].into_iter().flatten() {
            self.check_edge(func, edge)?;
        }

        let true_const = self.emit1(loc, Op::Const(Attr::Bool(true)))?;
        let is_true = self.emit1(
            loc,
            Op::Cmp {
                op: CmpOp::Eq,
                strict: true,
                lhs: value,
                rhs: true_const,
            },
        )?;

        let otherwise = match otherwise {
            Some(other) if !ty.is_boolean_like() => other,
            _ => {
                debug!(%value, %ty, "lowering two-way if");
                return self.build_cond_br(loc, is_true, yes, no);
            }
        };

        debug!(%value, %ty, "lowering three-way if");
        let false_const = self.emit1(loc, Op::Const(Attr::Bool(false)))?;
        let cursor = self.cursor()?;
        let split_at = self.module.function(cursor.func).block(cursor.block).body().len();
        let is_false = self.emit1(
            loc,
            Op::Cmp {
                op: CmpOp::Eq,
                strict: true,
                lhs: value,
                rhs: false_const,
            },
        )?;
        let false_block = self
            .module
            .function_mut(cursor.func)
            .split_block(cursor.block, split_at);

        self.build_cond_br(loc, is_true, yes, Edge::to(false_block))?;
        self.position_at_end(false_block)?;
        self.build_cond_br(loc, is_false, no, otherwise)
    }

    /// Return from the current function, casting to its result type if needed.
    pub fn build_return(&mut self, loc: &Location, value: Option<ValueId>) -> LowerResult<()> {
        let values = match value {
            None => Vec::new(),
            Some(v) => {
                let func = self.cursor()?.func;
                let expected = self.function(func)?.signature().results.first().cloned();
                let ty = self.value_type(v)?;
                match expected {
                    Some(want) if !ty.is_assignable_to(&want) => {
                        vec![self.cast_if_needed(loc, v, &want)?]
                    }
                    _ => vec![v],
                }
            }
        };
        self.terminate(loc, Terminator::Return { values })
    }

    pub fn build_unreachable(&mut self, loc: &Location) -> LowerResult<()> {
        self.terminate(loc, Terminator::Unreachable)
    }

    /// Raise `(kind, reason, trace)`.
    pub fn build_throw(
        &mut self,
        loc: &Location,
        kind: ValueId,
        reason: ValueId,
        trace: ValueId,
    ) -> LowerResult<()> {
        self.terminate(
            loc,
            Terminator::Throw {
                kind,
                reason,
                trace,
            },
        )
    }

    /// Capture the current stack trace and branch to `dest` with
    /// `[trace, args...]`. The destination's first parameter becomes a
    /// trace reference.
    pub fn build_trace_capture(&mut self, loc: &Location, dest: Edge) -> LowerResult<()> {
        let func = self.cursor()?.func;
        self.check_edge(func, &dest)?;
        let param = self.block_argument(dest.block, 0)?;
        let trace = self.emit1(loc, Op::TraceCapture)?;
        self.retype_param(param, Type::TraceRef)?;
        let mut args = Vec::with_capacity(dest.args.len() + 1);
        args.push(trace);
        args.extend(dest.args);
        self.build_br(loc, Edge::new(dest.block, args))
    }

    /// Materialize a captured trace as a term.
    pub fn build_trace_construct(&mut self, loc: &Location, trace: ValueId) -> LowerResult<ValueId> {
        self.emit1(loc, Op::TraceConstruct { trace })
    }
}
