//! Edge-argument coercion.
//!
//! When a value flows along an edge into a block parameter of a
//! different type, exactly one of three things happens:
//!
//! - a provisional parameter is narrowed to the incoming type;
//! - a parameter narrowed by an earlier predecessor is widened to `Term`
//!   when a second predecessor brings a different term kind;
//! - otherwise the value is cast to the parameter type in the source block.
//!
//! Type information is never dropped silently.

use ember_ir::{BlockId, FuncId, Location, Op, Type, TypeState, ValueId};
use tracing::{trace, warn};

use super::ModuleBuilder;
use crate::error::LowerResult;

impl ModuleBuilder {
    /// Coerce `args` for an edge from the insertion point to `dest`.
    pub(crate) fn coerce_edge_args(
        &mut self,
        loc: &Location,
        dest: BlockId,
        args: &[ValueId],
    ) -> LowerResult<Vec<ValueId>> {
        let cursor = self.cursor()?;
        self.coerce_edge_args_at(cursor.func, cursor.block, loc, dest, args)
    }

    /// Coerce `args` for an edge from `from` to `dest`; casts go into `from`.
    pub(crate) fn coerce_edge_args_at(
        &mut self,
        func: FuncId,
        from: BlockId,
        loc: &Location,
        dest: BlockId,
        args: &[ValueId],
    ) -> LowerResult<Vec<ValueId>> {
        self.check_block(func, dest)?;
        self.check_values(func, args)?;
        let params = self.module.function(func).block(dest).params().to_vec();
        if params.len() != args.len() {
            warn!(
                %from,
                %dest,
                expected = params.len(),
                found = args.len(),
                "edge argument count mismatch"
            );
            return Ok(args.to_vec());
        }
        self.coerce_into_params(func, from, loc, dest, &params, args)
    }

    /// Coerce `args` into the parameters of `dest` that follow the first
    /// `skip`, which an invoke fills with its results.
    pub(crate) fn coerce_trailing_edge_args(
        &mut self,
        loc: &Location,
        dest: BlockId,
        skip: usize,
        args: &[ValueId],
    ) -> LowerResult<Vec<ValueId>> {
        let cursor = self.cursor()?;
        self.check_block(cursor.func, dest)?;
        self.check_values(cursor.func, args)?;
        let params = self.module.function(cursor.func).block(dest).params();
        let trailing = params.get(skip..).unwrap_or_default().to_vec();
        if trailing.len() != args.len() {
            warn!(
                %dest,
                expected = trailing.len(),
                found = args.len(),
                "continuation argument count mismatch"
            );
            return Ok(args.to_vec());
        }
        self.coerce_into_params(cursor.func, cursor.block, loc, dest, &trailing, args)
    }

    /// Whether the leading parameters of `dest` can receive values of
    /// `results` directly, as an invoke delivers them. On success any
    /// provisional parameter among them is narrowed.
    pub(crate) fn accepts_results(
        &mut self,
        func: FuncId,
        dest: BlockId,
        results: &[Type],
    ) -> LowerResult<bool> {
        self.check_block(func, dest)?;
        let f = self.module.function_mut(func);
        let params = f.block(dest).params().to_vec();
        if params.len() < results.len() {
            return Ok(false);
        }
        let fits = results.iter().zip(&params).all(|(ty, &param)| {
            let cell = f.value_cell(param);
            (cell.is_provisional() && !ty.is_term()) || ty.is_assignable_to(cell.ty())
        });
        if !fits {
            return Ok(false);
        }
        for (ty, &param) in results.iter().zip(&params) {
            if f.value_cell(param).is_provisional() && !ty.is_term() {
                f.value_cell_mut(param).narrow(ty.clone())?;
            }
        }
        Ok(true)
    }

    fn coerce_into_params(
        &mut self,
        func: FuncId,
        from: BlockId,
        loc: &Location,
        dest: BlockId,
        params: &[ValueId],
        args: &[ValueId],
    ) -> LowerResult<Vec<ValueId>> {
        let f = self.module.function_mut(func);
        let mut out = Vec::with_capacity(args.len());
        for (&arg, &param) in args.iter().zip(params) {
            let arg_ty = f.value_type(arg).clone();
            let cell = f.value_cell(param).clone();

            if cell.is_provisional() && !arg_ty.is_term() {
                trace!(%dest, %param, ty = %arg_ty, "narrowing provisional parameter");
                f.value_cell_mut(param).narrow(arg_ty)?;
                out.push(arg);
                continue;
            }
            if arg_ty.is_assignable_to(cell.ty()) {
                out.push(arg);
                continue;
            }
            if cell.state() == TypeState::Narrowed
                && cell.ty().is_term_kind()
                && arg_ty.is_term_kind()
            {
                trace!(%dest, %param, from = %cell.ty(), "widening parameter to term");
                f.value_cell_mut(param).widen();
                out.push(arg);
                continue;
            }
            trace!(%dest, %param, from = %arg_ty, to = %cell.ty(), "casting edge argument");
            let to: Type = cell.ty().clone();
            let cast = f.push_inst(from, Op::Cast { value: arg, to: to.clone() }, &[to], loc.clone());
            out.push(cast[0]);
        }
        Ok(out)
    }
}
