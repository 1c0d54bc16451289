//! Calling convention and exception protocol.
//!
//! Every call site is lowered into one of four shapes:
//!
//! - an intrinsic, expanded inline into a dedicated operation or a throw;
//! - a tail call, returned directly;
//! - an ordinary call, tagged with a tail hint and branching to `ok`;
//! - an invoke, when the site has an error destination and is not in
//!   tail position. Its unwind edge goes through a landing pad that
//!   forwards `(kind, reason, trace)` to the error block.
//!
//! Closure and dynamic calls that cannot be resolved statically are
//! rewritten into calls to the runtime `apply` entry points and then take
//! the same path.

mod intrinsics;
mod landing_pad;

use ember_ir::{BlockId, CallFlags, FuncId, Location, Op, Terminator, TypeCell, ValueId};
use tracing::{debug, trace};

use crate::builder::ModuleBuilder;
use crate::error::{LowerError, LowerResult};
use crate::runtime;

pub use intrinsics::Intrinsic;

/// Arguments and continuations of one call site.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallSite {
    pub loc: Location,
    pub args: Vec<ValueId>,
    pub is_tail: bool,
    /// Success continuation. Receives the call result followed by `ok_args`.
    pub ok: Option<BlockId>,
    pub ok_args: Vec<ValueId>,
    /// Error continuation. Receives `(kind, reason, trace)`.
    pub err: Option<BlockId>,
}

impl CallSite {
    pub fn new(loc: Location, args: Vec<ValueId>) -> Self {
        CallSite {
            loc,
            args,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn tail(mut self) -> Self {
        self.is_tail = true;
        self
    }

    #[must_use]
    pub fn ok(mut self, block: BlockId) -> Self {
        self.ok = Some(block);
        self
    }

    #[must_use]
    pub fn ok_args(mut self, args: Vec<ValueId>) -> Self {
        self.ok_args = args;
        self
    }

    #[must_use]
    pub fn err(mut self, block: BlockId) -> Self {
        self.err = Some(block);
        self
    }

    /// Lowered as an invoke rather than a call.
    #[inline]
    pub fn is_invoke(&self) -> bool {
        !self.is_tail && self.err.is_some()
    }

    fn with_args(&self, args: Vec<ValueId>) -> Self {
        CallSite {
            args,
            ..self.clone()
        }
    }
}

/// Split `name/arity`, rejecting symbols without a numeric arity suffix.
pub(crate) fn parse_symbol(symbol: &str) -> LowerResult<(&str, usize)> {
    let invalid = || LowerError::InvalidCallSymbol {
        symbol: symbol.to_owned(),
    };
    let (name, arity) = symbol.rsplit_once('/').ok_or_else(invalid)?;
    if name.is_empty() {
        return Err(invalid());
    }
    let arity = arity.parse().map_err(|_| invalid())?;
    Ok((name, arity))
}

impl ModuleBuilder {
    /// Call a function by symbol (`module:function/arity`).
    pub fn build_static_call(&mut self, callee: &str, site: &CallSite) -> LowerResult<()> {
        parse_symbol(callee)?;
        let func = self.cursor()?.func;
        self.check_values(func, &site.args)?;
        self.check_values(func, &site.ok_args)?;
        if let Some(ok) = site.ok {
            self.check_block(func, ok)?;
        }
        if let Some(err) = site.err {
            self.check_block(func, err)?;
        }

        if let Some(intrinsic) = Intrinsic::from_symbol(callee) {
            return self.lower_intrinsic(callee, intrinsic, site);
        }

        let target = self.get_or_declare_callee(callee, site.args.len());
        let args = self.cast_call_args(&site.loc, target, &site.args)?;
        if site.is_tail {
            self.lower_tail_call(&site.loc, target, args)
        } else if let Some(err) = site.err {
            self.lower_invoke(target, args, site, err)
        } else {
            self.lower_call(target, args, site)
        }
    }

    /// Call a closure value.
    ///
    /// A closure built in this function with an empty environment is
    /// called directly through its underlying function; anything else
    /// goes through `apply/2`.
    pub fn build_closure_call(&mut self, closure: ValueId, site: &CallSite) -> LowerResult<()> {
        let func = self.cursor()?.func;
        self.check_values(func, &[closure])?;
        let f = self.module.function(func);
        let direct = match f.defining_op(closure) {
            Some(Op::Closure { callee, env }) if env.is_empty() => {
                Some(self.module.function(*callee).name().to_owned())
            }
            _ => None,
        };
        if let Some(name) = direct {
            trace!(callee = %name, "calling closure directly");
            return self.build_static_call(&name, site);
        }

        debug!(%closure, "calling closure through apply/2");
        let mut list = site.args.clone();
        list.push(self.build_constant_nil(&site.loc)?);
        let list = self.build_list(&site.loc, &list)?;
        self.build_static_call(runtime::APPLY_2, &site.with_args(vec![closure, list]))
    }

    /// Call `module:function` where both are only known at run time.
    pub fn build_global_dynamic_call(
        &mut self,
        module: ValueId,
        function: ValueId,
        site: &CallSite,
    ) -> LowerResult<()> {
        let func = self.cursor()?.func;
        self.check_values(func, &[module, function])?;
        let mut list = site.args.clone();
        list.push(self.build_constant_nil(&site.loc)?);
        let list = self.build_list(&site.loc, &list)?;
        self.build_static_call(
            runtime::APPLY_3,
            &site.with_args(vec![module, function, list]),
        )
    }

    // ── Call shapes ─────────────────────────────────────────────────

    fn cast_call_args(
        &mut self,
        loc: &Location,
        callee: FuncId,
        args: &[ValueId],
    ) -> LowerResult<Vec<ValueId>> {
        let params = self.function(callee)?.signature().params.clone();
        args.iter()
            .enumerate()
            .map(|(i, &arg)| match params.get(i) {
                Some(ty) => self.cast_if_needed(loc, arg, ty),
                None => Ok(arg),
            })
            .collect()
    }

    fn emit_call(
        &mut self,
        loc: &Location,
        callee: FuncId,
        args: Vec<ValueId>,
        flags: CallFlags,
    ) -> LowerResult<Vec<ValueId>> {
        let results = self.function(callee)?.signature().results.clone();
        let values = self.emit_typed(loc, Op::Call { callee, args, flags }, &results)?;
        Ok(values.into_vec())
    }

    fn lower_tail_call(&mut self, loc: &Location, callee: FuncId, args: Vec<ValueId>) -> LowerResult<()> {
        let caller = self.cursor()?.func;
        let caller_arity = self.function(caller)?.signature().params.len();
        let flags = if self.target().musttail_always() || args.len() == caller_arity {
            CallFlags::MUSTTAIL
        } else {
            CallFlags::TAIL
        };
        trace!(%callee, ?flags, "tail call");
        let values = self.emit_call(loc, callee, args, flags)?;
        self.terminate(loc, Terminator::Return { values })
    }

    fn lower_call(&mut self, callee: FuncId, args: Vec<ValueId>, site: &CallSite) -> LowerResult<()> {
        let loc = &site.loc;
        let results = self.emit_call(loc, callee, args, CallFlags::TAIL)?;
        self.continue_with(loc, results, site)
    }

    /// Transfer a call or intrinsic result to the success continuation,
    /// or return it when the site has none.
    pub(crate) fn continue_with(
        &mut self,
        loc: &Location,
        results: Vec<ValueId>,
        site: &CallSite,
    ) -> LowerResult<()> {
        match site.ok {
            Some(ok) => {
                let mut args = results;
                args.extend_from_slice(&site.ok_args);
                let args = self.coerce_edge_args(loc, ok, &args)?;
                self.terminate(loc, Terminator::Br { dest: ok, args })
            }
            None => self.build_return(loc, results.first().copied()),
        }
    }

    fn lower_invoke(
        &mut self,
        callee: FuncId,
        args: Vec<ValueId>,
        site: &CallSite,
        err: BlockId,
    ) -> LowerResult<()> {
        let loc = &site.loc;
        let cursor = self.cursor()?;
        let unwind = self.landing_pad(loc, err)?;
        let results = self.function(callee)?.signature().results.clone();

        let (normal, normal_args) = match site.ok {
            Some(ok) if self.accepts_results(cursor.func, ok, &results)? => {
                let normal_args =
                    self.coerce_trailing_edge_args(loc, ok, results.len(), &site.ok_args)?;
                (ok, normal_args)
            }
            Some(ok) => {
                // Results need a cast before reaching `ok`.
                let f = self.module.function_mut(cursor.func);
                let tramp = f.insert_block_before(ok);
                let mut forwarded: Vec<ValueId> = results
                    .iter()
                    .map(|ty| f.add_block_param(tramp, TypeCell::declared(ty.clone())))
                    .collect();
                forwarded.extend_from_slice(&site.ok_args);
                self.position_at_end(tramp)?;
                let forwarded = self.coerce_edge_args(loc, ok, &forwarded)?;
                self.terminate(loc, Terminator::Br { dest: ok, args: forwarded })?;
                self.position_at_end(cursor.block)?;
                (tramp, Vec::new())
            }
            None => {
                let cells = results.iter().cloned().map(TypeCell::declared).collect();
                let normal = self.create_block(cells)?;
                self.position_at_end(normal)?;
                let ret = self.module.function(cursor.func).block(normal).params().first().copied();
                self.build_return(loc, ret)?;
                self.position_at_end(cursor.block)?;
                (normal, Vec::new())
            }
        };

        trace!(%callee, %normal, %unwind, "invoke");
        self.terminate(
            loc,
            Terminator::Invoke {
                callee,
                args,
                normal,
                normal_args,
                unwind,
            },
        )
    }
}

#[cfg(test)]
mod tests;
