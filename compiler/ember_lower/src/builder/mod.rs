//! The module builder: one mutable lowering session per module.
//!
//! [`ModuleBuilder`] owns the [`Module`] under construction and an
//! insertion point (function + block). Front-end requests position the
//! builder at a block, emit operations there, and finish the block with a
//! terminator, in the same "position, emit, terminate" rhythm as an LLVM
//! IR builder.
//!
//! Module-scoped singletons (the exception personality declaration, the
//! catch-type global) are created lazily and memoized in fields here,
//! never in process-wide statics. Each component's requests live in its
//! own module as further `impl ModuleBuilder` blocks.

mod coerce;
mod functions;

use ember_ir::{
    cleanup_module, verify_module, BlockId, FuncId, Function, GlobalId, Location, Module, Op,
    Terminator, Type, ValueId, VerifyError,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::config::LowerConfig;
use crate::error::{LowerError, LowerResult};
use crate::target::TargetInfo;

pub use functions::FunctionDecl;

/// Insertion point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cursor {
    pub(crate) func: FuncId,
    pub(crate) block: BlockId,
}

/// Result of [`ModuleBuilder::finish`].
///
/// The module is returned even when verification fails so callers can
/// inspect what was built.
#[derive(Debug)]
pub struct LowerOutput {
    pub module: Module,
    pub success: bool,
    pub diagnostics: Vec<VerifyError>,
}

/// Lowers front-end operation requests into an [`ember_ir::Module`].
///
/// Not thread-safe by construction: every request takes `&mut self`.
pub struct ModuleBuilder {
    pub(crate) module: Module,
    pub(crate) config: LowerConfig,
    pub(crate) immediate_bits: u32,
    pub(crate) cursor: Option<Cursor>,
    pub(crate) personality: Option<FuncId>,
    pub(crate) catch_type_global: Option<GlobalId>,
    /// Catch-type value materialized in each function's entry block.
    pub(crate) catch_types: FxHashMap<FuncId, ValueId>,
    /// Landing pad created for each (function, error block).
    pub(crate) landing_pads: FxHashMap<(FuncId, BlockId), BlockId>,
}

impl ModuleBuilder {
    pub fn new(config: LowerConfig) -> Self {
        let immediate_bits = config.target.immediate_bits();
        debug!(
            module = %config.module_name,
            triple = config.target.triple(),
            immediate_bits,
            nanboxing = config.target.supports_nanboxing(),
            "creating module builder"
        );
        ModuleBuilder {
            module: Module::new(config.module_name.clone()),
            config,
            immediate_bits,
            cursor: None,
            personality: None,
            catch_type_global: None,
            catch_types: FxHashMap::default(),
            landing_pads: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn module(&self) -> &Module {
        &self.module
    }

    #[inline]
    pub fn config(&self) -> &LowerConfig {
        &self.config
    }

    #[inline]
    pub fn target(&self) -> &TargetInfo {
        &self.config.target
    }

    /// Bit width of integer constants encoded directly in a term.
    #[inline]
    pub fn immediate_bits(&self) -> u32 {
        self.immediate_bits
    }

    #[inline]
    pub fn current_function(&self) -> Option<FuncId> {
        self.cursor.map(|c| c.func)
    }

    #[inline]
    pub fn current_block(&self) -> Option<BlockId> {
        self.cursor.map(|c| c.block)
    }

    // ── Insertion point ─────────────────────────────────────────────

    pub(crate) fn cursor(&self) -> LowerResult<Cursor> {
        self.cursor.ok_or(LowerError::NoInsertionPoint)
    }

    /// Move the insertion point to the end of `block` in the current function.
    pub fn position_at_end(&mut self, block: BlockId) -> LowerResult<()> {
        let func = self.cursor()?.func;
        self.position_at_end_of(func, block)
    }

    /// Move the insertion point to the end of `block` in `func`.
    pub fn position_at_end_of(&mut self, func: FuncId, block: BlockId) -> LowerResult<()> {
        self.check_block(func, block)?;
        self.cursor = Some(Cursor { func, block });
        Ok(())
    }

    // ── Handle validation ───────────────────────────────────────────

    pub(crate) fn function(&self, func: FuncId) -> LowerResult<&Function> {
        self.module
            .get_function(func)
            .ok_or(LowerError::UnknownFunction(func))
    }

    pub(crate) fn check_block(&self, func: FuncId, block: BlockId) -> LowerResult<()> {
        if self.function(func)?.contains_block(block) {
            Ok(())
        } else {
            Err(LowerError::UnknownBlock(block))
        }
    }

    pub(crate) fn check_values(&self, func: FuncId, values: &[ValueId]) -> LowerResult<()> {
        let f = self.function(func)?;
        match values.iter().find(|v| !f.contains_value(**v)) {
            Some(&bad) => Err(LowerError::UnknownValue(bad)),
            None => Ok(()),
        }
    }

    /// Type of `value` in the current function.
    pub fn value_type(&self, value: ValueId) -> LowerResult<Type> {
        let func = self.cursor()?.func;
        self.check_values(func, &[value])?;
        Ok(self.module.function(func).value_type(value).clone())
    }

    // ── Emission ────────────────────────────────────────────────────

    /// Append `op` at the insertion point.
    ///
    /// Result types come from the operation; use [`emit_typed`](Self::emit_typed)
    /// for calls.
    pub(crate) fn emit(&mut self, loc: &Location, op: Op) -> LowerResult<SmallVec<[ValueId; 2]>> {
        let tys = op.fixed_result_types().unwrap_or_default();
        self.emit_typed(loc, op, &tys)
    }

    pub(crate) fn emit_typed(
        &mut self,
        loc: &Location,
        op: Op,
        result_types: &[Type],
    ) -> LowerResult<SmallVec<[ValueId; 2]>> {
        let Cursor { func, block } = self.cursor()?;
        self.check_values(func, &op.operands())?;
        let f = self.module.function_mut(func);
        if f.block(block).is_terminated() {
            return Err(LowerError::AlreadyTerminated(block));
        }
        Ok(f.push_inst(block, op, result_types, loc.clone()))
    }

    /// Append a single-result operation and return that result.
    pub(crate) fn emit1(&mut self, loc: &Location, op: Op) -> LowerResult<ValueId> {
        let results = self.emit(loc, op)?;
        debug_assert_eq!(results.len(), 1, "emit1 on a multi-result op");
        Ok(results[0])
    }

    /// Append an arbitrary operation at the insertion point.
    ///
    /// Intended for pattern matchers and other extensions that need
    /// operations without a dedicated request.
    pub fn build_op(&mut self, loc: &Location, op: Op) -> LowerResult<SmallVec<[ValueId; 2]>> {
        self.emit(loc, op)
    }

    /// Terminate the block at the insertion point.
    pub(crate) fn terminate(&mut self, loc: &Location, kind: Terminator) -> LowerResult<()> {
        let Cursor { func, block } = self.cursor()?;
        self.check_values(func, &kind.operands())?;
        let f = self.module.function_mut(func);
        if f.block(block).is_terminated() {
            return Err(LowerError::AlreadyTerminated(block));
        }
        f.set_terminator(block, kind, loc.clone());
        Ok(())
    }

    /// `value` unchanged if it already has type `to`, else a cast.
    pub(crate) fn cast_if_needed(
        &mut self,
        loc: &Location,
        value: ValueId,
        to: &Type,
    ) -> LowerResult<ValueId> {
        if self.value_type(value)? == *to {
            return Ok(value);
        }
        self.emit1(
            loc,
            Op::Cast {
                value,
                to: to.clone(),
            },
        )
    }

    /// `value` as an opaque term.
    pub(crate) fn as_term(&mut self, loc: &Location, value: ValueId) -> LowerResult<ValueId> {
        self.cast_if_needed(loc, value, &Type::Term)
    }

    // ── Finalization ────────────────────────────────────────────────

    /// Run cleanup and verification and hand back the module.
    pub fn finish(mut self) -> LowerOutput {
        for (id, func) in self.module.functions() {
            for &block in func.layout() {
                if !func.block(block).is_terminated() {
                    warn!(
                        function = func.name(),
                        func = %id,
                        %block,
                        "block left without terminator"
                    );
                }
            }
        }

        if self.config.run_cleanup {
            cleanup_module(&mut self.module);
        }

        let diagnostics = if self.config.verify {
            verify_module(&self.module)
        } else {
            Vec::new()
        };
        let success = diagnostics.is_empty();
        if success {
            debug!(module = self.module.name(), "module finalized");
        } else {
            for diag in &diagnostics {
                warn!(%diag, "verification failed");
            }
            debug!(module = %self.module, "module failed verification");
        }

        LowerOutput {
            module: self.module,
            success,
            diagnostics,
        }
    }
}
