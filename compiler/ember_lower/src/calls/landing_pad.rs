//! Landing pads for invokes.
//!
//! A landing pad is a block inserted before an error block. It runs the
//! `landingpad` operation against the function's catch-type descriptor
//! and forwards the caught `(kind, reason, trace)` to the error block.
//! The descriptor is materialized once at the top of the entry block and
//! depends on the target's exception model.

use ember_ir::{BlockId, CatchTypeKind, FuncId, GlobalId, Location, Op, Terminator, Type, ValueId};
use tracing::debug;

use crate::builder::ModuleBuilder;
use crate::error::{LowerError, LowerResult};
use crate::runtime;
use crate::target::ExceptionModel;

impl ModuleBuilder {
    /// The landing pad forwarding to `err`, created on first request.
    pub(crate) fn landing_pad(&mut self, loc: &Location, err: BlockId) -> LowerResult<BlockId> {
        let func = self.cursor()?.func;
        self.check_block(func, err)?;
        if let Some(&pad) = self.landing_pads.get(&(func, err)) {
            return Ok(pad);
        }

        let found = self.module.function(func).block(err).params().len();
        if found < 3 {
            return Err(LowerError::MissingBlockArgument {
                block: err,
                expected: 3,
                found,
            });
        }

        let catch_type = self.catch_type(loc, func)?;
        let f = self.module.function_mut(func);
        let pad = f.insert_block_before(err);
        let caught = f.push_inst(
            pad,
            Op::LandingPad { catch_type },
            &[Type::Atom, Type::Term, Type::TraceRef],
            loc.clone(),
        );
        let trace_param = f.block(err).params()[2];
        f.value_cell_mut(trace_param).retype(Type::TraceRef);

        let args = self.coerce_edge_args_at(func, pad, loc, err, &caught)?;
        self.module
            .function_mut(func)
            .set_terminator(pad, Terminator::Br { dest: err, args }, loc.clone());

        debug!(%func, %err, %pad, "created landing pad");
        self.landing_pads.insert((func, err), pad);
        Ok(pad)
    }

    /// The catch-type descriptor value of `func`.
    ///
    /// Reuses a descriptor already present in the entry block, otherwise
    /// inserts one at its start.
    fn catch_type(&mut self, loc: &Location, func: FuncId) -> LowerResult<ValueId> {
        if let Some(&value) = self.catch_types.get(&func) {
            return Ok(value);
        }
        let entry = self
            .function(func)?
            .entry()
            .ok_or(LowerError::NoInsertionPoint)?;
        let existing = self
            .module
            .function(func)
            .block(entry)
            .body()
            .iter()
            .find(|inst| matches!(inst.op, Op::CatchType(_)))
            .map(|inst| inst.results[0]);

        let value = match existing {
            Some(value) => value,
            None => {
                let model = self.target().exception_model();
                let kind = match model {
                    ExceptionModel::Dwarf => CatchTypeKind::Null,
                    ExceptionModel::Seh => CatchTypeKind::Global(self.catch_type_global()),
                };
                self.module.function_mut(func).insert_inst_at_start(
                    entry,
                    Op::CatchType(kind),
                    &[Type::ptr(Type::I8)],
                    loc.clone(),
                )[0]
            }
        };
        self.catch_types.insert(func, value);
        Ok(value)
    }

    /// The module-level SEH type-info global, declared on first use.
    fn catch_type_global(&mut self) -> GlobalId {
        if let Some(global) = self.catch_type_global {
            return global;
        }
        let global = self
            .module
            .declare_global(runtime::ERROR_TYPE_INFO, Type::ptr(Type::I8), false);
        self.catch_type_global = Some(global);
        global
    }
}
