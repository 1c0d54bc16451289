//! Mailbox receive: start, wait, done.
//!
//! `wait` polls a receive handle and dispatches on its status. A received
//! message is fetched and passed to the caller's check block; a timeout
//! goes to the caller's timeout block; the error status is an invariant
//! violation of the runtime and aborts.

use ember_ir::{Attr, BlockId, CallFlags, CmpOp, Location, Op, Signature, Terminator, Type, ValueId};
use tracing::{debug, trace};

use crate::builder::ModuleBuilder;
use crate::control::Edge;
use crate::error::LowerResult;
use crate::runtime;

/// Status codes returned by a receive wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum ReceiveStatus {
    Received = 1,
    Timeout = 2,
    Error = 3,
}

impl ReceiveStatus {
    #[inline]
    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(ReceiveStatus::Received),
            2 => Some(ReceiveStatus::Timeout),
            3 => Some(ReceiveStatus::Error),
            _ => None,
        }
    }
}

impl ModuleBuilder {
    /// Open a receive with `timeout` and branch to `cont` with the handle.
    pub fn build_receive_start(
        &mut self,
        loc: &Location,
        cont: BlockId,
        timeout: ValueId,
    ) -> LowerResult<()> {
        let param = self.block_argument(cont, 0)?;
        let timeout = self.as_term(loc, timeout)?;
        let handle = self.emit1(loc, Op::ReceiveStart { timeout })?;
        self.retype_param(param, Type::ReceiveRef)?;
        self.build_br(loc, Edge::new(cont, vec![handle]))
    }

    /// Poll `handle` and dispatch on the result.
    ///
    /// `check` receives the message; `timeout` receives nothing.
    pub fn build_receive_wait(
        &mut self,
        loc: &Location,
        handle: ValueId,
        timeout: BlockId,
        check: BlockId,
    ) -> LowerResult<()> {
        let cursor = self.cursor()?;
        self.check_block(cursor.func, timeout)?;
        self.check_block(cursor.func, check)?;

        let status = self.emit1(loc, Op::ReceiveWait { handle })?;
        let received = self.status_is(loc, status, ReceiveStatus::Received)?;
        let get_msg = self.create_block(Vec::new())?;
        let failed = self.create_block(Vec::new())?;
        self.build_cond_br(loc, received, Edge::to(get_msg), Edge::to(failed))?;

        self.position_at_end(get_msg)?;
        let msg = self.emit1(loc, Op::ReceiveMessage { handle })?;
        self.build_br(loc, Edge::new(check, vec![msg]))?;

        self.position_at_end(failed)?;
        let timed_out = self.status_is(loc, status, ReceiveStatus::Timeout)?;
        let fatal = self.create_block(Vec::new())?;
        self.build_cond_br(loc, timed_out, Edge::to(timeout), Edge::to(fatal))?;

        self.position_at_end(fatal)?;
        self.build_fatal_abort(loc)?;

        trace!(%get_msg, %failed, %fatal, "lowered receive wait");
        self.position_at_end(cursor.block)
    }

    /// Remove the received message from the mailbox and branch to `cont`.
    pub fn build_receive_done(
        &mut self,
        loc: &Location,
        handle: ValueId,
        cont: BlockId,
        args: &[ValueId],
    ) -> LowerResult<()> {
        self.emit(loc, Op::ReceiveDone { handle })?;
        self.build_br(loc, Edge::new(cont, args.to_vec()))
    }

    fn status_is(&mut self, loc: &Location, status: ValueId, want: ReceiveStatus) -> LowerResult<ValueId> {
        let code = self.emit1(loc, Op::Const(Attr::I8(want.code())))?;
        self.emit1(
            loc,
            Op::Cmp {
                op: CmpOp::Eq,
                strict: true,
                lhs: status,
                rhs: code,
            },
        )
    }

    /// Call the runtime abort routine and return an empty term.
    fn build_fatal_abort(&mut self, loc: &Location) -> LowerResult<()> {
        let abort = self
            .module
            .declare_function(runtime::FATAL_ERROR, Signature::new(vec![], vec![]));
        self.emit_typed(
            loc,
            Op::Call {
                callee: abort,
                args: Vec::new(),
                flags: CallFlags::TAIL | CallFlags::NORETURN,
            },
            &[],
        )?;

        let func = self.cursor()?.func;
        let results = self.function(func)?.signature().results.clone();
        let mut values = Vec::with_capacity(results.len());
        for ty in &results {
            let none = self.emit1(loc, Op::Const(Attr::None))?;
            values.push(self.cast_if_needed(loc, none, ty)?);
        }
        debug!(%func, "receive error path aborts");
        self.terminate(loc, Terminator::Return { values })
    }
}
