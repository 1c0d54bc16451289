//! Typed SSA basic-block IR for the Ember compiler backend.
//!
//! This crate provides:
//!
//! - **Handles** ([`ValueId`], [`BlockId`], [`FuncId`], [`GlobalId`]): dense
//!   `u32` indices into per-function and per-module arenas.
//!
//! - **Types** ([`Type`], [`TypeCell`]): the term-domain and machine types
//!   values carry, and the set-once cell that lets block parameters start
//!   opaque and be narrowed when their producer becomes known.
//!
//! - **IR** ([`Function`], [`Block`], [`Inst`], [`Op`], [`Terminator`],
//!   [`Module`]): block parameters instead of phi nodes, one terminator per
//!   block, explicit success and failure edges.
//!
//! - **Finalization** ([`verify_module`], [`cleanup_module`]): the verifier
//!   reports every violation at once; cleanup is a single fixed pass.
//!
//! Nothing here knows how source-level operations are lowered; that lives
//! in `ember_lower`.

mod attr;
mod cleanup;
mod function;
pub mod graph;
mod ids;
mod location;
mod module;
pub mod ops;
mod printer;
mod types;
mod verify;

pub use attr::Attr;
pub use cleanup::{cleanup_module, CleanupStats};
pub use function::{Block, Function, Signature, ValueDef};
pub use ids::{BlockId, FuncId, GlobalId, ValueId};
pub use location::Location;
pub use module::{Global, Module};
pub use ops::{
    ArithOp, BinarySpecifier, BlockExit, CallFlags, CatchTypeKind, CmpOp, Endianness, Inst,
    LogicalOp, MapPutKind, Op, Terminator,
};
pub use printer::FunctionDisplay;
pub use types::{Type, TypeCell, TypeConflict, TypeState};
pub use verify::{verify_function, verify_module, VerifyError};
