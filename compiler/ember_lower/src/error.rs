//! Fatal lowering errors.
//!
//! These signal a contract violation between the front-end issuing
//! requests and this engine. They abort the request that detected them.
//! Failures of the *generated* program (a failed map update, a receive
//! timeout, a thrown exception) are never reported here; they are edges
//! in the emitted control-flow graph.

use ember_ir::{BlockId, FuncId, TypeConflict, ValueId};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    #[error("cannot define a function more than once: `{name}`")]
    RedefinedFunction { name: String },

    #[error("unrecognized type tag {tag}")]
    UnrecognizedType { tag: u32 },

    #[error("type tag {tag} is missing its {expected} payload")]
    MalformedType { tag: u32, expected: &'static str },

    #[error("unrecognized match pattern tag {tag}")]
    UnrecognizedPatternTag { tag: u32 },

    #[error("match pattern tag {tag} is missing its {expected} payload")]
    MalformedPattern { tag: u32, expected: &'static str },

    #[error("match requires at least one branch")]
    EmptyMatch,

    #[error("invalid binary specifier tag {tag}")]
    InvalidBinarySpecifier { tag: u32 },

    #[error("invalid endianness tag {tag}")]
    InvalidEndianness { tag: u32 },

    #[error("logical operator requires at least 2 operands, got {found}")]
    TooFewLogicalOperands { found: usize },

    #[error("invalid big integer literal `{literal}`")]
    InvalidBigInt { literal: String },

    #[error("big integer literal `{literal}` does not fit in {width} bits")]
    BigIntOverflow { literal: String, width: u32 },

    #[error("map constant entry {index} is missing its key")]
    MissingMapConstantKey { index: usize },

    #[error("map constant entry {index} is missing its value")]
    MissingMapConstantValue { index: usize },

    #[error("closure environment must have at least one slot")]
    EmptyEnv,

    #[error("unknown function handle {0}")]
    UnknownFunction(FuncId),

    #[error("unknown block handle {0}")]
    UnknownBlock(BlockId),

    #[error("unknown value handle {0}")]
    UnknownValue(ValueId),

    #[error("block {block} has {found} arguments, expected at least {expected}")]
    MissingBlockArgument {
        block: BlockId,
        expected: usize,
        found: usize,
    },

    #[error("no insertion point: position the builder at a block first")]
    NoInsertionPoint,

    #[error("block {0} is already terminated")]
    AlreadyTerminated(BlockId),

    #[error("invalid call symbol `{symbol}`: expected `module:function/arity`")]
    InvalidCallSymbol { symbol: String },

    #[error("intrinsic `{symbol}` takes {expected} arguments, got {found}")]
    IntrinsicArity {
        symbol: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    TypeConflict(#[from] TypeConflict),
}

pub type LowerResult<T> = Result<T, LowerError>;
