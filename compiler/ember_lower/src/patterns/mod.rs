//! Pattern descriptors and the matcher seam.
//!
//! The front-end describes each branch of a match with a tagged pattern
//! descriptor. Conversion into [`MatchPattern`] is purely translational.
//! Turning an ordered list of branches into tests is the job of a
//! [`PatternMatcher`]; [`SequentialMatcher`] is the built-in one.

mod sequential;

use ember_ir::{BinarySpecifier, BlockId, Location, ValueId};
use tracing::debug;

use crate::binary::SpecifierDescriptor;
use crate::builder::ModuleBuilder;
use crate::error::{LowerError, LowerResult};
use crate::types::{TypeDescriptor, TypeTag};

pub use sequential::SequentialMatcher;

/// Numeric tags of pattern descriptors.
pub mod pattern_tag {
    pub const ANY: u32 = 0;
    pub const CONS: u32 = 1;
    pub const TUPLE: u32 = 2;
    pub const MAP_ITEM: u32 = 3;
    pub const IS_TYPE: u32 = 4;
    pub const VALUE: u32 = 5;
    pub const BINARY: u32 = 6;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternPayload {
    None,
    /// Tuple arity.
    Arity(u32),
    /// Map key or exact value.
    Value(ValueId),
    Type(TypeDescriptor),
    Binary {
        spec: SpecifierDescriptor,
        size: Option<ValueId>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternDescriptor {
    pub tag: u32,
    pub payload: PatternPayload,
}

impl PatternDescriptor {
    pub fn new(tag: u32, payload: PatternPayload) -> Self {
        PatternDescriptor { tag, payload }
    }

    pub fn any() -> Self {
        Self::new(pattern_tag::ANY, PatternPayload::None)
    }
}

/// What a match branch tests its selector against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchPattern {
    Any,
    /// A non-empty list; binds head and tail.
    Cons,
    /// A tuple of exactly this arity; binds every element.
    Tuple(u32),
    /// A map containing the key; binds the value.
    MapItem(ValueId),
    IsType(TypeTag),
    /// Strict equality with a value.
    Value(ValueId),
    /// A leading binary segment; binds the segment value and the rest.
    Binary {
        spec: BinarySpecifier,
        size: Option<ValueId>,
    },
}

impl TryFrom<&PatternDescriptor> for MatchPattern {
    type Error = LowerError;

    fn try_from(desc: &PatternDescriptor) -> LowerResult<Self> {
        let malformed = |expected| LowerError::MalformedPattern {
            tag: desc.tag,
            expected,
        };
        Ok(match (desc.tag, &desc.payload) {
            (pattern_tag::ANY, _) => MatchPattern::Any,
            (pattern_tag::CONS, _) => MatchPattern::Cons,
            (pattern_tag::TUPLE, PatternPayload::Arity(arity)) => MatchPattern::Tuple(*arity),
            (pattern_tag::TUPLE, _) => return Err(malformed("arity")),
            (pattern_tag::MAP_ITEM, PatternPayload::Value(key)) => MatchPattern::MapItem(*key),
            (pattern_tag::MAP_ITEM, _) => return Err(malformed("key")),
            (pattern_tag::IS_TYPE, PatternPayload::Type(ty)) => {
                MatchPattern::IsType(TypeTag::try_from(ty)?)
            }
            (pattern_tag::IS_TYPE, _) => return Err(malformed("type")),
            (pattern_tag::VALUE, PatternPayload::Value(value)) => MatchPattern::Value(*value),
            (pattern_tag::VALUE, _) => return Err(malformed("value")),
            (pattern_tag::BINARY, PatternPayload::Binary { spec, size }) => MatchPattern::Binary {
                spec: BinarySpecifier::try_from(spec)?,
                size: *size,
            },
            (pattern_tag::BINARY, _) => return Err(malformed("binary specifier")),
            (tag, _) => return Err(LowerError::UnrecognizedPatternTag { tag }),
        })
    }
}

/// One branch as described by the front-end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchBranchDescriptor {
    pub loc: Location,
    pub dest: BlockId,
    pub dest_args: Vec<ValueId>,
    pub pattern: PatternDescriptor,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchBranch {
    pub loc: Location,
    pub dest: BlockId,
    /// Passed to `dest` ahead of the pattern's bindings.
    pub dest_args: Vec<ValueId>,
    pub pattern: MatchPattern,
}

impl TryFrom<&MatchBranchDescriptor> for MatchBranch {
    type Error = LowerError;

    fn try_from(desc: &MatchBranchDescriptor) -> LowerResult<Self> {
        Ok(MatchBranch {
            loc: desc.loc.clone(),
            dest: desc.dest,
            dest_args: desc.dest_args.clone(),
            pattern: MatchPattern::try_from(&desc.pattern)?,
        })
    }
}

/// A decoded match: branches are tried in order and the first match wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    pub loc: Location,
    pub selector: ValueId,
    pub branches: Vec<MatchBranch>,
}

/// Lowers a decoded match at the builder's insertion point.
///
/// Implementations must preserve branch order and terminate every block
/// they create.
pub trait PatternMatcher {
    fn lower_match(&mut self, builder: &mut ModuleBuilder, m: &Match) -> LowerResult<()>;
}

impl ModuleBuilder {
    /// Lower a match with the built-in [`SequentialMatcher`].
    pub fn build_match(
        &mut self,
        loc: &Location,
        selector: ValueId,
        branches: &[MatchBranchDescriptor],
    ) -> LowerResult<()> {
        self.build_match_with(&mut SequentialMatcher, loc, selector, branches)
    }

    pub fn build_match_with<M: PatternMatcher + ?Sized>(
        &mut self,
        matcher: &mut M,
        loc: &Location,
        selector: ValueId,
        branches: &[MatchBranchDescriptor],
    ) -> LowerResult<()> {
        if branches.is_empty() {
            return Err(LowerError::EmptyMatch);
        }
        let func = self.cursor()?.func;
        self.check_values(func, &[selector])?;
        let branches = branches
            .iter()
            .map(MatchBranch::try_from)
            .collect::<LowerResult<Vec<_>>>()?;
        for branch in &branches {
            self.check_block(func, branch.dest)?;
        }
        debug!(%selector, branches = branches.len(), "lowering match");
        let m = Match {
            loc: loc.clone(),
            selector,
            branches,
        };
        matcher.lower_match(self, &m)
    }
}
