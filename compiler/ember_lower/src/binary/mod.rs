//! Binary construction: start, push segments, finish.
//!
//! Each push is an independent fallible step; callers sequence pushes by
//! positioning at each push's success block.

use ember_ir::{graph, BinarySpecifier, BlockId, Endianness, Location, Op, Type, ValueId};
use tracing::trace;

use crate::builder::ModuleBuilder;
use crate::control::Edge;
use crate::error::{LowerError, LowerResult};

/// Numeric tags of binary segment specifiers.
pub mod spec_tag {
    pub const INTEGER: u32 = 0;
    pub const FLOAT: u32 = 1;
    pub const BYTES: u32 = 2;
    pub const BITS: u32 = 3;
    pub const UTF8: u32 = 4;
    pub const UTF16: u32 = 5;
    pub const UTF32: u32 = 6;
}

/// Numeric tags of segment endianness.
pub mod endianness_tag {
    pub const BIG: u32 = 0;
    pub const LITTLE: u32 = 1;
    pub const NATIVE: u32 = 2;
}

/// A segment specifier as described by the front-end. Fields irrelevant
/// to the tag are ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpecifierDescriptor {
    pub tag: u32,
    pub unit: u8,
    pub endianness: u32,
    pub signed: bool,
}

fn decode_endianness(tag: u32) -> LowerResult<Endianness> {
    match tag {
        endianness_tag::BIG => Ok(Endianness::Big),
        endianness_tag::LITTLE => Ok(Endianness::Little),
        endianness_tag::NATIVE => Ok(Endianness::Native),
        _ => Err(LowerError::InvalidEndianness { tag }),
    }
}

impl TryFrom<&SpecifierDescriptor> for BinarySpecifier {
    type Error = LowerError;

    fn try_from(desc: &SpecifierDescriptor) -> LowerResult<Self> {
        let unit = desc.unit;
        Ok(match desc.tag {
            spec_tag::INTEGER => BinarySpecifier::Integer {
                unit,
                endianness: decode_endianness(desc.endianness)?,
                signed: desc.signed,
            },
            spec_tag::FLOAT => BinarySpecifier::Float {
                unit,
                endianness: decode_endianness(desc.endianness)?,
            },
            spec_tag::BYTES => BinarySpecifier::Bytes { unit },
            spec_tag::BITS => BinarySpecifier::Bits { unit },
            spec_tag::UTF8 => BinarySpecifier::Utf8 {
                endianness: decode_endianness(desc.endianness)?,
            },
            spec_tag::UTF16 => BinarySpecifier::Utf16 {
                endianness: decode_endianness(desc.endianness)?,
            },
            spec_tag::UTF32 => BinarySpecifier::Utf32 {
                endianness: decode_endianness(desc.endianness)?,
            },
            tag => return Err(LowerError::InvalidBinarySpecifier { tag }),
        })
    }
}

/// One segment push.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryPush {
    pub loc: Location,
    pub builder: ValueId,
    pub value: ValueId,
    /// Explicit size in units; absent means the specifier's default.
    pub size: Option<ValueId>,
    pub spec: SpecifierDescriptor,
    /// Receives the extended builder.
    pub ok: BlockId,
    /// Receives nothing.
    pub err: BlockId,
}

impl ModuleBuilder {
    /// Create an empty binary builder and branch to `cont` with it.
    pub fn build_binary_start(&mut self, loc: &Location, cont: BlockId) -> LowerResult<()> {
        let param = self.block_argument(cont, 0)?;
        let builder = self.emit1(loc, Op::BinaryStart)?;
        self.retype_param(param, Type::BinaryBuilder)?;
        self.build_br(loc, Edge::new(cont, vec![builder]))
    }

    pub fn build_binary_push(&mut self, push: &BinaryPush) -> LowerResult<()> {
        let spec = BinarySpecifier::try_from(&push.spec)?;
        let loc = &push.loc;
        let func = self.cursor()?.func;
        self.check_block(func, push.err)?;
        self.check_values(func, &[push.builder, push.value])?;
        self.check_values(func, push.size.as_slice())?;
        let ok_param = self.block_argument(push.ok, 0)?;
        let value = self.as_term(loc, push.value)?;
        let results = self.emit(
            loc,
            Op::BinaryPush {
                builder: push.builder,
                value,
                size: push.size,
                spec,
            },
        )?;
        let (next, ok_flag) = (results[0], results[1]);
        self.retype_param(ok_param, Type::BinaryBuilder)?;
        trace!(?spec, ok = %push.ok, err = %push.err, "binary push");
        self.build_cond_br(
            loc,
            ok_flag,
            Edge::new(push.ok, vec![next]),
            Edge::to(push.err),
        )
    }

    /// Materialize the binary.
    ///
    /// With a continuation that nothing else branches to, its argument is
    /// retyped to the binary type. A continuation with other predecessors
    /// receives an opaque term instead. Without a continuation the term
    /// is returned.
    pub fn build_binary_finish(
        &mut self,
        loc: &Location,
        builder: ValueId,
        cont: Option<BlockId>,
    ) -> LowerResult<()> {
        let func = self.cursor()?.func;
        self.check_values(func, &[builder])?;
        let cont = cont
            .map(|cont| self.block_argument(cont, 0).map(|param| (cont, param)))
            .transpose()?;

        let bin = self.emit1(loc, Op::BinaryFinish { builder })?;
        let Some((cont, param)) = cont else {
            let term = self.as_term(loc, bin)?;
            return self.build_return(loc, Some(term));
        };
        if graph::predecessor_count(self.module.function(func), cont) == 0 {
            self.retype_param(param, Type::Binary)?;
            self.build_br(loc, Edge::new(cont, vec![bin]))
        } else {
            let term = self.as_term(loc, bin)?;
            self.build_br(loc, Edge::new(cont, vec![term]))
        }
    }

    /// Force the block parameter `param` of the current function to `ty`.
    pub(crate) fn retype_param(&mut self, param: ValueId, ty: Type) -> LowerResult<()> {
        let func = self.cursor()?.func;
        self.module.function_mut(func).value_cell_mut(param).retype(ty);
        Ok(())
    }
}
