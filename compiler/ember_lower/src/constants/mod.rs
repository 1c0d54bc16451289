//! Constant materialization.
//!
//! Two layers: the `*_attr` functions build pure [`Attr`] values that can
//! be nested into aggregates, and the `build_constant_*` requests emit a
//! `Const` instruction at the insertion point.

use ember_ir::{Attr, Location, Op, ValueId};
use num_bigint::BigInt;
use tracing::trace;

use crate::builder::ModuleBuilder;
use crate::error::{LowerError, LowerResult};

/// One entry of a constant map. Either half may be missing when the
/// front-end failed to produce a constant for it.
#[derive(Clone, Debug, PartialEq)]
pub struct MapAttrEntry {
    pub key: Option<Attr>,
    pub value: Option<Attr>,
}

impl MapAttrEntry {
    pub fn new(key: Attr, value: Attr) -> Self {
        MapAttrEntry {
            key: Some(key),
            value: Some(value),
        }
    }
}

// ── Attribute builders ──────────────────────────────────────────────

pub fn int_attr(value: i64, width: u32) -> Attr {
    Attr::Int { value, width }
}

/// Parse a base-10 literal into a signed big integer of `width` bits.
pub fn bigint_attr(literal: &str, width: u32) -> LowerResult<Attr> {
    let value = BigInt::parse_bytes(literal.as_bytes(), 10).ok_or_else(|| {
        LowerError::InvalidBigInt {
            literal: literal.to_owned(),
        }
    })?;
    if !fits_signed(&value, width) {
        return Err(LowerError::BigIntOverflow {
            literal: literal.to_owned(),
            width,
        });
    }
    Ok(Attr::BigInt { value, width })
}

/// Two's complement range check: `-2^(width-1) <= value < 2^(width-1)`.
fn fits_signed(value: &BigInt, width: u32) -> bool {
    let Some(magnitude_bits) = width.checked_sub(1) else {
        return false;
    };
    let bound = BigInt::from(1u8) << magnitude_bits;
    *value < bound && *value >= -bound
}

pub fn float_attr(value: f64) -> Attr {
    Attr::Float(value)
}

/// Atom attribute. Unlike [`ModuleBuilder::build_constant_atom`] this
/// never folds to a boolean.
pub fn atom_attr(id: u64, name: impl Into<String>) -> Attr {
    Attr::Atom {
        id,
        name: name.into(),
    }
}

pub fn nil_attr() -> Attr {
    Attr::Nil
}

pub fn binary_attr(bytes: Vec<u8>, header: u64, flags: u64) -> Attr {
    Attr::Binary {
        bytes,
        header,
        flags,
    }
}

/// List attribute; the empty list is nil.
pub fn list_attr(elements: Vec<Attr>) -> Attr {
    if elements.is_empty() {
        Attr::Nil
    } else {
        Attr::List(elements)
    }
}

pub fn tuple_attr(elements: Vec<Attr>) -> Attr {
    Attr::Tuple(elements)
}

pub fn map_attr(entries: Vec<MapAttrEntry>) -> LowerResult<Attr> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let key = entry.key.ok_or(LowerError::MissingMapConstantKey { index })?;
            let value = entry
                .value
                .ok_or(LowerError::MissingMapConstantValue { index })?;
            Ok((key, value))
        })
        .collect::<LowerResult<Vec<_>>>()
        .map(Attr::Map)
}

// ── Materialization ─────────────────────────────────────────────────

/// Whether `value` fits a signed immediate of `bits` bits.
pub(crate) fn fits_immediate(value: i64, bits: u32) -> bool {
    if bits >= 64 {
        return true;
    }
    let max = (1i64 << (bits - 1)) - 1;
    let min = -(1i64 << (bits - 1));
    (min..=max).contains(&value)
}

impl ModuleBuilder {
    fn build_constant(&mut self, loc: &Location, attr: Attr) -> LowerResult<ValueId> {
        trace!(%attr, "materializing constant");
        self.emit1(loc, Op::Const(attr))
    }

    /// Materialize any constant attribute.
    pub fn build_constant_attr(&mut self, loc: &Location, attr: Attr) -> LowerResult<ValueId> {
        self.build_constant(loc, attr)
    }

    /// Integer constant in the target's immediate width, or a big integer
    /// when it does not fit.
    pub fn build_constant_int(&mut self, loc: &Location, value: i64) -> LowerResult<ValueId> {
        let bits = self.immediate_bits();
        let attr = if fits_immediate(value, bits) {
            int_attr(value, bits)
        } else {
            Attr::BigInt {
                value: BigInt::from(value),
                width: 64,
            }
        };
        self.build_constant(loc, attr)
    }

    pub fn build_constant_bigint(
        &mut self,
        loc: &Location,
        literal: &str,
        width: u32,
    ) -> LowerResult<ValueId> {
        let attr = bigint_attr(literal, width)?;
        self.build_constant(loc, attr)
    }

    pub fn build_constant_float(&mut self, loc: &Location, value: f64) -> LowerResult<ValueId> {
        self.build_constant(loc, float_attr(value))
    }

    /// Atom constant. Atom ids 0 and 1 are `false` and `true`.
    pub fn build_constant_atom(
        &mut self,
        loc: &Location,
        id: u64,
        name: &str,
    ) -> LowerResult<ValueId> {
        let attr = match id {
            0 => Attr::Bool(false),
            1 => Attr::Bool(true),
            _ => atom_attr(id, name),
        };
        self.build_constant(loc, attr)
    }

    pub fn build_constant_nil(&mut self, loc: &Location) -> LowerResult<ValueId> {
        self.build_constant(loc, nil_attr())
    }

    pub fn build_constant_binary(
        &mut self,
        loc: &Location,
        bytes: Vec<u8>,
        header: u64,
        flags: u64,
    ) -> LowerResult<ValueId> {
        self.build_constant(loc, binary_attr(bytes, header, flags))
    }

    pub fn build_constant_list(
        &mut self,
        loc: &Location,
        elements: Vec<Attr>,
    ) -> LowerResult<ValueId> {
        self.build_constant(loc, list_attr(elements))
    }

    pub fn build_constant_tuple(
        &mut self,
        loc: &Location,
        elements: Vec<Attr>,
    ) -> LowerResult<ValueId> {
        self.build_constant(loc, tuple_attr(elements))
    }

    pub fn build_constant_map(
        &mut self,
        loc: &Location,
        entries: Vec<MapAttrEntry>,
    ) -> LowerResult<ValueId> {
        let attr = map_attr(entries)?;
        self.build_constant(loc, attr)
    }
}

#[cfg(test)]
mod tests;
