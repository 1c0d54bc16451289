//! Constant attributes.
//!
//! An [`Attr`] is a compile-time constant. Scalars are materialized by a
//! `Const` instruction; aggregates nest already-built attributes.

use std::fmt;

use num_bigint::BigInt;

use crate::Type;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Attr {
    /// Integer encoded in `width` bits.
    Int { value: i64, width: u32 },
    /// Arbitrary-precision integer with a declared bit width.
    BigInt { value: BigInt, width: u32 },
    Float(f64),
    Atom { id: u64, name: String },
    Bool(bool),
    /// Raw machine byte, used for runtime status codes.
    I8(i8),
    Nil,
    None,
    /// Binary payload plus runtime-defined header and flags words.
    Binary { bytes: Vec<u8>, header: u64, flags: u64 },
    List(Vec<Attr>),
    Tuple(Vec<Attr>),
    Map(Vec<(Attr, Attr)>),
}

impl Attr {
    /// The IR type of a value materialized from this attribute.
    pub fn ty(&self) -> Type {
        match self {
            Attr::I8(_) => Type::I8,
            Attr::Int { .. } => Type::Fixnum,
            Attr::BigInt { .. } => Type::BigInt,
            Attr::Float(_) => Type::Float,
            Attr::Atom { .. } => Type::Atom,
            Attr::Bool(_) => Type::Boolean,
            Attr::Nil => Type::Nil,
            Attr::None => Type::None,
            Attr::Binary { .. } => Type::Binary,
            Attr::List(elements) if elements.is_empty() => Type::Nil,
            Attr::List(_) => Type::List,
            Attr::Tuple(elements) => {
                // Constant tuples are built from in-memory element lists.
                #[allow(clippy::cast_possible_truncation)]
                Type::Tuple(elements.len() as u32)
            }
            Attr::Map(_) => Type::Map,
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attr::Int { value, width } => write!(f, "{value} : i{width}"),
            Attr::BigInt { value, width } => write!(f, "{value} : big{width}"),
            Attr::Float(v) => write!(f, "{v:?}"),
            Attr::Atom { id, name } => write!(f, "#atom<{id}:{name}>"),
            Attr::Bool(b) => write!(f, "{b}"),
            Attr::I8(v) => write!(f, "{v} : i8"),
            Attr::Nil => f.write_str("nil"),
            Attr::None => f.write_str("none"),
            Attr::Binary { bytes, header, flags } => {
                write!(f, "#bin<{} bytes, header={header:#x}, flags={flags:#x}>", bytes.len())
            }
            Attr::List(elements) => write_seq(f, "[", elements, "]"),
            Attr::Tuple(elements) => write_seq(f, "{", elements, "}"),
            Attr::Map(entries) => {
                f.write_str("#{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k} => {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Attr], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}
