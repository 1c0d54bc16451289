//! Term type model: source-level type descriptors to IR types.
//!
//! The front-end describes types as a numeric tag plus an optional payload
//! (tuple arity, boxed inner type). Decoding a descriptor into a
//! [`TypeTag`] is the only fallible step; mapping a `TypeTag` to an IR
//! [`Type`] is total.

use ember_ir::{Type, TypeCell};

use crate::error::{LowerError, LowerResult};

/// Numeric tags used by type descriptors.
pub mod tag {
    pub const NONE: u32 = 0;
    pub const OPAQUE_TERM: u32 = 1;
    pub const LIST: u32 = 2;
    pub const NUMBER: u32 = 3;
    pub const INTEGER: u32 = 4;
    pub const FLOAT: u32 = 5;
    pub const ATOM: u32 = 6;
    pub const BOOLEAN: u32 = 7;
    pub const FIXNUM: u32 = 8;
    pub const BIGINT: u32 = 9;
    pub const NIL: u32 = 10;
    pub const CONS: u32 = 11;
    pub const TUPLE: u32 = 12;
    pub const CLOSURE: u32 = 13;
    pub const MAP: u32 = 14;
    pub const BINARY: u32 = 15;
    pub const HEAPBIN: u32 = 16;
    pub const BOX: u32 = 17;
}

/// Extra data carried by some type descriptors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypePayload {
    None,
    /// Arity of a tuple.
    Arity(u32),
    /// Inner type of a box.
    Inner(Box<TypeDescriptor>),
}

/// A type as described by the front-end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub tag: u32,
    pub payload: TypePayload,
}

impl TypeDescriptor {
    /// Descriptor for a payload-free tag.
    pub fn simple(tag: u32) -> Self {
        TypeDescriptor {
            tag,
            payload: TypePayload::None,
        }
    }

    /// The opaque term descriptor.
    pub fn opaque() -> Self {
        Self::simple(tag::OPAQUE_TERM)
    }

    pub fn tuple(arity: u32) -> Self {
        TypeDescriptor {
            tag: tag::TUPLE,
            payload: TypePayload::Arity(arity),
        }
    }

    pub fn boxed(inner: TypeDescriptor) -> Self {
        TypeDescriptor {
            tag: tag::BOX,
            payload: TypePayload::Inner(Box::new(inner)),
        }
    }
}

/// Closed set of source-level types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
    None,
    OpaqueTerm,
    List,
    Number,
    Integer,
    Float,
    Atom,
    Boolean,
    Fixnum,
    BigInt,
    Nil,
    Cons,
    Tuple(u32),
    Closure,
    Map,
    Binary,
    HeapBin,
    Box(Box<TypeTag>),
}

impl TryFrom<&TypeDescriptor> for TypeTag {
    type Error = LowerError;

    fn try_from(desc: &TypeDescriptor) -> LowerResult<Self> {
        Ok(match desc.tag {
            tag::NONE => TypeTag::None,
            tag::OPAQUE_TERM => TypeTag::OpaqueTerm,
            tag::LIST => TypeTag::List,
            tag::NUMBER => TypeTag::Number,
            tag::INTEGER => TypeTag::Integer,
            tag::FLOAT => TypeTag::Float,
            tag::ATOM => TypeTag::Atom,
            tag::BOOLEAN => TypeTag::Boolean,
            tag::FIXNUM => TypeTag::Fixnum,
            tag::BIGINT => TypeTag::BigInt,
            tag::NIL => TypeTag::Nil,
            tag::CONS => TypeTag::Cons,
            tag::TUPLE => match desc.payload {
                TypePayload::Arity(arity) => TypeTag::Tuple(arity),
                _ => {
                    return Err(LowerError::MalformedType {
                        tag: desc.tag,
                        expected: "arity",
                    })
                }
            },
            tag::CLOSURE => TypeTag::Closure,
            tag::MAP => TypeTag::Map,
            tag::BINARY => TypeTag::Binary,
            tag::HEAPBIN => TypeTag::HeapBin,
            tag::BOX => match &desc.payload {
                TypePayload::Inner(inner) => TypeTag::Box(Box::new(TypeTag::try_from(&**inner)?)),
                _ => {
                    return Err(LowerError::MalformedType {
                        tag: desc.tag,
                        expected: "inner type",
                    })
                }
            },
            other => return Err(LowerError::UnrecognizedType { tag: other }),
        })
    }
}

impl From<&TypeTag> for TypeDescriptor {
    fn from(tag: &TypeTag) -> Self {
        match tag {
            TypeTag::Tuple(arity) => TypeDescriptor::tuple(*arity),
            TypeTag::Box(inner) => TypeDescriptor::boxed(TypeDescriptor::from(&**inner)),
            simple => TypeDescriptor::simple(simple.code()),
        }
    }
}

impl TypeTag {
    /// Numeric descriptor tag for this type.
    pub fn code(&self) -> u32 {
        match self {
            TypeTag::None => tag::NONE,
            TypeTag::OpaqueTerm => tag::OPAQUE_TERM,
            TypeTag::List => tag::LIST,
            TypeTag::Number => tag::NUMBER,
            TypeTag::Integer => tag::INTEGER,
            TypeTag::Float => tag::FLOAT,
            TypeTag::Atom => tag::ATOM,
            TypeTag::Boolean => tag::BOOLEAN,
            TypeTag::Fixnum => tag::FIXNUM,
            TypeTag::BigInt => tag::BIGINT,
            TypeTag::Nil => tag::NIL,
            TypeTag::Cons => tag::CONS,
            TypeTag::Tuple(_) => tag::TUPLE,
            TypeTag::Closure => tag::CLOSURE,
            TypeTag::Map => tag::MAP,
            TypeTag::Binary => tag::BINARY,
            TypeTag::HeapBin => tag::HEAPBIN,
            TypeTag::Box(_) => tag::BOX,
        }
    }

    #[inline]
    pub fn is_opaque(&self) -> bool {
        matches!(self, TypeTag::OpaqueTerm)
    }

    /// The IR type for this source type.
    pub fn to_type(&self) -> Type {
        match self {
            TypeTag::None => Type::None,
            TypeTag::OpaqueTerm => Type::Term,
            TypeTag::List => Type::List,
            TypeTag::Number => Type::Number,
            TypeTag::Integer => Type::Integer,
            TypeTag::Float => Type::Float,
            TypeTag::Atom => Type::Atom,
            TypeTag::Boolean => Type::Boolean,
            TypeTag::Fixnum => Type::Fixnum,
            TypeTag::BigInt => Type::BigInt,
            TypeTag::Nil => Type::Nil,
            TypeTag::Cons => Type::Cons,
            TypeTag::Tuple(arity) => Type::Tuple(*arity),
            TypeTag::Closure => Type::Closure,
            TypeTag::Map => Type::Map,
            TypeTag::Binary => Type::Binary,
            TypeTag::HeapBin => Type::HeapBin,
            TypeTag::Box(inner) => Type::boxed(inner.to_type()),
        }
    }

    /// Type cell for a block parameter of this type.
    ///
    /// Opaque parameters stay provisional so a later producer can narrow them.
    pub fn param_cell(&self) -> TypeCell {
        if self.is_opaque() {
            TypeCell::provisional()
        } else {
            TypeCell::declared(self.to_type())
        }
    }
}

/// Decode `desc` and map it to an IR type.
pub fn lower_type(desc: &TypeDescriptor) -> LowerResult<Type> {
    TypeTag::try_from(desc).map(|t| t.to_type())
}
