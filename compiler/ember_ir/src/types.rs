//! IR types and set-once type cells.
//!
//! [`Type`] is the closed set of types an IR value may carry. Term-domain
//! types describe runtime values of the source language; the remaining
//! variants are machine or handle types that never escape into term
//! positions without an explicit cast.
//!
//! [`TypeCell`] tracks how a value's type came to be. Block parameters
//! usually start out *provisional* (opaque `Term`) and are narrowed at
//! most once when a concrete producer is wired to them.

use std::fmt;

/// A concrete IR type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    /// The absent value. Used for empty returns on fatal paths.
    None,
    /// Opaque term of statically unknown kind.
    Term,
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
    /// Tuple of a fixed arity. Different arities are different types.
    Tuple(u32),
    Closure,
    Map,
    Binary,
    HeapBin,
    Reference,
    /// Heap indirection to exactly one inner type.
    Box(Box<Type>),

    // ── Machine and handle types ────────────────────────────────────
    I1,
    I8,
    I32,
    Ptr(Box<Type>),
    /// Closure environment with a fixed number of captured slots.
    Env(u32),
    ReceiveRef,
    TraceRef,
    BinaryBuilder,
}

impl Type {
    /// Shorthand for `Type::Box(Box::new(inner))`.
    pub fn boxed(inner: Type) -> Self {
        Type::Box(Box::new(inner))
    }

    /// Shorthand for `Type::Ptr(Box::new(inner))`.
    pub fn ptr(inner: Type) -> Self {
        Type::Ptr(Box::new(inner))
    }

    /// Whether this is the opaque `Term` type.
    #[inline]
    pub fn is_term(&self) -> bool {
        matches!(self, Type::Term)
    }

    /// Whether this type belongs to the term domain (may be upcast to `Term`).
    pub fn is_term_kind(&self) -> bool {
        match self {
            Type::Term
            | Type::List
            | Type::Number
            | Type::Integer
            | Type::Float
            | Type::Atom
            | Type::Boolean
            | Type::Fixnum
            | Type::BigInt
            | Type::Nil
            | Type::Cons
            | Type::Tuple(_)
            | Type::Closure
            | Type::Map
            | Type::Binary
            | Type::HeapBin
            | Type::Reference
            | Type::Box(_) => true,
            Type::None
            | Type::I1
            | Type::I8
            | Type::I32
            | Type::Ptr(_)
            | Type::Env(_)
            | Type::ReceiveRef
            | Type::TraceRef
            | Type::BinaryBuilder => false,
        }
    }

    /// Whether a value of this type may flow into a slot of type `target`
    /// without an explicit cast.
    ///
    /// Identity, implicit upcast of any term-kind to `Term`, and the
    /// `I1`/`Boolean` interchange are accepted.
    pub fn is_assignable_to(&self, target: &Type) -> bool {
        if self == target {
            return true;
        }
        match (self, target) {
            (_, Type::Term) => self.is_term_kind(),
            (Type::I1, Type::Boolean) | (Type::Boolean, Type::I1) => true,
            _ => false,
        }
    }

    /// Whether values of this type are known to be booleans.
    pub fn is_boolean_like(&self) -> bool {
        matches!(self, Type::Boolean | Type::I1)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::None => f.write_str("none"),
            Type::Term => f.write_str("term"),
            Type::List => f.write_str("list"),
            Type::Number => f.write_str("number"),
            Type::Integer => f.write_str("integer"),
            Type::Float => f.write_str("float"),
            Type::Atom => f.write_str("atom"),
            Type::Boolean => f.write_str("bool"),
            Type::Fixnum => f.write_str("fixnum"),
            Type::BigInt => f.write_str("bigint"),
            Type::Nil => f.write_str("nil"),
            Type::Cons => f.write_str("cons"),
            Type::Tuple(arity) => write!(f, "tuple<{arity}>"),
            Type::Closure => f.write_str("closure"),
            Type::Map => f.write_str("map"),
            Type::Binary => f.write_str("binary"),
            Type::HeapBin => f.write_str("heapbin"),
            Type::Reference => f.write_str("reference"),
            Type::Box(inner) => write!(f, "box<{inner}>"),
            Type::I1 => f.write_str("i1"),
            Type::I8 => f.write_str("i8"),
            Type::I32 => f.write_str("i32"),
            Type::Ptr(inner) => write!(f, "ptr<{inner}>"),
            Type::Env(size) => write!(f, "env<{size}>"),
            Type::ReceiveRef => f.write_str("receive_ref"),
            Type::TraceRef => f.write_str("trace_ref"),
            Type::BinaryBuilder => f.write_str("binary_builder"),
        }
    }
}

// ── Type cells ──────────────────────────────────────────────────────

/// How a value's type was established.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeState {
    /// Opaque placeholder awaiting its first concrete producer.
    Provisional,
    /// Fixed when the value was created.
    Declared,
    /// Was provisional, then narrowed exactly once.
    Narrowed,
    /// Forced back to `Term` because incompatible producers meet here.
    Widened,
}

/// Attempted to narrow a type cell that already carries a different type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("cannot narrow `{current}` to `{requested}`: type already fixed")]
pub struct TypeConflict {
    pub current: Type,
    pub requested: Type,
}

/// A value's type together with its narrowing state.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeCell {
    ty: Type,
    state: TypeState,
}

impl TypeCell {
    /// An opaque `Term` cell that may still be narrowed.
    pub fn provisional() -> Self {
        TypeCell {
            ty: Type::Term,
            state: TypeState::Provisional,
        }
    }

    /// A cell fixed to `ty` from the start.
    pub fn declared(ty: Type) -> Self {
        TypeCell {
            ty,
            state: TypeState::Declared,
        }
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    #[inline]
    pub fn state(&self) -> TypeState {
        self.state
    }

    #[inline]
    pub fn is_provisional(&self) -> bool {
        self.state == TypeState::Provisional
    }

    /// Narrow a provisional cell to `ty`.
    ///
    /// Narrowing to the type the cell already carries is a no-op. Any other
    /// attempt on a non-provisional cell fails and leaves the cell intact.
    pub fn narrow(&mut self, ty: Type) -> Result<(), TypeConflict> {
        if self.ty == ty {
            return Ok(());
        }
        if self.state != TypeState::Provisional {
            return Err(TypeConflict {
                current: self.ty.clone(),
                requested: ty,
            });
        }
        self.ty = ty;
        self.state = TypeState::Narrowed;
        Ok(())
    }

    /// Widen the cell to `Term`, the common supertype of all term kinds.
    pub fn widen(&mut self) {
        if !self.ty.is_term() {
            self.ty = Type::Term;
        }
        self.state = TypeState::Widened;
    }

    /// Unconditionally fix the cell to `ty`.
    ///
    /// Used for handle types (trace, receive, builder) whose parameter
    /// slot is dictated by the protocol that feeds it.
    pub fn retype(&mut self, ty: Type) {
        if self.ty != ty {
            self.ty = ty;
            self.state = TypeState::Narrowed;
        }
    }
}
