//! Handle newtypes for IR entities.
//!
//! Values and blocks are scoped to one [`Function`](crate::Function);
//! functions and globals are scoped to one [`Module`](crate::Module).
//! All handles are dense indices allocated sequentially from 0.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create a handle from a raw index.
            #[inline]
            pub fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw `u32` value.
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub(crate) fn from_index(index: usize) -> Self {
                // Arenas never reach u32::MAX entries in practice.
                #[allow(clippy::cast_possible_truncation)]
                Self(index as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// SSA value within a function: a block parameter or an instruction result.
    ValueId,
    "%"
);
define_id!(
    /// Basic block within a function.
    BlockId,
    "^bb"
);
define_id!(
    /// Function within a module.
    FuncId,
    "@f"
);
define_id!(
    /// Module-level global.
    GlobalId,
    "@g"
);
