//! Lowering engine for a dynamically typed term language.
//!
//! A front-end drives a [`ModuleBuilder`] with discrete requests (define a
//! function, append a block, build a call, build a map update, ...) and
//! receives a verified [`ember_ir::Module`] in return. Source-level
//! failures of the generated program never surface as errors here; they
//! become explicit edges in the control-flow graph. [`LowerError`] is
//! reserved for contract violations by the caller.
//!
//! # Debugging
//!
//! Enable tracing with environment variables:
//! - `RUST_LOG=ember_lower=debug` - Debug level tracing
//! - `RUST_LOG=ember_lower=trace` - Trace level (very verbose)
//! - `RUST_LOG=ember_lower::calls=trace` - Trace call lowering only
//!
//! # Example
//!
//! ```
//! use ember_ir::Location;
//! use ember_lower::{CallSite, LowerConfig, ModuleBuilder, TypeDescriptor};
//!
//! let mut b = ModuleBuilder::new(LowerConfig::new("demo"));
//! let term = TypeDescriptor::opaque();
//! let decl = b.create_function("demo:id/1", &[term.clone()], Some(&term)).unwrap();
//! let arg = b.block_argument(decl.entry, 0).unwrap();
//! b.build_static_call("demo:other/1", &CallSite::new(Location::Unknown, vec![arg]).tail())
//!     .unwrap();
//! assert!(b.finish().success);
//! ```

#![allow(
    // Tuple arities and env sizes are u32 in the IR
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
)]

pub mod binary;
pub mod builder;
pub mod calls;
pub mod config;
pub mod constants;
pub mod control;
pub mod error;
pub mod map;
pub mod patterns;
pub mod receive;
pub mod runtime;
pub mod target;
pub mod terms;
pub mod types;

#[cfg(test)]
mod test_helpers;

pub use binary::{BinaryPush, SpecifierDescriptor};
pub use builder::{FunctionDecl, LowerOutput, ModuleBuilder};
pub use calls::{CallSite, Intrinsic};
pub use config::LowerConfig;
pub use constants::MapAttrEntry;
pub use control::Edge;
pub use error::{LowerError, LowerResult};
pub use map::{MapAction, MapUpdate};
pub use patterns::{
    Match, MatchBranch, MatchBranchDescriptor, MatchPattern, PatternDescriptor, PatternMatcher,
    PatternPayload, SequentialMatcher,
};
pub use receive::ReceiveStatus;
pub use target::{Arch, ExceptionModel, TargetError, TargetInfo};
pub use terms::ClosureDescriptor;
pub use types::{lower_type, TypeDescriptor, TypePayload, TypeTag};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Does nothing unless `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
