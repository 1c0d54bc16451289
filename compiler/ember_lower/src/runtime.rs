//! Runtime symbols the generated code links against.
//!
//! All of them are declared on demand in the module under construction;
//! none is defined by this engine.

/// Exception personality attached to every function.
pub const PERSONALITY: &str = "lumen_eh_personality";

/// Abort routine for the impossible receive status.
pub const FATAL_ERROR: &str = "__lumen_builtin_fatal_error";

/// Target of the `fail/1` intrinsic.
pub const BUILTIN_FAIL: &str = "__lumen_builtin_fail/1";

/// Generic closure application: `(closure, args)`.
pub const APPLY_2: &str = "erlang:apply/2";

/// Generic dynamic call: `(module, function, args)`.
pub const APPLY_3: &str = "erlang:apply/3";

/// Catch-type descriptor referenced by landing pads on SEH targets.
pub const ERROR_TYPE_INFO: &str = "__lumen_erlang_error_type_info";

/// Atom id of the `error` exception class.
pub const ERROR_ATOM: u64 = 46;

/// Atom id of the `throw` exception class.
pub const THROW_ATOM: u64 = 58;

/// Atom id of the `exit` exception class.
///
/// Exits are raised through the `error` class.
pub const EXIT_ATOM: u64 = ERROR_ATOM;
