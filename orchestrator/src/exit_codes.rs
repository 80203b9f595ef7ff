//! Stable exit codes for orchestrator CLI commands.

/// Command succeeded; for `solve`, the fail-to-pass tests pass.
pub const OK: i32 = 0;
/// Invalid input, config or other errors.
pub const INVALID: i32 = 1;
/// The tool service could not be reached.
pub const UNREACHABLE: i32 = 2;
/// `solve` finished but the fail-to-pass tests do not pass.
pub const UNRESOLVED: i32 = 3;
