//! Stable exit codes for genloop CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid arguments, config or catalog, or any failure not covered below.
pub const INVALID: i32 = 1;
/// A workflow aborted because a required artifact or step log was missing.
pub const ABORTED: i32 = 2;
