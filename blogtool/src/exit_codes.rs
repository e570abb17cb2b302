//! Stable exit codes for blogtool CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed: missing tool, not a site or repository, bad input, or other errors.
pub const ERROR: i32 = 1;
/// Nothing to do, e.g. `blogtool commit` with a clean tree.
pub const NOTHING_TO_DO: i32 = 2;
/// The commit was created locally but `git push` failed.
pub const PUSH_FAILED: i32 = 3;
