//! Stable exit codes for `provision` CLI commands.

/// Command succeeded; every pipeline step continued.
pub const OK: i32 = 0;
/// Invalid config, arguments, or other errors before the pipeline started.
pub const INVALID: i32 = 1;
/// A pipeline step halted with an error.
pub const HALTED: i32 = 3;
/// The pipeline was cancelled or ran out of time before a step could start.
pub const CANCELLED: i32 = 4;
