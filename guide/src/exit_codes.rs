//! Stable exit codes for guide CLI commands.

/// Command succeeded (plan usable, ranking found a match, config written).
pub const OK: i32 = 0;
/// Invalid input, unusable plan, or any other error.
pub const INVALID: i32 = 1;
/// `guide rank` found no element scoring above zero.
pub const NO_MATCH: i32 = 2;
