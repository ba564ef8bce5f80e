//! Stable exit codes for `sposh` commands.

/// Command succeeded, or `sposh run` ended with the goal won.
pub const OK: i32 = 0;
/// Invalid input: unreadable files, lex or syntax errors, unresolved names,
/// bad config, or a capability failure during a run.
pub const INVALID: i32 = 1;
/// `sposh run` stopped on a step where no drive element was ready.
pub const LOST: i32 = 2;
/// `sposh run` reached `max_steps`.
pub const STEP_LIMIT: i32 = 3;
