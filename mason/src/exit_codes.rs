//! Stable exit codes for mason CLI commands.

use crate::io::report::RunOutcome;

/// Command succeeded or the run completed.
pub const OK: i32 = 0;
/// Invalid config or schema, or a run that failed on a fatal error.
pub const INVALID: i32 = 1;
/// The operator aborted, or recovery was exhausted without an operator.
pub const ABORTED: i32 = 2;
/// The run finished with failed or cancelled steps.
pub const INCOMPLETE: i32 = 3;

pub fn for_outcome(outcome: RunOutcome) -> i32 {
    match outcome {
        RunOutcome::Completed => OK,
        RunOutcome::Incomplete => INCOMPLETE,
        RunOutcome::Aborted => ABORTED,
        RunOutcome::Failed => INVALID,
    }
}
