//! Stable exit codes for `sical-rpa` commands.

use crate::driver::RunStop;

/// Command succeeded; for `run`, every row was processed.
pub const OK: i32 = 0;
/// Invalid config/assets/spreadsheet or an unexpected error.
pub const INVALID: i32 = 1;
/// `run` stopped on a missing reference, a critical dialog or a resync timeout.
pub const ABORTED: i32 = 2;
/// `run` was cancelled by the operator (including the failsafe corner).
pub const OPERATOR_ABORT: i32 = 3;

pub fn for_stop(stop: &RunStop) -> i32 {
    match stop {
        RunStop::Completed => OK,
        RunStop::Aborted { .. } => ABORTED,
        RunStop::OperatorAbort { .. } => OPERATOR_ABORT,
        RunStop::Failed { .. } | RunStop::Invalid { .. } => INVALID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AbortReason;

    #[test]
    fn maps_every_stop() {
        assert_eq!(for_stop(&RunStop::Completed), OK);
        assert_eq!(
            for_stop(&RunStop::Aborted {
                row: 2,
                reason: AbortReason::CriticalDialog
            }),
            ABORTED
        );
        assert_eq!(
            for_stop(&RunStop::OperatorAbort {
                row: None,
                failsafe: true
            }),
            OPERATOR_ABORT
        );
        assert_eq!(
            for_stop(&RunStop::Invalid {
                message: "x".to_string()
            }),
            INVALID
        );
    }
}
