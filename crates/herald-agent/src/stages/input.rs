use chrono::{DateTime, Local};

use herald_core::types::{Action, LogEntry, LogStatus};
use herald_core::{StateUpdate, WorkflowState};

/// Check that the user has supplied preferences.
///
/// Absence is expected before the first configuration, so it is logged
/// rather than raised.
pub fn collect_input(state: &WorkflowState, now: DateTime<Local>) -> StateUpdate {
    if state.preferences.is_some() {
        return StateUpdate::none();
    }

    StateUpdate::none().log(LogEntry::new(
        now,
        Action::InputCollection,
        LogStatus::Failure,
        "No user preferences provided",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_test_utils::{at, sample_preferences};

    #[test]
    fn test_missing_preferences_logs_failure_only() {
        let state = WorkflowState::new();
        let update = collect_input(&state, at(9, 0));

        assert_eq!(update.logs.len(), 1);
        assert_eq!(update.logs[0].action, Action::InputCollection);
        assert_eq!(update.logs[0].status, LogStatus::Failure);
        assert!(update.content.is_none());
        assert!(update.status.is_none());
    }

    #[test]
    fn test_present_preferences_is_silent() {
        let state = WorkflowState::with_preferences(sample_preferences());
        assert!(collect_input(&state, at(9, 0)).is_empty());
    }
}
