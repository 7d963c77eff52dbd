use chrono::{DateTime, Local};
use tracing::{debug, info};

use herald_core::config::SchedulingConfig;
use herald_core::types::{Action, LogEntry, LogStatus, PostState};
use herald_core::{StateUpdate, WorkflowState};

use crate::time_match::matches_within;

/// Decide whether approved content may be posted now.
///
/// Authorization sets `current_time`. After `escalation_threshold`
/// unmatched checks, or under the debug override, posting is forced.
pub fn schedule(
    state: &WorkflowState,
    policy: &SchedulingConfig,
    now: DateTime<Local>,
) -> StateUpdate {
    if !state.status.is(PostState::Approved) || state.current_time.is_some() {
        return StateUpdate::none();
    }

    let attempts = state.scheduler_attempts;

    if policy.force_post || attempts >= policy.escalation_threshold {
        let details = if policy.force_post {
            format!("Forced posting after {} attempts (debug override)", attempts)
        } else {
            format!("Forced posting after {} unmatched attempts", attempts)
        };
        info!(attempts, override_flag = policy.force_post, "Posting forced");
        return StateUpdate::none()
            .current_time(Some(now))
            .scheduler_attempts(0)
            .log(LogEntry::new(now, Action::Scheduling, LogStatus::Forced, details));
    }

    let preferred = state
        .preferences
        .as_ref()
        .map(|p| p.posting_time.as_str())
        .unwrap_or_default();

    if matches_within(&now, preferred, policy.tolerance_minutes) {
        info!(preferred, now = %now.format("%H:%M"), "Posting window matched");
        StateUpdate::none()
            .current_time(Some(now))
            .scheduler_attempts(0)
            .log(LogEntry::new(
                now,
                Action::Scheduling,
                LogStatus::Success,
                format!("Scheduled posting at {} (preferred {})", now.format("%H:%M"), preferred),
            ))
    } else {
        let attempt = attempts + 1;
        debug!(preferred, attempt, "Outside posting window");
        StateUpdate::none()
            .scheduler_attempts(attempt)
            .log(LogEntry::new(
                now,
                Action::Scheduling,
                LogStatus::Waiting,
                format!(
                    "Waiting for preferred posting time: {} (attempt {}/{})",
                    preferred, attempt, policy.escalation_threshold
                ),
            ))
    }
}
