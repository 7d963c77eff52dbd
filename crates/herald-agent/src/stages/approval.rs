use chrono::{DateTime, Local};
use tracing::{info, warn};

use herald_core::types::{Action, LogEntry, LogStatus, PostState, PostStatus};
use herald_core::{StateUpdate, WorkflowState};

/// Apply the reviewer's verdict, if one has been supplied.
///
/// Without feedback this is a pass-through: the run continues and the
/// workflow simply waits for a later run. A verdict with no draft to apply
/// to is discarded, never carried over to a later draft.
pub fn review(state: &WorkflowState, now: DateTime<Local>) -> StateUpdate {
    let Some(feedback) = state.human_feedback.as_ref() else {
        return StateUpdate::none();
    };

    let consumed = StateUpdate::none().human_feedback(None);

    if state.content.is_none() {
        warn!(approved = feedback.approved, "Feedback discarded, no draft to review");
        return consumed.log(LogEntry::new(
            now,
            Action::ContentApproval,
            LogStatus::Failure,
            "Feedback discarded: no draft to review",
        ));
    }

    if state.status.is(PostState::Posted) {
        return consumed.log(LogEntry::new(
            now,
            Action::ContentApproval,
            LogStatus::Failure,
            "Feedback ignored: content already published",
        ));
    }

    if feedback.approved {
        info!(previous = %state.status.status, "Content approved");
        let details = if feedback.feedback.trim().is_empty() {
            "Content approved by human reviewer".to_string()
        } else {
            format!("Content approved by human reviewer: {}", feedback.feedback.trim())
        };
        consumed
            .status(PostStatus::new(PostState::Approved))
            .current_time(None)
            .log(LogEntry::new(now, Action::ContentApproval, LogStatus::Success, details))
    } else {
        info!("Content rejected, regenerating");
        let note = feedback.feedback.trim();
        consumed
            .status(PostStatus::new(PostState::Rejected))
            .content(None)
            .current_time(None)
            .last_feedback((!note.is_empty()).then(|| note.to_string()))
            .log(LogEntry::new(
                now,
                Action::ContentApproval,
                LogStatus::Failure,
                format!("Content rejected by human reviewer: {}", note),
            ))
    }
}
