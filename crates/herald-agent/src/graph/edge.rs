//! Branch predicates. Each is a pure function of the state.

use herald_core::types::PostState;
use herald_core::WorkflowState;

use super::stage::Stage;

/// After input collection: halt the run when there is nothing to work with.
pub fn after_input(state: &WorkflowState) -> Stage {
    if state.preferences.is_some() {
        Stage::ContentCreation
    } else {
        Stage::Logging
    }
}

/// After human approval: a fresh rejection loops back for regeneration.
///
/// A rejection whose regeneration already failed (error recorded) goes on to
/// scheduling, which is a no-op for non-approved content.
pub fn after_approval(state: &WorkflowState) -> Stage {
    if state.status.is(PostState::Rejected) && state.status.error.is_none() {
        Stage::ContentCreation
    } else {
        Stage::Scheduling
    }
}

/// After scheduling: keep checking while approved content awaits authorization.
///
/// `current_time` is the only authorization signal. Anything not approved
/// falls through to posting, whose guard makes it a no-op.
pub fn after_scheduling(state: &WorkflowState) -> Stage {
    if state.status.is(PostState::Approved) && state.current_time.is_none() {
        Stage::Scheduling
    } else {
        Stage::Posting
    }
}

/// The stage that follows `stage`, or `None` after logging.
pub fn next_stage(stage: Stage, state: &WorkflowState) -> Option<Stage> {
    match stage {
        Stage::InputCollection => Some(after_input(state)),
        Stage::ContentCreation => Some(Stage::ContentApproval),
        Stage::ContentApproval => Some(after_approval(state)),
        Stage::Scheduling => Some(after_scheduling(state)),
        Stage::Posting => Some(Stage::Logging),
        Stage::Logging => None,
    }
}
