use tracing::{error, info};

use herald_core::traits::{Clock, Publisher};
use herald_core::types::{Action, LogEntry, LogStatus, PostStatus};
use herald_core::{HeraldError, StateUpdate, WorkflowState};

/// Publish approved, authorized content.
///
/// A no-op unless the state allows posting. Publishing failures move the
/// post to `failed`; retrying is left to the caller.
pub async fn post(state: &WorkflowState, publisher: &dyn Publisher, clock: &dyn Clock) -> StateUpdate {
    if !state.can_post() {
        return StateUpdate::none();
    }
    let Some(article) = state.content.as_ref() else {
        return StateUpdate::none();
    };

    let result = publisher
        .publish(article.title.clone(), article.body.clone())
        .await;
    let now = clock.now();

    match result {
        Ok(url) => {
            info!(publisher = publisher.name(), url = %url, "Article posted");
            let details = format!("Posted article: {}", url);
            StateUpdate::none()
                .status(PostStatus::posted(url, now))
                .log(LogEntry::new(now, Action::Posting, LogStatus::Success, details))
        }
        Err(e) => {
            error!(publisher = publisher.name(), error = %e, "Posting failed");
            let cause = match e {
                HeraldError::Publish(cause) => cause,
                other => other.to_string(),
            };
            StateUpdate::none()
                .status(PostStatus::failed(cause.clone()))
                .log(LogEntry::new(
                    now,
                    Action::Posting,
                    LogStatus::Failure,
                    format!("Failed to post article: {}", cause),
                ))
        }
    }
}
