use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::types::{
    Action, Article, HumanFeedback, LogEntry, PostState, PostStatus, Preferences,
};

/// Layout version of the persisted state record.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Canonical snapshot of one workflow.
///
/// Stages never mutate this directly: they return a [`StateUpdate`] which the
/// engine merges with [`WorkflowState::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Bumped each time a merge changes a non-log field.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub preferences: Option<Preferences>,
    #[serde(default)]
    pub content: Option<Article>,
    #[serde(default)]
    pub status: PostStatus,
    /// Append-only. Only an operator clears it.
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub scheduler_attempts: u32,
    #[serde(default)]
    pub human_feedback: Option<HumanFeedback>,
    /// Feedback from the most recent rejection, handed to the next generation.
    #[serde(default)]
    pub last_feedback: Option<String>,
    /// Set by scheduling once a post is authorized.
    #[serde(default)]
    pub current_time: Option<DateTime<Local>>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            revision: 0,
            preferences: None,
            content: None,
            status: PostStatus::default(),
            logs: Vec::new(),
            scheduler_attempts: 0,
            human_feedback: None,
            last_feedback: None,
            current_time: None,
        }
    }
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preferences(preferences: Preferences) -> Self {
        Self {
            preferences: Some(preferences),
            ..Self::default()
        }
    }

    /// Merge a partial update. Returns true when any non-log field changed.
    pub fn apply(&mut self, update: StateUpdate) -> bool {
        let mut changed = false;

        changed |= merge(&mut self.content, update.content);
        changed |= merge(&mut self.status, update.status);
        changed |= merge(&mut self.scheduler_attempts, update.scheduler_attempts);
        changed |= merge(&mut self.human_feedback, update.human_feedback);
        changed |= merge(&mut self.last_feedback, update.last_feedback);
        changed |= merge(&mut self.current_time, update.current_time);

        self.logs.extend(update.logs);

        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Whether posting may run: approved, authorized, and with content.
    pub fn can_post(&self) -> bool {
        self.status.is(PostState::Approved) && self.current_time.is_some() && self.content.is_some()
    }

    /// Most recent log entry for an action.
    pub fn latest_log(&self, action: Action) -> Option<&LogEntry> {
        self.logs.iter().rev().find(|e| e.action == action)
    }

    /// Start a new posting cycle. Preferences and logs are kept.
    pub fn reset_cycle(&mut self) {
        self.content = None;
        self.status = PostStatus::default();
        self.scheduler_attempts = 0;
        self.human_feedback = None;
        self.last_feedback = None;
        self.current_time = None;
        self.revision += 1;
    }
}

fn merge<T: PartialEq>(field: &mut T, slot: Option<T>) -> bool {
    match slot {
        Some(value) if *field != value => {
            *field = value;
            true
        }
        _ => false,
    }
}

/// A partial update returned by a stage.
///
/// For nullable fields the outer `Option` says whether the stage touches the
/// field at all; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub content: Option<Option<Article>>,
    pub status: Option<PostStatus>,
    pub scheduler_attempts: Option<u32>,
    pub human_feedback: Option<Option<HumanFeedback>>,
    pub last_feedback: Option<Option<String>>,
    pub current_time: Option<Option<DateTime<Local>>>,
    pub logs: Vec<LogEntry>,
}

impl StateUpdate {
    /// An update that changes nothing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn log(mut self, entry: LogEntry) -> Self {
        self.logs.push(entry);
        self
    }

    pub fn content(mut self, content: Option<Article>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn scheduler_attempts(mut self, attempts: u32) -> Self {
        self.scheduler_attempts = Some(attempts);
        self
    }

    pub fn human_feedback(mut self, feedback: Option<HumanFeedback>) -> Self {
        self.human_feedback = Some(feedback);
        self
    }

    pub fn last_feedback(mut self, feedback: Option<String>) -> Self {
        self.last_feedback = Some(feedback);
        self
    }

    pub fn current_time(mut self, time: Option<DateTime<Local>>) -> Self {
        self.current_time = Some(time);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogStatus;
    use chrono::TimeZone;

    fn ts() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn article() -> Article {
        Article {
            title: "T".into(),
            body: "B".into(),
            generated_at: ts(),
        }
    }

    #[test]
    fn empty_update_changes_nothing() {
        let mut state = WorkflowState::new();
        assert!(StateUpdate::none().is_empty());
        assert!(!state.apply(StateUpdate::none()));
        assert_eq!(state.revision, 0);
    }

    #[test]
    fn log_only_update_does_not_bump_revision() {
        let mut state = WorkflowState::new();
        let update = StateUpdate::none().log(LogEntry::new(
            ts(),
            Action::InputCollection,
            LogStatus::Failure,
            "no preferences",
        ));
        assert!(!state.apply(update));
        assert_eq!(state.revision, 0);
        assert_eq!(state.logs.len(), 1);
    }

    #[test]
    fn clearing_a_field_counts_as_change() {
        let mut state = WorkflowState::new();
        state.content = Some(article());

        assert!(state.apply(StateUpdate::none().content(None)));
        assert!(state.content.is_none());
        assert_eq!(state.revision, 1);

        // Clearing again is not a change
        assert!(!state.apply(StateUpdate::none().content(None)));
        assert_eq!(state.revision, 1);
    }

    #[test]
    fn untouched_fields_survive_merge() {
        let mut state = WorkflowState::new();
        state.content = Some(article());
        state.scheduler_attempts = 2;

        state.apply(StateUpdate::none().status(PostStatus::new(PostState::Approved)));
        assert!(state.content.is_some());
        assert_eq!(state.scheduler_attempts, 2);
        assert!(state.status.is(PostState::Approved));
    }

    #[test]
    fn can_post_requires_all_three() {
        let mut state = WorkflowState::new();
        state.status = PostStatus::new(PostState::Approved);
        assert!(!state.can_post());
        state.current_time = Some(ts());
        assert!(!state.can_post());
        state.content = Some(article());
        assert!(state.can_post());
        state.status = PostStatus::new(PostState::Pending);
        assert!(!state.can_post());
    }

    #[test]
    fn latest_log_finds_most_recent() {
        let mut state = WorkflowState::new();
        state.logs.push(LogEntry::new(ts(), Action::Scheduling, LogStatus::Waiting, "1"));
        state.logs.push(LogEntry::new(ts(), Action::Scheduling, LogStatus::Forced, "2"));
        state.logs.push(LogEntry::new(ts(), Action::Posting, LogStatus::Success, "3"));

        assert_eq!(state.latest_log(Action::Scheduling).unwrap().status, LogStatus::Forced);
        assert!(state.latest_log(Action::ContentApproval).is_none());
    }

    #[test]
    fn reset_cycle_keeps_preferences_and_logs() {
        let prefs = Preferences::new(["AI"], "Professional", "09:00").unwrap();
        let mut state = WorkflowState::with_preferences(prefs.clone());
        state.content = Some(article());
        state.status = PostStatus::posted("https://example.com/p/1", ts());
        state.logs.push(LogEntry::new(ts(), Action::Posting, LogStatus::Success, "ok"));

        state.reset_cycle();
        assert_eq!(state.preferences, Some(prefs));
        assert!(state.content.is_none());
        assert!(state.status.is(PostState::Pending));
        assert_eq!(state.logs.len(), 1);
    }

    #[test]
    fn deserializes_older_record_with_defaults() {
        let json = r#"{"preferences": null, "logs": []}"#;
        let state: WorkflowState = serde_json::from_str(json).unwrap();
        assert_eq!(state.schema_version, SCHEMA_VERSION);
        assert!(state.status.is(PostState::Pending));
        assert_eq!(state.scheduler_attempts, 0);
    }
}
