use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{HeraldError, Result};

/// What the user wants posted, and when.
///
/// Deserialization goes through [`Preferences::new`], so a stored record
/// with no topics is rejected on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPreferences")]
pub struct Preferences {
    /// Never empty.
    pub topics: BTreeSet<String>,
    pub tone: String,
    /// Preferred posting time, "HH:MM" on a 24-hour clock.
    pub posting_time: String,
}

impl Preferences {
    /// Build validated preferences. Blank topics are dropped; at least one must remain.
    pub fn new<I, S>(topics: I, tone: impl Into<String>, posting_time: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics: BTreeSet<String> = topics
            .into_iter()
            .map(|t| t.into().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if topics.is_empty() {
            return Err(HeraldError::InvalidPreferences(
                "at least one topic is required".into(),
            ));
        }

        let tone = tone.into().trim().to_string();
        if tone.is_empty() {
            return Err(HeraldError::InvalidPreferences("tone must not be empty".into()));
        }

        Ok(Self {
            topics,
            tone,
            posting_time: posting_time.into().trim().to_string(),
        })
    }

    /// Topics joined for prompts and display.
    pub fn topics_display(&self) -> String {
        self.topics.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

#[derive(Deserialize)]
struct RawPreferences {
    topics: Vec<String>,
    tone: String,
    posting_time: String,
}

impl TryFrom<RawPreferences> for Preferences {
    type Error = HeraldError;

    fn try_from(raw: RawPreferences) -> Result<Self> {
        Preferences::new(raw.topics, raw.tone, raw.posting_time)
    }
}

/// A generated post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub body: String,
    pub generated_at: DateTime<Local>,
}

impl Article {
    /// Render for terminal display.
    pub fn render_markdown(&self) -> String {
        format!(
            "# {}\n\n{}\n\n*Generated at: {}*",
            self.title,
            self.body,
            self.generated_at.format("%Y-%m-%d %H:%M")
        )
    }
}

/// Lifecycle of the current post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostState {
    #[default]
    Pending,
    Approved,
    Rejected,
    Posted,
    Failed,
}

impl PostState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostState::Pending => "pending",
            PostState::Approved => "approved",
            PostState::Rejected => "rejected",
            PostState::Posted => "posted",
            PostState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PostState::Posted | PostState::Failed)
    }
}

impl fmt::Display for PostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostStatus {
    pub status: PostState,
    #[serde(default)]
    pub post_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub posted_at: Option<DateTime<Local>>,
}

impl PostStatus {
    /// A clean status record in the given state.
    pub fn new(status: PostState) -> Self {
        Self {
            status,
            post_url: None,
            error: None,
            posted_at: None,
        }
    }

    pub fn posted(url: impl Into<String>, at: DateTime<Local>) -> Self {
        Self {
            status: PostState::Posted,
            post_url: Some(url.into()),
            error: None,
            posted_at: Some(at),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: PostState::Failed,
            post_url: None,
            error: Some(error.into()),
            posted_at: None,
        }
    }

    pub fn is(&self, state: PostState) -> bool {
        self.status == state
    }
}

/// A reviewer's verdict, supplied before a run and consumed by Human Approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanFeedback {
    pub approved: bool,
    #[serde(default)]
    pub feedback: String,
}

impl HumanFeedback {
    pub fn approve(feedback: impl Into<String>) -> Self {
        Self {
            approved: true,
            feedback: feedback.into(),
        }
    }

    pub fn reject(feedback: impl Into<String>) -> Self {
        Self {
            approved: false,
            feedback: feedback.into(),
        }
    }
}

/// The stage that produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    InputCollection,
    ContentCreation,
    ContentApproval,
    Scheduling,
    Posting,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::InputCollection => "input_collection",
            Action::ContentCreation => "content_creation",
            Action::ContentApproval => "content_approval",
            Action::Scheduling => "scheduling",
            Action::Posting => "posting",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failure,
    Waiting,
    Forced,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Failure => "failure",
            LogStatus::Waiting => "waiting",
            LogStatus::Forced => "forced",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the workflow log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub action: Action,
    pub status: LogStatus,
    pub details: String,
}

impl LogEntry {
    pub fn new(
        timestamp: DateTime<Local>,
        action: Action,
        status: LogStatus,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            action,
            status,
            details: details.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.action,
            self.status,
            self.details
        )
    }
}
