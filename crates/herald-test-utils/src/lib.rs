//! Fakes and fixtures shared by Herald tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Local, TimeZone};
use futures::future::BoxFuture;

use herald_core::traits::{Clock, ContentGenerator, GenerationRequest, Publisher};
use herald_core::types::{Article, Preferences};
use herald_core::{HeraldError, Result};

/// A local timestamp on a fixed weekday, 2026-03-02.
pub fn at(hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 3, 2, hour, minute, 0)
        .single()
        .expect("unambiguous local time")
}

/// Topics `["AI"]`, tone "Professional", posting at 09:00.
pub fn sample_preferences() -> Preferences {
    Preferences::new(["AI"], "Professional", "09:00").expect("valid preferences")
}

pub fn sample_article() -> Article {
    Article {
        title: "What AI Changes for Engineering Teams".into(),
        body: "Three things we learned shipping with AI assistants.\n\n#AI #Engineering".into(),
        generated_at: at(8, 30),
    }
}

enum Reply {
    Text(String),
    Fail(String),
}

/// A content generator that replays scripted replies.
///
/// The last reply repeats once the script runs out.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn from_replies(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always return `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self::from_replies(vec![Reply::Text(text.into())])
    }

    /// Always fail with a generation error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::from_replies(vec![Reply::Fail(message.into())])
    }

    /// Return each reply in turn; `Err` entries become generation errors.
    pub fn sequence<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<S, S>>,
        S: Into<String>,
    {
        Self::from_replies(
            replies
                .into_iter()
                .map(|r| match r {
                    Ok(text) => Reply::Text(text.into()),
                    Err(msg) => Reply::Fail(msg.into()),
                })
                .collect(),
        )
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_reply(&self) -> Result<String> {
        let mut replies = self.replies.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = replies.pop_front() {
            *last = Some(reply);
        }
        match last.as_ref() {
            Some(Reply::Text(text)) => Ok(text.clone()),
            Some(Reply::Fail(msg)) => Err(HeraldError::Generation(msg.clone())),
            None => Err(HeraldError::Generation("no scripted reply".into())),
        }
    }
}

impl ContentGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        self.requests.lock().unwrap().push(request);
        let reply = self.next_reply();
        Box::pin(async move { reply })
    }
}

/// A publisher that records posts and returns feed URLs.
pub struct ScriptedPublisher {
    failure: Option<String>,
    attempts: AtomicUsize,
    published: Mutex<Vec<(String, String)>>,
}

impl ScriptedPublisher {
    pub fn succeeding() -> Self {
        Self {
            failure: None,
            attempts: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(cause: impl Into<String>) -> Self {
        Self {
            failure: Some(cause.into()),
            ..Self::succeeding()
        }
    }

    /// Successful posts as `(title, body)`.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    /// Every publish call, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Publisher for ScriptedPublisher {
    fn name(&self) -> &str {
        "scripted"
    }

    fn publish(&self, title: String, body: String) -> BoxFuture<'_, Result<String>> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let result = match &self.failure {
            Some(cause) => Err(HeraldError::Publish(cause.clone())),
            None => {
                self.published.lock().unwrap().push((title, body));
                Ok(format!(
                    "https://www.linkedin.com/feed/update/urn:li:share:{}/",
                    7000 + n
                ))
            }
        };
        Box::pin(async move { result })
    }
}

/// A clock that only moves when told to.
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}
