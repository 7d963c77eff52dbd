use chrono::{DateTime, Local};
use futures::future::BoxFuture;

use crate::error::Result;

/// Input for a content generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub topics: Vec<String>,
    pub tone: String,
    /// Reviewer feedback from the previous rejected draft, if any.
    pub feedback: Option<String>,
}

/// Content generation collaborator (an LLM behind an HTTP API).
pub trait ContentGenerator: Send + Sync + 'static {
    /// Generator name, for diagnostics.
    fn name(&self) -> &str;

    /// Produce a raw draft: a title line followed by the body, or a JSON
    /// object with `title` and `content`. Fails with `HeraldError::Generation`.
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>>;
}

/// Publishing collaborator (the professional network's REST API).
pub trait Publisher: Send + Sync + 'static {
    /// Publisher name, for diagnostics.
    fn name(&self) -> &str;

    /// Publish a post and return its public URL. Fails with `HeraldError::Publish`.
    fn publish(&self, title: String, body: String) -> BoxFuture<'_, Result<String>>;
}

/// Wall clock, injectable for tests.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Local>;
}

/// The local system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
