use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeraldError {
    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("No posting preferences set")]
    MissingPreferences,

    #[error("Invalid preferences: {0}")]
    InvalidPreferences(String),

    #[error("No draft to review")]
    NoDraftToReview,

    // Collaborator errors (recoverable, captured in the state record)
    #[error("Content generation failed: {0}")]
    Generation(String),

    #[error("Publishing failed: {0}")]
    Publish(String),

    // Engine errors
    #[error("Engine exceeded {limit} steps (trail: {trail})")]
    EngineRecursionExceeded { limit: usize, trail: String },

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HeraldError {
    /// Fatal errors indicate an engine bug and must stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HeraldError::EngineRecursionExceeded { .. })
    }
}

pub type Result<T> = std::result::Result<T, HeraldError>;

/// Shorten a remote response body for an error message.
pub fn excerpt(text: &str) -> String {
    const MAX: usize = 200;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
