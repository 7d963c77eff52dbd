use serde::Deserialize;
use tracing::{info, warn};

use herald_core::traits::{Clock, ContentGenerator, GenerationRequest};
use herald_core::types::{Action, Article, LogEntry, LogStatus, PostState, PostStatus};
use herald_core::{HeraldError, Result, StateUpdate, WorkflowState};

/// A parsed draft, before it is stamped into an `Article`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub body: String,
}

/// Generate content from the user's preferences.
///
/// Content that already exists is left alone; regeneration only happens
/// after a rejection (or reset) cleared it. A verdict pending from before the
/// new draft existed is dropped, so no draft is approved unseen.
pub async fn create_content(
    state: &WorkflowState,
    generator: &dyn ContentGenerator,
    clock: &dyn Clock,
) -> StateUpdate {
    if state.content.is_some() {
        return StateUpdate::none();
    }

    let Some(prefs) = state.preferences.as_ref() else {
        return StateUpdate::none().log(LogEntry::new(
            clock.now(),
            Action::ContentCreation,
            LogStatus::Failure,
            "No user preferences available for content creation",
        ));
    };

    let request = GenerationRequest {
        topics: prefs.topics.iter().cloned().collect(),
        tone: prefs.tone.clone(),
        feedback: state.last_feedback.clone(),
    };

    let result = generator
        .generate(request)
        .await
        .and_then(|text| parse_draft(&text));
    let now = clock.now();

    match result {
        Ok(draft) => {
            info!(generator = generator.name(), title = %draft.title, "Article generated");
            let details = format!("Generated article with title: {}", draft.title);
            StateUpdate::none()
                .content(Some(Article {
                    title: draft.title,
                    body: draft.body,
                    generated_at: now,
                }))
                .status(PostStatus::new(PostState::Pending))
                .current_time(None)
                .last_feedback(None)
                .human_feedback(None)
                .log(LogEntry::new(now, Action::ContentCreation, LogStatus::Success, details))
        }
        Err(e) => {
            warn!(generator = generator.name(), error = %e, "Article generation failed");
            let mut status = state.status.clone();
            status.error = Some(e.to_string());
            StateUpdate::none().status(status).log(LogEntry::new(
                now,
                Action::ContentCreation,
                LogStatus::Failure,
                format!("Failed to generate article: {}", e),
            ))
        }
    }
}

#[derive(Deserialize)]
struct JsonDraft {
    title: String,
    #[serde(alias = "body")]
    content: String,
}

/// Split model output into title and body.
///
/// Accepts a JSON object with `title` and `content`, optionally inside a
/// code fence. Otherwise the first line is the title (an optional `Title:`
/// label is stripped) and the rest is the body (an optional `Content:`
/// label is stripped).
pub fn parse_draft(text: &str) -> Result<Draft> {
    let text = text.trim();
    if text.is_empty() {
        return Err(HeraldError::Generation("empty response".into()));
    }

    let unfenced = strip_code_fence(text);
    if unfenced.starts_with('{') {
        if let Ok(json) = serde_json::from_str::<JsonDraft>(unfenced) {
            return finish(&json.title, &json.content);
        }
    }

    let (first, rest) = text
        .split_once('\n')
        .ok_or_else(|| HeraldError::Generation("response has no body".into()))?;

    let title = strip_label(first.trim(), "Title:");
    let body = strip_label(rest.trim(), "Content:");
    finish(title, body)
}

fn finish(title: &str, body: &str) -> Result<Draft> {
    let title = clean_title(title);
    let body = body.trim();

    if title.is_empty() {
        return Err(HeraldError::Generation("response has no title".into()));
    }
    if body.is_empty() {
        return Err(HeraldError::Generation("response has no body".into()));
    }

    Ok(Draft {
        title: title.to_string(),
        body: body.to_string(),
    })
}

fn strip_label<'a>(s: &'a str, label: &str) -> &'a str {
    s.strip_prefix(label).map(str::trim).unwrap_or(s)
}

/// Drop markdown heading and emphasis markers around a title.
fn clean_title(title: &str) -> &str {
    let title = title.trim().trim_start_matches('#').trim();
    let title = strip_label(title, "Title:");
    title.trim_matches('*').trim_matches('"').trim()
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the language tag line
    let rest = rest.split_once('\n').map(|(_, r)| r).unwrap_or("");
    rest.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::types::HumanFeedback;
    use herald_test_utils::{at, sample_article, sample_preferences, FixedClock, ScriptedGenerator};

    #[test]
    fn test_parse_labelled_draft() {
        let draft = parse_draft("Title: Rust at Work\n\nContent: Memory safety pays off.").unwrap();
        assert_eq!(draft.title, "Rust at Work");
        assert_eq!(draft.body, "Memory safety pays off.");
    }

    #[test]
    fn test_parse_unlabelled_draft() {
        let draft = parse_draft("Why AI Needs Editors\nParagraph one.\n\nParagraph two.").unwrap();
        assert_eq!(draft.title, "Why AI Needs Editors");
        assert_eq!(draft.body, "Paragraph one.\n\nParagraph two.");
    }

    #[test]
    fn test_parse_markdown_heading_title() {
        let draft = parse_draft("# **Lessons From Shipping**\nBody text").unwrap();
        assert_eq!(draft.title, "Lessons From Shipping");
    }

    #[test]
    fn test_parse_json_draft() {
        let draft = parse_draft(r#"{"title": "Async Rust", "content": "Futures are lazy. #rust"}"#).unwrap();
        assert_eq!(draft.title, "Async Rust");
        assert_eq!(draft.body, "Futures are lazy. #rust");
    }

    #[test]
    fn test_parse_fenced_json_draft() {
        let text = "```json\n{\"title\": \"Teams\", \"body\": \"Small is fast.\"}\n```";
        let draft = parse_draft(text).unwrap();
        assert_eq!(draft.title, "Teams");
        assert_eq!(draft.body, "Small is fast.");
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_draft("   "), Err(HeraldError::Generation(_))));
        assert!(matches!(parse_draft("Only a title"), Err(HeraldError::Generation(_))));
        assert!(matches!(parse_draft("Title:\nBody"), Err(HeraldError::Generation(_))));
        assert!(matches!(parse_draft("Title: T\nContent:   "), Err(HeraldError::Generation(_))));
    }

    #[tokio::test]
    async fn test_creates_pending_content() {
        let state = WorkflowState::with_preferences(sample_preferences());
        let generator = ScriptedGenerator::always("Title: Hello\nContent: World");
        let clock = FixedClock::new(at(8, 0));

        let update = create_content(&state, &generator, &clock).await;
        let article = update.content.clone().flatten().unwrap();
        assert_eq!(article.title, "Hello");
        assert_eq!(article.generated_at, at(8, 0));
        assert_eq!(update.status.as_ref().unwrap().status, PostState::Pending);
        assert_eq!(update.logs[0].status, LogStatus::Success);

        let requests = generator.requests();
        assert_eq!(requests[0].topics, vec!["AI".to_string()]);
        assert_eq!(requests[0].tone, "Professional");
        assert!(requests[0].feedback.is_none());
    }

    #[tokio::test]
    async fn test_existing_content_is_kept() {
        let mut state = WorkflowState::with_preferences(sample_preferences());
        state.content = Some(sample_article());
        let generator = ScriptedGenerator::always("Title: New\nContent: Draft");
        let clock = FixedClock::new(at(8, 0));

        assert!(create_content(&state, &generator, &clock).await.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_error_is_captured() {
        let state = WorkflowState::with_preferences(sample_preferences());
        let generator = ScriptedGenerator::failing("rate limited");
        let clock = FixedClock::new(at(8, 0));

        let update = create_content(&state, &generator, &clock).await;
        assert!(update.content.is_none());
        let status = update.status.unwrap();
        assert_eq!(status.status, PostState::Pending);
        assert!(status.error.unwrap().contains("rate limited"));
        assert_eq!(update.logs[0].status, LogStatus::Failure);
        assert!(update.logs[0].details.contains("rate limited"));
    }

    #[tokio::test]
    async fn test_unparseable_output_is_captured() {
        let state = WorkflowState::with_preferences(sample_preferences());
        let generator = ScriptedGenerator::always("single line");
        let clock = FixedClock::new(at(8, 0));

        let update = create_content(&state, &generator, &clock).await;
        assert!(update.content.is_none());
        assert_eq!(update.logs[0].status, LogStatus::Failure);
    }

    #[tokio::test]
    async fn test_missing_preferences_logs_failure() {
        let state = WorkflowState::new();
        let generator = ScriptedGenerator::always("Title: T\nB");
        let clock = FixedClock::new(at(8, 0));

        let update = create_content(&state, &generator, &clock).await;
        assert_eq!(update.logs.len(), 1);
        assert_eq!(update.logs[0].status, LogStatus::Failure);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_rejection_feedback_reaches_generator() {
        let mut state = WorkflowState::with_preferences(sample_preferences());
        state.last_feedback = Some("Shorter, please".into());
        let generator = ScriptedGenerator::always("Title: T\nBody");
        let clock = FixedClock::new(at(8, 0));

        let update = create_content(&state, &generator, &clock).await;
        assert_eq!(generator.requests()[0].feedback.as_deref(), Some("Shorter, please"));
        assert_eq!(update.last_feedback, Some(None));
    }

    #[tokio::test]
    async fn test_new_draft_drops_earlier_verdict() {
        let mut state = WorkflowState::with_preferences(sample_preferences());
        state.human_feedback = Some(HumanFeedback::approve("given before the draft"));
        let generator = ScriptedGenerator::always("Title: Fresh\nUnseen body");
        let clock = FixedClock::new(at(8, 0));

        state.apply(create_content(&state, &generator, &clock).await);
        assert_eq!(state.content.as_ref().unwrap().title, "Fresh");
        assert!(state.human_feedback.is_none());
        assert!(state.status.is(PostState::Pending));
    }
}
