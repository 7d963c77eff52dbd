use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use herald_core::config::ModelConfig;
use herald_core::traits::{ContentGenerator, GenerationRequest};
use herald_core::error::excerpt;
use herald_core::{HeraldError, Result};

use super::presets::{all_preset_names, get_preset};

const SYSTEM_PROMPT: &str = "You write articles for a professional networking site. \
Each article has a catchy title, clear sections, practical insight or advice, \
and a short line of relevant hashtags at the end. \
Reply with a single JSON object of the form \
{\"title\": \"...\", \"content\": \"...\"} and nothing else.";

/// Content generator for OpenAI-compatible chat completion APIs (OpenAI,
/// Groq, Ollama, OpenRouter, ...). Requests are non-streaming.
pub struct OpenAiGenerator {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGenerator {
    /// Build a generator from config, resolving the endpoint from the
    /// provider preset. Fails when the provider needs a key and none is set.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let preset = get_preset(&config.provider);
        let endpoint = match (&config.base_url, &preset) {
            (Some(url), _) => url.clone(),
            (None, Some(p)) => p.default_base_url.to_string(),
            (None, None) => {
                return Err(HeraldError::Config(format!(
                    "Unknown model provider '{}' (known: {}); set model.base_url for a custom endpoint",
                    config.provider,
                    all_preset_names().join(", ")
                )))
            }
        };

        let api_key = config.resolved_api_key().map(str::to_string);
        let needs_key = preset.as_ref().map(|p| p.needs_api_key).unwrap_or(false);
        if needs_key && api_key.is_none() {
            return Err(HeraldError::Config(format!(
                "model.api_key is required for provider '{}'",
                config.provider
            )));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HeraldError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            api_key,
            model: config.model_id.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn complete(&self, request: GenerationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: build_messages(&request),
            max_tokens: self.max_tokens,
            temperature: (self.temperature > 0.0).then_some(self.temperature),
            stream: false,
        };

        let mut req = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        debug!(model = %self.model, topics = request.topics.len(), "Requesting article");

        let response = req
            .send()
            .await
            .map_err(|e| HeraldError::Generation(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HeraldError::Generation(e.to_string()))?;

        if !status.is_success() {
            return Err(HeraldError::Generation(format!(
                "HTTP {}: {}",
                status,
                excerpt(&text)
            )));
        }

        extract_content(&text)
    }
}

impl ContentGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(self.complete(request))
    }
}

fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let mut user = format!(
        "Write an article on the following topics: {}.\nTone: {}.",
        request.topics.join(", "),
        request.tone
    );
    if let Some(feedback) = request.feedback.as_deref().filter(|f| !f.trim().is_empty()) {
        user.push_str(&format!(
            "\nA reviewer rejected the previous draft with this feedback: {}\nAddress it in the new draft.",
            feedback.trim()
        ));
    }

    vec![
        ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: "user",
            content: user,
        },
    ]
}

fn extract_content(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| HeraldError::Generation(format!("Malformed completion response: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| HeraldError::Generation("Completion contained no text".into()))
}
