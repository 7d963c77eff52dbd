use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use herald_core::config::LinkedInConfig;
use herald_core::traits::Publisher;
use herald_core::error::excerpt;
use herald_core::{HeraldError, Result};

use crate::util::compose_commentary;

/// LinkedIn caps share commentary at 3000 characters.
const MAX_COMMENTARY_CHARS: usize = 3000;

/// Publishes member shares through the LinkedIn UGC Posts API.
pub struct LinkedInPublisher {
    http: Client,
    token: String,
    api_base: String,
    visibility: String,
    author: OnceCell<String>,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
}

impl LinkedInPublisher {
    /// Build a publisher. Fails when no usable access token is configured.
    pub fn new(config: &LinkedInConfig) -> Result<Self> {
        let token = config.resolved_token().ok_or_else(|| {
            HeraldError::Config("linkedin.access_token is required for publishing".into())
        })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HeraldError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let author = OnceCell::new_with(
            config
                .author_urn
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
        );

        Ok(Self {
            http,
            token: token.to_string(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            visibility: config.visibility.clone(),
            author,
        })
    }

    /// The author URN, looked up from the userinfo endpoint on first use.
    async fn author(&self) -> Result<&str> {
        let urn = self
            .author
            .get_or_try_init(|| async {
                let url = format!("{}/v2/userinfo", self.api_base);
                let resp = self
                    .http
                    .get(&url)
                    .bearer_auth(&self.token)
                    .send()
                    .await
                    .map_err(|e| HeraldError::Publish(format!("Profile lookup failed: {}", e)))?;

                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(HeraldError::Publish(format!(
                        "Profile lookup returned HTTP {}: {}",
                        status,
                        excerpt(&body)
                    )));
                }

                let info: UserInfo = resp
                    .json()
                    .await
                    .map_err(|e| HeraldError::Publish(format!("Malformed profile response: {}", e)))?;
                let urn = format!("urn:li:person:{}", info.sub);
                debug!(author = %urn, "Resolved LinkedIn author");
                Ok(urn)
            })
            .await?;
        Ok(urn.as_str())
    }

    async fn share(&self, title: String, body: String) -> Result<String> {
        let author = self.author().await?;
        let commentary = compose_commentary(&title, &body, MAX_COMMENTARY_CHARS);
        let payload = share_payload(author, &commentary, &self.visibility);

        let url = format!("{}/v2/ugcPosts", self.api_base);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&payload)
            .send()
            .await
            .map_err(|e| HeraldError::Publish(e.to_string()))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(HeraldError::Publish(format!("HTTP {}: {}", status, excerpt(&text))));
        }

        let id = share_id(&headers, &text)
            .ok_or_else(|| HeraldError::Publish("Response did not include a share id".into()))?;
        let post_url = feed_url(&id);
        info!(id = %id, "LinkedIn share created");
        Ok(post_url)
    }
}

impl Publisher for LinkedInPublisher {
    fn name(&self) -> &str {
        "linkedin"
    }

    fn publish(&self, title: String, body: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(self.share(title, body))
    }
}

fn share_payload(author: &str, commentary: &str, visibility: &str) -> Value {
    json!({
        "author": author,
        "lifecycleState": "PUBLISHED",
        "specificContent": {
            "com.linkedin.ugc.ShareContent": {
                "shareCommentary": { "text": commentary },
                "shareMediaCategory": "NONE"
            }
        },
        "visibility": {
            "com.linkedin.ugc.MemberNetworkVisibility": visibility
        }
    })
}

/// The share id, from the `x-restli-id` header or the response body.
fn share_id(headers: &HeaderMap, body: &str) -> Option<String> {
    if let Some(id) = headers
        .get("x-restli-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(id.to_string());
    }

    serde_json::from_str::<Value>(body)
        .ok()?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

fn feed_url(id: &str) -> String {
    format!("https://www.linkedin.com/feed/update/{}/", id)
}
