use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HeraldError, Result};
use crate::types::Preferences;

/// Top-level Herald configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub linkedin: Option<LinkedInConfig>,
    /// Default preferences for unattended runs.
    #[serde(default)]
    pub preferences: Option<PreferencesConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Directory for the state database and log files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Hard cap on stages visited in a single run.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_steps: default_max_steps(),
        }
    }
}

fn default_data_dir() -> String { "~/.herald".to_string() }
fn default_max_steps() -> usize { 25 }

/// Time-gating and escalation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Unmatched checks tolerated before posting is forced.
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: u32,
    /// Allowed distance in minutes from the preferred posting time.
    #[serde(default = "default_tolerance_minutes")]
    pub tolerance_minutes: u32,
    /// Debug override: authorize posting immediately.
    #[serde(default)]
    pub force_post: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: default_escalation_threshold(),
            tolerance_minutes: default_tolerance_minutes(),
            force_post: false,
        }
    }
}

fn default_escalation_threshold() -> u32 { 3 }
fn default_tolerance_minutes() -> u32 { 5 }

/// Background scheduler loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between ticks in interval mode. Default: 60.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Fire once a day at this "HH:MM" instead of on an interval.
    #[serde(default)]
    pub daily_at: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            daily_at: None,
        }
    }
}

fn default_interval_secs() -> u64 { 60 }

/// Content generation model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_model_timeout(),
        }
    }
}

impl ModelConfig {
    /// The API key, unless it is missing or an unexpanded `${VAR}`.
    pub fn resolved_api_key(&self) -> Option<&str> {
        resolved(&self.api_key)
    }
}

fn default_provider() -> String { "groq".to_string() }
fn default_model_id() -> String { "llama-3.3-70b-versatile".to_string() }
fn default_max_tokens() -> u32 { 1024 }
fn default_temperature() -> f32 { 0.7 }
fn default_model_timeout() -> u64 { 60 }

/// LinkedIn publishing credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    pub access_token: String,
    /// Author URN (e.g. "urn:li:person:abc"). Looked up when absent.
    #[serde(default)]
    pub author_urn: Option<String>,
    #[serde(default = "default_linkedin_api_base")]
    pub api_base: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default = "default_linkedin_timeout")]
    pub timeout_secs: u64,
}

impl LinkedInConfig {
    /// The access token, unless it is empty or an unexpanded `${VAR}`.
    pub fn resolved_token(&self) -> Option<&str> {
        let token = self.access_token.trim();
        if token.is_empty() || token.starts_with("${") {
            None
        } else {
            Some(token)
        }
    }
}

fn default_linkedin_api_base() -> String { "https://api.linkedin.com".to_string() }
fn default_visibility() -> String { "PUBLIC".to_string() }
fn default_linkedin_timeout() -> u64 { 30 }

/// Preferences as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesConfig {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_posting_time")]
    pub posting_time: String,
}

impl PreferencesConfig {
    pub fn to_preferences(&self) -> Result<Preferences> {
        Preferences::new(self.topics.clone(), self.tone.clone(), self.posting_time.clone())
    }
}

fn default_tone() -> String { "Professional".to_string() }
fn default_posting_time() -> String { "09:00".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| HeraldError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| HeraldError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(HeraldError::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Reject combinations the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.scheduling.escalation_threshold == 0 {
            return Err(HeraldError::Config(
                "scheduling.escalation_threshold must be at least 1".into(),
            ));
        }
        // input, creation, approval, creation, approval, N+1 scheduling checks, posting, logging
        let needed = self.scheduling.escalation_threshold as usize + 8;
        if self.workflow.max_steps < needed {
            return Err(HeraldError::Config(format!(
                "workflow.max_steps ({}) must be at least {} for escalation_threshold {}",
                self.workflow.max_steps, needed, self.scheduling.escalation_threshold
            )));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(HeraldError::Config("scheduler.interval_secs must be positive".into()));
        }
        Ok(())
    }

    /// Resolve the data directory (expand ~).
    pub fn data_dir(&self) -> PathBuf {
        let dir = &self.workflow.data_dir;
        if let Some(rest) = dir.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(dir)
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir().join("state.db")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

fn resolved(value: &Option<String>) -> Option<&str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() && !v.starts_with("${") => Some(v),
        _ => None,
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
