use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "HealthSoft Triage";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default `RUST_LOG`-style filter when the environment does not set one.
pub fn default_log_filter() -> &'static str {
    "healthsoft_triage=info,warn"
}

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "jayasimma/healthsoft";
const DEFAULT_CHAT_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_CHAT_MODEL: &str = "llama-3.1-8b-instant";

/// A wider window lets unrelated negations suppress real red flags.
const MAX_NEGATION_WINDOW: usize = 200;
/// Shortest complaint limit that still fits a one-line symptom description.
const MIN_COMPLAINT_LENGTH: usize = 20;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} out of range: {reason}")]
    OutOfRange { key: &'static str, reason: String },
}

/// Which generation provider backs the model gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Local Ollama instance, `/api/generate`.
    Ollama,
    /// Hosted OpenAI-compatible `/chat/completions` endpoint (e.g. Groq).
    ChatCompletions,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::ChatCompletions => "chat_completions",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::Ollama => DEFAULT_OLLAMA_URL,
            Self::ChatCompletions => DEFAULT_CHAT_URL,
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::Ollama => DEFAULT_OLLAMA_MODEL,
            Self::ChatCompletions => DEFAULT_CHAT_MODEL,
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "chat_completions" | "openai" | "groq" => Ok(Self::ChatCompletions),
            _ => Err(ConfigError::InvalidValue {
                key: "TRIAGE_PROVIDER",
                value: s.to_string(),
            }),
        }
    }
}

/// Tunables for the triage engine.
///
/// Question count and layer cap are configuration rather than constants:
/// earlier revisions of the product shipped 3 to 5 questions per layer and a
/// cap of 2 or 3 layers. Defaults follow the latest revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Model attempts per turn before the conservative fallback is used.
    pub max_attempts: usize,
    /// Hard cap on question layers per session.
    pub max_layers: usize,
    /// Follow-up questions requested from the model per layer.
    pub questions_per_layer: usize,
    /// Characters before a red-flag keyword scanned for negations.
    pub negation_window: usize,
    /// Upper bound on a single generation call, in seconds.
    pub generation_timeout_secs: u64,
    /// Complaints and notes longer than this are truncated at a word boundary.
    pub max_complaint_length: usize,
    /// Sessions untouched for this long are evicted from the service registry.
    pub session_ttl_secs: u64,
    /// Registry capacity; the least recently used session is evicted beyond it.
    pub max_sessions: usize,
    pub provider: ProviderKind,
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    pub temperature: f32,
}

impl Default for TriageConfig {
    fn default() -> Self {
        let provider = ProviderKind::Ollama;
        Self {
            max_attempts: 2,
            max_layers: 3,
            questions_per_layer: 4,
            negation_window: 30,
            generation_timeout_secs: 120,
            max_complaint_length: 2_000,
            session_ttl_secs: 1_800,
            max_sessions: 1_024,
            provider,
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
            api_key: None,
            temperature: 0.1,
        }
    }
}

impl TriageConfig {
    /// Read configuration from `TRIAGE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (environment, file, test map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("TRIAGE_PROVIDER") {
            config.provider = raw.parse()?;
        }

        // OLLAMA_URL / GROQ_API_KEY are honoured for compatibility with older deployments.
        let legacy_url = match config.provider {
            ProviderKind::Ollama => lookup("OLLAMA_URL"),
            ProviderKind::ChatCompletions => None,
        };
        config.base_url = lookup("TRIAGE_BASE_URL")
            .or(legacy_url)
            .unwrap_or_else(|| config.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();
        config.model = lookup("TRIAGE_MODEL")
            .unwrap_or_else(|| config.provider.default_model().to_string());
        config.api_key = lookup("TRIAGE_API_KEY").or_else(|| lookup("GROQ_API_KEY"));

        if let Some(raw) = lookup("TRIAGE_MAX_ATTEMPTS") {
            config.max_attempts = parse_number("TRIAGE_MAX_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = lookup("TRIAGE_MAX_LAYERS") {
            config.max_layers = parse_number("TRIAGE_MAX_LAYERS", &raw)?;
        }
        if let Some(raw) = lookup("TRIAGE_QUESTIONS_PER_LAYER") {
            config.questions_per_layer = parse_number("TRIAGE_QUESTIONS_PER_LAYER", &raw)?;
        }
        if let Some(raw) = lookup("TRIAGE_NEGATION_WINDOW") {
            config.negation_window = parse_number("TRIAGE_NEGATION_WINDOW", &raw)?;
        }
        if let Some(raw) = lookup("TRIAGE_TIMEOUT_SECS") {
            config.generation_timeout_secs = parse_number("TRIAGE_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("TRIAGE_MAX_COMPLAINT_LENGTH") {
            config.max_complaint_length = parse_number("TRIAGE_MAX_COMPLAINT_LENGTH", &raw)?;
        }
        if let Some(raw) = lookup("TRIAGE_SESSION_TTL_SECS") {
            config.session_ttl_secs = parse_number("TRIAGE_SESSION_TTL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("TRIAGE_MAX_SESSIONS") {
            config.max_sessions = parse_number("TRIAGE_MAX_SESSIONS", &raw)?;
        }
        if let Some(raw) = lookup("TRIAGE_TEMPERATURE") {
            config.temperature = parse_number("TRIAGE_TEMPERATURE", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                key: "max_attempts",
                reason: "at least one attempt is required".into(),
            });
        }
        if self.max_layers == 0 {
            return Err(ConfigError::OutOfRange {
                key: "max_layers",
                reason: "at least one question layer is required".into(),
            });
        }
        if self.questions_per_layer == 0 {
            return Err(ConfigError::OutOfRange {
                key: "questions_per_layer",
                reason: "at least one question per layer is required".into(),
            });
        }
        if self.generation_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                key: "generation_timeout_secs",
                reason: "a generation timeout must be imposed".into(),
            });
        }
        if self.negation_window > MAX_NEGATION_WINDOW {
            return Err(ConfigError::OutOfRange {
                key: "negation_window",
                reason: format!("{} exceeds {MAX_NEGATION_WINDOW}", self.negation_window),
            });
        }
        if self.max_complaint_length < MIN_COMPLAINT_LENGTH {
            return Err(ConfigError::OutOfRange {
                key: "max_complaint_length",
                reason: format!("must allow at least {MIN_COMPLAINT_LENGTH} characters"),
            });
        }
        if self.session_ttl_secs == 0 {
            return Err(ConfigError::OutOfRange {
                key: "session_ttl_secs",
                reason: "sessions must live long enough to be answered".into(),
            });
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::OutOfRange {
                key: "max_sessions",
                reason: "at least one session must fit in the registry".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::OutOfRange {
                key: "temperature",
                reason: format!("{} is outside 0.0..=2.0", self.temperature),
            });
        }
        Ok(())
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
