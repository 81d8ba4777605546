//! Boundary to the external text-generation provider.
//!
//! Gateways only move text; they never retry. Retry and validity decisions
//! belong to the turn controller, which alone knows whether the returned text
//! is usable.

pub mod chat;
pub mod ollama;
pub mod scripted;

pub use chat::ChatCompletionsGateway;
pub use ollama::OllamaGateway;
pub use scripted::ScriptedGateway;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{ProviderKind, TriageConfig};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Provider unreachable: {0}")]
    Transport(String),

    #[error("Provider returned error (status {status}): {body}")]
    Provider { status: u16, body: String },

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider response envelope could not be decoded: {0}")]
    MalformedEnvelope(String),
}

impl GatewayError {
    /// Network-level failures (including timeouts), as opposed to provider verdicts.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// Opaque `generate(prompt) -> text` boundary.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError>;
}

/// Build the gateway selected by configuration.
pub fn build_gateway(config: &TriageConfig) -> Result<Arc<dyn ModelGateway>, GatewayError> {
    let gateway: Arc<dyn ModelGateway> = match config.provider {
        ProviderKind::Ollama => Arc::new(OllamaGateway::new(
            &config.base_url,
            &config.model,
            config.temperature,
            config.generation_timeout(),
        )?),
        ProviderKind::ChatCompletions => Arc::new(ChatCompletionsGateway::new(
            &config.base_url,
            &config.model,
            config.api_key.as_deref(),
            config.temperature,
            config.generation_timeout(),
        )?),
    };
    tracing::info!(
        provider = config.provider.as_str(),
        model = %config.model,
        base_url = %config.base_url,
        "Model gateway configured"
    );
    Ok(gateway)
}

/// Map a reqwest failure onto the gateway taxonomy.
pub(crate) fn classify_reqwest_error(
    err: reqwest::Error,
    base_url: &str,
    timeout: Duration,
) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout(timeout)
    } else if err.is_connect() {
        GatewayError::Transport(format!("cannot connect to {base_url}"))
    } else if err.is_decode() {
        GatewayError::MalformedEnvelope(err.to_string())
    } else {
        GatewayError::Transport(err.to_string())
    }
}
