use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{classify_reqwest_error, GatewayError, ModelGateway};

/// Ollama HTTP gateway for local inference.
pub struct OllamaGateway {
    base_url: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaGateway {
    pub fn new(
        base_url: &str,
        model: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
            timeout,
            client,
        })
    }

    /// Default Ollama instance at localhost:11434 with a 2-minute timeout.
    pub fn default_local(model: &str) -> Result<Self, GatewayError> {
        Self::new("http://localhost:11434", model, 0.1, Duration::from_secs(120))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Models installed on the Ollama instance.
    pub async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e, &self.base_url, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedEnvelope(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether the configured model is installed.
    pub async fn is_model_available(&self) -> Result<bool, GatewayError> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m.starts_with(&self.model)))
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[async_trait]
impl ModelGateway for OllamaGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e, &self.base_url, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Ollama returned non-success status");
            return Err(GatewayError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedEnvelope(e.to_string()))?;

        Ok(parsed.response)
    }
}
