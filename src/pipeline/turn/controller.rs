use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::Instrument;

use super::prompt::build_turn_prompt;
use super::retry::retry_bounded;
use super::TurnKind;
use crate::config::TriageConfig;
use crate::models::{Assessment, Transcript, TurnResult};
use crate::pipeline::gateway::{GatewayError, ModelGateway};
use crate::pipeline::response::{parse_response, ModelReply, ResponseError};

/// Why a single attempt produced nothing usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnFailure {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error("Model returned a result before asking any clarifying question")]
    PrematureResult,

    #[error("Model asked further questions after the layer cap")]
    QuestionsAfterCap,
}

/// Result of one controller turn. Never an error: exhaustion yields the fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub result: TurnResult,
    pub attempts: usize,
    /// True when `result` is the synthetic conservative fallback.
    pub fallback: bool,
    pub failures: Vec<TurnFailure>,
}

/// Drives one assistant turn: prompt, generate, parse, enforce turn rules, retry.
pub struct TurnController {
    gateway: Arc<dyn ModelGateway>,
    max_attempts: usize,
    questions_per_layer: usize,
    timeout: Duration,
}

impl TurnController {
    pub fn new(gateway: Arc<dyn ModelGateway>, config: &TriageConfig) -> Self {
        Self {
            gateway,
            max_attempts: config.max_attempts,
            questions_per_layer: config.questions_per_layer,
            timeout: config.generation_timeout(),
        }
    }

    /// Produce the next turn result for `transcript`.
    ///
    /// A first-layer result and a post-cap question set are both discarded
    /// and consume an attempt. When every attempt fails the HIGH-risk
    /// fallback is returned.
    pub async fn run_turn(&self, transcript: &Transcript, kind: TurnKind) -> TurnOutcome {
        let prompt = build_turn_prompt(transcript, kind, self.questions_per_layer);
        let span = tracing::info_span!(
            "turn",
            kind = kind.as_str(),
            transcript_len = transcript.len()
        );

        async {
            let prompt = prompt.as_str();
            let outcome = retry_bounded(self.max_attempts, move |attempt| async move {
                let result = self.attempt(prompt, kind).await;
                if let Err(e) = &result {
                    tracing::warn!(attempt, error = %e, "Turn attempt rejected");
                }
                result
            })
            .await;

            match outcome.value {
                Some(result) => {
                    tracing::debug!(attempts = outcome.attempts, "Turn produced usable output");
                    TurnOutcome {
                        result,
                        attempts: outcome.attempts,
                        fallback: false,
                        failures: outcome.failures,
                    }
                }
                None => {
                    tracing::warn!(
                        attempts = outcome.attempts,
                        "All turn attempts failed, returning conservative fallback"
                    );
                    TurnOutcome {
                        result: TurnResult::Result(Assessment::fallback()),
                        attempts: outcome.attempts,
                        fallback: true,
                        failures: outcome.failures,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// One fresh generation, bounded by the configured timeout.
    async fn attempt(&self, prompt: &str, kind: TurnKind) -> Result<TurnResult, TurnFailure> {
        let raw = tokio::time::timeout(self.timeout, self.gateway.generate(prompt))
            .await
            .map_err(|_| GatewayError::Timeout(self.timeout))??;

        match (kind, parse_response(&raw)?) {
            (TurnKind::First, ModelReply::Assessment(_)) => Err(TurnFailure::PrematureResult),
            (TurnKind::Final, ModelReply::Questions(_)) => Err(TurnFailure::QuestionsAfterCap),
            (_, ModelReply::Questions(set)) => Ok(TurnResult::Questions(set)),
            (_, ModelReply::Assessment(raw)) => Ok(TurnResult::Result(raw.normalize())),
        }
    }
}
