use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{GatewayError, ModelGateway};

/// In-memory gateway replaying canned outcomes in order.
///
/// Once the script is exhausted it repeats the configured `repeat` reply, or
/// fails with a transport error when none is set. Every prompt is recorded.
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<String, GatewayError>>>,
    repeat: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, GatewayError>>,
    {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            repeat: None,
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Gateway whose every call succeeds with the given texts, in order.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Ok(t.into())))
    }

    /// Gateway answering every call with the same text.
    pub fn always(text: impl Into<String>) -> Self {
        Self::new(Vec::<Result<String, GatewayError>>::new()).with_repeat(text)
    }

    pub fn with_repeat(mut self, text: impl Into<String>) -> Self {
        self.repeat = Some(text.into());
        self
    }

    /// Sleep before answering, to exercise timeouts and cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .script
            .lock()
            .map_err(|_| GatewayError::Transport("script lock poisoned".into()))?
            .pop_front();

        match (next, &self.repeat) {
            (Some(outcome), _) => outcome,
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(GatewayError::Transport("script exhausted".into())),
        }
    }
}
