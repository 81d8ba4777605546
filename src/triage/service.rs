use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use super::record::CaseRecord;
use super::session::{SessionState, SessionStep, TriageSession};
use super::{StateError, TriageError};
use crate::config::TriageConfig;
use crate::pipeline::gateway::ModelGateway;
use crate::pipeline::turn::TurnController;

/// Reply to a caller, tagged with the session it concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageReply {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub step: SessionStep,
}

type SessionHandle = Arc<tokio::sync::Mutex<TriageSession>>;

struct SessionEntry {
    handle: SessionHandle,
    last_used: Instant,
}

/// Registry of live sessions sharing one model gateway.
///
/// The registry lock is held only to look up or insert a handle; each
/// session has its own async lock, so independent sessions proceed
/// concurrently while one session's calls are serialized.
///
/// Retention is bounded: a session unused for `session_ttl` is dropped, and
/// registering beyond `max_sessions` evicts the least recently used one.
/// Terminal sessions stay retrievable until one of those happens or the
/// caller abandons them.
pub struct TriageService {
    config: TriageConfig,
    controller: TurnController,
    session_ttl: Duration,
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
}

impl TriageService {
    pub fn new(gateway: Arc<dyn ModelGateway>, config: TriageConfig) -> Self {
        let controller = TurnController::new(gateway, &config);
        Self {
            session_ttl: config.session_ttl(),
            config,
            controller,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    /// Open a session for `complaint` and return its first step.
    ///
    /// The session is registered only after the first turn completes.
    pub async fn start_triage(&self, complaint: &str) -> Result<TriageReply, TriageError> {
        if complaint.trim().is_empty() {
            return Err(TriageError::EmptyComplaint);
        }

        let mut session = TriageSession::new(&self.config);
        let session_id = session.id();
        tracing::info!(%session_id, "Starting triage");

        let step = match session.start(complaint, &self.controller).await {
            Ok(step) => step,
            Err(StateError::EmptyComplaint) => return Err(TriageError::EmptyComplaint),
            Err(e) => return Err(e.into()),
        };

        self.register(session)?;
        Ok(TriageReply { session_id, step })
    }

    pub async fn answer_question(
        &self,
        session_id: Uuid,
        question_id: &str,
        selected_option: &str,
        note: Option<&str>,
    ) -> Result<TriageReply, TriageError> {
        let handle = self.session(session_id)?;
        let mut session = handle.lock().await;
        let step = session
            .submit_answer(question_id, selected_option, note, &self.controller)
            .await?;
        Ok(TriageReply { session_id, step })
    }

    /// Retry the pending turn after a cancelled or interrupted call.
    pub async fn advance(&self, session_id: Uuid) -> Result<TriageReply, TriageError> {
        let handle = self.session(session_id)?;
        let mut session = handle.lock().await;
        let step = session.advance(&self.controller).await?;
        Ok(TriageReply { session_id, step })
    }

    pub async fn state(&self, session_id: Uuid) -> Result<SessionState, TriageError> {
        let handle = self.session(session_id)?;
        let session = handle.lock().await;
        Ok(session.state())
    }

    pub async fn case_record(&self, session_id: Uuid) -> Result<CaseRecord, TriageError> {
        let handle = self.session(session_id)?;
        let session = handle.lock().await;
        Ok(session.case_record()?)
    }

    /// Drop a session, terminal or not.
    pub fn abandon(&self, session_id: Uuid) -> Result<(), TriageError> {
        let removed = self
            .sessions
            .lock()
            .map_err(|_| TriageError::LockPoisoned)?
            .remove(&session_id);

        match removed {
            Some(_) => {
                tracing::info!(%session_id, "Session abandoned");
                Ok(())
            }
            None => Err(TriageError::SessionNotFound(session_id)),
        }
    }

    pub fn active_sessions(&self) -> Result<usize, TriageError> {
        Ok(self
            .sessions
            .lock()
            .map_err(|_| TriageError::LockPoisoned)?
            .len())
    }

    /// Drop every session unused for longer than the configured TTL.
    pub fn evict_expired(&self) -> Result<usize, TriageError> {
        let mut sessions = self.sessions.lock().map_err(|_| TriageError::LockPoisoned)?;
        Ok(self.prune_expired(&mut sessions, Instant::now()))
    }

    fn register(&self, session: TriageSession) -> Result<(), TriageError> {
        let session_id = session.id();
        let now = Instant::now();
        let mut sessions = self.sessions.lock().map_err(|_| TriageError::LockPoisoned)?;

        self.prune_expired(&mut sessions, now);
        while sessions.len() >= self.config.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                    tracing::info!(session_id = %id, "Registry full, evicted least recently used session");
                }
                None => break,
            }
        }

        sessions.insert(
            session_id,
            SessionEntry {
                handle: Arc::new(tokio::sync::Mutex::new(session)),
                last_used: now,
            },
        );
        Ok(())
    }

    fn prune_expired(&self, sessions: &mut HashMap<Uuid, SessionEntry>, now: Instant) -> usize {
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_used) <= self.session_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, "Expired sessions evicted");
        }
        evicted
    }

    fn session(&self, session_id: Uuid) -> Result<SessionHandle, TriageError> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().map_err(|_| TriageError::LockPoisoned)?;

        let expired = match sessions.get_mut(&session_id) {
            None => return Err(TriageError::SessionNotFound(session_id)),
            Some(entry) if now.duration_since(entry.last_used) > self.session_ttl => true,
            Some(entry) => {
                entry.last_used = now;
                return Ok(entry.handle.clone());
            }
        };

        if expired {
            sessions.remove(&session_id);
            tracing::info!(%session_id, "Session expired");
        }
        Err(TriageError::SessionNotFound(session_id))
    }
}
