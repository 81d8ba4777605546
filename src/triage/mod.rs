//! Layered triage sessions and the service that hosts them.

pub mod layer;
pub mod record;
pub mod service;
pub mod session;

pub use layer::{Layer, LayerQuestion};
pub use record::{AuditEntry, CaseRecord};
pub use service::{TriageReply, TriageService};
pub use session::{SessionState, SessionStep, TriageSession};

use thiserror::Error;
use uuid::Uuid;

/// Caller integration errors: the request does not fit the session's state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Session has not started")]
    NotStarted,

    #[error("Session has already started")]
    AlreadyStarted,

    #[error("Session is terminal")]
    Terminal,

    #[error("Session is not terminal yet")]
    NotTerminal,

    #[error("Complaint is empty")]
    EmptyComplaint,

    #[error("Answer is empty")]
    EmptyAnswer,

    #[error("Unknown question: {0}")]
    UnknownQuestion(String),

    #[error("Question {0} does not belong to the active layer")]
    ForeignQuestion(String),

    #[error("Question {0} is already answered")]
    AlreadyAnswered(String),

    #[error("Layer {layer} still has {remaining} unanswered question(s)")]
    LayerIncomplete { layer: usize, remaining: usize },
}

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Complaint is empty")]
    EmptyComplaint,

    #[error("Session registry lock poisoned")]
    LockPoisoned,
}
