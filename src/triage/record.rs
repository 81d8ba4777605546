use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{OutcomeSource, RiskLevel};

/// One answered question. The audit list follows the order answers were given,
/// which may differ from the order questions were listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub question: String,
    pub answer_given: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Layer the question belonged to.
    pub turn_index: usize,
}

/// Persistable summary of a terminal session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub session_id: Uuid,
    pub complaint: String,
    pub risk_level: RiskLevel,
    pub reason: String,
    pub action: String,
    pub source: OutcomeSource,
    pub audit: Vec<AuditEntry>,
    pub completed_at: DateTime<Utc>,
}

impl CaseRecord {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
