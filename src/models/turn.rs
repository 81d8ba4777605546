use serde::{Deserialize, Serialize};

use super::enums::{Priority, RiskLevel};

/// Reason attached to every guardrail short-circuit, followed by the keyword.
pub const RED_FLAG_REASON_PREFIX: &str = "Red flag symptom detected: ";
pub const RED_FLAG_ACTION: &str = "Immediate emergency referral required";
pub const FALLBACK_REASON: &str = "AI output parsing failed or refused to ask questions";
pub const FALLBACK_ACTION: &str = "Refer to doctor immediately";

/// Literal final option every question must offer.
pub const OTHER_OPTION: &str = "Other";
/// Options per question, including the trailing "Other".
pub const EXPECTED_ANSWER_COUNT: usize = 4;

/// One clarifying question issued by the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub priority: Priority,
    pub text: String,
    pub expected_answers: Vec<String>,
}

/// Questions issued together as one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSet {
    /// Model's interim explanation for needing more information, when given.
    pub reason: Option<String>,
    pub questions: Vec<Question>,
}

/// Terminal risk classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub risk_level: RiskLevel,
    pub reason: String,
    pub action: String,
}

impl Assessment {
    /// Emergency referral for a red-flag keyword.
    pub fn red_flag(keyword: &str) -> Self {
        Self {
            risk_level: RiskLevel::High,
            reason: format!("{RED_FLAG_REASON_PREFIX}{keyword}"),
            action: RED_FLAG_ACTION.to_string(),
        }
    }

    /// Conservative outcome used when the model produced nothing usable.
    pub fn fallback() -> Self {
        Self {
            risk_level: RiskLevel::High,
            reason: FALLBACK_REASON.to_string(),
            action: FALLBACK_ACTION.to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.reason == FALLBACK_REASON && self.action == FALLBACK_ACTION
    }
}

/// Output of one assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnResult {
    Questions(QuestionSet),
    Result(Assessment),
}

impl TurnResult {
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result(_))
    }
}
