use serde::Deserialize;

use super::extract::extract;
use super::risk::normalize_risk;
use super::ResponseError;
use crate::models::{
    Assessment, Priority, Question, QuestionSet, EXPECTED_ANSWER_COUNT, OTHER_OPTION,
};

/// A validated model reply, before risk normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    Questions(QuestionSet),
    Assessment(RawAssessment),
}

/// Terminal reply as the model worded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAssessment {
    pub risk_label: String,
    pub reason: String,
    pub action: String,
}

impl RawAssessment {
    /// Fold the free-text risk label onto {LOW, MEDIUM, HIGH}.
    pub fn normalize(self) -> Assessment {
        Assessment {
            risk_level: normalize_risk(&self.risk_label),
            reason: self.reason,
            action: self.action,
        }
    }
}

#[derive(Deserialize)]
struct RawReply {
    #[serde(rename = "type")]
    kind: Option<String>,
    risk_level: Option<String>,
    reason: Option<String>,
    action: Option<String>,
    follow_up_questions: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct RawQuestion {
    question: Option<String>,
    priority: Option<String>,
    expected_answers: Option<Vec<String>>,
}

/// `extract` then `parse_strict`.
pub fn parse_response(raw: &str) -> Result<ModelReply, ResponseError> {
    let candidate = extract(raw).ok_or(ResponseError::NoJson)?;
    parse_strict(candidate)
}

/// Parse a JSON candidate and validate it against the two allowed shapes.
///
/// Syntax and schema failures are reported as distinct variants.
pub fn parse_strict(candidate: &str) -> Result<ModelReply, ResponseError> {
    let value: serde_json::Value =
        serde_json::from_str(candidate).map_err(|e| ResponseError::Syntax(e.to_string()))?;

    let raw: RawReply =
        serde_json::from_value(value).map_err(|e| ResponseError::Schema(e.to_string()))?;

    match raw.kind.as_deref().map(str::trim) {
        Some("result") => parse_assessment(raw).map(ModelReply::Assessment),
        Some("question") => parse_questions(raw).map(ModelReply::Questions),
        Some(other) => Err(ResponseError::Schema(format!("unknown type {other:?}"))),
        None => Err(ResponseError::Schema("missing \"type\"".into())),
    }
}

fn parse_assessment(raw: RawReply) -> Result<RawAssessment, ResponseError> {
    Ok(RawAssessment {
        risk_label: required(raw.risk_level, "risk_level")?,
        reason: required(raw.reason, "reason")?,
        action: required(raw.action, "action")?,
    })
}

fn parse_questions(raw: RawReply) -> Result<QuestionSet, ResponseError> {
    let items = raw.follow_up_questions.unwrap_or_default();
    if items.is_empty() {
        return Err(ResponseError::Schema(
            "\"follow_up_questions\" must be a non-empty array".into(),
        ));
    }

    let questions = items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| parse_question(idx, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QuestionSet {
        reason: raw.reason.filter(|r| !r.trim().is_empty()),
        questions,
    })
}

fn parse_question(idx: usize, item: serde_json::Value) -> Result<Question, ResponseError> {
    let raw: RawQuestion = serde_json::from_value(item)
        .map_err(|e| ResponseError::Schema(format!("follow_up_questions[{idx}]: {e}")))?;

    let text = required(raw.question, "question")
        .map_err(|e| nest(idx, e))?;

    let priority_label = required(raw.priority, "priority").map_err(|e| nest(idx, e))?;
    let priority = priority_label
        .trim()
        .to_ascii_uppercase()
        .parse::<Priority>()
        .map_err(|_| {
            ResponseError::Schema(format!(
                "follow_up_questions[{idx}]: priority {priority_label:?} is not HIGH, MEDIUM or LOW"
            ))
        })?;

    let expected_answers = raw.expected_answers.unwrap_or_default();
    if expected_answers.len() != EXPECTED_ANSWER_COUNT {
        return Err(ResponseError::Schema(format!(
            "follow_up_questions[{idx}]: expected_answers has {} items, need {EXPECTED_ANSWER_COUNT}",
            expected_answers.len()
        )));
    }
    if expected_answers.last().map(String::as_str) != Some(OTHER_OPTION) {
        return Err(ResponseError::Schema(format!(
            "follow_up_questions[{idx}]: last expected answer must be \"{OTHER_OPTION}\""
        )));
    }

    Ok(Question {
        priority,
        text,
        expected_answers,
    })
}

fn required(field: Option<String>, name: &str) -> Result<String, ResponseError> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ResponseError::Schema(format!("missing or empty \"{name}\""))),
    }
}

fn nest(idx: usize, err: ResponseError) -> ResponseError {
    match err {
        ResponseError::Schema(msg) => ResponseError::Schema(format!("follow_up_questions[{idx}]: {msg}")),
        other => other,
    }
}
