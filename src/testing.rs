//! Canned model completions shared by unit tests.

use serde_json::json;

/// Well-formed question reply with `count` questions.
pub fn question_reply(count: usize) -> String {
    let questions: Vec<_> = (1..=count)
        .map(|i| {
            json!({
                "question": format!("Question {i}?"),
                "priority": "HIGH",
                "expected_answers": ["Yes", "No", "Not sure", "Other"],
            })
        })
        .collect();

    json!({
        "type": "question",
        "risk_level": "LOW",
        "reason": "Need more detail",
        "follow_up_questions": questions,
    })
    .to_string()
}

/// Well-formed terminal reply carrying the given risk label verbatim.
pub fn result_reply(risk_label: &str) -> String {
    json!({
        "type": "result",
        "risk_level": risk_label,
        "reason": "Assessment complete",
        "action": "Rest and monitor",
    })
    .to_string()
}
