use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum complaint length in characters.
pub const MAX_COMPLAINT_LENGTH: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputModificationKind {
    InvisibleUnicodeRemoved,
    ControlCharacterRemoved,
    InjectionPatternRemoved,
    ExcessiveLengthTruncated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputModification {
    pub kind: InputModificationKind,
    pub description: String,
}

/// Patient text after sanitization, with an audit of what changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizedInput {
    pub text: String,
    pub was_modified: bool,
    pub modifications: Vec<InputModification>,
}

/// Sanitize patient text before it is embedded in a model prompt.
pub fn sanitize_patient_input(raw: &str, max_length: usize) -> SanitizedInput {
    let mut text = raw.trim().to_string();
    let mut modifications = Vec::new();

    // Step 1: Remove non-visible Unicode characters
    let before = text.clone();
    text = remove_invisible_unicode(&text);
    if text != before {
        modifications.push(InputModification {
            kind: InputModificationKind::InvisibleUnicodeRemoved,
            description: "Stripped non-visible Unicode characters".to_string(),
        });
    }

    // Step 2: Remove control characters (except newline, tab)
    let before = text.clone();
    text = remove_control_characters(&text);
    if text != before {
        modifications.push(InputModification {
            kind: InputModificationKind::ControlCharacterRemoved,
            description: "Stripped control characters".to_string(),
        });
    }

    // Step 3: Neutralise prompt injection and reasoning-tag patterns
    let before = text.clone();
    text = remove_injection_patterns(&text);
    if text != before {
        modifications.push(InputModification {
            kind: InputModificationKind::InjectionPatternRemoved,
            description: "Removed potential prompt injection patterns".to_string(),
        });
    }

    // Step 4: Truncate to maximum length
    let original_chars = text.chars().count();
    if original_chars > max_length {
        text = truncate_at_word_boundary(&text, max_length);
        modifications.push(InputModification {
            kind: InputModificationKind::ExcessiveLengthTruncated,
            description: format!(
                "Truncated from {} to {} characters",
                original_chars,
                text.chars().count()
            ),
        });
    }

    SanitizedInput {
        text,
        was_modified: !modifications.is_empty(),
        modifications,
    }
}

/// Remove zero-width and invisible Unicode characters.
fn remove_invisible_unicode(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(
                *c,
                '\u{200B}'..='\u{200F}'  // Zero-width chars
                | '\u{202A}'..='\u{202E}' // Directional formatting
                | '\u{2060}'..='\u{2064}' // Invisible operators
                | '\u{2066}'..='\u{2069}' // Directional isolates
                | '\u{FEFF}'              // BOM
                | '\u{00AD}'              // Soft hyphen
            )
        })
        .collect()
}

/// Remove control characters except newline and tab.
fn remove_control_characters(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

fn remove_injection_patterns(text: &str) -> String {
    static INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
        [
            r"(?i)ignore\s+(?:previous|above|all\s+prior|the\s+above)\s+(?:instructions?|rules?|prompts?)",
            r"(?i)new\s+instructions?:",
            r"(?i)system\s*:",
            r"(?i)assistant\s*:",
            r"(?i)</?think>",
            r"<\|im_start\|>",
            r"<\|im_end\|>",
            r"\[INST\]",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid injection regex"))
        .collect()
    });

    let mut result = text.to_string();
    for pattern in INJECTION_PATTERNS.iter() {
        result = pattern.replace_all(&result, "[FILTERED]").into_owned();
    }
    result
}

/// Truncate to at most `max` characters, backing off to the last whitespace.
fn truncate_at_word_boundary(text: &str, max: usize) -> String {
    let cut = text
        .char_indices()
        .nth(max)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let truncated = &text[..cut];
    match truncated.rfind(char::is_whitespace) {
        Some(pos) => truncated[..pos].to_string(),
        None => truncated.to_string(),
    }
}
