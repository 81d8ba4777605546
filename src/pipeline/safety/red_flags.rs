//! Pre-model red-flag guardrail.
//!
//! Deterministic keyword screen run before any generative call. A hit
//! short-circuits triage with an emergency referral; the model is never
//! consulted for these complaints.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Assessment;

/// Danger keywords, checked in order. The first unnegated hit wins.
pub const RED_FLAG_KEYWORDS: &[&str] = &[
    "breathing difficulty",
    "difficulty breathing",
    "shortness of breath",
    "not breathing",
    "chest pain",
    "pressure in chest",
    "unconscious",
    "unresponsive",
    "fainted",
    "seizure",
    "convulsion",
    "bleeding heavily",
    "severe bleeding",
    "vomiting blood",
    "blood in vomit",
    "blood in stool",
    "unable to drink",
    "not able to drink",
    "very weak cannot stand",
    "severe dehydration",
    "no urine",
    "blue lips",
    "spo2",
    "oxygen low",
    "no pulse",
];

/// Characters before a keyword scanned for negations.
pub const DEFAULT_NEGATION_WINDOW: usize = 30;

/// Negation terms, matched on word boundaries ("no" must not match "nothing").
static NEGATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:no|not|without|doesn't have|does not have|denies)\b")
        .expect("valid negation regex")
});

/// An unnegated danger keyword found in patient text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedFlagMatch {
    pub keyword: &'static str,
    /// Trimmed text immediately preceding the keyword (at most the negation window).
    pub preceding_context: String,
}

/// Screen patient text with the default negation window.
pub fn check(raw_text: &str) -> Option<RedFlagMatch> {
    check_with_window(raw_text, DEFAULT_NEGATION_WINDOW)
}

/// Screen patient text, looking `window` characters back for negations.
///
/// Every occurrence of a keyword is considered, so a negated early mention
/// does not hide a later unnegated one.
pub fn check_with_window(raw_text: &str, window: usize) -> Option<RedFlagMatch> {
    let text = raw_text.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }

    for &keyword in RED_FLAG_KEYWORDS {
        for (offset, _) in text.match_indices(keyword) {
            let context = preceding_window(&text, offset, window).trim();
            if !NEGATION_RE.is_match(context) {
                return Some(RedFlagMatch {
                    keyword,
                    preceding_context: context.to_string(),
                });
            }
        }
    }

    None
}

/// Guardrail verdict as a terminal assessment.
pub fn screen(raw_text: &str, window: usize) -> Option<Assessment> {
    check_with_window(raw_text, window).map(|hit| Assessment::red_flag(hit.keyword))
}

/// Up to `window` characters ending at byte `offset`, on char boundaries.
fn preceding_window(text: &str, offset: usize, window: usize) -> &str {
    if window == 0 {
        return "";
    }
    let head = &text[..offset];
    let start = head
        .char_indices()
        .rev()
        .nth(window - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    &head[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;

    #[test]
    fn severe_chest_pain_fires() {
        let hit = check("I have severe chest pain").unwrap();
        assert_eq!(hit.keyword, "chest pain");
        assert_eq!(hit.preceding_context, "i have severe");
    }

    #[test]
    fn negated_chest_pain_is_suppressed() {
        assert!(check("no chest pain today").is_none());
        assert!(check("Patient denies chest pain").is_none());
        assert!(check("She doesn't have chest pain or fever").is_none());
        assert!(check("cough without shortness of breath").is_none());
    }

    #[test]
    fn negation_with_intervening_words_is_suppressed() {
        assert!(check("no severe chest pain").is_none());
    }

    #[test]
    fn negation_outside_window_does_not_suppress() {
        let text = "no fever reported, but over the last few hours chest pain has appeared";
        let hit = check(text).unwrap();
        assert_eq!(hit.keyword, "chest pain");
    }

    #[test]
    fn negation_word_must_be_whole_word() {
        // "nothing" and "note" contain "no" but are not negations.
        assert!(check("nothing helps the chest pain").is_some());
        assert!(check("note: chest pain since morning").is_some());
    }

    #[test]
    fn later_unnegated_occurrence_still_fires() {
        let hit = check("no chest pain yesterday evening, but this morning the chest pain returned").unwrap();
        assert_eq!(hit.keyword, "chest pain");
    }

    #[test]
    fn first_keyword_in_list_order_wins() {
        let hit = check("I am unconscious and not breathing").unwrap();
        assert_eq!(hit.keyword, "not breathing");
        let a = screen("I am unconscious and not breathing", DEFAULT_NEGATION_WINDOW).unwrap();
        assert_eq!(a.risk_level, RiskLevel::High);
        assert!(a.reason.contains("breathing"));
        assert_eq!(a.action, "Immediate emergency referral required");
    }

    #[test]
    fn negated_candidate_falls_through_to_next_keyword() {
        let hit = check("no chest pain, but yesterday afternoon she had a seizure").unwrap();
        assert_eq!(hit.keyword, "seizure");
    }

    #[test]
    fn case_and_whitespace_are_ignored() {
        let hit = check("   SpO2 is 85 percent  ").unwrap();
        assert_eq!(hit.keyword, "spo2");
    }

    #[test]
    fn empty_input_is_no_match() {
        assert!(check("").is_none());
        assert!(check("    ").is_none());
    }

    #[test]
    fn mild_complaint_passes() {
        assert!(check("I have a mild headache").is_none());
    }

    #[test]
    fn window_handles_multibyte_text() {
        let hit = check("ça fait mal — épaule et chest pain").unwrap();
        assert_eq!(hit.keyword, "chest pain");
        assert!(check("élève: no chest pain").is_none());
    }

    #[test]
    fn zero_window_never_suppresses() {
        assert!(check_with_window("no chest pain", 0).is_some());
    }

    #[test]
    fn deterministic_verdict() {
        let a = check("fainted twice");
        let b = check("fainted twice");
        assert_eq!(a, b);
    }
}
