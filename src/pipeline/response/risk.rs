use crate::models::RiskLevel;

/// Fold a free-text risk label onto the closed set.
///
/// The model is only trusted to emit text containing one of the canonical
/// tokens. Anything unrecognised folds to LOW; this never fails.
pub fn normalize_risk(label: &str) -> RiskLevel {
    let folded = label.to_lowercase();
    if folded.contains("high") {
        RiskLevel::High
    } else if folded.contains("medium") {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}
