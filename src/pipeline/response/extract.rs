/// Marker closing a chain-of-thought block some models emit despite instructions.
pub const REASONING_CLOSE_MARKER: &str = "</think>";

/// Drop everything up to and including the last reasoning-closing marker.
pub fn strip_reasoning(raw: &str) -> &str {
    match raw.rfind(REASONING_CLOSE_MARKER) {
        Some(idx) => &raw[idx + REASONING_CLOSE_MARKER.len()..],
        None => raw,
    }
}

/// Slice the JSON candidate out of a raw completion: first `{` to last `}`, inclusive.
pub fn extract(raw: &str) -> Option<&str> {
    let text = strip_reasoning(raw);
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
