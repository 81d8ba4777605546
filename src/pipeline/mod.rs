pub mod gateway; // Model provider boundary (Ollama, chat completions, scripted)
pub mod response; // JSON recovery, strict parsing, risk normalization
pub mod safety; // Red-flag guardrail + input sanitization
pub mod turn; // Prompting, bounded retry, turn rules
