pub mod red_flags;
pub mod sanitize;

pub use red_flags::{check, check_with_window, screen, RedFlagMatch, DEFAULT_NEGATION_WINDOW};
pub use sanitize::{sanitize_patient_input, SanitizedInput, MAX_COMPLAINT_LENGTH};
