//! Recovery of structured turn results from raw model completions.
//!
//! Two stages: `extract` finds the JSON candidate inside noisy text,
//! `parse_strict` validates it against the two allowed shapes.

pub mod extract;
pub mod parser;
pub mod risk;

pub use extract::*;
pub use parser::*;
pub use risk::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("No JSON object found in model output")]
    NoJson,

    #[error("JSON syntax error: {0}")]
    Syntax(String),

    #[error("Schema violation: {0}")]
    Schema(String),
}
