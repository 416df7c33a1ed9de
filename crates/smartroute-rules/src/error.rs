//! Error types for the rule engine.

use thiserror::Error;

/// Errors that can occur while compiling or importing rules.
///
/// None of these reach the per-request path: the decision engine is
/// infallible and treats a rule that failed to compile as absent.
#[derive(Error, Debug)]
pub enum RulesError {
    #[error("empty pattern")]
    EmptyPattern,

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("pattern matches every url: {0}")]
    MatchesEverything(String),

    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("regex is not portable to the decision script: {0}")]
    NonPortableRegex(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
