//! Book error types.

use thiserror::Error;

/// Errors raised while importing lorebooks.
#[derive(Debug, Error)]
pub enum BookError {
    /// The book JSON could not be parsed.
    #[error("failed to parse lorebook JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The book parsed but holds a value the engine cannot use.
    #[error("invalid lorebook value: {0}")]
    InvalidValue(String),
}

/// Result type for book operations.
pub type Result<T> = std::result::Result<T, BookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_display() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let err: BookError = json_err.into();
        assert!(err.to_string().contains("parse lorebook JSON"));
    }

    #[test]
    fn invalid_value_display() {
        let err = BookError::InvalidValue("duplicate entry id 7".to_string());
        assert_eq!(err.to_string(), "invalid lorebook value: duplicate entry id 7");
    }
}
