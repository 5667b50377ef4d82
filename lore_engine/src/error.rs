//! Configuration error types.

use thiserror::Error;

/// Misconfiguration detected before any activation pass runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Budget percent must lie in `(0, 100]`.
    #[error("budget percent must be in (0, 100], got {0}")]
    BudgetPercent(f64),

    /// A negative budget cap was supplied.
    #[error("budget cap must not be negative, got {0}")]
    NegativeBudgetCap(i64),

    /// The configuration file could not be parsed.
    #[error("failed to parse activation config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Some other value was out of range.
    #[error("invalid activation config value: {0}")]
    InvalidValue(String),
}

/// Result type for engine configuration.
pub type Result<T> = std::result::Result<T, ConfigError>;
