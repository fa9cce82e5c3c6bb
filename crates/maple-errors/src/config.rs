//! Configuration validation errors.

/// Errors raised by configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Player index outside 0..=3
    #[error("player index {0} out of range (0-3)")]
    InvalidPlayerIndex(u8),

    /// A period that must be positive was zero
    #[error("{0} must be greater than zero")]
    ZeroPeriod(&'static str),

    /// A field failed validation
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}
