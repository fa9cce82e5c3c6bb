//! Top-level error type and classification shared by every Maple crate.

use core::fmt;

use crate::{BusError, CodecError, ConfigError, PeripheralError};

/// Top-level error type wrapping every Maple sub-error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapleError {
    /// Packet framing or checksum failure
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Bus scheduling failure
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// Peripheral management failure
    #[error("Peripheral error: {0}")]
    Peripheral(#[from] PeripheralError),

    /// Configuration failure
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl MapleError {
    /// Get the error category for classification.
    pub fn category(&self) -> ErrorCategory {
        match self {
            MapleError::Codec(_) => ErrorCategory::Codec,
            MapleError::Bus(_) => ErrorCategory::Bus,
            MapleError::Peripheral(_) => ErrorCategory::Peripheral,
            MapleError::Config(_) => ErrorCategory::Config,
        }
    }

    /// Get the error severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MapleError::Codec(e) => e.severity(),
            MapleError::Bus(e) => e.severity(),
            MapleError::Peripheral(e) => e.severity(),
            MapleError::Config(_) => ErrorSeverity::Error,
        }
    }

    /// Check if this error is recoverable without restart.
    ///
    /// Nothing in the protocol layer is fatal; only configuration errors
    /// require the caller to change something before retrying.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, MapleError::Config(_))
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// Wire format errors
    Codec = 0,
    /// Bus arbitration errors
    Bus = 1,
    /// Peripheral lifecycle errors
    Peripheral = 2,
    /// Configuration errors
    Config = 3,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Codec => write!(f, "Codec"),
            ErrorCategory::Bus => write!(f, "Bus"),
            ErrorCategory::Peripheral => write!(f, "Peripheral"),
            ErrorCategory::Config => write!(f, "Config"),
        }
    }
}

/// Error severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Expected during normal operation, no action required
    Info = 0,
    /// Warning, may require attention if persistent
    Warning = 1,
    /// Error, operation failed
    Error = 2,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_follows_variant() {
        let err: MapleError = BusError::BusBusy.into();
        assert_eq!(err.category(), ErrorCategory::Bus);

        let err: MapleError = CodecError::Checksum {
            expected: 0x10,
            actual: 0x11,
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Codec);
    }

    #[test]
    fn test_config_errors_are_not_recoverable() {
        let err: MapleError = ConfigError::InvalidPlayerIndex(7).into();
        assert!(!err.is_recoverable());
        assert!(MapleError::from(BusError::BusBusy).is_recoverable());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
    }
}
