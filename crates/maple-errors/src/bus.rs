//! Bus scheduling errors.

use core::fmt;

use crate::common::ErrorSeverity;

/// Bus arbitration and dispatch errors.
///
/// These are returned synchronously from the task loop and are part of
/// normal operation: a peripheral that sees [`BusError::BusBusy`] simply
/// skips submission for this cycle.
///
/// # Examples
///
/// ```
/// use maple_errors::{BusError, ErrorSeverity};
///
/// let err = BusError::BusBusy;
/// assert_eq!(err.code(), 1);
/// assert_eq!(err.severity(), ErrorSeverity::Info);
/// assert_eq!(BusError::from_code(1), Some(BusError::BusBusy));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BusError {
    /// Another transmission on this bus is still Pending or Sent
    BusBusy = 1,
    /// The transmission table has no free slot for a new entry
    TableFull = 2,
    /// The physical layer refused to start the write
    PhysicalLayerRejected = 3,
    /// The handle does not name a live transmission
    UnknownHandle = 4,
}

impl BusError {
    /// Get the numeric error code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Get the error severity.
    pub fn severity(self) -> ErrorSeverity {
        match self {
            BusError::BusBusy => ErrorSeverity::Info,
            BusError::TableFull | BusError::PhysicalLayerRejected => ErrorSeverity::Warning,
            BusError::UnknownHandle => ErrorSeverity::Error,
        }
    }

    /// Check if trying again on a later cycle can succeed.
    pub fn is_transient(self) -> bool {
        !matches!(self, BusError::UnknownHandle)
    }

    /// Create an error from a code.
    ///
    /// Returns `None` if the code does not correspond to a known error.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(BusError::BusBusy),
            2 => Some(BusError::TableFull),
            3 => Some(BusError::PhysicalLayerRejected),
            4 => Some(BusError::UnknownHandle),
            _ => None,
        }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::BusBusy => write!(f, "bus busy: a transmission is already outstanding"),
            BusError::TableFull => write!(f, "transmission table full"),
            BusError::PhysicalLayerRejected => write!(f, "physical layer rejected the write"),
            BusError::UnknownHandle => write!(f, "unknown transmission handle"),
        }
    }
}

impl std::error::Error for BusError {}
