//! Peripheral management errors raised by the player bus.

use crate::common::ErrorSeverity;

/// Errors raised while attaching or detaching emulated peripherals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum PeripheralError {
    /// A peripheral already occupies the address
    #[error("address {0:#04x} is already in use")]
    AddressInUse(u8),

    /// The address is not a valid peripheral address for this player
    #[error("address {0:#04x} is not a valid peripheral address")]
    InvalidAddress(u8),

    /// No peripheral is attached at the address
    #[error("no peripheral attached at {0:#04x}")]
    NotAttached(u8),

    /// An expansion was attached before the primary peripheral
    #[error("no primary peripheral attached for expansion at {0:#04x}")]
    NoPrimary(u8),

    /// The address belongs to a different player slot
    #[error("address belongs to player {actual}, bus serves player {expected}")]
    PlayerMismatch {
        /// Player slot served by the bus
        expected: u8,
        /// Player slot encoded in the address
        actual: u8,
    },
}

impl PeripheralError {
    /// Get the error severity.
    pub fn severity(self) -> ErrorSeverity {
        match self {
            PeripheralError::NotAttached(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}
