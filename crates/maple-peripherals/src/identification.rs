//! Per-player configuration and the hardware identification collaborator.

use maple_packet::BusAddress;

/// Read-only unique device serial.
pub trait Identification {
    /// Serial as printable ASCII.
    fn serial(&self) -> &str;
}

impl<T: AsRef<str> + ?Sized> Identification for T {
    fn serial(&self) -> &str {
        self.as_ref()
    }
}

/// Identifies the USB input device backing a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UsbSourceId {
    /// USB device address assigned by the host stack
    pub device_address: u8,
    /// Interface instance on that device
    pub instance: u8,
}

/// Immutable per-player configuration, fixed at peripheral construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PlayerData {
    /// Zero-based player slot
    pub player_index: u8,
    /// Backing USB input device
    pub source: UsbSourceId,
}

impl PlayerData {
    pub fn new(player_index: u8, source: UsbSourceId) -> Self {
        Self {
            player_index,
            source,
        }
    }

    /// Host port address of this player's bus.
    pub fn host_address(&self) -> BusAddress {
        BusAddress::host(self.player_index)
    }

    /// Main peripheral address of this player's bus.
    pub fn main_address(&self) -> BusAddress {
        BusAddress::main(self.player_index)
    }

    /// Expansion address for `slot`.
    pub fn sub_address(&self, slot: u8) -> Option<BusAddress> {
        BusAddress::sub(self.player_index, slot)
    }
}
