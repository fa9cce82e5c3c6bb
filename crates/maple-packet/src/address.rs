//! Maple Bus addressing.
//!
//! An address byte carries the player slot in bits 6-7. The low six bits
//! select the endpoint on that player's bus: all clear for the host port,
//! 0x20 for the main peripheral, and one of bits 0-4 for an expansion
//! peripheral plugged into the main one.

use core::fmt;

/// Number of player slots (ports A-D).
pub const MAX_PLAYERS: u8 = 4;
/// Number of expansion slots behind one main peripheral.
pub const MAX_SUB_PERIPHERALS: u8 = 5;

const PLAYER_SHIFT: u8 = 6;
const PLAYER_MASK: u8 = 0xC0;
const MAIN_MASK: u8 = 0x20;
const SUB_MASK: u8 = 0x1F;

/// One byte bus address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BusAddress(pub u8);

impl BusAddress {
    /// Host port address for a player slot.
    pub const fn host(player: u8) -> Self {
        Self((player << PLAYER_SHIFT) & PLAYER_MASK)
    }

    /// Main peripheral address for a player slot.
    pub const fn main(player: u8) -> Self {
        Self(Self::host(player).0 | MAIN_MASK)
    }

    /// Expansion peripheral address for `slot` (0-4) on a player's bus.
    pub const fn sub(player: u8, slot: u8) -> Option<Self> {
        if slot >= MAX_SUB_PERIPHERALS {
            return None;
        }
        Some(Self(Self::host(player).0 | (1 << slot)))
    }

    /// Raw address byte.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Player slot encoded in the high bits.
    pub const fn player(self) -> u8 {
        (self.0 & PLAYER_MASK) >> PLAYER_SHIFT
    }

    /// True for a host port address.
    pub const fn is_host(self) -> bool {
        self.0 & !PLAYER_MASK == 0
    }

    /// True for a main peripheral address.
    pub const fn is_main(self) -> bool {
        self.0 & !PLAYER_MASK == MAIN_MASK
    }

    /// Expansion slot index when this names exactly one expansion peripheral.
    pub const fn sub_slot(self) -> Option<u8> {
        let low = self.0 & !PLAYER_MASK;
        if low & !SUB_MASK != 0 || low.count_ones() != 1 {
            return None;
        }
        Some(low.trailing_zeros() as u8)
    }

    /// True when this addresses a single peripheral (main or expansion).
    pub const fn is_peripheral(self) -> bool {
        self.is_main() || self.sub_slot().is_some()
    }

    /// Ordering key: main first, then expansions by slot.
    pub fn attach_order(self) -> u8 {
        match self.sub_slot() {
            Some(slot) => slot.saturating_add(1),
            None => 0,
        }
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}
