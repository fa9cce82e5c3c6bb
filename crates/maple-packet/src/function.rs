//! Function codes advertised during device identification.

use core::fmt;
use core::ops::BitOr;

/// Bit set of Maple function codes.
///
/// A device advertises the union of its functions. The device info block
/// carries one function definition word per set bit, ordered from the
/// highest bit to the lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FunctionCode(pub u32);

impl FunctionCode {
    /// Standard controller
    pub const CONTROLLER: Self = Self(0x0000_0001);
    /// Memory card storage
    pub const STORAGE: Self = Self(0x0000_0002);
    /// LCD screen
    pub const LCD: Self = Self(0x0000_0004);
    /// Timer / clock
    pub const TIMER: Self = Self(0x0000_0008);
    /// Microphone
    pub const AUDIO_INPUT: Self = Self(0x0000_0010);
    /// AR gun
    pub const AR_GUN: Self = Self(0x0000_0020);
    /// Keyboard
    pub const KEYBOARD: Self = Self(0x0000_0040);
    /// Light gun
    pub const GUN: Self = Self(0x0000_0080);
    /// Vibration pack
    pub const VIBRATION: Self = Self(0x0000_0100);
    /// Mouse
    pub const MOUSE: Self = Self(0x0000_0200);
    /// Extended media
    pub const EX_MEDIA: Self = Self(0x0000_0400);
    /// Camera
    pub const CAMERA: Self = Self(0x0000_0800);

    /// Raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Position of `function`'s definition word in the device info
    /// definition list of a device advertising `self`.
    ///
    /// Returns `None` unless `function` is a single bit present in `self`.
    ///
    /// ```
    /// use maple_packet::FunctionCode;
    ///
    /// let advertised = FunctionCode::CONTROLLER | FunctionCode::VIBRATION;
    /// assert_eq!(advertised.definition_index(FunctionCode::VIBRATION), Some(0));
    /// assert_eq!(advertised.definition_index(FunctionCode::CONTROLLER), Some(1));
    /// ```
    pub fn definition_index(self, function: Self) -> Option<usize> {
        if function.0.count_ones() != 1 || !self.contains(function) {
            return None;
        }
        let higher = self.0 & !(function.0 | function.0.wrapping_sub(1));
        usize::try_from(higher.count_ones()).ok()
    }
}

impl BitOr for FunctionCode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_index_orders_high_to_low() {
        let advertised = FunctionCode::STORAGE | FunctionCode::LCD | FunctionCode::TIMER;
        assert_eq!(advertised.definition_index(FunctionCode::TIMER), Some(0));
        assert_eq!(advertised.definition_index(FunctionCode::LCD), Some(1));
        assert_eq!(advertised.definition_index(FunctionCode::STORAGE), Some(2));
        assert_eq!(advertised.definition_index(FunctionCode::MOUSE), None);
    }

    #[test]
    fn test_contains_rejects_empty() {
        assert!(!FunctionCode::CONTROLLER.contains(FunctionCode(0)));
        assert!(FunctionCode(0x3).contains(FunctionCode::STORAGE));
    }
}
