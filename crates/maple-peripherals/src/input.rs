//! Input snapshots polled from the USB side.
//!
//! The USB host stack is external. Each attached device is exposed to its
//! peripheral as an [`InputSource`] returning the latest state without
//! blocking.

/// Non-blocking source of input snapshots.
///
/// Relative sources (mouse motion) return the motion accumulated since the
/// previous snapshot.
pub trait InputSource<S> {
    /// Current state.
    fn snapshot(&self) -> S;
}

impl<S, F: Fn() -> S> InputSource<S> for F {
    fn snapshot(&self) -> S {
        self()
    }
}

/// D-pad / hat switch position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum HatDirection {
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
    #[default]
    Neutral,
}

impl HatDirection {
    /// Decode a HID hat value (0 = up, clockwise, anything above 7 = neutral).
    pub fn from_hid(value: u8) -> Self {
        match value {
            0 => HatDirection::Up,
            1 => HatDirection::UpRight,
            2 => HatDirection::Right,
            3 => HatDirection::DownRight,
            4 => HatDirection::Down,
            5 => HatDirection::DownLeft,
            6 => HatDirection::Left,
            7 => HatDirection::UpLeft,
            _ => HatDirection::Neutral,
        }
    }

    pub fn up(self) -> bool {
        matches!(
            self,
            HatDirection::Up | HatDirection::UpRight | HatDirection::UpLeft
        )
    }

    pub fn down(self) -> bool {
        matches!(
            self,
            HatDirection::Down | HatDirection::DownRight | HatDirection::DownLeft
        )
    }

    pub fn left(self) -> bool {
        matches!(
            self,
            HatDirection::Left | HatDirection::UpLeft | HatDirection::DownLeft
        )
    }

    pub fn right(self) -> bool {
        matches!(
            self,
            HatDirection::Right | HatDirection::UpRight | HatDirection::DownRight
        )
    }
}

/// Generic gamepad buttons, named by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct GamepadButtons(pub u32);

impl GamepadButtons {
    pub const SOUTH: Self = Self(1 << 0);
    pub const EAST: Self = Self(1 << 1);
    pub const WEST: Self = Self(1 << 2);
    pub const NORTH: Self = Self(1 << 3);
    pub const L1: Self = Self(1 << 4);
    pub const R1: Self = Self(1 << 5);
    pub const L3: Self = Self(1 << 6);
    pub const R3: Self = Self(1 << 7);
    pub const START: Self = Self(1 << 8);
    pub const SELECT: Self = Self(1 << 9);
    pub const HOME: Self = Self(1 << 10);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Gamepad snapshot. Sticks are unsigned with 0x80 at centre; triggers are
/// 0 released to 0xFF fully pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GamepadState {
    pub buttons: GamepadButtons,
    pub hat: HatDirection,
    pub left_x: u8,
    pub left_y: u8,
    pub right_x: u8,
    pub right_y: u8,
    pub left_trigger: u8,
    pub right_trigger: u8,
}

impl Default for GamepadState {
    fn default() -> Self {
        Self {
            buttons: GamepadButtons::default(),
            hat: HatDirection::Neutral,
            left_x: 0x80,
            left_y: 0x80,
            right_x: 0x80,
            right_y: 0x80,
            left_trigger: 0,
            right_trigger: 0,
        }
    }
}

/// Mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MouseButtons(pub u8);

impl MouseButtons {
    pub const LEFT: Self = Self(1 << 0);
    pub const RIGHT: Self = Self(1 << 1);
    pub const MIDDLE: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Mouse snapshot: buttons held now, motion since the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseState {
    pub buttons: MouseButtons,
    pub dx: i16,
    pub dy: i16,
    pub wheel: i16,
}

/// Keyboard snapshot in USB HID boot protocol terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyboardState {
    /// Modifier bitmap (left ctrl = bit 0 ... right gui = bit 7)
    pub modifiers: u8,
    /// Lock LED bitmap (num = bit 0, caps = bit 1, scroll = bit 2)
    pub leds: u8,
    /// Up to six pressed key usage codes, zero for none
    pub keys: [u8; 6],
}
