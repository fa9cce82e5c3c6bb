//! Standard controller: digital buttons, two triggers and two analog sticks.

use maple_packet::{BusAddress, DeviceInfo, FunctionCode, MaplePacket, SEGA_PRODUCER, VERSION_LEN};
use maple_scheduler::{EndpointTxScheduler, Transmission};

use crate::identification::{Identification, PlayerData};
use crate::input::{GamepadButtons, GamepadState, InputSource};
use crate::peripheral::{Peripheral, PeripheralTiming, ReportLink, version_string};

/// Definition word of the controller function: every button, both
/// triggers and both sticks.
pub const CONTROLLER_FUNCTION_DEFINITION: u32 = 0x000F_06FE;

/// Controller buttons, set bit = pressed. Bit positions match the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ControllerButtons(pub u16);

impl ControllerButtons {
    pub const Z: Self = Self(1 << 0);
    pub const Y: Self = Self(1 << 1);
    pub const X: Self = Self(1 << 2);
    pub const D: Self = Self(1 << 3);
    pub const UP2: Self = Self(1 << 4);
    pub const DOWN2: Self = Self(1 << 5);
    pub const LEFT2: Self = Self(1 << 6);
    pub const RIGHT2: Self = Self(1 << 7);
    pub const C: Self = Self(1 << 8);
    pub const B: Self = Self(1 << 9);
    pub const A: Self = Self(1 << 10);
    pub const START: Self = Self(1 << 11);
    pub const UP: Self = Self(1 << 12);
    pub const DOWN: Self = Self(1 << 13);
    pub const LEFT: Self = Self(1 << 14);
    pub const RIGHT: Self = Self(1 << 15);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    fn set(&mut self, other: Self, pressed: bool) {
        if pressed {
            self.0 |= other.0;
        }
    }
}

/// Controller condition as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerCondition {
    pub pressed: ControllerButtons,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub left_x: u8,
    pub left_y: u8,
    pub right_x: u8,
    pub right_y: u8,
}

impl ControllerCondition {
    /// Nothing pressed, triggers released, sticks centred.
    pub const NEUTRAL: Self = Self {
        pressed: ControllerButtons(0),
        left_trigger: 0,
        right_trigger: 0,
        left_x: 0x80,
        left_y: 0x80,
        right_x: 0x80,
        right_y: 0x80,
    };

    /// Map a generic gamepad onto the controller layout.
    ///
    /// Face buttons map by position (south = A, east = B, west = X,
    /// north = Y), the shoulders become C and Z, and L3 becomes D. The
    /// second d-pad has no generic counterpart and stays released.
    pub fn from_gamepad(state: &GamepadState) -> Self {
        let held = state.buttons;
        let mut pressed = ControllerButtons::default();
        pressed.set(ControllerButtons::A, held.contains(GamepadButtons::SOUTH));
        pressed.set(ControllerButtons::B, held.contains(GamepadButtons::EAST));
        pressed.set(ControllerButtons::X, held.contains(GamepadButtons::WEST));
        pressed.set(ControllerButtons::Y, held.contains(GamepadButtons::NORTH));
        pressed.set(ControllerButtons::C, held.contains(GamepadButtons::R1));
        pressed.set(ControllerButtons::Z, held.contains(GamepadButtons::L1));
        pressed.set(ControllerButtons::D, held.contains(GamepadButtons::L3));
        pressed.set(ControllerButtons::START, held.contains(GamepadButtons::START));
        pressed.set(ControllerButtons::UP, state.hat.up());
        pressed.set(ControllerButtons::DOWN, state.hat.down());
        pressed.set(ControllerButtons::LEFT, state.hat.left());
        pressed.set(ControllerButtons::RIGHT, state.hat.right());

        Self {
            pressed,
            left_trigger: state.left_trigger,
            right_trigger: state.right_trigger,
            left_x: state.left_x,
            left_y: state.left_y,
            right_x: state.right_x,
            right_y: state.right_y,
        }
    }

    /// The two condition words. Buttons are active-low on the wire.
    pub fn to_words(&self) -> [u32; 2] {
        let released = u32::from(!self.pressed.0);
        let buttons_and_triggers = (released << 16)
            | (u32::from(self.right_trigger) << 8)
            | u32::from(self.left_trigger);
        let sticks = (u32::from(self.left_x) << 24)
            | (u32::from(self.left_y) << 16)
            | (u32::from(self.right_x) << 8)
            | u32::from(self.right_y);
        [buttons_and_triggers, sticks]
    }

    /// Full condition payload including the function code word.
    pub fn payload(&self) -> [u32; 3] {
        let [first, second] = self.to_words();
        [FunctionCode::CONTROLLER.bits(), first, second]
    }
}

impl Default for ControllerCondition {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Emulated controller fed from a gamepad snapshot source.
pub struct Controller<I> {
    player: PlayerData,
    input: I,
    link: ReportLink,
    info: DeviceInfo,
    version: heapless::String<VERSION_LEN>,
    condition: ControllerCondition,
}

impl<I: InputSource<GamepadState>> Controller<I> {
    /// Controller on `player`'s main address.
    pub fn new(
        player: PlayerData,
        identification: &dyn Identification,
        input: I,
        timing: PeripheralTiming,
    ) -> Self {
        Self {
            player,
            input,
            link: ReportLink::new(player.main_address(), timing),
            info: DeviceInfo::new(
                FunctionCode::CONTROLLER,
                [CONTROLLER_FUNCTION_DEFINITION, 0, 0],
                "Dreamcast Controller",
                SEGA_PRODUCER,
            ),
            version: version_string(identification.serial()),
            condition: ControllerCondition::NEUTRAL,
        }
    }

    pub fn player(&self) -> &PlayerData {
        &self.player
    }

    /// Condition built from the most recent snapshot.
    pub fn condition(&self) -> ControllerCondition {
        self.condition
    }
}

impl<I: InputSource<GamepadState>> Peripheral for Controller<I> {
    fn name(&self) -> &'static str {
        "controller"
    }

    fn address(&self) -> BusAddress {
        self.link.address()
    }

    fn function_code(&self) -> FunctionCode {
        FunctionCode::CONTROLLER
    }

    fn function_definition(&self) -> u32 {
        CONTROLLER_FUNCTION_DEFINITION
    }

    fn device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn task(&mut self, now_us: u64, scheduler: &mut dyn EndpointTxScheduler) {
        self.condition = ControllerCondition::from_gamepad(&self.input.snapshot());
        let payload = self.condition.payload();
        self.link
            .poll(now_us, scheduler, &self.info, &self.version, &payload);
    }

    fn tx_failed(&mut self, _write_failed: bool, _read_failed: bool, tx: &Transmission) {
        self.link.settle(tx);
    }

    fn tx_complete(&mut self, _reply: Option<&MaplePacket>, tx: &Transmission) {
        self.link.settle(tx);
    }
}

impl<I> core::fmt::Debug for Controller<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Controller")
            .field("player", &self.player)
            .field("link", &self.link)
            .field("condition", &self.condition)
            .finish_non_exhaustive()
    }
}
