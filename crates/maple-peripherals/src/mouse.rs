//! Mouse: relative motion on up to eight axes plus three buttons.
//!
//! Motion reported by the source is accumulated between condition reports,
//! so nothing is lost while the bus is busy. The share a report carries is
//! held until that report settles and folded back in if it fails. Each axis
//! is a 10-bit value centred on 0x200.

use maple_packet::{BusAddress, DeviceInfo, FunctionCode, MaplePacket, SEGA_PRODUCER, VERSION_LEN};
use maple_scheduler::{EndpointTxScheduler, Transmission};

use crate::identification::{Identification, PlayerData};
use crate::input::{InputSource, MouseButtons, MouseState};
use crate::peripheral::{Peripheral, PeripheralTiming, ReportKind, ReportLink, version_string};

/// Definition word of the mouse function: three buttons, x, y and wheel.
pub const MOUSE_FUNCTION_DEFINITION: u32 = 0x000E_0700;
/// Axis value at rest.
pub const AXIS_CENTER: u16 = 0x200;
/// Largest motion one report can carry in either direction.
pub const AXIS_RANGE: i32 = 0x1FF;

const AXIS_X: usize = 0;
const AXIS_Y: usize = 1;
const AXIS_WHEEL: usize = 2;
const BUTTON_RIGHT: u32 = 1 << 1;
const BUTTON_LEFT: u32 = 1 << 2;
const BUTTON_MIDDLE: u32 = 1 << 3;

/// Mouse condition as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseCondition {
    pub buttons: MouseButtons,
    /// x, y, wheel, then five unused axes
    pub axes: [u16; 8],
}

impl MouseCondition {
    /// No buttons, no motion.
    pub const NEUTRAL: Self = Self {
        buttons: MouseButtons(0),
        axes: [AXIS_CENTER; 8],
    };

    /// Condition for `buttons` with accumulated motion, clamped to what one
    /// report can carry.
    pub fn from_motion(buttons: MouseButtons, dx: i32, dy: i32, wheel: i32) -> Self {
        let mut axes = [AXIS_CENTER; 8];
        for (index, delta) in [(AXIS_X, dx), (AXIS_Y, dy), (AXIS_WHEEL, wheel)] {
            if let Some(axis) = axes.get_mut(index) {
                *axis = axis_value(delta);
            }
        }
        Self { buttons, axes }
    }

    /// Button word: active-low in the low byte.
    pub fn button_word(&self) -> u32 {
        let mut pressed = 0;
        if self.buttons.contains(MouseButtons::RIGHT) {
            pressed |= BUTTON_RIGHT;
        }
        if self.buttons.contains(MouseButtons::LEFT) {
            pressed |= BUTTON_LEFT;
        }
        if self.buttons.contains(MouseButtons::MIDDLE) {
            pressed |= BUTTON_MIDDLE;
        }
        0xFF & !pressed
    }

    /// Full condition payload including the function code word.
    pub fn payload(&self) -> [u32; 6] {
        let [x, y, wheel, a3, a4, a5, a6, a7] = self.axes.map(u32::from);
        [
            FunctionCode::MOUSE.bits(),
            self.button_word(),
            x | (y << 16),
            wheel | (a3 << 16),
            a4 | (a5 << 16),
            a6 | (a7 << 16),
        ]
    }
}

impl Default for MouseCondition {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

fn axis_value(delta: i32) -> u16 {
    let centred = i32::from(AXIS_CENTER).saturating_add(delta.clamp(-AXIS_RANGE, AXIS_RANGE));
    u16::try_from(centred).unwrap_or(AXIS_CENTER)
}

#[derive(Debug, Clone, Copy, Default)]
struct Motion {
    dx: i32,
    dy: i32,
    wheel: i32,
}

impl Motion {
    fn add(&mut self, state: &MouseState) {
        self.dx = self.dx.saturating_add(i32::from(state.dx));
        self.dy = self.dy.saturating_add(i32::from(state.dy));
        self.wheel = self.wheel.saturating_add(i32::from(state.wheel));
    }

    /// Split off what one report can carry, keeping any overflow here.
    fn take_report(&mut self) -> Motion {
        let carried = Motion {
            dx: self.dx.clamp(-AXIS_RANGE, AXIS_RANGE),
            dy: self.dy.clamp(-AXIS_RANGE, AXIS_RANGE),
            wheel: self.wheel.clamp(-AXIS_RANGE, AXIS_RANGE),
        };
        self.dx = self.dx.saturating_sub(carried.dx);
        self.dy = self.dy.saturating_sub(carried.dy);
        self.wheel = self.wheel.saturating_sub(carried.wheel);
        carried
    }

    fn restore(&mut self, carried: Motion) {
        self.dx = self.dx.saturating_add(carried.dx);
        self.dy = self.dy.saturating_add(carried.dy);
        self.wheel = self.wheel.saturating_add(carried.wheel);
    }
}

/// Emulated mouse fed from a relative-motion source.
pub struct Mouse<I> {
    player: PlayerData,
    input: I,
    link: ReportLink,
    info: DeviceInfo,
    version: heapless::String<VERSION_LEN>,
    buttons: MouseButtons,
    motion: Motion,
    /// Transmission id and the motion its report carries
    in_flight: Option<(u32, Motion)>,
}

impl<I: InputSource<MouseState>> Mouse<I> {
    /// Mouse at `address` on `player`'s bus.
    pub fn new(
        address: BusAddress,
        player: PlayerData,
        identification: &dyn Identification,
        input: I,
        timing: PeripheralTiming,
    ) -> Self {
        Self {
            player,
            input,
            link: ReportLink::new(address, timing),
            info: DeviceInfo::new(
                FunctionCode::MOUSE,
                [MOUSE_FUNCTION_DEFINITION, 0, 0],
                "Dreamcast Mouse",
                SEGA_PRODUCER,
            ),
            version: version_string(identification.serial()),
            buttons: MouseButtons::default(),
            motion: Motion::default(),
            in_flight: None,
        }
    }

    pub fn player(&self) -> &PlayerData {
        &self.player
    }

    /// Condition the next report would carry.
    pub fn condition(&self) -> MouseCondition {
        MouseCondition::from_motion(
            self.buttons,
            self.motion.dx,
            self.motion.dy,
            self.motion.wheel,
        )
    }
}

impl<I: InputSource<MouseState>> Peripheral for Mouse<I> {
    fn name(&self) -> &'static str {
        "mouse"
    }

    fn address(&self) -> BusAddress {
        self.link.address()
    }

    fn function_code(&self) -> FunctionCode {
        FunctionCode::MOUSE
    }

    fn function_definition(&self) -> u32 {
        MOUSE_FUNCTION_DEFINITION
    }

    fn device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn task(&mut self, now_us: u64, scheduler: &mut dyn EndpointTxScheduler) {
        let state = self.input.snapshot();
        self.buttons = state.buttons;
        self.motion.add(&state);

        let payload = self.condition().payload();
        let sent = self
            .link
            .poll(now_us, scheduler, &self.info, &self.version, &payload);
        if sent == Some(ReportKind::Condition)
            && let Some(handle) = self.link.outstanding()
        {
            self.in_flight = Some((handle.id(), self.motion.take_report()));
        }
    }

    fn tx_failed(&mut self, _write_failed: bool, _read_failed: bool, tx: &Transmission) {
        if let Some((_, carried)) = self.in_flight.take_if(|(id, _)| *id == tx.id()) {
            self.motion.restore(carried);
        }
        self.link.settle(tx);
    }

    fn tx_complete(&mut self, _reply: Option<&MaplePacket>, tx: &Transmission) {
        if self.in_flight.is_some_and(|(id, _)| id == tx.id()) {
            self.in_flight = None;
        }
        self.link.settle(tx);
    }
}

impl<I> core::fmt::Debug for Mouse<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mouse")
            .field("player", &self.player)
            .field("link", &self.link)
            .field("buttons", &self.buttons)
            .field("motion", &self.motion)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_payload() {
        assert_eq!(
            MouseCondition::NEUTRAL.payload(),
            [
                0x0000_0200,
                0x0000_00FF,
                0x0200_0200,
                0x0200_0200,
                0x0200_0200,
                0x0200_0200
            ]
        );
    }

    #[test]
    fn test_buttons_are_active_low() {
        let condition = MouseCondition::from_motion(
            MouseButtons(MouseButtons::LEFT.0 | MouseButtons::MIDDLE.0),
            0,
            0,
            0,
        );
        assert_eq!(condition.button_word(), 0xFF & !(1 << 2) & !(1 << 3));
    }

    #[test]
    fn test_motion_is_clamped() {
        let condition = MouseCondition::from_motion(MouseButtons::default(), 5000, -5000, 3);
        assert_eq!(condition.axes.get(AXIS_X), Some(&0x3FF));
        assert_eq!(condition.axes.get(AXIS_Y), Some(&0x001));
        assert_eq!(condition.axes.get(AXIS_WHEEL), Some(&0x203));
    }

    #[test]
    fn test_take_report_keeps_overflow() {
        let mut motion = Motion {
            dx: 600,
            dy: -10,
            wheel: 0,
        };
        let carried = motion.take_report();
        assert_eq!((carried.dx, carried.dy), (AXIS_RANGE, -10));
        assert_eq!(motion.dx, 600 - AXIS_RANGE);
        assert_eq!(motion.dy, 0);

        motion.restore(carried);
        assert_eq!((motion.dx, motion.dy), (600, -10));
    }
}
