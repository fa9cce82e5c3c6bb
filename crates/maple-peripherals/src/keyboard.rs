//! Keyboard: modifier bitmap, lock LEDs and up to six pressed keys in USB
//! HID boot protocol usage codes.

use maple_packet::{BusAddress, DeviceInfo, FunctionCode, MaplePacket, SEGA_PRODUCER, VERSION_LEN};
use maple_scheduler::{EndpointTxScheduler, Transmission};

use crate::identification::{Identification, PlayerData};
use crate::input::{InputSource, KeyboardState};
use crate::peripheral::{Peripheral, PeripheralTiming, ReportLink, version_string};

/// Definition word of the keyboard function (US layout).
pub const KEYBOARD_FUNCTION_DEFINITION: u32 = 0x8000_0502;

/// Keyboard condition as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyboardCondition {
    pub modifiers: u8,
    pub leds: u8,
    pub keys: [u8; 6],
}

impl KeyboardCondition {
    /// Condition for a snapshot. Key slots keep their order.
    pub fn from_state(state: &KeyboardState) -> Self {
        Self {
            modifiers: state.modifiers,
            leds: state.leds,
            keys: state.keys,
        }
    }

    /// The two condition words.
    pub fn to_words(&self) -> [u32; 2] {
        let [k0, k1, k2, k3, k4, k5] = self.keys;
        [
            u32::from_le_bytes([self.modifiers, self.leds, k0, k1]),
            u32::from_le_bytes([k2, k3, k4, k5]),
        ]
    }

    /// Full condition payload including the function code word.
    pub fn payload(&self) -> [u32; 3] {
        let [first, second] = self.to_words();
        [FunctionCode::KEYBOARD.bits(), first, second]
    }
}

/// Emulated keyboard fed from a boot-protocol snapshot source.
pub struct Keyboard<I> {
    player: PlayerData,
    input: I,
    link: ReportLink,
    info: DeviceInfo,
    version: heapless::String<VERSION_LEN>,
    condition: KeyboardCondition,
}

impl<I: InputSource<KeyboardState>> Keyboard<I> {
    /// Keyboard at `address` on `player`'s bus.
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
                FunctionCode::KEYBOARD,
                [KEYBOARD_FUNCTION_DEFINITION, 0, 0],
                "Keyboard",
                SEGA_PRODUCER,
            ),
            version: version_string(identification.serial()),
            condition: KeyboardCondition::default(),
        }
    }

    pub fn player(&self) -> &PlayerData {
        &self.player
    }

    pub fn condition(&self) -> KeyboardCondition {
        self.condition
    }
}

impl<I: InputSource<KeyboardState>> Peripheral for Keyboard<I> {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn address(&self) -> BusAddress {
        self.link.address()
    }

    fn function_code(&self) -> FunctionCode {
        FunctionCode::KEYBOARD
    }

    fn function_definition(&self) -> u32 {
        KEYBOARD_FUNCTION_DEFINITION
    }

    fn device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn task(&mut self, now_us: u64, scheduler: &mut dyn EndpointTxScheduler) {
        self.condition = KeyboardCondition::from_state(&self.input.snapshot());
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

impl<I> core::fmt::Debug for Keyboard<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Keyboard")
            .field("player", &self.player)
            .field("link", &self.link)
            .field("condition", &self.condition)
            .finish_non_exhaustive()
    }
}
