//! Vibration pack reached through an expansion slot.
//!
//! Like storage, vibration never transmits on its own. Effects are queued
//! through a [`VibrationHandle`] and go out as set-condition requests on the
//! next cycle; a newer effect replaces one that has not been sent yet. The
//! task loop only ever `try_lock`s the handle's state.

use std::sync::Arc;

use maple_packet::{BusAddress, Command, DeviceInfo, FunctionCode, MaplePacket, SEGA_PRODUCER};
use maple_scheduler::{EndpointTxScheduler, Transmission, TxHandle, TxStatus};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::identification::PlayerData;
use crate::peripheral::Peripheral;

/// Definition word of a standard vibration pack: one source, fixed
/// position, variable frequency.
pub const VIBRATION_PACK_DEFINITION: u32 = 0x0101_0000;
/// Strongest power level.
pub const MAX_POWER: u8 = 0x07;
/// Slowest pulsation frequency value.
pub const MIN_FREQUENCY: u8 = 0x07;
/// Fastest pulsation frequency value.
pub const MAX_FREQUENCY: u8 = 0x3B;
/// Largest cycle count one power step can carry.
pub const MAX_CYCLES: u8 = 0xFF;
/// Attempts made for one effect before it is abandoned.
pub const MAX_ATTEMPTS: u8 = 3;

const UNIT_ONE: u8 = 0x10;
const CONTINUOUS: u8 = 0x01;
const RAMP_DOWN: u8 = 0x80;
const RAMP_UP: u8 = 0x08;

/// How power changes over the course of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Inclination {
    /// Steps down from the starting power to 1
    RampDown,
    #[default]
    Constant,
    /// Steps up from the starting power to [`MAX_POWER`]
    RampUp,
}

/// One set-condition request for the vibration function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VibrationEffect {
    pub power: u8,
    pub inclination: Inclination,
    /// Pulsation frequency value; one cycle lasts `2 / (frequency + 1)` s
    pub frequency: u8,
    /// Cycles per power step, minus one
    pub cycles: u8,
    /// Vibrate until told otherwise
    pub continuous: bool,
}

impl VibrationEffect {
    /// Stops whatever is running.
    pub const STOP: Self = Self {
        power: 0,
        inclination: Inclination::Constant,
        frequency: MIN_FREQUENCY,
        cycles: 0,
        continuous: false,
    };

    /// Timed effect lasting about `duration_ms`.
    ///
    /// A `desired_frequency` of 0 picks the fastest pulsation that can still
    /// cover the duration; anything else is clamped to the valid range. A
    /// power of 0 stops vibration.
    pub fn pulse(
        power: u8,
        inclination: Inclination,
        desired_frequency: u8,
        duration_ms: u32,
    ) -> Self {
        let power = power.min(MAX_POWER);
        if power == 0 {
            return Self::STOP;
        }
        let steps = steps(power, inclination);
        let frequency = match desired_frequency {
            0 => fastest_frequency_for(steps, duration_ms),
            f => f.clamp(MIN_FREQUENCY, MAX_FREQUENCY),
        };
        let cycle_us = cycle_us(frequency);
        let total = u64::from(duration_ms)
            .saturating_mul(1000)
            .div_ceil(cycle_us)
            .max(1);
        let per_step = total.div_ceil(u64::from(steps));
        Self {
            power,
            inclination,
            frequency,
            cycles: u8::try_from(per_step.saturating_sub(1)).unwrap_or(MAX_CYCLES),
            continuous: false,
        }
    }

    /// Constant vibration that runs until stopped. A `desired_frequency` of
    /// 0 selects the fastest pulsation.
    pub fn continuous(power: u8, desired_frequency: u8) -> Self {
        let power = power.clamp(1, MAX_POWER);
        let frequency = match desired_frequency {
            0 => MAX_FREQUENCY,
            f => f.clamp(MIN_FREQUENCY, MAX_FREQUENCY),
        };
        Self {
            power,
            inclination: Inclination::Constant,
            frequency,
            cycles: 0,
            continuous: true,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.power == 0
    }

    /// Condition word: control, power, frequency, cycles from the high byte
    /// down.
    pub fn condition_word(&self) -> u32 {
        let control = if self.continuous {
            UNIT_ONE | CONTINUOUS
        } else {
            UNIT_ONE
        };
        let power = self.power & MAX_POWER;
        let power = match self.inclination {
            _ if power == 0 => 0,
            Inclination::Constant => power << 4,
            Inclination::RampDown => RAMP_DOWN | (power << 4),
            Inclination::RampUp => RAMP_UP | power,
        };
        u32::from_be_bytes([control, power, self.frequency, self.cycles])
    }

    /// Approximate length of a timed effect.
    pub fn duration_ms(&self) -> u32 {
        if self.is_stop() {
            return 0;
        }
        let cycles = u64::from(self.cycles)
            .saturating_add(1)
            .saturating_mul(u64::from(steps(self.power, self.inclination)));
        u32::try_from(cycles.saturating_mul(cycle_us(self.frequency)) / 1000).unwrap_or(u32::MAX)
    }
}

fn steps(power: u8, inclination: Inclination) -> u8 {
    match inclination {
        Inclination::Constant => 1,
        Inclination::RampDown => power.max(1),
        Inclination::RampUp => MAX_POWER.saturating_sub(power).saturating_add(1),
    }
}

fn cycle_us(frequency: u8) -> u64 {
    2_000_000 / u64::from(frequency).saturating_add(1)
}

fn fastest_frequency_for(steps: u8, duration_ms: u32) -> u8 {
    let wanted_us = u64::from(duration_ms).saturating_mul(1000);
    let reach = |frequency: u8| {
        cycle_us(frequency)
            .saturating_mul(u64::from(MAX_CYCLES) + 1)
            .saturating_mul(u64::from(steps))
    };
    (MIN_FREQUENCY..=MAX_FREQUENCY)
        .rev()
        .find(|&f| reach(f) >= wanted_us)
        .unwrap_or(MIN_FREQUENCY)
}

/// Why an effect never reached the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VibrationFault {
    /// Every attempt failed on the bus
    Transfer { write_failed: bool, read_failed: bool },
    /// The device answered with something other than an acknowledgement
    Refused(Command),
}

#[derive(Debug, Default)]
struct Shared {
    queued: Option<(u64, VibrationEffect)>,
    delivered: u32,
    fault: Option<VibrationFault>,
}

/// Cross-context access to a [`Vibration`] device.
#[derive(Debug, Clone)]
pub struct VibrationHandle {
    shared: Arc<Mutex<Shared>>,
}

impl VibrationHandle {
    /// Queue `effect` for the next cycle, replacing anything not yet sent.
    pub fn send(&self, effect: VibrationEffect) {
        self.send_at(0, effect);
    }

    /// Queue `effect` to go out no earlier than `at_us`.
    pub fn send_at(&self, at_us: u64, effect: VibrationEffect) {
        let mut shared = self.shared.lock();
        shared.fault = None;
        shared.queued = Some((at_us, effect));
    }

    /// Vibrate at `power` until [`stop`](Self::stop).
    pub fn start(&self, power: u8, desired_frequency: u8) {
        self.send(VibrationEffect::continuous(power, desired_frequency));
    }

    pub fn stop(&self) {
        self.send(VibrationEffect::STOP);
    }

    /// True while an effect is queued but not yet sent.
    pub fn is_pending(&self) -> bool {
        self.shared.lock().queued.is_some()
    }

    /// Effects the device has acknowledged.
    pub fn delivered(&self) -> u32 {
        self.shared.lock().delivered
    }

    /// Take the fault of the last abandoned effect.
    pub fn take_fault(&self) -> Option<VibrationFault> {
        self.shared.lock().fault.take()
    }
}

/// Emulated vibration pack.
#[derive(Debug)]
pub struct Vibration {
    address: BusAddress,
    player: PlayerData,
    definition: u32,
    info: DeviceInfo,
    shared: Arc<Mutex<Shared>>,
    in_flight: Option<(TxHandle, VibrationEffect)>,
    retry: Option<VibrationEffect>,
    attempts: u8,
    settled: Option<Result<(), VibrationFault>>,
    first: bool,
}

impl Vibration {
    /// Vibration pack at `address` advertising `function_definition`.
    ///
    /// The first cycle sends a stop so the pack starts from rest.
    pub fn new(address: BusAddress, player: PlayerData, function_definition: u32) -> Self {
        Self {
            address,
            player,
            definition: function_definition,
            info: DeviceInfo::new(
                FunctionCode::VIBRATION,
                [function_definition, 0, 0],
                "Puru Puru Pack",
                SEGA_PRODUCER,
            ),
            shared: Arc::new(Mutex::new(Shared::default())),
            in_flight: None,
            retry: None,
            attempts: 0,
            settled: None,
            first: true,
        }
    }

    pub fn handle(&self) -> VibrationHandle {
        VibrationHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn player(&self) -> &PlayerData {
        &self.player
    }

    fn packet_for(&self, effect: &VibrationEffect) -> MaplePacket {
        let host = BusAddress::host(self.address.player());
        let mut packet = MaplePacket::new(Command::SetCondition, self.address, host);
        for word in [FunctionCode::VIBRATION.bits(), effect.condition_word()] {
            if packet.payload.push(word).is_err() {
                break;
            }
        }
        packet
    }

    fn owns(&self, tx: &Transmission) -> Option<VibrationEffect> {
        let (handle, effect) = self.in_flight?;
        (handle.id() == tx.id()).then_some(effect)
    }

    /// Record the last outcome on the handle. False while the handle's lock
    /// is held elsewhere.
    fn publish(&mut self) -> bool {
        let Some(result) = self.settled.take() else {
            return true;
        };
        let Some(mut shared) = self.shared.try_lock() else {
            self.settled = Some(result);
            return false;
        };
        match result {
            Ok(()) => shared.delivered = shared.delivered.saturating_add(1),
            Err(fault) => shared.fault = Some(fault),
        }
        true
    }
}

impl Peripheral for Vibration {
    fn name(&self) -> &'static str {
        "vibration"
    }

    fn address(&self) -> BusAddress {
        self.address
    }

    fn function_code(&self) -> FunctionCode {
        FunctionCode::VIBRATION
    }

    fn function_definition(&self) -> u32 {
        self.definition
    }

    fn device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn task(&mut self, now_us: u64, scheduler: &mut dyn EndpointTxScheduler) {
        if !self.publish() {
            return;
        }
        if let Some((handle, _)) = self.in_flight {
            if scheduler.status(handle).is_some_and(TxStatus::is_outstanding) {
                return;
            }
            self.in_flight = None;
        }
        let Some(mut shared) = self.shared.try_lock() else {
            return;
        };

        let queued = shared.queued.filter(|(at, _)| *at <= now_us).map(|(_, e)| e);
        let from_queue = queued.is_some();
        if from_queue || shared.queued.is_some() {
            // a newer effect supersedes any retry
            self.retry = None;
            self.attempts = 0;
        }
        let first = self.first.then_some(VibrationEffect::STOP);
        let Some(effect) = queued.or(self.retry).or(first) else {
            return;
        };

        match scheduler.schedule(Transmission::new(self.packet_for(&effect), true)) {
            Ok(handle) => {
                trace!(address = %self.address, ?effect, "vibration scheduled");
                if from_queue {
                    shared.queued = None;
                }
                self.in_flight = Some((handle, effect));
                self.retry = None;
                self.first = false;
            }
            Err(e) => {
                trace!(address = %self.address, ?effect, error = %e, "vibration deferred");
            }
        }
    }

    fn tx_failed(&mut self, write_failed: bool, read_failed: bool, tx: &Transmission) {
        let Some(effect) = self.owns(tx) else {
            return;
        };
        self.in_flight = None;
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts < MAX_ATTEMPTS {
            debug!(address = %self.address, ?effect, attempt = self.attempts, "vibration failed, retrying");
            self.retry = Some(effect);
            return;
        }
        warn!(address = %self.address, ?effect, write_failed, read_failed, "vibration abandoned");
        self.attempts = 0;
        self.settled = Some(Err(VibrationFault::Transfer {
            write_failed,
            read_failed,
        }));
        self.publish();
    }

    fn tx_complete(&mut self, reply: Option<&MaplePacket>, tx: &Transmission) {
        let Some(effect) = self.owns(tx) else {
            return;
        };
        self.in_flight = None;
        self.attempts = 0;
        let result = match reply.map(|p| p.command) {
            None | Some(Command::Ack) => Ok(()),
            Some(other) => {
                debug!(address = %self.address, ?effect, reply = ?other, "vibration refused");
                Err(VibrationFault::Refused(other))
            }
        };
        self.settled = Some(result);
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_word() {
        assert_eq!(VibrationEffect::STOP.condition_word(), 0x1000_0700);
        assert_eq!(
            VibrationEffect::pulse(0, Inclination::RampUp, 20, 500),
            VibrationEffect::STOP
        );
    }

    #[test]
    fn test_continuous_word() {
        let effect = VibrationEffect::continuous(5, 0);
        assert_eq!(effect.condition_word(), 0x1150_3B00);
        assert_eq!(VibrationEffect::continuous(9, 1).condition_word(), 0x1170_0700);
    }

    #[test]
    fn test_inclination_bits() {
        let down = VibrationEffect::pulse(4, Inclination::RampDown, 19, 0);
        assert_eq!(down.condition_word() >> 16, 0x10C0);
        let up = VibrationEffect::pulse(4, Inclination::RampUp, 19, 0);
        assert_eq!(up.condition_word() >> 16, 0x100C);
    }

    #[test]
    fn test_fixed_frequency_duration() {
        // frequency 19: 100 ms per cycle
        let effect = VibrationEffect::pulse(7, Inclination::Constant, 19, 1000);
        assert_eq!(effect.frequency, 19);
        assert_eq!(effect.cycles, 9);
        assert_eq!(effect.duration_ms(), 1000);

        let ramp = VibrationEffect::pulse(4, Inclination::RampDown, 19, 1000);
        assert_eq!(ramp.cycles, 2);
        assert_eq!(ramp.duration_ms(), 1200);
    }

    #[test]
    fn test_auto_frequency_covers_duration() {
        let short = VibrationEffect::pulse(3, Inclination::Constant, 0, 100);
        assert_eq!(short.frequency, MAX_FREQUENCY);
        assert!(short.duration_ms() >= 100);

        let long = VibrationEffect::pulse(3, Inclination::Constant, 0, 70_000);
        assert_eq!(long.frequency, MIN_FREQUENCY);
        assert_eq!(long.cycles, MAX_CYCLES);
    }

    #[test]
    fn test_handle_replaces_queued_effect() {
        let device = Vibration::new(
            BusAddress(0x01),
            PlayerData::default(),
            VIBRATION_PACK_DEFINITION,
        );
        let handle = device.handle();
        handle.start(3, 0);
        handle.stop();
        assert!(handle.is_pending());
        assert_eq!(device.shared.lock().queued, Some((0, VibrationEffect::STOP)));
    }

    #[test]
    fn test_set_condition_packet() {
        let device = Vibration::new(
            BusAddress(0x42),
            PlayerData::default(),
            VIBRATION_PACK_DEFINITION,
        );
        let packet = device.packet_for(&VibrationEffect::continuous(7, 0));
        assert_eq!(packet.command, Command::SetCondition);
        assert_eq!(packet.recipient, BusAddress(0x42));
        assert_eq!(packet.sender, BusAddress(0x40));
        assert_eq!(packet.payload.as_slice(), &[0x0000_0100, 0x1170_3B00]);
    }
}
