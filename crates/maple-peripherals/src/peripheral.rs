//! The peripheral lifecycle contract and the report bookkeeping shared by
//! the autonomous variants.

use maple_packet::{BusAddress, Command, DeviceInfo, FunctionCode, MaplePacket, VERSION_LEN};
use maple_scheduler::{
    EndpointTxScheduler, Transmission, TxHandle, TxStatus, compute_next_time_cadence,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Per-cycle protocol logic for one emulated function on a player bus.
///
/// Callbacks are delivered from the task loop, never from the completion
/// boundary. The default callbacks do nothing: a failed attempt is dropped
/// and the next [`task`](Peripheral::task) decides whether to try again.
pub trait Peripheral {
    /// Short human readable name.
    fn name(&self) -> &'static str;

    /// Address this peripheral answers on.
    fn address(&self) -> BusAddress;

    /// Functions advertised at identification.
    fn function_code(&self) -> FunctionCode;

    /// Definition word of the primary function.
    fn function_definition(&self) -> u32;

    /// Identification block reported to the console.
    fn device_info(&self) -> DeviceInfo;

    /// Run one cooperative cycle. Must not block.
    fn task(&mut self, now_us: u64, scheduler: &mut dyn EndpointTxScheduler);

    /// `tx` has been handed to the physical layer.
    fn tx_started(&mut self, _tx: &Transmission) {}

    /// `tx` reached Failed; the flags say which phase went wrong.
    fn tx_failed(&mut self, _write_failed: bool, _read_failed: bool, _tx: &Transmission) {}

    /// `tx` reached Succeeded, with the decoded reply if one was expected.
    fn tx_complete(&mut self, _reply: Option<&MaplePacket>, _tx: &Transmission) {}
}

impl<P: Peripheral + ?Sized> Peripheral for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn address(&self) -> BusAddress {
        (**self).address()
    }

    fn function_code(&self) -> FunctionCode {
        (**self).function_code()
    }

    fn function_definition(&self) -> u32 {
        (**self).function_definition()
    }

    fn device_info(&self) -> DeviceInfo {
        (**self).device_info()
    }

    fn task(&mut self, now_us: u64, scheduler: &mut dyn EndpointTxScheduler) {
        (**self).task(now_us, scheduler);
    }

    fn tx_started(&mut self, tx: &Transmission) {
        (**self).tx_started(tx);
    }

    fn tx_failed(&mut self, write_failed: bool, read_failed: bool, tx: &Transmission) {
        (**self).tx_failed(write_failed, read_failed, tx);
    }

    fn tx_complete(&mut self, reply: Option<&MaplePacket>, tx: &Transmission) {
        (**self).tx_complete(reply, tx);
    }
}

/// Report cadence of an autonomous peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeripheralTiming {
    /// Interval between condition reports
    pub report_period_us: u64,
    /// Interval between identification broadcasts, 0 to identify only once
    pub identify_period_us: u64,
}

impl Default for PeripheralTiming {
    fn default() -> Self {
        Self {
            report_period_us: 16_000,
            identify_period_us: 1_000_000,
        }
    }
}

/// What an autonomous peripheral owes the bus next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Extended device info carrying the serial
    Identify,
    /// Condition report
    Condition,
}

impl ReportKind {
    fn of(packet: &MaplePacket) -> Self {
        match packet.command {
            Command::DeviceInfo | Command::ExtDeviceInfo => ReportKind::Identify,
            _ => ReportKind::Condition,
        }
    }
}

/// Outstanding-handle and deadline tracking for one autonomous peripheral.
///
/// Identification goes out first and takes precedence whenever both are
/// due. Deadlines advance only when the scheduler accepts a submission, so
/// a rejected or failed attempt leaves the report due on the next cycle.
#[derive(Debug, Clone)]
pub struct ReportLink {
    address: BusAddress,
    timing: PeripheralTiming,
    outstanding: Option<TxHandle>,
    next_identify_us: Option<u64>,
    next_report_us: u64,
}

impl ReportLink {
    pub fn new(address: BusAddress, timing: PeripheralTiming) -> Self {
        Self {
            address,
            timing,
            outstanding: None,
            next_identify_us: Some(0),
            next_report_us: 0,
        }
    }

    pub fn address(&self) -> BusAddress {
        self.address
    }

    pub fn timing(&self) -> PeripheralTiming {
        self.timing
    }

    /// Host port this peripheral reports to.
    pub fn host(&self) -> BusAddress {
        BusAddress::host(self.address.player())
    }

    /// Handle of the last accepted submission until it settles.
    pub fn outstanding(&self) -> Option<TxHandle> {
        self.outstanding
    }

    /// True while our last submission is still Pending or Sent.
    ///
    /// A handle the scheduler no longer knows, or one that reached a
    /// terminal state, is forgotten here.
    pub fn is_outstanding(&mut self, scheduler: &dyn EndpointTxScheduler) -> bool {
        let Some(handle) = self.outstanding else {
            return false;
        };
        if scheduler
            .status(handle)
            .is_some_and(TxStatus::is_outstanding)
        {
            return true;
        }
        self.outstanding = None;
        false
    }

    /// Report owed at `now_us`, if any.
    pub fn due(&self, now_us: u64) -> Option<ReportKind> {
        if self.next_identify_us.is_some_and(|at| at <= now_us) {
            return Some(ReportKind::Identify);
        }
        (self.next_report_us <= now_us).then_some(ReportKind::Condition)
    }

    /// Submit `packet` and advance the matching deadline on acceptance.
    ///
    /// A busy bus is not an error for an autonomous report: the attempt is
    /// skipped and stays due.
    pub fn submit(
        &mut self,
        now_us: u64,
        scheduler: &mut dyn EndpointTxScheduler,
        packet: MaplePacket,
    ) -> Option<TxHandle> {
        let kind = ReportKind::of(&packet);
        match scheduler.schedule(Transmission::new(packet, false)) {
            Ok(handle) => {
                self.outstanding = Some(handle);
                self.advance(kind, now_us);
                Some(handle)
            }
            Err(e) => {
                trace!(address = %self.address, ?kind, error = %e, "report skipped");
                None
            }
        }
    }

    /// Settle after a terminal callback for `tx`.
    pub fn settle(&mut self, tx: &Transmission) {
        if self.outstanding.is_some_and(|h| h.id() == tx.id()) {
            self.outstanding = None;
        }
        if tx.status() == TxStatus::Failed {
            let kind = ReportKind::of(tx.packet());
            debug!(address = %self.address, ?kind, write_failed = tx.write_failed(), read_failed = tx.read_failed(), "report failed, due again");
            match kind {
                ReportKind::Identify => self.next_identify_us = Some(0),
                ReportKind::Condition => self.next_report_us = 0,
            }
        }
    }

    /// Run one autonomous cycle: submit whichever report is due.
    ///
    /// Returns the kind of report the scheduler accepted, if any.
    pub fn poll(
        &mut self,
        now_us: u64,
        scheduler: &mut dyn EndpointTxScheduler,
        info: &DeviceInfo,
        version: &str,
        condition: &[u32],
    ) -> Option<ReportKind> {
        if self.is_outstanding(&*scheduler) {
            return None;
        }
        let kind = self.due(now_us)?;
        let packet = match kind {
            ReportKind::Identify => self.identification_packet(info, version),
            ReportKind::Condition => self.condition_packet(condition),
        };
        self.submit(now_us, scheduler, packet).map(|_| kind)
    }

    /// Extended device info packet from this address to its host.
    pub fn identification_packet(&self, info: &DeviceInfo, version: &str) -> MaplePacket {
        self.packet(Command::ExtDeviceInfo, &info.to_ext_words(version))
    }

    /// Condition report packet from this address to its host.
    pub fn condition_packet(&self, words: &[u32]) -> MaplePacket {
        self.packet(Command::DataTransfer, words)
    }

    fn packet(&self, command: Command, words: &[u32]) -> MaplePacket {
        let mut packet = MaplePacket::new(command, self.address, self.host());
        for &word in words {
            if packet.payload.push(word).is_err() {
                break;
            }
        }
        packet
    }

    fn advance(&mut self, kind: ReportKind, now_us: u64) {
        match kind {
            ReportKind::Identify => {
                self.next_identify_us = match self.timing.identify_period_us {
                    0 => None,
                    period => Some(compute_next_time_cadence(now_us, period, 0)),
                };
            }
            ReportKind::Condition => {
                self.next_report_us =
                    compute_next_time_cadence(now_us, self.timing.report_period_us, 0);
            }
        }
    }
}

/// Extended version string for a device with `serial`.
pub fn version_string(serial: &str) -> heapless::String<VERSION_LEN> {
    let mut version = heapless::String::new();
    for c in "Version 1.010,SN:"
        .chars()
        .chain(serial.chars().filter(char::is_ascii_graphic))
    {
        if version.push(c).is_err() {
            break;
        }
    }
    version
}
