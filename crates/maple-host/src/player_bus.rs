//! One player's bus: its scheduler, the physical wire and the peripherals
//! addressed on it.

use core::fmt;

use maple_atomic::{BusCounterSnapshot, LockCapability};
use maple_errors::{ConfigError, PeripheralError};
use maple_packet::{BusAddress, FunctionCode};
use maple_peripherals::Peripheral;
use maple_scheduler::{
    BusScheduler, CompletionPort, EndpointTxScheduler, PhysicalBus, TxEvent, TxEventKind,
};
use tracing::{debug, info, trace, warn};

use crate::config::PlayerBusConfig;

/// Attach or detach notification from the USB host side.
pub enum UsbEvent {
    /// A device was enumerated and mapped onto this emulated peripheral.
    Attached(Box<dyn Peripheral>),
    /// The device emulated at this address went away.
    Detached(BusAddress),
}

impl fmt::Debug for UsbEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsbEvent::Attached(peripheral) => f
                .debug_tuple("Attached")
                .field(&peripheral.address())
                .finish(),
            UsbEvent::Detached(address) => f.debug_tuple("Detached").field(address).finish(),
        }
    }
}

/// One line of [`PlayerBus::summary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeripheralSummary {
    pub name: &'static str,
    pub address: BusAddress,
    pub function_code: FunctionCode,
    pub function_definition: u32,
}

impl fmt::Display for PeripheralSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} function={:#010x} definition={:#010x}",
            self.address,
            self.name,
            self.function_code.bits(),
            self.function_definition
        )
    }
}

#[derive(Debug)]
struct FailureTracker {
    threshold: u32,
    consecutive: u32,
}

impl FailureTracker {
    fn failed(&mut self, address: BusAddress, write_failed: bool, read_failed: bool) {
        self.consecutive = self.consecutive.saturating_add(1);
        if self.consecutive == self.threshold {
            warn!(
                %address,
                consecutive = self.consecutive,
                write_failed,
                read_failed,
                "primary peripheral keeps failing"
            );
        }
    }

    fn succeeded(&mut self, address: BusAddress) {
        if self.consecutive >= self.threshold {
            info!(%address, after = self.consecutive, "primary peripheral recovered");
        }
        self.consecutive = 0;
    }
}

/// Orchestrates one player slot.
///
/// Each [`task`](Self::task) harvests the completion boundary, delivers
/// lifecycle callbacks, runs every peripheral once (main first, then
/// expansions by slot) and hands the pending transmission to the wire.
pub struct PlayerBus<L, B> {
    config: PlayerBusConfig,
    scheduler: BusScheduler<L>,
    bus: B,
    // Sorted by attach order; the main peripheral, when present, is first.
    peripherals: Vec<Box<dyn Peripheral>>,
    failures: FailureTracker,
}

impl<L: LockCapability, B: PhysicalBus> PlayerBus<L, B> {
    /// Bus for `config.player_index`, guarding completions with `lock`.
    ///
    /// # Errors
    ///
    /// Whatever [`PlayerBusConfig::validate`] rejects.
    pub fn new(config: PlayerBusConfig, lock: L, bus: B) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(player = config.player_index, "player bus created");
        Ok(Self {
            config,
            scheduler: BusScheduler::new(lock),
            bus,
            peripherals: Vec::new(),
            failures: FailureTracker {
                threshold: config.failure_warn_threshold,
                consecutive: 0,
            },
        })
    }

    pub fn config(&self) -> &PlayerBusConfig {
        &self.config
    }

    /// Port the physical layer reports completions through.
    pub fn completion_port(&self) -> CompletionPort<L> {
        self.scheduler.completion_port()
    }

    pub fn scheduler(&self) -> &BusScheduler<L> {
        &self.scheduler
    }

    pub fn counters(&self) -> BusCounterSnapshot {
        self.scheduler.counters()
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Attached peripheral count.
    pub fn len(&self) -> usize {
        self.peripherals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peripherals.is_empty()
    }

    /// Attached addresses in task order.
    pub fn addresses(&self) -> impl Iterator<Item = BusAddress> + '_ {
        self.peripherals.iter().map(|p| p.address())
    }

    pub fn peripheral(&self, address: BusAddress) -> Option<&dyn Peripheral> {
        self.peripherals
            .iter()
            .find(|p| p.address() == address)
            .map(|p| &**p)
    }

    /// Consecutive failed transmissions to the main peripheral.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures.consecutive
    }

    /// Name, address and capabilities of every attached peripheral.
    pub fn summary(&self) -> Vec<PeripheralSummary> {
        self.peripherals
            .iter()
            .map(|p| PeripheralSummary {
                name: p.name(),
                address: p.address(),
                function_code: p.function_code(),
                function_definition: p.function_definition(),
            })
            .collect()
    }

    /// Register a peripheral. Its first task runs on the next cycle.
    ///
    /// # Errors
    ///
    /// - [`PeripheralError::PlayerMismatch`] for another player's address
    /// - [`PeripheralError::InvalidAddress`] for a host or multi-slot address
    /// - [`PeripheralError::AddressInUse`] if the address is taken
    /// - [`PeripheralError::NoPrimary`] for an expansion with no main
    ///   peripheral to plug into
    pub fn attach(&mut self, peripheral: Box<dyn Peripheral>) -> Result<(), PeripheralError> {
        let address = peripheral.address();
        if address.player() != self.config.player_index {
            return Err(PeripheralError::PlayerMismatch {
                expected: self.config.player_index,
                actual: address.player(),
            });
        }
        if !address.is_peripheral() {
            return Err(PeripheralError::InvalidAddress(address.raw()));
        }
        if self.peripherals.iter().any(|p| p.address() == address) {
            return Err(PeripheralError::AddressInUse(address.raw()));
        }
        if !address.is_main() && !self.peripherals.iter().any(|p| p.address().is_main()) {
            return Err(PeripheralError::NoPrimary(address.raw()));
        }

        let order = address.attach_order();
        let index = self
            .peripherals
            .partition_point(|p| p.address().attach_order() < order);
        info!(
            %address,
            name = peripheral.name(),
            function = peripheral.function_code().bits(),
            "peripheral attached"
        );
        self.peripherals.insert(index, peripheral);
        Ok(())
    }

    /// Remove the peripheral at `address`, dropping its pending work.
    /// Removing the main peripheral also removes every expansion behind
    /// it. Returns how many peripherals were removed.
    ///
    /// A transmission already on the wire still completes; its result is
    /// released without a callback.
    ///
    /// # Errors
    ///
    /// [`PeripheralError::NotAttached`] if nothing answers on `address`.
    pub fn detach(&mut self, address: BusAddress) -> Result<usize, PeripheralError> {
        if !self.peripherals.iter().any(|p| p.address() == address) {
            return Err(PeripheralError::NotAttached(address.raw()));
        }
        let before = self.peripherals.len();
        let removing_main = address.is_main();
        let scheduler = &mut self.scheduler;
        self.peripherals.retain(|p| {
            let target = p.address();
            let keep = target != address && !removing_main;
            if !keep {
                let cancelled = scheduler.cancel_by_recipient(target);
                info!(address = %target, name = p.name(), cancelled, "peripheral detached");
            }
            keep
        });
        if removing_main {
            self.failures.consecutive = 0;
        }
        Ok(before.saturating_sub(self.peripherals.len()))
    }

    /// Apply a USB attach/detach notification.
    ///
    /// # Errors
    ///
    /// Those of [`attach`](Self::attach) and [`detach`](Self::detach).
    pub fn handle(&mut self, event: UsbEvent) -> Result<(), PeripheralError> {
        trace!(?event, "usb event");
        match event {
            UsbEvent::Attached(peripheral) => self.attach(peripheral),
            UsbEvent::Detached(address) => self.detach(address).map(|_| ()),
        }
    }

    /// Run one scheduling cycle at `now_us`.
    pub fn task(&mut self, now_us: u64) {
        self.scheduler.service();
        self.deliver();
        for peripheral in &mut self.peripherals {
            peripheral.task(now_us, &mut self.scheduler);
        }
        self.scheduler.dispatch(&mut self.bus);
        self.deliver();
    }

    fn deliver(&mut self) {
        while let Some(event) = self.scheduler.next_event() {
            self.deliver_one(event);
        }
    }

    fn deliver_one(&mut self, event: TxEvent) {
        let owner = self
            .peripherals
            .iter_mut()
            .find(|p| p.address() == event.recipient);

        if event.kind == TxEventKind::Started {
            if let (Some(owner), Some(tx)) = (owner, self.scheduler.get(event.handle)) {
                owner.tx_started(tx);
            }
            return;
        }

        let Some(tx) = self.scheduler.release(event.handle) else {
            return;
        };
        if event.recipient.is_main() {
            if event.kind == TxEventKind::Failed {
                self.failures
                    .failed(event.recipient, tx.write_failed(), tx.read_failed());
            } else {
                self.failures.succeeded(event.recipient);
            }
        }
        let Some(owner) = owner else {
            trace!(id = tx.id(), recipient = %event.recipient, "released result with no owner");
            return;
        };
        if event.kind == TxEventKind::Failed {
            owner.tx_failed(tx.write_failed(), tx.read_failed(), &tx);
        } else {
            owner.tx_complete(tx.reply(), &tx);
        }
    }
}

impl<L, B> fmt::Debug for PlayerBus<L, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addresses: Vec<BusAddress> = self.peripherals.iter().map(|p| p.address()).collect();
        f.debug_struct("PlayerBus")
            .field("config", &self.config)
            .field("peripherals", &addresses)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}
