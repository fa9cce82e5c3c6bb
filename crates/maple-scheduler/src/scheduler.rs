//! Per-bus transmission scheduler.
//!
//! [`BusScheduler`] owns a small fixed table of transmissions and enforces
//! single-in-flight: at most one entry is Pending or Sent at any time.
//! Everything here runs on the cooperative task loop. The only state shared
//! with interrupt context is the [`CompletionCell`], reached through the
//! lock capability.

use std::sync::Arc;

use maple_atomic::{BusCounterSnapshot, BusCounters, LockCapability};
use maple_errors::BusError;
use maple_packet::{BusAddress, MAX_FRAME_LEN, MaplePacket};
use tracing::{debug, trace, warn};

use crate::completion::{CompletionCell, CompletionPort, Outcome};
use crate::transmission::{Transmission, TxHandle, TxStatus};

/// Slots in the transmission table: one in flight plus terminal entries
/// waiting for their owner's callback.
pub const TX_TABLE_CAPACITY: usize = 4;
/// Lifecycle events buffered between `service` and delivery.
pub const EVENT_QUEUE_CAPACITY: usize = 8;

/// Physical bus collaborator.
///
/// `transmit` starts an asynchronous exchange; its outcome is reported later
/// through the [`CompletionPort`] handed out by the scheduler.
pub trait PhysicalBus {
    /// Begin writing `frame`, then read a reply if `expects_reply`.
    ///
    /// # Errors
    ///
    /// [`BusError::PhysicalLayerRejected`] (or any other [`BusError`]) if
    /// the write cannot start now. The transmission stays Pending and is
    /// retried on the next dispatch.
    fn transmit(&mut self, frame: &[u8], expects_reply: bool) -> Result<(), BusError>;
}

impl<B: PhysicalBus + ?Sized> PhysicalBus for &mut B {
    fn transmit(&mut self, frame: &[u8], expects_reply: bool) -> Result<(), BusError> {
        (**self).transmit(frame, expects_reply)
    }
}

/// Capability a peripheral uses to submit work to its bus.
pub trait EndpointTxScheduler {
    /// Accept `tx` if nothing else on the bus is Pending or Sent.
    ///
    /// # Errors
    ///
    /// - [`BusError::BusBusy`] while another transmission is outstanding
    /// - [`BusError::TableFull`] if completed transmissions have not been
    ///   released yet
    fn schedule(&mut self, tx: Transmission) -> Result<TxHandle, BusError>;

    /// Status of a scheduled transmission, `None` once released.
    fn status(&self, handle: TxHandle) -> Option<TxStatus>;

    /// Drop a transmission that is still Pending. Sent ones cannot be
    /// recalled; returns whether anything was cancelled.
    fn cancel(&mut self, handle: TxHandle) -> bool;

    /// Drop every Pending transmission addressed to `recipient`.
    fn cancel_by_recipient(&mut self, recipient: BusAddress) -> u32;

    /// Number of outstanding transmissions addressed to `recipient`.
    fn count_recipients(&self, recipient: BusAddress) -> u32;

    /// True when nothing is Pending or Sent.
    fn is_idle(&self) -> bool;
}

/// What happened to a transmission, queued for delivery to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEventKind {
    /// Handed to the physical layer
    Started,
    /// Reached Failed
    Failed,
    /// Reached Succeeded
    Completed,
}

/// Lifecycle notification for one transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxEvent {
    /// Transmission the event concerns
    pub handle: TxHandle,
    /// Recipient of that transmission, for routing to its owner
    pub recipient: BusAddress,
    /// What happened
    pub kind: TxEventKind,
}

impl TxEvent {
    /// True for Failed and Completed.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, TxEventKind::Started)
    }
}

/// Single-in-flight scheduler for one half-duplex bus.
pub struct BusScheduler<L> {
    table: [Option<Transmission>; TX_TABLE_CAPACITY],
    events: heapless::Deque<TxEvent, EVENT_QUEUE_CAPACITY>,
    cell: Arc<CompletionCell<L>>,
    rx_buffer: [u8; MAX_FRAME_LEN],
    next_id: u32,
    counters: BusCounters,
}

impl<L: LockCapability> BusScheduler<L> {
    /// Scheduler whose completion boundary is guarded by `lock`.
    pub fn new(lock: L) -> Self {
        Self {
            table: core::array::from_fn(|_| None),
            events: heapless::Deque::new(),
            cell: Arc::new(CompletionCell::new(lock)),
            rx_buffer: [0; MAX_FRAME_LEN],
            next_id: 1,
            counters: BusCounters::new(),
        }
    }

    /// Port for the physical layer to report completions through.
    pub fn completion_port(&self) -> CompletionPort<L> {
        CompletionPort::new(Arc::clone(&self.cell))
    }

    /// Snapshot of the bus counters.
    pub fn counters(&self) -> BusCounterSnapshot {
        self.counters.snapshot()
    }

    /// Transmission behind `handle`, if it has not been released.
    pub fn get(&self, handle: TxHandle) -> Option<&Transmission> {
        self.table
            .get(usize::from(handle.slot))?
            .as_ref()
            .filter(|tx| tx.id == handle.id)
    }

    /// Handle of the Pending or Sent transmission, if any.
    pub fn outstanding(&self) -> Option<TxHandle> {
        self.find(|tx| tx.status().is_outstanding())
    }

    /// Hand the Pending transmission to `bus`.
    ///
    /// On success the transmission becomes Sent and a Started event is
    /// queued. If the physical layer refuses, it stays Pending for the next
    /// call. Returns the handle that went out, if any.
    pub fn dispatch<B: PhysicalBus + ?Sized>(&mut self, bus: &mut B) -> Option<TxHandle> {
        let handle = self.find(|tx| tx.status() == TxStatus::Pending)?;
        let slot = self.table.get_mut(usize::from(handle.slot))?.as_mut()?;

        let frame = slot.packet().encode();
        self.cell.arm(slot.expects_reply());
        if let Err(e) = bus.transmit(&frame, slot.expects_reply()) {
            self.cell.disarm();
            debug!(id = handle.id, recipient = %slot.recipient(), error = %e, "transmit refused, retrying next cycle");
            return None;
        }

        slot.mark_sent();
        let recipient = slot.recipient();
        self.counters.inc_dispatched();
        trace!(id = handle.id, %recipient, bytes = frame.len(), "transmission sent");
        self.push_event(TxEvent {
            handle,
            recipient,
            kind: TxEventKind::Started,
        });
        Some(handle)
    }

    /// Harvest the completion boundary and settle the Sent transmission.
    ///
    /// Reply decoding happens here, outside the lock. A reply that fails to
    /// decode fails the transmission as a read failure.
    pub fn service(&mut self) {
        let Some(outcome) = self.cell.harvest(&mut self.rx_buffer) else {
            return;
        };
        let Some(handle) = self.find(|tx| tx.status() == TxStatus::Sent) else {
            trace!("completion with nothing in flight, ignoring");
            return;
        };
        let reply = self.reply_from(&outcome, handle);
        let Some(slot) = self
            .table
            .get_mut(usize::from(handle.slot))
            .and_then(Option::as_mut)
        else {
            return;
        };

        let kind = match reply {
            Settle::WriteFailed => {
                slot.fail(true, false);
                self.counters.inc_write_failure();
                TxEventKind::Failed
            }
            Settle::ReadFailed => {
                slot.fail(false, true);
                self.counters.inc_read_failure();
                TxEventKind::Failed
            }
            Settle::Succeeded(reply) => {
                slot.succeed(reply);
                self.counters.inc_succeeded();
                TxEventKind::Completed
            }
        };
        let recipient = slot.recipient();
        trace!(id = handle.id, %recipient, ?kind, "transmission settled");
        self.push_event(TxEvent {
            handle,
            recipient,
            kind,
        });
    }

    /// Next lifecycle event in submission order.
    pub fn next_event(&mut self) -> Option<TxEvent> {
        self.events.pop_front()
    }

    /// Remove a terminal transmission after its owner has seen the callback.
    pub fn release(&mut self, handle: TxHandle) -> Option<Transmission> {
        let entry = self.table.get_mut(usize::from(handle.slot))?;
        if entry
            .as_ref()
            .is_some_and(|tx| tx.id == handle.id && tx.status().is_terminal())
        {
            return entry.take();
        }
        None
    }

    /// Drop every Pending transmission.
    ///
    /// Sent and terminal entries are untouched, and so are their queued
    /// events: a settled transmission still reaches its owner and is
    /// released through the normal delivery path.
    pub fn cancel_all(&mut self) -> u32 {
        let cancelled = self.remove_pending(|_| true);
        self.retain_live_events();
        cancelled
    }

    fn reply_from(&self, outcome: &Outcome, handle: TxHandle) -> Settle {
        if outcome.write_failed {
            return Settle::WriteFailed;
        }
        if outcome.read_failed {
            return Settle::ReadFailed;
        }
        let expects_reply = self.get(handle).is_some_and(Transmission::expects_reply);
        if !expects_reply {
            return Settle::Succeeded(None);
        }
        let bytes = self.rx_buffer.get(..outcome.reply_len).unwrap_or_default();
        match MaplePacket::decode(bytes) {
            Ok(packet) => Settle::Succeeded(Some(packet)),
            Err(e) => {
                self.counters.inc_decode_failure();
                debug!(id = handle.id, error = %e, "reply did not decode");
                Settle::ReadFailed
            }
        }
    }

    fn find(&self, pred: impl Fn(&Transmission) -> bool) -> Option<TxHandle> {
        self.table.iter().enumerate().find_map(|(slot, entry)| {
            let tx = entry.as_ref().filter(|tx| pred(tx))?;
            Some(TxHandle {
                slot: u8::try_from(slot).ok()?,
                id: tx.id,
            })
        })
    }

    fn remove_pending(&mut self, pred: impl Fn(&Transmission) -> bool) -> u32 {
        let mut cancelled = 0u32;
        for entry in &mut self.table {
            if entry
                .as_ref()
                .is_some_and(|tx| tx.status() == TxStatus::Pending && pred(tx))
            {
                *entry = None;
                cancelled = cancelled.saturating_add(1);
            }
        }
        if cancelled > 0 {
            self.counters.inc_cancelled_by(cancelled);
        }
        cancelled
    }

    fn retain_live_events(&mut self) {
        let queued = self.events.len();
        for _ in 0..queued {
            let Some(event) = self.events.pop_front() else {
                break;
            };
            if self.get(event.handle).is_some() && self.events.push_back(event).is_err() {
                warn!(id = event.handle.id, "event queue full while retaining events");
            }
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = match self.next_id.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        id
    }

    fn push_event(&mut self, event: TxEvent) {
        if let Err(event) = self.events.push_back(event) {
            let evicted = self.events.pop_front();
            warn!(?evicted, "event queue full, dropping oldest event");
            if self.events.push_back(event).is_err() {
                warn!("event queue still full after eviction");
            }
        }
    }
}

enum Settle {
    WriteFailed,
    ReadFailed,
    Succeeded(Option<MaplePacket>),
}

impl<L: LockCapability> EndpointTxScheduler for BusScheduler<L> {
    fn schedule(&mut self, mut tx: Transmission) -> Result<TxHandle, BusError> {
        if let Some(busy) = self.outstanding() {
            self.counters.inc_rejected_busy();
            trace!(outstanding = busy.id, recipient = %tx.recipient(), "bus busy, rejecting");
            return Err(BusError::BusBusy);
        }
        let free = self
            .table
            .iter()
            .position(Option::is_none)
            .ok_or(BusError::TableFull)?;
        let Ok(slot) = u8::try_from(free) else {
            return Err(BusError::TableFull);
        };

        tx.id = self.allocate_id();
        let handle = TxHandle { slot, id: tx.id };
        trace!(id = tx.id, recipient = %tx.recipient(), command = ?tx.packet().command, "transmission scheduled");
        if let Some(entry) = self.table.get_mut(free) {
            *entry = Some(tx);
        }
        self.counters.inc_scheduled();
        Ok(handle)
    }

    fn status(&self, handle: TxHandle) -> Option<TxStatus> {
        self.get(handle).map(Transmission::status)
    }

    fn cancel(&mut self, handle: TxHandle) -> bool {
        self.remove_pending(|tx| tx.id == handle.id) > 0
    }

    fn cancel_by_recipient(&mut self, recipient: BusAddress) -> u32 {
        self.remove_pending(|tx| tx.recipient() == recipient)
    }

    fn count_recipients(&self, recipient: BusAddress) -> u32 {
        let count = self
            .table
            .iter()
            .flatten()
            .filter(|tx| tx.recipient() == recipient && tx.status().is_outstanding())
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn is_idle(&self) -> bool {
        self.outstanding().is_none()
    }
}

impl<L> core::fmt::Debug for BusScheduler<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BusScheduler")
            .field("table", &self.table)
            .field("events", &self.events.len())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}
