//! Relaxed atomic counters for bus activity.
//!
//! Counters are `AtomicU32` so they work on cores without 64-bit atomics.
//! They wrap on overflow; readers should treat them as rates, not totals.

use core::sync::atomic::{AtomicU32, Ordering};

/// Point-in-time copy returned by [`BusCounters::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusCounterSnapshot {
    /// Transmissions accepted by `schedule`
    pub scheduled: u32,
    /// `schedule` calls rejected because the bus was busy
    pub rejected_busy: u32,
    /// Transmissions handed to the physical layer
    pub dispatched: u32,
    /// Transmissions that reached Succeeded
    pub succeeded: u32,
    /// Transmissions failed on the write
    pub write_failures: u32,
    /// Transmissions failed on the read
    pub read_failures: u32,
    /// Replies that arrived but did not decode
    pub decode_failures: u32,
    /// Pending transmissions cancelled before dispatch
    pub cancelled: u32,
}

impl BusCounterSnapshot {
    /// Transmissions that reached a terminal state.
    #[must_use]
    pub fn completed(&self) -> u32 {
        self.succeeded
            .wrapping_add(self.write_failures)
            .wrapping_add(self.read_failures)
    }
}

/// Bus activity counters.
///
/// All `inc_*` methods are a single relaxed fetch-add and may be called from
/// either execution context.
#[derive(Debug, Default)]
pub struct BusCounters {
    scheduled: AtomicU32,
    rejected_busy: AtomicU32,
    dispatched: AtomicU32,
    succeeded: AtomicU32,
    write_failures: AtomicU32,
    read_failures: AtomicU32,
    decode_failures: AtomicU32,
    cancelled: AtomicU32,
}

impl BusCounters {
    /// All counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            scheduled: AtomicU32::new(0),
            rejected_busy: AtomicU32::new(0),
            dispatched: AtomicU32::new(0),
            succeeded: AtomicU32::new(0),
            write_failures: AtomicU32::new(0),
            read_failures: AtomicU32::new(0),
            decode_failures: AtomicU32::new(0),
            cancelled: AtomicU32::new(0),
        }
    }

    /// Count an accepted `schedule` call.
    #[inline]
    pub fn inc_scheduled(&self) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a `schedule` call rejected with bus busy.
    #[inline]
    pub fn inc_rejected_busy(&self) {
        self.rejected_busy.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a dispatch to the physical layer.
    #[inline]
    pub fn inc_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a successful exchange.
    #[inline]
    pub fn inc_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed write.
    #[inline]
    pub fn inc_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed read.
    #[inline]
    pub fn inc_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a reply that failed to decode. The exchange itself is also
    /// counted as a read failure.
    #[inline]
    pub fn inc_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count `amount` cancelled transmissions.
    #[inline]
    pub fn inc_cancelled_by(&self, amount: u32) {
        self.cancelled.fetch_add(amount, Ordering::Relaxed);
    }

    /// Read every counter. Values are individually exact but not mutually
    /// consistent if updated concurrently.
    #[must_use]
    pub fn snapshot(&self) -> BusCounterSnapshot {
        BusCounterSnapshot {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            rejected_busy: self.rejected_busy.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.scheduled,
            &self.rejected_busy,
            &self.dispatched,
            &self.succeeded,
            &self.write_failures,
            &self.read_failures,
            &self.decode_failures,
            &self.cancelled,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
