//! Handoff between the physical layer's completion signal and the task loop.
//!
//! The physical layer reports outcomes through a [`CompletionPort`] from
//! interrupt-equivalent context. Each call takes the lock, records a flag or
//! copies reply bytes into fixed storage, and returns. Decoding, status
//! changes and peripheral callbacks all happen later on the task loop when
//! the scheduler harvests the cell.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use maple_atomic::{LockCapability, ScopedLock};
use maple_packet::MAX_FRAME_LEN;

const IDLE: u8 = 0;
const WRITING: u8 = 1;
const AWAITING_REPLY: u8 = 2;
const DONE: u8 = 3;

/// Result copied out of the cell by [`CompletionCell::harvest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Outcome {
    pub write_failed: bool,
    pub read_failed: bool,
    pub reply_len: usize,
}

/// Fixed storage for the outcome of the one exchange in flight.
///
/// Every field is only touched with the lock held, so relaxed atomics are
/// enough; they exist to give `&self` access without `unsafe`.
pub struct CompletionCell<L> {
    lock: L,
    phase: AtomicU8,
    expects_reply: AtomicBool,
    write_failed: AtomicBool,
    read_failed: AtomicBool,
    reply_len: AtomicUsize,
    reply: [AtomicU8; MAX_FRAME_LEN],
}

impl<L: LockCapability> CompletionCell<L> {
    pub(crate) fn new(lock: L) -> Self {
        Self {
            lock,
            phase: AtomicU8::new(IDLE),
            expects_reply: AtomicBool::new(false),
            write_failed: AtomicBool::new(false),
            read_failed: AtomicBool::new(false),
            reply_len: AtomicUsize::new(0),
            reply: [const { AtomicU8::new(0) }; MAX_FRAME_LEN],
        }
    }

    /// Prepare for a new exchange. Called by the scheduler before transmit.
    pub(crate) fn arm(&self, expects_reply: bool) {
        let _guard = ScopedLock::new(&self.lock);
        self.expects_reply.store(expects_reply, Ordering::Relaxed);
        self.write_failed.store(false, Ordering::Relaxed);
        self.read_failed.store(false, Ordering::Relaxed);
        self.reply_len.store(0, Ordering::Relaxed);
        self.phase.store(WRITING, Ordering::Relaxed);
    }

    /// Forget an exchange the physical layer refused to start.
    pub(crate) fn disarm(&self) {
        let _guard = ScopedLock::new(&self.lock);
        self.phase.store(IDLE, Ordering::Relaxed);
    }

    /// Take a finished outcome, copying any reply bytes into `out`.
    pub(crate) fn harvest(&self, out: &mut [u8; MAX_FRAME_LEN]) -> Option<Outcome> {
        let _guard = ScopedLock::new(&self.lock);
        if self.phase.load(Ordering::Relaxed) != DONE {
            return None;
        }
        let reply_len = self.reply_len.load(Ordering::Relaxed);
        for (dst, src) in out.iter_mut().zip(&self.reply).take(reply_len) {
            *dst = src.load(Ordering::Relaxed);
        }
        self.phase.store(IDLE, Ordering::Relaxed);
        Some(Outcome {
            write_failed: self.write_failed.load(Ordering::Relaxed),
            read_failed: self.read_failed.load(Ordering::Relaxed),
            reply_len,
        })
    }

    fn finish(&self, write_failed: bool, read_failed: bool) {
        self.write_failed.store(write_failed, Ordering::Relaxed);
        self.read_failed.store(read_failed, Ordering::Relaxed);
        self.phase.store(DONE, Ordering::Relaxed);
    }

    fn on_write_complete(&self) -> bool {
        let _guard = ScopedLock::new(&self.lock);
        if self.phase.load(Ordering::Relaxed) != WRITING {
            return false;
        }
        if self.expects_reply.load(Ordering::Relaxed) {
            self.phase.store(AWAITING_REPLY, Ordering::Relaxed);
        } else {
            self.finish(false, false);
        }
        true
    }

    fn on_write_failed(&self) -> bool {
        let _guard = ScopedLock::new(&self.lock);
        if self.phase.load(Ordering::Relaxed) != WRITING {
            return false;
        }
        self.finish(true, false);
        true
    }

    fn on_reply(&self, bytes: &[u8]) -> bool {
        let _guard = ScopedLock::new(&self.lock);
        let phase = self.phase.load(Ordering::Relaxed);
        let awaiting = phase == AWAITING_REPLY
            || (phase == WRITING && self.expects_reply.load(Ordering::Relaxed));
        if !awaiting {
            return false;
        }
        if bytes.len() > MAX_FRAME_LEN {
            self.finish(false, true);
            return true;
        }
        for (dst, &src) in self.reply.iter().zip(bytes) {
            dst.store(src, Ordering::Relaxed);
        }
        self.reply_len.store(bytes.len(), Ordering::Relaxed);
        self.finish(false, false);
        true
    }

    fn on_read_failed(&self) -> bool {
        let _guard = ScopedLock::new(&self.lock);
        let phase = self.phase.load(Ordering::Relaxed);
        let reading = phase == AWAITING_REPLY
            || (phase == WRITING && self.expects_reply.load(Ordering::Relaxed));
        if !reading {
            return false;
        }
        self.finish(false, true);
        true
    }

    fn is_armed(&self) -> bool {
        let _guard = ScopedLock::new(&self.lock);
        matches!(self.phase.load(Ordering::Relaxed), WRITING | AWAITING_REPLY)
    }
}

impl<L> fmt::Debug for CompletionCell<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionCell")
            .field("phase", &self.phase.load(Ordering::Relaxed))
            .field("reply_len", &self.reply_len.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Handle the physical layer uses to report the outcome of the exchange in
/// flight.
///
/// Every method is bounded, does not allocate, and never calls back into
/// peripheral code. Each returns `false` when nothing was waiting for that
/// signal (no exchange armed, or it already finished), in which case the
/// signal is ignored.
pub struct CompletionPort<L> {
    cell: Arc<CompletionCell<L>>,
}

impl<L> Clone for CompletionPort<L> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<L> fmt::Debug for CompletionPort<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompletionPort").field(&self.cell).finish()
    }
}

impl<L: LockCapability> CompletionPort<L> {
    pub(crate) fn new(cell: Arc<CompletionCell<L>>) -> Self {
        Self { cell }
    }

    /// The write finished on the wire. Completes exchanges that expect no
    /// reply; otherwise starts waiting for one.
    pub fn write_complete(&self) -> bool {
        self.cell.on_write_complete()
    }

    /// The write failed (line busy, no start acknowledgement).
    pub fn write_failed(&self) -> bool {
        self.cell.on_write_failed()
    }

    /// Raw reply bytes were received. They are decoded later on the task loop.
    pub fn reply_received(&self, bytes: &[u8]) -> bool {
        self.cell.on_reply(bytes)
    }

    /// No reply arrived within the response window, or it was cut short.
    pub fn read_failed(&self) -> bool {
        self.cell.on_read_failed()
    }

    /// True while an exchange is waiting for an outcome.
    pub fn is_armed(&self) -> bool {
        self.cell.is_armed()
    }
}
