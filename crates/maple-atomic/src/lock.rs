//! Lock capability guarding state shared with the completion boundary.
//!
//! On hardware the capability is a critical section: taking it in task
//! context masks the bus interrupt, so the completion boundary never finds
//! it held. [`SpinLock`] is the portable implementation used on hosted
//! targets and in tests.

use core::sync::atomic::{AtomicBool, Ordering};

/// Minimal mutual-exclusion capability.
///
/// Callers never pair these by hand; they go through [`ScopedLock`], which
/// releases on every exit path.
pub trait LockCapability {
    /// Block until the lock is held by the caller.
    fn acquire(&self);

    /// Release a lock previously taken with [`acquire`](Self::acquire).
    fn release(&self);
}

impl<L: LockCapability + ?Sized> LockCapability for &L {
    fn acquire(&self) {
        (**self).acquire();
    }

    fn release(&self) {
        (**self).release();
    }
}

/// RAII guard: acquires on construction, releases on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopedLock<'a, L: LockCapability + ?Sized> {
    lock: &'a L,
}

impl<'a, L: LockCapability + ?Sized> ScopedLock<'a, L> {
    /// Acquire `lock` for the lifetime of the returned guard.
    pub fn new(lock: &'a L) -> Self {
        lock.acquire();
        Self { lock }
    }
}

impl<L: LockCapability + ?Sized> Drop for ScopedLock<'_, L> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// Test-and-set spin lock.
#[derive(Debug, Default)]
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    /// Unlocked spin lock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Take the lock if it is free.
    pub fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// True while some guard holds the lock.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl LockCapability for SpinLock {
    fn acquire(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
    }

    fn release(&self) {
        self.locked.store(false, Ordering::Release);
    }
}
