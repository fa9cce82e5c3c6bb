//! # maple-atomic
//!
//! Primitives shared between the Maple bus task loop and the completion
//! boundary that runs in interrupt context.
//!
//! - [`lock`] - the two-method lock capability, its scoped guard and a spin
//!   lock implementation
//! - [`counters`] - relaxed atomic counters for bus activity
//!
//! Nothing here allocates, and every operation finishes in bounded time
//! except [`SpinLock::acquire`] under contention.
//!
//! ```rust
//! use maple_atomic::{BusCounters, ScopedLock, SpinLock};
//!
//! let lock = SpinLock::new();
//! let counters = BusCounters::new();
//! {
//!     let _guard = ScopedLock::new(&lock);
//!     counters.inc_dispatched();
//! }
//! assert!(!lock.is_locked());
//! assert_eq!(counters.snapshot().dispatched, 1);
//! ```

#![no_std]
#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]

pub mod counters;
pub mod lock;

pub use counters::{BusCounterSnapshot, BusCounters};
pub use lock::{LockCapability, ScopedLock, SpinLock};
