//! Shared test utilities for the Maple Bus workspace.
//!
//! # Modules
//!
//! - [`mod@must`] - Unwrap helpers with `#[track_caller]`
//! - [`tracking`] - Allocation tracking for the completion boundary
//! - [`mock`] - Mock physical bus, input sources, lock and peripheral
//! - [`prelude`] - Convenience re-exports
//!
//! Only integration tests (`tests/`) may use this crate: it links the
//! workspace crates as ordinary dependencies.
//!
//! ```rust,ignore
//! use maple_test_helpers::prelude::*;
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::unwrap_used, clippy::panic)]

pub mod must;
pub mod prelude;

#[cfg(feature = "tracking")]
pub mod tracking;

#[cfg(all(test, feature = "tracking"))]
#[global_allocator]
static GLOBAL_TEST: tracking::TrackingAllocator = tracking::TrackingAllocator;

#[cfg(feature = "mock")]
pub mod mock;

pub use must::*;

#[cfg(feature = "tracking")]
pub use tracking::track;
