//! Centralized error types for the Dreamlink Maple Bus stack.
//!
//! The stack runs in two contexts: a cooperative task loop and a bus
//! completion boundary that behaves like an interrupt. Errors produced on
//! the hot path ([`CodecError`], [`BusError`]) are `Copy` with stable numeric
//! codes so they can be recorded without allocating. Everything else folds
//! into [`MapleError`] for task-context reporting.
//!
//! - [`codec`]: packet framing and checksum failures
//! - [`bus`]: scheduling and physical-layer rejection
//! - [`peripheral`]: attach/detach and addressing problems
//! - [`config`]: configuration validation
//!
//! # Example
//!
//! ```
//! use maple_errors::prelude::*;
//!
//! fn check_len(len: usize) -> Result<()> {
//!     if len < 5 {
//!         return Err(CodecError::Framing { expected: 5, actual: len }.into());
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_len(3).is_err());
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod bus;
pub mod codec;
pub mod common;
pub mod config;
pub mod peripheral;
pub mod prelude;

pub use bus::BusError;
pub use codec::CodecError;
pub use common::{ErrorCategory, ErrorSeverity, MapleError};
pub use config::ConfigError;
pub use peripheral::PeripheralError;

/// A specialized `Result` type for Maple Bus operations.
pub type Result<T> = std::result::Result<T, MapleError>;

/// A specialized `Result` type for bus scheduling.
pub type BusResult<T = ()> = std::result::Result<T, BusError>;
