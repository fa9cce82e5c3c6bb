//! Prelude module for convenient error handling imports.
//!
//! ```
//! use maple_errors::prelude::*;
//!
//! fn submit() -> BusResult {
//!     Err(BusError::BusBusy)
//! }
//!
//! assert_eq!(submit(), Err(BusError::BusBusy));
//! ```

pub use crate::{
    BusResult, Result,
    bus::BusError,
    codec::CodecError,
    common::{ErrorCategory, ErrorSeverity, MapleError},
    config::ConfigError,
    peripheral::PeripheralError,
};
