//! Convenience re-exports for common test utilities.
//!
//! ```rust,ignore
//! use maple_test_helpers::prelude::*;
//! ```

pub use crate::must::{must, must_decode, must_some, must_with};

#[cfg(feature = "tracking")]
pub use crate::tracking::{AllocationGuard, TrackingAllocator, track};

#[cfg(feature = "mock")]
pub use crate::mock::{
    Call, MockInput, MockPhysicalBus, RecordingPeripheral, Response, SentFrame, TrackingLock,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
