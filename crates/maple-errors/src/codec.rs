//! Packet codec errors.
//!
//! Codec errors never propagate past the receive path: a frame that fails to
//! decode is treated as "no valid packet received" and surfaces only as a
//! failed read on the owning transmission.

use crate::common::ErrorSeverity;

/// Failure to encode or decode a Maple frame.
///
/// `Copy` so the scheduler can record it without allocating.
///
/// # Examples
///
/// ```
/// use maple_errors::CodecError;
///
/// let err = CodecError::Checksum { expected: 0x3A, actual: 0x3B };
/// assert_eq!(err.code(), 2);
/// assert!(err.is_receive_failure());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum CodecError {
    /// Buffer is shorter than a minimal frame or its length disagrees with
    /// the word count in the header
    #[error("framing error: expected {expected} bytes, got {actual}")]
    Framing {
        /// Length implied by the header (or the minimum frame length)
        expected: usize,
        /// Length actually received
        actual: usize,
    },

    /// Trailing checksum byte does not match the XOR of the frame
    #[error("checksum mismatch: computed {expected:#04x}, received {actual:#04x}")]
    Checksum {
        /// Checksum computed over the received bytes
        expected: u8,
        /// Checksum byte carried by the frame
        actual: u8,
    },

    /// Output buffer cannot hold the encoded frame
    #[error("output buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required
        required: usize,
        /// Bytes available
        available: usize,
    },

    /// Payload exceeds 255 words
    #[error("payload of {0} words exceeds the 255-word limit")]
    PayloadTooLong(usize),
}

impl CodecError {
    /// Numeric error code for compact logging.
    pub fn code(self) -> u8 {
        match self {
            CodecError::Framing { .. } => 1,
            CodecError::Checksum { .. } => 2,
            CodecError::BufferTooSmall { .. } => 3,
            CodecError::PayloadTooLong(_) => 4,
        }
    }

    /// Get the error severity.
    pub fn severity(self) -> ErrorSeverity {
        match self {
            CodecError::Framing { .. } | CodecError::Checksum { .. } => ErrorSeverity::Warning,
            CodecError::BufferTooSmall { .. } | CodecError::PayloadTooLong(_) => {
                ErrorSeverity::Error
            }
        }
    }

    /// True for errors raised while decoding received bytes.
    pub fn is_receive_failure(self) -> bool {
        matches!(self, CodecError::Framing { .. } | CodecError::Checksum { .. })
    }
}
