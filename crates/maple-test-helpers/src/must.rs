//! Unwrap helpers that replace `unwrap()`/`expect()` in test code.
//!
//! Each helper is `#[track_caller]`, so a failure points at the test line.

use std::fmt::Debug;

use maple_packet::MaplePacket;

/// Unwrap a `Result`, panicking with the error value.
///
/// ```rust
/// use maple_test_helpers::must;
///
/// let value = must(Ok::<_, &str>(42));
/// assert_eq!(value, 42);
/// ```
///
/// # Panics
///
/// Panics if the result is `Err`.
#[track_caller]
pub fn must<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("must: unexpected Err: {e:?}"),
    }
}

/// Unwrap an `Option`, panicking with `msg` if `None`.
///
/// # Panics
///
/// Panics if the option is `None`.
#[track_caller]
pub fn must_some<T>(option: Option<T>, msg: &str) -> T {
    match option {
        Some(v) => v,
        None => panic!("must_some: {msg}"),
    }
}

/// Unwrap a `Result` with a context message.
///
/// # Panics
///
/// Panics if the result is `Err`, with the context and error value.
#[track_caller]
pub fn must_with<T, E: Debug>(result: Result<T, E>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("must_with: {context}: {e:?}"),
    }
}

/// Decode wire bytes that are expected to hold a valid frame.
///
/// ```rust
/// use maple_test_helpers::must_decode;
///
/// let packet = must_decode(&[0x01, 0x20, 0x00, 0x00, 0x21]);
/// assert_eq!(packet.recipient.raw(), 0x20);
/// ```
///
/// # Panics
///
/// Panics with the bytes and the codec error if decoding fails.
#[track_caller]
pub fn must_decode(bytes: &[u8]) -> MaplePacket {
    match MaplePacket::decode(bytes) {
        Ok(packet) => packet,
        Err(e) => panic!("must_decode: {bytes:02X?}: {e}"),
    }
}
