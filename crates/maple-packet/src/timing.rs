//! Wire timing estimates.
//!
//! The bus clocks one bit every 480 ns. A frame also pays a fixed start and
//! end sequence, and the line has to be checked open before driving it.

/// Nanoseconds per bit on the wire.
pub const NS_PER_BIT: u64 = 480;
/// Time spent confirming the line is idle before a write.
pub const OPEN_LINE_CHECK_US: u64 = 10;
/// Window in which a device must begin replying.
pub const RESPONSE_TIMEOUT_US: u64 = 500;
/// Default budget for receiving a complete reply.
pub const DEFAULT_READ_TIMEOUT_US: u64 = 4_000;

// start sequence plus end sequence
const FRAMING_OVERHEAD_BITS: u64 = 14;

/// Bits in a frame carrying `word_count` payload words: header word,
/// payload words and the checksum byte.
pub fn total_bits(word_count: usize) -> u64 {
    let words = u64::try_from(word_count).unwrap_or(u64::MAX);
    words
        .saturating_add(1)
        .saturating_mul(4)
        .saturating_add(1)
        .saturating_mul(8)
}

/// Nanoseconds to clock out a frame carrying `word_count` payload words.
pub fn tx_time_ns(word_count: usize) -> u64 {
    total_bits(word_count)
        .saturating_add(FRAMING_OVERHEAD_BITS)
        .saturating_mul(NS_PER_BIT)
}

/// [`tx_time_ns`] rounded up to whole microseconds.
pub fn tx_time_us(word_count: usize) -> u64 {
    tx_time_ns(word_count).div_ceil(1_000)
}
