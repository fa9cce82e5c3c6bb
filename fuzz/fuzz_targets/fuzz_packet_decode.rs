//! Fuzzes the Maple frame decoder.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_packet_decode
#![no_main]
use libfuzzer_sys::fuzz_target;
use maple_packet::MaplePacket;

fuzz_target!(|data: &[u8]| {
    // Must never panic on arbitrary bytes.
    let Ok(packet) = MaplePacket::decode(data) else {
        return;
    };
    // An accepted frame re-encodes to exactly the bytes it came from.
    let frame = packet.encode();
    assert_eq!(frame.as_bytes(), data);
});
