//! Fuzzes device info payload parsing.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_device_info
#![no_main]
use libfuzzer_sys::fuzz_target;
use maple_packet::{DeviceInfo, ext_version};

fuzz_target!(|data: &[u8]| {
    let words: Vec<u32> = data
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if let Ok(info) = DeviceInfo::from_words(&words) {
        let _ = info.description_str();
        let _ = info.producer_str();
    }
    let _ = ext_version(&words);
});
