//! Maple Bus wire format: packet types, the frame codec and device
//! identification payloads.
//!
//! This crate is I/O-free and allocation-free. Payloads live in a
//! fixed-capacity [`heapless::Vec`] and encoded frames in a stack [`Frame`],
//! so the codec can run on the bus task without touching the heap.
//!
//! A frame on the wire is:
//!
//! | Bytes | Field |
//! |-------|-------|
//! | 0 | command |
//! | 1 | recipient address |
//! | 2 | sender address |
//! | 3 | payload word count `n` |
//! | 4..4+4n | payload words, big-endian |
//! | 4+4n | XOR of every preceding byte |

#![deny(static_mut_refs, clippy::unwrap_used)]

pub mod address;
pub mod command;
pub mod device_info;
pub mod function;
pub mod packet;
pub mod reader;
pub mod timing;

pub use address::{BusAddress, MAX_PLAYERS, MAX_SUB_PERIPHERALS};
pub use command::Command;
pub use device_info::{
    DESCRIPTION_LEN, DEVICE_INFO_WORDS, DeviceInfo, EXT_DEVICE_INFO_WORDS, PRODUCER_LEN,
    REGION_ALL, SEGA_PRODUCER, VERSION_LEN, ext_version, pad_ascii, trim_ascii,
};
pub use function::FunctionCode;
pub use packet::{
    Frame, HEADER_LEN, MAX_FRAME_LEN, MAX_PAYLOAD_WORDS, MIN_FRAME_LEN, MaplePacket, Payload,
    checksum, frame_len,
};
pub use reader::FrameReader;
pub use timing::{
    DEFAULT_READ_TIMEOUT_US, NS_PER_BIT, OPEN_LINE_CHECK_US, RESPONSE_TIMEOUT_US, total_bits,
    tx_time_ns, tx_time_us,
};
