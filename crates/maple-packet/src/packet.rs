//! [`MaplePacket`] and the frame codec.

use core::fmt;
use core::ops::Deref;

use maple_errors::CodecError;

use crate::reader::FrameReader;
use crate::{BusAddress, Command};

/// Header bytes: command, recipient, sender, word count.
pub const HEADER_LEN: usize = 4;
/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD_WORDS: usize = 255;
/// Header plus checksum, no payload.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + 1;
/// Header, full payload and checksum.
pub const MAX_FRAME_LEN: usize = frame_len(MAX_PAYLOAD_WORDS);

/// Fixed-capacity payload storage.
pub type Payload = heapless::Vec<u32, MAX_PAYLOAD_WORDS>;

/// Encoded length of a frame carrying `word_count` payload words.
pub const fn frame_len(word_count: usize) -> usize {
    HEADER_LEN + word_count * 4 + 1
}

/// Running XOR of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// An encoded frame held on the stack.
#[derive(Clone)]
pub struct Frame {
    bytes: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    fn new() -> Self {
        Self {
            bytes: [0; MAX_FRAME_LEN],
            len: 0,
        }
    }

    // Capacity covers the largest packet, so a push past the end cannot
    // happen for a frame built by `MaplePacket::encode`.
    fn push(&mut self, byte: u8) {
        if let Some(slot) = self.bytes.get_mut(self.len) {
            *slot = byte;
            self.len = self.len.saturating_add(1);
        }
    }

    fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
        }
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.get(..self.len).unwrap_or_default()
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Frame {}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:02X?})", self.as_bytes())
    }
}

/// A single Maple Bus packet.
///
/// # Examples
///
/// ```
/// use maple_packet::{BusAddress, Command, MaplePacket};
///
/// let packet = MaplePacket::with_payload(
///     Command::DataTransfer,
///     BusAddress::main(0),
///     BusAddress::host(0),
///     &[0xFFFF_0000],
/// )?;
/// let frame = packet.encode();
/// assert_eq!(frame.len(), 9);
/// assert_eq!(MaplePacket::decode(&frame)?, packet);
/// # Ok::<(), maple_errors::CodecError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaplePacket {
    /// Operation code
    pub command: Command,
    /// Target address
    pub recipient: BusAddress,
    /// Originating address
    pub sender: BusAddress,
    /// Payload words in transmission order
    pub payload: Payload,
}

impl MaplePacket {
    /// Packet with an empty payload.
    pub fn new(command: Command, recipient: BusAddress, sender: BusAddress) -> Self {
        Self {
            command,
            recipient,
            sender,
            payload: Payload::new(),
        }
    }

    /// Packet carrying a copy of `words`.
    ///
    /// # Errors
    ///
    /// [`CodecError::PayloadTooLong`] if `words` holds more than 255 words.
    pub fn with_payload(
        command: Command,
        recipient: BusAddress,
        sender: BusAddress,
        words: &[u32],
    ) -> Result<Self, CodecError> {
        let payload =
            Payload::from_slice(words).map_err(|()| CodecError::PayloadTooLong(words.len()))?;
        Ok(Self {
            command,
            recipient,
            sender,
            payload,
        })
    }

    /// Number of payload words, as carried in the header.
    pub fn word_count(&self) -> u8 {
        u8::try_from(self.payload.len()).unwrap_or(u8::MAX)
    }

    /// Length of the encoded frame.
    pub fn encoded_len(&self) -> usize {
        frame_len(self.payload.len())
    }

    /// Estimated time to clock this packet onto the wire.
    pub fn tx_time_us(&self) -> u64 {
        crate::timing::tx_time_us(self.payload.len())
    }

    /// Encode to wire bytes. Never fails.
    pub fn encode(&self) -> Frame {
        let mut frame = Frame::new();
        frame.extend(&[
            self.command.code(),
            self.recipient.raw(),
            self.sender.raw(),
            self.word_count(),
        ]);
        for word in &self.payload {
            frame.extend(&word.to_be_bytes());
        }
        let sum = checksum(frame.as_bytes());
        frame.push(sum);
        frame
    }

    /// Encode into a caller-provided buffer, returning the bytes written.
    ///
    /// # Errors
    ///
    /// [`CodecError::BufferTooSmall`] if `out` cannot hold the frame.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize, CodecError> {
        let frame = self.encode();
        let required = frame.len();
        let available = out.len();
        let dest = out
            .get_mut(..required)
            .ok_or(CodecError::BufferTooSmall {
                required,
                available,
            })?;
        dest.copy_from_slice(frame.as_bytes());
        Ok(required)
    }

    /// Decode a complete frame.
    ///
    /// Nothing is returned unless the length and checksum both check out.
    ///
    /// # Errors
    ///
    /// - [`CodecError::Framing`] if the buffer is shorter than a header plus
    ///   checksum, or its length disagrees with the header word count
    /// - [`CodecError::Checksum`] if the trailing byte is not the XOR of the
    ///   preceding bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let actual = bytes.len();
        if actual < MIN_FRAME_LEN {
            return Err(CodecError::Framing {
                expected: MIN_FRAME_LEN,
                actual,
            });
        }

        let mut reader = FrameReader::new(bytes);
        let [command, recipient, sender, count] = reader.read_array::<HEADER_LEN>()?;
        let expected = frame_len(usize::from(count));
        if actual != expected {
            return Err(CodecError::Framing { expected, actual });
        }

        let Some((&carried, body)) = bytes.split_last() else {
            return Err(CodecError::Framing {
                expected,
                actual,
            });
        };
        let computed = checksum(body);
        if computed != carried {
            return Err(CodecError::Checksum {
                expected: computed,
                actual: carried,
            });
        }

        let mut payload = Payload::new();
        for _ in 0..count {
            let word = reader.read_u32_be()?;
            if payload.push(word).is_err() {
                return Err(CodecError::PayloadTooLong(usize::from(count)));
            }
        }

        Ok(Self {
            command: Command::from(command),
            recipient: BusAddress(recipient),
            sender: BusAddress(sender),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition_packet() -> MaplePacket {
        MaplePacket::with_payload(
            Command::DataTransfer,
            BusAddress(0x20),
            BusAddress(0x00),
            &[0xFFFF_0000],
        )
        .unwrap()
    }

    #[test]
    fn test_encode_condition_report() {
        let frame = condition_packet().encode();
        let expected_sum = 0x08 ^ 0x20 ^ 0x00 ^ 0x01 ^ 0xFF ^ 0xFF ^ 0x00 ^ 0x00;
        assert_eq!(
            frame.as_bytes(),
            &[0x08, 0x20, 0x00, 0x01, 0xFF, 0xFF, 0x00, 0x00, expected_sum]
        );
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let mut bytes = [0x08, 0x20, 0x00, 0x01, 0xFF, 0xFF, 0x00, 0x00, 0x00];
        let good = checksum(&bytes[..8]);
        bytes[8] = good ^ 0x01;
        assert_eq!(
            MaplePacket::decode(&bytes),
            Err(CodecError::Checksum {
                expected: good,
                actual: good ^ 0x01
            })
        );
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        assert_eq!(
            MaplePacket::decode(&[0x01, 0x20, 0x00]),
            Err(CodecError::Framing {
                expected: 5,
                actual: 3
            })
        );
        assert!(MaplePacket::decode(&[]).is_err());
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        // header claims two words, only one present
        let mut bytes = [0x08, 0x20, 0x00, 0x02, 0x11, 0x22, 0x33, 0x44, 0x00];
        bytes[8] = checksum(&bytes[..8]);
        assert_eq!(
            MaplePacket::decode(&bytes),
            Err(CodecError::Framing {
                expected: 13,
                actual: 9
            })
        );
    }

    #[test]
    fn test_empty_payload_round_trip() {
        let packet = MaplePacket::new(Command::DeviceInfoRequest, BusAddress(0x20), BusAddress(0x00));
        let frame = packet.encode();
        assert_eq!(frame.as_bytes(), &[0x01, 0x20, 0x00, 0x00, 0x21]);
        assert_eq!(MaplePacket::decode(&frame).unwrap(), packet);
    }

    #[test]
    fn test_payload_limit() {
        let words = [0u32; MAX_PAYLOAD_WORDS + 1];
        assert_eq!(
            MaplePacket::with_payload(Command::BlockWrite, BusAddress(0x01), BusAddress(0x00), &words),
            Err(CodecError::PayloadTooLong(256))
        );
        let full = MaplePacket::with_payload(
            Command::BlockWrite,
            BusAddress(0x01),
            BusAddress(0x00),
            &words[..MAX_PAYLOAD_WORDS],
        )
        .unwrap();
        assert_eq!(full.encode().len(), MAX_FRAME_LEN);
    }

    #[test]
    fn test_encode_into_checks_capacity() {
        let packet = condition_packet();
        let mut small = [0u8; 8];
        assert_eq!(
            packet.encode_into(&mut small),
            Err(CodecError::BufferTooSmall {
                required: 9,
                available: 8
            })
        );
        let mut big = [0u8; 16];
        assert_eq!(packet.encode_into(&mut big), Ok(9));
        assert_eq!(&big[..9], packet.encode().as_bytes());
    }
}
