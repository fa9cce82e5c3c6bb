//! Property-based tests for the Maple frame codec.

use maple_errors::CodecError;
use maple_packet::{BusAddress, Command, MAX_PAYLOAD_WORDS, MaplePacket, checksum, frame_len};
use proptest::prelude::*;

fn arb_packet() -> impl Strategy<Value = MaplePacket> {
    (
        any::<u8>(),
        any::<u8>(),
        any::<u8>(),
        prop::collection::vec(any::<u32>(), 0..=MAX_PAYLOAD_WORDS),
    )
        .prop_map(|(command, recipient, sender, words)| {
            let mut packet = MaplePacket::new(
                Command::from(command),
                BusAddress(recipient),
                BusAddress(sender),
            );
            for word in words {
                if packet.payload.push(word).is_err() {
                    break;
                }
            }
            packet
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_decode_inverts_encode(packet in arb_packet()) {
        let frame = packet.encode();
        let decoded = MaplePacket::decode(&frame);
        prop_assert_eq!(decoded, Ok(packet));
    }

    #[test]
    fn prop_header_and_checksum_invariants(packet in arb_packet()) {
        let frame = packet.encode();
        prop_assert_eq!(frame.len(), frame_len(packet.payload.len()));
        prop_assert_eq!(usize::from(frame[3]), packet.payload.len());
        let (last, body) = frame.split_last().unwrap();
        prop_assert_eq!(*last, checksum(body));
    }

    #[test]
    fn prop_single_bit_flip_never_decodes(packet in arb_packet(), pick in any::<prop::sample::Index>(), bit in 0u8..8) {
        let mut bytes = packet.encode().to_vec();
        let at = pick.index(bytes.len());
        bytes[at] ^= 1 << bit;
        match MaplePacket::decode(&bytes) {
            Err(CodecError::Checksum { .. }) | Err(CodecError::Framing { .. }) => {}
            other => prop_assert!(false, "flip at byte {at} bit {bit} decoded as {other:?}"),
        }
    }

    #[test]
    fn prop_truncation_is_framing_error(packet in arb_packet(), cut in 1usize..8) {
        let bytes = packet.encode();
        let keep = bytes.len().saturating_sub(cut);
        let result = MaplePacket::decode(&bytes[..keep]);
        prop_assert!(matches!(result, Err(CodecError::Framing { .. })), "got {result:?}");
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        if let Ok(packet) = MaplePacket::decode(&bytes) {
            let frame = packet.encode();
            prop_assert_eq!(frame.as_bytes(), &bytes[..]);
        }
    }
}
