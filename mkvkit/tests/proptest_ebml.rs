//! Property-based tests for EBML primitives and the element tree.

use mkvkit::ebml::{
    decode_element_id, decode_signed_vint, decode_vint, encode_element_id, encode_signed_vint,
    encode_vint, MAX_VINT_LENGTH,
};
use mkvkit::elements::*;
use mkvkit::Node;
use proptest::prelude::*;

/// Largest value a VINT of `length` bytes can hold (all ones is reserved).
fn max_value(length: usize) -> u64 {
    (1u64 << (7 * length)) - 2
}

/// A valid element ID: length marker plus data bits that are not all ones.
fn element_id() -> impl Strategy<Value = u32> {
    (1usize..=4).prop_flat_map(|length| {
        let marker = 1u32 << (7 * length);
        (0..marker - 1).prop_map(move |bits| marker | bits)
    })
}

fn info_node() -> impl Strategy<Value = Node> {
    (
        "[a-zA-Z0-9 ]{0,64}",
        1u64..=10_000_000,
        -1.0e9f64..1.0e9,
        prop::option::of(prop::collection::vec(any::<u8>(), 16)),
    )
        .prop_map(|(title, scale, duration, uid)| {
            let mut children = vec![
                Node::uint(TIMESTAMP_SCALE, scale),
                Node::float(DURATION, duration),
                Node::text(TITLE, title),
                Node::text(MUXING_APP, "mkvkit"),
                Node::text(WRITING_APP, "mkvkit"),
            ];
            if let Some(uid) = uid {
                children.push(Node::binary(SEGMENT_UID, uid));
            }
            Node::master(INFO, children)
        })
}

proptest! {
    /// Every value round-trips through every length that can hold it.
    #[test]
    fn roundtrip_vint(length in 1usize..=MAX_VINT_LENGTH, seed in any::<u64>()) {
        let value = seed % (max_value(length) + 1);
        let bytes = encode_vint(value, length).unwrap();
        prop_assert_eq!(bytes.len(), length);

        let vint = decode_vint(&bytes, 0).unwrap();
        prop_assert_eq!(vint.value, value);
        prop_assert_eq!(vint.length, length);
        prop_assert!(!vint.unknown);
    }

    /// Minimal encodings use the shortest length class.
    #[test]
    fn minimal_vint_length(value in 0u64..=max_value(MAX_VINT_LENGTH)) {
        let bytes = encode_vint(value, 1).unwrap();
        let shorter_fits = bytes.len() > 1 && value <= max_value(bytes.len() - 1);
        prop_assert!(!shorter_fits);
        prop_assert_eq!(decode_vint(&bytes, 0).unwrap().value, value);
    }

    /// ID bytes come back exactly as written, marker bits included.
    #[test]
    fn roundtrip_element_id(id in element_id()) {
        let bytes = encode_element_id(id);
        let (decoded, length) = decode_element_id(&bytes, 0).unwrap();
        prop_assert_eq!(decoded, id);
        prop_assert_eq!(length, bytes.len());
        prop_assert_eq!(encode_element_id(decoded), bytes);
    }

    /// Lace size deltas round-trip.
    #[test]
    fn roundtrip_signed_vint(value in -(1i64 << 40)..(1i64 << 40)) {
        let bytes = encode_signed_vint(value).unwrap();
        let (decoded, length) = decode_signed_vint(&bytes, 0).unwrap();
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(length, bytes.len());
    }

    /// Parsing and re-rendering a tree is byte-identical.
    #[test]
    fn roundtrip_tree(info in info_node()) {
        let bytes = info.render().unwrap();
        let parsed = Node::parse(&bytes, SEGMENT).unwrap();
        prop_assert_eq!(&parsed, &info);
        prop_assert_eq!(parsed.render().unwrap(), bytes);
    }

    /// Fixing mandatory elements twice changes nothing the second time.
    #[test]
    fn fix_mandatory_is_idempotent(
        number in prop::option::of(1u64..100),
        uid in prop::option::of(1u64..u64::MAX),
        codec in prop::option::of("[A-Z_/]{1,16}"),
        lacing in prop::option::of(0u64..=1),
    ) {
        let mut children = Vec::new();
        if let Some(number) = number {
            children.push(Node::uint(TRACK_NUMBER, number));
        }
        if let Some(uid) = uid {
            children.push(Node::uint(TRACK_UID, uid));
        }
        if let Some(codec) = codec {
            children.push(Node::text(CODEC_ID, codec));
        }
        if let Some(lacing) = lacing {
            children.push(Node::uint(FLAG_LACING, lacing));
        }
        let mut once = Node::master(TRACKS, vec![Node::master(TRACK_ENTRY, children)]);
        once.fix_mandatory_elements();
        let mut twice = once.clone();
        twice.fix_mandatory_elements();
        prop_assert_eq!(&twice, &once);
        prop_assert_eq!(twice.render().unwrap(), once.render().unwrap());
    }
}
