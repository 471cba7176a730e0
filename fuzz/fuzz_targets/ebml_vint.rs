#![no_main]

//! Fuzz target for EBML variable-length integers and element headers.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mkvkit::ebml;
use mkvkit::ElementHeader;
use std::io::Cursor;

#[derive(Arbitrary, Debug)]
enum VintOperation {
    DecodeVint,
    DecodeElementId,
    DecodeSignedVint,
    ReadElementHeader,
    VintRoundtrip { value: u64, min_length: u8 },
    IdRoundtrip { id: u32 },
}

#[derive(Arbitrary, Debug)]
struct VintInput {
    data: Vec<u8>,
    offset: u8,
    operation: VintOperation,
}

fuzz_target!(|input: VintInput| {
    let offset = u64::from(input.offset);
    match input.operation {
        VintOperation::DecodeVint => {
            if let Ok(vint) = ebml::decode_vint(&input.data, offset) {
                assert!((1..=ebml::MAX_VINT_LENGTH).contains(&vint.length));
            }
        }
        VintOperation::DecodeElementId => {
            if let Ok((id, length)) = ebml::decode_element_id(&input.data, offset) {
                assert_eq!(ebml::encode_element_id(id).len(), length);
            }
        }
        VintOperation::DecodeSignedVint => {
            let _ = ebml::decode_signed_vint(&input.data, offset);
        }
        VintOperation::ReadElementHeader => {
            let mut cursor = Cursor::new(&input.data);
            if let Ok(header) = ElementHeader::read(&mut cursor) {
                assert!(header.header_size <= 4 + ebml::MAX_VINT_LENGTH);
            }
        }
        VintOperation::VintRoundtrip { value, min_length } => {
            let min_length = usize::from(min_length % 8) + 1;
            if let Ok(bytes) = ebml::encode_vint(value, min_length) {
                let vint = ebml::decode_vint(&bytes, 0).expect("encoded VINT must decode");
                assert_eq!(vint.value, value, "VINT round-trip mismatch");
                assert_eq!(vint.length, bytes.len());
                assert!(!vint.unknown);
            }
        }
        VintOperation::IdRoundtrip { id } => {
            let bytes = ebml::encode_element_id(id);
            if let Ok((decoded, _)) = ebml::decode_element_id(&bytes, 0) {
                assert_eq!(ebml::encode_element_id(decoded), bytes, "ID bytes changed");
            }
        }
    }
});
