//! Fuzz testing for the row, key and varint decoders.
//!
//! Stored bytes can be torn or corrupted, so every decoder must reject
//! malformed input with an error rather than panic. Inputs that do decode
//! must re-encode to something that decodes to the same value.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use maho::encoding::key::{format_key, get_key_type, parse_key};
use maho::encoding::row::{decode_row, encode_row};
use maho::encoding::varint::{decode_varint, encode_varint};

#[derive(Debug, Arbitrary)]
enum DecoderInput {
    Row(Vec<u8>),
    Key(Vec<u8>),
    Varint(Vec<u8>),
}

fuzz_target!(|input: DecoderInput| {
    match input {
        DecoderInput::Row(data) => {
            if let Ok(row) = decode_row(&data) {
                let again = decode_row(&encode_row(&row).expect("decoded row re-encodes"))
                    .expect("re-encoded row decodes");
                assert_eq!(row.len(), again.len());
                assert!(row.iter().zip(&again).all(|(a, b)| a.same_as(b)));
            }
        }
        DecoderInput::Key(data) => {
            let _ = format_key(&data);
            let parsed = parse_key(&data);
            let key_type = get_key_type(&data);
            if let Ok(key) = parsed {
                assert_eq!(key_type.ok(), Some(key.key_type));
                let reparsed = parse_key(&key.encode()).expect("re-encoded key parses");
                assert_eq!(reparsed.key_type, key.key_type);
            }
        }
        DecoderInput::Varint(data) => {
            if let Ok((value, len)) = decode_varint(&data) {
                let mut buf = [0u8; 10];
                assert!(encode_varint(value, &mut buf) <= len);
            }
        }
    }
});
