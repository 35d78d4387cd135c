//! Encode/decode round trips through the filter pipeline.

use pdf_engine::decoders::{
    decode_stream, encode_ascii85, encode_ascii_hex, encode_flate, encode_lzw, encode_run_length, DecodeLimits,
};
use pdf_engine::object::{Dictionary, Object};
use pdf_engine::Error;
use proptest::prelude::*;

fn filter_dict(filters: &[&str]) -> Dictionary {
    let mut dict = Dictionary::new();
    let names = filters.iter().map(|f| Object::name(*f)).collect();
    dict.insert("Filter".to_string(), Object::Array(names));
    dict
}

fn decode(data: &[u8], filters: &[&str]) -> Vec<u8> {
    decode_stream(data, &filter_dict(filters), &DecodeLimits::default())
        .unwrap()
        .data
}

proptest! {
    #[test]
    fn prop_flate_round_trip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let encoded = encode_flate(&data).unwrap();
        prop_assert_eq!(decode(&encoded, &["FlateDecode"]), data);
    }

    #[test]
    fn prop_lzw_round_trip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let encoded = encode_lzw(&data).unwrap();
        prop_assert_eq!(decode(&encoded, &["LZWDecode"]), data);
    }

    #[test]
    fn prop_ascii85_round_trip(data in proptest::collection::vec(any::<u8>(), 0..1024)) {
        prop_assert_eq!(decode(&encode_ascii85(&data), &["ASCII85Decode"]), data);
    }

    #[test]
    fn prop_ascii_hex_round_trip(data in proptest::collection::vec(any::<u8>(), 0..1024)) {
        prop_assert_eq!(decode(&encode_ascii_hex(&data), &["AHx"]), data);
    }

    #[test]
    fn prop_run_length_round_trip(data in proptest::collection::vec(prop_oneof![Just(0u8), Just(7u8), any::<u8>()], 0..2048)) {
        prop_assert_eq!(decode(&encode_run_length(&data), &["RunLengthDecode"]), data);
    }

    #[test]
    fn prop_chained_round_trip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        // Filters are listed in decode order
        let encoded = encode_ascii85(&encode_flate(&data).unwrap());
        prop_assert_eq!(decode(&encoded, &["A85", "Fl"]), data);
    }
}

#[test]
fn test_padding_edge_cases() {
    for len in 0..9 {
        let data: Vec<u8> = (0..len).map(|i| 0xF0 ^ i as u8).collect();
        assert_eq!(decode(&encode_ascii85(&data), &["ASCII85Decode"]), data, "ascii85 len {}", len);
        assert_eq!(decode(&encode_ascii_hex(&data), &["ASCIIHexDecode"]), data, "hex len {}", len);
    }
    // Four zero bytes use the `z` shorthand
    assert_eq!(decode(&encode_ascii85(&[0; 8]), &["ASCII85Decode"]), vec![0; 8]);
}

#[test]
fn test_decompression_limit() {
    let data = vec![b'a'; 1 << 16];
    let encoded = encode_flate(&data).unwrap();
    let limits = DecodeLimits {
        max_size: 1024,
        ..DecodeLimits::default()
    };
    let err = decode_stream(&encoded, &filter_dict(&["FlateDecode"]), &limits).unwrap_err();
    assert!(matches!(err, Error::FilterDecodeFailure { .. }));
}

#[test]
fn test_unknown_filter_fails() {
    let err = decode_stream(b"abc", &filter_dict(&["NoSuchDecode"]), &DecodeLimits::default()).unwrap_err();
    assert!(matches!(err, Error::FilterDecodeFailure { .. } | Error::NotImplemented(_)));
}
