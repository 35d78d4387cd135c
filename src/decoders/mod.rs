//! Stream filter pipeline.
//!
//! Filters are applied left to right as listed in a stream's `/Filter`
//! entry, each with the parameter dictionary at the same position in
//! `/DecodeParms`:
//! - FlateDecode, LZWDecode (external codecs) followed by a PNG/TIFF predictor
//! - ASCIIHexDecode, ASCII85Decode, RunLengthDecode
//! - CCITTFaxDecode (Modified Huffman, Group 3 2-D and Group 4)
//! - DCTDecode and JPXDecode are image codecs: decoding stops there and the
//!   remaining bytes are handed to the image resolver.
//!
//! The text encoders and the Flate/LZW encoders exist for round-trips and for
//! compressing streams on save.

use crate::config::OpenOptions;
use crate::error::{Error, Result};
use crate::object::{Dictionary, DictionaryExt, Object};

mod ascii85;
mod ascii_hex;
mod ccitt;
mod dct;
mod flate;
mod lzw;
mod predictor;
mod runlength;

pub use ascii_hex::{AsciiHexDecoder, encode_ascii_hex};
pub use ascii85::{Ascii85Decoder, encode_ascii85};
pub use ccitt::{CcittFaxDecoder, CcittParams};
pub use dct::{DctDecoder, JpegInfo, decode_jpeg, probe_jpeg};
pub use flate::{FlateDecoder, encode_flate};
pub use lzw::{LzwDecoder, encode_lzw};
pub use predictor::{DecodeParams, decode_predictor};
pub use runlength::{RunLengthDecoder, encode_run_length};

/// PDF stream filter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// FlateDecode (zlib/deflate)
    FlateDecode,
    /// ASCIIHexDecode
    ASCIIHexDecode,
    /// ASCII85Decode
    ASCII85Decode,
    /// LZWDecode
    LZWDecode,
    /// RunLengthDecode
    RunLengthDecode,
    /// CCITTFaxDecode
    CCITTFaxDecode,
    /// DCTDecode (JPEG)
    DCTDecode,
    /// JPXDecode (JPEG 2000)
    JPXDecode,
}

impl Filter {
    /// Look up a filter by its full or abbreviated (inline image) name.
    pub fn from_name(name: &str) -> Option<Filter> {
        Some(match name {
            "FlateDecode" | "Fl" => Filter::FlateDecode,
            "ASCIIHexDecode" | "AHx" => Filter::ASCIIHexDecode,
            "ASCII85Decode" | "A85" => Filter::ASCII85Decode,
            "LZWDecode" | "LZW" => Filter::LZWDecode,
            "RunLengthDecode" | "RL" => Filter::RunLengthDecode,
            "CCITTFaxDecode" | "CCF" => Filter::CCITTFaxDecode,
            "DCTDecode" | "DCT" => Filter::DCTDecode,
            "JPXDecode" => Filter::JPXDecode,
            _ => return None,
        })
    }

    /// Full filter name.
    pub fn name(&self) -> &'static str {
        match self {
            Filter::FlateDecode => "FlateDecode",
            Filter::ASCIIHexDecode => "ASCIIHexDecode",
            Filter::ASCII85Decode => "ASCII85Decode",
            Filter::LZWDecode => "LZWDecode",
            Filter::RunLengthDecode => "RunLengthDecode",
            Filter::CCITTFaxDecode => "CCITTFaxDecode",
            Filter::DCTDecode => "DCTDecode",
            Filter::JPXDecode => "JPXDecode",
        }
    }

    /// Image codecs that the pipeline passes through untouched.
    pub fn is_image_codec(&self) -> bool {
        matches!(self, Filter::DCTDecode | Filter::JPXDecode)
    }
}

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// One stage of a filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStage {
    /// Filter applied at this stage
    pub filter: Filter,
    /// Its `DecodeParms` dictionary (empty when absent or null)
    pub params: Dictionary,
}

/// Read `/Filter` and `/DecodeParms` (or the inline-image `F`/`DP`) from a
/// stream dictionary.
pub fn filter_chain(dict: &Dictionary) -> Result<Vec<FilterStage>> {
    let filters = dict.get("Filter").or_else(|| dict.get("F"));
    let params = dict.get("DecodeParms").or_else(|| dict.get("DP"));

    let names: Vec<&Object> = match filters {
        None | Some(Object::Null) => return Ok(Vec::new()),
        Some(Object::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    };

    let param_at = |i: usize| -> Dictionary {
        match params {
            Some(Object::Array(items)) => items.get(i).and_then(Object::as_dict).cloned().unwrap_or_default(),
            Some(other) if i == 0 => other.as_dict().cloned().unwrap_or_default(),
            _ => Dictionary::new(),
        }
    };

    names
        .into_iter()
        .enumerate()
        .map(|(i, obj)| {
            let name = obj
                .as_name()
                .ok_or_else(|| Error::filter("Filter", format!("filter entry is a {}", obj.type_name())))?;
            let filter = Filter::from_name(name).ok_or_else(|| Error::filter(name, "unsupported filter"))?;
            Ok(FilterStage {
                filter,
                params: param_at(i),
            })
        })
        .collect()
}

/// Security limits applied after every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum output size in bytes (0 = unlimited)
    pub max_size: usize,
    /// Maximum output:input ratio (0 = unlimited)
    pub max_ratio: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self::from(&OpenOptions::default())
    }
}

impl From<&OpenOptions> for DecodeLimits {
    fn from(options: &OpenOptions) -> Self {
        Self {
            max_size: options.max_decompressed_size,
            max_ratio: options.max_decompression_ratio,
        }
    }
}

impl DecodeLimits {
    fn check(&self, filter: Filter, input_len: usize, output_len: usize) -> Result<()> {
        if self.max_size > 0 && output_len > self.max_size {
            return Err(Error::filter(
                filter.name(),
                format!("decompressed size {} exceeds limit {}", output_len, self.max_size),
            ));
        }
        if self.max_ratio > 0 && input_len > 0 {
            let ratio = output_len as u64 / input_len as u64;
            if ratio > self.max_ratio as u64 {
                return Err(Error::filter(
                    filter.name(),
                    format!("decompression ratio {}:1 exceeds limit {}:1", ratio, self.max_ratio),
                ));
            }
        }
        Ok(())
    }
}

/// Output of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStream {
    /// Decoded bytes (still image-codec encoded when `image_codec` is set)
    pub data: Vec<u8>,
    /// Image codec the pipeline stopped at, with its parameters
    pub image_codec: Option<FilterStage>,
}

/// Apply a single filter stage.
pub fn decode(data: &[u8], filter: Filter, params: &Dictionary) -> Result<Vec<u8>> {
    let decoded = match filter {
        Filter::FlateDecode => FlateDecoder.decode(data)?,
        Filter::LZWDecode => LzwDecoder::from_params(params).decode(data)?,
        Filter::ASCIIHexDecode => AsciiHexDecoder.decode(data)?,
        Filter::ASCII85Decode => Ascii85Decoder.decode(data)?,
        Filter::RunLengthDecode => RunLengthDecoder.decode(data)?,
        Filter::CCITTFaxDecode => CcittFaxDecoder::new(CcittParams::from_dict(params)).decode(data)?,
        Filter::DCTDecode => DctDecoder.decode(data)?,
        Filter::JPXDecode => data.to_vec(),
    };

    if matches!(filter, Filter::FlateDecode | Filter::LZWDecode) {
        let predictor = DecodeParams::from_dict(params);
        if predictor.predictor > 1 {
            return decode_predictor(&decoded, &predictor);
        }
    }

    Ok(decoded)
}

/// Decode a stream payload through the chain named in its dictionary.
pub fn decode_stream(data: &[u8], dict: &Dictionary, limits: &DecodeLimits) -> Result<DecodedStream> {
    let chain = filter_chain(dict)?;
    decode_chain(data, &chain, limits)
}

/// Decode through an explicit chain.
pub fn decode_chain(data: &[u8], chain: &[FilterStage], limits: &DecodeLimits) -> Result<DecodedStream> {
    let mut current = data.to_vec();

    for stage in chain {
        if stage.filter.is_image_codec() {
            return Ok(DecodedStream {
                data: current,
                image_codec: Some(stage.clone()),
            });
        }
        let input_len = current.len();
        current = decode(&current, stage.filter, &stage.params)?;
        limits.check(stage.filter, input_len, current.len())?;
    }

    Ok(DecodedStream {
        data: current,
        image_codec: None,
    })
}

/// Decode by filter name, the way callers holding only a name do.
pub fn decode_by_name(data: &[u8], filter_name: &str, params: &Dictionary) -> Result<Vec<u8>> {
    let filter = Filter::from_name(filter_name).ok_or_else(|| Error::filter(filter_name, "unsupported filter"))?;
    decode(data, filter, params)
}

/// Integer parameter with a default.
pub(crate) fn param_int(params: &Dictionary, key: &str, default: i64) -> i64 {
    params.get_int(key).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict;

    #[test]
    fn test_filter_names_and_abbreviations() {
        assert_eq!(Filter::from_name("AHx"), Some(Filter::ASCIIHexDecode));
        assert_eq!(Filter::from_name("CCF"), Some(Filter::CCITTFaxDecode));
        assert_eq!(Filter::from_name("Fl"), Some(Filter::FlateDecode));
        assert_eq!(Filter::from_name("JBIG2Decode"), None);
        assert_eq!(Filter::DCTDecode.name(), "DCTDecode");
    }

    #[test]
    fn test_no_filters_is_identity() {
        let out = decode_stream(b"Hello", &Dictionary::new(), &DecodeLimits::default()).unwrap();
        assert_eq!(out.data, b"Hello");
        assert!(out.image_codec.is_none());
    }

    #[test]
    fn test_unsupported_filter() {
        let d = dict! { "Filter" => Object::name("JBIG2Decode") };
        let err = decode_stream(b"x", &d, &DecodeLimits::default()).unwrap_err();
        assert!(matches!(err, Error::FilterDecodeFailure { .. }));
    }

    #[test]
    fn test_chain_applies_left_to_right() {
        // ASCIIHex of the ASCII85 text for "Test"
        let a85 = encode_ascii85(b"Test");
        let hex = encode_ascii_hex(&a85);
        let d = dict! {
            "Filter" => Object::Array(vec![Object::name("ASCIIHexDecode"), Object::name("ASCII85Decode")]),
        };
        let out = decode_stream(&hex, &d, &DecodeLimits::default()).unwrap();
        assert_eq!(out.data, b"Test");
    }

    #[test]
    fn test_decode_parms_taken_positionally() {
        // One PNG row of 3 bytes behind an ASCIIHex stage
        let flate = encode_flate(&[1, 10, 5, 5]).unwrap();
        let hex = encode_ascii_hex(&flate);
        let d = dict! {
            "Filter" => Object::Array(vec![Object::name("ASCIIHexDecode"), Object::name("FlateDecode")]),
            "DecodeParms" => Object::Array(vec![
                Object::Null,
                Object::Dictionary(dict! { "Predictor" => Object::Integer(12), "Columns" => Object::Integer(3) }),
            ]),
        };
        let out = decode_stream(&hex, &d, &DecodeLimits::default()).unwrap();
        // The row carries a Sub tag
        assert_eq!(out.data, vec![10, 15, 20]);
    }

    #[test]
    fn test_dct_stops_pipeline() {
        let hex = encode_ascii_hex(b"\xFF\xD8\xFF\xD9");
        let d = dict! {
            "Filter" => Object::Array(vec![Object::name("AHx"), Object::name("DCTDecode")]),
        };
        let out = decode_stream(&hex, &d, &DecodeLimits::default()).unwrap();
        assert_eq!(out.data, b"\xFF\xD8\xFF\xD9");
        assert_eq!(out.image_codec.map(|s| s.filter), Some(Filter::DCTDecode));
    }

    #[test]
    fn test_size_limit() {
        let big = vec![0u8; 10_000];
        let flate = encode_flate(&big).unwrap();
        let d = dict! { "Filter" => Object::name("FlateDecode") };
        let limits = DecodeLimits {
            max_size: 1000,
            max_ratio: 0,
        };
        assert!(decode_stream(&flate, &d, &limits).is_err());
    }

    #[test]
    fn test_decode_by_name() {
        assert_eq!(decode_by_name(b"414243>", "ASCIIHexDecode", &Dictionary::new()).unwrap(), b"ABC");
        assert!(decode_by_name(b"", "Nope", &Dictionary::new()).is_err());
    }
}
