//! # Encoding Module
//!
//! This module provides the stateless conversions used for both display and
//! transmission: bytes to spaced uppercase hex, a lenient hex parser, and
//! outbound text encoding in GBK or UTF-8.
//!
//! None of these functions can fail. Malformed input degrades to a shorter
//! output or to placeholder substitution, never to an error.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use encoding_rs::{EncoderResult, Encoding};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SerialAssistantError;

/// Character substituted for byte sequences that cannot be decoded.
pub const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Byte substituted for characters the target charset cannot represent.
pub const PLACEHOLDER_BYTE: u8 = b'?';

static NON_HEX_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9a-fA-F]").expect("Invalid regex pattern"));

/// Text encodings supported on the receive and send paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    /// GBK, decoded with the GB18030-compatible WHATWG decoder.
    #[default]
    Gbk,
    /// UTF-8.
    Utf8,
}

impl Charset {
    /// The `encoding_rs` codec backing this charset.
    #[must_use]
    pub fn encoding(self) -> &'static Encoding {
        match self {
            Charset::Gbk => encoding_rs::GBK,
            Charset::Utf8 => encoding_rs::UTF_8,
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Charset::Gbk => write!(f, "GBK"),
            Charset::Utf8 => write!(f, "UTF-8"),
        }
    }
}

impl FromStr for Charset {
    type Err = SerialAssistantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "gbk" => Ok(Charset::Gbk),
            "utf8" => Ok(Charset::Utf8),
            other => Err(SerialAssistantError::encoding(format!(
                "unknown charset '{other}', expected gbk or utf8"
            ))),
        }
    }
}

/// How a direction (receive or send) interprets its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Bytes rendered (or typed) as hexadecimal digits.
    #[default]
    Hex,
    /// Bytes decoded (or encoded) as text in the selected charset.
    Text,
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayMode::Hex => write!(f, "HEX"),
            DisplayMode::Text => write!(f, "TEXT"),
        }
    }
}

impl FromStr for DisplayMode {
    type Err = SerialAssistantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hex" => Ok(DisplayMode::Hex),
            "text" | "txt" => Ok(DisplayMode::Text),
            other => Err(SerialAssistantError::encoding(format!(
                "unknown display mode '{other}', expected hex or text"
            ))),
        }
    }
}

/// Renders each byte as two uppercase hex digits followed by one space.
///
/// # Examples
///
/// ```
/// use serial_assistant::serial::encoding::bytes_to_hex;
///
/// assert_eq!(bytes_to_hex(&[0xAA, 0x0B]), "AA 0B ");
/// assert_eq!(bytes_to_hex(&[]), "");
/// ```
#[must_use]
pub fn bytes_to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for byte in data {
        out.push_str(&hex::encode_upper([*byte]));
        out.push(' ');
    }
    out
}

/// Parses user-typed hex into bytes.
///
/// Every character outside `0-9A-Fa-f` is removed first. An odd digit count
/// gets a trailing `0` nibble, so `"ABC"` yields `[0xAB, 0xC0]`. Pairs that
/// still fail to parse are skipped.
///
/// # Examples
///
/// ```
/// use serial_assistant::serial::encoding::hex_to_bytes;
///
/// assert_eq!(hex_to_bytes("AA BB CC"), vec![0xAA, 0xBB, 0xCC]);
/// assert_eq!(hex_to_bytes("ABC"), vec![0xAB, 0xC0]);
/// assert!(hex_to_bytes("ZZ").is_empty());
/// ```
#[must_use]
pub fn hex_to_bytes(text: &str) -> Vec<u8> {
    let mut digits = NON_HEX_DIGITS.replace_all(text, "").into_owned();
    if !digits.len().is_multiple_of(2) {
        digits.push('0');
    }

    digits
        .as_bytes()
        .chunks(2)
        .filter_map(|pair| match hex::decode(pair) {
            Ok(byte) => byte.first().copied(),
            Err(err) => {
                debug!("Skipping hex pair {pair:?}: {err}");
                None
            }
        })
        .collect()
}

/// Encodes outbound text in `charset`.
///
/// Characters the charset cannot represent are replaced by
/// [`PLACEHOLDER_BYTE`] instead of failing.
///
/// # Examples
///
/// ```
/// use serial_assistant::serial::encoding::{text_to_bytes, Charset};
///
/// assert_eq!(text_to_bytes("你好", Charset::Gbk), vec![0xC4, 0xE3, 0xBA, 0xC3]);
/// assert_eq!(text_to_bytes("Hi", Charset::Utf8), b"Hi".to_vec());
/// ```
#[must_use]
pub fn text_to_bytes(text: &str, charset: Charset) -> Vec<u8> {
    match charset {
        Charset::Utf8 => text.as_bytes().to_vec(),
        Charset::Gbk => encode_with_placeholder(text, charset.encoding()),
    }
}

/// Decodes a whole chunk in one pass, substituting [`REPLACEMENT_CHAR`] for
/// malformed or truncated sequences.
///
/// This does not carry state between calls; see
/// [`IncrementalDecoder`](crate::serial::decoder::IncrementalDecoder) for
/// streaming input.
#[must_use]
pub fn decode_lossy(data: &[u8], charset: Charset) -> String {
    match charset {
        Charset::Utf8 => String::from_utf8_lossy(data).into_owned(),
        Charset::Gbk => {
            let (decoded, _had_errors) = charset.encoding().decode_without_bom_handling(data);
            decoded.into_owned()
        }
    }
}

fn encode_with_placeholder(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    let mut encoder = encoding.new_encoder();
    let mut out = Vec::with_capacity(text.len());
    let mut buffer = [0u8; 1024];
    let mut pending = text;

    loop {
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(pending, &mut buffer, true);
        out.extend_from_slice(&buffer[..written]);
        pending = &pending[read..];
        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(ch) => {
                debug!("{} cannot encode {ch:?}, substituting placeholder", encoding.name());
                out.push(PLACEHOLDER_BYTE);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bytes_to_hex_empty() {
        assert_eq!(bytes_to_hex(b""), "");
    }

    #[test]
    fn test_bytes_to_hex_single() {
        assert_eq!(bytes_to_hex(&[0xAB]), "AB ");
    }

    #[test]
    fn test_bytes_to_hex_uppercase_padded() {
        assert_eq!(bytes_to_hex(&[0x00, 0x0f, 0xff]), "00 0F FF ");
    }

    #[test]
    fn test_hex_to_bytes_with_spaces() {
        assert_eq!(hex_to_bytes("AA BB CC"), vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_hex_to_bytes_invalid_only() {
        assert!(hex_to_bytes("ZZ").is_empty());
        assert!(hex_to_bytes("").is_empty());
        assert!(hex_to_bytes(" \r\n").is_empty());
    }

    #[test]
    fn test_hex_to_bytes_odd_length_pads_trailing_nibble() {
        assert_eq!(hex_to_bytes("ABC"), vec![0xAB, 0xC0]);
        assert_eq!(hex_to_bytes("F"), vec![0xF0]);
    }

    #[test]
    fn test_hex_to_bytes_strips_punctuation() {
        assert_eq!(hex_to_bytes("48,65;6c-6C\n6f"), vec![0x48, 0x65, 0x6C, 0x6C, 0x6F]);
        assert_eq!(hex_to_bytes("48:65:6C"), vec![0x48, 0x65, 0x6C]);
    }

    #[test]
    fn test_hex_to_bytes_mixed_case() {
        assert_eq!(hex_to_bytes("aBcD"), vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_text_to_bytes_gbk() {
        assert_eq!(text_to_bytes("测试", Charset::Gbk), vec![0xB2, 0xE2, 0xCA, 0xD4]);
    }

    #[test]
    fn test_text_to_bytes_utf8() {
        assert_eq!(
            text_to_bytes("测试", Charset::Utf8),
            vec![0xE6, 0xB5, 0x8B, 0xE8, 0xAF, 0x95]
        );
    }

    #[test]
    fn test_text_to_bytes_unmappable_uses_placeholder() {
        let bytes = text_to_bytes("A😀B", Charset::Gbk);
        assert_eq!(bytes, vec![b'A', PLACEHOLDER_BYTE, b'B']);
    }

    #[test]
    fn test_text_to_bytes_unmappable_keeps_neighbours() {
        let bytes = text_to_bytes("你😀好", Charset::Gbk);
        assert_eq!(bytes, vec![0xC4, 0xE3, PLACEHOLDER_BYTE, 0xBA, 0xC3]);
    }

    #[test]
    fn test_decode_lossy_gbk() {
        assert_eq!(decode_lossy(&[0xC4, 0xE3, 0xBA, 0xC3], Charset::Gbk), "你好");
    }

    #[test]
    fn test_decode_lossy_substitutes_truncated_tail() {
        let text = decode_lossy(&[b'o', b'k', 0xE6, 0xB5], Charset::Utf8);
        assert_eq!(text, format!("ok{REPLACEMENT_CHAR}"));
    }

    #[test]
    fn test_charset_from_str() {
        assert_eq!("GBK".parse::<Charset>().unwrap(), Charset::Gbk);
        assert_eq!("utf-8".parse::<Charset>().unwrap(), Charset::Utf8);
        assert_eq!("UTF8".parse::<Charset>().unwrap(), Charset::Utf8);
        assert!("latin1".parse::<Charset>().is_err());
    }

    #[test]
    fn test_display_mode_from_str() {
        assert_eq!("HEX".parse::<DisplayMode>().unwrap(), DisplayMode::Hex);
        assert_eq!("text".parse::<DisplayMode>().unwrap(), DisplayMode::Text);
        assert!("binary".parse::<DisplayMode>().is_err());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Charset::Utf8.to_string(), "UTF-8");
        assert_eq!(DisplayMode::Hex.to_string(), "HEX");
    }

    proptest! {
        #[test]
        fn prop_hex_round_trip(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(hex_to_bytes(&bytes_to_hex(&data)), data);
        }

        #[test]
        fn prop_hex_to_bytes_length_tracks_digit_count(text in ".{0,64}") {
            let digits = text.chars().filter(char::is_ascii_hexdigit).count();
            prop_assert_eq!(hex_to_bytes(&text).len(), digits.div_ceil(2));
        }

        #[test]
        fn prop_text_to_bytes_gbk_never_shorter_than_char_count(text in ".{0,32}") {
            prop_assert!(text_to_bytes(&text, Charset::Gbk).len() >= text.chars().count());
        }
    }
}
