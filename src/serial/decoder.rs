//! # Incremental Decoder
//!
//! Turns byte chunks of arbitrary size into text, holding back the trailing
//! bytes of a multi-byte character until the rest of it arrives.
//!
//! The decoder walks the combined buffer (carry + new chunk) one sequence at a
//! time using a per-charset lead-byte table. Each step classifies the bytes at
//! the cursor as a complete character, an invalid sequence, or a valid prefix
//! that ran out of input. Only the last kind is kept in the carry buffer, so
//! the carry never holds more than [`MAX_CARRY`] bytes.

use log::{debug, warn};

use super::encoding::{Charset, REPLACEMENT_CHAR, decode_lossy};

/// Upper bound on bytes held between calls: one less than the longest
/// sequence (four bytes) in either charset.
pub const MAX_CARRY: usize = 3;

/// Result of classifying the bytes at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// A whole character of this many bytes.
    Complete(usize),
    /// This many bytes can never start a valid character; emit one placeholder.
    Invalid(usize),
    /// A valid prefix that needs more input.
    Incomplete,
}

/// Faults in the decoder's own bookkeeping. Never escapes [`IncrementalDecoder::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeFault {
    /// A step consumed no bytes.
    Stalled { offset: usize },
    /// The carry buffer holds more than [`MAX_CARRY`] bytes.
    CarryOverflow { len: usize },
}

/// Stateful GBK/UTF-8 decoder for a single receive session.
#[derive(Debug, Clone)]
pub struct IncrementalDecoder {
    charset: Charset,
    carry: Vec<u8>,
}

impl IncrementalDecoder {
    /// Creates a decoder with an empty carry buffer.
    #[must_use]
    pub fn new(charset: Charset) -> Self {
        Self {
            charset,
            carry: Vec::with_capacity(MAX_CARRY),
        }
    }

    /// The active charset.
    #[must_use]
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Bytes currently held back as an incomplete character.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.carry
    }

    /// Switches the active charset.
    ///
    /// Postcondition: the carry buffer is empty. Bytes held for the previous
    /// charset are discarded and never show up in later output.
    pub fn set_encoding(&mut self, charset: Charset) {
        if !self.carry.is_empty() {
            debug!(
                "Discarding {} pending byte(s) on switch {} -> {}",
                self.carry.len(),
                self.charset,
                charset
            );
        }
        self.charset = charset;
        self.carry.clear();
    }

    /// Clears the carry buffer, keeping the charset.
    pub fn reset(&mut self) {
        self.carry.clear();
    }

    /// Decodes `chunk`, prefixed by whatever was carried from the last call.
    ///
    /// A trailing partial character is held back unless `is_final` is set, in
    /// which case it is flushed as a single [`REPLACEMENT_CHAR`]. Invalid
    /// sequences always become [`REPLACEMENT_CHAR`]. This never fails: if the
    /// decoder's own state goes wrong it resets and decodes `chunk` on its own.
    ///
    /// # Examples
    ///
    /// ```
    /// use serial_assistant::serial::decoder::IncrementalDecoder;
    /// use serial_assistant::serial::encoding::Charset;
    ///
    /// let mut decoder = IncrementalDecoder::new(Charset::Utf8);
    /// // "测" is E6 B5 8B; the first read stops after two bytes.
    /// assert_eq!(decoder.decode(&[0xE6, 0xB5], false), "");
    /// assert_eq!(decoder.decode(&[0x8B, b'!'], false), "测!");
    /// ```
    pub fn decode(&mut self, chunk: &[u8], is_final: bool) -> String {
        match self.try_decode(chunk, is_final) {
            Ok(text) => text,
            Err(fault) => {
                warn!("{} decoder fault {fault:?}, resetting", self.charset);
                self.reset();
                decode_lossy(chunk, self.charset)
            }
        }
    }

    fn try_decode(&mut self, chunk: &[u8], is_final: bool) -> Result<String, DecodeFault> {
        if self.carry.len() > MAX_CARRY {
            return Err(DecodeFault::CarryOverflow {
                len: self.carry.len(),
            });
        }

        let mut buffer = std::mem::take(&mut self.carry);
        buffer.extend_from_slice(chunk);

        let mut text = String::with_capacity(buffer.len());
        let mut pos = 0;
        while pos < buffer.len() {
            let rest = &buffer[pos..];
            match scan(self.charset, rest) {
                Step::Complete(0) | Step::Invalid(0) => {
                    return Err(DecodeFault::Stalled { offset: pos });
                }
                Step::Complete(len) => {
                    push_sequence(self.charset, &rest[..len], &mut text);
                    pos += len;
                }
                Step::Invalid(len) => {
                    text.push(REPLACEMENT_CHAR);
                    pos += len;
                }
                Step::Incomplete if is_final => {
                    text.push(REPLACEMENT_CHAR);
                    pos = buffer.len();
                }
                Step::Incomplete => break,
            }
        }

        buffer.drain(..pos);
        self.carry = buffer;
        Ok(text)
    }
}

fn push_sequence(charset: Charset, seq: &[u8], out: &mut String) {
    if let [byte] = seq
        && byte.is_ascii()
    {
        out.push(char::from(*byte));
        return;
    }
    out.push_str(&decode_lossy(seq, charset));
}

fn scan(charset: Charset, bytes: &[u8]) -> Step {
    match charset {
        Charset::Utf8 => scan_utf8(bytes),
        Charset::Gbk => scan_gbk(bytes),
    }
}

/// Total length and accepted range of the second byte for a UTF-8 lead byte.
fn utf8_lead(lead: u8) -> Option<(usize, u8, u8)> {
    match lead {
        0x00..=0x7F => Some((1, 0, 0)),
        0xC2..=0xDF => Some((2, 0x80, 0xBF)),
        0xE0 => Some((3, 0xA0, 0xBF)),
        0xE1..=0xEC | 0xEE..=0xEF => Some((3, 0x80, 0xBF)),
        0xED => Some((3, 0x80, 0x9F)),
        0xF0 => Some((4, 0x90, 0xBF)),
        0xF1..=0xF3 => Some((4, 0x80, 0xBF)),
        0xF4 => Some((4, 0x80, 0x8F)),
        _ => None,
    }
}

fn scan_utf8(bytes: &[u8]) -> Step {
    let Some(&lead) = bytes.first() else {
        return Step::Incomplete;
    };
    let Some((len, second_lo, second_hi)) = utf8_lead(lead) else {
        return Step::Invalid(1);
    };

    for index in 1..len {
        let Some(&byte) = bytes.get(index) else {
            return Step::Incomplete;
        };
        let (lo, hi) = if index == 1 {
            (second_lo, second_hi)
        } else {
            (0x80, 0xBF)
        };
        if !(lo..=hi).contains(&byte) {
            return Step::Invalid(index);
        }
    }
    Step::Complete(len)
}

// GBK as decoded by the WHATWG "gbk" decoder: single bytes 0x00..=0x80,
// two-byte pairs led by 0x81..=0xFE, and GB18030 four-byte sequences
// whose second and fourth bytes are ASCII digits.
fn scan_gbk(bytes: &[u8]) -> Step {
    let Some(&lead) = bytes.first() else {
        return Step::Incomplete;
    };
    match lead {
        0x00..=0x80 => return Step::Complete(1),
        0xFF => return Step::Invalid(1),
        _ => {}
    }

    match bytes.get(1) {
        None => Step::Incomplete,
        Some(0x40..=0x7E | 0x80..=0xFE) => Step::Complete(2),
        Some(0x30..=0x39) => match (bytes.get(2), bytes.get(3)) {
            (None, _) => Step::Incomplete,
            (Some(0x81..=0xFE), None) => Step::Incomplete,
            (Some(0x81..=0xFE), Some(0x30..=0x39)) => Step::Complete(4),
            _ => Step::Invalid(1),
        },
        Some(_) => Step::Invalid(1),
    }
}
