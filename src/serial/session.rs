//! # Session Module
//!
//! The consumer side of a serial session. Received chunks are rendered as hex
//! or decoded text depending on the receive settings, and outbound input is
//! turned into bytes depending on the send settings. The session owns the
//! only [`IncrementalDecoder`] and is never shared across threads.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::decoder::IncrementalDecoder;
use super::encoding::{Charset, DisplayMode, bytes_to_hex, hex_to_bytes, text_to_bytes};

/// Mode and charset for one direction of traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub mode: DisplayMode,
    pub charset: Charset,
}

impl ChannelConfig {
    #[must_use]
    pub fn new(mode: DisplayMode, charset: Charset) -> Self {
        Self { mode, charset }
    }
}

/// Destination for rendered receive fragments, in arrival order.
#[cfg_attr(test, mockall::automock)]
pub trait FragmentSink {
    /// Appends a non-empty fragment to the receive view.
    fn append(&mut self, fragment: &str);
}

/// Consumer-side pipeline for one open port.
#[derive(Debug, Clone)]
pub struct Session {
    receive: ChannelConfig,
    send: ChannelConfig,
    decoder: IncrementalDecoder,
}

impl Session {
    #[must_use]
    pub fn new(receive: ChannelConfig, send: ChannelConfig) -> Self {
        Self {
            receive,
            send,
            decoder: IncrementalDecoder::new(receive.charset),
        }
    }

    #[must_use]
    pub fn receive_config(&self) -> ChannelConfig {
        self.receive
    }

    #[must_use]
    pub fn send_config(&self) -> ChannelConfig {
        self.send
    }

    /// Bytes the decoder is holding for an unfinished character.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        self.decoder.pending()
    }

    /// Renders one inbound chunk. May be empty while a character is torn.
    pub fn receive(&mut self, chunk: &[u8]) -> String {
        match self.receive.mode {
            DisplayMode::Hex => bytes_to_hex(chunk),
            DisplayMode::Text => self.decoder.decode(chunk, false),
        }
    }

    /// Renders one inbound chunk into `sink`, skipping empty fragments.
    pub fn receive_into<S: FragmentSink + ?Sized>(&mut self, chunk: &[u8], sink: &mut S) {
        let fragment = self.receive(chunk);
        if !fragment.is_empty() {
            sink.append(&fragment);
        }
    }

    /// Turns user input into bytes for the device.
    ///
    /// Returns `None` when there is nothing to send: empty input, or hex input
    /// without a single hex digit.
    #[must_use]
    pub fn prepare_send(&self, input: &str) -> Option<Vec<u8>> {
        if input.is_empty() {
            return None;
        }
        let bytes = match self.send.mode {
            DisplayMode::Hex => hex_to_bytes(input),
            DisplayMode::Text => text_to_bytes(input, self.send.charset),
        };
        if bytes.is_empty() {
            debug!("Nothing to send for input {input:?}");
            return None;
        }
        Some(bytes)
    }

    /// Changes how received data is shown. Resets the decoder.
    pub fn set_receive_mode(&mut self, mode: DisplayMode) {
        self.receive.mode = mode;
        self.decoder.reset();
        info!("Receive mode set to {mode}");
    }

    /// Changes the receive charset. Bytes held for the old charset are dropped.
    pub fn set_receive_charset(&mut self, charset: Charset) {
        self.receive.charset = charset;
        self.decoder.set_encoding(charset);
        info!("Receive charset set to {charset}");
    }

    pub fn set_send_mode(&mut self, mode: DisplayMode) {
        self.send.mode = mode;
        info!("Send mode set to {mode}");
    }

    pub fn set_send_charset(&mut self, charset: Charset) {
        self.send.charset = charset;
        info!("Send charset set to {charset}");
    }

    /// Resolves any held bytes as placeholders. Call once the stream has ended.
    pub fn flush(&mut self) -> String {
        match self.receive.mode {
            DisplayMode::Hex => String::new(),
            DisplayMode::Text => self.decoder.decode(&[], true),
        }
    }

    /// Tears the session down after the port closed or vanished.
    pub fn close(&mut self) {
        self.decoder.reset();
    }
}
