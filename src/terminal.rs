//! # Terminal Module
//!
//! Console front-end helpers: parsing of typed lines into commands and
//! rendering of received fragments to stdout.

use std::io::{self, Write};

use crate::error::{Result, SerialAssistantError};
use crate::serial::encoding::{Charset, DisplayMode};
use crate::serial::session::FragmentSink;

/// A line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Send the line using the current send settings.
    Send(String),
    SetReceiveMode(DisplayMode),
    SetReceiveCharset(Charset),
    SetSendMode(DisplayMode),
    SetSendCharset(Charset),
    Status,
    Quit,
}

impl ConsoleCommand {
    /// Parses one line. Lines not starting with `/` are data; `//` escapes a
    /// leading slash.
    pub fn parse(line: &str) -> Result<Self> {
        let Some(command) = line.strip_prefix('/') else {
            return Ok(ConsoleCommand::Send(line.to_string()));
        };
        if command.starts_with('/') {
            return Ok(ConsoleCommand::Send(command.to_string()));
        }

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();
        match (name, arg) {
            ("rx", Some(mode)) => Ok(ConsoleCommand::SetReceiveMode(mode.parse()?)),
            ("rx-enc", Some(charset)) => Ok(ConsoleCommand::SetReceiveCharset(charset.parse()?)),
            ("tx", Some(mode)) => Ok(ConsoleCommand::SetSendMode(mode.parse()?)),
            ("tx-enc", Some(charset)) => Ok(ConsoleCommand::SetSendCharset(charset.parse()?)),
            ("status", None) => Ok(ConsoleCommand::Status),
            ("quit" | "exit", None) => Ok(ConsoleCommand::Quit),
            _ => Err(SerialAssistantError::invalid_config(format!(
                "unknown command '/{command}', try /rx, /rx-enc, /tx, /tx-enc, /status or /quit"
            ))),
        }
    }
}

/// Writes received fragments to stdout, optionally stamped with local time.
pub struct StdoutSink {
    timestamp: bool,
    at_line_start: bool,
}

impl StdoutSink {
    pub fn new(timestamp: bool) -> Self {
        Self {
            timestamp,
            at_line_start: true,
        }
    }

    /// Inserts a timestamp at the start of every line when enabled.
    pub fn render(&mut self, fragment: &str) -> String {
        if !self.timestamp {
            return fragment.to_string();
        }
        let stamp = chrono::Local::now().format("%H:%M:%S%.3f").to_string();
        self.render_with_stamp(fragment, &stamp)
    }

    fn render_with_stamp(&mut self, fragment: &str, stamp: &str) -> String {
        let mut out = String::with_capacity(fragment.len() + stamp.len() + 3);
        for piece in fragment.split_inclusive('\n') {
            if self.at_line_start {
                out.push('[');
                out.push_str(stamp);
                out.push_str("] ");
            }
            out.push_str(piece);
            self.at_line_start = piece.ends_with('\n');
        }
        out
    }
}

impl FragmentSink for StdoutSink {
    fn append(&mut self, fragment: &str) {
        let rendered = self.render(fragment);
        let mut stdout = io::stdout().lock();
        if let Err(e) = stdout
            .write_all(rendered.as_bytes())
            .and_then(|()| stdout.flush())
        {
            log::error!("Failed to write to stdout: {e}");
        }
    }
}
