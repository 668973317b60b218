//! # Error Module
//!
//! This module provides custom error types for the `serial_assistant` application.
//! It uses the `thiserror` crate for ergonomic error handling.
//!
//! Only the port boundary produces these errors. The codec functions in
//! [`crate::serial::encoding`] and [`crate::serial::decoder`] are infallible.

use thiserror::Error;

/// Result type alias for `serial_assistant` operations.
pub type Result<T> = std::result::Result<T, SerialAssistantError>;

/// Main error type for the `serial_assistant` application.
#[derive(Debug, Error)]
pub enum SerialAssistantError {
    /// Serial port operation failed.
    #[error("Serial port error: {0}")]
    SerialPort(String),

    /// Failed to open serial port.
    #[error("Failed to open serial port '{port_name}': {reason}")]
    PortOpen { port_name: String, reason: String },

    /// Failed to write to serial port.
    #[error("Failed to write to serial port: {0}")]
    PortWrite(String),

    /// The port has already been closed by the session.
    #[error("Serial port '{0}' is closed")]
    PortClosed(String),

    /// Channel communication error.
    #[error("Channel communication error: {0}")]
    Channel(String),

    /// Unknown encoding or display mode name.
    #[error("Data encoding error: {0}")]
    Encoding(String),

    /// Configuration file could not be parsed or serialized.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O error.
    #[error("File I/O error: {0}")]
    FileIo(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SerialAssistantError {
    /// Creates a new serial port error.
    #[must_use]
    pub fn serial_port(msg: impl Into<String>) -> Self {
        Self::SerialPort(msg.into())
    }

    /// Creates a new port open error.
    #[must_use]
    pub fn port_open(port_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PortOpen {
            port_name: port_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new port write error.
    #[must_use]
    pub fn port_write(msg: impl Into<String>) -> Self {
        Self::PortWrite(msg.into())
    }

    /// Creates a new port closed error.
    #[must_use]
    pub fn port_closed(port_name: impl Into<String>) -> Self {
        Self::PortClosed(port_name.into())
    }

    /// Creates a new channel error.
    #[must_use]
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    /// Creates a new encoding error.
    #[must_use]
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Returns `true` for faults raised by the device itself (open or write),
    /// as opposed to a session that was closed on purpose.
    #[must_use]
    pub fn is_device_fault(&self) -> bool {
        matches!(
            self,
            Self::SerialPort(_) | Self::PortOpen { .. } | Self::PortWrite(_)
        )
    }
}
