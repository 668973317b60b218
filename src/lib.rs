//! # Serial Assistant
//!
//! A serial port terminal that streams raw bytes in both directions and shows
//! them as hexadecimal or as GBK/UTF-8 text.
//!
//! ## Features
//!
//! - **Torn-sequence safe decoding**: multi-byte characters split across reads
//!   are held back and completed by the next chunk.
//! - **Lenient hex input**: stray separators are ignored and odd digit counts
//!   are padded instead of rejected.
//! - **Async serial I/O**: a Tokio reader task feeds an ordered channel while
//!   writes are serialized behind a mutex.
//! - **Persisted defaults**: port and codec settings stored as RON.
//!
//! ## Architecture
//!
//! - [`serial`]: codec core, port adapter, worker and session pipeline
//! - [`config`]: persisted defaults
//! - [`terminal`]: console command parsing and output rendering
//! - [`error`]: custom error types for the application

pub mod config;
pub mod error;
pub mod serial;
pub mod terminal;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::error::*;
    pub use crate::serial::{
        ChannelConfig, Charset, DisplayMode, FragmentSink, IncrementalDecoder, PortEvent,
        PortSettings, PortWorker, Session,
    };
}
