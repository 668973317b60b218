//! # Serial Module
//!
//! Byte-stream handling for one serial session:
//!
//! - [`encoding`]: stateless hex/byte/text conversions
//! - [`decoder`]: incremental GBK/UTF-8 decoding across read boundaries
//! - [`port`]: port settings, enumeration and opening
//! - [`worker`]: background reader and serialized writer
//! - [`session`]: consumer-side routing of received and outbound data

pub mod decoder;
pub mod encoding;
pub mod port;
pub mod session;
pub mod worker;

pub use decoder::IncrementalDecoder;
pub use encoding::{Charset, DisplayMode, bytes_to_hex, hex_to_bytes, text_to_bytes};
pub use port::{PortSettings, list_ports, open_port};
pub use session::{ChannelConfig, FragmentSink, Session};
pub use worker::{PortEvent, PortWorker};
