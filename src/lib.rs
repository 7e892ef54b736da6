//! Issue, validate and track 27-digit payment capture lines.
//!
//! The [`line::Codec`] turns a [`line::LineRequest`] into a checksummed
//! [`line::CaptureLine`] and parses candidate codes back into their fields.
//! [`lifecycle`] defines the only legal state changes of an issued line, and
//! [`service::LineService`] drives both against a [`store::LineStore`].

pub mod calendar;
pub mod checksum;
pub mod config;
pub mod error;
pub mod field;
pub mod lifecycle;
pub mod line;
pub mod record;
pub mod service;
pub mod store;
pub mod utils;

pub use config::{CaptureConfig, OverflowPolicy};
pub use error::{CaptureError, ConfigError, LedgerError};
pub use lifecycle::{LineEvent, LineState};
pub use line::{CaptureLine, Codec, DecodedLine, LineRequest};
