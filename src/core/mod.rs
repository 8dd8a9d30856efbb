//! Core types for serial command exchanges
//!
//! Errors, settings and the frame types shared by the extraction engine and
//! the command executor.

pub mod config;
pub mod error;
pub mod serde;
pub mod types;

pub use self::config::{FlowControl, LineSettings, Parity, Settings, StopBits};
pub use self::error::{Error, Result};
pub use self::types::{ArrivalKind, Extracted, ResultData};
