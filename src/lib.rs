//! Serial Exchange: retrying command/response engine for serial devices
//!
//! This library turns a noisy, interrupt-driven byte stream into validated
//! response frames, and a caller's command into a write with bounded retries.
//!
//! ```no_run
//! use serial_exchange::{Settings, Session, SerialTransport};
//! # use serial_exchange::{ArrivalKind, Device, Extracted, framing::{Extractor, HeaderLengthExtractor}};
//! # use bytes::Bytes;
//! # struct Meter(HeaderLengthExtractor);
//! # impl Extractor for Meter {
//! #     fn extract(&self, kind: ArrivalKind, buf: &[u8]) -> Option<Extracted> { self.0.extract(kind, buf) }
//! # }
//! # impl Device for Meter {
//! #     fn name(&self) -> &str { "meter" }
//! #     fn make_command(&self, a: u8, c: u8, body: &[u8]) -> Bytes { [&[a, c][..], body].concat().into() }
//! #     fn validate_frame(&self, frame: &[u8]) -> bool { !frame.is_empty() }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> serial_exchange::Result<()> {
//!     let settings = Settings::default();
//!     let transport = SerialTransport::new(settings.clone());
//!     let meter = Meter(HeaderLengthExtractor::new([0xAA, 0x55]));
//!
//!     let session = Session::new(settings, transport, meter)?;
//!     session.open().await?;
//!     session.clear_results();
//!     let reading = session.execute(0x03, &[], |payload| payload.len() == 4).await?;
//!     println!("reading: {:02X?}", reading);
//!     session.close().await
//! }
//! ```

pub mod core;
pub mod device;
pub mod exchange;
pub mod framing;
pub mod transport;
pub mod util;

// Re-export commonly used items
pub use crate::core::{ArrivalKind, Error, Extracted, ResultData, Result, Settings};
pub use crate::device::Device;
pub use crate::exchange::{CommandExecutor, Session};
pub use crate::transport::{MemoryTransport, SerialTransport, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
