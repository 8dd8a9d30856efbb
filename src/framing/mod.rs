//! Stream framing
//!
//! Accumulates raw bytes from the transport, recognises complete frames with a
//! pluggable [`Extractor`] and hands them to the executor through the
//! [`ResultQueue`].

pub mod engine;
pub mod extractors;
pub mod queue;

pub use self::engine::FrameEngine;
pub use self::extractors::{DecoderExtractor, HeaderLengthExtractor};
pub use self::queue::ResultQueue;

use crate::core::{ArrivalKind, Extracted};

/// Recognises a complete frame at the front of the accumulation buffer
///
/// Implementations must be pure: the same `(kind, buffer)` always yields the
/// same answer, and `consumed` never exceeds `buffer.len()`. Leading noise is
/// dropped by returning [`Extracted::discard`].
pub trait Extractor: Send + Sync {
    fn extract(&self, kind: ArrivalKind, buffer: &[u8]) -> Option<Extracted>;
}

impl<F> Extractor for F
where
    F: Fn(ArrivalKind, &[u8]) -> Option<Extracted> + Send + Sync,
{
    fn extract(&self, kind: ArrivalKind, buffer: &[u8]) -> Option<Extracted> {
        self(kind, buffer)
    }
}
