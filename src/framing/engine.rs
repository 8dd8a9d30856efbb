use std::sync::{Arc, Mutex};

use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

use super::{Extractor, ResultQueue};
use crate::core::{ArrivalKind, ResultData};
use crate::util::hex;

/// Turns raw arrival chunks into queued frames
///
/// Owns the accumulation buffer for one transport session. The extractor is
/// run repeatedly after every arrival until it stops matching, so a burst
/// carrying several frames yields all of them at once.
pub struct FrameEngine {
    /// Label used in log output (usually the port name)
    label: String,
    /// Unmatched bytes, oldest first
    buffer: Mutex<BytesMut>,
    extractor: Arc<dyn Extractor>,
    results: Arc<ResultQueue>,
    read_buffer_size: usize,
}

impl FrameEngine {
    /// Creates an engine feeding `results`
    pub fn new(
        label: impl Into<String>,
        extractor: Arc<dyn Extractor>,
        results: Arc<ResultQueue>,
        read_buffer_size: usize,
    ) -> Self {
        FrameEngine {
            label: label.into(),
            buffer: Mutex::new(BytesMut::with_capacity(read_buffer_size.min(64 * 1024))),
            extractor,
            results,
            read_buffer_size,
        }
    }

    /// Queue this engine deposits frames into
    pub fn results(&self) -> &Arc<ResultQueue> {
        &self.results
    }

    /// Handles one arrival notification
    ///
    /// Returns the number of frames queued. Safe to call from several
    /// threads; the append/extract/clear sequence runs under one lock.
    pub fn on_bytes_arrived(&self, kind: ArrivalKind, bytes: &[u8]) -> usize {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.extend_from_slice(bytes);
        debug!(
            port = %self.label,
            ?kind,
            received = %hex(bytes),
            cumulative = %hex(&buffer),
            "bytes arrived"
        );

        let mut extracted = 0;
        while !buffer.is_empty() {
            let Some(found) = self.extractor.extract(kind, &buffer) else {
                break;
            };
            if found.consumed == 0 {
                break;
            }
            if found.consumed > buffer.len() {
                warn!(
                    port = %self.label,
                    consumed = found.consumed,
                    buffered = buffer.len(),
                    "extractor consumed more than buffered, frame dropped"
                );
                break;
            }

            if found.discard {
                debug!(
                    port = %self.label,
                    noise = %hex(&buffer[..found.consumed]),
                    "discarded bytes ahead of frame"
                );
                buffer.advance(found.consumed);
                continue;
            }

            buffer.advance(found.consumed);
            debug!(
                port = %self.label,
                frame = %hex(&found.frame),
                cumulative = %hex(&buffer),
                "frame extracted"
            );
            self.results.enqueue(ResultData::new(found.frame));
            extracted += 1;
        }

        if buffer.len() > self.read_buffer_size {
            warn!(
                port = %self.label,
                buffered = buffer.len(),
                limit = self.read_buffer_size,
                "accumulation buffer full, clearing"
            );
            buffer.clear();
        }

        extracted
    }

    /// Discards all unmatched bytes
    pub fn reset(&self) {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Number of bytes waiting for a match
    pub fn buffered_len(&self) -> usize {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
