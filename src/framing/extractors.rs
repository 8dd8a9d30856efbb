use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::debug;

use super::Extractor;
use crate::core::{ArrivalKind, Extracted};

/// Frames laid out as `header | len:u8 | payload[len]`
///
/// The extracted frame is the payload. Leading bytes that cannot start a
/// header are discarded; a trailing partial header is kept for the next
/// arrival.
#[derive(Debug, Clone)]
pub struct HeaderLengthExtractor {
    header: Bytes,
}

impl HeaderLengthExtractor {
    pub fn new(header: impl AsRef<[u8]>) -> Self {
        HeaderLengthExtractor {
            header: Bytes::copy_from_slice(header.as_ref()),
        }
    }

    fn find_header(&self, buffer: &[u8]) -> Option<usize> {
        if self.header.is_empty() {
            return Some(0);
        }
        buffer
            .windows(self.header.len())
            .position(|window| window == self.header.as_ref())
    }

    /// Length of the longest buffer suffix that is a proper header prefix
    fn partial_header_tail(&self, buffer: &[u8]) -> usize {
        let longest = self.header.len().saturating_sub(1).min(buffer.len());
        (1..=longest)
            .rev()
            .find(|&k| buffer[buffer.len() - k..] == self.header[..k])
            .unwrap_or(0)
    }
}

impl Extractor for HeaderLengthExtractor {
    fn extract(&self, _kind: ArrivalKind, buffer: &[u8]) -> Option<Extracted> {
        let Some(start) = self.find_header(buffer) else {
            let noise = buffer.len() - self.partial_header_tail(buffer);
            return (noise > 0).then(|| Extracted::discard(noise));
        };
        if start > 0 {
            return Some(Extracted::discard(start));
        }

        let len_at = self.header.len();
        let len = *buffer.get(len_at)? as usize;
        let end = len_at + 1 + len;
        let payload = buffer.get(len_at + 1..end)?;
        Some(Extracted::new(payload.to_vec(), end))
    }
}

/// Runs a [`Decoder`] as a pure extractor
///
/// Each call decodes a private copy of the buffer with a fresh clone of the
/// decoder, so no state leaks between calls. On [`ArrivalKind::Eof`] the
/// decoder's `decode_eof` is used instead.
#[derive(Debug, Clone)]
pub struct DecoderExtractor<D> {
    decoder: D,
}

impl<D> DecoderExtractor<D> {
    pub fn new(decoder: D) -> Self {
        DecoderExtractor { decoder }
    }
}

impl<D> Extractor for DecoderExtractor<D>
where
    D: Decoder + Clone + Send + Sync,
    D::Item: Into<Bytes>,
    D::Error: std::fmt::Display,
{
    fn extract(&self, kind: ArrivalKind, buffer: &[u8]) -> Option<Extracted> {
        let mut decoder = self.decoder.clone();
        let mut src = BytesMut::from(buffer);
        let decoded = match kind {
            ArrivalKind::Chars => decoder.decode(&mut src),
            ArrivalKind::Eof => decoder.decode_eof(&mut src),
        };

        match decoded {
            Ok(Some(item)) => {
                let consumed = buffer.len() - src.len();
                Some(Extracted::new(item, consumed))
            }
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "decoder rejected buffer");
                None
            }
        }
    }
}
