use bytes::{BufMut, Bytes, BytesMut};

use super::Device;
use crate::core::{ArrivalKind, Error, Extracted, Result};
use crate::framing::{Extractor, HeaderLengthExtractor};

pub(crate) const HEADER: [u8; 2] = [0xAA, 0x55];

/// Builds a wire frame `AA 55 len payload`
pub(crate) fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = HEADER.to_vec();
    out.push(payload.len() as u8);
    out.extend_from_slice(payload);
    out
}

/// Test meter speaking `AA 55 len payload` in both directions
///
/// Commands carry `[address, command_word, content..]` as payload. Frames
/// whose first byte is `0xEE` are treated as corrupt.
pub(crate) struct TestMeter {
    framing: HeaderLengthExtractor,
}

impl TestMeter {
    pub(crate) fn new() -> Self {
        TestMeter {
            framing: HeaderLengthExtractor::new(HEADER),
        }
    }
}

impl Extractor for TestMeter {
    fn extract(&self, kind: ArrivalKind, buffer: &[u8]) -> Option<Extracted> {
        self.framing.extract(kind, buffer)
    }
}

impl Device for TestMeter {
    fn name(&self) -> &str {
        "test-meter"
    }

    fn make_command(&self, address: u8, command_word: u8, content: &[u8]) -> Bytes {
        let mut out = BytesMut::with_capacity(HEADER.len() + 3 + content.len());
        out.put_slice(&HEADER);
        out.put_u8((content.len() + 2) as u8);
        out.put_u8(address);
        out.put_u8(command_word);
        out.put_slice(content);
        out.freeze()
    }

    fn validate_frame(&self, frame: &[u8]) -> bool {
        frame.first().map_or(false, |b| *b != 0xEE)
    }

    fn check_command(&self, command: &[u8]) -> Result<Bytes> {
        if command.len() > HEADER.len() + 1 + u8::MAX as usize {
            return Err(Error::config("command too long for one frame"));
        }
        Ok(Bytes::copy_from_slice(command))
    }
}
