use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Why the extractor is being invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrivalKind {
    /// New characters were received
    Chars,
    /// The stream ended or the reader faulted
    Eof,
}

/// What an extractor reports when a complete frame sits at the buffer head
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// The frame handed to consumers
    pub frame: Bytes,
    /// Bytes to drop from the front of the accumulation buffer
    pub consumed: usize,
    /// Drop `consumed` bytes without queueing a frame
    pub discard: bool,
}

impl Extracted {
    /// Creates an extraction whose frame is exactly the consumed bytes
    pub fn whole(frame: impl Into<Bytes>) -> Self {
        let frame = frame.into();
        let consumed = frame.len();
        Extracted {
            frame,
            consumed,
            discard: false,
        }
    }

    /// Creates an extraction that consumes more than it yields (headers, checksums, noise)
    pub fn new(frame: impl Into<Bytes>, consumed: usize) -> Self {
        Extracted {
            frame: frame.into(),
            consumed,
            discard: false,
        }
    }

    /// Drops `consumed` leading bytes that can never belong to a frame
    pub fn discard(consumed: usize) -> Self {
        Extracted {
            frame: Bytes::new(),
            consumed,
            discard: true,
        }
    }
}

/// An extracted response frame
///
/// Immutable once created; the queue hands each one out exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultData {
    data: Bytes,
    created_at: DateTime<Utc>,
}

impl ResultData {
    /// Creates a result stamped with the current wall-clock time
    pub fn new(data: impl Into<Bytes>) -> Self {
        ResultData {
            data: data.into(),
            created_at: Utc::now(),
        }
    }

    /// Frame payload
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// When the frame was extracted
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Consumes the result, returning the payload
    pub fn into_data(self) -> Bytes {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_data_snapshot() {
        let before = Utc::now();
        let result = ResultData::new(vec![0x01, 0x02]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.data().as_ref(), &[0x01, 0x02]);
        assert!(result.created_at() >= before);
        assert_eq!(result.into_data(), Bytes::from_static(&[0x01, 0x02]));
    }

    #[test]
    fn test_extracted_whole() {
        let extracted = Extracted::whole(vec![1u8, 2, 3]);
        assert_eq!(extracted.consumed, 3);

        let extracted = Extracted::new(vec![1u8], 4);
        assert_eq!(extracted.consumed, 4);
        assert_eq!(extracted.frame.len(), 1);
        assert!(!extracted.discard);
    }

    #[test]
    fn test_extracted_discard() {
        let skipped = Extracted::discard(3);
        assert!(skipped.discard);
        assert_eq!(skipped.consumed, 3);
        assert!(skipped.frame.is_empty());
    }
}
