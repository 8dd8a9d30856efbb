use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::core::ResultData;

/// Unbounded FIFO of extracted frames
///
/// Written from the arrival path, read by any number of executor tasks.
/// Every operation is non-blocking except [`ResultQueue::wait_for_frame`].
#[derive(Debug, Default)]
pub struct ResultQueue {
    frames: Mutex<VecDeque<ResultData>>,
    arrived: Notify,
}

impl ResultQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    fn frames(&self) -> std::sync::MutexGuard<'_, VecDeque<ResultData>> {
        // Poisoning only means a panicking producer; the deque is still consistent.
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends a frame and wakes waiting consumers
    pub fn enqueue(&self, frame: ResultData) {
        self.frames().push_back(frame);
        self.arrived.notify_waiters();
    }

    /// Takes the oldest frame, if any
    pub fn dequeue(&self) -> Option<ResultData> {
        self.frames().pop_front()
    }

    /// Discards every queued frame, returning how many were dropped
    pub fn drain_all(&self) -> usize {
        let mut frames = self.frames();
        let dropped = frames.len();
        frames.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.frames().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames().is_empty()
    }

    /// Waits until a frame is queued or `max_wait` elapses
    ///
    /// Returns true if the queue is non-empty on return. Never waits longer
    /// than `max_wait`, so a caller polling in a loop keeps its per-attempt
    /// bound.
    pub async fn wait_for_frame(&self, max_wait: Duration) -> bool {
        let deadline = Instant::now() + max_wait;
        loop {
            // Register before checking so an enqueue in between is not missed.
            let notified = self.arrived.notified();
            if !self.is_empty() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return !self.is_empty();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let queue = ResultQueue::new();
        queue.enqueue(ResultData::new(vec![1u8]));
        queue.enqueue(ResultData::new(vec![2u8]));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue().unwrap().data().as_ref(), &[1]);
        assert_eq!(queue.dequeue().unwrap().data().as_ref(), &[2]);
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_drain_then_dequeue_is_empty() {
        let queue = ResultQueue::new();
        for i in 0..4u8 {
            queue.enqueue(ResultData::new(vec![i]));
        }

        assert_eq!(queue.drain_all(), 4);
        assert!(queue.dequeue().is_none());
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_on_empty_queue() {
        let queue = ResultQueue::new();
        let start = Instant::now();

        assert!(!queue.wait_for_frame(Duration::from_millis(500)).await);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_wakes_on_enqueue() {
        let queue = Arc::new(ResultQueue::new());
        let producer = queue.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            producer.enqueue(ResultData::new(vec![0xAB]));
        });

        let start = Instant::now();
        assert!(queue.wait_for_frame(Duration::from_millis(500)).await);
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(queue.dequeue().unwrap().data().as_ref(), &[0xAB]);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_frame_present() {
        let queue = ResultQueue::new();
        queue.enqueue(ResultData::new(vec![7u8]));
        assert!(queue.wait_for_frame(Duration::from_secs(60)).await);
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = Arc::new(ResultQueue::new());
        let handles: Vec<_> = (0..4u8)
            .map(|p| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..50u8 {
                        queue.enqueue(ResultData::new(vec![p, i]));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), 200);
        // Per-producer order survives interleaving
        let mut last = [None::<u8>; 4];
        while let Some(frame) = queue.dequeue() {
            let (p, i) = (frame.data()[0] as usize, frame.data()[1]);
            if let Some(prev) = last[p] {
                assert!(i > prev);
            }
            last[p] = Some(i);
        }
    }
}
