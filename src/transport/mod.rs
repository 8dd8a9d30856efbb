//! Byte transports
//!
//! A transport moves raw bytes to and from the device. It reports incoming
//! data through an [`ArrivalHandler`] on its own execution context and accepts
//! outgoing writes only while the line is clear to send.

pub mod memory;
pub mod serial;

pub use self::memory::MemoryTransport;
pub use self::serial::SerialTransport;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::{ArrivalKind, Error, Result};

/// Callback invoked for every chunk the transport receives
pub type ArrivalHandler = Arc<dyn Fn(ArrivalKind, &[u8]) + Send + Sync>;

/// Callback invoked once when the line fails underneath an open session
pub type FaultHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Capability set the executor needs from a byte transport
///
/// Calls may block (port open, reader shutdown, timed writes); async callers
/// go through `run_blocking`.
pub trait Transport: Send + 'static {
    /// Short human-readable identity for logs
    fn name(&self) -> &str;

    /// Opens the line and starts delivering arrivals to `on_arrival`
    fn open(&mut self, on_arrival: ArrivalHandler) -> Result<()>;

    /// Stops arrivals and releases the line
    fn close(&mut self) -> Result<()>;

    /// False once closed or once the line has faulted
    fn is_open(&self) -> bool;

    /// Current state of the ready-to-send signal
    fn clear_to_send(&mut self) -> Result<bool>;

    /// Writes a whole command
    ///
    /// `Ok(false)` means the line was not ready and nothing was written.
    /// `Err` is a hard fault.
    fn write(&mut self, bytes: &[u8]) -> Result<bool>;
}

/// Runs `f` against the locked transport on the blocking thread pool
pub(crate) async fn run_blocking<T, R, F>(transport: &Arc<Mutex<T>>, f: F) -> Result<R>
where
    T: Transport,
    R: Send + 'static,
    F: FnOnce(&mut T) -> Result<R> + Send + 'static,
{
    let mut guard = transport.clone().lock_owned().await;
    tokio::task::spawn_blocking(move || f(&mut *guard))
        .await
        .map_err(|e| Error::transport(format!("Transport task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_blocking_holds_the_line() {
        let line = Arc::new(Mutex::new(MemoryTransport::new("mem")));
        let opened = run_blocking(&line, |t: &mut MemoryTransport| {
            t.open(Arc::new(|_: ArrivalKind, _: &[u8]| {}))?;
            Ok(t.is_open())
        })
        .await
        .unwrap();
        assert!(opened);
        assert!(line.lock().await.is_open());
    }

    #[tokio::test]
    async fn test_run_blocking_propagates_errors() {
        let line = Arc::new(Mutex::new(MemoryTransport::new("mem")));
        let err = run_blocking(&line, |t: &mut MemoryTransport| t.write(&[0x01]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotOpen(_)));
    }
}
