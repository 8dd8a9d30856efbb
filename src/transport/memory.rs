use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use super::{ArrivalHandler, Transport};
use crate::core::{ArrivalKind, Error, Result};

type Responder = Arc<dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync>;

#[derive(Default)]
struct State {
    open: bool,
    /// Readiness used once the script runs out
    ready: bool,
    /// Readiness for the next write attempts, front first
    script: VecDeque<bool>,
    fault: Option<String>,
    /// Set once the line has failed for good
    broken: Option<String>,
    attempts: usize,
    written: Vec<Bytes>,
    handler: Option<ArrivalHandler>,
    responder: Option<Responder>,
}

/// In-memory transport for tests and driver development
///
/// Clones share the same line, so a test can keep a handle while a session
/// owns the transport. Incoming bytes are injected by hand or produced by a
/// responder that answers each written command.
#[derive(Clone)]
pub struct MemoryTransport {
    name: String,
    state: Arc<Mutex<State>>,
}

impl MemoryTransport {
    /// Creates a closed transport that is always ready to send
    pub fn new(name: impl Into<String>) -> Self {
        MemoryTransport {
            name: name.into(),
            state: Arc::new(Mutex::new(State {
                ready: true,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sets the readiness reported once any script is exhausted
    pub fn set_ready(&self, ready: bool) {
        self.state().ready = ready;
    }

    /// Queues readiness values for the next write attempts
    pub fn script_ready(&self, readiness: impl IntoIterator<Item = bool>) {
        self.state().script.extend(readiness);
    }

    /// Makes the next write fail with a hard fault
    pub fn fail_next_write(&self, message: impl Into<String>) {
        self.state().fault = Some(message.into());
    }

    /// Answers every successful write with the bytes the closure returns
    pub fn respond_with<F>(&self, responder: F)
    where
        F: Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        self.state().responder = Some(Arc::new(responder));
    }

    /// Fails the line as a dead reader would
    ///
    /// Delivers end of stream, then reports the line closed and fails every
    /// write with a transport fault until reopened.
    pub fn break_line(&self, reason: impl Into<String>) {
        self.deliver(ArrivalKind::Eof, &[]);
        self.state().broken = Some(reason.into());
    }

    /// Delivers bytes on the arrival path as if the device sent them
    pub fn inject(&self, bytes: &[u8]) {
        self.deliver(ArrivalKind::Chars, bytes);
    }

    /// Signals end of stream to the arrival path
    pub fn inject_eof(&self) {
        self.deliver(ArrivalKind::Eof, &[]);
    }

    /// Every command written so far
    pub fn written(&self) -> Vec<Bytes> {
        self.state().written.clone()
    }

    /// Write calls made so far, successful or not
    pub fn write_attempts(&self) -> usize {
        self.state().attempts
    }

    fn deliver(&self, kind: ArrivalKind, bytes: &[u8]) {
        // Call out without holding the lock
        let handler = {
            let state = self.state();
            if !state.open || state.broken.is_some() {
                return;
            }
            state.handler.clone()
        };
        if let Some(handler) = handler {
            handler(kind, bytes);
        }
    }
}

impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self, on_arrival: ArrivalHandler) -> Result<()> {
        let mut state = self.state();
        state.open = true;
        state.broken = None;
        state.handler = Some(on_arrival);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state();
        state.open = false;
        state.handler = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        let state = self.state();
        state.open && state.broken.is_none()
    }

    fn clear_to_send(&mut self) -> Result<bool> {
        let state = self.state();
        if let Some(reason) = &state.broken {
            return Err(Error::transport(reason.clone()));
        }
        if !state.open {
            return Err(Error::not_open(self.name.clone()));
        }
        Ok(state.script.front().copied().unwrap_or(state.ready))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<bool> {
        let responder = {
            let mut state = self.state();
            if !state.open {
                return Err(Error::not_open(self.name.clone()));
            }
            state.attempts += 1;
            if let Some(reason) = &state.broken {
                return Err(Error::transport(reason.clone()));
            }
            if let Some(fault) = state.fault.take() {
                return Err(Error::transport(fault));
            }
            let ready = state.script.pop_front().unwrap_or(state.ready);
            if !ready {
                return Ok(false);
            }
            state.written.push(Bytes::copy_from_slice(bytes));
            state.responder.clone()
        };

        if let Some(reply) = responder.and_then(|respond| respond(bytes)) {
            self.inject(&reply);
        }
        Ok(true)
    }
}
