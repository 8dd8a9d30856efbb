use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::core::{Error, Result, Settings};
use crate::device::Device;
use crate::framing::ResultQueue;
use crate::transport::{run_blocking, Transport};
use crate::util::hex;

/// Drives write-then-await-reply exchanges with bounded retries
///
/// One exchange runs at a time per executor; concurrent callers queue on an
/// internal lock instead of interleaving writes and stealing each other's
/// frames.
pub struct CommandExecutor<T, D> {
    settings: Arc<Settings>,
    device: Arc<D>,
    transport: Arc<Mutex<T>>,
    results: Arc<ResultQueue>,
    /// Held for the whole of an exchange
    exchange: Mutex<()>,
    /// Token for exchanges currently in flight
    cancel: StdMutex<CancellationToken>,
}

impl<T, D> CommandExecutor<T, D>
where
    T: Transport,
    D: Device,
{
    /// Creates an executor over a shared transport and result queue
    pub fn new(
        settings: Arc<Settings>,
        device: Arc<D>,
        transport: Arc<Mutex<T>>,
        results: Arc<ResultQueue>,
    ) -> Self {
        CommandExecutor {
            settings,
            device,
            transport,
            results,
            exchange: Mutex::new(()),
            cancel: StdMutex::new(CancellationToken::new()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Aborts every exchange in flight with [`Error::Cancelled`]
    ///
    /// Exchanges started afterwards run normally.
    pub fn cancel_pending(&self) {
        let mut token = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        token.cancel();
        *token = CancellationToken::new();
    }

    fn token(&self) -> CancellationToken {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Discards every frame waiting in the result queue
    pub fn clear_results(&self) -> usize {
        let dropped = self.results.drain_all();
        if dropped > 0 {
            debug!(device = self.device.name(), dropped, "stale results cleared");
        }
        dropped
    }

    /// Sends a command that has no reply
    ///
    /// Retries while the transport is not ready to send. A hard transport
    /// fault aborts immediately without using the retry budget.
    pub async fn send_without_reply(&self, command: &[u8]) -> Result<()> {
        let token = self.token();
        let _exchange = self.exchange.lock().await;
        self.write_command(command, &token).await
    }

    /// Sends a command and returns the first reply that passes both the
    /// device's integrity check and `validate`
    ///
    /// Rejected frames are skipped within the same read budget, so stale or
    /// noisy frames ahead of the real answer do not fail the exchange. A line
    /// that fails while waiting ends the exchange with a transport fault.
    pub async fn send_with_reply<F>(&self, command: &[u8], validate: F) -> Result<Bytes>
    where
        F: Fn(&[u8]) -> bool,
    {
        let token = self.token();
        let _exchange = self.exchange.lock().await;
        self.write_command(command, &token).await?;

        let attempts = self.settings.read_attempts();
        for attempt in 1..=attempts {
            let Some(result) = self.results.dequeue() else {
                self.ensure_line_up().await?;
                self.await_frame(&token, self.settings.empty_poll_delay).await?;
                continue;
            };

            if !self.device.validate_frame(result.data()) {
                debug!(
                    device = self.device.name(),
                    attempt,
                    frame = %hex(result.data()),
                    "frame failed integrity check"
                );
                self.pause(&token, self.settings.rejected_frame_delay).await?;
                continue;
            }

            if !validate(result.data()) {
                debug!(
                    device = self.device.name(),
                    attempt,
                    frame = %hex(result.data()),
                    "frame rejected by caller"
                );
                self.pause(&token, self.settings.rejected_frame_delay).await?;
                continue;
            }

            debug!(
                device = self.device.name(),
                attempt,
                frame = %hex(result.data()),
                "reply accepted"
            );
            return Ok(result.into_data());
        }

        error!(
            device = self.device.name(),
            command = %hex(command),
            attempts,
            "execute command failed"
        );
        Err(Error::CommandResponseFailed {
            device: self.device.name().to_string(),
            attempts,
        })
    }

    async fn write_command(&self, command: &[u8], token: &CancellationToken) -> Result<()> {
        let attempts = self.settings.write_attempts();
        for attempt in 1..=attempts {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let pending = Bytes::copy_from_slice(command);
            let written = run_blocking(&self.transport, move |line: &mut T| line.write(&pending))
                .await
                .map_err(|e| {
                    error!(device = self.device.name(), error = %e, "transport fault while writing");
                    e
                })?;

            if written {
                debug!(
                    device = self.device.name(),
                    attempt,
                    command = %hex(command),
                    "command written"
                );
                return Ok(());
            }

            debug!(device = self.device.name(), attempt, "transport not ready to send");
            if attempt < attempts {
                self.pause(token, self.settings.not_ready_delay).await?;
            }
        }

        error!(
            device = self.device.name(),
            command = %hex(command),
            attempts,
            "write command failed"
        );
        Err(Error::CommandDeliveryFailed {
            device: self.device.name().to_string(),
            attempts,
        })
    }

    async fn ensure_line_up(&self) -> Result<()> {
        let line = self.transport.lock().await;
        if line.is_open() {
            return Ok(());
        }
        error!(device = self.device.name(), port = line.name(), "line lost while awaiting reply");
        Err(Error::transport(format!("{} lost while awaiting reply", line.name())))
    }

    async fn pause(&self, token: &CancellationToken, delay: Duration) -> Result<()> {
        tokio::select! {
            _ = token.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    async fn await_frame(&self, token: &CancellationToken, max_wait: Duration) -> Result<()> {
        tokio::select! {
            _ = token.cancelled() => Err(Error::Cancelled),
            _ = self.results.wait_for_frame(max_wait) => Ok(()),
        }
    }
}
