use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, error};

use super::CommandExecutor;
use crate::core::{ArrivalKind, Result, Settings};
use crate::device::Device;
use crate::framing::{FrameEngine, ResultQueue};
use crate::transport::{run_blocking, ArrivalHandler, Transport};

/// One open line to one device
///
/// Owns the accumulation buffer and result queue for the lifetime of the
/// transport session; nothing is shared between sessions.
pub struct Session<T, D> {
    settings: Arc<Settings>,
    device: Arc<D>,
    transport: Arc<Mutex<T>>,
    engine: Arc<FrameEngine>,
    executor: CommandExecutor<T, D>,
}

impl<T, D> Session<T, D>
where
    T: Transport,
    D: Device,
{
    /// Wires a transport and device together; the line stays closed
    pub fn new(settings: Settings, transport: T, device: D) -> Result<Self> {
        settings.validate()?;

        let settings = Arc::new(settings);
        let device = Arc::new(device);
        let results = Arc::new(ResultQueue::new());
        let engine = Arc::new(FrameEngine::new(
            transport.name(),
            device.clone(),
            results.clone(),
            settings.read_buffer_size,
        ));
        let transport = Arc::new(Mutex::new(transport));
        let executor = CommandExecutor::new(
            settings.clone(),
            device.clone(),
            transport.clone(),
            results,
        );

        Ok(Session {
            settings,
            device,
            transport,
            engine,
            executor,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn engine(&self) -> &Arc<FrameEngine> {
        &self.engine
    }

    pub fn executor(&self) -> &CommandExecutor<T, D> {
        &self.executor
    }

    /// Opens the line with an empty buffer and queue
    pub async fn open(&self) -> Result<()> {
        let engine = self.engine.clone();
        let sink = self.engine.clone();
        let handler: ArrivalHandler = Arc::new(move |kind: ArrivalKind, bytes: &[u8]| {
            sink.on_bytes_arrived(kind, bytes);
        });

        let opened = run_blocking(&self.transport, move |line: &mut T| {
            if line.is_open() {
                return Ok(None);
            }
            engine.reset();
            let stale = engine.results().drain_all();
            line.open(handler)?;
            Ok(Some((line.name().to_string(), stale)))
        })
        .await
        .map_err(|e| {
            error!(device = self.device.name(), error = %e, "failed to open transport");
            e
        })?;

        if let Some((port, stale)) = opened {
            debug!(device = self.device.name(), port = %port, stale, "session opened");
        }
        Ok(())
    }

    /// Closes the line; pending exchanges are cancelled
    pub async fn close(&self) -> Result<()> {
        self.executor.cancel_pending();
        let port = run_blocking(&self.transport, |line: &mut T| {
            line.close()?;
            Ok(line.name().to_string())
        })
        .await
        .map_err(|e| {
            error!(device = self.device.name(), error = %e, "failed to close transport");
            e
        })?;
        debug!(device = self.device.name(), port = %port, "session closed");
        Ok(())
    }

    pub async fn is_open(&self) -> bool {
        self.transport.lock().await.is_open()
    }

    /// Discards stale frames before a fresh exchange
    pub fn clear_results(&self) -> usize {
        self.executor.clear_results()
    }

    /// Builds a command for the configured address and awaits a reply accepted by `validate`
    pub async fn execute<F>(&self, command_word: u8, content: &[u8], validate: F) -> Result<Bytes>
    where
        F: Fn(&[u8]) -> bool,
    {
        let command = self.build(command_word, content)?;
        self.executor.send_with_reply(&command, validate).await
    }

    /// Builds a command for the configured address and sends it without awaiting a reply
    pub async fn execute_without_response(&self, command_word: u8, content: &[u8]) -> Result<()> {
        let command = self.build(command_word, content)?;
        self.executor.send_without_reply(&command).await
    }

    fn build(&self, command_word: u8, content: &[u8]) -> Result<Bytes> {
        let address = self.settings.line.command_address;
        let command = self.device.make_command(address, command_word, content);
        self.device.check_command(&command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use crate::device::testing::{frame, TestMeter};
    use crate::transport::MemoryTransport;

    fn session(line: &MemoryTransport) -> Session<MemoryTransport, TestMeter> {
        let mut settings = Settings {
            write_command_retry_count: 3,
            read_result_retry_count: 3,
            ..Default::default()
        };
        settings.line.command_address = 0x07;
        Session::new(settings, line.clone(), TestMeter::new()).unwrap()
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = Settings {
            read_buffer_size: 0,
            ..Default::default()
        };
        let result = Session::new(settings, MemoryTransport::new("mem"), TestMeter::new());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_header_length_scenario() {
        let line = MemoryTransport::new("mem");
        let session = session(&line);
        session.open().await.unwrap();

        line.inject(&[0xAA, 0x55, 0x02, 0x01, 0x02]);
        assert_eq!(session.engine().results().len(), 1);

        let reply = session.executor().send_with_reply(&[0x00], |_| true).await.unwrap();
        assert_eq!(reply.as_ref(), &[0x01, 0x02]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_builds_addressed_command() {
        let line = MemoryTransport::new("mem");
        let session = session(&line);
        session.open().await.unwrap();
        // Echo the address and command word back
        line.respond_with(|cmd| Some(frame(&cmd[3..5])));

        let reply = session
            .execute(0x21, &[0x01, 0x02], |payload| payload[0] == 0x07)
            .await
            .unwrap();
        assert_eq!(reply.as_ref(), &[0x07, 0x21]);
        assert_eq!(
            line.written()[0].as_ref(),
            &[0xAA, 0x55, 0x04, 0x07, 0x21, 0x01, 0x02]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_without_response() {
        let line = MemoryTransport::new("mem");
        let session = session(&line);
        session.open().await.unwrap();

        session.execute_without_response(0x30, &[]).await.unwrap();
        assert_eq!(line.written().len(), 1);
        assert!(session.engine().results().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_command_rejected_before_sending() {
        let line = MemoryTransport::new("mem");
        let session = session(&line);
        session.open().await.unwrap();

        let content = vec![0u8; 300];
        let err = session.execute_without_response(0x30, &content).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(line.write_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_starts_clean() {
        let line = MemoryTransport::new("mem");
        let session = session(&line);
        session.open().await.unwrap();

        line.inject(&frame(&[0x01]));
        line.inject(&[0xAA, 0x55]);
        session.close().await.unwrap();
        assert!(!session.is_open().await);

        session.open().await.unwrap();
        assert!(session.is_open().await);
        assert!(session.engine().results().is_empty());
        assert_eq!(session.engine().buffered_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_after_line_failure() {
        let line = MemoryTransport::new("mem");
        let session = session(&line);
        session.open().await.unwrap();

        line.inject(&[0xAA, 0x55]);
        line.break_line("device unplugged");
        assert!(!session.is_open().await);
        let err = session.execute_without_response(0x30, &[]).await.unwrap_err();
        assert!(matches!(err, Error::TransportFault(_)));

        session.open().await.unwrap();
        assert!(session.is_open().await);
        assert_eq!(session.engine().buffered_len(), 0);

        line.respond_with(|_| Some(frame(&[0x01])));
        let reply = session.execute(0x01, &[], |_| true).await.unwrap();
        assert_eq!(reply.as_ref(), &[0x01]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_session_reports_not_open() {
        let line = MemoryTransport::new("mem");
        let session = session(&line);

        let err = session.execute_without_response(0x30, &[]).await.unwrap_err();
        assert!(matches!(err, Error::NotOpen(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_results_before_exchange() {
        let line = MemoryTransport::new("mem");
        let session = session(&line);
        session.open().await.unwrap();

        line.inject(&frame(&[0x0F]));
        line.inject(&frame(&[0x0E]));
        assert_eq!(session.clear_results(), 2);

        line.respond_with(|_| Some(frame(&[0x01])));
        let reply = session.execute(0x01, &[], |_| true).await.unwrap();
        assert_eq!(reply.as_ref(), &[0x01]);
    }
}
