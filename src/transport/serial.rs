use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, error, warn};

use super::{ArrivalHandler, FaultHandler, Transport};
use crate::core::{ArrivalKind, Error, Result, Settings};
use crate::util::hex;

/// Read chunk size for the reader thread
const READ_CHUNK: usize = 1024;

/// Serial port transport backed by the `serialport` crate
///
/// `open` spawns a reader thread that forwards every received chunk to the
/// arrival handler. The thread polls with the configured read timeout so
/// `close` can stop it. If the line fails underneath it (device unplugged,
/// hangup) the fault is recorded: `is_open` turns false, writes fail with
/// [`Error::TransportFault`] and the optional fault handler is told once.
pub struct SerialTransport {
    settings: Settings,
    port: Option<Box<dyn SerialPort>>,
    reader: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<String>>>,
    on_fault: Option<FaultHandler>,
}

impl SerialTransport {
    /// Creates a closed transport for the configured line
    pub fn new(settings: Settings) -> Self {
        SerialTransport {
            settings,
            port: None,
            reader: None,
            running: Arc::new(AtomicBool::new(false)),
            fault: Arc::default(),
            on_fault: None,
        }
    }

    /// Reports line failures detected by the reader thread
    pub fn with_fault_handler(mut self, on_fault: FaultHandler) -> Self {
        self.on_fault = Some(on_fault);
        self
    }

    /// Why the line last failed, if it has
    pub fn fault(&self) -> Option<String> {
        self.fault.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn check_fault(&self) -> Result<()> {
        match self.fault() {
            Some(reason) => Err(Error::transport(reason)),
            None => Ok(()),
        }
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        let name = self.settings.line.port_name.clone();
        self.port.as_mut().ok_or_else(|| Error::not_open(name))
    }

    fn spawn_reader(
        &self,
        port: Box<dyn SerialPort>,
        on_arrival: ArrivalHandler,
    ) -> Result<JoinHandle<()>> {
        let reader = Reader {
            name: self.settings.line.port_name.clone(),
            running: self.running.clone(),
            fault: self.fault.clone(),
            on_arrival,
            on_fault: self.on_fault.clone(),
        };

        std::thread::Builder::new()
            .name(format!("serial-reader:{}", reader.name))
            .spawn(move || reader.run(port))
            .map_err(|e| Error::transport(format!("Failed to spawn serial reader: {}", e)))
    }
}

/// Body of the reader thread
struct Reader {
    name: String,
    running: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<String>>>,
    on_arrival: ArrivalHandler,
    on_fault: Option<FaultHandler>,
}

impl Reader {
    fn run(&self, mut source: impl Read) {
        let mut chunk = [0u8; READ_CHUNK];
        while self.running.load(Ordering::Acquire) {
            match source.read(&mut chunk) {
                Ok(0) => {
                    self.fail("end of stream".to_string());
                    break;
                }
                Ok(n) => (self.on_arrival)(ArrivalKind::Chars, &chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                    continue
                }
                Err(e) => {
                    self.fail(format!("read failed: {}", e));
                    break;
                }
            }
        }
    }

    fn fail(&self, reason: String) {
        // A read error raced with close is not a fault
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        let reason = format!("{}: {}", self.name, reason);
        error!(port = %self.name, reason = %reason, "serial line faulted");
        *self.fault.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason.clone());

        (self.on_arrival)(ArrivalKind::Eof, &[]);
        if let Some(on_fault) = &self.on_fault {
            on_fault(&Error::transport(reason));
        }
    }
}

impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.settings.line.port_name
    }

    fn open(&mut self, on_arrival: ArrivalHandler) -> Result<()> {
        if self.port.is_some() {
            if self.fault().is_none() {
                return Ok(());
            }
            // Reopen a line whose reader died
            if let Err(e) = self.close() {
                warn!(port = %self.settings.line.port_name, error = %e, "error closing faulted port");
            }
        }

        let line = &self.settings.line;
        let port = serialport::new(&line.port_name, line.baud_rate)
            .data_bits(line.serial_data_bits()?)
            .parity(line.parity.into())
            .stop_bits(line.stop_bits.into())
            .flow_control(line.flow_control.into())
            .timeout(self.settings.read_timeout)
            .open()
            .map_err(|e| {
                error!(port = %line.port_name, error = %e, "failed to open serial port");
                Error::transport(format!("Failed to open {}: {}", line.port_name, e))
            })?;

        // Bytes left over from before the session are not ours.
        port.clear(ClearBuffer::Input)?;
        let reader_port = port.try_clone()?;

        *self.fault.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.running.store(true, Ordering::Release);
        let reader = self.spawn_reader(reader_port, on_arrival)?;

        self.port = Some(port);
        self.reader = Some(reader);
        debug!(port = %self.settings.line.port_name, "serial port opened");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        let port = self.port.take();

        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!(port = %self.settings.line.port_name, "reader thread panicked");
            }
        }

        if let Some(mut port) = port {
            port.flush().map_err(|e| {
                error!(port = %self.settings.line.port_name, error = %e, "failed to close serial port");
                Error::from(e)
            })?;
            debug!(port = %self.settings.line.port_name, "serial port closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some() && self.fault().is_none()
    }

    fn clear_to_send(&mut self) -> Result<bool> {
        self.check_fault()?;
        let check = self.settings.line.check_clear_to_send;
        let port = self.port_mut()?;
        if !check {
            return Ok(true);
        }
        Ok(port.read_clear_to_send()?)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<bool> {
        if !self.clear_to_send()? {
            return Ok(false);
        }

        let write_timeout = self.settings.write_timeout;
        let read_timeout = self.settings.read_timeout;
        let port = self.port_mut()?;
        port.set_timeout(write_timeout)?;
        let written = port.write_all(bytes).and_then(|_| port.flush());
        port.set_timeout(read_timeout)?;
        written?;

        debug!(port = %self.settings.line.port_name, command = %hex(bytes), "command written");
        Ok(true)
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "error closing serial port on drop");
        }
    }
}
