use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Error, Result};

/// Parity checking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    One,
    Two,
}

/// Handshake mode of the line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(stop_bits: StopBits) -> Self {
        match stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Line parameters, consumed by the serial transport only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSettings {
    /// Device path or port name, e.g. `/dev/ttyUSB0` or `COM3`
    pub port_name: String,
    pub baud_rate: u32,
    /// 5 through 8
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Refuse writes while CTS is deasserted
    pub check_clear_to_send: bool,
    /// Slave address the device layer places in outgoing commands
    pub command_address: u8,
}

impl Default for LineSettings {
    fn default() -> Self {
        LineSettings {
            port_name: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            check_clear_to_send: true,
            command_address: 0,
        }
    }
}

impl LineSettings {
    /// Maps the configured data bits onto the serial port type
    pub fn serial_data_bits(&self) -> Result<serialport::DataBits> {
        match self.data_bits {
            5 => Ok(serialport::DataBits::Five),
            6 => Ok(serialport::DataBits::Six),
            7 => Ok(serialport::DataBits::Seven),
            8 => Ok(serialport::DataBits::Eight),
            n => Err(Error::config(format!("Unsupported data bits: {}", n))),
        }
    }
}

/// Settings shared by the extraction engine, executor and transport
///
/// A retry count of `n` allows `n - 1` attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub line: LineSettings,
    pub write_command_retry_count: u32,
    pub read_result_retry_count: u32,
    /// Per-write budget handed to the port
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub write_timeout: Duration,
    /// Per-read budget handed to the port
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub read_timeout: Duration,
    /// Accumulation buffer is cleared once it grows past this
    pub read_buffer_size: usize,
    /// Pause after the transport reports not ready
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub not_ready_delay: Duration,
    /// Longest wait for a frame when the queue is empty
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub empty_poll_delay: Duration,
    /// Pause after a frame fails validation
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub rejected_frame_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            line: LineSettings::default(),
            write_command_retry_count: 3,
            read_result_retry_count: 5,
            write_timeout: Duration::from_millis(500),
            read_timeout: Duration::from_millis(500),
            read_buffer_size: 2000,
            not_ready_delay: Duration::from_millis(50),
            empty_poll_delay: Duration::from_millis(500),
            rejected_frame_delay: Duration::from_millis(50),
        }
    }
}

impl Settings {
    /// Checks the invariants every component relies on
    pub fn validate(&self) -> Result<()> {
        if self.write_command_retry_count < 1 {
            return Err(Error::config("write_command_retry_count must be at least 1"));
        }
        if self.read_result_retry_count < 1 {
            return Err(Error::config("read_result_retry_count must be at least 1"));
        }
        if self.read_buffer_size == 0 {
            return Err(Error::config("read_buffer_size must be positive"));
        }
        if self.write_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(Error::config("timeouts must be positive"));
        }
        self.line.serial_data_bits()?;
        Ok(())
    }

    /// Number of write attempts the retry count allows
    pub fn write_attempts(&self) -> u32 {
        self.write_command_retry_count.saturating_sub(1)
    }

    /// Number of read attempts the retry count allows
    pub fn read_attempts(&self) -> u32 {
        self.read_result_retry_count.saturating_sub(1)
    }
}
