use std::io;
use thiserror::Error;

/// Custom error types for serial command exchanges
#[derive(Error, Debug)]
pub enum Error {
    /// Write attempts exhausted; the device state is unknown
    #[error("{device}: write command failed after {attempts} attempt(s)")]
    CommandDeliveryFailed { device: String, attempts: u32 },

    /// No validated response within the read budget
    #[error("{device}: execute command failed after {attempts} read attempt(s)")]
    CommandResponseFailed { device: String, attempts: u32 },

    #[error("Transport fault: {0}")]
    TransportFault(String),

    #[error("Transport not open: {0}")]
    NotOpen(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Exchange cancelled")]
    Cancelled,
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new transport fault
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::TransportFault(msg.into())
    }

    /// Creates a new not-open error
    pub fn not_open(msg: impl Into<String>) -> Self {
        Error::NotOpen(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Returns true if the byte transport itself failed
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, Error::TransportFault(_) | Error::NotOpen(_))
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::TransportFault(e.to_string())
    }
}

impl From<serialport::Error> for Error {
    fn from(e: serialport::Error) -> Self {
        Error::TransportFault(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("retry count must be >= 1");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: retry count must be >= 1");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "line dropped");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::TransportFault(_)));
        assert!(err.is_transport_fault());
    }

    #[test]
    fn test_exchange_errors_are_not_transport_faults() {
        let err = Error::CommandDeliveryFailed { device: "meter".into(), attempts: 2 };
        assert!(!err.is_transport_fault());
        assert_eq!(err.to_string(), "meter: write command failed after 2 attempt(s)");

        let err = Error::CommandResponseFailed { device: "meter".into(), attempts: 4 };
        assert!(!err.is_transport_fault());
    }
}
