//! Device capability
//!
//! Everything that depends on a particular device's byte layout lives behind
//! [`Device`]: building commands, recognising frames and checking their
//! integrity. The executor is composed with a device rather than extended by
//! it.

#[cfg(test)]
pub(crate) mod testing;

use bytes::Bytes;

use crate::core::Result;
use crate::framing::Extractor;

/// Protocol layer for one kind of serial device
///
/// The [`Extractor`] supertrait supplies the device's framing to the
/// extraction engine.
pub trait Device: Extractor + 'static {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Encodes a command for the device at `address`
    fn make_command(&self, address: u8, command_word: u8, content: &[u8]) -> Bytes;

    /// Frame integrity check (length, checksum) applied before any caller check
    fn validate_frame(&self, frame: &[u8]) -> bool;

    /// Finalises or vets an outgoing command
    fn check_command(&self, command: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(command))
    }
}
