//! Utility module
//!
//! Log formatting and subscriber setup shared across the crate.

use std::fmt::Write;

use tracing::Level;

/// Formats bytes as space-separated upper-case hex, e.g. `AA 55 02`
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

/// Installs a formatting subscriber at `level`
///
/// Returns false if a global subscriber was already set.
pub fn init_tracing(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init()
        .is_ok()
}
