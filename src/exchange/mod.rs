//! Command exchanges
//!
//! [`CommandExecutor`] runs the retrying write and reply loops;
//! [`Session`] wires one transport, one device and one extraction engine
//! around it.

pub mod executor;
pub mod session;

pub use self::executor::CommandExecutor;
pub use self::session::Session;
