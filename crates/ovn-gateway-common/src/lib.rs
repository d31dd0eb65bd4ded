//! Common infrastructure for the OVN node gateway daemon.
//!
//! - [`shell`]: Safe shell command execution with proper quoting
//! - [`error`]: Error types shared by the reconciler and its backends

pub mod error;
pub mod shell;

pub use error::{GatewayError, GatewayResult};
