//! wing-host library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.

pub mod application;
pub mod infrastructure;

pub use application::service::{ServiceConfig, StartError, WingHandle, WingService};
pub use infrastructure::network::transport::{BindError, SendError};
pub use infrastructure::sink::{ChannelSink, EventSink, FnSink, OverflowPolicy};
