//! Infrastructure layer for the Wing listener.
//!
//! Contains OS-facing adapters: the UDP socket, the event dispatcher thread,
//! and file-system configuration storage.
//!
//! **Dependency rule**: nothing in `wing_core` may depend on this layer.

pub mod network;
pub mod sink;
pub mod storage;
