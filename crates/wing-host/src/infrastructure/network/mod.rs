//! Network infrastructure.
//!
//! # Sub-modules
//!
//! - **`transport`** – The bound UDP socket: a blocking receive loop with a
//!   short read timeout so it can be stopped promptly, and fire-and-forget
//!   sends callable from any thread.

pub mod transport;
