//! Application layer use cases for the Wing listener.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure protocol and device rules in `wing_core`) and the infrastructure
//! (sockets, threads, files).  Use cases here depend on traits such as
//! [`process_packets::ReplySender`] and
//! [`EventSink`](crate::infrastructure::sink::EventSink) rather than on a
//! concrete socket, so they can be tested without the network.
//!
//! # Sub-modules
//!
//! - **`process_packets`** – Runs on the receive thread for every datagram:
//!   registry lookup, event emission, acknowledgements, and the expiry sweep.
//!
//! - **`service`** – The host API: [`service::WingService::start`] wires the
//!   transport, the receive thread and the event dispatcher together and
//!   returns a [`service::WingHandle`].

pub mod process_packets;
pub mod service;
