//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration file from the
//! platform-appropriate directory, falls back to defaults when it does not
//! exist yet, and converts it into the runtime service settings.

pub mod config;
