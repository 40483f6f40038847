//! Headless Wing listener.
//!
//! Loads the configuration, starts the service, and writes every input event
//! to the log as one JSON line until Ctrl-C.  Channel events also carry the
//! flat channel index for the Wing they came from.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- platform config file or defaults
//!  └─ WingService::start()
//!       ├─ receive thread      ("wing-rx")
//!       └─ dispatcher thread   ("wing-events") ──► ChannelSink
//!  └─ event pump (Tokio task)  -- logs each event
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wing_core::{InputEvent, WingVariant};
use wing_host::infrastructure::storage::config::{load_config, AppConfig};
use wing_host::{ChannelSink, WingService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The config must be read before logging is set up, so a load failure is
    // reported after init.
    let loaded = load_config();
    let config = loaded.as_ref().cloned().unwrap_or_default();

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.log_level)),
        )
        .init();

    if let Err(e) = &loaded {
        warn!("using default configuration: {e}");
    }

    run(config).await
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let service_config = config
        .service_config()
        .context("invalid listener configuration")?;

    let (sink, mut events) = ChannelSink::new();
    let handle = WingService::start(service_config, Arc::new(sink))
        .context("failed to start the wing listener")?;

    // ── Event pump ────────────────────────────────────────────────────────────
    let pump = tokio::spawn(async move {
        let mut variants: HashMap<SocketAddr, WingVariant> = HashMap::new();
        while let Some(event) = events.recv().await {
            match event_line(&event, &mut variants) {
                Ok(line) => info!(target: "wing_events", "{line}"),
                Err(e) => warn!("could not serialise event: {e}"),
            }
        }
    });

    info!(
        "Wing listener ready on {}.  Press Ctrl-C to exit.",
        handle.local_addr()
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutdown signal received");

    let dropped = handle.dropped_events();
    if dropped > 0 {
        warn!("{dropped} event(s) were dropped while the log fell behind");
    }
    // Queued events reach the log before the listener closes.
    tokio::task::spawn_blocking(move || handle.drain_and_stop())
        .await
        .context("shutdown task failed")?;
    pump.await.context("event pump failed")?;

    info!("Wing listener stopped");
    Ok(())
}

/// Serialises one event, tracking each Wing's variant so channel events can
/// be tagged with their flat index.
fn event_line(
    event: &InputEvent,
    variants: &mut HashMap<SocketAddr, WingVariant>,
) -> serde_json::Result<String> {
    match event {
        InputEvent::DeviceDiscovered { address, variant } => {
            variants.insert(*address, *variant);
        }
        InputEvent::DeviceOffline { address, .. } => {
            variants.remove(address);
        }
        InputEvent::ChannelChanged {
            address, channel, ..
        } => {
            if let Some(variant) = variants.get(address) {
                let line = serde_json::json!({
                    "channel_index": channel.flat_index(*variant),
                    "event": event,
                });
                return serde_json::to_string(&line);
            }
        }
        _ => {}
    }
    serde_json::to_string(event)
}
