//! # Padsleep
//!
//! Disconnect idle Bluetooth game controllers.
//!
//! Runs unattended: every two minutes it looks for connected controllers,
//! supervises each one, and disconnects any controller that produced no input
//! for five minutes.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use padsleep::config::{Timings, INPUT_DIR};
use padsleep::correlator::Correlator;
use padsleep::input::EvdevOpener;
use padsleep::registry::Discovery;
use padsleep::resolver::{AttributeResolver, UdevadmQuery};
use padsleep::wireless::BluezTransport;

/// Main entry point for Padsleep
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber (non-blocking stdout)
///    - Echo command-line arguments; they are not otherwise interpreted
///    - Wire the correlator to udevadm, BlueZ and evdev
///
/// 2. **Main Loop**
///    - Discovery pass every two minutes
///    - One supervisor task per connected controller
///
/// 3. **Shutdown** (Ctrl+C or SIGTERM)
///    - Stop every supervisor and release its input and wireless handles
///
/// Expected output:
/// ```text
/// INFO padsleep: Padsleep v0.1.0 starting...
/// INFO padsleep::correlator: Found device /dev/input/js0 (A4:AE:12:34:56:78)
/// INFO padsleep::registry: Supervising controller A4:AE:12:34:56:78 (/dev/input/js0)
/// INFO padsleep::supervisor: Controller A4:AE:12:34:56:78 timed out after 300s without input, disconnecting
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Padsleep v{} starting...", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        info!("Arguments (ignored): {:?}", args);
    }

    let timings = Timings::default();
    timings.validate().context("invalid timing constants")?;
    info!(
        "Idle timeout {:?}, poll interval {:?}, discovery interval {:?}",
        timings.idle_timeout, timings.poll_interval, timings.discovery_interval
    );

    let correlator = Correlator::new(
        Path::new(INPUT_DIR),
        AttributeResolver::new(UdevadmQuery::new()),
        Arc::new(BluezTransport::new()),
        Arc::new(EvdevOpener),
    );

    let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let shutdown = async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Received Ctrl+C, shutting down..."),
                Err(e) => {
                    warn!("Ctrl+C handler failed ({}), waiting for SIGTERM", e);
                    terminate.recv().await;
                    info!("Received SIGTERM, shutting down...");
                }
            },
            _ = terminate.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    };

    Discovery::new(correlator, timings).run(shutdown).await;

    info!("Padsleep stopped");
    Ok(())
}
