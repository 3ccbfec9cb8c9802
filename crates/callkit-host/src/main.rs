// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CallKit — Call signaling host
//
// Entry point. Initialises logging, picks a bridge, and serves the hybrid
// shell's commands as newline-delimited JSON over stdin/stdout. Logs go to
// stderr so stdout carries nothing but replies and events.

mod protocol;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use callkit_bridge::simulated::SimulatedBridge;
use callkit_bridge::{Capabilities, platform_capabilities};
use callkit_core::error::{CallKitError, Result};
use callkit_core::types::RingerPolicy;
use callkit_core::CallKitConfig;
use callkit_signal::CallSignalingController;

#[derive(Parser, Debug)]
#[command(name = "callkit", version, about = "Call signaling bridge host", long_about = None)]
struct Cli {
    /// JSON config file (missing fields take defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Drive an in-memory phone instead of the platform bridge
    #[arg(long)]
    simulate: bool,

    /// Ringer mode of the simulated phone: normal, vibrate or silent
    #[arg(long, default_value = "normal")]
    ringer: RingerPolicy,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("CallKit host starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "CallKit host failed");
            ExitCode::FAILURE
        }
    }
}

fn capabilities(cli: &Cli, config: &CallKitConfig) -> Capabilities {
    if !cli.simulate {
        return platform_capabilities();
    }
    let sim = Arc::new(SimulatedBridge::new());
    sim.set_ringer_policy(cli.ringer);
    if let Some(tone) = &config.tone_resource {
        sim.bundle_tone(tone);
    }
    Capabilities::from_bridge(sim)
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => CallKitConfig::load(path)?,
        None => CallKitConfig::default(),
    };
    let caps = capabilities(&cli, &config);
    let controller = Arc::new(CallSignalingController::new(caps, config)?);
    info!(platform = controller.platform(), simulate = cli.simulate, "bridge selected");

    // Single writer so reply and event lines never interleave.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<(), std::io::Error>(())
    });

    let mut events = controller.subscribe();
    let event_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if event_tx.send(protocol::event_line(&event)).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event listener lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let outcome = match protocol::parse_command(line) {
            Ok(command) => {
                debug!(action = command.action(), "request");
                // Capabilities may block on platform calls.
                let ctl = Arc::clone(&controller);
                tokio::task::spawn_blocking(move || ctl.execute(command))
                    .await
                    .map_err(|e| CallKitError::Bridge(format!("dispatch task failed: {e}")))
                    .and_then(|r| r)
            }
            Err(e) => {
                warn!(error = %e, "rejected request line");
                Err(e)
            }
        };
        if out_tx.send(protocol::reply_line(&outcome)).is_err() {
            break;
        }
    }

    info!("stdin closed, shutting down");

    // Dropping the last controller handle closes the event bus, which lets
    // the forwarder drain and exit.
    tokio::task::spawn_blocking(move || {
        controller.flush_presentation();
        info!(
            state = ?controller.state(),
            presentation_failures = controller.suppressed_presentation_failures(),
            "controller stopped"
        );
        drop(controller);
    })
    .await
    .map_err(|e| CallKitError::Bridge(format!("shutdown task failed: {e}")))?;

    if let Err(e) = forwarder.await {
        warn!(error = %e, "event forwarder ended abnormally");
    }
    drop(out_tx);
    match writer.await {
        Ok(result) => result?,
        Err(e) => return Err(CallKitError::Bridge(format!("writer task failed: {e}"))),
    }
    Ok(())
}
