// MIT License - Copyright (c) 2026 Peter Wright
// Panel daemon

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use concord_bridge::{ConcordPanel, EngineConfig, PanelEvent, Partition, Zone};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "concord-bridge")]
#[command(about = "Talk to a Concord alarm panel over its RS-232 automation module")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    #[serde(default)]
    panel: PanelToml,
    #[serde(default)]
    daemon: DaemonToml,
    #[serde(default, deserialize_with = "deserialize_zone_names")]
    zone_names: HashMap<u16, String>,
}

fn deserialize_zone_names<'de, D>(deserializer: D) -> Result<HashMap<u16, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let string_map: HashMap<String, String> = HashMap::deserialize(deserializer)?;
    string_map
        .into_iter()
        .map(|(k, v)| {
            k.parse::<u16>()
                .map(|id| (id, v))
                .map_err(|_| serde::de::Error::custom(format!("invalid zone number: {k}")))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct PanelToml {
    /// Serial device, or "loopback" to run without hardware
    #[serde(default = "default_device")]
    device: String,
    #[serde(default = "default_poll_interval")]
    poll_interval_ms: u64,
    #[serde(default = "default_ack_timeout")]
    ack_timeout_ms: u64,
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default = "default_true")]
    refresh_on_start: bool,
    #[serde(default = "default_display_history")]
    display_history: usize,
    #[serde(default = "default_display_partition")]
    display_partition: u8,
    #[serde(default)]
    master_pin: Option<String>,
    #[serde(default)]
    resend_master_code_on_arm: bool,
    #[serde(default)]
    refresh_on_image_loss: bool,
}

impl Default for PanelToml {
    fn default() -> Self {
        Self {
            device: default_device(),
            poll_interval_ms: default_poll_interval(),
            ack_timeout_ms: default_ack_timeout(),
            max_attempts: default_max_attempts(),
            refresh_on_start: true,
            display_history: default_display_history(),
            display_partition: default_display_partition(),
            master_pin: None,
            resend_master_code_on_arm: false,
            refresh_on_image_loss: false,
        }
    }
}

fn default_device() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_poll_interval() -> u64 {
    250
}
fn default_ack_timeout() -> u64 {
    1000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_true() -> bool {
    true
}
fn default_display_history() -> usize {
    50
}
fn default_display_partition() -> u8 {
    1
}

#[derive(Debug, Deserialize)]
struct DaemonToml {
    /// Seconds between state snapshots; 0 disables them
    #[serde(default = "default_snapshot_interval")]
    snapshot_interval_secs: u64,
}

impl Default for DaemonToml {
    fn default() -> Self {
        Self {
            snapshot_interval_secs: default_snapshot_interval(),
        }
    }
}

fn default_snapshot_interval() -> u64 {
    300
}

fn build_engine_config(toml: &PanelToml) -> EngineConfig {
    let mut builder = EngineConfig::builder()
        .device(&toml.device)
        .poll_interval(Duration::from_millis(toml.poll_interval_ms))
        .ack_timeout(Duration::from_millis(toml.ack_timeout_ms))
        .max_attempts(toml.max_attempts)
        .refresh_on_start(toml.refresh_on_start)
        .display_history(toml.display_history)
        .display_partition(toml.display_partition)
        .resend_master_code_on_arm(toml.resend_master_code_on_arm)
        .refresh_on_image_loss(toml.refresh_on_image_loss);
    if let Some(pin) = &toml.master_pin {
        builder = builder.master_pin(pin);
    }
    builder.build()
}

// ---------------------------------------------------------------------------
// Snapshot JSON
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Snapshot {
    now: u64,
    zones: Vec<SnapshotZone>,
    partitions: Vec<Partition>,
}

#[derive(Serialize)]
struct SnapshotZone {
    name: String,
    #[serde(flatten)]
    zone: Zone,
}

fn now_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

fn zone_label(zone: &Zone, overrides: &HashMap<u16, String>) -> String {
    if let Some(name) = overrides.get(&zone.zone_number) {
        return name.clone();
    }
    zone.zone_text.clone()
}

async fn log_snapshot(panel: &ConcordPanel, zone_names: &HashMap<u16, String>) {
    let zones = panel
        .zones()
        .await
        .into_iter()
        .map(|zone| SnapshotZone {
            name: zone_label(&zone, zone_names),
            zone,
        })
        .collect();
    let snapshot = Snapshot {
        now: now_epoch_ms(),
        zones,
        partitions: panel.partitions().await,
    };
    match serde_json::to_string(&snapshot) {
        Ok(json) => info!("Snapshot: {json}"),
        Err(e) => error!("Failed to serialize snapshot: {e}"),
    }
}

fn log_event(event: &PanelEvent) {
    match serde_json::to_string(event) {
        Ok(json) => info!("{json}"),
        Err(e) => error!("Failed to serialize panel event: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=concord_bridge=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    let config_text =
        std::fs::read_to_string(&cli.config).context("Failed to read config file")?;
    let config: Config = toml::from_str(&config_text).context("Failed to parse config file")?;
    let engine_config = build_engine_config(&config.panel);
    let zone_names = Arc::new(config.zone_names);

    let mut sigterm = signal(SignalKind::terminate())?;

    info!("Opening Concord panel on {}", engine_config.device);
    let panel = Arc::new(
        ConcordPanel::start(engine_config).context("Failed to start panel engine")?,
    );

    // Task 1: event logger
    let mut rx = panel.subscribe();
    let event_handle = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(PanelEvent::Stopped) => {
                    log_event(&PanelEvent::Stopped);
                    break;
                }
                Ok(event) => log_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event receiver lagged, missed {n} events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    info!("Event channel closed");
                    break;
                }
            }
        }
    });

    // Task 2: snapshot timer, refreshes dynamic state before logging
    let snapshot_interval_secs = config.daemon.snapshot_interval_secs;
    let panel_snap = Arc::clone(&panel);
    let zn_snap = Arc::clone(&zone_names);
    let snap_handle = tokio::spawn(async move {
        if snapshot_interval_secs == 0 {
            return;
        }
        let mut ticker = interval(Duration::from_secs(snapshot_interval_secs));
        // The first tick fires immediately, before the initial image has arrived
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = panel_snap.request_dynamic_data_refresh() {
                warn!("Dynamic refresh request failed: {e}");
            }
            log_snapshot(&panel_snap, &zn_snap).await;
        }
    });

    info!("Panel engine running. Send SIGINT/SIGTERM to stop.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down..."),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
    }

    snap_handle.abort();
    let _ = snap_handle.await;

    match Arc::try_unwrap(panel) {
        Ok(panel) => {
            if let Err(e) = panel.shutdown().await {
                warn!("Error stopping panel engine: {e}");
            }
        }
        Err(panel) => {
            warn!("Could not unwrap panel for clean shutdown, requesting stop");
            if let Err(e) = panel.stop() {
                warn!("Error stopping panel engine: {e}");
            }
        }
    }

    // Let the logger drain the final events
    if let Err(e) = event_handle.await {
        error!("Event logger failed: {e}");
    }

    info!("Shutdown complete");
    Ok(())
}
