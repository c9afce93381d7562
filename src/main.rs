//! qemu-tracker: QEMU Instance Tracker
//!
//! Polls `ps -ef` for QEMU processes every few seconds and serves the result,
//! plus start/stop controls for VMs declared in `vms.json`, on a small HTTP
//! API with a static dashboard.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use qemu_tracker::cache::SnapshotCache;
use qemu_tracker::logging;
use qemu_tracker::process::{PsSource, SnapshotBuilder};
use qemu_tracker::server::{self, AppState};
use qemu_tracker::settings::{DEFAULT_SETTINGS_FILE, Settings};
use qemu_tracker::vm::{Controller, SystemRunner, VmsConfig};

/// QEMU Instance Tracker
#[derive(Parser, Debug)]
#[command(name = "qemu-tracker", version, about = "QEMU Instance Tracker")]
struct Args {
    /// Service settings file (TOML). Missing file means defaults.
    #[arg(short, long, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    /// Listen address, e.g. 0.0.0.0:5450
    #[arg(short, long)]
    bind: Option<String>,

    /// VM configuration document (JSON)
    #[arg(long)]
    vms_config: Option<PathBuf>,

    /// Seconds between process-table scans
    #[arg(long)]
    interval_secs: Option<u64>,

    /// QEMU binary to track and launch
    #[arg(long)]
    binary: Option<String>,
}

impl Args {
    fn into_settings(self) -> Result<Settings> {
        let mut settings = Settings::load(&self.settings)?;
        if let Some(bind) = self.bind {
            settings.bind = bind;
        }
        if let Some(path) = self.vms_config {
            settings.vms_config = path;
        }
        if let Some(secs) = self.interval_secs {
            settings.refresh_interval_secs = secs;
        }
        if let Some(binary) = self.binary {
            settings.launch.binary = binary;
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = logging::init();
    let settings = Args::parse().into_settings()?;

    let vms = Arc::new(VmsConfig::load_or_default(&settings.vms_config));

    let builder = SnapshotBuilder::new(PsSource, settings.launch.binary.clone());
    let cache = Arc::new(
        SnapshotCache::initialize(builder)
            .await
            .context("failed to capture initial process snapshot")?,
    );
    tokio::spawn(Arc::clone(&cache).refresh_loop(settings.refresh_interval()));

    let controller = Arc::new(Controller::new(
        vms,
        Arc::clone(&cache),
        Arc::new(SystemRunner),
        settings.launch.clone(),
    ));

    let listener = TcpListener::bind(&settings.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind))?;
    info!(
        bind = %settings.bind,
        interval_secs = settings.refresh_interval().as_secs(),
        "QEMU instance tracker starting"
    );

    server::serve(listener, AppState { cache, controller })
        .await
        .context("HTTP server failed")
}
