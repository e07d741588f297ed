#[cfg(feature = "backend_emu")]
use cam_iface_emu as backend;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt};

use cam_bridge::bus::ChannelSink;
use cam_bridge::{AcquisitionState, Bridge, BridgeConfig};

/// Bridge a GigE machine vision camera onto a message bus.
#[derive(Debug, Parser)]
#[command(name = "cam-bridge", version)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Serial number of the camera to open (overrides the config file).
    #[arg(long)]
    serial: Option<u32>,

    /// Frame-of-reference identifier (overrides the config file).
    #[arg(long)]
    frame_id: Option<String>,

    /// Calibration URL (overrides the config file).
    #[arg(long)]
    camera_info_url: Option<String>,

    /// Stop after consuming this many frames. 0 means run forever.
    #[arg(long, default_value = "10")]
    num_frames: usize,
}

fn main() -> anyhow::Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "cam_bridge=info,cam_iface_emu=info,warn");
    }
    let collector = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(tracing_subscriber::filter::EnvFilter::from_default_env());
    tracing::subscriber::set_global_default(collector)?;

    let cli = Cli::parse();

    let mut cfg = match (&cli.config, cli.serial) {
        (Some(path), _) => BridgeConfig::from_toml_path(path)
            .with_context(|| format!("reading config file {}", path.display()))?,
        (None, Some(serial)) => BridgeConfig::new(serial),
        (None, None) => anyhow::bail!("either --config or --serial is required"),
    };
    if let Some(serial) = cli.serial {
        cfg.serial = serial;
    }
    if let Some(frame_id) = cli.frame_id {
        cfg.frame_id = frame_id;
    }
    if let Some(camera_info_url) = cli.camera_info_url {
        cfg.camera_info_url = Some(camera_info_url);
    }

    let mut module = backend::new_module()?;

    // Single-slot outbound channels: late consumers see the most recent
    // frame, not a backlog.
    let (frame_tx, frame_rx) = crossbeam_channel::bounded(1);
    let (info_tx, info_rx) = crossbeam_channel::bounded(1);

    let bridge = Bridge::start(
        &mut module,
        &cfg,
        ChannelSink::new(frame_tx),
        ChannelSink::new(info_tx),
    )?;

    let mut count = 0usize;
    let exit_err = loop {
        if cli.num_frames != 0 && count >= cli.num_frames {
            break None;
        }
        match frame_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(image) => {
                count += 1;
                info!(
                    "frame {}: {}x{} {} ({} bytes)",
                    image.seq,
                    image.width,
                    image.height,
                    image.encoding,
                    image.data.len()
                );
                let _ = info_rx.try_recv();
            }
            Err(_) => {
                let status = bridge.status();
                if status.state != AcquisitionState::Running {
                    break Some(anyhow::anyhow!(
                        "acquisition stopped: {:?} after {} frames",
                        status.state,
                        status.frames_published
                    ));
                }
                warn!("no frames for 5 s, still waiting");
            }
        }
    };

    bridge.shutdown();
    if let Some(e) = exit_err {
        return Err(e);
    }
    info!("done, consumed {count} frames");
    Ok(())
}
