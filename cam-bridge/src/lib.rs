//! Bridge a GigE machine vision camera onto a message bus.
//!
//! The bridge connects to one camera by serial number, configures
//! full-sensor raw capture, and continuously republishes frames as RGB8
//! [cam_bridge_types::ImageMessage]s, each paired with a
//! [cam_bridge_types::CameraInfoMessage] carrying the calibration for
//! that frame.

use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

pub mod acquisition;
pub mod bus;
pub mod caminfo;
pub mod config;
pub mod publish;
pub mod session;

pub use acquisition::{AcquisitionState, AcquisitionStatus};
pub use config::BridgeConfig;

use acquisition::{AcquisitionHandle, AcquisitionOptions};
use bus::MessageSink;
use cam_bridge_types::{CameraInfoMessage, ImageMessage};
use cam_iface::{Camera, CameraModule};
use caminfo::CalibrationStore;
use publish::{FramePublisher, InfoEmitter};
use session::CameraSession;

/// A configured camera session with its running acquisition worker.
pub struct Bridge<C: Camera> {
    // Field order matters: dropping joins the worker before the session
    // releases the device.
    handle: AcquisitionHandle,
    session: CameraSession<C>,
}

impl<C: Camera + 'static> Bridge<C> {
    /// Configure the camera and start acquiring.
    ///
    /// Published images go to `frame_sink`, the paired calibration info to
    /// `info_sink`.
    pub fn start<M, FS, IS>(
        module: &mut M,
        cfg: &BridgeConfig,
        frame_sink: FS,
        info_sink: IS,
    ) -> anyhow::Result<Self>
    where
        M: CameraModule<CameraType = C>,
        FS: MessageSink<ImageMessage> + 'static,
        IS: MessageSink<CameraInfoMessage> + 'static,
    {
        debug!(
            "frame rate ({} fps) and skip_frames ({}) are accepted but not enforced",
            cfg.fps, cfg.skip_frames
        );

        let store = Arc::new(CalibrationStore::new(
            &cfg.frame_id,
            cfg.camera_info_url.as_deref(),
        ));

        let session = CameraSession::configure(module, cfg)
            .with_context(|| format!("configuring camera with serial {}", cfg.serial))?;

        let publisher = FramePublisher::new(frame_sink);
        let info_emitter = InfoEmitter::new(store, cfg.frame_id.clone(), info_sink);
        let handle = acquisition::spawn(
            session.camera(),
            publisher,
            info_emitter,
            AcquisitionOptions {
                frame_id: cfg.frame_id.clone(),
                max_consecutive_failures: cfg.max_consecutive_failures,
            },
        )
        .context("spawning acquisition worker")?;

        Ok(Bridge { session, handle })
    }

    pub fn status(&self) -> AcquisitionStatus {
        self.handle.status()
    }

    /// Stop the acquisition worker (joining it), then stop capture and
    /// release the device.
    pub fn shutdown(mut self) {
        self.handle.stop();
        self.session.teardown();
    }
}
