//! The connect/configure/start/stop lifecycle of one device.

use std::sync::Arc;

use machine_vision_formats::PixFmt;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use cam_iface::{Camera, CameraModule, CaptureSettings, SensorBounds};

use crate::config::BridgeConfig;

/// Owns the device handle for the lifetime of the bridge.
///
/// All device access is serialized through one lock: the acquisition
/// worker holds it during retrieval, the control path during setup and
/// teardown.
pub struct CameraSession<C: Camera> {
    camera: Arc<Mutex<C>>,
    capture_width: u32,
    capture_height: u32,
    torn_down: bool,
}

impl<C: Camera> CameraSession<C> {
    /// Connect to the configured camera and bring it to streaming.
    ///
    /// Only failure to resolve or connect to the device is returned as an
    /// error. The remaining steps are best-effort: a failure is logged
    /// and configuration continues, leaving the session degraded.
    /// Sustained retrieval failures are then escalated by the acquisition
    /// loop rather than here.
    pub fn configure<M>(module: &mut M, cfg: &BridgeConfig) -> cam_iface::Result<Self>
    where
        M: CameraModule<CameraType = C>,
    {
        let mut camera = module.camera_by_serial(cfg.serial)?;

        match camera.device_info() {
            Ok(device_info) => info!("{device_info}"),
            Err(e) => warn!("could not read device info: {e}"),
        }

        let bounds = match camera.sensor_bounds() {
            Ok(bounds) => bounds,
            Err(e) => {
                warn!("could not query sensor bounds ({e}), using configured {}x{}",
                    cfg.width, cfg.height);
                SensorBounds {
                    max_width: cfg.width,
                    max_height: cfg.height,
                }
            }
        };

        let pixel_format = match camera.raw_pixel_format() {
            Ok(pixel_format) => pixel_format,
            Err(e) => {
                warn!("could not query raw pixel format ({e}), requesting Mono8");
                PixFmt::Mono8
            }
        };

        // Full-sensor raw capture; color reconstruction happens on the
        // host during acquisition.
        let settings = CaptureSettings {
            offset_x: 0,
            offset_y: 0,
            width: bounds.max_width,
            height: bounds.max_height,
            pixel_format,
        };
        info!(
            "requesting {}x{} {} capture",
            settings.width, settings.height, settings.pixel_format
        );
        if let Err(e) = camera.set_capture_settings(&settings) {
            warn!("capture format rejected: {e}");
        }

        if let Err(e) = camera.start_capture() {
            warn!("could not start capture: {e}");
        }

        Ok(Self {
            camera: Arc::new(Mutex::new(camera)),
            capture_width: settings.width,
            capture_height: settings.height,
            torn_down: false,
        })
    }

    /// Shared handle for the acquisition worker.
    pub fn camera(&self) -> Arc<Mutex<C>> {
        self.camera.clone()
    }

    /// The negotiated capture geometry.
    pub fn capture_size(&self) -> (u32, u32) {
        (self.capture_width, self.capture_height)
    }

    /// Stop streaming and release the device.
    ///
    /// Idempotent and safe on a session whose capture never started. The
    /// acquisition worker must have been joined first so the device is not
    /// released while a retrieval is in flight.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        let mut camera = self.camera.lock();
        if let Err(e) = camera.stop_capture() {
            debug!("stop_capture during teardown: {e}");
        }
        if let Err(e) = camera.disconnect() {
            debug!("disconnect during teardown: {e}");
        }
    }
}

impl<C: Camera> Drop for CameraSession<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}
