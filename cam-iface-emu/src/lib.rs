//! Emulated camera backend.
//!
//! Implements the [cam_iface] traits entirely in software: frames are a
//! deterministic test pattern produced at a configurable interval. Useful
//! for integration tests and for running the bridge on machines without a
//! physical camera.

use std::time::Duration;

use machine_vision_formats::PixFmt;
use tracing::info;

use cam_iface::{
    Camera, CameraInfo, CameraModule, CaptureSettings, DeviceInfo, Error, RawFrame, Result,
    SensorBounds,
};

/// Serial number of the emulated device created by [new_module].
pub const DEFAULT_SERIAL: u32 = 14_080_011;

/// Sensor geometry of the emulated 1.3 MP device.
pub const SENSOR_WIDTH: u32 = 1288;
pub const SENSOR_HEIGHT: u32 = 964;

const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(10);

pub struct EmuModule {
    serials: Vec<u32>,
    frame_interval: Duration,
}

/// Open the emulated backend with a single device attached.
pub fn new_module() -> Result<EmuModule> {
    let module = EmuModule {
        serials: vec![DEFAULT_SERIAL],
        frame_interval: DEFAULT_FRAME_INTERVAL,
    };
    info!("{} emulated camera(s) found", module.serials.len());
    Ok(module)
}

impl EmuModule {
    /// An emulated bus with one device per serial number.
    pub fn with_serials(serials: Vec<u32>) -> EmuModule {
        EmuModule {
            serials,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }

    /// Set the pacing of [Camera::retrieve_frame] for cameras opened later.
    pub fn set_frame_interval(&mut self, frame_interval: Duration) {
        self.frame_interval = frame_interval;
    }
}

impl CameraModule for EmuModule {
    type CameraType = EmuCamera;

    fn name(&self) -> &str {
        "emu"
    }

    fn camera_infos(&self) -> Result<Vec<Box<dyn CameraInfo>>> {
        Ok(self
            .serials
            .iter()
            .map(|serial| {
                let info: Box<dyn CameraInfo> = Box::new(EmuCameraInfo { serial: *serial });
                info
            })
            .collect())
    }

    fn camera_by_serial(&mut self, serial: u32) -> Result<Self::CameraType> {
        if !self.serials.contains(&serial) {
            return Err(Error::SerialNotFound(serial));
        }
        Ok(EmuCamera {
            serial,
            settings: CaptureSettings {
                offset_x: 0,
                offset_y: 0,
                width: SENSOR_WIDTH,
                height: SENSOR_HEIGHT,
                pixel_format: PixFmt::BayerRG8,
            },
            frame_interval: self.frame_interval,
            connected: true,
            streaming: false,
            fno: 0,
        })
    }
}

struct EmuCameraInfo {
    serial: u32,
}

impl CameraInfo for EmuCameraInfo {
    fn serial(&self) -> u32 {
        self.serial
    }
    fn model(&self) -> &str {
        MODEL
    }
    fn vendor(&self) -> &str {
        VENDOR
    }
}

const MODEL: &str = "EmuCam GE-13S2C";
const VENDOR: &str = "cam-iface";

pub struct EmuCamera {
    serial: u32,
    settings: CaptureSettings,
    frame_interval: Duration,
    connected: bool,
    streaming: bool,
    fno: u64,
}

fn _test_camera_is_send() {
    // Compile-time test to ensure EmuCamera implements Send trait.
    fn implements<T: Send>() {}
    implements::<EmuCamera>();
}

impl CameraInfo for EmuCamera {
    fn serial(&self) -> u32 {
        self.serial
    }
    fn model(&self) -> &str {
        MODEL
    }
    fn vendor(&self) -> &str {
        VENDOR
    }
}

impl Camera for EmuCamera {
    fn device_info(&self) -> Result<DeviceInfo> {
        if !self.connected {
            return Err(Error::from("device not connected"));
        }
        let s = self.serial.to_be_bytes();
        Ok(DeviceInfo {
            serial: self.serial,
            model: MODEL.to_string(),
            vendor: VENDOR.to_string(),
            sensor: "emulated CMOS 1/3\"".to_string(),
            sensor_resolution: format!("{SENSOR_WIDTH}x{SENSOR_HEIGHT}"),
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            firmware_build_time: "n/a".to_string(),
            gige_version: (1, 2),
            user_defined_name: String::new(),
            mac_address: [0x00, 0x1e, s[0], s[1], s[2], s[3]],
            ip_address: std::net::Ipv4Addr::new(192, 168, 100, 2),
            subnet_mask: std::net::Ipv4Addr::new(255, 255, 255, 0),
            default_gateway: std::net::Ipv4Addr::new(192, 168, 100, 1),
        })
    }

    fn sensor_bounds(&self) -> Result<SensorBounds> {
        Ok(SensorBounds {
            max_width: SENSOR_WIDTH,
            max_height: SENSOR_HEIGHT,
        })
    }

    fn raw_pixel_format(&self) -> Result<PixFmt> {
        Ok(PixFmt::BayerRG8)
    }

    fn set_capture_settings(&mut self, settings: &CaptureSettings) -> Result<()> {
        if settings.offset_x + settings.width > SENSOR_WIDTH
            || settings.offset_y + settings.height > SENSOR_HEIGHT
        {
            return Err(Error::CamIfaceError(format!(
                "capture region {}x{}+{}+{} exceeds sensor {}x{}",
                settings.width,
                settings.height,
                settings.offset_x,
                settings.offset_y,
                SENSOR_WIDTH,
                SENSOR_HEIGHT
            )));
        }
        match settings.pixel_format {
            PixFmt::Mono8 | PixFmt::BayerRG8 => {}
            other => {
                return Err(Error::CamIfaceError(format!(
                    "unsupported emulated pixel format {other}"
                )));
            }
        }
        self.settings = *settings;
        Ok(())
    }

    fn start_capture(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::from("device not connected"));
        }
        self.streaming = true;
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<()> {
        self.streaming = false;
        Ok(())
    }

    fn retrieve_frame(&mut self) -> Result<RawFrame> {
        if !self.streaming {
            return Err(Error::FrameError("capture not started".to_string()));
        }
        std::thread::sleep(self.frame_interval);
        let width = self.settings.width;
        let height = self.settings.height;
        let buf = test_pattern(width, height, self.fno);
        self.fno += 1;
        RawFrame::new(width, height, width as usize, buf, self.settings.pixel_format).ok_or_else(
            || {
                Error::CamIfaceError(format!(
                    "unsupported emulated pixel format {}",
                    self.settings.pixel_format
                ))
            },
        )
    }

    fn disconnect(&mut self) -> Result<()> {
        self.streaming = false;
        self.connected = false;
        Ok(())
    }
}

/// A diagonal gradient which shifts by one pixel per frame.
fn test_pattern(width: u32, height: u32, fno: u64) -> Vec<u8> {
    let stride = width as usize;
    let mut image_data = vec![0u8; stride * height as usize];
    for (row, line) in image_data.chunks_exact_mut(stride).enumerate() {
        for (col, px) in line.iter_mut().enumerate() {
            *px = ((row + col + fno as usize) % 256) as u8;
        }
    }
    image_data
}
