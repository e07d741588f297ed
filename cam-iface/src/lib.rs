//! Camera interface trait definitions for GigE machine vision cameras.
//!
//! The traits here form the seam between the bridge and a vendor camera
//! SDK: a [CameraModule] enumerates and connects to devices by serial
//! number, and a [Camera] is one connected device which can be configured,
//! started, and polled for raw frames.

use machine_vision_formats as formats;

mod frame;
pub use frame::RawFrame;

// ---------------------------
// errors

pub type Result<M> = std::result::Result<M, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no camera found with serial {0}")]
    SerialNotFound(u32),
    #[error("Timeout")]
    Timeout,
    /// A transient failure retrieving a single frame.
    #[error("FrameError({0})")]
    FrameError(String),
    #[error("ConversionError({source})")]
    ConversionError {
        #[from]
        source: convert_image::Error,
    },
    #[error("CamIfaceError({0})")]
    CamIfaceError(String),

    #[error("{0}")]
    IoError(#[from] std::io::Error),
}

fn _test_error_is_send() {
    // Compile-time test to ensure Error implements Send trait.
    fn implements<T: Send>() {}
    implements::<Error>();
}

impl<'a> From<&'a str> for Error {
    fn from(orig: &'a str) -> Error {
        Error::CamIfaceError(orig.to_string())
    }
}

// ---------------------------
// DeviceInfo

/// Descriptive information reported by a connected device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub serial: u32,
    pub model: String,
    pub vendor: String,
    pub sensor: String,
    pub sensor_resolution: String,
    pub firmware_version: String,
    pub firmware_build_time: String,
    /// GigE Vision specification version (major, minor).
    pub gige_version: (u32, u32),
    pub user_defined_name: String,
    pub mac_address: [u8; 6],
    pub ip_address: std::net::Ipv4Addr,
    pub subnet_mask: std::net::Ipv4Addr,
    pub default_gateway: std::net::Ipv4Addr,
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = &self.mac_address;
        write!(
            f,
            "{} {} (serial {}), sensor {} ({}), firmware {} ({}), \
             GigE {}.{}, name \"{}\", MAC {:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}, \
             IP {} mask {} gateway {}",
            self.vendor,
            self.model,
            self.serial,
            self.sensor,
            self.sensor_resolution,
            self.firmware_version,
            self.firmware_build_time,
            self.gige_version.0,
            self.gige_version.1,
            self.user_defined_name,
            m[0],
            m[1],
            m[2],
            m[3],
            m[4],
            m[5],
            self.ip_address,
            self.subnet_mask,
            self.default_gateway,
        )
    }
}

// ---------------------------
// SensorBounds

/// The maximum capture geometry supported by a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorBounds {
    pub max_width: u32,
    pub max_height: u32,
}

// ---------------------------
// CaptureSettings

/// A requested capture region and pixel format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    /// the column offset of the capture region relative to the sensor
    pub offset_x: u32,
    /// the row offset of the capture region relative to the sensor
    pub offset_y: u32,
    /// number of columns in the image
    pub width: u32,
    /// number of rows in the image
    pub height: u32,
    pub pixel_format: formats::PixFmt,
}

// ---------------------------
// CameraModule

/// A module for opening cameras (e.g. a vendor SDK context).
pub trait CameraModule {
    type CameraType: Camera;

    fn name(&self) -> &str;
    fn camera_infos(&self) -> Result<Vec<Box<dyn CameraInfo>>>;
    /// Resolve the camera with the given serial number and connect to it.
    fn camera_by_serial(&mut self, serial: u32) -> Result<Self::CameraType>;
}

// ---------------------------
// CameraInfo

pub trait CameraInfo {
    fn serial(&self) -> u32;
    fn model(&self) -> &str;
    fn vendor(&self) -> &str;
}

// ---------------------------
// Camera

/// One connected device.
///
/// The handle is only valid between connect (see
/// [CameraModule::camera_by_serial]) and [Camera::disconnect].
pub trait Camera: CameraInfo + Send {
    /// Fetch the device descriptor for diagnostic logging.
    fn device_info(&self) -> Result<DeviceInfo>;
    /// Return the sensor capability bounds.
    fn sensor_bounds(&self) -> Result<SensorBounds>;
    /// Return the device's native raw (unprocessed) pixel format.
    fn raw_pixel_format(&self) -> Result<formats::PixFmt>;
    fn set_capture_settings(&mut self, settings: &CaptureSettings) -> Result<()>;

    fn start_capture(&mut self) -> Result<()>;
    /// Stop streaming. Safe to call when capture was never started.
    fn stop_capture(&mut self) -> Result<()>;

    /// Synchronous (blocking) acquisition of one raw frame.
    fn retrieve_frame(&mut self) -> Result<RawFrame>;

    /// Release the device. Safe to call more than once.
    fn disconnect(&mut self) -> Result<()>;
}
