//! Message types published by the camera bridge.
//!
//! Two outbound messages exist: [ImageMessage] for the frames themselves
//! and [CameraInfoMessage] for the calibration info paired with each
//! frame.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pixel encoding of a published image.
///
/// The bridge converts every capture to interleaved 8-bit RGB before
/// publishing, so this carries a single variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageEncoding {
    #[serde(rename = "rgb8")]
    Rgb8,
}

impl std::fmt::Display for ImageEncoding {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageEncoding::Rgb8 => write!(fmt, "rgb8"),
        }
    }
}

/// One published image frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMessage {
    /// time the frame was retrieved from the device
    pub stamp: DateTime<Utc>,
    /// frame-of-reference identifier, carried verbatim from configuration
    pub frame_id: String,
    /// sequence number, incremented by one per published frame
    pub seq: u64,
    /// width in pixels
    pub width: u32,
    /// height in pixels
    pub height: u32,
    /// number of bytes in an image row
    pub stride: u32,
    pub encoding: ImageEncoding,
    /// raw image data
    pub data: Vec<u8>,
}

/// Intrinsic calibration parameters of one camera.
///
/// Matrices are stored row-major: `k` and `r` are 3x3, `p` is 3x4. A
/// default-constructed value is the "uncalibrated" snapshot with every
/// coefficient zeroed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// image width the calibration was made for
    pub width: u32,
    /// image height the calibration was made for
    pub height: u32,
    pub distortion_model: String,
    /// distortion coefficients
    pub d: Vec<f64>,
    /// intrinsic camera matrix
    pub k: [f64; 9],
    /// rectification matrix
    pub r: [f64; 9],
    /// projection matrix
    pub p: [f64; 12],
}

impl Calibration {
    /// A calibration is populated when its leading intrinsic coefficient
    /// is non-zero.
    pub fn is_calibrated(&self) -> bool {
        self.k[0] != 0.0
    }
}

/// Calibration info paired with one published image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraInfoMessage {
    /// matches the stamp of the paired [ImageMessage]
    pub stamp: DateTime<Utc>,
    /// matches the frame id of the paired [ImageMessage]
    pub frame_id: String,
    pub calibration: Calibration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_calibration_is_unpopulated() {
        let cal = Calibration::default();
        assert!(!cal.is_calibrated());
        assert_eq!(cal.width, 0);
        assert_eq!(cal.height, 0);
        assert!(cal.d.is_empty());
    }

    #[test]
    fn leading_coefficient_is_the_populated_sentinel() {
        let mut cal = Calibration::default();
        cal.k[4] = 500.0;
        assert!(!cal.is_calibrated());
        cal.k[0] = 500.0;
        assert!(cal.is_calibrated());
    }

    #[test]
    fn encoding_displays_as_wire_name() {
        assert_eq!(ImageEncoding::Rgb8.to_string(), "rgb8");
    }
}
