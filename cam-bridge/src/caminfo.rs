//! Loading and caching of camera calibration parameters.
//!
//! Calibration files use the ROS camera calibration YAML layout. Loading
//! is permissive: any failure is logged and the store falls back to an
//! uncalibrated snapshot, so a missing or bad calibration never prevents
//! the bridge from publishing frames.

use opencv_ros_camera::RosCameraInfo;
use tracing::{info, warn};

use cam_bridge_types::Calibration;

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("unsupported calibration URL scheme \"{0}\"")]
    UnsupportedScheme(String),
    #[error("calibration matrix has wrong shape: expected {expected} values, got {actual}")]
    WrongShape { expected: usize, actual: usize },
    #[error("lookup error on variable: {source}")]
    ShellExpandLookupVarError {
        #[from]
        source: shellexpand::LookupError<std::env::VarError>,
    },
    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
    #[error("YAML error: {source}")]
    YamlError {
        #[from]
        source: serde_yaml::Error,
    },
}

/// Caches the intrinsic calibration of one named camera.
///
/// Loaded once at startup and immutable afterwards, so snapshots can be
/// taken concurrently with acquisition.
pub struct CalibrationStore {
    camera_name: String,
    calibration: Calibration,
}

impl CalibrationStore {
    /// Load the calibration for `camera_name` from `url`.
    ///
    /// With no URL, or when loading fails, the store holds the
    /// uncalibrated default snapshot.
    pub fn new(camera_name: &str, url: Option<&str>) -> Self {
        let calibration = match url {
            None => Calibration::default(),
            Some(url) if url.is_empty() => Calibration::default(),
            Some(url) => match load_from_url(url) {
                Ok(calibration) => {
                    info!(
                        "loaded {}x{} calibration for camera \"{camera_name}\" from \"{url}\"",
                        calibration.width, calibration.height
                    );
                    calibration
                }
                Err(e) => {
                    warn!(
                        "could not load calibration for camera \"{camera_name}\" \
                         from \"{url}\": {e}; continuing uncalibrated"
                    );
                    Calibration::default()
                }
            },
        };
        Self {
            camera_name: camera_name.to_string(),
            calibration,
        }
    }

    /// A store over an already-loaded calibration.
    pub fn with_calibration(camera_name: &str, calibration: Calibration) -> Self {
        Self {
            camera_name: camera_name.to_string(),
            calibration,
        }
    }

    pub fn camera_name(&self) -> &str {
        &self.camera_name
    }

    /// Snapshot of the cached calibration parameters.
    pub fn calibration(&self) -> Calibration {
        self.calibration.clone()
    }
}

fn load_from_url(url_str: &str) -> Result<Calibration, CalibrationError> {
    let path = match url::Url::parse(url_str) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|_| CalibrationError::UnsupportedScheme(url.scheme().to_string()))?,
        Ok(url) => {
            return Err(CalibrationError::UnsupportedScheme(url.scheme().to_string()));
        }
        // Not a URL at all: treat it as a filesystem path.
        Err(_) => std::path::PathBuf::from(shellexpand::full(url_str)?.to_string()),
    };
    let buf = std::fs::read_to_string(&path)?;
    parse_ros_yaml(&buf)
}

/// Parse a ROS camera calibration YAML document.
fn parse_ros_yaml(buf: &str) -> Result<Calibration, CalibrationError> {
    let info: RosCameraInfo<f64> = serde_yaml::from_str(buf)?;
    Ok(Calibration {
        width: info.image_width as u32,
        height: info.image_height as u32,
        distortion_model: info.distortion_model.clone(),
        d: info.distortion_coefficients.data.clone(),
        k: to_array::<9>(&info.camera_matrix.data)?,
        r: to_array::<9>(&info.rectification_matrix.data)?,
        p: to_array::<12>(&info.projection_matrix.data)?,
    })
}

fn to_array<const N: usize>(data: &[f64]) -> Result<[f64; N], CalibrationError> {
    data.try_into().map_err(|_| CalibrationError::WrongShape {
        expected: N,
        actual: data.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CAMERA_YAML: &str = include_str!("../tests/data/camera.yaml");

    #[test]
    fn parses_ros_yaml() {
        let cal = parse_ros_yaml(CAMERA_YAML).unwrap();
        assert_eq!(cal.width, 640);
        assert_eq!(cal.height, 480);
        assert_eq!(cal.distortion_model, "plumb_bob");
        assert!(cal.is_calibrated());
        assert!((cal.k[0] - 430.21554970319971).abs() < 1e-12);
        assert_eq!(cal.d.len(), 5);
        assert_eq!(cal.r[0], 1.0);
    }

    #[test]
    fn store_without_url_is_uncalibrated() {
        let store = CalibrationStore::new("camera", None);
        assert_eq!(store.camera_name(), "camera");
        assert!(!store.calibration().is_calibrated());
    }

    #[test]
    fn store_loads_plain_path_and_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera.yaml");
        let mut fd = std::fs::File::create(&path).unwrap();
        fd.write_all(CAMERA_YAML.as_bytes()).unwrap();
        drop(fd);

        let store = CalibrationStore::new("camera", Some(path.to_str().unwrap()));
        assert!(store.calibration().is_calibrated());

        let file_url = format!("file://{}", path.display());
        let store = CalibrationStore::new("camera", Some(&file_url));
        assert!(store.calibration().is_calibrated());
        assert_eq!(store.calibration().width, 640);
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let store = CalibrationStore::new("camera", Some("/nonexistent/camera.yaml"));
        assert!(!store.calibration().is_calibrated());
    }

    #[test]
    fn malformed_yaml_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera.yaml");
        std::fs::write(&path, "not: [valid camera info").unwrap();
        let store = CalibrationStore::new("camera", Some(path.to_str().unwrap()));
        assert!(!store.calibration().is_calibrated());
    }

    #[test]
    fn unsupported_scheme_is_an_error() {
        let err = load_from_url("package://some_pkg/camera.yaml")
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, CalibrationError::UnsupportedScheme(_)));
    }

    #[test]
    fn wrong_matrix_shape_is_an_error() {
        let bad = CAMERA_YAML.replace(
            "  rows: 3\n  cols: 3\n  data: [430.21554970319971,",
            "  rows: 3\n  cols: 3\n  data: [",
        );
        let err = parse_ros_yaml(&bad).map(|_| ()).unwrap_err();
        assert!(matches!(err, CalibrationError::WrongShape { .. }));
    }
}
