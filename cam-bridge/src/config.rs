use serde::{Deserialize, Serialize};

/// The bridge configuration error type.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
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
    #[error("TOML deserialization error: {source}")]
    TomlDeError {
        #[from]
        source: toml::de::Error,
    },
}

fn default_fps() -> f64 {
    10.0
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_frame_id() -> String {
    "camera".to_string()
}

fn default_max_consecutive_failures() -> u32 {
    50
}

/// Runtime configuration of the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Serial number of the camera to open.
    pub serial: u32,
    /// Requested frame rate. Accepted for compatibility but not enforced:
    /// the device free-runs and publish latency throttles acquisition.
    #[serde(default = "default_fps")]
    pub fps: f64,
    /// Accepted for compatibility; the acquisition loop does not skip
    /// frames.
    #[serde(default)]
    pub skip_frames: u32,
    /// Fallback capture width, used only when the sensor capability bounds
    /// cannot be queried. Capture otherwise runs at full sensor
    /// resolution.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Fallback capture height, see `width`.
    #[serde(default = "default_height")]
    pub height: u32,
    /// Frame-of-reference identifier carried on every published message.
    #[serde(default = "default_frame_id")]
    pub frame_id: String,
    /// URL of the camera calibration file (`file://...` or a plain path,
    /// which may contain shell variables such as `~`, `$A`, or `${B}`).
    #[serde(default)]
    pub camera_info_url: Option<String>,
    /// Stop acquisition after this many consecutive per-frame failures.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl BridgeConfig {
    /// A configuration with defaults for everything except the serial
    /// number.
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            fps: default_fps(),
            skip_frames: 0,
            width: default_width(),
            height: default_height(),
            frame_id: default_frame_id(),
            camera_info_url: None,
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }

    /// Read a configuration from a TOML file.
    ///
    /// The path can contain shell variables.
    pub fn from_toml_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let pathstr = path.as_ref().to_string_lossy();
        let expanded = shellexpand::full(&pathstr)?;
        let buf = std::fs::read_to_string(expanded.as_ref())?;
        let cfg: BridgeConfig = toml::from_str(&buf)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg: BridgeConfig = toml::from_str("serial = 123").unwrap();
        assert_eq!(cfg.serial, 123);
        assert_eq!(cfg.fps, 10.0);
        assert_eq!(cfg.skip_frames, 0);
        assert_eq!(cfg.width, 640);
        assert_eq!(cfg.height, 480);
        assert_eq!(cfg.frame_id, "camera");
        assert!(cfg.camera_info_url.is_none());
        assert_eq!(cfg.max_consecutive_failures, 50);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let r: Result<BridgeConfig, _> = toml::from_str("serial = 1\nbogus = true");
        assert!(r.is_err());
    }

    #[test]
    fn config_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        let mut fd = std::fs::File::create(&path).unwrap();
        fd.write_all(b"serial = 77\nframe_id = \"stereo_left\"\nfps = 30.0\n")
            .unwrap();
        drop(fd);

        let cfg = BridgeConfig::from_toml_path(&path).unwrap();
        assert_eq!(cfg.serial, 77);
        assert_eq!(cfg.frame_id, "stereo_left");
        assert_eq!(cfg.fps, 30.0);
    }
}
