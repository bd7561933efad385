/// Application configuration
///
/// Loaded once at startup from a TOML file. Resolution order for the file:
/// 1. `FOOD_COMPARATOR_CONFIG` environment variable
/// 2. `<config dir>/food-comparator/config.toml`
///
/// A missing file is not an error; every field has a default.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::ean::BarcodeFormat;
use crate::capture::FacingMode;
use crate::error::ConfigError;

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "FOOD_COMPARATOR_CONFIG";

/// Directory name used under the OS config dir for all app files
pub const APP_DIR_NAME: &str = "food-comparator";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub lookup: LookupConfig,
    pub scanner: ScannerConfig,
    pub camera: CameraConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LookupConfig {
    /// Base URL; the barcode and `.json` are appended
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Languages tried for `product_name_<lang>` when `product_name` is empty
    pub name_languages: Vec<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://world.openfoodfacts.org/api/v0/product".to_string(),
            user_agent: format!("food-comparator/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 15,
            name_languages: vec!["fr".to_string(), "en".to_string()],
        }
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Formats handed to the recognizer; empty disables recognition
    pub formats: Vec<BarcodeFormat>,
    /// Number of horizontal lines sampled per frame
    pub scan_lines: u32,
    pub sample_interval_ms: u64,
    pub preview_interval_ms: u64,
    /// Close the scanner once a barcode has been read
    pub stop_after_detection: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            formats: vec![BarcodeFormat::Ean13, BarcodeFormat::Ean8, BarcodeFormat::UpcA],
            scan_lines: 15,
            sample_interval_ms: 1000,
            preview_interval_ms: 100,
            stop_after_detection: true,
        }
    }
}

impl ScannerConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(50))
    }

    pub fn preview_interval(&self) -> Duration {
        Duration::from_millis(self.preview_interval_ms.max(16))
    }
}

/// Where camera frames come from
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraSource {
    /// Native webcam if compiled in and present, else the frame folder
    #[default]
    Auto,
    Webcam,
    Frames,
    None,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub source: CameraSource,
    /// Folder of still images replayed as a video stream
    pub frames_dir: Option<PathBuf>,
    /// How long each still image is shown
    pub frame_hold_ms: u64,
    /// Force a specific native device
    pub device_index: Option<u32>,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: FacingMode,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: CameraSource::Auto,
            frames_dir: None,
            frame_hold_ms: 2000,
            device_index: None,
            ideal_width: 1920,
            ideal_height: 1080,
            facing: FacingMode::Environment,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load the configuration from the resolved path
    ///
    /// Returns the defaults when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse a specific config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content).map_err(|message| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

/// Resolve where the config file should live
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }
    app_config_dir().map(|dir| dir.join("config.toml"))
}

/// `<config dir>/food-comparator`
pub fn app_config_dir() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join(APP_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.scanner.sample_interval(), Duration::from_secs(1));
        assert!(config.scanner.stop_after_detection);
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [lookup]
            endpoint = "http://localhost:9000/product"

            [scanner]
            formats = ["ean_13"]
            sample_interval_ms = 500

            [camera]
            source = "frames"
            frames_dir = "/tmp/frames"
            facing = "user"
            "#,
        )
        .unwrap();

        assert_eq!(config.lookup.endpoint, "http://localhost:9000/product");
        assert_eq!(config.lookup.timeout_secs, 15);
        assert_eq!(config.scanner.formats, vec![BarcodeFormat::Ean13]);
        assert_eq!(config.scanner.sample_interval(), Duration::from_millis(500));
        assert_eq!(config.camera.source, CameraSource::Frames);
        assert_eq!(config.camera.frames_dir, Some(PathBuf::from("/tmp/frames")));
        assert_eq!(config.camera.facing, FacingMode::User);
        assert_eq!(config.camera.ideal_width, 1920);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(AppConfig::from_toml("[scanner]\nformats = [\"qr_code\"]").is_err());
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[camera]\nsource = 42").unwrap();

        match AppConfig::from_file(&path) {
            Err(ConfigError::Invalid { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected invalid config, got {:?}", other),
        }
    }
}
