//! Scanner configuration.
//!
//! Mirrors the inputs a host sets on the scanner: timing between decode
//! attempts, autostart, recognized formats and live capture constraints.

use crate::decode::{BarcodeFormat, DecodeHints};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default delay between decode attempts and between successful decodes.
pub const DEFAULT_SCAN_DELAY_MS: u64 = 500;

/// Configuration for a scanner instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Ask the capture device to keep autofocus on.
    pub autofocus_enabled: bool,
    /// Delay between decode attempts in milliseconds.
    pub time_between_scans_ms: u64,
    /// Delay after a successful decode in milliseconds.
    pub delay_between_scan_success_ms: u64,
    /// Ask for permission, pick a device and start scanning on init.
    pub autostart: bool,
    /// Barcode formats the decoder should look for.
    pub formats: Vec<BarcodeFormat>,
    /// Trade latency for recall.
    pub try_harder: bool,
    /// Constraints applied to the live stream once scanning runs.
    pub video_constraints: Option<VideoConstraints>,
    /// Name of the surface the preview is bound to.
    pub display_target: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            autofocus_enabled: true,
            time_between_scans_ms: DEFAULT_SCAN_DELAY_MS,
            delay_between_scan_success_ms: DEFAULT_SCAN_DELAY_MS,
            autostart: true,
            formats: vec![BarcodeFormat::QrCode],
            try_harder: false,
            video_constraints: None,
            display_target: "preview".to_string(),
        }
    }
}

impl ScannerConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.formats.is_empty() {
            return Err(ConfigError::NoFormats);
        }
        if self.display_target.trim().is_empty() {
            return Err(ConfigError::EmptyDisplayTarget);
        }
        if let Some(constraints) = &self.video_constraints {
            constraints.validate()?;
        }
        Ok(())
    }

    /// Decode hints derived from the configured formats and try-harder flag.
    pub fn hints(&self) -> DecodeHints {
        DecodeHints {
            possible_formats: self.formats.clone(),
            try_harder: self.try_harder,
        }
    }

    /// Options handed to every decoder instance.
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            delay_between_scan_attempts: Duration::from_millis(self.time_between_scans_ms),
            delay_between_scan_success: Duration::from_millis(self.delay_between_scan_success_ms),
            autofocus: self.autofocus_enabled,
        }
    }
}

/// Timing options for a continuous decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    pub delay_between_scan_attempts: Duration,
    pub delay_between_scan_success: Duration,
    pub autofocus: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ScannerConfig::default().reader_options()
    }
}

/// Which way a camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

/// Constraints applied to the tracks of a live stream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConstraints {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub facing_mode: Option<FacingMode>,
    pub zoom: Option<f64>,
}

impl VideoConstraints {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == Some(0) || self.height == Some(0) {
            return Err(ConfigError::InvalidDimensions);
        }
        if let Some(fps) = self.frame_rate {
            if !(fps > 0.0 && fps <= 120.0) {
                return Err(ConfigError::InvalidFrameRate);
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one barcode format must be configured")]
    NoFormats,
    #[error("display target name is empty")]
    EmptyDisplayTarget,
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Metrics server port (0 to disable).
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { port: 9090 }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.scanner.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = ScannerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.formats, vec![BarcodeFormat::QrCode]);
        assert!(config.autostart);
    }

    #[test]
    fn test_default_delays() {
        let options = ScannerConfig::default().reader_options();
        assert_eq!(options.delay_between_scan_attempts, Duration::from_millis(500));
        assert_eq!(options.delay_between_scan_success, Duration::from_millis(500));
    }

    #[test]
    fn test_empty_formats_invalid() {
        let config = ScannerConfig {
            formats: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoFormats)));
    }

    #[test]
    fn test_parse_toml() {
        let config = FileConfig::from_toml(
            r#"
            [scanner]
            autostart = false
            formats = ["EAN_13", "CODE_128"]
            time_between_scans_ms = 250

            [scanner.video_constraints]
            facing_mode = "environment"

            [metrics]
            port = 0
            "#,
        )
        .unwrap();

        assert!(!config.scanner.autostart);
        assert_eq!(
            config.scanner.formats,
            vec![BarcodeFormat::Ean13, BarcodeFormat::Code128]
        );
        assert_eq!(config.scanner.time_between_scans_ms, 250);
        assert_eq!(config.scanner.delay_between_scan_success_ms, 500);
        assert_eq!(
            config.scanner.video_constraints.unwrap().facing_mode,
            Some(FacingMode::Environment)
        );
        assert_eq!(config.metrics.port, 0);
    }

    #[test]
    fn test_invalid_constraints_rejected() {
        let result = FileConfig::from_toml(
            r#"
            [scanner.video_constraints]
            frame_rate = 0.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidFrameRate)));
    }
}
