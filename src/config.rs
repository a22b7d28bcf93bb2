//! # Configuration Management
//!
//! Loads the detector configuration from multiple sources:
//! - Default values (built into the code)
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (`APP_PIPELINE__THRESHOLD`, `APP_AUDIO__BLOCK_SIZE`, ...)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! The configuration is read once at startup and never mutated afterwards.
//! Everything that can make the pipeline degenerate is rejected by
//! [`AppConfig::validate`] before any audio is processed.
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: derive `Serialize`/`Deserialize` so the same structs round-trip
//!   through the `config` crate, TOML and JSON
//! - **impl Default**: the defaults double as the reference configuration
//! - **Result<T, E>**: every loader and validator reports failures instead of panicking

use crate::audio::filter::BiquadCoeffs;
use crate::error::{AppError, AppResult};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Longest delay line or display history accepted, in seconds of audio.
const MAX_BUFFER_SEC: f64 = 600.0;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub audio: AudioSettings,
    pub pipeline: PipelineSettings,
    pub display: DisplaySettings,
    pub notifier: NotifierSettings,
    pub source: SourceSettings,
    pub server: ServerConfig,
    pub indicator: IndicatorSettings,
}

/// Stream format expected from the acquisition layer.
///
/// ## Fields:
/// - `sample_rate`: frames per second (FS)
/// - `block_size`: frames per block handed to the processor (BLOCKSIZE)
/// - `channels`: interleaved channels per frame
/// - `channel`: which channel is analysed (0 = left, 1 = right)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub block_size: usize,
    pub channels: usize,
    pub channel: usize,
}

/// Delay, filter and detection parameters.
///
/// `feedback` holds `[a0, a1, a2]`; coefficients are normalized by `a0` when
/// the filter is built, so `a0` only has to be non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub delay_sec: f64,
    pub threshold: f64,
    pub feedforward: Vec<f64>,
    pub feedback: Vec<f64>,
}

/// Rolling display history length, in seconds of delayed audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    pub window_sec: f64,
}

/// Where marker datagrams go.
///
/// ## Fields:
/// - `bind`: local address of the sending socket (`0.0.0.0:0` = any port)
/// - `destinations`: one or more `host:port` receivers
/// - `marker`: the single payload byte (65 = ASCII `A`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierSettings {
    pub bind: String,
    pub destinations: Vec<String>,
    pub marker: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// RIFF/WAVE file
    Wav,
    /// Headerless little-endian signed 16-bit interleaved PCM
    Raw,
}

/// Block source used by the `detect` command.
///
/// `path = "-"` reads raw PCM from stdin. With `realtime` the capture thread
/// paces blocks at the block period instead of running as fast as possible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    pub kind: SourceKind,
    pub path: String,
    pub realtime: bool,
}

/// HTTP surface for the visualization collaborator.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: only local viewers (default)
/// - `host = "0.0.0.0"`: viewers on other machines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

/// Settings for the `listen` command that drives indicator LEDs.
///
/// ## Fields:
/// - `bind`: UDP address the marker datagrams arrive on
/// - `min_interval_ms`: debounce interval between two accepted markers
/// - `sysfs_leds`: LED class device names under `/sys/class/leds`
/// - `ec_enabled` / `ec_path` / `ec_offset`: embedded-controller LED via debugfs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSettings {
    pub bind: String,
    pub min_interval_ms: u64,
    pub sysfs_leds: Vec<String>,
    pub ec_enabled: bool,
    pub ec_path: String,
    pub ec_offset: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            audio: AudioSettings {
                sample_rate: 44100,
                block_size: 16,
                channels: 2,
                channel: 0,
            },
            pipeline: PipelineSettings {
                delay_sec: 0.2,
                threshold: 0.45,
                // Second-order Butterworth lowpass, ~100 Hz at 44.1 kHz
                feedforward: vec![
                    0.000_050_241_418_188_739_03,
                    0.000_100_482_836_377_478_06,
                    0.000_050_241_418_188_739_03,
                ],
                feedback: vec![1.0, -1.979_851_353_142_371, 0.980_052_318_815_125_8],
            },
            display: DisplaySettings { window_sec: 1.0 },
            notifier: NotifierSettings {
                bind: "0.0.0.0:0".to_string(),
                destinations: vec!["127.0.0.1:5005".to_string()],
                marker: b'A',
            },
            source: SourceSettings {
                kind: SourceKind::Raw,
                path: "-".to_string(),
                realtime: true,
            },
            server: ServerConfig {
                enabled: true,
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            indicator: IndicatorSettings {
                bind: "127.0.0.1:5005".to_string(),
                min_interval_ms: 100,
                sysfs_leds: Vec::new(),
                ec_enabled: false,
                ec_path: "/sys/kernel/debug/ec/ec0/io".to_string(),
                ec_offset: 12,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `config.toml` and the environment.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_PIPELINE__THRESHOLD=0.3`: lower the detection threshold
    /// - `APP_AUDIO__CHANNEL=1`: analyse the right channel
    /// - `APP_NOTIFIER__DESTINATIONS=127.0.0.1:5005,127.0.0.1:5006`: fan out markers
    /// - `HOST=0.0.0.0` / `PORT=3000`: deployment-platform overrides for the HTTP surface
    pub fn load() -> AppResult<Self> {
        Self::load_from("config")
    }

    /// Same as [`AppConfig::load`] with an explicit config file name.
    /// A missing file is not an error.
    pub fn load_from(file: &str) -> AppResult<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("notifier.destinations")
                    .with_list_parse_key("indicator.sysfs_leds")
                    .try_parsing(true),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration cannot degenerate the pipeline.
    ///
    /// ## What this checks:
    /// - sample rate, block size and channel count are non-zero; the selected
    ///   channel exists
    /// - the delay is positive, at most `MAX_BUFFER_SEC` and rounds to at
    ///   least one sample; the display window is positive and at most
    ///   `MAX_BUFFER_SEC`
    /// - both coefficient sets have exactly three entries, `a0 != 0`, and the
    ///   normalized filter is stable
    /// - the threshold is finite and positive
    /// - at least one notifier destination, and every address parses
    pub fn validate(&self) -> AppResult<()> {
        if self.audio.sample_rate == 0 {
            return Err(AppError::ConfigError("Sample rate cannot be 0".to_string()));
        }

        if self.audio.block_size == 0 {
            return Err(AppError::ConfigError("Block size must be greater than 0".to_string()));
        }

        if self.audio.channels == 0 {
            return Err(AppError::ConfigError("Channel count must be greater than 0".to_string()));
        }

        if self.audio.channel >= self.audio.channels {
            return Err(AppError::ConfigError(format!(
                "Channel index {} out of range for {} channel(s)",
                self.audio.channel, self.audio.channels
            )));
        }

        if !(self.pipeline.delay_sec.is_finite() && self.pipeline.delay_sec > 0.0) {
            return Err(AppError::ConfigError(format!(
                "delay_sec must be positive, got {}",
                self.pipeline.delay_sec
            )));
        }

        if self.pipeline.delay_sec > MAX_BUFFER_SEC {
            return Err(AppError::ConfigError(format!(
                "delay_sec {} exceeds the {} s limit",
                self.pipeline.delay_sec, MAX_BUFFER_SEC
            )));
        }

        if self.delay_samples() == 0 {
            return Err(AppError::ConfigError(format!(
                "delay_sec {} is shorter than one sample at {} Hz",
                self.pipeline.delay_sec, self.audio.sample_rate
            )));
        }

        if !(self.pipeline.threshold.is_finite() && self.pipeline.threshold > 0.0) {
            return Err(AppError::ConfigError(format!(
                "threshold must be a positive amplitude, got {}",
                self.pipeline.threshold
            )));
        }

        let coeffs = self.coefficients()?;
        if !coeffs.is_stable() {
            return Err(AppError::ConfigError(
                "Filter poles must lie strictly inside the unit circle".to_string(),
            ));
        }

        if !(self.display.window_sec.is_finite() && self.display.window_sec > 0.0) {
            return Err(AppError::ConfigError(
                "display.window_sec must be positive".to_string(),
            ));
        }

        if self.display.window_sec > MAX_BUFFER_SEC {
            return Err(AppError::ConfigError(format!(
                "display.window_sec {} exceeds the {} s limit",
                self.display.window_sec, MAX_BUFFER_SEC
            )));
        }

        self.notifier_destinations()?;
        self.notifier.bind.parse::<SocketAddr>().map_err(|e| {
            AppError::ConfigError(format!("Invalid notifier bind address '{}': {}", self.notifier.bind, e))
        })?;

        if self.server.enabled && self.server.port == 0 {
            return Err(AppError::ConfigError("Server port cannot be 0".to_string()));
        }

        Ok(())
    }

    /// Delay line capacity in samples (`delay_sec × sample_rate`, rounded).
    pub fn delay_samples(&self) -> usize {
        (self.pipeline.delay_sec * self.audio.sample_rate as f64).round() as usize
    }

    /// Rolling display history capacity in samples.
    pub fn history_capacity(&self) -> usize {
        ((self.display.window_sec * self.audio.sample_rate as f64).round() as usize).max(1)
    }

    /// Real-time budget for one block.
    pub fn block_period(&self) -> Duration {
        Duration::from_secs_f64(self.audio.block_size as f64 / self.audio.sample_rate as f64)
    }

    /// Normalized biquad coefficients built from the two coefficient lists.
    pub fn coefficients(&self) -> AppResult<BiquadCoeffs> {
        BiquadCoeffs::from_lists(&self.pipeline.feedforward, &self.pipeline.feedback)
    }

    /// Parsed notifier destinations; an empty list is a configuration error.
    pub fn notifier_destinations(&self) -> AppResult<Vec<SocketAddr>> {
        if self.notifier.destinations.is_empty() {
            return Err(AppError::ConfigError(
                "At least one notifier destination is required".to_string(),
            ));
        }

        self.notifier
            .destinations
            .iter()
            .map(|dest| {
                dest.parse::<SocketAddr>().map_err(|e| {
                    AppError::ConfigError(format!("Invalid notifier destination '{}': {}", dest, e))
                })
            })
            .collect()
    }

    /// Render the effective configuration as TOML (used by `print-config`).
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
