//! Session configuration.
//!
//! Every field has a default, so a TOML file only needs the values it changes:
//!
//! ```
//! use handpatch::Config;
//!
//! let config = Config::from_toml_str("[audio]\nsample_rate = 44100\n").unwrap();
//! assert_eq!(config.audio.sample_rate, 44_100);
//! assert_eq!(config.pose.port, 8080);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub pose: PoseConfig,
    pub link: LinkConfig,
}

/// Processing context settings, reused for every replacement context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: usize,
    /// Capacity of the output ring buffer in milliseconds
    pub output_buffer_ms: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            output_buffer_ms: 100.0,
        }
    }
}

/// Pose detection endpoint and frame layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    pub host: String,
    pub port: u16,
    pub uri: String,
    /// Exact length of a pose frame in bytes
    pub frame_len: usize,
    pub left_mask: u8,
    pub right_mask: u8,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            uri: "/detect/hands".into(),
            frame_len: 17,
            left_mask: 0x1,
            right_mask: 0x2,
        }
    }
}

/// Reconnect behavior of the pose transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Fixed delay before every reconnect attempt
    pub reconnect_delay_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self { reconnect_delay_ms: 1_000 }
    }
}

impl LinkConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Config {
    /// Parse a TOML document. Missing sections and fields take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Set the context sample rate (builder pattern).
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.audio.sample_rate = sample_rate;
        self
    }

    /// Set the number of output channels (builder pattern).
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.audio.channels = channels;
        self
    }

    /// Set the fixed reconnect delay (builder pattern).
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.link.reconnect_delay_ms = delay.as_millis() as u64;
        self
    }
}
