//! Config modules for the application.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
}

impl AppConfig {
    /// Loads the configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Loads the configuration from a TOML file, falling back to defaults
    /// if the file does not exist. A file that exists but fails to parse is
    /// still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(
                "Config file {} not found, using default configuration",
                path.display()
            );
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind the HTTP listener to.
    pub host: String,
    /// Port for the HTTP listener.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    /// Resolves the configured host/port pair into a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| eyre::eyre!("Invalid server address: {}", e))
    }
}

/// The encoder invocation, kept as one immutable value handed to the stream
/// relay. Each field maps to one slot of the fixed ffmpeg argument vector.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EncoderConfig {
    /// Path to the encoder binary.
    pub program: String,
    /// Capture backend passed to `-f` (e.g. `pulse`, `alsa`, `dshow`).
    pub backend: String,
    /// Input device identifier passed to `-i`. There is no device discovery;
    /// the operator must set this to match their local hardware.
    pub device: String,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u8,
    /// Target bitrate, in ffmpeg notation (e.g. `192k`).
    pub bitrate: String,
    /// Output container format.
    pub format: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            backend: "pulse".to_string(),
            device: "default".to_string(),
            sample_rate: 44_100,
            channels: 1,
            bitrate: "192k".to_string(),
            format: "mp3".to_string(),
        }
    }
}
