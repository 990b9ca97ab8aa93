use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use m3u8dl_common::paths::DEFAULT_OUTPUT_EXTENSION;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Proxy as `host:port` for ffmpeg's HTTP(S) requests. An empty string
    /// disables the proxy.
    #[serde(default = "default_proxy")]
    pub proxy: Option<String>,

    /// Output file extension (default: ts)
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Explicit ffmpeg binary; searched in PATH when unset
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Directory for output files (default: current directory)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default)]
    pub progress: ProgressConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy: default_proxy(),
            extension: default_extension(),
            ffmpeg_path: None,
            output_dir: None,
            progress: ProgressConfig::default(),
        }
    }
}

impl Config {
    /// The proxy to inject, if any.
    pub fn effective_proxy(&self) -> Option<&str> {
        self.proxy
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

fn default_proxy() -> Option<String> {
    Some("localhost:1087".to_string())
}

fn default_extension() -> String {
    DEFAULT_OUTPUT_EXTENSION.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressConfig {
    /// Minimum milliseconds between redraws (default: 200)
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Milliseconds between frames of the waiting animation (default: 100)
    #[serde(default = "default_spinner_ms")]
    pub spinner_ms: u64,

    /// Show estimated time remaining (default: true)
    #[serde(default = "default_true")]
    pub remain: bool,

    /// Fixed bar width; follows the terminal when unset
    #[serde(default)]
    pub length: Option<usize>,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            spinner_ms: default_spinner_ms(),
            remain: true,
            length: None,
        }
    }
}

fn default_throttle_ms() -> u64 {
    200
}

fn default_spinner_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}
