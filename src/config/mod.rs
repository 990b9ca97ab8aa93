mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use crate::progress::MAX_LENGTH;
use crate::transcode::{resolve_ffmpeg, ProgressSettings, TranscodeOptions};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = ["./m3u8dl.toml", "~/.config/m3u8dl/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.extension.trim_start_matches('.').is_empty() {
        anyhow::bail!("Output extension cannot be empty");
    }

    if config.progress.throttle_ms == 0 {
        anyhow::bail!("Progress throttle cannot be 0");
    }

    if config.progress.spinner_ms == 0 {
        anyhow::bail!("Spinner interval cannot be 0");
    }

    if let Some(length) = config.progress.length {
        if length > MAX_LENGTH {
            anyhow::bail!("Progress length cannot exceed {} columns", MAX_LENGTH);
        }
    }

    if let Some(dir) = &config.output_dir {
        if !dir.is_dir() {
            tracing::warn!("Output directory does not exist: {:?}", dir);
        }
    }

    Ok(())
}

impl Config {
    /// Supervisor options derived from this configuration.
    pub fn transcode_options(&self) -> TranscodeOptions {
        TranscodeOptions {
            ffmpeg: resolve_ffmpeg(self.ffmpeg_path.as_deref()),
            proxy: self.effective_proxy().map(str::to_string),
            extension: self.extension.clone(),
            output_dir: self.output_dir.clone(),
            progress: ProgressSettings {
                length: self.progress.length,
                throttle: Duration::from_millis(self.progress.throttle_ms),
                spinner_interval: Duration::from_millis(self.progress.spinner_ms),
                remain: self.progress.remain,
                headless: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m3u8dl.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.effective_proxy(), Some("localhost:1087"));
        assert_eq!(config.extension, "ts");
        assert_eq!(config.progress.throttle_ms, 200);
        assert_eq!(config.progress.spinner_ms, 100);
        assert!(config.progress.remain);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let (_dir, path) = write_config("");
        let config = load_config(&path).unwrap();
        assert_eq!(config.effective_proxy(), Some("localhost:1087"));
        assert_eq!(config.extension, "ts");
    }

    #[test]
    fn test_full_config() {
        let (_dir, path) = write_config(
            r#"
proxy = "127.0.0.1:8118"
extension = "mp4"
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"

[progress]
throttle_ms = 50
remain = false
length = 100
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.effective_proxy(), Some("127.0.0.1:8118"));
        assert_eq!(config.progress.length, Some(100));

        let options = config.transcode_options();
        assert_eq!(options.ffmpeg, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(options.extension, "mp4");
        assert_eq!(options.progress.throttle, Duration::from_millis(50));
        assert!(!options.progress.remain);
    }

    #[test]
    fn test_empty_proxy_disables() {
        let (_dir, path) = write_config("proxy = \"\"");
        let config = load_config(&path).unwrap();
        assert_eq!(config.effective_proxy(), None);
        assert_eq!(config.transcode_options().proxy, None);
    }

    #[test]
    fn test_rejects_empty_extension() {
        let (_dir, path) = write_config("extension = \".\"");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_rejects_zero_throttle() {
        let (_dir, path) = write_config("[progress]\nthrottle_ms = 0");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_rejects_oversized_length() {
        let (_dir, path) = write_config("[progress]\nlength = 100000");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("cannot exceed 4096"));

        let (_dir, path) = write_config("[progress]\nlength = 4096");
        assert!(load_config(&path).is_ok());
    }

    #[test]
    fn test_malformed_file() {
        let (_dir, path) = write_config("proxy = [");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_or_default(Some(&dir.path().join("nope.toml")));
        assert!(result.is_err());
    }
}
