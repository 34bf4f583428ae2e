//! Application state
//!
//! Configuration loading and the components shared by HTTP handlers

use crate::error::{Error, Result};
use crate::printer_status::PrinterStatusCache;
use crate::snapshot_catalog::SnapshotCatalog;
use crate::thumbnail_pipeline::{ThumbnailPipeline, DEFAULT_THUMBNAIL_SIZE};
use crate::video_assembler::EncodeSettings;
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Env var pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "TIMELAPSE_CONFIG";
/// Config file name under `~/.config`
pub const CONFIG_FILE_NAME: &str = "timelapse-serial.toml";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial device the printer writes to (command loop off when unset)
    #[serde(alias = "SerialPort")]
    pub serial_port: Option<PathBuf>,
    #[serde(alias = "BaudRate")]
    pub baud_rate: u32,
    /// Root of all session folders
    #[serde(alias = "OutputDir")]
    pub output_dir: PathBuf,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Concurrent thumbnail tasks per request
    pub thumbnail_max_workers: usize,
    /// Thumbnail bounding box in pixels
    pub thumbnail_size: u32,
    /// PrusaLink base URL (status cache off when unset)
    pub printer_url: Option<String>,
    pub prusa_link_key: Option<String>,
    pub printer_poll_interval_secs: u64,
    /// Webcam stream shown next to the gallery
    pub live_feed_url: Option<String>,
    pub framerate: u32,
    pub crf: u32,
    pub resolution: String,
    pub gphoto2_bin: String,
    pub ffmpeg_bin: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let encode = EncodeSettings::default();
        Self {
            serial_port: None,
            baud_rate: 115200,
            output_dir: PathBuf::new(),
            host: "0.0.0.0".to_string(),
            port: 3025,
            thumbnail_max_workers: 8,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            printer_url: None,
            prusa_link_key: None,
            printer_poll_interval_secs: 5,
            live_feed_url: None,
            framerate: encode.framerate,
            crf: encode.crf,
            resolution: encode.resolution,
            gphoto2_bin: "gphoto2".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the config file, then process env
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_path);
        Self::load_from(path.as_deref(), |key| std::env::var(key).ok())
    }

    /// Load with an explicit file and env lookup
    pub fn load_from<F>(path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(p) if p.is_file() => Self::from_file(p)?,
            Some(p) => {
                tracing::debug!(path = %p.display(), "No config file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file over the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid {}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), "Config file loaded");
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env("SERIAL_PORT") {
            self.serial_port = Some(PathBuf::from(v));
        }
        if let Some(v) = env("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = env("HOST") {
            self.host = v;
        }
        if let Some(v) = env("PRINTER_URL") {
            self.printer_url = Some(v);
        }
        if let Some(v) = env("PRUSA_LINK_KEY") {
            self.prusa_link_key = Some(v);
        }
        if let Some(v) = env("LIVE_FEED_URL") {
            self.live_feed_url = Some(v);
        }
        if let Some(v) = env("RESOLUTION") {
            self.resolution = v;
        }
        if let Some(v) = env("GPHOTO2_BIN") {
            self.gphoto2_bin = v;
        }
        if let Some(v) = env("FFMPEG_BIN") {
            self.ffmpeg_bin = v;
        }

        parse_env(&env, "BAUD_RATE", &mut self.baud_rate)?;
        parse_env(&env, "PORT", &mut self.port)?;
        parse_env(&env, "THUMBNAIL_MAX_WORKERS", &mut self.thumbnail_max_workers)?;
        parse_env(&env, "THUMBNAIL_SIZE", &mut self.thumbnail_size)?;
        parse_env(&env, "PRINTER_POLL_INTERVAL_SECS", &mut self.printer_poll_interval_secs)?;
        parse_env(&env, "FRAMERATE", &mut self.framerate)?;
        parse_env(&env, "CRF", &mut self.crf)?;
        Ok(())
    }

    /// Empty strings mean "not set"
    fn normalize(&mut self) {
        fn blank_to_none(v: &mut Option<String>) {
            if v.as_deref().map(str::trim).map_or(false, str::is_empty) {
                *v = None;
            }
        }
        blank_to_none(&mut self.printer_url);
        blank_to_none(&mut self.prusa_link_key);
        blank_to_none(&mut self.live_feed_url);
        if self
            .serial_port
            .as_ref()
            .map_or(false, |p| p.as_os_str().is_empty())
        {
            self.serial_port = None;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::Config(
                "output_dir is not set (config file or OUTPUT_DIR)".to_string(),
            ));
        }
        if self.printer_poll_interval_secs == 0 {
            return Err(Error::Config(
                "printer_poll_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings {
            framerate: self.framerate,
            crf: self.crf,
            resolution: self.resolution.clone(),
        }
    }

    pub fn printer_poll_interval(&self) -> Duration {
        Duration::from_secs(self.printer_poll_interval_secs)
    }
}

/// `~/.config/timelapse-serial.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join(CONFIG_FILE_NAME))
}

fn parse_env<F, T>(env: &F, key: &str, slot: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = env(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} is not a valid number: {:?}", key, raw)))?;
    }
    Ok(())
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: Arc<AppConfig>,
    /// Session/snapshot listings over `output_dir`
    pub catalog: SnapshotCatalog,
    /// Thumbnail generation
    pub thumbnails: Arc<ThumbnailPipeline>,
    /// Printer status (None when no printer URL is configured)
    pub printer_status: Option<Arc<PrinterStatusCache>>,
    /// Flips to true once the server is shutting down
    pub shutdown: watch::Receiver<bool>,
    /// Process start, for uptime
    pub started_at: Instant,
}

impl AppState {
    /// Resolves when shutdown is signalled. Never resolves if the sender is gone.
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown.clone();
        async move {
            let sender_gone = rx.wait_for(|stopping| *stopping).await.is_err();
            if sender_gone {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_need_output_dir() {
        let result = AppConfig::load_from(None, env_of(&[]));
        assert!(matches!(result, Err(Error::Config(_))));

        let config = AppConfig::load_from(None, env_of(&[("OUTPUT_DIR", "/srv/timelapse")])).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/srv/timelapse"));
        assert_eq!(config.port, 3025);
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.thumbnail_max_workers, 8);
        assert_eq!(config.printer_poll_interval(), Duration::from_secs(5));
        assert!(config.serial_port.is_none());
        assert!(config.printer_url.is_none());
    }

    #[test]
    fn test_file_then_env() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
serial_port = "/dev/ttyACM0"
output_dir = "/home/pi/timelapse"
port = 8080
printer_url = "http://prusa.local"
framerate = 30
"#,
        )
        .unwrap();

        let config =
            AppConfig::load_from(Some(&path), env_of(&[("PORT", "9000"), ("CRF", "18")])).unwrap();

        assert_eq!(config.serial_port, Some(PathBuf::from("/dev/ttyACM0")));
        assert_eq!(config.output_dir, PathBuf::from("/home/pi/timelapse"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.printer_url.as_deref(), Some("http://prusa.local"));

        let encode = config.encode_settings();
        assert_eq!(encode.framerate, 30);
        assert_eq!(encode.crf, 18);
        assert_eq!(encode.resolution, "1920x1280");
    }

    #[test]
    fn test_legacy_key_names() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "BaudRate = 250000\nSerialPort = \"/dev/ttyUSB0\"\nOutputDir = \"/data\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(&path), env_of(&[])).unwrap();
        assert_eq!(config.baud_rate, 250000);
        assert_eq!(config.serial_port, Some(PathBuf::from("/dev/ttyUSB0")));
        assert_eq!(config.output_dir, PathBuf::from("/data"));
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let config = AppConfig::load_from(
            Some(Path::new("/nonexistent/timelapse-serial.toml")),
            env_of(&[("OUTPUT_DIR", "/data")]),
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/data"));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "output_dir = [unterminated").unwrap();

        let result = AppConfig::load_from(Some(&path), env_of(&[("OUTPUT_DIR", "/data")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_number_in_env() {
        let result =
            AppConfig::load_from(None, env_of(&[("OUTPUT_DIR", "/data"), ("PORT", "http")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_blank_optionals_are_unset() {
        let config = AppConfig::load_from(
            None,
            env_of(&[("OUTPUT_DIR", "/data"), ("PRINTER_URL", ""), ("LIVE_FEED_URL", " ")]),
        )
        .unwrap();
        assert!(config.printer_url.is_none());
        assert!(config.live_feed_url.is_none());
    }
}
