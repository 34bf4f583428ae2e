//! VideoAssembler - Timelapse Encoding
//!
//! ## Responsibilities
//!
//! - [`VideoAssembler`] contract invoked once per finished session
//! - ffmpeg implementation producing `output.mp4` from `snap*.jpg`

use crate::error::{Error, Result};
use crate::snapshot_catalog::VIDEO_FILE_NAME;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Turns a session directory into a video
#[async_trait]
pub trait VideoAssembler: Send + Sync {
    async fn assemble(&self, session_dir: &Path) -> Result<()>;
}

/// Encoding parameters
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub framerate: u32,
    pub crf: u32,
    /// WxH, e.g. 1920x1280
    pub resolution: String,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            framerate: 24,
            crf: 20,
            resolution: "1920x1280".to_string(),
        }
    }
}

/// ffmpeg-backed assembler
pub struct FfmpegAssembler {
    binary: String,
    settings: EncodeSettings,
}

impl FfmpegAssembler {
    pub fn new(binary: impl Into<String>, settings: EncodeSettings) -> Self {
        Self {
            binary: binary.into(),
            settings,
        }
    }

    /// ffmpeg arguments for one session directory
    pub fn build_args(&self, session_dir: &Path) -> Vec<String> {
        let input = session_dir.join("snap*.jpg");
        let output = session_dir.join(VIDEO_FILE_NAME);

        vec![
            "-f".into(),
            "image2".into(),
            "-framerate".into(),
            self.settings.framerate.to_string(),
            "-pattern_type".into(),
            "glob".into(),
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-crf".into(),
            self.settings.crf.to_string(),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-s".into(),
            self.settings.resolution.clone(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl VideoAssembler for FfmpegAssembler {
    async fn assemble(&self, session_dir: &Path) -> Result<()> {
        tracing::info!(session = %session_dir.display(), "Starting ffmpeg timelapse creation");

        let output = Command::new(&self.binary)
            .args(self.build_args(session_dir))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Encoding(format!("ffmpeg spawn failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Encoding(format!(
                "ffmpeg failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        tracing::info!(session = %session_dir.display(), "Timelapse created");
        Ok(())
    }
}
