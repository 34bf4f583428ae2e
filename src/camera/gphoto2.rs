//! gphoto2 CLI camera driver

use super::{CameraHandle, CameraLock, CameraResource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Camera driven through the `gphoto2` command line tool
pub struct Gphoto2Camera {
    /// Path or name of the gphoto2 binary
    binary: String,
    /// Shared by every handle this camera issues
    busy: CameraLock,
}

impl Gphoto2Camera {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            busy: CameraLock::default(),
        }
    }
}

impl Default for Gphoto2Camera {
    fn default() -> Self {
        Self::new("gphoto2")
    }
}

#[async_trait]
impl CameraResource for Gphoto2Camera {
    async fn acquire(&self) -> Result<CameraHandle> {
        let output = Command::new(&self.binary)
            .arg("--auto-detect")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::CameraConnection(format!("{} not runnable: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CameraConnection(format!(
                "auto-detect failed: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (model, port) = parse_auto_detect(&stdout).into_iter().next().ok_or_else(|| {
            Error::CameraConnection("No camera detected, make sure it's around".to_string())
        })?;

        tracing::debug!(model = %model, port = %port, "Camera detected");
        Ok(CameraHandle::new(model, port, self.busy.clone()))
    }

    async fn capture_to(&self, handle: &CameraHandle, destination: &Path) -> Result<()> {
        let _lease = handle.lease().await;

        let output = Command::new(&self.binary)
            .arg("--port")
            .arg(handle.port())
            .arg("--capture-image-and-download")
            .arg("--filename")
            .arg(destination)
            .arg("--force-overwrite")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Capture(format!("gphoto2 spawn failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Capture(format!("gphoto2 failed: {}", stderr.trim())));
        }

        Ok(())
    }

    async fn release(&self, handle: &CameraHandle) {
        // gphoto2 CLI holds no session between invocations
        tracing::info!(model = %handle.model(), port = %handle.port(), "Camera released");
    }
}

/// Parse `gphoto2 --auto-detect` output into (model, port) pairs
///
/// ```text
/// Model                          Port
/// ----------------------------------------------------------
/// Canon EOS 600D                 usb:001,005
/// ```
pub fn parse_auto_detect(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .skip_while(|line| !line.starts_with("---"))
        .skip(1)
        .filter_map(|line| {
            let line = line.trim_end();
            let split = line.rfind(char::is_whitespace)?;
            let (model, port) = line.split_at(split);
            let model = model.trim();
            let port = port.trim();
            if model.is_empty() || port.is_empty() {
                return None;
            }
            Some((model.to_string(), port.to_string()))
        })
        .collect()
}
