//! Camera - Tethered Camera Access
//!
//! ## Responsibilities
//!
//! - [`CameraResource`] contract consumed by the session controller
//! - [`CameraHandle`] for a claimed camera, shared by in-flight captures
//! - gphoto2 CLI implementation ([`Gphoto2Camera`])
//!
//! The controller is the only owner of a handle. A tethered camera accepts
//! one command at a time, so every handle a resource issues shares that
//! resource's [`CameraLock`]. Captures are serialized by [`CameraHandle::lease`]
//! across sessions, including a capture still running from an abandoned one.

mod gphoto2;

pub use gphoto2::{parse_auto_detect, Gphoto2Camera};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Acquire/capture/release contract for the physical camera
#[async_trait]
pub trait CameraResource: Send + Sync {
    /// Claim the camera. Fails with `Error::CameraConnection` if none is reachable.
    async fn acquire(&self) -> Result<CameraHandle>;

    /// Take one picture and write it to `destination`
    async fn capture_to(&self, handle: &CameraHandle, destination: &Path) -> Result<()>;

    /// Give the camera back
    async fn release(&self, handle: &CameraHandle);
}

/// Exclusive-use lock for one physical camera
pub type CameraLock = Arc<Mutex<()>>;

/// Claimed camera
#[derive(Debug)]
pub struct CameraHandle {
    model: String,
    port: String,
    busy: CameraLock,
}

impl CameraHandle {
    /// `busy` must be the issuing resource's lock, not a fresh one per handle
    pub fn new(model: impl Into<String>, port: impl Into<String>, busy: CameraLock) -> Self {
        Self {
            model: model.into(),
            port: port.into(),
            busy,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Wait for exclusive use of the camera for one command
    ///
    /// The returned lease releases the camera on drop.
    pub async fn lease(&self) -> CameraLease {
        let guard = self.busy.clone().lock_owned().await;
        tracing::debug!(port = %self.port, "Camera lease acquired");
        CameraLease {
            port: self.port.clone(),
            _guard: guard,
        }
    }
}

/// Exclusive use of a camera for one command - released on Drop
pub struct CameraLease {
    port: String,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        tracing::debug!(port = %self.port, "Camera lease released");
    }
}
