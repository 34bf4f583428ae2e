//! Session controller types

use crate::camera::CameraHandle;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Snapshot file name for a sequence number (`snap00001.jpg`)
pub fn snapshot_file_name(sequence: u64) -> String {
    format!("snap{:05}.jpg", sequence)
}

/// One capture run, alive between SessionStart and SessionStop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub name: String,
    pub directory_path: PathBuf,
}

impl Session {
    pub fn new(directory_path: PathBuf) -> Self {
        let name = directory_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            directory_path,
        }
    }
}

/// Externally visible controller state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Active { session: Session, captures: u64 },
}

/// Internal state machine
pub(super) enum ControllerState {
    Idle,
    Active(ActiveSession),
}

/// Session plus the camera it holds
pub(super) struct ActiveSession {
    pub session: Session,
    pub camera: Arc<CameraHandle>,
    /// Sequence number of the next capture (starts at 1)
    pub next_sequence: u64,
}

impl ActiveSession {
    pub fn new(session: Session, camera: CameraHandle) -> Self {
        Self {
            session,
            camera: Arc::new(camera),
            next_sequence: 1,
        }
    }

    /// Reserve the next snapshot path
    pub fn next_snapshot_path(&mut self) -> PathBuf {
        let path = self
            .session
            .directory_path
            .join(snapshot_file_name(self.next_sequence));
        self.next_sequence += 1;
        path
    }
}
