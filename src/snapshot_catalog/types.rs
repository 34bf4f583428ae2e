//! Catalog row types

use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::PathBuf;

/// One captured image inside a session folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRecord {
    pub folder_name: String,
    pub file_name: String,
    pub file_path: PathBuf,
}

impl SnapshotRecord {
    /// Sequence number embedded in `snap<seq>.jpg`
    pub fn sequence(&self) -> Option<u64> {
        self.file_name
            .strip_prefix("snap")
            .and_then(|rest| rest.strip_suffix(".jpg"))
            .and_then(|digits| digits.parse().ok())
    }

    /// Path relative to the output root, as served under `/serve/`
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.folder_name, self.file_name)
    }
}

/// One row of the gallery index
#[derive(Debug, Clone, Serialize)]
pub struct FolderInfo {
    pub folder_name: String,
    pub folder_path: PathBuf,
    /// None when the folder name is not a valid timestamp
    pub start_time: Option<NaiveDateTime>,
    pub snapshot_count: usize,
    pub has_assembled_video: bool,
}

/// One page of the session index
#[derive(Debug, Clone, Serialize)]
pub struct SessionPage {
    /// Page actually returned (after clamping)
    pub page: usize,
    pub total_pages: usize,
    pub total_sessions: usize,
    pub sessions: Vec<FolderInfo>,
}
