//! Shared response models
//!
//! Types returned by the gallery API, kept apart from the domain modules so
//! route handlers and tests can share them.

use crate::printer_status::{PrinterStatusSnapshot, RemainingTime};
use crate::snapshot_catalog::FolderInfo;
use serde::{Deserialize, Serialize};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_sec: u64,
    pub printer_status_enabled: bool,
    pub live_feed_enabled: bool,
}

/// One page of the gallery index
#[derive(Debug, Clone, Serialize)]
pub struct SessionIndexResponse {
    pub page: usize,
    pub total_pages: usize,
    pub total_sessions: usize,
    pub sessions: Vec<FolderInfo>,
    /// Newest session overall, regardless of page
    pub latest_session: Option<String>,
    pub latest_has_video: bool,
    pub live_feed_url: Option<String>,
}

/// Snapshot as listed by the API
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotEntry {
    pub file_name: String,
    pub sequence: Option<u64>,
    /// Relative to the output root (served under `/serve/`)
    pub path: String,
}

/// Snapshots of one session
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotListResponse {
    pub session: String,
    pub has_video: bool,
    pub snapshots: Vec<SnapshotEntry>,
}

/// Thumbnail as listed by the API
#[derive(Debug, Clone, Serialize)]
pub struct ThumbnailEntry {
    pub sequence_index: usize,
    /// Full-size image, relative to the output root
    pub image_path: String,
    /// Thumbnail, relative to the output root
    pub thumbnail_path: String,
}

/// Thumbnails of one session
#[derive(Debug, Clone, Serialize)]
pub struct ThumbnailListResponse {
    pub session: String,
    pub has_video: bool,
    pub thumbnails: Vec<ThumbnailEntry>,
}

/// Printer status plus its human-sized remaining time
#[derive(Debug, Clone, Serialize)]
pub struct PrinterStatusResponse {
    #[serde(flatten)]
    pub status: PrinterStatusSnapshot,
    pub remaining: RemainingTime,
    pub refresh_interval_secs: u64,
}
