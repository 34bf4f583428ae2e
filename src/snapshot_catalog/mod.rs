//! SnapshotCatalog - Session and Snapshot Listings
//!
//! ## Responsibilities
//!
//! - List session folders under the output root, newest first
//! - List the snapshots of one session in sequence order
//! - Session index pagination
//!
//! Nothing is cached: every call rescans the directory tree.

mod types;

pub use types::*;

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

/// Session folder name layout (lexical order == temporal order)
pub const SESSION_NAME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
/// Assembled timelapse file inside a session folder
pub const VIDEO_FILE_NAME: &str = "output.mp4";
/// Sessions per index page
pub const SESSIONS_PER_PAGE: usize = 5;

static SESSION_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9-]+$").expect("valid regex"));
static SNAPSHOT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^snap[0-9]+\.jpg$").expect("valid regex"));

/// Folder name qualifies as a session
pub fn is_session_name(name: &str) -> bool {
    SESSION_NAME.is_match(name)
}

/// File name qualifies as a snapshot
pub fn is_snapshot_name(name: &str) -> bool {
    SNAPSHOT_NAME.is_match(name)
}

/// Folder name for a session started at `at`
pub fn session_dir_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(SESSION_NAME_FORMAT).to_string()
}

/// Parse the start time out of a session folder name
pub fn parse_session_time(name: &str) -> Option<NaiveDateTime> {
    match NaiveDateTime::parse_from_str(name, SESSION_NAME_FORMAT) {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!(folder = %name, error = %e, "Cannot parse session folder timestamp");
            None
        }
    }
}

/// Read-only view over the output root
#[derive(Debug, Clone)]
pub struct SnapshotCatalog {
    root: PathBuf,
}

impl SnapshotCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a named session, rejecting names outside the session charset
    pub fn session_dir(&self, session_name: &str) -> Result<PathBuf> {
        if !is_session_name(session_name) {
            return Err(Error::NotFound(format!("session {}", session_name)));
        }
        Ok(self.root.join(session_name))
    }

    /// All sessions, newest first. Unparsable folder names come last.
    pub fn list_sessions(&self) -> Result<Vec<FolderInfo>> {
        let mut sessions = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !is_session_name(&name) {
                continue;
            }

            let path = entry.path();
            sessions.push(FolderInfo {
                start_time: parse_session_time(&name),
                snapshot_count: count_snapshots(&path),
                has_assembled_video: has_video(&path),
                folder_name: name,
                folder_path: path,
            });
        }

        sessions.sort_by(newest_first);
        Ok(sessions)
    }

    /// Snapshots of one session, ordered by sequence number
    pub fn list_snapshots(&self, session_name: &str) -> Result<Vec<SnapshotRecord>> {
        let dir = self.session_dir(session_name)?;
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("session {}", session_name)));
        }

        let mut snaps: Vec<SnapshotRecord> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                is_snapshot_name(&name).then(|| SnapshotRecord {
                    folder_name: session_name.to_string(),
                    file_path: entry.path(),
                    file_name: name,
                })
            })
            .collect();

        snaps.sort_by(|a, b| {
            a.sequence()
                .cmp(&b.sequence())
                .then_with(|| a.file_name.cmp(&b.file_name))
        });
        Ok(snaps)
    }

    /// Whether a session has its assembled video
    pub fn has_video(&self, session_name: &str) -> bool {
        self.session_dir(session_name)
            .map(|dir| has_video(&dir))
            .unwrap_or(false)
    }
}

fn newest_first(a: &FolderInfo, b: &FolderInfo) -> Ordering {
    match (&a.start_time, &b.start_time) {
        (Some(ta), Some(tb)) => tb.cmp(ta),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.folder_name.cmp(&a.folder_name),
    }
}

fn count_snapshots(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(is_snapshot_name)
                .unwrap_or(false)
        })
        .count()
}

fn has_video(dir: &Path) -> bool {
    dir.join(VIDEO_FILE_NAME).is_file()
}

/// Slice one page out of the ordered session list
///
/// Page indexes past the end are clamped to the last page.
pub fn paginate(sessions: &[FolderInfo], page: usize) -> SessionPage {
    let total_sessions = sessions.len();
    let total_pages = total_sessions.div_ceil(SESSIONS_PER_PAGE).max(1);
    let page = page.min(total_pages - 1);

    let start = (page * SESSIONS_PER_PAGE).min(total_sessions);
    let end = (start + SESSIONS_PER_PAGE).min(total_sessions);

    SessionPage {
        page,
        total_pages,
        total_sessions,
        sessions: sessions[start..end].to_vec(),
    }
}
