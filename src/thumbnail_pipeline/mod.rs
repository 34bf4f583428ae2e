//! ThumbnailPipeline - Bounded Concurrent Thumbnail Generation
//!
//! ## Responsibilities
//!
//! - Fan out one thumbnail task per snapshot, at most `limit` running at once
//! - Fan in results in input order, whatever order tasks complete in
//! - Abandon the whole result when the caller's cancellation fires
//!
//! ## Design
//!
//! - Admission gate: a `Semaphore` permit is taken before each task is spawned
//! - Fan-in: task handles are joined in spawn order, so result `i` lands in
//!   slot `i` without a shared lock or a final sort
//! - Cancellation: dispatched tasks are detached and keep running; only the
//!   result of this call is discarded

mod imaging;

pub use imaging::{
    render_thumbnail, thumbnail_path_for, ImageThumbnailer, DEFAULT_THUMBNAIL_SIZE, THUMBNAIL_DIR,
};

use crate::error::Result;
use crate::snapshot_catalog::SnapshotRecord;
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// One generated thumbnail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThumbnailRecord {
    pub source_image_path: PathBuf,
    pub thumbnail_path: PathBuf,
    /// Position of the source in the input list
    pub sequence_index: usize,
}

/// Produces one thumbnail file for one source image
#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    async fn generate(&self, source: &Path) -> Result<PathBuf>;
}

/// ThumbnailPipeline instance
#[derive(Clone)]
pub struct ThumbnailPipeline {
    generator: Arc<dyn ThumbnailGenerator>,
}

impl ThumbnailPipeline {
    pub fn new(generator: Arc<dyn ThumbnailGenerator>) -> Self {
        Self { generator }
    }

    /// Generate thumbnails and wait for all of them (no cancellation)
    pub async fn generate(&self, snapshots: &[SnapshotRecord], limit: usize) -> Vec<ThumbnailRecord> {
        self.fan_out(snapshots, limit).await
    }

    /// Generate thumbnails unless `cancelled` resolves first
    ///
    /// Returns an empty list when cancelled, never a partial one.
    pub async fn generate_until<C>(
        &self,
        snapshots: &[SnapshotRecord],
        limit: usize,
        cancelled: C,
    ) -> Vec<ThumbnailRecord>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancelled => {
                tracing::info!(total = snapshots.len(), "Thumbnail creation aborted");
                Vec::new()
            }
            thumbs = self.fan_out(snapshots, limit) => thumbs,
        }
    }

    async fn fan_out(&self, snapshots: &[SnapshotRecord], limit: usize) -> Vec<ThumbnailRecord> {
        let total = snapshots.len();
        let gate = Arc::new(Semaphore::new(limit.max(1)));
        let mut handles = Vec::with_capacity(total);

        tracing::debug!(total = total, limit = limit, "Creating thumbnails");

        for (index, snap) in snapshots.iter().enumerate() {
            let Ok(permit) = gate.clone().acquire_owned().await else {
                break;
            };
            let generator = self.generator.clone();
            let source = snap.file_path.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                match generator.generate(&source).await {
                    Ok(thumbnail_path) => {
                        tracing::debug!(index = index, total = total, "Thumbnail created");
                        Some(ThumbnailRecord {
                            source_image_path: source,
                            thumbnail_path,
                            sequence_index: index,
                        })
                    }
                    Err(e) => {
                        tracing::warn!(
                            source = %source.display(),
                            error = %e,
                            "Thumbnail creation failed"
                        );
                        None
                    }
                }
            }));
        }

        let mut thumbs = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Some(record)) => thumbs.push(record),
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "Thumbnail task panicked"),
            }
        }

        tracing::info!(created = thumbs.len(), total = total, "All thumbnails created");
        thumbs
    }
}
