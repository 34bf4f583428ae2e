//! Thumbnail rendering with the `image` crate

use super::ThumbnailGenerator;
use crate::error::{Error, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Subfolder of a session holding its thumbnails
pub const THUMBNAIL_DIR: &str = "thumbs";

/// Default bounding box (pixels) for generated thumbnails
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 320;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Renders JPEG thumbnails next to their source images
pub struct ImageThumbnailer {
    max_size: u32,
}

impl ImageThumbnailer {
    pub fn new(max_size: u32) -> Self {
        Self {
            max_size: max_size.max(1),
        }
    }
}

impl Default for ImageThumbnailer {
    fn default() -> Self {
        Self::new(DEFAULT_THUMBNAIL_SIZE)
    }
}

#[async_trait]
impl ThumbnailGenerator for ImageThumbnailer {
    async fn generate(&self, source: &Path) -> Result<PathBuf> {
        let source = source.to_path_buf();
        let max_size = self.max_size;

        // Decoding full-size camera JPEGs is CPU bound
        tokio::task::spawn_blocking(move || render_thumbnail(&source, max_size))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }
}

/// `<session>/snap1.jpg` -> `<session>/thumbs/snap1.jpg`
pub fn thumbnail_path_for(source: &Path) -> Result<PathBuf> {
    let parent = source
        .parent()
        .ok_or_else(|| Error::Validation(format!("no parent dir: {}", source.display())))?;
    let file_name = source
        .file_name()
        .ok_or_else(|| Error::Validation(format!("no file name: {}", source.display())))?;
    Ok(parent.join(THUMBNAIL_DIR).join(file_name))
}

/// Create (or reuse) the thumbnail for `source`, returning its path
pub fn render_thumbnail(source: &Path, max_size: u32) -> Result<PathBuf> {
    let dest = thumbnail_path_for(source)?;

    if is_fresh(&dest, source) {
        return Ok(dest);
    }

    let img = image::open(source)?;
    let thumb = DynamicImage::ImageRgb8(img.thumbnail(max_size, max_size).to_rgb8());

    let dir = dest
        .parent()
        .ok_or_else(|| Error::Internal(format!("no parent dir: {}", dest.display())))?;
    fs::create_dir_all(dir)?;

    // Write beside the target then rename, so readers never see a partial file
    let tmp = dir.join(format!(
        ".{}.{}.tmp",
        std::process::id(),
        TMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    if let Err(e) = thumb.save_with_format(&tmp, ImageFormat::Jpeg) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    fs::rename(&tmp, &dest)?;

    Ok(dest)
}

/// Thumbnail exists and is not older than its source
fn is_fresh(thumb: &Path, source: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(thumb), modified(source)) {
        (Some(t), Some(s)) => t >= s,
        _ => false,
    }
}
