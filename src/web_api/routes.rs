//! API Routes

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::services::ServeDir;

use crate::error::{Error, Result};
use crate::models::{
    ApiResponse, PrinterStatusResponse, SessionIndexResponse, SnapshotEntry, SnapshotListResponse,
    ThumbnailEntry, ThumbnailListResponse,
};
use crate::snapshot_catalog::paginate;
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    let serve_dir = ServeDir::new(state.catalog.root());

    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Gallery
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:name/snapshots", get(list_snapshots))
        .route("/api/sessions/:name/thumbnails", get(list_thumbnails))
        // Printer
        .route("/api/printer/status", get(printer_status))
        // Images and videos
        .nest_service("/serve", serve_dir)
        .with_state(state)
}

// ========================================
// Gallery
// ========================================

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: usize,
}

async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> impl IntoResponse {
    let sessions = state.catalog.list_sessions().unwrap_or_else(|e| {
        tracing::warn!(
            root = %state.catalog.root().display(),
            error = %e,
            "Cannot list sessions"
        );
        Vec::new()
    });

    let latest = sessions.first();
    let latest_session = latest.map(|f| f.folder_name.clone());
    let latest_has_video = latest.map(|f| f.has_assembled_video).unwrap_or(false);
    let page = paginate(&sessions, query.page);

    Json(ApiResponse::success(SessionIndexResponse {
        page: page.page,
        total_pages: page.total_pages,
        total_sessions: page.total_sessions,
        sessions: page.sessions,
        latest_session,
        latest_has_video,
        live_feed_url: state.config.live_feed_url.clone(),
    }))
}

async fn list_snapshots(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<SnapshotListResponse>>> {
    let snapshots = state
        .catalog
        .list_snapshots(&name)?
        .into_iter()
        .map(|s| SnapshotEntry {
            sequence: s.sequence(),
            path: s.relative_path(),
            file_name: s.file_name,
        })
        .collect();

    Ok(Json(ApiResponse::success(SnapshotListResponse {
        has_video: state.catalog.has_video(&name),
        session: name,
        snapshots,
    })))
}

async fn list_thumbnails(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<ThumbnailListResponse>>> {
    let snapshots = match state.catalog.list_snapshots(&name) {
        Ok(snaps) => snaps,
        Err(e @ Error::NotFound(_)) => return Err(e),
        Err(e) => {
            tracing::warn!(session = %name, error = %e, "Cannot list snapshots for thumbnails");
            Vec::new()
        }
    };

    let thumbs = state
        .thumbnails
        .generate_until(
            &snapshots,
            state.config.thumbnail_max_workers,
            state.shutdown_signal(),
        )
        .await;

    let root = state.catalog.root();
    let thumbnails = thumbs
        .into_iter()
        .map(|t| ThumbnailEntry {
            sequence_index: t.sequence_index,
            image_path: relative_to(root, &t.source_image_path),
            thumbnail_path: relative_to(root, &t.thumbnail_path),
        })
        .collect();

    Ok(Json(ApiResponse::success(ThumbnailListResponse {
        has_video: state.catalog.has_video(&name),
        session: name,
        thumbnails,
    })))
}

fn relative_to(root: &std::path::Path, path: &std::path::Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

// ========================================
// Printer
// ========================================

async fn printer_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PrinterStatusResponse>>> {
    let cache = state
        .printer_status
        .as_ref()
        .ok_or_else(|| Error::NotFound("printer status is not configured".to_string()))?;

    let status = cache.read();
    Ok(Json(ApiResponse::success(PrinterStatusResponse {
        remaining: status.remaining_breakdown(),
        status,
        refresh_interval_secs: state.config.printer_poll_interval_secs,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer_status::{PrinterStatusCache, PrinterStatusSnapshot, PrinterStatusSource};
    use crate::state::AppConfig;
    use crate::thumbnail_pipeline::{ImageThumbnailer, ThumbnailGenerator, ThumbnailPipeline};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use image::{ImageFormat, RgbImage};
    use serde_json::Value;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use tokio::sync::watch;
    use tower::ServiceExt;

    struct OfflinePrinter;

    #[async_trait]
    impl PrinterStatusSource for OfflinePrinter {
        async fn fetch(&self) -> Result<PrinterStatusSnapshot> {
            Err(Error::Internal("offline".to_string()))
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl ThumbnailGenerator for SlowGenerator {
        async fn generate(&self, source: &std::path::Path) -> Result<PathBuf> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(source.to_path_buf())
        }
    }

    struct TestApp {
        tmp: TempDir,
        shutdown: watch::Sender<bool>,
        router: Router,
    }

    fn test_app(
        generator: Arc<dyn ThumbnailGenerator>,
        printer: Option<Arc<PrinterStatusCache>>,
    ) -> TestApp {
        let tmp = TempDir::new().unwrap();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let config = AppConfig {
            output_dir: tmp.path().to_path_buf(),
            live_feed_url: Some("http://cam.local:8080/stream".to_string()),
            thumbnail_max_workers: 2,
            ..Default::default()
        };
        let state = AppState {
            catalog: crate::snapshot_catalog::SnapshotCatalog::new(tmp.path()),
            config: Arc::new(config),
            thumbnails: Arc::new(ThumbnailPipeline::new(generator)),
            printer_status: printer,
            shutdown: shutdown_rx,
            started_at: Instant::now(),
        };
        TestApp {
            tmp,
            shutdown,
            router: create_router(state),
        }
    }

    fn default_app() -> TestApp {
        test_app(Arc::new(ImageThumbnailer::new(16)), None)
    }

    fn session(app: &TestApp, name: &str, snaps: usize) -> PathBuf {
        let dir = app.tmp.path().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 1..=snaps {
            RgbImage::from_pixel(32, 24, image::Rgb([200, 100, 50]))
                .save_with_format(dir.join(format!("snap{:05}.jpg", i)), ImageFormat::Jpeg)
                .unwrap();
        }
        dir
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
        let (status, body) = get(router, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_healthz() {
        let app = default_app();
        let (status, body) = get_json(&app.router, "/healthz").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["printer_status_enabled"], false);
        assert_eq!(body["live_feed_enabled"], true);
    }

    #[tokio::test]
    async fn test_sessions_index_paginates() {
        let app = default_app();
        for day in 1..=7 {
            session(&app, &format!("2024-01-{:02}-12-00-00", day), 0);
        }
        std::fs::write(app.tmp.path().join("2024-01-07-12-00-00/output.mp4"), b"mp4").unwrap();

        let (status, body) = get_json(&app.router, "/api/sessions").await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["page"], 0);
        assert_eq!(data["total_pages"], 2);
        assert_eq!(data["total_sessions"], 7);
        assert_eq!(data["sessions"].as_array().unwrap().len(), 5);
        assert_eq!(data["sessions"][0]["folder_name"], "2024-01-07-12-00-00");
        assert_eq!(data["latest_session"], "2024-01-07-12-00-00");
        assert_eq!(data["latest_has_video"], true);
        assert_eq!(data["live_feed_url"], "http://cam.local:8080/stream");

        let (_, body) = get_json(&app.router, "/api/sessions?page=1").await;
        let names: Vec<_> = body["data"]["sessions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["folder_name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["2024-01-02-12-00-00", "2024-01-01-12-00-00"]);

        // Out of range clamps to the last page
        let (_, body) = get_json(&app.router, "/api/sessions?page=40").await;
        assert_eq!(body["data"]["page"], 1);
    }

    #[tokio::test]
    async fn test_sessions_index_degrades_when_root_missing() {
        let app = default_app();
        let root = app.tmp.path().to_path_buf();
        std::fs::remove_dir_all(&root).unwrap();

        let (status, body) = get_json(&app.router, "/api/sessions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_sessions"], 0);
        assert!(body["data"]["latest_session"].is_null());
    }

    #[tokio::test]
    async fn test_snapshots_listing() {
        let app = default_app();
        session(&app, "2024-01-01-10-00-00", 3);

        let (status, body) = get_json(&app.router, "/api/sessions/2024-01-01-10-00-00/snapshots").await;
        assert_eq!(status, StatusCode::OK);

        let snaps = body["data"]["snapshots"].as_array().unwrap();
        assert_eq!(snaps.len(), 3);
        assert_eq!(snaps[0]["file_name"], "snap00001.jpg");
        assert_eq!(snaps[0]["sequence"], 1);
        assert_eq!(snaps[2]["path"], "2024-01-01-10-00-00/snap00003.jpg");
        assert_eq!(body["data"]["has_video"], false);
    }

    #[tokio::test]
    async fn test_snapshots_unknown_or_invalid_session() {
        let app = default_app();
        std::fs::create_dir_all(app.tmp.path().join("notadate")).unwrap();

        let (status, body) = get_json(&app.router, "/api/sessions/notadate/snapshots").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "NOT_FOUND");

        let (status, _) = get(&app.router, "/api/sessions/2099-01-01-00-00-00/snapshots").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_thumbnails_in_sequence_order() {
        let app = default_app();
        session(&app, "2024-01-01-10-00-00", 5);

        let (status, body) =
            get_json(&app.router, "/api/sessions/2024-01-01-10-00-00/thumbnails").await;
        assert_eq!(status, StatusCode::OK);

        let thumbs = body["data"]["thumbnails"].as_array().unwrap();
        assert_eq!(thumbs.len(), 5);
        for (i, t) in thumbs.iter().enumerate() {
            assert_eq!(t["sequence_index"], i);
            assert_eq!(
                t["thumbnail_path"],
                format!("2024-01-01-10-00-00/thumbs/snap{:05}.jpg", i + 1)
            );
            assert_eq!(t["image_path"], format!("2024-01-01-10-00-00/snap{:05}.jpg", i + 1));
        }
        assert!(app
            .tmp
            .path()
            .join("2024-01-01-10-00-00/thumbs/snap00005.jpg")
            .is_file());
    }

    #[tokio::test]
    async fn test_thumbnails_skip_broken_images() {
        let app = default_app();
        let dir = session(&app, "2024-01-01-10-00-00", 3);
        std::fs::write(dir.join("snap00002.jpg"), b"truncated").unwrap();

        let (status, body) =
            get_json(&app.router, "/api/sessions/2024-01-01-10-00-00/thumbnails").await;
        assert_eq!(status, StatusCode::OK);

        let indexes: Vec<_> = body["data"]["thumbnails"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["sequence_index"].as_u64().unwrap())
            .collect();
        assert_eq!(indexes, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_thumbnails_empty_after_shutdown() {
        let app = test_app(Arc::new(SlowGenerator), None);
        session(&app, "2024-01-01-10-00-00", 4);
        app.shutdown.send(true).unwrap();

        let (status, body) =
            get_json(&app.router, "/api/sessions/2024-01-01-10-00-00/thumbnails").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["thumbnails"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_printer_status_disabled() {
        let app = default_app();
        let (status, body) = get_json(&app.router, "/api/printer/status").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_printer_status_before_refresh() {
        let cache = Arc::new(PrinterStatusCache::new(Arc::new(OfflinePrinter)));
        let app = test_app(Arc::new(ImageThumbnailer::default()), Some(cache));

        let (status, body) = get_json(&app.router, "/api/printer/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state_label"], "");
        assert_eq!(body["data"]["progress_percent"], 0.0);
        assert_eq!(body["data"]["remaining"]["minutes"], 0);
        assert_eq!(body["data"]["refresh_interval_secs"], 5);
    }

    #[tokio::test]
    async fn test_serve_static_files() {
        let app = default_app();
        session(&app, "2024-01-01-10-00-00", 1);

        let (status, body) = get(&app.router, "/serve/2024-01-01-10-00-00/snap00001.jpg").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.is_empty());

        let (status, _) = get(&app.router, "/serve/2024-01-01-10-00-00/snap00009.jpg").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
