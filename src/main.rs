//! Timelapse Rig - print-driven timelapse controller
//!
//! Main entry point: command loop over the printer's serial output plus the
//! gallery HTTP server.

use std::sync::Arc;
use std::time::{Duration, Instant};
use timelapse_rig::{
    camera::Gphoto2Camera,
    event_transport::{open_serial, SerialReader},
    printer_status::{PrinterStatusCache, PrusaLinkClient},
    session_controller::PrintSessionController,
    snapshot_catalog::SnapshotCatalog,
    state::{AppConfig, AppState},
    thumbnail_pipeline::{ImageThumbnailer, ThumbnailPipeline},
    video_assembler::FfmpegAssembler,
    web_api,
};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long in-flight requests get after Ctrl-C
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

enum Exit {
    EventStreamClosed,
    Interrupted,
}

async fn run_commands(
    controller: &mut PrintSessionController,
    reader: Option<SerialReader>,
) -> timelapse_rig::Result<()> {
    match reader {
        Some(reader) => controller.run(reader).await,
        None => std::future::pending().await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timelapse_rig=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting timelapse rig v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load()?;
    tracing::info!(
        output_dir = %config.output_dir.display(),
        serial_port = ?config.serial_port,
        baud_rate = config.baud_rate,
        printer_url = ?config.printer_url,
        thumbnail_max_workers = config.thumbnail_max_workers,
        "Configuration loaded"
    );

    tokio::fs::create_dir_all(&config.output_dir).await?;

    // Printer status
    let printer_status = match &config.printer_url {
        Some(url) => {
            let client = PrusaLinkClient::new(url.clone(), config.prusa_link_key.clone())?;
            let cache = Arc::new(PrinterStatusCache::new(Arc::new(client)));
            cache.start(config.printer_poll_interval()).await;
            Some(cache)
        }
        None => {
            tracing::info!("No printer URL configured, printer status disabled");
            None
        }
    };

    // Application state
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState {
        config: Arc::new(config.clone()),
        catalog: SnapshotCatalog::new(&config.output_dir),
        thumbnails: Arc::new(ThumbnailPipeline::new(Arc::new(ImageThumbnailer::new(
            config.thumbnail_size,
        )))),
        printer_status,
        shutdown: shutdown_rx,
        started_at: Instant::now(),
    };

    let app = web_api::create_router(state.clone())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    let server_stop = state.shutdown_signal();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(server_stop)
            .await
    });

    // Command loop
    let mut controller = PrintSessionController::new(
        Arc::new(Gphoto2Camera::new(config.gphoto2_bin.clone())),
        Arc::new(FfmpegAssembler::new(
            config.ffmpeg_bin.clone(),
            config.encode_settings(),
        )),
        &config.output_dir,
    );

    let reader = match &config.serial_port {
        Some(port) => Some(open_serial(port, config.baud_rate).await?),
        None => {
            tracing::warn!("No serial port configured, command loop disabled");
            None
        }
    };

    let mut server_finished = false;
    let outcome: anyhow::Result<Exit> = tokio::select! {
        result = run_commands(&mut controller, reader) => {
            result.map(|()| Exit::EventStreamClosed).map_err(Into::into)
        }
        result = &mut server => {
            server_finished = true;
            match result {
                Ok(Ok(())) => Err(anyhow::anyhow!("HTTP server stopped unexpectedly")),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(e.into()),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received, shutting down");
            Ok(Exit::Interrupted)
        }
    };

    // Cancel in-flight thumbnail work and stop the server
    let _ = shutdown_tx.send(true);
    controller.shutdown().await;
    if let Some(cache) = &state.printer_status {
        cache.stop().await;
    }

    if matches!(outcome, Ok(Exit::EventStreamClosed)) && controller.tasks().in_flight() > 0 {
        tracing::info!(
            tasks = controller.tasks().in_flight(),
            "Waiting for captures and assembly to finish"
        );
        controller.tasks().wait_idle().await;
    }

    if !server_finished && tokio::time::timeout(SERVER_DRAIN_TIMEOUT, server).await.is_err() {
        tracing::warn!("HTTP server did not stop in time");
    }

    match outcome {
        Ok(_) => {
            tracing::info!("Timelapse rig stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Timelapse rig stopped with error");
            Err(e)
        }
    }
}
