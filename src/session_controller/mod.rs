//! PrintSessionController - Print-Driven Capture State Machine
//!
//! ## Responsibilities
//!
//! - Drain commands one at a time, in arrival order
//! - Hold the camera between SessionStart and SessionStop
//! - Launch captures and video assembly as supervised background tasks
//!
//! ## State machine
//!
//! | State  | Command      | Effect                                              |
//! |--------|--------------|-----------------------------------------------------|
//! | Idle   | SessionStart | acquire camera, create session dir, go Active       |
//! | Active | Capture      | background capture into the session dir             |
//! | Active | SessionStop  | release camera, go Idle, background assembly        |
//! | Active | SessionStart | release camera, abandon session, start a new one    |
//! | any    | other        | ignored                                             |
//!
//! Captures are not awaited before assembly starts. A capture still running
//! when SessionStop arrives may miss the video.
//!
//! Lines longer than [`MAX_LINE_BYTES`] are dropped whole, so a device that
//! streams noise without newlines cannot grow the read buffer.

mod tasks;
mod types;

pub use tasks::BackgroundTasks;
pub use types::{snapshot_file_name, Session, SessionState};

use types::{ActiveSession, ControllerState};

use crate::camera::{CameraHandle, CameraResource};
use crate::command_parser::{self, Command};
use crate::error::{Error, Result};
use crate::snapshot_catalog::session_dir_name;
use crate::video_assembler::VideoAssembler;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest accepted command line, newline included
pub const MAX_LINE_BYTES: u64 = 512;

/// PrintSessionController instance
pub struct PrintSessionController {
    camera: Arc<dyn CameraResource>,
    assembler: Arc<dyn VideoAssembler>,
    output_dir: PathBuf,
    state: ControllerState,
    tasks: BackgroundTasks,
}

impl PrintSessionController {
    /// Create new controller in the Idle state
    pub fn new(
        camera: Arc<dyn CameraResource>,
        assembler: Arc<dyn VideoAssembler>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            camera,
            assembler,
            output_dir: output_dir.into(),
            state: ControllerState::Idle,
            tasks: BackgroundTasks::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        match &self.state {
            ControllerState::Idle => SessionState::Idle,
            ControllerState::Active(active) => SessionState::Active {
                session: active.session.clone(),
                captures: active.next_sequence - 1,
            },
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ControllerState::Active(_))
    }

    /// Captures and assemblies launched by this controller
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Apply one command
    ///
    /// Only camera acquisition (and creating the session dir) can fail.
    pub async fn handle(&mut self, command: Command) -> Result<()> {
        match command {
            Command::SessionStart => self.start_session().await,
            Command::Capture => {
                self.capture();
                Ok(())
            }
            Command::SessionStop => {
                self.stop_session().await;
                Ok(())
            }
            Command::Unrecognized => Ok(()),
        }
    }

    /// Drain lines until EOF. A read error ends the loop with `Error::Transport`.
    ///
    /// Bytes that are not UTF-8 (line noise) are replaced, not rejected.
    pub async fn run<R>(&mut self, mut reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::with_capacity(MAX_LINE_BYTES as usize);
        let mut discarding = false;

        tracing::info!(output_dir = %self.output_dir.display(), "Command loop started");

        loop {
            buf.clear();
            let read = (&mut reader)
                .take(MAX_LINE_BYTES)
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|e| Error::Transport(format!("read failed: {}", e)))?;

            if read == 0 {
                tracing::info!("Event stream closed");
                return Ok(());
            }

            let complete = buf.last() == Some(&b'\n');
            if discarding {
                discarding = !complete;
                continue;
            }
            if !complete && read as u64 == MAX_LINE_BYTES {
                tracing::warn!(limit = MAX_LINE_BYTES, "Dropping over-long line");
                discarding = true;
                continue;
            }

            let line = String::from_utf8_lossy(&buf);
            let command = command_parser::parse(&line);
            if command != Command::Unrecognized {
                tracing::debug!(command = command.as_str(), "Command received");
            }
            self.handle(command).await?;
        }
    }

    /// Release a held camera. The open session is left on disk unassembled.
    pub async fn shutdown(&mut self) {
        if let ControllerState::Active(active) =
            std::mem::replace(&mut self.state, ControllerState::Idle)
        {
            self.camera.release(&active.camera).await;
            tracing::info!(session = %active.session.name, "Camera released on shutdown");
        }
    }

    async fn start_session(&mut self) -> Result<()> {
        if let ControllerState::Active(previous) =
            std::mem::replace(&mut self.state, ControllerState::Idle)
        {
            self.camera.release(&previous.camera).await;
            tracing::warn!(
                session = %previous.session.name,
                captures = previous.next_sequence - 1,
                "Print restarted, abandoning session"
            );
        }

        let handle = self.camera.acquire().await?;
        tracing::info!(model = %handle.model(), port = %handle.port(), "Camera acquired");

        let dir = match self.create_session_dir(Local::now()) {
            Ok(dir) => dir,
            Err(e) => {
                self.camera.release(&handle).await;
                return Err(e);
            }
        };

        let session = Session::new(dir);
        tracing::info!(session = %session.name, "Print started, session opened");
        self.state = ControllerState::Active(ActiveSession::new(session, handle));
        Ok(())
    }

    fn capture(&mut self) {
        let ControllerState::Active(active) = &mut self.state else {
            tracing::debug!("Capture ignored, no active session");
            return;
        };

        let destination = active.next_snapshot_path();
        let handle = active.camera.clone();
        let camera = self.camera.clone();

        self.tasks.spawn("capture", async move {
            capture_one(camera, handle, destination).await;
        });
    }

    async fn stop_session(&mut self) {
        let ControllerState::Active(active) =
            std::mem::replace(&mut self.state, ControllerState::Idle)
        else {
            tracing::debug!("Stop ignored, no active session");
            return;
        };

        self.camera.release(&active.camera).await;
        tracing::info!(
            session = %active.session.name,
            captures = active.next_sequence - 1,
            "Print stopped, session closed"
        );

        let assembler = self.assembler.clone();
        let dir = active.session.directory_path;
        self.tasks.spawn("assemble", async move {
            if let Err(e) = assembler.assemble(&dir).await {
                tracing::error!(session = %dir.display(), error = %e, "Timelapse assembly failed");
            }
        });
    }

    /// Create `<output>/<timestamp>`, moving forward a second at a time if
    /// that name is already taken
    fn create_session_dir(&self, now: DateTime<Local>) -> Result<PathBuf> {
        let mut at = now;
        loop {
            let dir = self.output_dir.join(session_dir_name(&at));
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
                return Ok(dir);
            }
            at += chrono::Duration::seconds(1);
        }
    }
}

async fn capture_one(camera: Arc<dyn CameraResource>, handle: Arc<CameraHandle>, dest: PathBuf) {
    match camera.capture_to(&handle, &dest).await {
        Ok(()) => tracing::info!(file = %display_name(&dest), "Snapshot captured"),
        Err(e) => tracing::error!(file = %dest.display(), error = %e, "Capture failed"),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
