//! EventTransport - Serial Line Source
//!
//! ## Responsibilities
//!
//! - Put the serial device in raw mode at the configured baud rate
//! - Hand the command loop a buffered async line reader
//!
//! Any `AsyncBufRead` works as a transport; the serial device is just the
//! one used in production.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::fs::File;
use tokio::io::BufReader;
use tokio::process::Command;

/// Reader handed to the command loop
pub type SerialReader = BufReader<File>;

/// Configure and open a serial device for reading
pub async fn open_serial(port: &Path, baud_rate: u32) -> Result<SerialReader> {
    configure_port(port, baud_rate).await?;

    let file = File::open(port)
        .await
        .map_err(|e| Error::Transport(format!("cannot open {}: {}", port.display(), e)))?;

    tracing::info!(port = %port.display(), baud_rate = baud_rate, "Serial port opened");
    Ok(BufReader::new(file))
}

/// Arguments for `stty`
pub fn stty_args(port: &Path, baud_rate: u32) -> Vec<String> {
    vec![
        "-F".to_string(),
        port.to_string_lossy().into_owned(),
        baud_rate.to_string(),
        "raw".to_string(),
        "-echo".to_string(),
    ]
}

async fn configure_port(port: &Path, baud_rate: u32) -> Result<()> {
    let output = Command::new("stty")
        .args(stty_args(port, baud_rate))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::Transport(format!("stty spawn failed: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Transport(format!(
            "stty failed for {} ({}): {}",
            port.display(),
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}
