//! Printer status types

use serde::{Deserialize, Serialize};

/// Last known printer status
///
/// The zero value (empty label, 0%, 0s) is what readers see before the
/// first successful refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrinterStatusSnapshot {
    pub state_label: String,
    pub progress_percent: f64,
    pub time_remaining_seconds: u64,
}

impl PrinterStatusSnapshot {
    /// Remaining time split into whole days, hours and minutes
    pub fn remaining_breakdown(&self) -> RemainingTime {
        RemainingTime::from_seconds(self.time_remaining_seconds)
    }
}

/// Human-sized remaining time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemainingTime {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
}

impl RemainingTime {
    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            days: seconds / 86_400,
            hours: (seconds % 86_400) / 3_600,
            minutes: (seconds % 3_600) / 60,
        }
    }
}

/// PrusaLink `GET /api/v1/status` body (only the fields we use)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrusaLinkStatus {
    #[serde(default)]
    pub printer: PrusaLinkPrinter,
    /// Absent while the printer is idle
    #[serde(default)]
    pub job: Option<PrusaLinkJob>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrusaLinkPrinter {
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrusaLinkJob {
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub time_remaining: u64,
}

impl From<PrusaLinkStatus> for PrinterStatusSnapshot {
    fn from(status: PrusaLinkStatus) -> Self {
        let job = status.job.unwrap_or_default();
        Self {
            state_label: status.printer.state,
            progress_percent: job.progress,
            time_remaining_seconds: job.time_remaining,
        }
    }
}
