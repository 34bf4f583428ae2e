//! CommandParser - Printer Event Line Parsing
//!
//! ## Responsibilities
//!
//! - Map one raw line from the printer into a typed [`Command`]
//! - Never fail: anything unknown is [`Command::Unrecognized`]
//!
//! The printer firmware emits host-action comments such as
//! `// action:capture`. Only lines carrying the `// ` marker are considered.

use serde::{Deserialize, Serialize};

/// Marker every actionable line must contain
pub const MARKER: &str = "// ";

/// Take one picture for the running session
pub const ACTION_CAPTURE: &str = "action:capture";
/// A print started; open a new session
pub const STATUS_PRINT_START: &str = "status:print_start";
/// The print finished or was aborted; close the session
pub const STATUS_PRINT_STOP: &str = "status:print_stop";

/// Command decoded from the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Capture,
    SessionStart,
    SessionStop,
    Unrecognized,
}

impl Command {
    /// Convert to string for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Capture => "capture",
            Command::SessionStart => "session_start",
            Command::SessionStop => "session_stop",
            Command::Unrecognized => "unrecognized",
        }
    }
}

/// Parse one line of printer output
pub fn parse(line: &str) -> Command {
    if !line.contains(MARKER) {
        return Command::Unrecognized;
    }

    let action = line.replacen(MARKER, "", 1);
    match action.trim() {
        ACTION_CAPTURE => Command::Capture,
        STATUS_PRINT_START => Command::SessionStart,
        STATUS_PRINT_STOP => Command::SessionStop,
        _ => Command::Unrecognized,
    }
}
