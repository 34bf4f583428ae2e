//! Timelapse Rig Library
//!
//! Print-driven timelapse camera controller with a gallery server
//!
//! ## Architecture
//!
//! 1. CommandParser - Serial line to typed command
//! 2. Camera - Tethered camera access (gphoto2)
//! 3. VideoAssembler - Session folder to timelapse video (ffmpeg)
//! 4. PrintSessionController - Session state machine driving camera and assembler
//! 5. EventTransport - Serial device line source
//! 6. SnapshotCatalog - Session and snapshot listings from disk
//! 7. ThumbnailPipeline - Bounded concurrent thumbnail generation
//! 8. PrinterStatusCache - Background-refreshed printer status
//! 9. WebAPI - Gallery REST endpoints
//!
//! ## Data flow
//!
//! - serial -> CommandParser -> PrintSessionController -> {Camera, VideoAssembler}
//! - HTTP -> SnapshotCatalog -> ThumbnailPipeline -> JSON

pub mod camera;
pub mod command_parser;
pub mod error;
pub mod event_transport;
pub mod models;
pub mod printer_status;
pub mod session_controller;
pub mod snapshot_catalog;
pub mod state;
pub mod thumbnail_pipeline;
pub mod video_assembler;
pub mod web_api;

pub use error::{Error, Result};
