//! Error types for the e-ink core.

use thiserror::Error;

use super::frame::{PixelFormat, PANEL_HEIGHT, PANEL_WIDTH};

/// A frame whose declared size does not match the panel resolution.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error(
    "rendering frame dimension size must be exactly {}x{}px (got {width}x{height})",
    PANEL_WIDTH,
    PANEL_HEIGHT
)]
pub struct DimensionError {
    pub width: u32,
    pub height: u32,
}

/// A frame whose raw data cannot be interpreted with its declared format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("{format:?} frame of {width}x{height} needs {expected} bytes, got {actual}")]
    DataLength {
        format: PixelFormat,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("unknown pixel format tag {0}")]
    UnknownFormat(u8),
}

/// Failure reported by the panel driver while talking to the hardware.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("panel I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("panel busy line timed out after {0} ms")]
    BusyTimeout(u64),
    #[error("panel driver fault: {0}")]
    Fault(String),
}

/// Errors surfaced by the rendering service to its callers.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("hardware fault: {0}")]
    Driver(#[from] DriverError),
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),
    #[error("panel is powered down")]
    PoweredDown,
    #[error("hardware worker failed: {0}")]
    Worker(String),
}
