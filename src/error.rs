//! Error types

use crate::gpu::GpuError;

/// Window errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Window creation failed: {0}")]
    Creation(String),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error("Multiple windows are not supported")]
    MultipleWindows,
    #[error("Stale window handle")]
    StaleWindow,
    #[error("Event loop error: {0}")]
    EventLoop(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::EventLoop(e.to_string())
    }
}

impl From<calloop::Error> for Error {
    fn from(e: calloop::Error) -> Self {
        Error::EventLoop(e.to_string())
    }
}
