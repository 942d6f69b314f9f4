//! GPU context abstraction
//!
//! The native layer supplies a [`Context`] (an EGL/Vulkan/Metal/Direct3D
//! context plus its presentable surface). The coordinator never talks to
//! it directly; it goes through the [`GpuManager`], which owns the context
//! lifecycle and classifies native failures.

pub mod lifecycle;

pub use lifecycle::{FrameOutcome, GpuManager, GpuState};

use crate::unit::{Point, Rgba, Size};

/// GPU failures as classified by the native layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GpuError {
    /// The surface no longer matches the window (size race, temporary
    /// unavailability). Retried on a later frame.
    #[error("GPU surface out of date")]
    OutOfDate,
    /// The device or surface is permanently invalid; the context must be
    /// recreated.
    #[error("GPU device lost")]
    DeviceLost,
    /// No usable GPU API
    #[error("GPU unsupported: {0}")]
    Unsupported(String),
    /// Any other native failure
    #[error("GPU backend error: {0}")]
    Backend(String),
}

impl GpuError {
    /// Skip the frame and try again later
    pub fn is_transient(&self) -> bool {
        matches!(self, GpuError::OutOfDate)
    }

    /// Tear down and recreate the context
    pub fn is_device_lost(&self) -> bool {
        matches!(self, GpuError::DeviceLost)
    }
}

/// Opaque handle to the surface a frame renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderTarget(pub u64);

/// Opaque draw operations produced by the client for one frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ops {
    data: Vec<u8>,
}

impl Ops {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already encoded operation list
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Append encoded operations
    pub fn push(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Drop all operations, keeping the allocation
    pub fn reset(&mut self) {
        self.data.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A native rendering context and its surface
///
/// Every method that touches native GPU state is bracketed by
/// [`Context::lock`] / [`Context::unlock`], except `refresh` and `release`.
pub trait Context {
    /// Resize or recreate the surface to match the window
    fn refresh(&mut self) -> Result<(), GpuError>;
    /// Make the context current on this thread
    fn lock(&mut self) -> Result<(), GpuError>;
    fn unlock(&mut self);
    /// Surface to render the next frame into
    fn render_target(&mut self) -> Result<RenderTarget, GpuError>;
    /// Show the rendered frame
    fn present(&mut self) -> Result<(), GpuError>;
    /// Create the render backend for this context's API
    fn new_renderer(&mut self) -> Result<Box<dyn Renderer>, GpuError>;
    /// Free native resources; the context is unusable afterwards
    fn release(&mut self);
}

/// The render engine driven by the coordinator
pub trait Renderer {
    fn clear(&mut self, color: Rgba);
    /// Render `ops` into `target`, translated by `offset`
    fn frame(
        &mut self,
        ops: &Ops,
        target: RenderTarget,
        viewport: Size,
        offset: Point,
    ) -> Result<(), GpuError>;
    /// Timings of the last frame, for profiling events
    fn profile(&self) -> String;
    fn release(&mut self);
}
