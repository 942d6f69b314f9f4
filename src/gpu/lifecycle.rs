//! GPU context lifecycle
//!
//! `NoContext -> ContextCreated -> Rendering`, back to `NoContext` on
//! device loss or release. Transient surface errors skip the frame, device
//! loss tears the context down so the next frame recreates it, anything
//! else is fatal to the window.

use std::mem;
use std::ops::{Deref, DerefMut};

use log::{debug, info, warn};

use super::{Context, GpuError, Ops, Renderer};
use crate::platform::Platform;
use crate::unit::{Point, Rgba, Size};

/// Color the surface is cleared to before each frame
const CLEAR_COLOR: Rgba = Rgba::WHITE;

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuState {
    /// No native context
    NoContext,
    /// Context exists, renderer not yet created
    ContextCreated,
    /// Context and renderer ready
    Rendering,
}

/// What happened to a frame handed to [`GpuManager::process`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Rendered and presented
    Presented,
    /// Surface out of date; dropped without notification
    SkippedOutOfDate,
    /// Device lost; context discarded, the next frame recreates it
    SkippedDeviceLost,
    /// The client renders on its own
    CustomRenderer,
}

/// Keeps a context locked for the guard's lifetime
struct Locked<'a> {
    ctx: &'a mut (dyn Context + 'static),
}

impl<'a> Locked<'a> {
    fn acquire(ctx: &'a mut (dyn Context + 'static)) -> Result<Self, GpuError> {
        ctx.lock()?;
        Ok(Self { ctx })
    }
}

impl Deref for Locked<'_> {
    type Target = dyn Context + 'static;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for Locked<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for Locked<'_> {
    fn drop(&mut self) {
        self.ctx.unlock();
    }
}

/// Owner of a window's rendering context
pub struct GpuManager {
    ctx: Option<Box<dyn Context>>,
    renderer: Option<Box<dyn Renderer>>,
    custom_renderer: bool,
    /// Set when a render reported the surface out of date
    needs_refresh: bool,
}

impl GpuManager {
    /// Create a manager with no context
    pub fn new(custom_renderer: bool) -> Self {
        Self {
            ctx: None,
            renderer: None,
            custom_renderer,
            needs_refresh: false,
        }
    }

    pub fn state(&self) -> GpuState {
        match (&self.ctx, &self.renderer) {
            (None, _) => GpuState::NoContext,
            (Some(_), None) => GpuState::ContextCreated,
            (Some(_), Some(_)) => GpuState::Rendering,
        }
    }

    /// Switch between toolkit and client rendering
    pub fn set_custom_renderer(&mut self, custom: bool) {
        if custom && !self.custom_renderer {
            self.release();
        }
        self.custom_renderer = custom;
    }

    pub fn custom_renderer(&self) -> bool {
        self.custom_renderer
    }

    /// The surface must be refreshed before the next frame
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Render and present one frame
    ///
    /// `rendered` runs once the frame has been handed to the renderer and
    /// before the potentially blocking present, so the client can continue.
    /// It is not called when the frame is skipped or fails.
    pub fn process(
        &mut self,
        platform: &mut dyn Platform,
        ops: &Ops,
        viewport: Size,
        offset: Point,
        sync: bool,
        rendered: impl FnOnce(),
    ) -> Result<FrameOutcome, GpuError> {
        if self.custom_renderer {
            rendered();
            return Ok(FrameOutcome::CustomRenderer);
        }

        let mut sync = sync || mem::take(&mut self.needs_refresh);
        if self.ctx.is_none() {
            self.ctx = Some(platform.new_context()?);
            info!("GPU context created");
            sync = true;
        }

        if sync {
            if let Some(ctx) = self.ctx.as_deref_mut() {
                debug!("Refreshing GPU surface ({}x{})", viewport.width, viewport.height);
                if let Err(e) = ctx.refresh() {
                    return self.recover(e);
                }
            }
        }

        match self.draw(ops, viewport, offset, rendered) {
            Ok(()) => Ok(FrameOutcome::Presented),
            Err(e) => self.recover(e),
        }
    }

    fn draw(
        &mut self,
        ops: &Ops,
        viewport: Size,
        offset: Point,
        rendered: impl FnOnce(),
    ) -> Result<(), GpuError> {
        let Self { ctx, renderer, .. } = self;
        let ctx = ctx.as_deref_mut().ok_or(GpuError::DeviceLost)?;
        let mut ctx = Locked::acquire(ctx)?;

        let r = match renderer.take() {
            Some(r) => r,
            None => {
                debug!("Creating renderer");
                ctx.new_renderer()?
            }
        };
        let r = renderer.insert(r);

        r.clear(CLEAR_COLOR);
        let target = ctx.render_target()?;
        r.frame(ops, target, viewport, offset)?;
        rendered();
        ctx.present()
    }

    fn recover(&mut self, err: GpuError) -> Result<FrameOutcome, GpuError> {
        if err.is_transient() {
            debug!("Skipping frame: {}", err);
            self.needs_refresh = true;
            return Ok(FrameOutcome::SkippedOutOfDate);
        }
        self.release();
        if err.is_device_lost() {
            warn!("GPU device lost, context will be recreated");
            return Ok(FrameOutcome::SkippedDeviceLost);
        }
        Err(err)
    }

    /// Free the renderer and the context, returning to `NoContext`
    pub fn release(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            match self.ctx.as_deref_mut().map(Locked::acquire) {
                Some(Ok(_guard)) => renderer.release(),
                Some(Err(e)) => {
                    debug!("Releasing renderer without a current context: {}", e);
                    renderer.release();
                }
                None => renderer.release(),
            }
        }
        if let Some(mut ctx) = self.ctx.take() {
            ctx.release();
            debug!("GPU context released");
        }
        self.needs_refresh = false;
    }

    /// Renderer timings of the last frame
    pub fn profile(&self) -> Option<String> {
        self.renderer.as_ref().map(|r| r.profile())
    }
}

impl Drop for GpuManager {
    fn drop(&mut self) {
        self.release();
    }
}
