//! Software GPU context
//!
//! Counts every call and can be told to fail at a given point, so the
//! context lifecycle can be exercised without a GPU.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::gpu::{Context, GpuError, Ops, RenderTarget, Renderer};
use crate::unit::{Point, Rgba, Size};

/// Where an injected fault fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Refresh,
    Lock,
    RenderTarget,
    Frame,
    Present,
}

/// Call counters of all contexts created through one probe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GpuStats {
    pub contexts: usize,
    pub refreshes: usize,
    pub locks: usize,
    pub unlocks: usize,
    pub frames: usize,
    pub presents: usize,
    pub context_releases: usize,
    pub renderer_releases: usize,
    /// Ops of the last rendered frame
    pub last_ops: Vec<u8>,
    pub last_viewport: Size,
    pub last_offset: Point,
    pub last_clear: Option<Rgba>,
}

#[derive(Debug, Default)]
struct ProbeState {
    stats: GpuStats,
    faults: VecDeque<(FaultPoint, GpuError)>,
    context_failure: Option<GpuError>,
}

/// Shared view into the software contexts of a window
#[derive(Debug, Clone, Default)]
pub struct GpuProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl GpuProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> GpuStats {
        self.lock().stats.clone()
    }

    /// Fail the next call at `point` with `err`
    pub fn inject(&self, point: FaultPoint, err: GpuError) {
        self.lock().faults.push_back((point, err));
    }

    /// Fail the next context creation
    pub fn fail_next_context(&self, err: GpuError) {
        self.lock().context_failure = Some(err);
    }

    pub(crate) fn new_context(&self) -> Result<Box<dyn Context>, GpuError> {
        let mut state = self.lock();
        if let Some(err) = state.context_failure.take() {
            return Err(err);
        }
        state.stats.contexts += 1;
        debug!("Software context #{} created", state.stats.contexts);
        Ok(Box::new(SoftContext {
            probe: self.clone(),
            target: state.stats.contexts as u64,
        }))
    }

    /// Count a call at `point`, failing if a fault was injected there
    fn hit(&self, point: FaultPoint, count: impl FnOnce(&mut GpuStats)) -> Result<(), GpuError> {
        let mut state = self.lock();
        if let Some(i) = state.faults.iter().position(|(p, _)| *p == point) {
            if let Some((_, err)) = state.faults.remove(i) {
                debug!("Injected {:?} at {:?}", err, point);
                return Err(err);
            }
        }
        count(&mut state.stats);
        Ok(())
    }
}

struct SoftContext {
    probe: GpuProbe,
    target: u64,
}

impl Context for SoftContext {
    fn refresh(&mut self) -> Result<(), GpuError> {
        self.probe.hit(FaultPoint::Refresh, |s| s.refreshes += 1)
    }

    fn lock(&mut self) -> Result<(), GpuError> {
        self.probe.hit(FaultPoint::Lock, |s| s.locks += 1)
    }

    fn unlock(&mut self) {
        self.probe.lock().stats.unlocks += 1;
    }

    fn render_target(&mut self) -> Result<RenderTarget, GpuError> {
        self.probe.hit(FaultPoint::RenderTarget, |_| {})?;
        Ok(RenderTarget(self.target))
    }

    fn present(&mut self) -> Result<(), GpuError> {
        self.probe.hit(FaultPoint::Present, |s| s.presents += 1)
    }

    fn new_renderer(&mut self) -> Result<Box<dyn Renderer>, GpuError> {
        Ok(Box::new(SoftRenderer {
            probe: self.probe.clone(),
        }))
    }

    fn release(&mut self) {
        self.probe.lock().stats.context_releases += 1;
    }
}

struct SoftRenderer {
    probe: GpuProbe,
}

impl Renderer for SoftRenderer {
    fn clear(&mut self, color: Rgba) {
        self.probe.lock().stats.last_clear = Some(color);
    }

    fn frame(
        &mut self,
        ops: &Ops,
        _target: RenderTarget,
        viewport: Size,
        offset: Point,
    ) -> Result<(), GpuError> {
        self.probe.hit(FaultPoint::Frame, |s| {
            s.frames += 1;
            s.last_ops = ops.as_bytes().to_vec();
            s.last_viewport = viewport;
            s.last_offset = offset;
        })
    }

    fn profile(&self) -> String {
        format!("frames:{}", self.probe.lock().stats.frames)
    }

    fn release(&mut self) {
        self.probe.lock().stats.renderer_releases += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faults_fire_once_at_their_point() {
        let probe = GpuProbe::new();
        let mut ctx = probe.new_context().unwrap();
        probe.inject(FaultPoint::Present, GpuError::OutOfDate);
        assert!(ctx.refresh().is_ok());
        assert_eq!(ctx.present(), Err(GpuError::OutOfDate));
        assert!(ctx.present().is_ok());
        let stats = probe.stats();
        assert_eq!(stats.refreshes, 1);
        assert_eq!(stats.presents, 1);
    }

    #[test]
    fn test_context_failure_is_one_shot() {
        let probe = GpuProbe::new();
        probe.fail_next_context(GpuError::DeviceLost);
        assert!(probe.new_context().is_err());
        assert!(probe.new_context().is_ok());
        assert_eq!(probe.stats().contexts, 1);
    }
}
