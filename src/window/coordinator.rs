//! Window coordinator
//!
//! One coordinator per window. The backend feeds it native events through
//! [`Coordinator::event`] and attaches its capabilities with
//! [`Coordinator::set_driver`]; the coordinator forwards events to the
//! client, waits for the client where ordering matters, drives the GPU
//! manager and relays the client's side requests back to the platform.
//!
//! Every entry point takes `&mut self`, so a window processes exactly one
//! native event at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};
use log::{debug, error, info, warn};

use super::animation::Animation;
use super::client::{Outbound, PendingWindow};
use super::deferred::Deferred;
use super::event::{Event, Frame, FrameEvent, FrameLink, FrameRequest, NativeEvent, Stage, Submission};
use super::scheduler::Scheduler;
use crate::config::{self, Config, WindowMode, WindowOption, DEFAULT_DECORATION_HEIGHT};
use crate::error::Error;
use crate::gpu::{FrameOutcome, GpuManager, GpuState};
use crate::input::editor::{EditorState, Range};
use crate::input::keyboard::{KeyName, KeyState, Modifiers};
use crate::input::semantic::{SemanticId, SemanticNode, SemanticTree};
use crate::input::{ActionArea, FocusDirection, Handlers, InputEvent, Router};
use crate::platform::{Actions, Cursor, Platform, TextInputState};
use crate::unit::{Dp, Metric, Point, PointF, Rect, Size};

/// Observable window lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// No native window attached yet
    Unrealized,
    /// Native window attached, not running
    Inactive,
    Running,
    /// Final; further events are discarded
    Destroyed,
}

/// Fallback decoration state
#[derive(Debug)]
struct Decorations {
    /// The client wants decorations
    enabled: bool,
    /// Height of the fallback decorations, when drawn
    height: Dp,
    /// Configuration as last confirmed by the native layer
    config: Config,
    /// Decoration height in pixels subtracted from the last frame
    current_height: i32,
    /// Title bar area of the last frame
    bar: Option<Rect>,
}

/// Coordinator state; every method that needs the platform gets it
/// passed in
struct State {
    out: Option<Sender<Outbound>>,
    frames: Receiver<Submission>,
    link: FrameLink,
    current_frame: Arc<AtomicU64>,
    destroy: Option<Sender<()>>,
    immediate: Receiver<()>,
    redraws: Receiver<()>,
    deferred: Arc<Deferred>,
    scheduler: Option<Scheduler>,

    destroyed: bool,
    stage: Stage,
    metric: Metric,
    viewport: Rect,
    cursor: Cursor,
    decorations: Decorations,
    animation: Animation,
    gpu: GpuManager,
    ime: EditorState,
    semantic: SemanticTree,
    router: Router,
    frame_seq: u64,
}

/// Per-window state machine
pub struct Coordinator {
    platform: Option<Box<dyn Platform>>,
    state: State,
}

impl Coordinator {
    /// Realize a pending window; it stays unrealized until a driver is
    /// attached
    pub fn new(pending: PendingWindow) -> Self {
        let PendingWindow {
            out,
            frames,
            link,
            destroy,
            immediate,
            redraws,
            deferred,
            scheduler,
        } = pending;
        let current_frame = link.current.clone();
        Self {
            platform: None,
            state: State {
                out: Some(out),
                frames,
                link,
                current_frame,
                destroy: Some(destroy),
                immediate,
                redraws,
                deferred,
                scheduler: Some(scheduler),
                destroyed: false,
                stage: Stage::Suspended,
                metric: Metric::default(),
                viewport: Rect::default(),
                cursor: Cursor::Default,
                decorations: Decorations {
                    enabled: false,
                    height: DEFAULT_DECORATION_HEIGHT,
                    config: Config::default(),
                    current_height: 0,
                    bar: None,
                },
                animation: Animation::new(),
                gpu: GpuManager::new(false),
                ime: EditorState::default(),
                semantic: SemanticTree::new(),
                router: Router::new(),
                frame_seq: 0,
            },
        }
    }

    /// Attach or detach the native window's capabilities
    ///
    /// Attaching flushes requests the client made while unrealized.
    pub fn set_driver(&mut self, platform: Option<Box<dyn Platform>>) {
        self.platform = platform;
        let waker = self.platform.as_ref().map(|p| p.waker());
        if let Some(scheduler) = &self.state.scheduler {
            scheduler.set_waker(waker);
        }
        match self.platform.as_deref_mut() {
            Some(d) if !self.state.destroyed => {
                info!("Window realized");
                self.state.update_state(d);
            }
            Some(_) => {}
            None => debug!("Window driver detached"),
        }
    }

    /// Process a native event
    ///
    /// Returns whether the event was handled; `false` for every event
    /// after the window was destroyed.
    pub fn event(&mut self, e: NativeEvent) -> bool {
        let Some(d) = self.platform.as_deref_mut() else {
            warn!("Ignoring {:?} for a window without driver", e);
            return false;
        };
        if self.state.destroyed {
            debug!("Discarding event for destroyed window");
            return false;
        }
        let handled = self.state.process_event(d, e);
        if !self.state.destroyed {
            self.state.update_state(d);
        }
        handled
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.state.destroyed {
            Lifecycle::Destroyed
        } else if self.platform.is_none() {
            Lifecycle::Unrealized
        } else if self.state.stage >= Stage::Running {
            Lifecycle::Running
        } else {
            Lifecycle::Inactive
        }
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn gpu_state(&self) -> GpuState {
        self.state.gpu.state()
    }

    pub fn is_animating(&self) -> bool {
        self.state.animation.is_animating()
    }

    /// Configuration as seen by the client
    pub fn config(&self) -> Config {
        self.state.effective_config()
    }

    /// Content area of the last frame, insets applied
    pub fn viewport(&self) -> Rect {
        self.state.viewport
    }

    // IME bridge

    pub fn editor_state(&self) -> &EditorState {
        &self.state.ime
    }

    pub fn set_composing_region(&mut self, range: Range) {
        self.state.ime.composing = range;
    }

    /// Replace the selection with `text` and put the caret after it
    pub fn editor_insert(&mut self, text: &str) {
        let sel = self.state.ime.selection.range;
        self.editor_replace(sel, text);
        let start = sel.start.min(sel.end) + text.chars().count() as i32;
        self.set_editor_selection(Range::new(start, start));
    }

    pub fn editor_replace(&mut self, range: Range, text: &str) {
        self.state.ime.replace(range, text);
        self.event(NativeEvent::Input(InputEvent::Edit {
            range,
            text: text.to_string(),
        }));
        let snippet = self.state.ime.snippet.range;
        self.event(NativeEvent::Input(InputEvent::Snippet(snippet)));
    }

    pub fn set_editor_selection(&mut self, range: Range) {
        self.state.ime.selection.range = range;
        self.event(NativeEvent::Input(InputEvent::Selection(range)));
    }

    /// Ask the client to widen the snippet to cover `range`
    pub fn set_editor_snippet(&mut self, range: Range) {
        if self.state.ime.snippet.range == range {
            return;
        }
        self.event(NativeEvent::Input(InputEvent::Snippet(range)));
    }

    // Accessibility bridge

    pub fn semantic_root(&self) -> Option<SemanticId> {
        self.state.semantic.root()
    }

    pub fn lookup_semantic(&self, id: SemanticId) -> Option<&SemanticNode> {
        self.state.semantic.lookup(id)
    }

    /// Nodes changed by the last frame, children first
    pub fn semantic_diffs(&self) -> Vec<SemanticId> {
        self.state.semantic.diffs()
    }

    pub fn semantic_at(&self, pos: PointF) -> Option<SemanticId> {
        self.state.semantic.hit(pos)
    }

    /// System actions under `pos`, e.g. for native title bar hit testing
    pub fn action_at(&self, pos: PointF) -> Option<Actions> {
        self.state.router.action_at(pos)
    }

    /// Click the focused handler, e.g. for an accessibility activation
    pub fn click_focus(&mut self) {
        let Some(d) = self.platform.as_deref_mut() else {
            return;
        };
        if self.state.router.click_focus() {
            self.state.redraw(d);
        }
    }
}

impl State {
    fn process_event(&mut self, d: &mut dyn Platform, e: NativeEvent) -> bool {
        match e {
            NativeEvent::Stage(stage) => {
                if stage < Stage::Running && self.gpu.state() != GpuState::NoContext {
                    debug!("Releasing GPU resources for {:?}", stage);
                    self.gpu.release();
                }
                self.stage = stage;
                self.update_animation(d);
                self.send(d, Event::Stage(stage));
                self.wait_ack(d);
            }
            NativeEvent::Frame(req) => self.frame(d, req),
            NativeEvent::Destroy => self.destroy(d, None),
            NativeEvent::Config(config) => {
                self.gpu.set_custom_renderer(config.custom_renderer);
                self.decorations.config = config;
                let effective = self.effective_config();
                self.send(d, Event::Config(effective));
            }
            NativeEvent::Input(e) => return self.input(d, e),
            NativeEvent::Wakeup => {}
        }
        true
    }

    fn input(&mut self, d: &mut dyn Platform, e: InputEvent) -> bool {
        let mut handled = self.router.queue(e.clone());
        if let InputEvent::Key(key) = &e {
            if !handled && key.state == KeyState::Press {
                handled = match (&key.name, key.modifiers) {
                    (KeyName::Tab, m) if m.is_empty() => {
                        self.router.move_focus(FocusDirection::Forward);
                        true
                    }
                    (KeyName::Tab, Modifiers::SHIFT) => {
                        self.router.move_focus(FocusDirection::Backward);
                        true
                    }
                    _ => false,
                };
            }
            // The topmost handler receives everything nobody else handled
            if !handled {
                handled = self.router.queue_topmost(e);
            }
        }
        self.update_cursor(d);
        if handled {
            self.redraw(d);
        }
        handled
    }

    fn frame(&mut self, d: &mut dyn Platform, req: FrameRequest) {
        if req.size.is_empty() {
            warn!("Ignoring frame request of size {:?}", req.size);
            return;
        }
        if self.stage < Stage::Inactive {
            debug!("No drawing while {:?}", self.stage);
            return;
        }
        if self.idle(&req) {
            debug!("Nothing to redraw");
            return;
        }
        self.metric = req.metric;
        let frame_start = self.router.profiling().then(Instant::now);
        self.animation.clear_next_frame();

        let m = req.metric;
        self.viewport = Rect::new(
            m.dp(req.insets.left),
            m.dp(req.insets.top),
            req.size.width - m.dp(req.insets.right),
            req.size.height - m.dp(req.insets.bottom),
        );
        let (size, offset) = self.decorate(d, req.size);

        self.frame_seq += 1;
        let seq = self.frame_seq;
        self.current_frame.store(seq, Ordering::Release);
        let event = FrameEvent {
            now: req.now,
            metric: req.metric,
            size,
            insets: req.insets,
            input: self.router.drain(),
            seq,
            link: self.link.clone(),
        };
        self.send(d, Event::Frame(event));
        let submission = self.wait_frame(d, seq);
        self.current_frame.store(0, Ordering::Release);

        let Some(Submission { frame, ack, .. }) = submission else {
            debug!("Frame {} declined", seq);
            self.process_frame(d, frame_start);
            self.update_cursor(d);
            return;
        };
        let Frame {
            ops,
            handlers,
            requests,
            semantics,
        } = frame;
        let handlers = self.window_handlers(handlers, offset);
        self.router.frame(handlers, requests);
        if let Some(nodes) = semantics {
            self.semantic.update(nodes);
        }

        let outcome = self
            .gpu
            .process(d, &ops, req.size, offset, req.sync, move || drop(ack));
        match outcome {
            Ok(FrameOutcome::SkippedDeviceLost) => {
                // The next frame event makes the single recreation attempt
                self.animation.set_next_frame(Instant::now());
            }
            Ok(outcome) => debug!("Frame {}: {:?}", seq, outcome),
            Err(e) => {
                error!("GPU failure: {}", e);
                self.destroy(d, Some(Error::Gpu(e)));
                return;
            }
        }
        self.process_frame(d, frame_start);
        self.update_cursor(d);
    }

    /// True if a frame request would redraw an unchanged window
    fn idle(&self, req: &FrameRequest) -> bool {
        !req.sync
            && !self.animation.is_animating()
            && self.animation.next_frame().is_none()
            && !self.gpu.needs_refresh()
            && !self.router.has_pending()
            && self.gpu.state() == GpuState::Rendering
    }

    /// Move client handlers into window coordinates, below the title bar
    fn window_handlers(&self, mut handlers: Handlers, offset: Point) -> Handlers {
        let shift = |r: Rect| Rect {
            min: r.min + offset,
            max: r.max + offset,
        };
        for area in &mut handlers.hit_areas {
            area.bounds = shift(area.bounds);
        }
        for area in &mut handlers.action_areas {
            area.bounds = shift(area.bounds);
        }
        if let Some(bar) = self.decorations.bar {
            handlers.action_areas.insert(
                0,
                ActionArea {
                    actions: Actions::MOVE,
                    bounds: bar,
                },
            );
        }
        handlers
    }

    /// Apply the side requests of the last frame
    fn process_frame(&mut self, d: &mut dyn Platform, frame_start: Option<Instant>) {
        match self.router.take_text_input() {
            TextInputState::Open => d.show_text_input(true),
            TextInputState::Close => d.show_text_input(false),
            TextInputState::Keep => {}
        }
        if let Some(hint) = self.router.take_input_hint() {
            d.set_input_hint(hint);
        }
        if let Some(text) = self.router.take_write_clipboard() {
            d.write_clipboard(text);
        }
        if self.router.take_read_clipboard() {
            d.read_clipboard();
        }

        let mut new = self.router.editor_state().cloned().unwrap_or_default();
        // The IME owns the composing range
        new.composing = self.ime.composing;
        if new != self.ime {
            let old = std::mem::replace(&mut self.ime, new);
            d.editor_state_changed(&old, &self.ime);
        }

        if let (Some(start), Some(profile)) = (frame_start, self.gpu.profile()) {
            let micros = start.elapsed().as_micros() as u64;
            let total = Duration::from_micros(micros / 100 * 100);
            let timings = format!("tot:{:>7} {}", format!("{:.1?}", total), profile);
            self.router.queue(InputEvent::Profile(timings));
        }
        if let Some(at) = self.router.take_wakeup_time() {
            self.animation.set_next_frame(at);
        }
        self.update_animation(d);
    }

    fn fallback_decorate(&self) -> bool {
        let config = &self.decorations.config;
        self.decorations.enabled
            && !config.decorated
            && config.mode != WindowMode::Fullscreen
            && !self.gpu.custom_renderer()
    }

    /// Reserve room for the fallback title bar; returns the client's size
    /// and its offset in the window
    fn decorate(&mut self, d: &mut dyn Platform, size: Size) -> (Size, Point) {
        if !self.fallback_decorate() {
            self.decorations.bar = None;
            return (size, Point::default());
        }
        let height = self.metric.dp(self.decorations.config.decoration_height);
        if self.decorations.current_height != height {
            self.decorations.current_height = height;
            let config = self.effective_config();
            self.send(d, Event::Config(config));
        }
        self.decorations.bar = Some(Rect::new(0, 0, size.width, height));
        (
            Size::new(size.width, size.height - height),
            Point::new(0, height),
        )
    }

    fn effective_config(&self) -> Config {
        let mut config = self.decorations.config.clone();
        config.size.height -= self.decorations.current_height;
        config.decorated = self.decorations.enabled || config.decorated;
        config
    }

    fn update_cursor(&mut self, d: &mut dyn Platform) {
        let cursor = self.router.cursor();
        if cursor != self.cursor {
            self.cursor = cursor;
            d.set_cursor(cursor);
        }
    }

    fn update_animation(&mut self, d: &mut dyn Platform) {
        let update = self.animation.update(self.stage, Instant::now());
        if let (Some(at), Some(scheduler)) = (update.schedule, &self.scheduler) {
            scheduler.redraw_at(at);
        }
        if let Some(animating) = update.toggle {
            debug!("Animating: {}", animating);
            d.set_animating(animating);
        }
    }

    /// Request a frame now
    fn redraw(&mut self, d: &mut dyn Platform) {
        self.animation.set_next_frame(Instant::now());
        self.update_animation(d);
    }

    /// Drain redraw requests and deferred work
    fn update_state(&mut self, d: &mut dyn Platform) {
        while self.redraws.try_recv().is_ok() {
            self.redraw(d);
        }
        self.apply_deferred(d);
    }

    fn apply_deferred(&mut self, d: &mut dyn Platform) {
        let pending = self.deferred.take();
        if pending.is_empty() {
            return;
        }
        let mut options = pending.options;
        if !options.is_empty() {
            let mut config = Config {
                decorated: self.decorations.enabled,
                decoration_height: self.decorations.height,
                ..Default::default()
            };
            config.apply(self.metric, &options);
            self.decorations.enabled = config.decorated;
            self.decorations.height = config.decoration_height;
            for option in &options {
                if let WindowOption::CustomRenderer(custom) = option {
                    self.gpu.set_custom_renderer(*custom);
                }
            }
            let height = if self.decorations.enabled {
                self.decorations.height
            } else {
                Dp(0.0)
            };
            config::coalesce(&mut options, [WindowOption::DecorationHeight(height)]);
            debug!("Configuring {:?}", options);
            d.configure(options);
        }
        if !pending.actions.is_empty() {
            d.perform(pending.actions);
        }
        if let Some(text) = pending.write_clipboard {
            d.write_clipboard(text);
        }
        if pending.read_clipboard {
            d.read_clipboard();
        }
        match pending.text_input {
            TextInputState::Open => d.show_text_input(true),
            TextInputState::Close => d.show_text_input(false),
            TextInputState::Keep => {}
        }
        if let Some(hint) = pending.input_hint {
            d.set_input_hint(hint);
        }
    }

    /// Channels every wait services besides the client
    fn wait_sources(&self) -> (Receiver<()>, Receiver<Submission>, Receiver<()>) {
        (
            self.deferred.ready().clone(),
            self.frames.clone(),
            self.immediate.clone(),
        )
    }

    /// Hand an event to the client, servicing deferred work until it is
    /// taken
    fn send(&mut self, d: &mut dyn Platform, e: Event) {
        let Some(out) = self.out.clone() else {
            return;
        };
        let (ready, frames, immediate) = self.wait_sources();
        loop {
            select! {
                send(out, Outbound::Event(e.clone())) -> res => {
                    if res.is_err() {
                        debug!("Client went away");
                    }
                    return;
                }
                recv(ready) -> _ => self.apply_deferred(d),
                recv(frames) -> sub => {
                    if let Ok(sub) = sub {
                        stale(sub);
                    }
                }
                recv(immediate) -> _ => self.redraw(d),
            }
        }
    }

    /// Wait until the client asks for its next event
    fn wait_ack(&mut self, d: &mut dyn Platform) {
        let Some(out) = self.out.clone() else {
            return;
        };
        let (ready, frames, immediate) = self.wait_sources();
        loop {
            select! {
                send(out, Outbound::Sync) -> _ => return,
                recv(ready) -> _ => self.apply_deferred(d),
                recv(frames) -> sub => {
                    if let Ok(sub) = sub {
                        stale(sub);
                    }
                }
                recv(immediate) -> _ => {
                    // Invalidated while handling the event
                    self.redraw(d);
                }
            }
        }
    }

    /// Wait until the client submits frame `seq` or declines it
    fn wait_frame(&mut self, d: &mut dyn Platform, seq: u64) -> Option<Submission> {
        let out = self.out.clone()?;
        let (ready, frames, immediate) = self.wait_sources();
        loop {
            select! {
                recv(frames) -> sub => match sub {
                    Ok(sub) if sub.seq == seq => return Some(sub),
                    Ok(sub) => stale(sub),
                    Err(_) => return None,
                },
                send(out, Outbound::Sync) -> _ => return None,
                recv(ready) -> _ => self.apply_deferred(d),
                recv(immediate) -> _ => {
                    // Invalidated during frame production; picked up by
                    // the animation update after the frame
                    self.animation.set_next_frame(Instant::now());
                }
            }
        }
    }

    fn destroy(&mut self, d: &mut dyn Platform, err: Option<Error>) {
        if self.destroyed {
            return;
        }
        info!("Window destroyed{}", if err.is_some() { " with error" } else { "" });
        self.gpu.release();
        self.send(d, Event::Destroy { err });
        self.animation.clear_next_frame();
        if self.animation.is_animating() {
            self.update_animation(d);
        }
        self.destroyed = true;
        // Unblocks clients waiting on frames and closes the event stream
        self.out = None;
        drop(self.destroy.take());
        self.scheduler = None;
    }
}

/// Release a submission for a frame event that is no longer current
fn stale(sub: Submission) {
    debug!("Dropping stale frame {}", sub.seq);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use crate::backend::headless::{Call, CallLog, FaultPoint, GpuProbe, HeadlessPlatform};
    use crate::gpu::{GpuError, Ops};
    use crate::input::keyboard::KeyEvent;
    use crate::input::pointer::{PointerEvent, PointerKind};
    use crate::input::{HitArea, Requests, Tag};
    use crate::unit::Insets;
    use crate::window::Window;

    /// Coordinator with a recording platform, running
    fn running(options: Vec<WindowOption>) -> (Coordinator, Window, CallLog, GpuProbe) {
        // The recording platform never confirms its own decorations
        let mut all = vec![WindowOption::Decorated(false)];
        all.extend(options);
        let (window, pending) = Window::new(all).unwrap();
        let probe = GpuProbe::new();
        let platform = HeadlessPlatform::standalone(probe.clone());
        let calls = platform.calls();
        let mut coordinator = Coordinator::new(pending);
        coordinator.set_driver(Some(Box::new(platform)));
        (coordinator, window, calls, probe)
    }

    fn request(sync: bool) -> NativeEvent {
        NativeEvent::Frame(FrameRequest {
            now: Instant::now(),
            size: Size::new(200, 100),
            insets: Insets::default(),
            metric: Metric::uniform(1.0),
            sync,
        })
    }

    /// Client thread answering every frame with `respond`; returns the
    /// events it saw
    fn client(
        window: Window,
        mut respond: impl FnMut(FrameEvent) + Send + 'static,
    ) -> thread::JoinHandle<Vec<String>> {
        thread::spawn(move || {
            let mut seen = Vec::new();
            while let Some(e) = window.next_event() {
                match e {
                    Event::Frame(f) => {
                        seen.push("frame".to_string());
                        respond(f);
                    }
                    Event::Stage(s) => seen.push(format!("stage {:?}", s)),
                    Event::Config(_) => seen.push("config".to_string()),
                    Event::Destroy { err } => seen.push(format!("destroy {:?}", err)),
                }
            }
            seen
        })
    }

    fn draw(f: FrameEvent) {
        f.submit(Frame::new(Ops::from_bytes(b"fill".to_vec())));
    }

    fn start(coordinator: &mut Coordinator) {
        assert!(coordinator.event(NativeEvent::Stage(Stage::Running)));
    }

    fn finish(mut coordinator: Coordinator, handle: thread::JoinHandle<Vec<String>>) -> Vec<String> {
        coordinator.event(NativeEvent::Destroy);
        handle.join().unwrap()
    }

    #[test]
    fn test_lifecycle() {
        let (window, pending) = Window::new([]).unwrap();
        let mut coordinator = Coordinator::new(pending);
        assert_eq!(coordinator.lifecycle(), Lifecycle::Unrealized);
        // No driver: ignored
        assert!(!coordinator.event(NativeEvent::Wakeup));

        coordinator.set_driver(Some(Box::new(HeadlessPlatform::standalone(GpuProbe::new()))));
        assert_eq!(coordinator.lifecycle(), Lifecycle::Inactive);

        let handle = client(window, draw);
        start(&mut coordinator);
        assert_eq!(coordinator.lifecycle(), Lifecycle::Running);
        coordinator.event(NativeEvent::Destroy);
        assert_eq!(coordinator.lifecycle(), Lifecycle::Destroyed);
        // Discarded after destruction
        assert!(!coordinator.event(request(true)));

        let seen = handle.join().unwrap();
        assert_eq!(seen, vec!["stage Running", "destroy None"]);
    }

    #[test]
    fn test_attach_flushes_initial_options() {
        let (_coordinator, _window, calls, _) = running(vec![
            WindowOption::Decorated(true),
            WindowOption::Title("hello".into()),
        ]);
        let configured = calls.snapshot().into_iter().find_map(|c| match c {
            Call::Configure(options) => Some(options),
            _ => None,
        });
        let options = configured.unwrap();
        assert!(options.contains(&WindowOption::Title("hello".into())));
        assert!(options.contains(&WindowOption::DecorationHeight(DEFAULT_DECORATION_HEIGHT)));
    }

    #[test]
    fn test_frame_renders_and_presents() {
        let (mut coordinator, window, _, probe) = running(vec![]);
        let handle = client(window, draw);
        start(&mut coordinator);
        coordinator.event(request(true));
        assert_eq!(coordinator.gpu_state(), GpuState::Rendering);
        let stats = probe.stats();
        assert_eq!(stats.presents, 1);
        assert_eq!(stats.last_ops, b"fill".to_vec());
        let seen = finish(coordinator, handle);
        assert_eq!(seen, vec!["stage Running", "frame", "destroy None"]);
    }

    #[test]
    fn test_stage_drop_releases_context_before_next_frame() {
        let (mut coordinator, window, _, probe) = running(vec![]);
        let handle = client(window, draw);
        start(&mut coordinator);
        coordinator.event(request(true));
        assert_eq!(coordinator.gpu_state(), GpuState::Rendering);

        coordinator.event(NativeEvent::Stage(Stage::Suspended));
        assert_eq!(coordinator.gpu_state(), GpuState::NoContext);
        assert_eq!(probe.stats().context_releases, 1);
        // Ignored while suspended
        coordinator.event(request(true));
        assert_eq!(probe.stats().contexts, 1);

        coordinator.event(NativeEvent::Stage(Stage::Running));
        coordinator.event(request(true));
        assert_eq!(probe.stats().contexts, 2);
        finish(coordinator, handle);
    }

    #[test]
    fn test_declined_frame_does_no_gpu_work() {
        let (mut coordinator, window, _, probe) = running(vec![]);
        let drew = Arc::new(AtomicU64::new(0));
        let handle = {
            let drew = drew.clone();
            client(window, move |f| {
                // Draw the first frame, decline the rest
                if drew.fetch_add(1, Ordering::SeqCst) == 0 {
                    draw(f);
                }
            })
        };
        start(&mut coordinator);
        coordinator.event(request(true));
        let before = probe.stats();
        coordinator.event(request(true));
        let after = probe.stats();
        assert_eq!(after.refreshes, before.refreshes);
        assert_eq!(after.presents, before.presents);
        assert!(!coordinator.is_animating());
        let seen = finish(coordinator, handle);
        assert_eq!(seen, vec!["stage Running", "frame", "frame", "destroy None"]);
    }

    #[test]
    fn test_idle_frame_request_is_skipped() {
        let (mut coordinator, window, _, probe) = running(vec![]);
        let handle = client(window, draw);
        start(&mut coordinator);
        coordinator.event(request(true));
        let before = probe.stats();

        // Nothing changed and nothing animates
        coordinator.event(request(false));
        let after = probe.stats();
        assert_eq!(after.refreshes, before.refreshes);
        assert_eq!(after.presents, before.presents);
        let seen = finish(coordinator, handle);
        assert_eq!(seen, vec!["stage Running", "frame", "destroy None"]);
    }

    #[test]
    fn test_inactive_releases_context_before_next_frame() {
        let (mut coordinator, window, _, probe) = running(vec![]);
        let handle = client(window, draw);
        start(&mut coordinator);
        coordinator.event(request(true));
        assert_eq!(coordinator.gpu_state(), GpuState::Rendering);

        coordinator.event(NativeEvent::Stage(Stage::Inactive));
        assert_eq!(coordinator.gpu_state(), GpuState::NoContext);
        assert_eq!(probe.stats().context_releases, 1);

        // Still drawn while inactive, on a fresh context
        coordinator.event(request(false));
        assert_eq!(coordinator.gpu_state(), GpuState::Rendering);
        assert_eq!(probe.stats().contexts, 2);
        finish(coordinator, handle);
    }

    #[test]
    fn test_invalidate_while_sending_config_is_kept() {
        let (mut coordinator, window, calls, _) = running(vec![]);
        let window = Arc::new(window);
        let handle = {
            let window = window.clone();
            thread::spawn(move || {
                let mut first = true;
                while let Some(e) = window.next_event() {
                    if let Event::Frame(f) = e {
                        draw(f);
                        if first {
                            first = false;
                            // Let the coordinator block on the config event
                            thread::sleep(Duration::from_millis(100));
                            window.invalidate();
                        }
                    }
                }
            })
        };
        start(&mut coordinator);
        coordinator.event(request(true));
        assert!(!coordinator.is_animating());

        let config = coordinator.config();
        coordinator.event(NativeEvent::Config(config));
        assert!(coordinator.is_animating());
        assert!(calls.snapshot().contains(&Call::SetAnimating(true)));

        coordinator.event(NativeEvent::Destroy);
        assert!(!coordinator.is_animating());
        assert_eq!(calls.count(|c| *c == Call::SetAnimating(false)), 1);
        drop(window);
        handle.join().unwrap();
    }

    #[test]
    fn test_invalidate_during_frame_schedules_one_more() {
        let (mut coordinator, window, calls, _) = running(vec![]);
        let window = Arc::new(window);
        let handle = {
            let client_window = window.clone();
            thread::spawn(move || {
                let mut frames = 0;
                while let Some(e) = client_window.next_event() {
                    if let Event::Frame(f) = e {
                        frames += 1;
                        if frames == 1 {
                            client_window.invalidate();
                            client_window.invalidate();
                        }
                        draw(f);
                    }
                }
                frames
            })
        };
        start(&mut coordinator);
        coordinator.event(request(false));
        // The invalidation survived the frame: animate into the next one
        assert!(coordinator.is_animating());
        assert_eq!(
            calls
                .snapshot()
                .iter()
                .filter(|c| **c == Call::SetAnimating(true))
                .count(),
            1
        );

        coordinator.event(request(false));
        assert!(!coordinator.is_animating());
        coordinator.event(NativeEvent::Destroy);
        drop(window);
        assert_eq!(handle.join().unwrap(), 2);
    }

    #[test]
    fn test_device_loss_requests_redraw() {
        let (mut coordinator, window, _, probe) = running(vec![]);
        let handle = client(window, draw);
        start(&mut coordinator);
        coordinator.event(request(true));

        probe.inject(FaultPoint::Present, GpuError::DeviceLost);
        coordinator.event(request(false));
        assert_eq!(coordinator.gpu_state(), GpuState::NoContext);
        assert!(coordinator.is_animating());

        coordinator.event(request(false));
        assert_eq!(coordinator.gpu_state(), GpuState::Rendering);
        assert_eq!(probe.stats().contexts, 2);
        finish(coordinator, handle);
    }

    #[test]
    fn test_fatal_gpu_error_destroys_window() {
        let (mut coordinator, window, _, probe) = running(vec![]);
        let handle = client(window, draw);
        start(&mut coordinator);
        probe.fail_next_context(GpuError::Unsupported("no device".into()));
        coordinator.event(request(true));
        assert_eq!(coordinator.lifecycle(), Lifecycle::Destroyed);
        assert!(!coordinator.event(request(true)));

        let seen = handle.join().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen[2].contains("no device"));
    }

    #[test]
    fn test_title_changes_do_not_refresh() {
        let (mut coordinator, window, calls, probe) = running(vec![]);
        let window = Arc::new(window);
        let handle = {
            let window = window.clone();
            thread::spawn(move || while let Some(e) = window.next_event() {
                if let Event::Frame(f) = e {
                    draw(f);
                }
            })
        };
        start(&mut coordinator);
        coordinator.event(request(true));
        let refreshes = probe.stats().refreshes;

        for title in ["one", "two"] {
            window.option([WindowOption::Title(title.into())]);
            coordinator.event(NativeEvent::Wakeup);
            let mut config = coordinator.config();
            config.title = title.into();
            coordinator.event(NativeEvent::Config(config));
        }
        assert_eq!(probe.stats().refreshes, refreshes);
        assert_eq!(
            calls
                .snapshot()
                .iter()
                .filter(|c| matches!(c, Call::Configure(_)))
                .count(),
            3
        );
        assert_eq!(coordinator.config().title, "two");
        coordinator.event(NativeEvent::Destroy);
        drop(window);
        handle.join().unwrap();
    }

    #[test]
    fn test_tab_cycles_focus() {
        let (mut coordinator, window, _, _) = running(vec![]);
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = client(window, move |f| {
            let _ = tx.send(f.input.clone());
            f.submit(Frame::default().with_handlers(Handlers {
                focusable: vec![Tag(1), Tag(2)],
                ..Default::default()
            }));
        });
        start(&mut coordinator);
        coordinator.event(request(true));

        let tab = InputEvent::Key(KeyEvent::press(KeyName::Tab));
        assert!(coordinator.event(NativeEvent::Input(tab.clone())));
        assert!(coordinator.event(NativeEvent::Input(tab)));
        let back = KeyEvent::press(KeyName::Tab).with_modifiers(Modifiers::SHIFT);
        assert!(coordinator.event(NativeEvent::Input(InputEvent::Key(back))));
        coordinator.event(request(false));

        let _first = rx.recv().unwrap();
        let input = rx.recv().unwrap();
        let gained: Vec<_> = input
            .iter()
            .filter(|r| r.event == InputEvent::Focus(true))
            .map(|r| r.target)
            .collect();
        assert_eq!(gained, vec![Some(Tag(1)), Some(Tag(2)), Some(Tag(1))]);
        finish(coordinator, handle);
    }

    #[test]
    fn test_side_requests_reach_platform() {
        let (mut coordinator, window, calls, _) = running(vec![]);
        let handle = client(window, |f| {
            let mut editor = EditorState::default();
            editor.selection.range = Range::new(3, 3);
            f.submit(Frame::default().with_requests(Requests {
                text_input: TextInputState::Open,
                write_clipboard: Some("copied".into()),
                editor: Some(editor),
                cursor: Cursor::Text,
                ..Default::default()
            }));
        });
        start(&mut coordinator);
        coordinator.event(request(true));

        let log = calls.snapshot();
        assert!(log.contains(&Call::ShowTextInput(true)));
        assert!(log.contains(&Call::WriteClipboard("copied".into())));
        assert!(log.contains(&Call::SetCursor(Cursor::Text)));
        assert!(log.iter().any(|c| matches!(c, Call::EditorStateChanged(_))));
        assert_eq!(coordinator.editor_state().selection.range, Range::new(3, 3));

        // Same state again: no notification
        coordinator.event(request(false));
        let changes = calls
            .snapshot()
            .iter()
            .filter(|c| matches!(c, Call::EditorStateChanged(_)))
            .count();
        assert_eq!(changes, 1);
        finish(coordinator, handle);
    }

    #[test]
    fn test_fallback_decorations_offset_content() {
        let (mut coordinator, window, _, _) = running(vec![WindowOption::Decorated(true)]);
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = client(window, move |f| {
            let _ = tx.send(f.size);
            f.submit(Frame::default().with_handlers(Handlers {
                hit_areas: vec![HitArea {
                    tag: Tag(5),
                    bounds: Rect::new(0, 0, 10, 10),
                }],
                ..Default::default()
            }));
        });
        start(&mut coordinator);
        // The native layer draws no decorations of its own
        coordinator.event(NativeEvent::Config(Config {
            size: Size::new(200, 100),
            decorated: false,
            decoration_height: DEFAULT_DECORATION_HEIGHT,
            ..Default::default()
        }));
        coordinator.event(request(true));

        assert_eq!(rx.recv().unwrap(), Size::new(200, 72));
        assert_eq!(coordinator.config().size, Size::new(200, 72));
        assert!(coordinator.config().decorated);
        assert_eq!(
            coordinator.action_at(PointF::new(100.0, 10.0)),
            Some(Actions::MOVE)
        );
        // Client hit areas sit below the title bar
        let press = PointerEvent::new(PointerKind::Press, PointF::new(5.0, 33.0));
        assert!(coordinator.event(NativeEvent::Input(InputEvent::Pointer(press))));
        let miss = PointerEvent::new(PointerKind::Press, PointF::new(5.0, 5.0));
        assert!(!coordinator.event(NativeEvent::Input(InputEvent::Pointer(miss))));
        finish(coordinator, handle);
    }

    #[test]
    fn test_editor_insert_moves_caret() {
        let (mut coordinator, window, _, _) = running(vec![]);
        let handle = client(window, draw);
        coordinator.state.ime.selection.range = Range::new(5, 5);
        coordinator.editor_insert("hello");
        assert_eq!(coordinator.editor_state().selection.range, Range::new(10, 10));
        coordinator.set_composing_region(Range::new(5, 10));
        assert!(coordinator.editor_state().is_composing());
        finish(coordinator, handle);
    }

    #[test]
    fn test_semantic_queries() {
        let (mut coordinator, window, _, _) = running(vec![]);
        let handle = client(window, |f| {
            let root = SemanticNode {
                id: SemanticId(1),
                desc: crate::input::SemanticDesc {
                    bounds: Rect::new(0, 0, 200, 100),
                    ..Default::default()
                },
                ..Default::default()
            };
            f.submit(Frame::default().with_semantics(vec![root]));
        });
        start(&mut coordinator);
        coordinator.event(request(true));
        assert_eq!(coordinator.semantic_root(), Some(SemanticId(1)));
        assert!(coordinator.lookup_semantic(SemanticId(1)).is_some());
        assert_eq!(coordinator.semantic_at(PointF::new(1.0, 1.0)), Some(SemanticId(1)));
        coordinator.event(request(false));
        assert!(coordinator.semantic_diffs().is_empty());
        finish(coordinator, handle);
    }
}
