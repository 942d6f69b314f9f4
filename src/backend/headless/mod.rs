//! Headless backend
//!
//! Drives coordinators from a calloop loop on its own thread, with an
//! in-memory platform and a software GPU context. Frames are paced by a
//! repeating timer while a window animates. Used by the tests and the
//! demo binary, and as a reference for native backends: everything a
//! native backend does happens here too, just without a display.

mod gpu;
mod platform;

use std::rc::Rc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use calloop::channel::{self, Channel, Sender};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, LoopHandle, LoopSignal, RegistrationToken};
use crossbeam_channel::bounded;
use log::{debug, error, info, warn};

pub use gpu::{FaultPoint, GpuProbe, GpuStats};
pub use platform::{Call, CallLog, HeadlessPlatform, NativeState};

use platform::{lock, SharedState};
use crate::config::Config;
use crate::error::Error;
use crate::input::InputEvent;
use crate::platform::{AppContext, KeyRepeat, WindowKey, WindowPolicy, WindowRegistry};
use crate::unit::{Insets, Metric, Size};
use crate::window::{Coordinator, FrameRequest, Lifecycle, NativeEvent, PendingWindow, Stage};

/// Headless backend configuration
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Frame interval while a window animates
    pub frame_interval: Duration,
    pub policy: WindowPolicy,
    /// Pixels per dp and sp
    pub scale: f32,
    pub app_id: String,
    /// Whether the simulated windows draw their own decorations
    pub native_decorations: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            policy: WindowPolicy::Single,
            scale: 1.0,
            app_id: "casement".to_string(),
            native_decorations: true,
        }
    }
}

/// Messages to the backend thread
pub(crate) enum Command {
    Open {
        pending: PendingWindow,
        native: SharedState,
        probe: GpuProbe,
        calls: CallLog,
        reply: crossbeam_channel::Sender<Result<WindowKey, Error>>,
    },
    Native(WindowKey, NativeEvent),
    Frame { key: WindowKey, sync: bool },
    Animate(WindowKey, bool),
    Resize(WindowKey, Size),
    Close(WindowKey),
    Shutdown,
}

struct HeadlessWindow {
    coordinator: Coordinator,
    native: SharedState,
    /// Frame pacing timer, while animating
    ticker: Option<RegistrationToken>,
}

struct LoopState {
    handle: LoopHandle<'static, LoopState>,
    signal: LoopSignal,
    tx: Sender<Command>,
    config: HeadlessConfig,
    app: Rc<AppContext>,
    windows: WindowRegistry<HeadlessWindow>,
}

impl LoopState {
    fn metric(&self) -> Metric {
        Metric::uniform(self.config.scale)
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Open {
                pending,
                native,
                probe,
                calls,
                reply,
            } => self.open(pending, native, probe, calls, reply),
            Command::Native(key, e) => self.dispatch(key, e),
            Command::Frame { key, sync } => {
                self.frame(key, sync);
            }
            Command::Animate(key, animating) => self.animate(key, animating),
            Command::Resize(key, size) => {
                let Some(window) = self.windows.get_mut(key) else {
                    debug!("Resize for unknown window {:?}", key);
                    return;
                };
                let config = {
                    let mut native = lock(&window.native);
                    native.config.size = size;
                    native.config.clone()
                };
                self.dispatch(key, NativeEvent::Config(config));
                self.frame(key, true);
            }
            Command::Close(key) => self.dispatch(key, NativeEvent::Destroy),
            Command::Shutdown => {
                info!(
                    "Shutting down {} with {} open window(s)",
                    self.app.app_id(),
                    self.windows.len()
                );
                self.signal.stop();
            }
        }
    }

    fn open(
        &mut self,
        pending: PendingWindow,
        native: SharedState,
        probe: GpuProbe,
        calls: CallLog,
        reply: crossbeam_channel::Sender<Result<WindowKey, Error>>,
    ) {
        if let Err(e) = self.windows.check_policy() {
            let _ = reply.send(Err(e.clone()));
            // The client learns about it from its event stream
            let report = thread::Builder::new()
                .name("casement-open-failure".into())
                .spawn(move || pending.fail(e));
            if let Err(e) = report {
                error!("Failed to report window creation failure: {}", e);
            }
            return;
        }

        lock(&native).open = true;
        let window = HeadlessWindow {
            coordinator: Coordinator::new(pending),
            native: native.clone(),
            ticker: None,
        };
        let key = match self.windows.insert(window) {
            Ok(key) => key,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };
        let platform = HeadlessPlatform::attached(
            key,
            self.tx.clone(),
            probe,
            calls,
            native,
            self.metric(),
            self.config.native_decorations,
        );
        if let Some(window) = self.windows.get_mut(key) {
            window.coordinator.set_driver(Some(Box::new(platform)));
        }
        info!("Opened window {:?} for {}", key, self.app.app_id());
        let _ = reply.send(Ok(key));

        for command in [
            Command::Native(key, NativeEvent::Stage(Stage::Running)),
            Command::Frame { key, sync: true },
        ] {
            let _ = self.tx.send(command);
        }
    }

    fn dispatch(&mut self, key: WindowKey, e: NativeEvent) {
        match self.windows.get_mut(key) {
            Some(window) => {
                window.coordinator.event(e);
                self.reap(key);
            }
            None => debug!("Event for unknown window {:?}", key),
        }
    }

    /// Deliver a frame request; returns whether the window is still open
    fn frame(&mut self, key: WindowKey, sync: bool) -> bool {
        let metric = self.metric();
        let Some(window) = self.windows.get_mut(key) else {
            return false;
        };
        let size = lock(&window.native).config.size;
        window.coordinator.event(NativeEvent::Frame(FrameRequest {
            now: Instant::now(),
            size,
            insets: Insets::default(),
            metric,
            sync,
        }));
        self.reap(key)
    }

    fn animate(&mut self, key: WindowKey, animating: bool) {
        let interval = self.config.frame_interval;
        let Some(window) = self.windows.get_mut(key) else {
            return;
        };
        match (animating, window.ticker) {
            (true, None) => {
                let timer = Timer::from_duration(interval);
                let tick = move |_: Instant, _: &mut (), state: &mut LoopState| {
                    if state.frame(key, false) {
                        TimeoutAction::ToDuration(interval)
                    } else {
                        TimeoutAction::Drop
                    }
                };
                let inserted = self.handle.insert_source(timer, tick);
                match inserted {
                    Ok(token) => window.ticker = Some(token),
                    Err(e) => error!("Failed to start frame timer: {}", e.error),
                }
            }
            (false, Some(token)) => {
                self.handle.remove(token);
                window.ticker = None;
            }
            _ => {}
        }
    }

    /// Drop a destroyed window; returns whether it is still open
    fn reap(&mut self, key: WindowKey) -> bool {
        let destroyed = match self.windows.get(key) {
            Some(window) => window.coordinator.lifecycle() == Lifecycle::Destroyed,
            None => return false,
        };
        if !destroyed {
            return true;
        }
        if let Some(window) = self.windows.remove(key) {
            if let Some(token) = window.ticker {
                self.handle.remove(token);
            }
            let mut native = lock(&window.native);
            native.open = false;
            native.animating = false;
        }
        info!("Closed window {:?}", key);
        false
    }
}

type HeadlessLoop = EventLoop<'static, LoopState>;

fn build(
    rx: Channel<Command>,
    tx: Sender<Command>,
    config: HeadlessConfig,
) -> Result<(HeadlessLoop, LoopState), Error> {
    let event_loop: HeadlessLoop = EventLoop::try_new()?;
    let handle = event_loop.handle();
    handle
        .insert_source(rx, |event, _, state: &mut LoopState| match event {
            channel::Event::Msg(command) => state.handle_command(command),
            channel::Event::Closed => state.signal.stop(),
        })
        .map_err(|e| Error::EventLoop(e.error.to_string()))?;

    let app_id = config.app_id.clone();
    let app = AppContext::get_or_init(|| AppContext::new(app_id, KeyRepeat::default()));
    let state = LoopState {
        handle,
        signal: event_loop.get_signal(),
        tx,
        windows: WindowRegistry::new(config.policy),
        config,
        app,
    };
    Ok((event_loop, state))
}

/// Handle to the backend thread; shuts it down on drop
///
/// Windows still open at shutdown are dropped without a destroy event;
/// their clients see the event stream end. Dropping the backend while a
/// coordinator waits on a client that never reads blocks until it does.
pub struct Headless {
    tx: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl Headless {
    /// Start the backend thread
    pub fn spawn(config: HeadlessConfig) -> Result<Self, Error> {
        let (ready_tx, ready_rx) = bounded(1);
        let thread = thread::Builder::new()
            .name("casement-headless".into())
            .spawn(move || {
                let (tx, rx) = channel::channel();
                match build(rx, tx.clone(), config) {
                    Ok((mut event_loop, mut state)) => {
                        let _ = ready_tx.send(Ok(tx));
                        debug!("Headless loop running");
                        if let Err(e) = event_loop.run(None, &mut state, |_| {}) {
                            error!("Headless loop failed: {}", e);
                        }
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(tx)) => Ok(Self {
                tx,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(Error::EventLoop("headless thread died".into())),
        }
    }

    /// Realize a window
    ///
    /// On failure the client additionally receives a destroy event
    /// carrying the error.
    pub fn open(&self, pending: PendingWindow) -> Result<NativeWindow, Error> {
        let native: SharedState = Default::default();
        let probe = GpuProbe::new();
        let calls = CallLog::default();
        let (reply, replied) = bounded(1);
        self.send(Command::Open {
            pending,
            native: native.clone(),
            probe: probe.clone(),
            calls: calls.clone(),
            reply,
        })?;
        let key = replied
            .recv()
            .map_err(|_| Error::EventLoop("headless thread died".into()))??;
        Ok(NativeWindow {
            key,
            tx: self.tx.clone(),
            native,
            probe,
            calls,
        })
    }

    fn send(&self, command: Command) -> Result<(), Error> {
        self.tx
            .send(command)
            .map_err(|_| Error::EventLoop("headless thread stopped".into()))
    }
}

impl Drop for Headless {
    fn drop(&mut self) {
        if self.send(Command::Shutdown).is_err() {
            debug!("Headless loop already stopped");
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Headless thread panicked");
            }
        }
    }
}

/// The simulated native side of an open window
///
/// Plays the user and the window system: requests frames, changes the
/// stage, injects input and resizes.
#[derive(Clone)]
pub struct NativeWindow {
    key: WindowKey,
    tx: Sender<Command>,
    native: SharedState,
    probe: GpuProbe,
    calls: CallLog,
}

impl NativeWindow {
    pub fn key(&self) -> WindowKey {
        self.key
    }

    fn post(&self, command: Command) {
        if self.tx.send(command).is_err() {
            warn!("Headless loop stopped, dropping command for {:?}", self.key);
        }
    }

    /// Ask for a frame, as a display refresh would
    pub fn request_frame(&self) {
        self.post(Command::Frame {
            key: self.key,
            sync: false,
        });
    }

    pub fn set_stage(&self, stage: Stage) {
        self.post(Command::Native(self.key, NativeEvent::Stage(stage)));
    }

    pub fn send_input(&self, e: InputEvent) {
        self.post(Command::Native(self.key, NativeEvent::Input(e)));
    }

    /// Resize from the outside, as a user dragging the border would
    pub fn resize(&self, size: Size) {
        self.post(Command::Resize(self.key, size));
    }

    /// Close from the outside, as the window manager would
    pub fn destroy(&self) {
        self.post(Command::Close(self.key));
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    pub fn is_animating(&self) -> bool {
        lock(&self.native).animating
    }

    pub fn clipboard(&self) -> Option<String> {
        lock(&self.native).clipboard.clone()
    }

    /// Set the clipboard content as another application would
    pub fn set_clipboard(&self, text: impl Into<String>) {
        lock(&self.native).clipboard = Some(text.into());
    }

    /// Native configuration, before fallback decorations are accounted
    pub fn config(&self) -> Config {
        lock(&self.native).config.clone()
    }

    pub fn is_open(&self) -> bool {
        lock(&self.native).open
    }

    pub fn gpu(&self) -> GpuStats {
        self.probe.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowOption;
    use crate::gpu::Ops;
    use crate::input::{Requests, Routed, Tag};
    use crate::platform::Actions;
    use crate::unit::Dp;
    use crate::window::{Event, Frame, Window};

    fn backend() -> Headless {
        Headless::spawn(HeadlessConfig {
            frame_interval: Duration::from_millis(2),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_open_render_close() {
        let headless = backend();
        let (window, pending) = Window::new([WindowOption::Size(Dp(320.0), Dp(200.0))]).unwrap();
        let native = headless.open(pending).unwrap();

        let client = thread::spawn(move || {
            let mut seen = Vec::new();
            while let Some(e) = window.next_event() {
                match e {
                    Event::Stage(stage) => seen.push(format!("stage {:?}", stage)),
                    Event::Config(config) => seen.push(format!("config {:?}", config.size)),
                    Event::Frame(f) => {
                        seen.push(format!("frame {:?}", f.size));
                        f.submit(Frame::new(Ops::from_bytes(vec![1, 2])));
                        window.perform(Actions::CLOSE);
                    }
                    Event::Destroy { err } => seen.push(format!("destroy {:?}", err)),
                }
            }
            seen
        });
        let seen = client.join().unwrap();
        drop(headless);

        assert!(seen.contains(&"stage Running".to_string()));
        assert!(seen.contains(&format!("frame {:?}", Size::new(320, 200))));
        assert_eq!(seen.last(), Some(&"destroy None".to_string()));
        assert!(!native.is_open());
        let stats = native.gpu();
        assert!(stats.frames >= 1);
        assert_eq!(stats.last_ops, vec![1, 2]);
        assert!(native.calls().count(|c| *c == Call::Perform(Actions::CLOSE)) >= 1);
    }

    #[test]
    fn test_single_window_policy() {
        let headless = backend();
        let (first, pending) = Window::new([]).unwrap();
        let native = headless.open(pending).unwrap();
        // Keeps the loop free; declines every frame
        let drain = thread::spawn(move || while first.next_event().is_some() {});

        let (second, pending) = Window::new([]).unwrap();
        assert_eq!(headless.open(pending).err(), Some(Error::MultipleWindows));
        match second.next_event() {
            Some(Event::Destroy { err }) => assert_eq!(err, Some(Error::MultipleWindows)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(second.next_event().is_none());

        assert!(native.is_open());
        drop(headless);
        drain.join().unwrap();
    }

    #[test]
    fn test_clipboard_read_arrives_as_input() {
        let headless = backend();
        let (window, pending) = Window::new([]).unwrap();
        let native = headless.open(pending).unwrap();
        native.set_clipboard("pasted");

        let client = thread::spawn(move || {
            let mut received = None;
            let mut first = true;
            while let Some(e) = window.next_event() {
                let Event::Frame(f) = e else { continue };
                if let Some(routed) = f
                    .input
                    .iter()
                    .find(|r| matches!(r.event, InputEvent::Clipboard(_)))
                {
                    received = Some(routed.clone());
                    window.perform(Actions::CLOSE);
                }
                let requests = Requests {
                    read_clipboard: first.then_some(Tag(7)),
                    ..Default::default()
                };
                first = false;
                f.submit(Frame::new(Ops::new()).with_requests(requests));
            }
            received
        });
        let received = client.join().unwrap();
        assert_eq!(
            received,
            Some(Routed {
                target: Some(Tag(7)),
                event: InputEvent::Clipboard("pasted".into()),
            })
        );
        assert!(native.calls().snapshot().contains(&Call::ReadClipboard));
    }

    #[test]
    fn test_invalidate_keeps_frames_coming() {
        let headless = backend();
        let (window, pending) = Window::new([]).unwrap();
        let native = headless.open(pending).unwrap();

        let client = thread::spawn(move || {
            let mut frames = 0;
            while let Some(e) = window.next_event() {
                let Event::Frame(f) = e else { continue };
                frames += 1;
                if frames < 4 {
                    window.invalidate();
                } else if frames == 4 {
                    window.perform(Actions::CLOSE);
                }
                f.submit(Frame::new(Ops::new()));
            }
            frames
        });
        assert!(client.join().unwrap() >= 4);
        assert!(native.gpu().frames >= 4);
        assert!(native
            .calls()
            .snapshot()
            .contains(&Call::SetAnimating(true)));
    }

    #[test]
    fn test_resize_reaches_client() {
        let headless = backend();
        let (window, pending) = Window::new([]).unwrap();
        let native = headless.open(pending).unwrap();
        let resizer = native.clone();

        let client = thread::spawn(move || {
            let mut sizes = Vec::new();
            while let Some(e) = window.next_event() {
                let Event::Frame(f) = e else { continue };
                sizes.push(f.size);
                if sizes.len() == 1 {
                    resizer.resize(Size::new(640, 480));
                } else {
                    window.perform(Actions::CLOSE);
                }
                f.submit(Frame::new(Ops::new()));
            }
            sizes
        });
        let sizes = client.join().unwrap();
        assert_eq!(sizes.first(), Some(&Size::new(800, 600)));
        assert!(sizes.contains(&Size::new(640, 480)));
        assert_eq!(native.config().size, Size::new(640, 480));
    }
}
