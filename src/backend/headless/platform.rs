//! Recording platform
//!
//! Implements every capability in memory and records the calls, so tests
//! and the demo can see what the coordinator asked of the native layer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use calloop::channel::Sender;
use log::{debug, warn};

use super::gpu::GpuProbe;
use super::Command;
use crate::config::{Config, WindowOption};
use crate::gpu::{Context, GpuError};
use crate::input::editor::EditorState;
use crate::input::InputEvent;
use crate::platform::{Actions, Cursor, InputHint, Platform, WindowKey, Waker};
use crate::unit::{Metric, Size};
use crate::window::NativeEvent;

/// A capability call made by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetAnimating(bool),
    ShowTextInput(bool),
    SetInputHint(InputHint),
    NewContext,
    ReadClipboard,
    WriteClipboard(String),
    Configure(Vec<WindowOption>),
    SetCursor(Cursor),
    Perform(Actions),
    /// Carries the new state
    EditorStateChanged(EditorState),
}

/// Shared, append-only log of capability calls
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn lock(&self) -> MutexGuard<'_, Vec<Call>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, call: Call) {
        self.lock().push(call);
    }

    pub fn snapshot(&self) -> Vec<Call> {
        self.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.lock().iter().filter(|c| pred(c)).count()
    }
}

/// What the simulated native window looks like
#[derive(Debug, Clone, Default)]
pub struct NativeState {
    pub config: Config,
    pub animating: bool,
    pub clipboard: Option<String>,
    pub text_input: bool,
    pub input_hint: InputHint,
    pub cursor: Cursor,
    pub open: bool,
}

pub(crate) type SharedState = Arc<Mutex<NativeState>>;

pub(crate) fn lock(state: &SharedState) -> MutexGuard<'_, NativeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The native side of one headless window
pub struct HeadlessPlatform {
    probe: GpuProbe,
    calls: CallLog,
    native: SharedState,
    metric: Metric,
    native_decorations: bool,
    /// Loop to post native events to; `None` when standalone
    link: Option<(WindowKey, Sender<Command>)>,
    waker: Waker,
}

impl HeadlessPlatform {
    /// A platform outside any event loop; native events it would emit are
    /// dropped and waking does nothing
    pub fn standalone(probe: GpuProbe) -> Self {
        Self {
            probe,
            calls: CallLog::default(),
            native: Arc::new(Mutex::new(NativeState {
                open: true,
                ..Default::default()
            })),
            metric: Metric::uniform(1.0),
            native_decorations: true,
            link: None,
            waker: Waker::noop(),
        }
    }

    pub(crate) fn attached(
        key: WindowKey,
        tx: Sender<Command>,
        probe: GpuProbe,
        calls: CallLog,
        native: SharedState,
        metric: Metric,
        native_decorations: bool,
    ) -> Self {
        let waker = {
            let tx = Mutex::new(tx.clone());
            Waker::new(move || {
                if let Ok(tx) = tx.lock() {
                    let _ = tx.send(Command::Native(key, NativeEvent::Wakeup));
                }
            })
        };
        Self {
            probe,
            calls,
            native,
            metric,
            native_decorations,
            link: Some((key, tx)),
            waker,
        }
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    pub fn native(&self) -> NativeState {
        lock(&self.native).clone()
    }

    fn post(&self, command: impl FnOnce(WindowKey) -> Command) {
        if let Some((key, tx)) = &self.link {
            if tx.send(command(*key)).is_err() {
                debug!("Headless loop gone, dropping native event");
            }
        }
    }
}

impl Platform for HeadlessPlatform {
    fn set_animating(&mut self, animating: bool) {
        self.calls.push(Call::SetAnimating(animating));
        lock(&self.native).animating = animating;
        self.post(|key| Command::Animate(key, animating));
    }

    fn show_text_input(&mut self, show: bool) {
        self.calls.push(Call::ShowTextInput(show));
        lock(&self.native).text_input = show;
    }

    fn set_input_hint(&mut self, hint: InputHint) {
        self.calls.push(Call::SetInputHint(hint));
        lock(&self.native).input_hint = hint;
    }

    fn new_context(&mut self) -> Result<Box<dyn Context>, GpuError> {
        self.calls.push(Call::NewContext);
        self.probe.new_context()
    }

    fn read_clipboard(&mut self) {
        self.calls.push(Call::ReadClipboard);
        let content = lock(&self.native).clipboard.clone();
        match content {
            Some(text) => self.post(|key| {
                Command::Native(key, NativeEvent::Input(InputEvent::Clipboard(text)))
            }),
            None => debug!("Clipboard empty"),
        }
    }

    fn write_clipboard(&mut self, text: String) {
        self.calls.push(Call::WriteClipboard(text.clone()));
        lock(&self.native).clipboard = Some(text);
    }

    fn configure(&mut self, options: Vec<WindowOption>) {
        self.calls.push(Call::Configure(options.clone()));
        let (config, resized) = {
            let mut native = lock(&self.native);
            let old: Size = native.config.size;
            native.config.apply(self.metric, &options);
            if !self.native_decorations {
                native.config.decorated = false;
            }
            (native.config.clone(), native.config.size != old)
        };
        self.post(|key| Command::Native(key, NativeEvent::Config(config)));
        if resized {
            self.post(|key| Command::Frame { key, sync: true });
        }
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.calls.push(Call::SetCursor(cursor));
        lock(&self.native).cursor = cursor;
    }

    fn waker(&self) -> Waker {
        self.waker.clone()
    }

    fn perform(&mut self, actions: Actions) {
        self.calls.push(Call::Perform(actions));
        if actions.contains(Actions::CLOSE) {
            self.post(Command::Close);
        }
        let ignored = actions - Actions::CLOSE;
        if !ignored.is_empty() {
            warn!("Headless windows ignore {:?}", ignored);
        }
    }

    fn editor_state_changed(&mut self, _old: &EditorState, new: &EditorState) {
        self.calls.push(Call::EditorStateChanged(new.clone()));
    }
}
