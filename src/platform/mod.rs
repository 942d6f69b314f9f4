//! Platform capability interface
//!
//! The contract every native backend (X11, Wayland, Win32, Cocoa, Android,
//! the headless backend) implements. The coordinator holds one
//! [`Platform`] per window and never looks behind it.

pub mod app;
pub mod registry;

use std::fmt;
use std::sync::Arc;

pub use app::{AppContext, KeyRepeat};
pub use registry::{WindowKey, WindowPolicy, WindowRegistry};

use crate::config::WindowOption;
use crate::gpu::{Context, GpuError};
use crate::input::editor::EditorState;

/// Capabilities a native window exposes to its coordinator
///
/// Everything except the [`Waker`] is only invoked from inside the
/// coordinator's serialized event processing.
pub trait Platform {
    /// Deliver frames as fast as the display allows while `true`
    fn set_animating(&mut self, animating: bool);
    /// Show or hide the on-screen keyboard
    fn show_text_input(&mut self, show: bool);
    fn set_input_hint(&mut self, hint: InputHint);
    /// Create a rendering context for the window surface
    fn new_context(&mut self) -> Result<Box<dyn Context>, GpuError>;
    /// Request the clipboard content; it arrives later as an input event
    fn read_clipboard(&mut self);
    fn write_clipboard(&mut self, text: String);
    /// Apply options; the outcome comes back as a config event
    fn configure(&mut self, options: Vec<WindowOption>);
    fn set_cursor(&mut self, cursor: Cursor);
    /// Handle that wakes this window's native event loop
    fn waker(&self) -> Waker;
    /// Perform window actions the coordinator cannot express as options
    fn perform(&mut self, actions: Actions);
    /// The IME-visible editor state changed
    fn editor_state_changed(&mut self, old: &EditorState, new: &EditorState);
}

/// Wakes a native event loop; callable from any thread
///
/// Waking only guarantees the window will be serviced again soon.
#[derive(Clone)]
pub struct Waker(Arc<dyn Fn() + Send + Sync>);

impl Waker {
    pub fn new(wake: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(wake))
    }

    /// A waker for backends that poll on their own
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn wake(&self) {
        (self.0)()
    }
}

impl fmt::Debug for Waker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Waker")
    }
}

/// Mouse cursor shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cursor {
    #[default]
    Default,
    /// Hidden
    None,
    Text,
    VerticalText,
    Pointer,
    Crosshair,
    AllScroll,
    ColResize,
    RowResize,
    Grab,
    Grabbing,
    NotAllowed,
    Wait,
    Progress,
    NorthWestResize,
    NorthEastResize,
    SouthWestResize,
    SouthEastResize,
    NorthSouthResize,
    EastWestResize,
}

/// Kind of text the on-screen keyboard should offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputHint {
    #[default]
    Any,
    Text,
    Numeric,
    Email,
    Url,
    Telephone,
    Password,
}

/// Requested on-screen keyboard visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextInputState {
    /// Leave as is
    #[default]
    Keep,
    Open,
    Close,
}

bitflags::bitflags! {
    /// Window actions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Actions: u32 {
        const MINIMIZE = 1 << 0;
        const MAXIMIZE = 1 << 1;
        const UNMAXIMIZE = 1 << 2;
        const FULLSCREEN = 1 << 3;
        const RAISE = 1 << 4;
        const CENTER = 1 << 5;
        const CLOSE = 1 << 6;
        /// Interactive move, e.g. dragging a client-drawn title bar
        const MOVE = 1 << 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_waker_from_other_thread() {
        let count = Arc::new(AtomicUsize::new(0));
        let waker = {
            let count = count.clone();
            Waker::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        let remote = waker.clone();
        std::thread::spawn(move || remote.wake()).join().unwrap();
        waker.wake();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_actions_combine() {
        let actions = Actions::MINIMIZE | Actions::CLOSE;
        assert!(actions.contains(Actions::CLOSE));
        assert!(!actions.contains(Actions::MOVE));
        assert_eq!(actions - Actions::MINIMIZE, Actions::CLOSE);
    }
}
