//! Input handling module
//!
//! Normalized input events, the router that delivers them to the handlers
//! the client declared in its last frame, the IME editor model and the
//! accessibility snapshot.

pub mod editor;
pub mod keyboard;
pub mod pointer;
pub mod router;
pub mod semantic;

pub use editor::{EditorState, Range, Selection, Snippet};
pub use keyboard::{KeyEvent, KeyName, KeyState, Modifiers};
pub use pointer::{Buttons, PointerEvent, PointerKind, PointerSource};
pub use router::{ActionArea, FocusDirection, Handlers, HitArea, Requests, Routed, Router};
pub use semantic::{SemanticDesc, SemanticId, SemanticNode, SemanticTree};

/// Identifies an input handler declared by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub u64);

/// A normalized input event
///
/// Backends translate native events into these; the coordinator never sees
/// native event types.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    Pointer(PointerEvent),
    /// IME replaced `range` with `text`
    Edit { range: Range, text: String },
    /// IME moved the selection
    Selection(Range),
    /// IME wants the snippet to cover at least `range`
    Snippet(Range),
    /// A handler gained or lost keyboard focus
    Focus(bool),
    /// Clipboard content, answering a read request
    Clipboard(String),
    /// Frame timings, when profiling is enabled
    Profile(String),
}
