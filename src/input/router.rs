//! Input routing
//!
//! The router remembers the handlers and side requests of the last frame
//! the client produced, delivers input to the right handler and queues it
//! until the next frame event.

use std::mem;
use std::time::Instant;

use log::debug;

use super::editor::EditorState;
use super::keyboard::KeyName;
use super::pointer::{PointerEvent, PointerKind};
use super::{InputEvent, Tag};
use crate::platform::{Actions, Cursor, InputHint, TextInputState};
use crate::unit::{PointF, Rect};

/// Region that receives pointer events for a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitArea {
    pub tag: Tag,
    pub bounds: Rect,
}

/// Region that maps to window actions, e.g. a client-drawn title bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionArea {
    pub actions: Actions,
    pub bounds: Rect,
}

/// Input handlers declared by a frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Handlers {
    /// Keyboard focus order
    pub focusable: Vec<Tag>,
    /// Move focus to this handler
    pub request_focus: Option<Tag>,
    /// Receives key events nobody else handled
    pub topmost: Option<Tag>,
    /// Focusable handlers that consume Tab themselves instead of moving
    /// focus
    pub wants_tab: Vec<Tag>,
    /// Pointer regions in paint order, last on top
    pub hit_areas: Vec<HitArea>,
    /// System action regions in paint order, last on top
    pub action_areas: Vec<ActionArea>,
}

/// Side requests made while producing a frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Requests {
    pub text_input: TextInputState,
    pub input_hint: Option<InputHint>,
    pub write_clipboard: Option<String>,
    /// Handler that wants the clipboard content
    pub read_clipboard: Option<Tag>,
    /// State of the focused editor, if any
    pub editor: Option<EditorState>,
    pub cursor: Cursor,
    /// Produce another frame no later than this
    pub invalidate_at: Option<Instant>,
    /// Report frame timings
    pub profiling: bool,
}

/// Focus movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDirection {
    Forward,
    Backward,
}

/// An event and the handler it is for; `None` targets the window itself
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    pub target: Option<Tag>,
    pub event: InputEvent,
}

/// Delivers input to the handlers of the last frame
#[derive(Debug, Default)]
pub struct Router {
    handlers: Handlers,
    requests: Requests,
    focus: Option<Tag>,
    /// Handler that received the last press, until release
    pointer_grab: Option<Tag>,
    /// Handler waiting for clipboard content
    clipboard_reader: Option<Tag>,
    read_requested: bool,
    queue: Vec<Routed>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handlers and requests of a new frame
    pub fn frame(&mut self, handlers: Handlers, requests: Requests) {
        if let Some(reader) = requests.read_clipboard {
            self.clipboard_reader = Some(reader);
            self.read_requested = true;
        }
        self.requests = requests;
        self.handlers = handlers;

        if let Some(tag) = self.handlers.request_focus.take() {
            self.set_focus(Some(tag));
        } else if let Some(focus) = self.focus {
            if !self.handlers.focusable.contains(&focus) {
                debug!("Focused handler {:?} disappeared", focus);
                self.focus = None;
            }
        }
        if let Some(grab) = self.pointer_grab {
            if !self.handlers.hit_areas.iter().any(|a| a.tag == grab) {
                self.pointer_grab = None;
            }
        }
    }

    /// Route an event; returns whether a handler took it
    pub fn queue(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::Key(ref key)
                if key.name == KeyName::Tab
                    && !self
                        .focus
                        .is_some_and(|f| self.handlers.wants_tab.contains(&f)) =>
            {
                false
            }
            InputEvent::Key(_)
            | InputEvent::Edit { .. }
            | InputEvent::Selection(_)
            | InputEvent::Snippet(_) => match self.focus {
                Some(focus) => {
                    self.push(Some(focus), event);
                    true
                }
                None => false,
            },
            InputEvent::Pointer(e) => self.route_pointer(e),
            InputEvent::Clipboard(_) => match self.clipboard_reader.take() {
                Some(reader) => {
                    self.push(Some(reader), event);
                    true
                }
                None => {
                    debug!("Dropping unrequested clipboard content");
                    false
                }
            },
            InputEvent::Focus(_) | InputEvent::Profile(_) => {
                self.push(None, event);
                true
            }
        }
    }

    /// Offer an unhandled event to the topmost handler
    pub fn queue_topmost(&mut self, event: InputEvent) -> bool {
        match self.handlers.topmost {
            Some(tag) => {
                self.push(Some(tag), event);
                true
            }
            None => false,
        }
    }

    fn route_pointer(&mut self, e: PointerEvent) -> bool {
        let target = match e.kind {
            PointerKind::Press => {
                let hit = self.hit(e.position);
                self.pointer_grab = hit;
                hit
            }
            PointerKind::Drag | PointerKind::Release | PointerKind::Cancel => {
                let target = self.pointer_grab.or_else(|| self.hit(e.position));
                if e.kind != PointerKind::Drag {
                    self.pointer_grab = None;
                }
                target
            }
            _ => self.hit(e.position),
        };
        let Some(tag) = target else {
            return false;
        };
        self.push(Some(tag), InputEvent::Pointer(e));
        if e.kind == PointerKind::Press && self.handlers.focusable.contains(&tag) {
            self.set_focus(Some(tag));
        }
        true
    }

    fn hit(&self, pos: PointF) -> Option<Tag> {
        self.handlers
            .hit_areas
            .iter()
            .rev()
            .find(|a| a.bounds.contains(pos))
            .map(|a| a.tag)
    }

    fn push(&mut self, target: Option<Tag>, event: InputEvent) {
        self.queue.push(Routed { target, event });
    }

    fn set_focus(&mut self, focus: Option<Tag>) {
        if focus == self.focus {
            return;
        }
        if let Some(old) = self.focus {
            self.push(Some(old), InputEvent::Focus(false));
        }
        self.focus = focus;
        if let Some(new) = focus {
            self.push(Some(new), InputEvent::Focus(true));
        }
        debug!("Focus moved to {:?}", focus);
    }

    /// Move keyboard focus through the focus order, wrapping around
    pub fn move_focus(&mut self, dir: FocusDirection) -> bool {
        let order = &self.handlers.focusable;
        if order.is_empty() {
            return false;
        }
        let len = order.len();
        let current = self.focus.and_then(|f| order.iter().position(|&t| t == f));
        let next = match (current, dir) {
            (None, FocusDirection::Forward) => 0,
            (None, FocusDirection::Backward) => len - 1,
            (Some(i), FocusDirection::Forward) => (i + 1) % len,
            (Some(i), FocusDirection::Backward) => (i + len - 1) % len,
        };
        let tag = order[next];
        self.set_focus(Some(tag));
        true
    }

    /// Simulate a click in the middle of the focused handler
    pub fn click_focus(&mut self) -> bool {
        let Some(focus) = self.focus else {
            return false;
        };
        let Some(area) = self.handlers.hit_areas.iter().find(|a| a.tag == focus) else {
            return false;
        };
        let center = area.bounds.center();
        for kind in [PointerKind::Press, PointerKind::Release] {
            self.push(
                Some(focus),
                InputEvent::Pointer(PointerEvent::new(kind, center)),
            );
        }
        true
    }

    /// Window actions under `pos`
    pub fn action_at(&self, pos: PointF) -> Option<Actions> {
        self.handlers
            .action_areas
            .iter()
            .rev()
            .find(|a| a.bounds.contains(pos))
            .map(|a| a.actions)
    }

    pub fn focus(&self) -> Option<Tag> {
        self.focus
    }

    /// Take the events queued since the last frame
    pub fn drain(&mut self) -> Vec<Routed> {
        mem::take(&mut self.queue)
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn take_text_input(&mut self) -> TextInputState {
        mem::take(&mut self.requests.text_input)
    }

    pub fn take_input_hint(&mut self) -> Option<InputHint> {
        self.requests.input_hint.take()
    }

    pub fn take_write_clipboard(&mut self) -> Option<String> {
        self.requests.write_clipboard.take()
    }

    /// Whether the last frame asked for the clipboard
    pub fn take_read_clipboard(&mut self) -> bool {
        mem::take(&mut self.read_requested)
    }

    /// Focused editor state reported by the last frame
    pub fn editor_state(&self) -> Option<&EditorState> {
        self.requests.editor.as_ref()
    }

    pub fn cursor(&self) -> Cursor {
        self.requests.cursor
    }

    pub fn take_wakeup_time(&mut self) -> Option<Instant> {
        self.requests.invalidate_at.take()
    }

    pub fn profiling(&self) -> bool {
        self.requests.profiling
    }
}
