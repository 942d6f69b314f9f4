//! Deferred client requests
//!
//! Requests the client makes outside frame production wait here until the
//! coordinator's next cycle. Storage is bounded: every request kind has
//! one slot and a newer request replaces or merges with the older one.

use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::config::{self, WindowOption};
use crate::platform::{Actions, InputHint, TextInputState};

/// Requests waiting for the coordinator
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Pending {
    /// At most one option per kind
    pub options: Vec<WindowOption>,
    pub actions: Actions,
    pub write_clipboard: Option<String>,
    pub read_clipboard: bool,
    pub text_input: TextInputState,
    pub input_hint: Option<InputHint>,
}

impl Pending {
    pub fn is_empty(&self) -> bool {
        *self == Pending::default()
    }
}

#[derive(Debug)]
pub(crate) struct Deferred {
    pending: Mutex<Pending>,
    ready_tx: Sender<()>,
    ready_rx: Receiver<()>,
}

impl Deferred {
    pub fn new() -> Self {
        let (ready_tx, ready_rx) = bounded(1);
        Self {
            pending: Mutex::new(Pending::default()),
            ready_tx,
            ready_rx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut Pending)) {
        f(&mut self.lock());
        // Full means the coordinator has not looked yet
        let _ = self.ready_tx.try_send(());
    }

    pub fn options(&self, options: impl IntoIterator<Item = WindowOption>) {
        self.update(|p| config::coalesce(&mut p.options, options));
    }

    pub fn actions(&self, actions: Actions) {
        self.update(|p| p.actions |= actions);
    }

    pub fn write_clipboard(&self, text: String) {
        self.update(|p| p.write_clipboard = Some(text));
    }

    pub fn read_clipboard(&self) {
        self.update(|p| p.read_clipboard = true);
    }

    pub fn text_input(&self, show: bool) {
        self.update(|p| {
            p.text_input = if show {
                TextInputState::Open
            } else {
                TextInputState::Close
            }
        });
    }

    pub fn input_hint(&self, hint: InputHint) {
        self.update(|p| p.input_hint = Some(hint));
    }

    /// Signalled whenever a request was added
    pub fn ready(&self) -> &Receiver<()> {
        &self.ready_rx
    }

    /// Take everything pending
    pub fn take(&self) -> Pending {
        let _ = self.ready_rx.try_recv();
        mem::take(&mut *self.lock())
    }
}
