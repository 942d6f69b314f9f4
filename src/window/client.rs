//! Client handle
//!
//! A [`Window`] is the client's end of a window: a blocking event stream
//! plus requests that are deferred to the coordinator. The matching
//! [`PendingWindow`] goes to the backend, which realizes it into a
//! [`Coordinator`] on its own thread.
//!
//! [`Coordinator`]: super::Coordinator

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use calloop::ping::Ping;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error};

use super::deferred::Deferred;
use super::event::{Event, FrameLink, Submission};
use super::scheduler::Scheduler;
use crate::config::{self, WindowMode, WindowOption};
use crate::error::Error;
use crate::platform::{Actions, InputHint};

/// Coordinator to client traffic
#[derive(Debug, Clone)]
pub(crate) enum Outbound {
    Event(Event),
    /// Accepted only while the client waits in `next_event`, which proves
    /// it is done with the previous event
    Sync,
}

/// The client side of a window
#[derive(Debug)]
pub struct Window {
    events: Receiver<Outbound>,
    immediate: Sender<()>,
    redraws: Sender<()>,
    deferred: Arc<Deferred>,
    wakeup: Ping,
}

/// Everything a backend needs to realize a window
pub struct PendingWindow {
    pub(crate) out: Sender<Outbound>,
    pub(crate) frames: Receiver<Submission>,
    pub(crate) link: FrameLink,
    pub(crate) destroy: Sender<()>,
    pub(crate) immediate: Receiver<()>,
    pub(crate) redraws: Receiver<()>,
    pub(crate) deferred: Arc<Deferred>,
    pub(crate) scheduler: Scheduler,
}

impl Window {
    /// Create a window; `options` apply on top of the defaults
    ///
    /// The window stays unrealized until a backend takes the returned
    /// [`PendingWindow`].
    pub fn new(
        options: impl IntoIterator<Item = WindowOption>,
    ) -> Result<(Window, PendingWindow), Error> {
        let (out, events) = bounded(0);
        let (frames_tx, frames) = bounded(0);
        let (destroy, destroy_rx) = bounded(0);
        let (immediate_tx, immediate) = bounded(0);
        let (redraws_tx, redraws) = bounded(1);
        let scheduler = Scheduler::spawn(redraws_tx.clone())?;

        let deferred = Arc::new(Deferred::new());
        let mut initial = config::default_options();
        config::coalesce(&mut initial, options);
        deferred.options(initial);

        let window = Window {
            events,
            immediate: immediate_tx,
            redraws: redraws_tx,
            deferred: deferred.clone(),
            wakeup: scheduler.ping(),
        };
        let pending = PendingWindow {
            out,
            frames,
            link: FrameLink {
                frames: frames_tx,
                destroy: destroy_rx,
                current: Arc::new(AtomicU64::new(0)),
            },
            destroy,
            immediate,
            redraws,
            deferred,
            scheduler,
        };
        Ok((window, pending))
    }

    /// Wait for the next event
    ///
    /// Asking for the next event acknowledges the previous one and declines
    /// a frame event that was not submitted. Returns `None` once the window
    /// is destroyed and its final event was delivered.
    pub fn next_event(&self) -> Option<Event> {
        loop {
            match self.events.recv() {
                Ok(Outbound::Event(e)) => return Some(e),
                Ok(Outbound::Sync) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Request a frame as soon as possible
    ///
    /// Safe to call from any thread. During frame production the request
    /// is picked up by the frame in flight; otherwise at most one redraw
    /// is queued.
    pub fn invalidate(&self) {
        if self.immediate.try_send(()).is_ok() {
            return;
        }
        if self.redraws.try_send(()).is_ok() {
            self.wakeup.ping();
        }
    }

    /// Apply options; the outcome arrives as [`Event::Config`]
    pub fn option(&self, options: impl IntoIterator<Item = WindowOption>) {
        self.deferred.options(options);
        self.wakeup.ping();
    }

    /// Perform window actions
    ///
    /// Mode changes become options; the rest go to the native layer.
    pub fn perform(&self, mut actions: Actions) {
        let mut options = Vec::new();
        for (action, mode) in [
            (Actions::MINIMIZE, WindowMode::Minimized),
            (Actions::MAXIMIZE, WindowMode::Maximized),
            (Actions::UNMAXIMIZE, WindowMode::Windowed),
        ] {
            if actions.contains(action) {
                options.push(WindowOption::Mode(mode));
                actions.remove(action);
            }
        }
        if !options.is_empty() {
            self.option(options);
        }
        if actions.is_empty() {
            return;
        }
        self.deferred.actions(actions);
        self.wakeup.ping();
    }

    pub fn write_clipboard(&self, text: impl Into<String>) {
        self.deferred.write_clipboard(text.into());
        self.wakeup.ping();
    }

    /// The content arrives as a clipboard input event on the next frame
    pub fn read_clipboard(&self) {
        self.deferred.read_clipboard();
        self.wakeup.ping();
    }

    /// Show or hide the on-screen keyboard
    pub fn show_text_input(&self, show: bool) {
        self.deferred.text_input(show);
        self.wakeup.ping();
    }

    pub fn set_input_hint(&self, hint: InputHint) {
        self.deferred.input_hint(hint);
        self.wakeup.ping();
    }
}

impl PendingWindow {
    /// Report that the native window could not be created
    ///
    /// The client receives a single destroy event carrying `err`.
    pub fn fail(self, err: Error) {
        error!("Window creation failed: {}", err);
        if self
            .out
            .send(Outbound::Event(Event::Destroy { err: Some(err) }))
            .is_err()
        {
            debug!("Client went away before the failure was reported");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fail_reports_single_destroy() {
        let (window, pending) = Window::new([]).unwrap();
        let backend = thread::spawn(move || pending.fail(Error::Creation("no display".into())));
        match window.next_event() {
            Some(Event::Destroy { err }) => {
                assert_eq!(err, Some(Error::Creation("no display".into())))
            }
            other => panic!("unexpected {:?}", other),
        }
        backend.join().unwrap();
        assert!(window.next_event().is_none());
    }

    #[test]
    fn test_initial_options_are_deferred() {
        let (_window, pending) = Window::new([WindowOption::Title("hello".into())]).unwrap();
        let options = pending.deferred.take().options;
        assert!(options.contains(&WindowOption::Title("hello".into())));
        assert!(options.contains(&WindowOption::Decorated(true)));
        assert_eq!(
            options
                .iter()
                .filter(|o| matches!(o, WindowOption::Title(_)))
                .count(),
            1
        );
    }

    #[test]
    fn test_perform_turns_modes_into_options() {
        let (window, pending) = Window::new([]).unwrap();
        pending.deferred.take();
        window.perform(Actions::MAXIMIZE | Actions::RAISE);
        let taken = pending.deferred.take();
        assert_eq!(taken.options, vec![WindowOption::Mode(WindowMode::Maximized)]);
        assert_eq!(taken.actions, Actions::RAISE);
    }

    #[test]
    fn test_invalidate_coalesces_outside_frames() {
        let (window, pending) = Window::new([]).unwrap();
        window.invalidate();
        window.invalidate();
        window.invalidate();
        assert_eq!(pending.redraws.len(), 1);
        assert!(pending.immediate.is_empty());
    }
}
