//! Events exchanged with the client and the native layer

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::debug;

use crate::config::Config;
use crate::error::Error;
use crate::gpu::Ops;
use crate::input::{Handlers, InputEvent, Requests, Routed, SemanticNode};
use crate::unit::{Insets, Metric, Size};

/// Coarse visibility of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    /// Not visible; GPU resources are released
    #[default]
    Suspended,
    /// Visible but not focused
    Inactive,
    Running,
}

/// Events delivered to the client by [`Window::next_event`]
///
/// [`Window::next_event`]: super::Window::next_event
#[derive(Debug, Clone)]
pub enum Event {
    /// Produce a frame, or decline by asking for the next event
    Frame(FrameEvent),
    Stage(Stage),
    /// The configuration as confirmed by the native layer
    Config(Config),
    /// Final event; `err` is set when the window died of an error
    Destroy { err: Option<Error> },
}

/// A frame request from the native layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRequest {
    pub now: Instant,
    /// Window size in pixels
    pub size: Size,
    pub insets: Insets,
    pub metric: Metric,
    /// The surface must be refreshed, e.g. after a resize
    pub sync: bool,
}

/// Events a backend feeds into [`Coordinator::event`]
///
/// [`Coordinator::event`]: super::Coordinator::event
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    Stage(Stage),
    Frame(FrameRequest),
    /// The native window is gone
    Destroy,
    /// Reconfiguration acknowledgement
    Config(Config),
    Input(InputEvent),
    /// Nothing happened; drain deferred work
    Wakeup,
}

/// What the client produced for one frame
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub ops: Ops,
    pub handlers: Handlers,
    pub requests: Requests,
    /// Accessibility snapshot, pre-order with the root first
    pub semantics: Option<Vec<SemanticNode>>,
}

impl Frame {
    pub fn new(ops: Ops) -> Self {
        Self {
            ops,
            ..Default::default()
        }
    }

    pub fn with_handlers(mut self, handlers: Handlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_requests(mut self, requests: Requests) -> Self {
        self.requests = requests;
        self
    }

    pub fn with_semantics(mut self, nodes: Vec<SemanticNode>) -> Self {
        self.semantics = Some(nodes);
        self
    }
}

/// A frame handed to the coordinator; the coordinator drops `ack` once
/// the frame has been rendered
#[derive(Debug)]
pub(crate) struct Submission {
    pub seq: u64,
    pub frame: Frame,
    pub ack: Sender<()>,
}

/// Client side of the frame rendezvous
#[derive(Debug, Clone)]
pub(crate) struct FrameLink {
    pub frames: Sender<Submission>,
    pub destroy: Receiver<()>,
    /// Sequence number of the frame event the coordinator waits on, 0 if none
    pub current: Arc<AtomicU64>,
}

/// Request to produce a frame
#[derive(Debug, Clone)]
pub struct FrameEvent {
    pub now: Instant,
    pub metric: Metric,
    /// Size available to the client, decorations excluded
    pub size: Size,
    pub insets: Insets,
    /// Input routed since the previous frame
    pub input: Vec<Routed>,
    pub(crate) seq: u64,
    pub(crate) link: FrameLink,
}

impl FrameEvent {
    /// Hand `frame` to the coordinator and wait until it has been rendered
    ///
    /// Submitting after the event was declined (the client asked for the
    /// next event) drops the frame.
    pub fn submit(self, frame: Frame) {
        let link = &self.link;
        if link.current.load(Ordering::Acquire) != self.seq {
            debug!("Dropping frame {} submitted too late", self.seq);
            return;
        }
        let (ack, rendered) = bounded(1);
        let submission = Submission {
            seq: self.seq,
            frame,
            ack,
        };
        select! {
            send(link.frames, submission) -> res => {
                if res.is_err() {
                    return;
                }
            }
            recv(link.destroy) -> _ => return,
        }
        // Disconnects once the coordinator is done with the frame
        let _ = rendered.recv();
    }
}
