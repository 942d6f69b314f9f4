//! Casement - a platform-independent window coordinator
//!
//! Casement sits between a GUI client and a native window. The client owns
//! a [`Window`] and pulls events from it; the native backend owns the
//! matching [`Coordinator`] and pushes native events into it. In between,
//! the coordinator keeps the two in lockstep.
//!
//! # Architecture
//!
//! - **Window**: client handle; blocking event stream and deferred requests
//! - **Coordinator**: per-window state machine; frame rendezvous, fallback
//!   decorations, IME and accessibility bridges
//! - **Input Router**: focus, pointer grabs and per-frame side requests
//! - **GPU Manager**: context lifecycle and device-loss recovery
//! - **Platform**: capability trait native backends implement
//! - **Headless Backend**: calloop-driven reference backend
//!
//! # Example
//!
//! ```no_run
//! use casement::backend::{Headless, HeadlessConfig};
//! use casement::gpu::Ops;
//! use casement::window::{Event, Frame, Window};
//!
//! let headless = Headless::spawn(HeadlessConfig::default())?;
//! let (window, pending) = Window::new([])?;
//! let _native = headless.open(pending)?;
//! while let Some(event) = window.next_event() {
//!     if let Event::Frame(frame) = event {
//!         frame.submit(Frame::new(Ops::new()));
//!     }
//! }
//! # Ok::<(), casement::Error>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod gpu;
pub mod input;
pub mod platform;
pub mod unit;
pub mod window;

pub use config::{Config, WindowMode, WindowOption};
pub use error::Error;
pub use platform::{Actions, Platform};
pub use window::{Coordinator, Event, Frame, FrameEvent, Window};
