//! Windows
//!
//! The client holds a [`Window`]; the backend realizes the matching
//! [`PendingWindow`] into a [`Coordinator`] and feeds it native events.

pub mod animation;
pub mod client;
pub mod coordinator;
mod deferred;
pub mod event;
mod scheduler;

pub use client::{PendingWindow, Window};
pub use coordinator::{Coordinator, Lifecycle};
pub use event::{Event, Frame, FrameEvent, FrameRequest, NativeEvent, Stage};
