//! Backend module
//!
//! Backends own the native event loop, create the native windows and feed
//! each window's coordinator. Only the headless backend lives in this
//! crate; native backends implement [`crate::platform::Platform`] the same
//! way.

pub mod headless;

pub use headless::{Headless, HeadlessConfig, NativeWindow};
