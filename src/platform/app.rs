//! Process-wide platform state
//!
//! Native toolkits keep one application context (display connection,
//! keyboard and IME context) shared by all windows. It lives on the thread
//! that created it and is initialized at most once per thread; backends
//! receive it as an `Rc` handle instead of reaching for a global.

use std::cell::OnceCell;
use std::rc::Rc;

use log::{debug, info};

/// Key repeat settings reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRepeat {
    /// Characters per second
    pub rate: u32,
    /// Delay before repeating, in milliseconds
    pub delay: u32,
}

impl Default for KeyRepeat {
    fn default() -> Self {
        Self {
            rate: 25,
            delay: 600,
        }
    }
}

/// Shared application context
#[derive(Debug)]
pub struct AppContext {
    app_id: String,
    key_repeat: KeyRepeat,
}

thread_local! {
    static APP: OnceCell<Rc<AppContext>> = const { OnceCell::new() };
}

impl AppContext {
    /// Create a context; most callers want [`AppContext::get_or_init`]
    pub fn new(app_id: impl Into<String>, key_repeat: KeyRepeat) -> Self {
        Self {
            app_id: app_id.into(),
            key_repeat,
        }
    }

    /// Get this thread's context, creating it with `init` on first use
    ///
    /// Only the first call's `init` runs; later calls return the existing
    /// context unchanged.
    pub fn get_or_init(init: impl FnOnce() -> AppContext) -> Rc<AppContext> {
        APP.with(|cell| {
            cell.get_or_init(|| {
                let ctx = init();
                info!("Application context initialized: {}", ctx.app_id);
                Rc::new(ctx)
            })
            .clone()
        })
    }

    /// This thread's context, if initialized
    pub fn current() -> Option<Rc<AppContext>> {
        let ctx = APP.with(|cell| cell.get().cloned());
        if ctx.is_none() {
            debug!("No application context on this thread");
        }
        ctx
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn key_repeat(&self) -> KeyRepeat {
        self.key_repeat
    }
}
