//! Animation state
//!
//! The client asks to be woken no later than some instant. If that instant
//! has passed the window animates (the native layer delivers frames as
//! fast as it can); otherwise a one-shot redraw is scheduled for it.

use std::time::Instant;

use super::event::Stage;

/// Outcome of [`Animation::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Update {
    /// New animating flag, only when it changed
    pub toggle: Option<bool>,
    /// Arm the redraw timer for this instant
    pub schedule: Option<Instant>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Animation {
    animating: bool,
    next_frame: Option<Instant>,
}

impl Animation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a frame no later than `at`; the earliest request wins
    pub fn set_next_frame(&mut self, at: Instant) {
        match self.next_frame {
            Some(next) if next <= at => {}
            _ => self.next_frame = Some(at),
        }
    }

    /// Forget the pending request; called when a frame starts
    pub fn clear_next_frame(&mut self) {
        self.next_frame = None;
    }

    pub fn next_frame(&self) -> Option<Instant> {
        self.next_frame
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    /// Recompute the animating flag
    pub fn update(&mut self, stage: Stage, now: Instant) -> Update {
        let mut update = Update::default();
        let mut animate = false;
        if stage >= Stage::Inactive {
            if let Some(at) = self.next_frame {
                if at <= now {
                    animate = true;
                } else {
                    update.schedule = Some(at);
                }
            }
        }
        if animate != self.animating {
            self.animating = animate;
            update.toggle = Some(animate);
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_earliest_request_wins() {
        let now = Instant::now();
        let mut anim = Animation::new();
        anim.set_next_frame(now + Duration::from_secs(2));
        anim.set_next_frame(now + Duration::from_secs(1));
        anim.set_next_frame(now + Duration::from_secs(3));
        assert_eq!(anim.next_frame(), Some(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_toggle_is_edge_triggered() {
        let now = Instant::now();
        let mut anim = Animation::new();
        anim.set_next_frame(now);
        assert_eq!(anim.update(Stage::Running, now).toggle, Some(true));
        // Same state again: nothing to tell the platform
        assert_eq!(anim.update(Stage::Running, now).toggle, None);
        anim.clear_next_frame();
        assert_eq!(anim.update(Stage::Running, now).toggle, Some(false));
        assert_eq!(anim.update(Stage::Running, now).toggle, None);
    }

    #[test]
    fn test_future_frame_schedules_timer() {
        let now = Instant::now();
        let at = now + Duration::from_millis(50);
        let mut anim = Animation::new();
        anim.set_next_frame(at);
        let update = anim.update(Stage::Running, now);
        assert_eq!(update.schedule, Some(at));
        assert_eq!(update.toggle, None);
        assert!(!anim.is_animating());
    }

    #[test]
    fn test_suspended_never_animates() {
        let now = Instant::now();
        let mut anim = Animation::new();
        anim.set_next_frame(now);
        assert_eq!(anim.update(Stage::Suspended, now), Update::default());
        assert_eq!(anim.update(Stage::Inactive, now).toggle, Some(true));
        // Dropping below inactive stops the animation
        assert_eq!(anim.update(Stage::Suspended, now).toggle, Some(false));
    }
}
