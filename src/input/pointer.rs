//! Normalized pointer (mouse/touch/pen) events

use crate::unit::PointF;

use super::keyboard::Modifiers;

/// What the pointer did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Press,
    Release,
    Move,
    /// Move with a button held
    Drag,
    Scroll,
    Enter,
    Leave,
    /// The gesture was taken over by the system
    Cancel,
}

/// Pointer device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerSource {
    #[default]
    Mouse,
    Touch,
}

bitflags::bitflags! {
    /// Pressed pointer buttons
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u8 {
        const PRIMARY = 1 << 0;
        const SECONDARY = 1 << 1;
        const TERTIARY = 1 << 2;
    }
}

/// A pointer event in window pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub source: PointerSource,
    /// Distinguishes simultaneous touches
    pub id: u32,
    pub position: PointF,
    pub buttons: Buttons,
    /// Scroll distance for `Scroll` events
    pub scroll: PointF,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    /// A primary-button mouse event at `position`
    pub fn new(kind: PointerKind, position: PointF) -> Self {
        Self {
            kind,
            source: PointerSource::Mouse,
            id: 0,
            position,
            buttons: match kind {
                PointerKind::Press | PointerKind::Drag => Buttons::PRIMARY,
                _ => Buttons::empty(),
            },
            scroll: PointF::default(),
            modifiers: Modifiers::empty(),
        }
    }
}
