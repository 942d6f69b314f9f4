//! Normalized keyboard events
//!
//! Backends translate native keycodes into these before handing them to
//! the coordinator.

/// Logical key name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyName {
    /// A key producing a character, lower-cased
    Char(char),
    Tab,
    Enter,
    Escape,
    Backspace,
    Delete,
    Space,
    LeftArrow,
    RightArrow,
    UpArrow,
    DownArrow,
    Home,
    End,
    PageUp,
    PageDown,
    /// Function key F1..F24
    F(u8),
    /// Anything the backend could not name
    Other(String),
}

bitflags::bitflags! {
    /// Keyboard modifier state
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const CTRL = 1 << 0;
        const SHIFT = 1 << 1;
        const ALT = 1 << 2;
        /// Windows / Command key
        const SUPER = 1 << 3;
    }
}

/// Press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyState {
    #[default]
    Press,
    Release,
}

/// A key press or release
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub name: KeyName,
    pub modifiers: Modifiers,
    pub state: KeyState,
}

impl KeyEvent {
    /// A press with no modifiers
    pub fn press(name: KeyName) -> Self {
        Self {
            name,
            modifiers: Modifiers::empty(),
            state: KeyState::Press,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn released(mut self) -> Self {
        self.state = KeyState::Release;
        self
    }
}
