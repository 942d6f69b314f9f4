//! Window configuration
//!
//! Options are hints: the client requests them, the native layer applies
//! what it can and reports the outcome back as a config event.

use std::mem;

use log::warn;

use crate::unit::{Dp, Metric, Rgba, Size};

/// Height of the fallback decoration bar drawn when the platform leaves
/// window chrome to the toolkit
pub const DEFAULT_DECORATION_HEIGHT: Dp = Dp(28.0);

/// Window mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowMode {
    /// Normal window with platform decorations
    #[default]
    Windowed,
    /// Iconified
    Minimized,
    /// As large as possible, decorations kept
    Maximized,
    /// Full screen, no decorations
    Fullscreen,
}

/// Allowed orientations (mobile and web only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    #[default]
    Any,
    Landscape,
    Portrait,
}

/// Window configuration as known to the coordinator
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    /// Window dimensions in pixels
    pub size: Size,
    /// Maximum dimensions (zero = unbounded)
    pub max_size: Size,
    /// Minimum dimensions (zero = unbounded)
    pub min_size: Size,
    /// Title shown in the decoration bar
    pub title: String,
    /// Current mode
    pub mode: WindowMode,
    /// Android status bar color
    pub status_color: Option<Rgba>,
    /// Android navigation bar or browser address bar color
    pub navigation_color: Option<Rgba>,
    /// Allowed orientation
    pub orientation: Orientation,
    /// Client renders on its own; no GPU context is created
    pub custom_renderer: bool,
    /// Platform draws the decorations
    pub decorated: bool,
    /// Height of the fallback decorations
    pub decoration_height: Dp,
}

impl Config {
    /// Apply options in order; later options win
    pub fn apply(&mut self, metric: Metric, options: &[WindowOption]) {
        for option in options {
            option.apply(metric, self);
        }
    }
}

/// A single configuration request
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOption {
    /// Window size; also switches the mode to windowed
    Size(Dp, Dp),
    MaxSize(Dp, Dp),
    MinSize(Dp, Dp),
    Title(String),
    Mode(WindowMode),
    StatusColor(Rgba),
    NavigationColor(Rgba),
    Orientation(Orientation),
    CustomRenderer(bool),
    Decorated(bool),
    /// Fallback decoration height; appended by the coordinator
    DecorationHeight(Dp),
}

impl WindowOption {
    /// Apply this option to a config
    pub fn apply(&self, metric: Metric, config: &mut Config) {
        match self {
            WindowOption::Size(w, h) => {
                if let Some(size) = to_size(metric, *w, *h) {
                    config.mode = WindowMode::Windowed;
                    config.size = size;
                }
            }
            WindowOption::MaxSize(w, h) => {
                if let Some(size) = to_size(metric, *w, *h) {
                    config.max_size = size;
                }
            }
            WindowOption::MinSize(w, h) => {
                if let Some(size) = to_size(metric, *w, *h) {
                    config.min_size = size;
                }
            }
            WindowOption::Title(title) => config.title = title.clone(),
            WindowOption::Mode(mode) => config.mode = *mode,
            WindowOption::StatusColor(color) => config.status_color = Some(*color),
            WindowOption::NavigationColor(color) => config.navigation_color = Some(*color),
            WindowOption::Orientation(o) => config.orientation = *o,
            WindowOption::CustomRenderer(custom) => config.custom_renderer = *custom,
            WindowOption::Decorated(decorated) => config.decorated = *decorated,
            WindowOption::DecorationHeight(h) => config.decoration_height = *h,
        }
    }

    /// True if two options configure the same property
    pub fn same_kind(&self, other: &WindowOption) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

fn to_size(metric: Metric, w: Dp, h: Dp) -> Option<Size> {
    if w.0 <= 0.0 || h.0 <= 0.0 {
        warn!("Ignoring non-positive window size {}x{}", w.0, h.0);
        return None;
    }
    Some(Size::new(metric.dp(w), metric.dp(h)))
}

/// Options every window starts with, before the client's own
pub fn default_options() -> Vec<WindowOption> {
    vec![
        WindowOption::Size(Dp(800.0), Dp(600.0)),
        WindowOption::Title("casement".to_string()),
        WindowOption::Decorated(true),
        WindowOption::DecorationHeight(DEFAULT_DECORATION_HEIGHT),
    ]
}

/// Merge `newer` into `pending`, keeping only the newest option of each kind
pub fn coalesce(pending: &mut Vec<WindowOption>, newer: impl IntoIterator<Item = WindowOption>) {
    for option in newer {
        pending.retain(|o| !o.same_kind(&option));
        pending.push(option);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let mut config = Config::default();
        config.apply(Metric::default(), &default_options());
        assert_eq!(config.size, Size::new(800, 600));
        assert_eq!(config.title, "casement");
        assert!(config.decorated);
        assert_eq!(config.decoration_height, DEFAULT_DECORATION_HEIGHT);
    }

    #[test]
    fn test_size_resets_mode() {
        let mut config = Config {
            mode: WindowMode::Fullscreen,
            ..Default::default()
        };
        config.apply(Metric::uniform(2.0), &[WindowOption::Size(Dp(10.0), Dp(20.0))]);
        assert_eq!(config.mode, WindowMode::Windowed);
        assert_eq!(config.size, Size::new(20, 40));
    }

    #[test]
    fn test_invalid_size_ignored() {
        let mut config = Config::default();
        config.apply(Metric::default(), &[WindowOption::MinSize(Dp(0.0), Dp(5.0))]);
        assert_eq!(config.min_size, Size::default());
    }

    #[test]
    fn test_coalesce_keeps_newest_of_kind() {
        let mut pending = vec![
            WindowOption::Title("a".into()),
            WindowOption::Mode(WindowMode::Maximized),
        ];
        coalesce(
            &mut pending,
            vec![
                WindowOption::Title("b".into()),
                WindowOption::Title("c".into()),
            ],
        );
        assert_eq!(
            pending,
            vec![
                WindowOption::Mode(WindowMode::Maximized),
                WindowOption::Title("c".into()),
            ]
        );
    }
}
