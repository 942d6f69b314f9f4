//! Units and geometry
//!
//! Device-independent lengths, the pixel metric reported with every frame,
//! and the small integer/float geometry types shared by the coordinator,
//! the router and the backends.

use std::ops::{Add, Sub};

/// Device independent pixels
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Dp(pub f32);

/// Scaled (font) pixels
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Sp(pub f32);

/// Conversion factors from device-independent units to pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Metric {
    /// Pixels per device independent pixel
    pub px_per_dp: f32,
    /// Pixels per scaled pixel
    pub px_per_sp: f32,
}

impl Metric {
    /// Create a metric with the same factor for both units
    pub fn uniform(scale: f32) -> Self {
        Self {
            px_per_dp: scale,
            px_per_sp: scale,
        }
    }

    /// Convert dp to whole pixels. A zero metric is treated as 1:1.
    pub fn dp(&self, v: Dp) -> i32 {
        (v.0 * non_zero(self.px_per_dp)).round() as i32
    }

    /// Convert sp to whole pixels. A zero metric is treated as 1:1.
    pub fn sp(&self, v: Sp) -> i32 {
        (v.0 * non_zero(self.px_per_sp)).round() as i32
    }

    /// Convert pixels back to dp
    pub fn px_to_dp(&self, px: i32) -> Dp {
        Dp(px as f32 / non_zero(self.px_per_dp))
    }
}

fn non_zero(scale: f32) -> f32 {
    if scale == 0.0 {
        1.0
    } else {
        scale
    }
}

/// Integer point in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Integer size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// True if either dimension is zero or negative
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Float position, used for pointer coordinates and semantic hit tests
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, `min` inclusive and `max` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            min: Point::new(x0, y0),
            max: Point::new(x1, y1),
        }
    }

    /// Rectangle at the origin with the given size
    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.max.x - self.min.x, self.max.y - self.min.y)
    }

    pub fn center(&self) -> PointF {
        PointF::new(
            (self.min.x + self.max.x) as f32 / 2.0,
            (self.min.y + self.max.y) as f32 / 2.0,
        )
    }

    pub fn contains(&self, p: PointF) -> bool {
        p.x >= self.min.x as f32
            && p.x < self.max.x as f32
            && p.y >= self.min.y as f32
            && p.y < self.max.y as f32
    }
}

/// Space reserved at the window edges by system UI (notches, bars)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Insets {
    pub top: Dp,
    pub bottom: Dp,
    pub left: Dp,
    pub right: Dp,
}

/// 8-bit non-premultiplied color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(0xff, 0xff, 0xff, 0xff);
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}
