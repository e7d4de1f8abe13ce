//! Viewport rectangles
//!
//! A [`ViewportRect`] is either an absolute pixel rectangle or a rectangle
//! expressed in fractions of its parent. Shadow atlas cells and their
//! sub-viewports are relative rectangles nested inside each other.

use serde::{Serialize, Deserialize};

use crate::render::device::PixelRect;

/// How a viewport reacts to its parent's size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScalingMode {
    /// Coordinates are pixels and ignore the parent size
    Fixed,
    /// Coordinates are fractions of the parent
    #[default]
    Relative,
    /// Fractions of the parent; the owning target follows parent resizes
    Dynamic,
}

/// Rectangle plus scaling mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportRect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
    /// Interpretation of the four values above
    pub mode: ScalingMode,
}

impl ViewportRect {
    /// Relative rectangle from its corner coordinates `(x0, y0) - (x1, y1)`
    pub fn relative(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
            mode: ScalingMode::Relative,
        }
    }

    /// The whole parent
    pub fn full() -> Self {
        Self::relative(0.0, 0.0, 1.0, 1.0)
    }

    /// Absolute pixel rectangle
    pub fn fixed(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height, mode: ScalingMode::Fixed }
    }

    /// Right edge
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Area in the rectangle's own units
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// True when the rectangle covers no area
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Area shared with `other` (same units assumed)
    pub fn intersection_area(&self, other: &Self) -> f32 {
        let w = self.right().min(other.right()) - self.x.max(other.x);
        let h = self.bottom().min(other.bottom()) - self.y.max(other.y);
        if w <= 0.0 || h <= 0.0 { 0.0 } else { w * h }
    }

    /// True when `other` lies inside this rectangle (with `epsilon` slack)
    pub fn contains(&self, other: &Self, epsilon: f32) -> bool {
        other.x >= self.x - epsilon
            && other.y >= self.y - epsilon
            && other.right() <= self.right() + epsilon
            && other.bottom() <= self.bottom() + epsilon
    }

    /// Map a rectangle expressed relative to `self` into `self`'s parent space
    pub fn sub_rect(&self, inner: &Self) -> Self {
        Self {
            x: self.x + inner.x * self.width,
            y: self.y + inner.y * self.height,
            width: inner.width * self.width,
            height: inner.height * self.height,
            mode: self.mode,
        }
    }

    /// Resolve to pixels inside a parent of `width` x `height`
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        match self.mode {
            ScalingMode::Fixed => PixelRect::new(
                self.x.max(0.0).round() as u32,
                self.y.max(0.0).round() as u32,
                self.width.max(0.0).round() as u32,
                self.height.max(0.0).round() as u32,
            ),
            ScalingMode::Relative | ScalingMode::Dynamic => {
                let (w, h) = (width as f32, height as f32);
                let x0 = (self.x * w).round().max(0.0);
                let y0 = (self.y * h).round().max(0.0);
                let x1 = (self.right() * w).round().min(w);
                let y1 = (self.bottom() * h).round().min(h);
                PixelRect::new(x0 as u32, y0 as u32, (x1 - x0).max(0.0) as u32, (y1 - y0).max(0.0) as u32)
            }
        }
    }
}

impl Default for ViewportRect {
    fn default() -> Self {
        Self::full()
    }
}
