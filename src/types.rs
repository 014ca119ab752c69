//! Core value types shared by the geometry engine, the drag controller and
//! the alerting pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::geometry::PERCENT_SPAN;

/// Rectangle in percentage space of the containing canvas (0-100 on both axes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Pixel position of the top-left corner inside a container
    pub fn pixel_origin(&self, container: PixelSize) -> Point {
        Point::new(
            self.x / PERCENT_SPAN * container.width,
            self.y / PERCENT_SPAN * container.height,
        )
    }

    /// Pixel dimensions inside a container
    pub fn pixel_size(&self, container: PixelSize) -> PixelSize {
        PixelSize::new(
            self.w / PERCENT_SPAN * container.width,
            self.h / PERCENT_SPAN * container.height,
        )
    }

    /// Pixel center inside a container
    pub fn pixel_center(&self, container: PixelSize) -> Point {
        let origin = self.pixel_origin(container);
        let size = self.pixel_size(container);
        Point::new(origin.x + size.width / 2.0, origin.y + size.height / 2.0)
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::new(0.0, 0.0, 30.0, 12.0)
    }
}

/// Rotation in radians; never normalized
pub type Rotation = f64;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pointer movement since the previous pointer event
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Delta {
    pub dx: f64,
    pub dy: f64,
}

impl Delta {
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// Non-finite components become zero
    pub fn sanitized(self) -> Self {
        let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
        Self::new(finite(self.dx), finite(self.dy))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelSize {
    pub width: f64,
    pub height: f64,
}

impl PixelSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A container we can divide by
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Rect + rotation + the ticker discriminator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidgetGeometry {
    pub rect: Rect,
    pub rotation: Rotation,
    pub is_ticker: bool,
}

impl WidgetGeometry {
    pub fn new(rect: Rect, rotation: Rotation, is_ticker: bool) -> Self {
        Self { rect, rotation, is_ticker }
    }
}

/// Stable identifier of a widget on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub u64);

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "widget-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Service,
    Host,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Service => "service",
            ObjectType::Host => "host",
        }
    }

    /// Case-insensitive; anything else is None
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "service" => Some(ObjectType::Service),
            "host" => Some(ObjectType::Host),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The monitored object a widget is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckTarget {
    pub object_type: ObjectType,
    pub filter: String,
}

impl CheckTarget {
    /// Returns None for an empty or blank filter
    pub fn new(object_type: ObjectType, filter: impl Into<String>) -> Option<Self> {
        let filter = filter.into();
        if filter.trim().is_empty() {
            return None;
        }
        Some(Self { object_type, filter })
    }
}

impl fmt::Display for CheckTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.filter)
    }
}

#[cfg(test)]
impl Rect {
    /// True when the rect lies fully inside the canvas
    pub fn is_within_canvas(&self) -> bool {
        const EPSILON: f64 = 1e-9;
        self.x >= -EPSILON
            && self.y >= -EPSILON
            && self.x + self.w <= PERCENT_SPAN + EPSILON
            && self.y + self.h <= PERCENT_SPAN + EPSILON
    }
}
