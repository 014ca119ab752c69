//! Direct-manipulation geometry in percentage space
//!
//! Every function takes pixel-space input (pointer deltas, container size)
//! and returns a whole new `Rect` or angle. Nothing here fails: a degenerate
//! container or a non-finite delta yields the unmodified rect.

use tracing::debug;

use crate::constants::geometry::{MIN_ELEMENT_SIZE_PX, PERCENT_SPAN};
use crate::types::{Delta, PixelSize, Point, Rect, Rotation};

fn to_percent(pixels: f64, container_dimension: f64) -> f64 {
    pixels / container_dimension * PERCENT_SPAN
}

/// Translate a rect by a pixel delta, clamped so the element stays inside the container
pub fn move_rect(current: Rect, container: PixelSize, element: PixelSize, delta: Delta) -> Rect {
    if !container.is_usable() {
        debug!(?container, "Ignoring move inside unusable container");
        return current;
    }
    let delta = delta.sanitized();
    let origin = current.pixel_origin(container);

    let max_left = container.width - element.width;
    let max_top = container.height - element.height;

    // min before max: an oversized element pins to 0 instead of panicking in clamp()
    let left = (origin.x + delta.dx).min(max_left).max(0.0);
    let top = (origin.y + delta.dy).min(max_top).max(0.0);

    Rect {
        x: to_percent(left, container.width),
        y: to_percent(top, container.height),
        w: current.w,
        h: current.h,
    }
}

/// Grow or shrink a rect from its anchored top-left corner
///
/// The new size is floored at [`MIN_ELEMENT_SIZE_PX`] and capped at the
/// distance between `origin` and the container edge. When the container is
/// smaller than the floor, the floor wins.
pub fn resize_rect(current: Rect, container: PixelSize, origin: Point, delta: Delta) -> Rect {
    if !container.is_usable() {
        debug!(?container, "Ignoring resize inside unusable container");
        return current;
    }
    let delta = delta.sanitized();
    let size = current.pixel_size(container);

    let max_width = container.width - origin.x;
    let max_height = container.height - origin.y;

    let width = (size.width + delta.dx).min(max_width).max(MIN_ELEMENT_SIZE_PX);
    let height = (size.height + delta.dy).min(max_height).max(MIN_ELEMENT_SIZE_PX);

    Rect {
        x: current.x,
        y: current.y,
        w: to_percent(width, container.width),
        h: to_percent(height, container.height),
    }
}

/// Absolute angle from the element center to the pointer
pub fn rotation_towards(center: Point, pointer: Point) -> Rotation {
    (pointer.y - center.y).atan2(pointer.x - center.x)
}
