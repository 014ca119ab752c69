//! Pointer-drag controller
//!
//! One session per gesture, from pointer-down to pointer-up. A session holds
//! a [`CaptureGuard`] for the pointer stream; dropping the session (pointer-up,
//! cancel, controller dropped) releases it, so a stale gesture can never see
//! later pointer events.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

use crate::geometry::{move_rect, resize_rect, rotation_towards};
use crate::types::{Delta, PixelSize, Point, Rect, WidgetGeometry, WidgetId};
use crate::constants::geometry::PERCENT_SPAN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Move,
    Resize,
    Rotate,
}

/// What the pointer went down on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Body(WidgetId),
    ResizeHandle(WidgetId),
    RotateHandle(WidgetId),
    Canvas,
}

impl PointerTarget {
    fn gesture(&self) -> Option<(WidgetId, Gesture)> {
        match *self {
            PointerTarget::Body(id) => Some((id, Gesture::Move)),
            PointerTarget::ResizeHandle(id) => Some((id, Gesture::Resize)),
            PointerTarget::RotateHandle(id) => Some((id, Gesture::Rotate)),
            PointerTarget::Canvas => None,
        }
    }
}

/// Raw pointer input in client coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub client: Point,
    pub movement: Delta,
    pub target: PointerTarget,
}

/// Where the canvas sits in client coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasLayout {
    pub origin: Point,
    pub size: PixelSize,
}

/// Counts live pointer-stream subscriptions
#[derive(Debug, Clone, Default)]
pub struct PointerCapture {
    active: Arc<AtomicUsize>,
}

impl PointerCapture {
    fn acquire(&self, widget: WidgetId, gesture: Gesture) -> CaptureGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        trace!(%widget, ?gesture, "Pointer captured");
        CaptureGuard {
            active: Arc::clone(&self.active),
            widget,
            gesture,
        }
    }

    /// Number of subscriptions not yet released
    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Released on drop
#[derive(Debug)]
pub struct CaptureGuard {
    active: Arc<AtomicUsize>,
    widget: WidgetId,
    gesture: Gesture,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        trace!(widget = %self.widget, gesture = ?self.gesture, "Pointer released");
    }
}

#[derive(Debug)]
struct DragSession {
    widget: WidgetId,
    gesture: Gesture,
    _capture: CaptureGuard,
}

#[derive(Debug, Default)]
enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
}

#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
    capture: PointerCapture,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn capture(&self) -> &PointerCapture {
        &self.capture
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Widget and gesture of the running session
    pub fn active(&self) -> Option<(WidgetId, Gesture)> {
        match &self.state {
            DragState::Dragging(session) => Some((session.widget, session.gesture)),
            DragState::Idle => None,
        }
    }

    /// Start a gesture; only the selected widget can be manipulated
    ///
    /// Returns the gesture that started, or None when the press is ignored
    /// (canvas press, unselected widget, or a gesture already running).
    pub fn pointer_down(&mut self, event: &PointerEvent, selected: Option<WidgetId>) -> Option<Gesture> {
        if let DragState::Dragging(session) = &self.state {
            debug!(widget = %session.widget, gesture = ?session.gesture, "Ignoring pointer-down during active gesture");
            return None;
        }
        let (widget, gesture) = event.target.gesture()?;
        if selected != Some(widget) {
            return None;
        }

        debug!(%widget, ?gesture, "Gesture started");
        self.state = DragState::Dragging(DragSession {
            widget,
            gesture,
            _capture: self.capture.acquire(widget, gesture),
        });
        Some(gesture)
    }

    /// Recompute the dragged widget's geometry for one pointer-move
    pub fn pointer_move(
        &self,
        event: &PointerEvent,
        layout: &CanvasLayout,
        current: WidgetGeometry,
    ) -> Option<WidgetGeometry> {
        let DragState::Dragging(session) = &self.state else {
            return None;
        };
        Some(apply_gesture(session.gesture, current, layout, event))
    }

    /// End the gesture; returns the widget that was being dragged
    pub fn pointer_up(&mut self) -> Option<WidgetId> {
        match std::mem::take(&mut self.state) {
            DragState::Dragging(session) => {
                debug!(widget = %session.widget, gesture = ?session.gesture, "Gesture finished");
                Some(session.widget)
            }
            DragState::Idle => None,
        }
    }

    /// Abandon any running gesture; safe to call repeatedly
    pub fn cancel(&mut self) {
        if let Some(widget) = self.pointer_up() {
            debug!(%widget, "Gesture cancelled");
        }
    }
}

/// Whole-value geometry update for one pointer-move of `gesture`
pub fn apply_gesture(
    gesture: Gesture,
    current: WidgetGeometry,
    layout: &CanvasLayout,
    event: &PointerEvent,
) -> WidgetGeometry {
    let container = layout.size;
    let rect = current.rect;

    match (gesture, current.is_ticker) {
        (Gesture::Move, false) => {
            let moved = move_rect(rect, container, rect.pixel_size(container), event.movement);
            WidgetGeometry { rect: moved, ..current }
        }
        (Gesture::Move, true) => {
            let full_width = Rect { x: 0.0, w: PERCENT_SPAN, ..rect };
            let element = PixelSize::new(container.width, rect.pixel_size(container).height);
            let moved = move_rect(full_width, container, element, Delta::new(0.0, event.movement.dy));
            WidgetGeometry { rect: Rect { x: 0.0, w: PERCENT_SPAN, ..moved }, ..current }
        }
        (Gesture::Resize, is_ticker) => {
            let movement = if is_ticker {
                Delta::new(0.0, event.movement.dy)
            } else {
                event.movement
            };
            let resized = resize_rect(rect, container, rect.pixel_origin(container), movement);
            let resized = if is_ticker {
                Rect { x: 0.0, w: PERCENT_SPAN, ..resized }
            } else {
                resized
            };
            WidgetGeometry { rect: resized, ..current }
        }
        (Gesture::Rotate, true) => current,
        (Gesture::Rotate, false) => {
            let center = rect.pixel_center(container);
            let center = Point::new(layout.origin.x + center.x, layout.origin.y + center.y);
            WidgetGeometry {
                rotation: rotation_towards(center, event.client),
                ..current
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const WIDGET: WidgetId = WidgetId(1);
    const OTHER: WidgetId = WidgetId(2);

    fn layout() -> CanvasLayout {
        CanvasLayout {
            origin: Point::new(100.0, 50.0),
            size: PixelSize::new(1000.0, 500.0),
        }
    }

    fn event(target: PointerTarget, dx: f64, dy: f64) -> PointerEvent {
        PointerEvent {
            client: Point::new(0.0, 0.0),
            movement: Delta::new(dx, dy),
            target,
        }
    }

    fn geometry() -> WidgetGeometry {
        WidgetGeometry::new(Rect::new(10.0, 10.0, 20.0, 20.0), 0.0, false)
    }

    #[test]
    fn test_move_requires_selection() {
        let mut drag = DragController::new();
        assert_eq!(drag.pointer_down(&event(PointerTarget::Body(WIDGET), 0.0, 0.0), None), None);
        assert_eq!(drag.pointer_down(&event(PointerTarget::Body(WIDGET), 0.0, 0.0), Some(OTHER)), None);
        assert!(!drag.is_dragging());

        assert_eq!(
            drag.pointer_down(&event(PointerTarget::Body(WIDGET), 0.0, 0.0), Some(WIDGET)),
            Some(Gesture::Move)
        );
        assert_eq!(drag.active(), Some((WIDGET, Gesture::Move)));
    }

    #[test]
    fn test_canvas_press_starts_nothing() {
        let mut drag = DragController::new();
        assert_eq!(drag.pointer_down(&event(PointerTarget::Canvas, 0.0, 0.0), Some(WIDGET)), None);
        assert_eq!(drag.capture().active(), 0);
    }

    #[test]
    fn test_gestures_are_mutually_exclusive() {
        let mut drag = DragController::new();
        drag.pointer_down(&event(PointerTarget::ResizeHandle(WIDGET), 0.0, 0.0), Some(WIDGET));
        assert_eq!(drag.pointer_down(&event(PointerTarget::Body(WIDGET), 0.0, 0.0), Some(WIDGET)), None);
        assert_eq!(drag.active(), Some((WIDGET, Gesture::Resize)));
        assert_eq!(drag.capture().active(), 1);
    }

    #[test]
    fn test_every_move_commits_new_geometry() {
        let mut drag = DragController::new();
        drag.pointer_down(&event(PointerTarget::Body(WIDGET), 0.0, 0.0), Some(WIDGET));

        let mut current = geometry();
        for _ in 0..3 {
            current = drag
                .pointer_move(&event(PointerTarget::Canvas, 10.0, 5.0), &layout(), current)
                .unwrap();
        }
        assert!((current.rect.x - 13.0).abs() < 1e-9);
        assert!((current.rect.y - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_pointer_up_releases_capture() {
        let mut drag = DragController::new();
        drag.pointer_down(&event(PointerTarget::Body(WIDGET), 0.0, 0.0), Some(WIDGET));
        assert_eq!(drag.capture().active(), 1);

        assert_eq!(drag.pointer_up(), Some(WIDGET));
        assert_eq!(drag.capture().active(), 0);
        assert!(drag.pointer_move(&event(PointerTarget::Canvas, 10.0, 10.0), &layout(), geometry()).is_none());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut drag = DragController::new();
        drag.pointer_down(&event(PointerTarget::RotateHandle(WIDGET), 0.0, 0.0), Some(WIDGET));
        drag.cancel();
        drag.cancel();
        assert_eq!(drag.capture().active(), 0);
        assert!(!drag.is_dragging());
        assert_eq!(drag.pointer_up(), None);
    }

    #[test]
    fn test_dropping_controller_releases_capture() {
        let capture;
        {
            let mut drag = DragController::new();
            capture = drag.capture().clone();
            drag.pointer_down(&event(PointerTarget::Body(WIDGET), 0.0, 0.0), Some(WIDGET));
            assert_eq!(capture.active(), 1);
        }
        assert_eq!(capture.active(), 0);
    }

    #[test]
    fn test_rotate_uses_client_center() {
        // rect center in canvas: (200, 100), in client space: (300, 150)
        let current = geometry();
        let mut pointer = event(PointerTarget::Canvas, 0.0, 0.0);
        pointer.client = Point::new(300.0, 400.0);

        let rotated = apply_gesture(Gesture::Rotate, current, &layout(), &pointer);
        assert!((rotated.rotation - FRAC_PI_2).abs() < 1e-9);
        assert_eq!(rotated.rect, current.rect);

        let prior = WidgetGeometry { rotation: 42.0, ..current };
        let again = apply_gesture(Gesture::Rotate, prior, &layout(), &pointer);
        assert_eq!(again.rotation, rotated.rotation);
    }

    #[test]
    fn test_resize_keeps_position() {
        let resized = apply_gesture(
            Gesture::Resize,
            geometry(),
            &layout(),
            &event(PointerTarget::Canvas, 100.0, -1000.0),
        );
        assert_eq!((resized.rect.x, resized.rect.y), (10.0, 10.0));
        assert!((resized.rect.w - 30.0).abs() < 1e-9);
        // 40px floor on a 500px tall canvas
        assert!((resized.rect.h - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_ticker_stays_full_width() {
        let ticker = WidgetGeometry::new(Rect::new(0.0, 50.0, 100.0, 16.0), 0.0, true);

        let moved = apply_gesture(Gesture::Move, ticker, &layout(), &event(PointerTarget::Canvas, 300.0, 50.0));
        assert_eq!((moved.rect.x, moved.rect.w), (0.0, 100.0));
        assert!((moved.rect.y - 60.0).abs() < 1e-9);

        let resized = apply_gesture(Gesture::Resize, ticker, &layout(), &event(PointerTarget::Canvas, -300.0, 50.0));
        assert_eq!((resized.rect.x, resized.rect.w), (0.0, 100.0));
        assert!((resized.rect.h - 26.0).abs() < 1e-9);

        let rotated = apply_gesture(Gesture::Rotate, ticker, &layout(), &event(PointerTarget::Canvas, 5.0, 5.0));
        assert_eq!(rotated, ticker);
    }

    #[test]
    fn test_ticker_with_narrow_stored_width_is_widened() {
        let ticker = WidgetGeometry::new(Rect::new(20.0, 50.0, 30.0, 16.0), 0.0, true);
        let moved = apply_gesture(Gesture::Move, ticker, &layout(), &event(PointerTarget::Canvas, 0.0, 0.0));
        assert_eq!(moved.rect, Rect::new(0.0, 50.0, 100.0, 16.0));
    }
}
