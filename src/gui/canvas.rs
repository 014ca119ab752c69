//! Board canvas: painting, hit testing and pointer routing

use eframe::egui;

use super::constants::*;
use crate::board::{Board, WidgetStatus};
use crate::check_state::CheckState;
use crate::drag::{CanvasLayout, PointerEvent, PointerTarget};
use crate::types::{Delta, PixelSize, Point, Rect, Rotation, WidgetId};

/// A widget's rotated rectangle in client coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidgetFrame {
    center: Point,
    half_width: f64,
    half_height: f64,
    rotation: Rotation,
}

impl WidgetFrame {
    pub fn new(rect: Rect, rotation: Rotation, layout: &CanvasLayout) -> Self {
        let center = rect.pixel_center(layout.size);
        let size = rect.pixel_size(layout.size);
        Self {
            center: Point::new(layout.origin.x + center.x, layout.origin.y + center.y),
            half_width: size.width / 2.0,
            half_height: size.height / 2.0,
            rotation,
        }
    }

    pub fn center(&self) -> Point {
        self.center
    }

    fn to_client(&self, local: Point) -> Point {
        let (sin, cos) = self.rotation.sin_cos();
        Point::new(
            self.center.x + local.x * cos - local.y * sin,
            self.center.y + local.x * sin + local.y * cos,
        )
    }

    fn to_local(&self, client: Point) -> Point {
        let (sin, cos) = (-self.rotation).sin_cos();
        let (dx, dy) = (client.x - self.center.x, client.y - self.center.y);
        Point::new(dx * cos - dy * sin, dx * sin + dy * cos)
    }

    /// Top-left, top-right, bottom-right, bottom-left
    pub fn corners(&self) -> [Point; 4] {
        let (w, h) = (self.half_width, self.half_height);
        [
            self.to_client(Point::new(-w, -h)),
            self.to_client(Point::new(w, -h)),
            self.to_client(Point::new(w, h)),
            self.to_client(Point::new(-w, h)),
        ]
    }

    pub fn contains(&self, client: Point) -> bool {
        let local = self.to_local(client);
        local.x.abs() <= self.half_width && local.y.abs() <= self.half_height
    }

    pub fn resize_grabber(&self) -> Point {
        self.corners()[2]
    }

    pub fn rotate_grabber(&self) -> Point {
        self.corners()[1]
    }
}

fn near(a: Point, b: Point, radius: f64) -> bool {
    (a.x - b.x).hypot(a.y - b.y) <= radius
}

fn frame_of(board: &Board, id: WidgetId, layout: &CanvasLayout) -> Option<WidgetFrame> {
    board
        .element(id)
        .map(|element| WidgetFrame::new(element.rect, element.rotation, layout))
}

/// What the pointer is over: grabbers of the selected widget first, then
/// widget bodies from topmost to bottommost.
pub fn hit_test(board: &Board, layout: &CanvasLayout, pointer: Point) -> PointerTarget {
    let radius = f64::from(GRABBER_RADIUS);

    if let Some(selected) = board.selected()
        && let Some(frame) = frame_of(board, selected, layout)
    {
        if near(frame.resize_grabber(), pointer, radius) {
            return PointerTarget::ResizeHandle(selected);
        }
        let is_ticker = board.element(selected).is_some_and(|e| e.kind.is_ticker());
        if !is_ticker && near(frame.rotate_grabber(), pointer, radius) {
            return PointerTarget::RotateHandle(selected);
        }
    }

    board
        .widget_ids()
        .into_iter()
        .rev()
        .find(|id| frame_of(board, *id, layout).is_some_and(|frame| frame.contains(pointer)))
        .map(PointerTarget::Body)
        .unwrap_or(PointerTarget::Canvas)
}

/// Largest rect with the given aspect ratio centered in `available`
pub fn fit_aspect(available: egui::Rect, aspect: f32) -> egui::Rect {
    let width = available.width().min(available.height() * aspect);
    let height = width / aspect;
    egui::Rect::from_center_size(available.center(), egui::vec2(width, height))
}

pub fn layout_of(rect: egui::Rect) -> CanvasLayout {
    CanvasLayout {
        origin: Point::new(f64::from(rect.min.x), f64::from(rect.min.y)),
        size: PixelSize::new(f64::from(rect.width()), f64::from(rect.height())),
    }
}

fn to_pos(point: Point) -> egui::Pos2 {
    egui::pos2(point.x as f32, point.y as f32)
}

fn to_point(pos: egui::Pos2) -> Point {
    Point::new(f64::from(pos.x), f64::from(pos.y))
}

pub fn state_color(status: Option<WidgetStatus>) -> egui::Color32 {
    match status.map(|s| s.state) {
        Some(CheckState::Ok | CheckState::Up) => STATE_OK,
        Some(CheckState::Warning) => STATE_WARNING,
        Some(CheckState::Critical | CheckState::Down) => STATE_CRITICAL,
        Some(CheckState::Unknown) => STATE_UNKNOWN,
        None => STATE_PENDING,
    }
}

fn widget_label(title: &str, status: Option<WidgetStatus>) -> String {
    match status {
        Some(WidgetStatus { state, acknowledged: true }) => format!("{title}\n{state} (ACK)"),
        Some(WidgetStatus { state, .. }) => format!("{title}\n{state}"),
        None => title.to_string(),
    }
}

pub fn paint(painter: &egui::Painter, board: &Board, canvas: egui::Rect, editing: bool) {
    painter.rect_filled(canvas, 0.0, CANVAS_BACKGROUND);
    let layout = layout_of(canvas);

    for id in board.widget_ids() {
        let Some(element) = board.element(id) else {
            continue;
        };
        let frame = WidgetFrame::new(element.rect, element.rotation, &layout);
        let status = board.status(id);
        let fill = if element.kind.polls_check() {
            state_color(status)
        } else {
            STATIC_FILL
        };
        let selected = editing && board.selected() == Some(id);
        let stroke = if selected {
            egui::Stroke::new(2.0, SELECTION_COLOR)
        } else {
            egui::Stroke::NONE
        };

        let corners: Vec<egui::Pos2> = frame.corners().into_iter().map(to_pos).collect();
        painter.add(egui::Shape::convex_polygon(corners, fill, stroke));
        painter.text(
            to_pos(frame.center()),
            egui::Align2::CENTER_CENTER,
            widget_label(&element.title, status),
            egui::FontId::proportional(LABEL_FONT_SIZE),
            LABEL_COLOR,
        );

        if selected {
            painter.circle(to_pos(frame.resize_grabber()), GRABBER_RADIUS, SELECTION_COLOR, egui::Stroke::NONE);
            if !element.kind.is_ticker() {
                painter.circle(
                    to_pos(frame.rotate_grabber()),
                    GRABBER_RADIUS,
                    LABEL_COLOR,
                    egui::Stroke::new(2.0, SELECTION_COLOR),
                );
            }
        }
    }
}

/// Feed this frame's pointer input into the board; true if geometry changed
pub fn route_pointer(ctx: &egui::Context, board: &mut Board, canvas: egui::Rect) -> bool {
    let layout = layout_of(canvas);
    let (pressed, released, down, gone, position, delta) = ctx.input(|i| {
        (
            i.pointer.primary_pressed(),
            i.pointer.primary_released(),
            i.pointer.primary_down(),
            !i.pointer.has_pointer() || i.events.iter().any(|e| matches!(e, egui::Event::PointerGone)),
            i.pointer.interact_pos(),
            i.pointer.delta(),
        )
    });

    let mut changed = false;
    if let Some(position) = position {
        let client = to_point(position);
        let movement = Delta::new(f64::from(delta.x), f64::from(delta.y));

        if pressed && canvas.contains(position) {
            let event = PointerEvent {
                client,
                movement,
                target: hit_test(board, &layout, client),
            };
            board.pointer_down(&event);
        } else if let Some((id, _)) = board.active_gesture()
            && down
            && !gone
            && movement != Delta::default()
        {
            let event = PointerEvent {
                client,
                movement,
                target: PointerTarget::Body(id),
            };
            changed = board.pointer_move(&event, &layout).is_some();
        }
    }

    // egui never sees a release outside the window, so leaving it ends the gesture
    if board.active_gesture().is_some() && (released || gone || !down) {
        board.pointer_up();
    }
    changed
}
