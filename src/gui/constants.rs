//! GUI-specific constants for layout, state colors and intervals

use egui;

/// Board window bounds
pub const WINDOW_MIN_WIDTH: f32 = 640.0;
pub const WINDOW_MIN_HEIGHT: f32 = 400.0;

/// Layout spacing
pub const PADDING: f32 = 8.0;
pub const SECTION_SPACING: f32 = 15.0;
pub const ITEM_SPACING: f32 = 8.0;
pub const ELEMENT_PANEL_WIDTH: f32 = 280.0;

/// Check state colors
pub const STATE_OK: egui::Color32 = egui::Color32::from_rgb(14, 225, 106);
pub const STATE_WARNING: egui::Color32 = egui::Color32::from_rgb(255, 144, 0);
pub const STATE_CRITICAL: egui::Color32 = egui::Color32::from_rgb(255, 0, 25);
pub const STATE_UNKNOWN: egui::Color32 = egui::Color32::from_rgb(151, 14, 225);
pub const STATE_PENDING: egui::Color32 = egui::Color32::from_rgb(110, 110, 110);
pub const STATIC_FILL: egui::Color32 = egui::Color32::from_rgb(48, 56, 70);

pub const CANVAS_BACKGROUND: egui::Color32 = egui::Color32::from_rgb(20, 22, 28);
pub const LABEL_COLOR: egui::Color32 = egui::Color32::WHITE;
pub const SELECTION_COLOR: egui::Color32 = egui::Color32::from_rgb(80, 160, 255);

/// Status line colors
pub const STATUS_OK: egui::Color32 = egui::Color32::from_rgb(0, 200, 0);
pub const STATUS_ERROR: egui::Color32 = egui::Color32::from_rgb(200, 0, 0);

/// Grabbers drawn on the selected widget
pub const GRABBER_RADIUS: f32 = 7.0;

pub const LABEL_FONT_SIZE: f32 = 14.0;

/// How long a fetch failure stays on screen
pub const FAILURE_FLASH_SECS: u64 = 5;

/// Repaint cadence so poll results show up without input
pub const REPAINT_INTERVAL_MS: u64 = 250;
