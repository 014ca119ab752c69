//! Element list and per-element settings shown next to the canvas in edit mode

use std::path::PathBuf;

use eframe::egui;
use serde_json::json;

use super::constants::*;
use crate::board::Board;
use crate::check_state::CheckState;
use crate::dashboard::{Dashboard, ElementKind, Options};
use crate::types::{CheckTarget, ObjectType, WidgetId};

/// Where an uploaded file's URL ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    Background,
    Sound { widget: WidgetId, state: CheckState },
}

impl UploadTarget {
    /// Store the served URL; false if the widget is gone or no longer a check
    pub fn apply(&self, board: &mut Board, url: &str) -> bool {
        match *self {
            UploadTarget::Background => board.set_background(url),
            UploadTarget::Sound { widget, state } => board.set_sound_override(widget, state, url),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub target: UploadTarget,
}

#[derive(Debug, Default)]
pub struct PanelOutput {
    pub changed: bool,
    pub upload: Option<UploadRequest>,
}

/// Edit buffers for the dashboard and the selected element
///
/// Text fields are applied on demand so a half-typed filter does not
/// restart the poller on every keystroke.
pub struct ElementPanelState {
    dashboard_title: String,
    background: String,
    upload_path: String,
    editing: Option<WidgetId>,
    title: String,
    object_type: ObjectType,
    filter: String,
}

impl ElementPanelState {
    pub fn new(dashboard: &Dashboard) -> Self {
        let mut state = Self {
            dashboard_title: String::new(),
            background: String::new(),
            upload_path: String::new(),
            editing: None,
            title: String::new(),
            object_type: ObjectType::Service,
            filter: String::new(),
        };
        state.refresh_dashboard(dashboard);
        state
    }

    /// Reload the dashboard fields after the document changed underneath
    pub fn refresh_dashboard(&mut self, dashboard: &Dashboard) {
        self.dashboard_title = dashboard.title.clone();
        self.background = dashboard.background.clone();
    }

    fn upload(&self, target: UploadTarget) -> Option<UploadRequest> {
        let path = self.upload_path.trim();
        (!path.is_empty()).then(|| UploadRequest {
            path: PathBuf::from(path),
            target,
        })
    }

    fn load(&mut self, board: &Board, id: Option<WidgetId>) {
        self.editing = id;
        let Some(element) = id.and_then(|id| board.element(id)) else {
            return;
        };
        self.title = element.title.clone();
        let check = element.check_options().unwrap_or_default();
        self.object_type = check
            .object_type
            .as_deref()
            .and_then(ObjectType::parse)
            .unwrap_or(ObjectType::Service);
        self.filter = check.filter.unwrap_or_default();
    }
}

pub fn ui(ui: &mut egui::Ui, board: &mut Board, state: &mut ElementPanelState) -> PanelOutput {
    let mut output = PanelOutput::default();
    if state.editing != board.selected() {
        state.load(board, board.selected());
    }

    dashboard_settings(ui, board, state, &mut output);

    ui.add_space(SECTION_SPACING);
    output.changed |= element_list(ui, board);

    if let Some(id) = board.selected() {
        ui.add_space(SECTION_SPACING);
        element_settings(ui, board, state, id, &mut output);
    }
    output
}

fn dashboard_settings(ui: &mut egui::Ui, board: &mut Board, state: &mut ElementPanelState, output: &mut PanelOutput) {
    ui.group(|ui| {
        ui.label(egui::RichText::new("Dashboard").strong());
        ui.add_space(ITEM_SPACING);

        ui.horizontal(|ui| {
            ui.label("Title:");
            if ui.text_edit_singleline(&mut state.dashboard_title).lost_focus() {
                let title = state.dashboard_title.trim().to_string();
                if title.is_empty() {
                    state.dashboard_title = board.dashboard().title.clone();
                } else {
                    output.changed |= board.set_title(&title);
                }
            }
        });
        ui.horizontal(|ui| {
            ui.label("Background:");
            if ui.text_edit_singleline(&mut state.background).lost_focus() {
                output.changed |= board.set_background(state.background.trim());
            }
            if ui.small_button("Upload").clicked() {
                output.upload = state.upload(UploadTarget::Background);
            }
        });
        ui.horizontal(|ui| {
            ui.label("File to upload:");
            ui.text_edit_singleline(&mut state.upload_path);
        });

        let mut muted = board.dashboard().global_mute;
        if ui.checkbox(&mut muted, "Mute all alerts").changed() {
            board.set_global_mute(muted);
            output.changed = true;
        }
    });
}

fn element_list(ui: &mut egui::Ui, board: &mut Board) -> bool {
    let mut changed = false;
    let ids = board.widget_ids();

    ui.group(|ui| {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("Elements").strong());
            if ui.button("New").clicked() {
                board.add_element();
                changed = true;
            }
        });
        ui.add_space(ITEM_SPACING);

        if ids.is_empty() {
            ui.label("No elements added");
            return;
        }

        for (index, id) in ids.iter().copied().enumerate() {
            let title = board.element(id).map(|e| e.title.clone()).unwrap_or_default();
            ui.horizontal(|ui| {
                if ui.selectable_label(board.selected() == Some(id), title).clicked() {
                    board.select(Some(id));
                }
                if ui.small_button("\u{2191}").clicked() && index > 0 {
                    changed |= board.reorder_element(id, index - 1);
                }
                if ui.small_button("\u{2193}").clicked() {
                    changed |= board.reorder_element(id, index + 1);
                }
                if ui.small_button("Duplicate").clicked() {
                    changed |= board.duplicate_element(id).is_some();
                }
                if ui.small_button("Delete").clicked() {
                    changed |= board.delete_element(id).is_some();
                }
            });
        }
    });
    changed
}

fn element_settings(
    ui: &mut egui::Ui,
    board: &mut Board,
    state: &mut ElementPanelState,
    id: WidgetId,
    output: &mut PanelOutput,
) {
    let Some(element) = board.element(id) else {
        return;
    };
    let mut kind = element.kind;
    let check = element.check_options();
    let mut changed = false;

    ui.group(|ui| {
        ui.label(egui::RichText::new("Element").strong());
        ui.add_space(ITEM_SPACING);

        ui.horizontal(|ui| {
            ui.label("Name:");
            let response = ui.text_edit_singleline(&mut state.title);
            if response.lost_focus() {
                changed |= board.retitle_element(id, &state.title);
            }
        });

        egui::ComboBox::from_label("Element type")
            .selected_text(kind.display_name())
            .show_ui(ui, |ui| {
                for candidate in ElementKind::ALL {
                    ui.selectable_value(&mut kind, candidate, candidate.display_name());
                }
            });
        if Some(kind) != board.element(id).map(|e| e.kind) {
            changed |= board.change_kind(id, kind);
            state.load(board, Some(id));
        }

        let Some(check) = check.filter(|_| kind.polls_check()) else {
            return;
        };
        ui.separator();

        egui::ComboBox::from_label("Object type")
            .selected_text(state.object_type.as_str())
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut state.object_type, ObjectType::Service, "service");
                ui.selectable_value(&mut state.object_type, ObjectType::Host, "host");
            });
        ui.horizontal(|ui| {
            ui.label("Filter:");
            ui.text_edit_singleline(&mut state.filter);
        });
        if ui.button("Apply check").clicked() {
            let target = CheckTarget::new(state.object_type, state.filter.clone());
            changed |= board.set_target(id, target);
        }

        let mut muted = check.mute_alerts;
        if ui.checkbox(&mut muted, "Mute alerts").changed() {
            let update: Options = match json!({ "muteAlerts": muted }) {
                serde_json::Value::Object(map) => map,
                _ => Options::new(),
            };
            changed |= board.update_options(id, update);
        }

        ui.add_space(ITEM_SPACING);
        ui.label("Alert sounds:");
        for severity in CheckState::severities(state.object_type) {
            let current = check.sounds.get(*severity).map(str::to_string);
            ui.horizontal(|ui| {
                ui.label(format!("{severity}:"));
                ui.label(current.as_deref().unwrap_or("default"));
                if ui.small_button("Upload").clicked() {
                    output.upload = state.upload(UploadTarget::Sound { widget: id, state: *severity });
                }
                if ui
                    .add_enabled(current.is_some(), egui::Button::new("default").small())
                    .clicked()
                {
                    changed |= board.set_sound_override(id, *severity, "");
                }
            });
        }
    });
    output.changed |= changed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::Element;

    fn check_card() -> Element {
        let mut element = Element::default();
        element.change_kind(ElementKind::CheckCard);
        element
    }

    #[test]
    fn test_upload_targets() {
        let mut board = Board::new(
            Dashboard {
                elements: vec![check_card()],
                ..Dashboard::default()
            },
            None,
        );
        let id = board.widget_ids()[0];

        assert!(UploadTarget::Background.apply(&mut board, "/dashboards-data/floor.png"));
        assert_eq!(board.dashboard().background, "/dashboards-data/floor.png");

        let sound = UploadTarget::Sound { widget: id, state: CheckState::Warning };
        assert!(sound.apply(&mut board, "/dashboards-data/horn.mp3"));
        let check = board.element(id).unwrap().check_options().unwrap();
        assert_eq!(check.sounds.get(CheckState::Warning), Some("/dashboards-data/horn.mp3"));

        // Widget deleted while the upload was running
        board.delete_element(id);
        assert!(!sound.apply(&mut board, "/dashboards-data/horn.mp3"));
    }

    #[test]
    fn test_upload_needs_a_path() {
        let mut state = ElementPanelState::new(&Dashboard::new("NOC"));
        assert_eq!(state.dashboard_title, "NOC");
        assert_eq!(state.upload(UploadTarget::Background), None);

        state.upload_path = " /tmp/floor.png ".to_string();
        assert_eq!(
            state.upload(UploadTarget::Background),
            Some(UploadRequest {
                path: PathBuf::from("/tmp/floor.png"),
                target: UploadTarget::Background,
            })
        );
    }
}
