//! Dashboard document and element list editing

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::alert::{DashboardAlertConfig, SoundPolicy, SoundSet};
use crate::constants::dashboard::{DEFAULT_ASPECT, TICKER_H, TICKER_Y};
use crate::types::{CheckTarget, ObjectType, Rect, Rotation, WidgetGeometry};

pub type Options = Map<String, Value>;

/// A whole board as stored by the dashboard server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub background: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub width: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub height: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub global_mute: bool,
    #[serde(flatten)]
    pub sounds: SoundSet,
}

/// One widget placed on the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Options,
    #[serde(default)]
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    CheckCard,
    CheckSvg,
    CheckImage,
    CheckLine,
    StaticText,
    StaticSvg,
    Image,
    StaticTicker,
    Video,
    Audio,
    Clock,
    ObjectCard,
}

impl ElementKind {
    pub const ALL: [ElementKind; 12] = [
        ElementKind::CheckCard,
        ElementKind::CheckSvg,
        ElementKind::CheckImage,
        ElementKind::CheckLine,
        ElementKind::StaticText,
        ElementKind::StaticSvg,
        ElementKind::Image,
        ElementKind::StaticTicker,
        ElementKind::Video,
        ElementKind::Audio,
        ElementKind::Clock,
        ElementKind::ObjectCard,
    ];

    /// Bound to a check target and driven by a poller
    pub fn polls_check(&self) -> bool {
        matches!(
            self,
            ElementKind::CheckCard | ElementKind::CheckSvg | ElementKind::CheckImage | ElementKind::CheckLine
        )
    }

    /// Full-width strip; only vertical position and height can change
    pub fn is_ticker(&self) -> bool {
        matches!(self, ElementKind::StaticTicker)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ElementKind::CheckCard => "Icinga Card",
            ElementKind::CheckSvg => "Icinga SVG",
            ElementKind::CheckImage => "Icinga Image",
            ElementKind::CheckLine => "Icinga Line",
            ElementKind::StaticText => "Static Text",
            ElementKind::StaticSvg => "Static SVG",
            ElementKind::Image => "Image",
            ElementKind::StaticTicker => "Static Ticker",
            ElementKind::Video => "Video",
            ElementKind::Audio => "Audio",
            ElementKind::Clock => "Clock",
            ElementKind::ObjectCard => "Icinga object (experimental)",
        }
    }

    /// Options a freshly switched element starts with
    pub fn default_options(&self) -> Options {
        let value = match self {
            ElementKind::CheckSvg => json!({
                "okSvg": "check-circle",
                "okStrokeColor": "#0ee16a",
                "warningSvg": "alert-triangle",
                "warningStrokeColor": "#ff9000",
                "unknownSvg": "help-circle",
                "unknownStrokeColor": "#970ee1",
                "criticalSvg": "alert-octagon",
                "criticalStrokeColor": "#ff0019",
                "muteAlerts": false,
            }),
            ElementKind::CheckLine => json!({
                "strokeWidth": 4,
                "muteAlerts": false,
            }),
            ElementKind::StaticText => json!({
                "fontSize": 36,
                "text": "Hello, world!",
                "fontColor": "black",
                "backgroundColor": "white",
            }),
            ElementKind::StaticTicker => json!({
                "fontSize": 32,
                "text": "Hello, world!",
                "fontColor": "white",
                "backgroundColor": "black",
            }),
            ElementKind::StaticSvg => json!({
                "svg": "activity",
                "strokeColor": "#ffffff",
            }),
            _ => json!({}),
        };
        match value {
            Value::Object(map) => map,
            _ => Options::new(),
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl Default for Element {
    fn default() -> Self {
        Self {
            kind: ElementKind::StaticText,
            title: "New element".to_string(),
            rect: Rect::default(),
            options: ElementKind::StaticText.default_options(),
            rotation: 0.0,
        }
    }
}

impl Element {
    pub fn geometry(&self) -> WidgetGeometry {
        WidgetGeometry::new(self.rect, self.rotation, self.kind.is_ticker())
    }

    pub fn set_geometry(&mut self, geometry: WidgetGeometry) {
        self.rect = geometry.rect;
        self.rotation = geometry.rotation;
    }

    /// Switch kind, resetting options to the new kind's defaults
    pub fn change_kind(&mut self, kind: ElementKind) {
        if kind.is_ticker() {
            self.rect = Rect::new(0.0, TICKER_Y, 100.0, TICKER_H);
        }
        self.kind = kind;
        self.options = kind.default_options();
    }

    /// Typed check options; None for kinds that never poll
    pub fn check_options(&self) -> Option<CheckOptions> {
        if !self.kind.polls_check() {
            return None;
        }
        Some(CheckOptions::from_options(&self.options))
    }

    /// Merge `update` into the options map
    pub fn update_options(&mut self, update: Options) {
        for (key, value) in update {
            self.options.insert(key, value);
        }
    }
}

/// Typed view of a check widget's options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default)]
    pub mute_alerts: bool,
    #[serde(flatten)]
    pub sounds: SoundSet,
}

impl CheckOptions {
    pub fn from_options(options: &Options) -> Self {
        match serde_json::from_value(Value::Object(options.clone())) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Malformed check options, treating as unconfigured");
                Self::default()
            }
        }
    }

    /// None until both object type and a non-blank filter are set
    pub fn target(&self) -> Option<CheckTarget> {
        let object_type = ObjectType::parse(self.object_type.as_deref()?)?;
        CheckTarget::new(object_type, self.filter.clone()?)
    }

    pub fn policy(&self) -> SoundPolicy {
        SoundPolicy {
            muted: self.mute_alerts,
            overrides: self.sounds.clone(),
        }
    }

    /// Write the typed fields back into an options map, keeping unrelated keys
    pub fn apply_to(&self, options: &mut Options) {
        if let Ok(Value::Object(map)) = serde_json::to_value(self) {
            for (key, value) in map {
                options.insert(key, value);
            }
        }
    }
}

impl Dashboard {
    /// Empty board with the bundled sounds, muted until someone opts in
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            slug: title_to_slug(title),
            global_mute: true,
            sounds: SoundSet::bundled(),
            ..Self::default()
        }
    }

    pub fn alert_config(&self) -> DashboardAlertConfig {
        DashboardAlertConfig {
            global_mute: self.global_mute,
            default_sounds: self.sounds.clone(),
        }
    }

    /// Width over height of the background; 16:9 when unknown
    pub fn aspect_ratio(&self) -> f32 {
        let width = self.width.trim().parse::<f32>().ok();
        let height = self.height.trim().parse::<f32>().ok();
        match (width, height) {
            (Some(w), Some(h)) if w > 0.0 && h > 0.0 && w.is_finite() && h.is_finite() => w / h,
            _ => DEFAULT_ASPECT,
        }
    }

    /// Append the default element; returns its index
    pub fn add_element(&mut self) -> usize {
        self.elements.push(Element::default());
        self.elements.len() - 1
    }

    pub fn delete_element(&mut self, index: usize) -> Option<Element> {
        if index >= self.elements.len() {
            return None;
        }
        Some(self.elements.remove(index))
    }

    /// Append a copy of the element at `index`; returns the copy's index
    pub fn duplicate_element(&mut self, index: usize) -> Option<usize> {
        let copy = self.elements.get(index)?.clone();
        self.elements.push(copy);
        Some(self.elements.len() - 1)
    }

    /// Move the element at `source` so it ends up at `destination`
    pub fn reorder_elements(&mut self, source: usize, destination: usize) -> bool {
        let len = self.elements.len();
        if source >= len || destination >= len {
            debug!(source, destination, len, "Ignoring out of range reorder");
            return false;
        }
        let element = self.elements.remove(source);
        self.elements.insert(destination, element);
        true
    }

    pub fn retitle_element(&mut self, index: usize, title: &str) -> bool {
        match self.elements.get_mut(index) {
            Some(element) => {
                element.title = title.to_string();
                true
            }
            None => false,
        }
    }

    pub fn change_element_kind(&mut self, index: usize, kind: ElementKind) -> bool {
        match self.elements.get_mut(index) {
            Some(element) => {
                element.change_kind(kind);
                true
            }
            None => false,
        }
    }
}

/// Lowercase, spaces and underscores to dashes, drop anything else
pub fn title_to_slug(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            '_' => Some('-'),
            c if c.is_whitespace() => Some('-'),
            c if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' => Some(c),
            _ => None,
        })
        .collect()
}

/// Dashboards whose title contains `filter`, ignoring case; all of them for a blank filter
pub fn filter_by_title<'a>(dashboards: &'a [Dashboard], filter: &str) -> Vec<&'a Dashboard> {
    let needle = filter.trim().to_lowercase();
    dashboards
        .iter()
        .filter(|dashboard| needle.is_empty() || dashboard.title.to_lowercase().contains(&needle))
        .collect()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Background dimensions are strings on the server but numbers in older boards
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check_state::CheckState;

    const BOARD: &str = r##"{
        "title": "NOC Overview",
        "slug": "noc-overview",
        "background": "/dashboards-background/map.png",
        "width": "1920",
        "height": "1080",
        "tags": null,
        "globalMute": false,
        "criticalSound": "/dashboards-data/critical.mp3",
        "elements": [
            {
                "type": "check-card",
                "title": "Web",
                "rect": {"x": 10, "y": 20, "w": 30, "h": 12},
                "options": {"objectType": "service", "filter": "service.name==\"http\"", "muteAlerts": true, "criticalSound": "/uploads/siren.mp3", "fontSize": 22},
                "rotation": 0.5
            },
            {
                "type": "static-text",
                "title": "Label",
                "rect": {"x": 0, "y": 0, "w": 30, "h": 12},
                "options": null
            }
        ]
    }"##;

    #[test]
    fn test_parse_server_document() {
        let dashboard: Dashboard = serde_json::from_str(BOARD).unwrap();
        assert_eq!(dashboard.slug, "noc-overview");
        assert!(dashboard.tags.is_empty());
        assert_eq!(dashboard.elements.len(), 2);
        assert_eq!(dashboard.elements[0].kind, ElementKind::CheckCard);
        assert_eq!(dashboard.elements[0].rotation, 0.5);
        assert!(dashboard.elements[1].options.is_empty());
        assert_eq!(dashboard.aspect_ratio(), 1920.0 / 1080.0);

        let config = dashboard.alert_config();
        assert!(!config.global_mute);
        assert_eq!(config.default_sounds.get(CheckState::Critical), Some("/dashboards-data/critical.mp3"));
        assert_eq!(config.default_sounds.get(CheckState::Ok), None);
    }

    #[test]
    fn test_round_trip_keeps_wire_names() {
        let dashboard: Dashboard = serde_json::from_str(BOARD).unwrap();
        let value = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(value["globalMute"], json!(false));
        assert_eq!(value["elements"][0]["type"], json!("check-card"));
        assert_eq!(value["elements"][0]["options"]["fontSize"], json!(22));
        assert!(value.get("global_mute").is_none());
    }

    #[test]
    fn test_check_options_view() {
        let dashboard: Dashboard = serde_json::from_str(BOARD).unwrap();
        let options = dashboard.elements[0].check_options().unwrap();

        let target = options.target().unwrap();
        assert_eq!(target.object_type, ObjectType::Service);
        assert_eq!(target.filter, "service.name==\"http\"");

        let policy = options.policy();
        assert!(policy.muted);
        assert_eq!(
            policy.sound_for(CheckState::Critical, &dashboard.alert_config()),
            Some("/uploads/siren.mp3")
        );
        assert!(dashboard.elements[1].check_options().is_none());
    }

    #[test]
    fn test_unconfigured_check_has_no_target() {
        let mut element = Element::default();
        element.change_kind(ElementKind::CheckCard);
        assert_eq!(element.check_options().unwrap().target(), None);

        element.update_options(json!({"objectType": "host", "filter": " "}).as_object().unwrap().clone());
        assert_eq!(element.check_options().unwrap().target(), None);

        element.update_options(json!({"objectType": 7}).as_object().unwrap().clone());
        assert_eq!(element.check_options().unwrap(), CheckOptions::default());
    }

    #[test]
    fn test_apply_check_options_keeps_other_keys() {
        let mut options = json!({"fontSize": 22}).as_object().unwrap().clone();
        let check = CheckOptions {
            object_type: Some("host".to_string()),
            filter: Some("host.name==\"db\"".to_string()),
            ..CheckOptions::default()
        };
        check.apply_to(&mut options);
        assert_eq!(options["fontSize"], json!(22));
        assert_eq!(options["objectType"], json!("host"));
        assert_eq!(options["muteAlerts"], json!(false));
    }

    #[test]
    fn test_add_and_duplicate() {
        let mut dashboard = Dashboard::new("Ops");
        let index = dashboard.add_element();
        let element = &dashboard.elements[index];
        assert_eq!(element.kind, ElementKind::StaticText);
        assert_eq!(element.rect, Rect::new(0.0, 0.0, 30.0, 12.0));
        assert_eq!(element.options["text"], json!("Hello, world!"));

        dashboard.retitle_element(index, "Banner");
        let copy = dashboard.duplicate_element(index).unwrap();
        assert_eq!(copy, 1);
        assert_eq!(dashboard.elements[copy].title, "Banner");
        assert_eq!(dashboard.duplicate_element(9), None);
    }

    #[test]
    fn test_delete_and_reorder() {
        let mut dashboard = Dashboard::default();
        for title in ["a", "b", "c"] {
            let index = dashboard.add_element();
            dashboard.retitle_element(index, title);
        }

        assert!(dashboard.reorder_elements(0, 2));
        let titles: Vec<_> = dashboard.elements.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c", "a"]);

        assert!(!dashboard.reorder_elements(0, 3));
        assert_eq!(dashboard.delete_element(1).map(|e| e.title), Some("c".to_string()));
        assert!(dashboard.delete_element(5).is_none());
        assert_eq!(dashboard.elements.len(), 2);
    }

    #[test]
    fn test_switch_to_ticker_resets_rect_and_options() {
        let mut dashboard = Dashboard::default();
        let index = dashboard.add_element();
        assert!(dashboard.change_element_kind(index, ElementKind::StaticTicker));

        let element = &dashboard.elements[index];
        assert_eq!(element.rect, Rect::new(0.0, 82.84371327849588, 100.0, 16.0));
        assert!(element.geometry().is_ticker);
        assert_eq!(element.options, ElementKind::StaticTicker.default_options());

        assert!(dashboard.change_element_kind(index, ElementKind::CheckSvg));
        let element = &dashboard.elements[index];
        assert_eq!(element.rect, Rect::new(0.0, 82.84371327849588, 100.0, 16.0));
        assert_eq!(element.options["okSvg"], json!("check-circle"));
        assert_eq!(element.options["criticalStrokeColor"], json!("#ff0019"));
    }

    #[test]
    fn test_new_dashboard_defaults() {
        let dashboard = Dashboard::new("Core Network_Status!");
        assert_eq!(dashboard.slug, "core-network-status");
        assert!(dashboard.global_mute);
        assert_eq!(dashboard.sounds, SoundSet::bundled());
        assert_eq!(dashboard.aspect_ratio(), DEFAULT_ASPECT);
    }

    #[test]
    fn test_numeric_dimensions() {
        let dashboard: Dashboard = serde_json::from_str(r#"{"width": 800, "height": 600}"#).unwrap();
        assert_eq!(dashboard.width, "800");
        assert_eq!(dashboard.aspect_ratio(), 800.0 / 600.0);
    }

    #[test]
    fn test_title_filter() {
        let boards = vec![Dashboard::new("Core Network"), Dashboard::new("NOC floor"), Dashboard::new("Storage")];
        let titles = |filter: &str| -> Vec<String> {
            filter_by_title(&boards, filter).into_iter().map(|d| d.title.clone()).collect()
        };

        assert_eq!(titles("net"), vec!["Core Network"]);
        assert_eq!(titles("O"), vec!["Core Network", "NOC floor", "Storage"]);
        assert_eq!(titles("  "), vec!["Core Network", "NOC floor", "Storage"]);
        assert!(titles("printers").is_empty());
    }

    #[test]
    fn test_kind_capabilities() {
        let polling: Vec<_> = ElementKind::ALL.iter().filter(|k| k.polls_check()).collect();
        assert_eq!(polling.len(), 4);
        assert!(ElementKind::StaticTicker.is_ticker());
        assert!(!ElementKind::CheckCard.is_ticker());
        assert_eq!(ElementKind::ObjectCard.to_string(), "Icinga object (experimental)");
        let kind: ElementKind = serde_json::from_str("\"static-svg\"").unwrap();
        assert_eq!(kind, ElementKind::StaticSvg);
    }
}
