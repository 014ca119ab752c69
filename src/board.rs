//! Widget lifecycle controller
//!
//! A `Board` owns the dashboard document and everything attached to its
//! widgets: selection, the drag controller and one poller per configured
//! check widget. Pollers are started, restarted and cancelled here as the
//! document changes; dropping the board tears all of them down.

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::alert::SoundSet;
use crate::check_state::CheckState;
use crate::dashboard::{CheckOptions, Dashboard, Element, ElementKind, Options};
use crate::drag::{CanvasLayout, DragController, Gesture, PointerEvent, PointerTarget};
use crate::poller::{PollEvent, PollJob, PollerDeps, PollerHandle, spawn_poller};
use crate::types::{CheckTarget, WidgetId};

/// Last state reported by a widget's poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetStatus {
    pub state: CheckState,
    pub acknowledged: bool,
}

/// Runtime and collaborators used to start pollers
#[derive(Clone)]
pub struct PollingContext {
    pub runtime: Handle,
    pub deps: PollerDeps,
}

#[derive(Debug)]
struct Widget {
    id: WidgetId,
    poller: Option<PollerHandle>,
    status: Option<WidgetStatus>,
}

impl Widget {
    fn stop_polling(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.cancel();
        }
        self.status = None;
    }
}

pub struct Board {
    dashboard: Dashboard,
    // Parallel to dashboard.elements
    widgets: Vec<Widget>,
    next_id: u64,
    selected: Option<WidgetId>,
    drag: DragController,
    polling: Option<PollingContext>,
}

impl Board {
    /// Build the board and start polling every configured check widget
    pub fn new(dashboard: Dashboard, polling: Option<PollingContext>) -> Self {
        let mut board = Self {
            dashboard,
            widgets: Vec::new(),
            next_id: 0,
            selected: None,
            drag: DragController::new(),
            polling,
        };
        for index in 0..board.dashboard.elements.len() {
            let widget = board.mount_widget();
            board.widgets.push(widget);
            board.sync_poller(index);
        }
        info!(
            slug = %board.dashboard.slug,
            widgets = board.widgets.len(),
            polling = board.polling_count(),
            "Board mounted"
        );
        board
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    /// The server derives a new slug from the title on the next save
    pub fn set_title(&mut self, title: &str) -> bool {
        if self.dashboard.title == title {
            return false;
        }
        self.dashboard.title = title.to_string();
        true
    }

    pub fn set_background(&mut self, url: &str) -> bool {
        if self.dashboard.background == url {
            return false;
        }
        self.dashboard.background = url.to_string();
        true
    }

    /// Adopt the slug the server stored the dashboard under
    pub fn set_slug(&mut self, slug: &str) {
        if self.dashboard.slug == slug {
            return;
        }
        info!(from = %self.dashboard.slug, to = %slug, "Dashboard renamed");
        self.dashboard.slug = slug.to_string();
        for poller in self.widgets.iter().filter_map(|w| w.poller.as_ref()) {
            poller.set_dashboard(slug);
        }
    }

    pub fn set_global_mute(&mut self, muted: bool) {
        self.dashboard.global_mute = muted;
    }

    pub fn widget_ids(&self) -> Vec<WidgetId> {
        self.widgets.iter().map(|w| w.id).collect()
    }

    pub fn element(&self, id: WidgetId) -> Option<&Element> {
        self.index_of(id).map(|index| &self.dashboard.elements[index])
    }

    pub fn status(&self, id: WidgetId) -> Option<WidgetStatus> {
        self.index_of(id).and_then(|index| self.widgets[index].status)
    }

    #[cfg(test)]
    pub fn is_polling(&self, id: WidgetId) -> bool {
        self.index_of(id)
            .is_some_and(|index| self.widgets[index].poller.is_some())
    }

    pub fn polling_count(&self) -> usize {
        self.widgets.iter().filter(|w| w.poller.is_some()).count()
    }

    pub fn selected(&self) -> Option<WidgetId> {
        self.selected
    }

    pub fn active_gesture(&self) -> Option<(WidgetId, Gesture)> {
        self.drag.active()
    }

    #[cfg(test)]
    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    /// Change selection; ignored while a gesture is running
    pub fn select(&mut self, id: Option<WidgetId>) {
        if self.drag.is_dragging() {
            return;
        }
        self.selected = id.filter(|id| self.index_of(*id).is_some());
    }

    fn index_of(&self, id: WidgetId) -> Option<usize> {
        self.widgets.iter().position(|w| w.id == id)
    }

    fn mount_widget(&mut self) -> Widget {
        let id = WidgetId(self.next_id);
        self.next_id += 1;
        Widget {
            id,
            poller: None,
            status: None,
        }
    }

    /// Bring the widget's poller in line with its element's options
    ///
    /// Same target: the poller keeps running and only picks up the new sound
    /// policy. Different or missing target: the old poller and its alert
    /// memory are discarded.
    fn sync_poller(&mut self, index: usize) {
        let element = &self.dashboard.elements[index];
        let options = element.check_options();
        let target = options.as_ref().and_then(CheckOptions::target);
        let widget = &mut self.widgets[index];

        match (&widget.poller, &target, &options) {
            (Some(poller), Some(target), Some(options)) if poller.target() == target => {
                poller.update_policy(options.policy());
                return;
            }
            (None, None, _) => return,
            _ => {}
        }

        widget.stop_polling();
        let (Some(target), Some(options), Some(polling)) = (target, options, self.polling.as_ref()) else {
            return;
        };

        let job = PollJob {
            widget: widget.id,
            dashboard: self.dashboard.slug.clone(),
            target,
            policy: options.policy(),
        };
        widget.poller = Some(spawn_poller(&polling.runtime, polling.deps.clone(), job));
    }

    /// Record a poller notification; returns the failure message, if any
    ///
    /// Events from widgets that are gone, unbound or retargeted since are
    /// dropped: only the poller currently attached to the widget counts.
    pub fn apply_event(&mut self, event: PollEvent) -> Option<String> {
        let (widget, poller) = event.origin();
        let Some(current) = self
            .widgets
            .iter_mut()
            .find(|w| w.id == widget && w.poller.as_ref().is_some_and(|p| p.id() == poller))
        else {
            debug!(%widget, %poller, "Dropping event from a stale poller");
            return None;
        };

        match event {
            PollEvent::State { state, acknowledged, .. } => {
                current.status = Some(WidgetStatus { state, acknowledged });
                None
            }
            PollEvent::FetchFailed { message, .. } => Some(message),
        }
    }

    /// Pointer press on the canvas
    ///
    /// Pressing an unselected widget selects it; pressing the canvas clears
    /// the selection. Only a press on the selected widget starts a gesture.
    pub fn pointer_down(&mut self, event: &PointerEvent) -> Option<Gesture> {
        if self.drag.is_dragging() {
            return None;
        }
        match event.target {
            PointerTarget::Canvas => {
                self.selected = None;
                None
            }
            PointerTarget::Body(id) if self.selected != Some(id) => {
                self.select(Some(id));
                None
            }
            _ => self.drag.pointer_down(event, self.selected),
        }
    }

    /// Commit the running gesture's geometry; returns the updated widget
    pub fn pointer_move(&mut self, event: &PointerEvent, layout: &CanvasLayout) -> Option<WidgetId> {
        let (id, _) = self.drag.active()?;
        let Some(index) = self.index_of(id) else {
            self.drag.cancel();
            return None;
        };
        let element = &mut self.dashboard.elements[index];
        let geometry = self.drag.pointer_move(event, layout, element.geometry())?;
        element.set_geometry(geometry);
        Some(id)
    }

    pub fn pointer_up(&mut self) -> Option<WidgetId> {
        self.drag.pointer_up()
    }

    /// Append the default element and select it
    pub fn add_element(&mut self) -> WidgetId {
        let index = self.dashboard.add_element();
        let widget = self.mount_widget();
        let id = widget.id;
        self.widgets.push(widget);
        self.sync_poller(index);
        self.select(Some(id));
        id
    }

    pub fn delete_element(&mut self, id: WidgetId) -> Option<Element> {
        let index = self.index_of(id)?;
        if self.drag.active().is_some_and(|(widget, _)| widget == id) {
            self.drag.cancel();
        }
        if self.selected == Some(id) {
            self.selected = None;
        }
        let mut widget = self.widgets.remove(index);
        widget.stop_polling();
        debug!(widget = %id, "Widget unmounted");
        self.dashboard.delete_element(index)
    }

    /// Copy a widget; the copy gets its own poller and alert memory
    pub fn duplicate_element(&mut self, id: WidgetId) -> Option<WidgetId> {
        let index = self.index_of(id)?;
        let copy_index = self.dashboard.duplicate_element(index)?;
        let widget = self.mount_widget();
        let copy = widget.id;
        self.widgets.push(widget);
        self.sync_poller(copy_index);
        Some(copy)
    }

    pub fn reorder_element(&mut self, id: WidgetId, destination: usize) -> bool {
        let Some(source) = self.index_of(id) else {
            return false;
        };
        if !self.dashboard.reorder_elements(source, destination) {
            return false;
        }
        let widget = self.widgets.remove(source);
        self.widgets.insert(destination, widget);
        true
    }

    pub fn retitle_element(&mut self, id: WidgetId, title: &str) -> bool {
        self.index_of(id)
            .is_some_and(|index| self.dashboard.retitle_element(index, title))
    }

    pub fn change_kind(&mut self, id: WidgetId, kind: ElementKind) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        if self.drag.active().is_some_and(|(widget, _)| widget == id) {
            self.drag.cancel();
        }
        self.dashboard.change_element_kind(index, kind);
        self.sync_poller(index);
        true
    }

    /// Merge option changes and resync the poller
    pub fn update_options(&mut self, id: WidgetId, update: Options) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.dashboard.elements[index].update_options(update);
        self.sync_poller(index);
        true
    }

    /// Bind a check widget to a new target, or unbind it with None
    pub fn set_target(&mut self, id: WidgetId, target: Option<CheckTarget>) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let element = &mut self.dashboard.elements[index];
        let Some(mut options) = element.check_options() else {
            return false;
        };
        options.object_type = target.as_ref().map(|t| t.object_type.to_string());
        options.filter = target.map(|t| t.filter);

        let mut update = Options::new();
        options.apply_to(&mut update);
        if options.object_type.is_none() {
            element.options.remove("objectType");
            element.options.remove("filter");
        }
        element.update_options(update);
        self.sync_poller(index);
        true
    }

    /// Set or clear (empty `url`) a check widget's sound for one severity
    pub fn set_sound_override(&mut self, id: WidgetId, state: CheckState, url: &str) -> bool {
        if self.element(id).and_then(Element::check_options).is_none() {
            return false;
        }
        let mut update = Options::new();
        update.insert(SoundSet::option_key(state).to_string(), url.into());
        self.update_options(id, update)
    }

    /// Cancel every poller and wait for their tasks to exit
    pub async fn shutdown(&mut self) {
        self.drag.cancel();
        let pollers: Vec<PollerHandle> = self
            .widgets
            .iter_mut()
            .filter_map(|w| {
                w.status = None;
                w.poller.take()
            })
            .collect();
        let stopped = pollers.len();
        for poller in pollers {
            if let Err(err) = poller.shutdown().await {
                warn!(error = ?err, "Poller did not stop cleanly");
            }
        }
        info!(slug = %self.dashboard.slug, stopped, "Board shut down");
    }

    /// Cancel every poller and any running gesture; safe to call repeatedly
    pub fn unmount(&mut self) {
        self.drag.cancel();
        let mut cancelled = 0;
        for widget in &mut self.widgets {
            if widget.poller.is_some() {
                cancelled += 1;
            }
            widget.stop_polling();
        }
        if cancelled > 0 {
            info!(slug = %self.dashboard.slug, cancelled, "Board unmounted");
        }
    }
}

impl Drop for Board {
    fn drop(&mut self) {
        self.unmount();
    }
}
