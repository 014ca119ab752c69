//! Board window implemented with egui/eframe

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use eframe::{NativeOptions, egui};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::canvas;
use super::constants::*;
use super::element_panel::{self, ElementPanelState, UploadRequest, UploadTarget};
use crate::board::{Board, PollingContext};
use crate::client::MeerkatClient;
use crate::config::Settings;
use crate::poller::{PollEvent, PollerDeps};
use crate::sound::SoundPlayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Edit,
    View,
}

struct StatusMessage {
    text: String,
    color: egui::Color32,
}

/// Current-thread tokio runtime driven from a background thread
///
/// Pollers and HTTP requests run here while the UI thread belongs to
/// eframe. Dropping it stops the runtime and joins the thread.
pub struct RuntimeThread {
    handle: Handle,
    stop: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RuntimeThread {
    pub fn start() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build tokio runtime")?;
        let handle = runtime.handle().clone();
        let (stop, stopped) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name("board-runtime".to_string())
            .spawn(move || {
                let _ = runtime.block_on(stopped);
            })
            .context("Failed to spawn runtime thread")?;

        Ok(Self {
            handle,
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Drop for RuntimeThread {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("Runtime thread panicked");
        }
    }
}

struct BoardApp {
    board: Board,
    mode: Mode,
    events: mpsc::UnboundedReceiver<PollEvent>,
    client: MeerkatClient,
    panel: ElementPanelState,
    status_message: Option<StatusMessage>,
    failure: Option<(String, Instant)>,
    pending_save: Option<oneshot::Receiver<Result<String>>>,
    pending_uploads: Vec<(UploadTarget, oneshot::Receiver<Result<String>>)>,
    dirty: bool,
    // Declared last: pollers on the board are cancelled before the runtime stops
    runtime: RuntimeThread,
}

impl BoardApp {
    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let Some(message) = self.board.apply_event(event) {
                self.failure = Some((message, Instant::now()));
            }
        }
        if self
            .failure
            .as_ref()
            .is_some_and(|(_, since)| since.elapsed() >= Duration::from_secs(FAILURE_FLASH_SECS))
        {
            self.failure = None;
        }
    }

    fn start_save(&mut self) {
        if self.pending_save.is_some() {
            return;
        }
        let client = self.client.clone();
        let dashboard = self.board.dashboard().clone();
        let (tx, rx) = oneshot::channel();
        self.runtime.handle().spawn(async move {
            let result = client.save_dashboard(&dashboard.slug, &dashboard).await;
            let _ = tx.send(result);
        });
        self.pending_save = Some(rx);
        self.status_message = Some(StatusMessage {
            text: "Saving...".to_string(),
            color: STATUS_OK,
        });
    }

    fn poll_save(&mut self) {
        let Some(pending) = self.pending_save.as_mut() else {
            return;
        };
        let outcome = match pending.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => Err(anyhow!("save task was dropped")),
        };
        self.pending_save = None;
        self.status_message = Some(match outcome {
            Ok(slug) => {
                self.dirty = false;
                self.board.set_slug(&slug);
                StatusMessage {
                    text: format!("Saved as '{slug}'"),
                    color: STATUS_OK,
                }
            }
            Err(err) => {
                error!(error = ?err, "Failed to save dashboard");
                StatusMessage {
                    text: format!("Save failed: {err:#}"),
                    color: STATUS_ERROR,
                }
            }
        });
    }

    fn start_upload(&mut self, request: UploadRequest) {
        let client = self.client.clone();
        let (tx, rx) = oneshot::channel();
        let path = request.path;
        self.runtime.handle().spawn(async move {
            let _ = tx.send(client.upload_file(&path).await);
        });
        self.pending_uploads.push((request.target, rx));
        self.status_message = Some(StatusMessage {
            text: "Uploading...".to_string(),
            color: STATUS_OK,
        });
    }

    fn poll_uploads(&mut self) {
        let mut finished = Vec::new();
        self.pending_uploads.retain_mut(|(target, rx)| match rx.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => true,
            Ok(outcome) => {
                finished.push((*target, outcome));
                false
            }
            Err(oneshot::error::TryRecvError::Closed) => {
                finished.push((*target, Err(anyhow!("upload task was dropped"))));
                false
            }
        });

        for (target, outcome) in finished {
            self.status_message = Some(match outcome {
                Ok(url) => {
                    if target.apply(&mut self.board, &url) {
                        self.dirty = true;
                    }
                    self.panel.refresh_dashboard(self.board.dashboard());
                    StatusMessage {
                        text: format!("Uploaded {url}"),
                        color: STATUS_OK,
                    }
                }
                Err(err) => {
                    error!(error = ?err, "Upload failed");
                    StatusMessage {
                        text: format!("Upload failed: {err:#}"),
                        color: STATUS_ERROR,
                    }
                }
            });
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading(&self.board.dashboard().title);
            if self.mode == Mode::Edit {
                ui.add_space(SECTION_SPACING);
                let label = if self.dirty { "Save *" } else { "Save" };
                if ui
                    .add_enabled(self.pending_save.is_none(), egui::Button::new(label))
                    .clicked()
                {
                    self.start_save();
                }
            }
            if let Some(message) = &self.status_message {
                ui.colored_label(message.color, &message.text);
            }
        });
        if let Some((message, _)) = &self.failure {
            ui.colored_label(STATUS_ERROR, format!("This dashboard isn't updating: {message}"));
        }
    }
}

impl eframe::App for BoardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.poll_save();
        self.poll_uploads();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_space(PADDING);
            self.toolbar(ui);
            ui.add_space(PADDING);
        });

        if self.mode == Mode::Edit {
            egui::SidePanel::left("elements")
                .default_width(ELEMENT_PANEL_WIDTH)
                .show(ctx, |ui| {
                    let output = egui::ScrollArea::vertical()
                        .show(ui, |ui| element_panel::ui(ui, &mut self.board, &mut self.panel))
                        .inner;
                    self.dirty |= output.changed;
                    if let Some(request) = output.upload {
                        self.start_upload(request);
                    }
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_rect_before_wrap();
            let canvas_rect = canvas::fit_aspect(available, self.board.dashboard().aspect_ratio());
            ui.allocate_rect(canvas_rect, egui::Sense::click_and_drag());

            let editing = self.mode == Mode::Edit;
            if editing && canvas::route_pointer(ctx, &mut self.board, canvas_rect) {
                self.dirty = true;
            }
            canvas::paint(&ui.painter_at(canvas_rect), &self.board, canvas_rect, editing);
        });

        ctx.request_repaint_after(Duration::from_millis(REPAINT_INTERVAL_MS));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if self.dirty {
            warn!(slug = %self.board.dashboard().slug, "Exiting with unsaved changes");
        }
        self.board.unmount();
        info!("Board window exiting");
    }
}

/// Load a dashboard and open it in a window until closed
pub fn run_board(
    settings: &Settings,
    client: MeerkatClient,
    player: Arc<dyn SoundPlayer>,
    slug: &str,
    mode: Mode,
) -> Result<()> {
    let runtime = RuntimeThread::start()?;
    let dashboard = runtime.handle().block_on(client.get_dashboard(slug))?;
    info!(%slug, title = %dashboard.title, ?mode, "Opening dashboard");

    let (tx, events) = mpsc::unbounded_channel();
    let polling = PollingContext {
        runtime: runtime.handle().clone(),
        deps: PollerDeps {
            source: Arc::new(client.clone()),
            player,
            events: tx,
            config: settings.poller_config(),
        },
    };
    let board = Board::new(dashboard, Some(polling));

    let title = format!("{} - wallboard", board.dashboard().title);
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([f32::from(settings.window_width), f32::from(settings.window_height)])
            .with_min_inner_size([WINDOW_MIN_WIDTH, WINDOW_MIN_HEIGHT])
            .with_title(&title),
        ..Default::default()
    };

    let panel = ElementPanelState::new(board.dashboard());
    let app = BoardApp {
        board,
        mode,
        events,
        client,
        panel,
        status_message: None,
        failure: None,
        pending_save: None,
        pending_uploads: Vec::new(),
        dirty: false,
        runtime,
    };

    eframe::run_native("wallboard", options, Box::new(|_cc| Ok(Box::new(app))))
        .map_err(|err| anyhow!("Failed to launch board window: {err}"))
}
