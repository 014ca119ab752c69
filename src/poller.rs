//! Fixed-interval check polling, one task per widget
//!
//! The task owns the widget's [`AlertMachine`]; nothing else touches it.
//! Cancelling the handle stops the loop before the next state is applied,
//! so a torn-down widget never triggers another alert.

use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alert::{AlertMachine, DashboardAlertConfig, SoundPolicy};
use crate::check_state::{self, CheckState};
use crate::constants::polling::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_INTERVAL_SECS};
use crate::sound::SoundPlayer;
use crate::source::{FetchError, MonitoringSource, ObjectState};
use crate::types::{CheckTarget, WidgetId};

static NEXT_POLLER_ID: AtomicU64 = AtomicU64::new(0);

/// Identifies one spawned poll task; a respawn for a new target gets a new id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollerId(u64);

impl PollerId {
    fn next() -> Self {
        Self(NEXT_POLLER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PollerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poller-{}", self.0)
    }
}

/// Outcome of one poll tick, delivered to whoever renders the board
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    State {
        widget: WidgetId,
        poller: PollerId,
        state: CheckState,
        acknowledged: bool,
    },
    /// Non-fatal; the next tick retries
    FetchFailed {
        widget: WidgetId,
        poller: PollerId,
        message: String,
    },
}

impl PollEvent {
    /// Widget and poll task that produced the event
    pub fn origin(&self) -> (WidgetId, PollerId) {
        match self {
            PollEvent::State { widget, poller, .. } | PollEvent::FetchFailed { widget, poller, .. } => {
                (*widget, *poller)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

/// Shared collaborators handed to every poller
#[derive(Clone)]
pub struct PollerDeps {
    pub source: Arc<dyn MonitoringSource>,
    pub player: Arc<dyn SoundPlayer>,
    pub events: UnboundedSender<PollEvent>,
    pub config: PollerConfig,
}

/// What one widget polls
#[derive(Debug, Clone)]
pub struct PollJob {
    pub widget: WidgetId,
    /// Initial slug; see [`PollerHandle::set_dashboard`]
    pub dashboard: String,
    pub target: CheckTarget,
    /// Initial policy; see [`PollerHandle::update_policy`]
    pub policy: SoundPolicy,
}

/// Owner of a running poll task; cancels it when dropped
#[derive(Debug)]
pub struct PollerHandle {
    id: PollerId,
    widget: WidgetId,
    target: CheckTarget,
    policy: watch::Sender<SoundPolicy>,
    dashboard: watch::Sender<String>,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn id(&self) -> PollerId {
        self.id
    }

    pub fn target(&self) -> &CheckTarget {
        &self.target
    }

    /// Takes effect on the next tick without touching alert memory
    pub fn update_policy(&self, policy: SoundPolicy) {
        self.policy.send_if_modified(|current| {
            if *current == policy {
                return false;
            }
            *current = policy;
            true
        });
    }

    /// Follow a dashboard rename; alert memory is kept
    pub fn set_dashboard(&self, slug: &str) {
        self.dashboard.send_if_modified(|current| {
            if current.as_str() == slug {
                return false;
            }
            *current = slug.to_string();
            true
        });
    }

    #[cfg(test)]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Stop polling; calling it again is a no-op
    pub fn cancel(&mut self) {
        if !self.cancel_token.is_cancelled() {
            debug!(widget = %self.widget, check = %self.target, "Cancelling poller");
        }
        self.cancel_token.cancel();
    }

    /// Cancel and wait for the task to exit
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel();
        match self.task.take() {
            Some(task) => task.await.context("poller task failed to join"),
            None => Ok(()),
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Poll immediately, then every `deps.config.interval`
pub fn spawn_poller(runtime: &Handle, deps: PollerDeps, job: PollJob) -> PollerHandle {
    let cancel_token = CancellationToken::new();
    let id = PollerId::next();
    let widget = job.widget;
    let target = job.target.clone();
    let (policy, policy_rx) = watch::channel(job.policy.clone());
    let (dashboard, dashboard_rx) = watch::channel(job.dashboard.clone());
    info!(%widget, poller = %id, check = %target, interval = ?deps.config.interval, "Starting poller");

    let task = runtime.spawn(poll_loop(id, deps, job, policy_rx, dashboard_rx, cancel_token.clone()));
    PollerHandle {
        id,
        widget,
        target,
        policy,
        dashboard,
        cancel_token,
        task: Some(task),
    }
}

async fn poll_loop(
    id: PollerId,
    deps: PollerDeps,
    job: PollJob,
    policy_rx: watch::Receiver<SoundPolicy>,
    dashboard_rx: watch::Receiver<String>,
    cancel_token: CancellationToken,
) {
    let mut machine = AlertMachine::new(job.target.clone());
    let mut ticker = tokio::time::interval(deps.config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                let dashboard = dashboard_rx.borrow().clone();
                let fetched = tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    fetched = fetch_with_timeout(deps.source.as_ref(), &job.target, &dashboard, deps.config.fetch_timeout) => fetched,
                };

                // A fetch that outlived its widget must not reach the alert machine
                if cancel_token.is_cancelled() {
                    break;
                }

                let event = match fetched {
                    Ok((object_state, alert_config)) => {
                        let policy = policy_rx.borrow().clone();
                        let state = apply_state(&mut machine, &policy, deps.player.as_ref(), object_state, &alert_config);
                        PollEvent::State {
                            widget: job.widget,
                            poller: id,
                            state,
                            acknowledged: object_state.acknowledged,
                        }
                    }
                    Err(err) => {
                        warn!(widget = %job.widget, check = %job.target, error = %err, "State poll failed");
                        PollEvent::FetchFailed {
                            widget: job.widget,
                            poller: id,
                            message: err.to_string(),
                        }
                    }
                };

                if deps.events.send(event).is_err() {
                    debug!(widget = %job.widget, "Event receiver gone, stopping poller");
                    break;
                }
            }
        }
    }
    debug!(widget = %job.widget, check = %job.target, "Poller stopped");
}

async fn fetch_with_timeout(
    source: &dyn MonitoringSource,
    target: &CheckTarget,
    dashboard: &str,
    limit: Duration,
) -> Result<(ObjectState, DashboardAlertConfig), FetchError> {
    let fetch = async {
        let state = source.object_state(target.object_type, &target.filter).await?;
        let config = source.alert_config(dashboard).await?;
        Ok::<_, FetchError>((state, config))
    };
    match tokio::time::timeout(limit, fetch).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(limit.as_secs())),
    }
}

/// Resolve, run the alert machine and play whatever it emits
fn apply_state(
    machine: &mut AlertMachine,
    policy: &SoundPolicy,
    player: &dyn SoundPlayer,
    object_state: ObjectState,
    alert_config: &DashboardAlertConfig,
) -> CheckState {
    let state = check_state::resolve(machine.target().object_type, object_state.result_code);
    if let Some(sound) = machine.observe(state, policy, alert_config) {
        player.play(&sound);
    }
    state
}
