//! The session event loop: the single execution context for fetch state.
//!
//! A [`Session`] owns the [`FetchOrchestrator`] and the
//! [`AutoReloadScheduler`] and runs them on one Tokio task. Caller commands,
//! fetch completions and timer fires all arrive as messages on that task, so
//! state is never mutated concurrently. Callers interact through a cloneable
//! [`SessionHandle`] and observe results through a broadcast of
//! [`FetchEvent`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! let (session, handle) = Session::new(registry, prefs);
//! tokio::spawn(session.run());
//!
//! let mut events = handle.subscribe();
//! handle.reload().await?;
//! while let Ok(event) = events.recv().await { /* display */ }
//! ```

use std::sync::Arc;

use anyhow::Result;
use nekoview_common::{FetchError, NsfwMode};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use super::orchestrator::{FetchCompletion, FetchEvent, FetchOrchestrator};
use super::scheduler::{AutoReloadScheduler, SchedulerState};
use crate::config::Preferences;
use crate::source::{FetchedImage, ProviderRegistry};

/// Channel capacity for caller commands.
const COMMAND_CAPACITY: usize = 32;

/// Channel capacity for fetch completions and timer fires.
const INTERNAL_CAPACITY: usize = 16;

/// Broadcast buffer for fetch events.
const EVENT_CAPACITY: usize = 64;

/// Commands accepted by a running session.
#[derive(Debug)]
pub enum SessionCommand {
    /// Fetch a new image now (ignored while one is in flight).
    Reload,
    SetAutoReload(bool),
    SetIntervalSecs(u64),
    /// Persist a new source id; restarts an in-flight fetch.
    SetSource(String),
    /// Persist a new content filter; restarts an in-flight fetch.
    SetNsfwMode(NsfwMode),
    Snapshot(oneshot::Sender<FetchSnapshot>),
    Shutdown,
}

/// Point-in-time view of the session state.
#[derive(Debug, Clone)]
pub struct FetchSnapshot {
    pub is_loading: bool,
    pub last_result: Option<Arc<FetchedImage>>,
    pub last_error: Option<FetchError>,
    pub scheduler: SchedulerState,
    pub interval_secs: u64,
}

/// Cloneable handle for talking to a running [`Session`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<FetchEvent>,
}

impl SessionHandle {
    /// Receive every [`FetchEvent`] emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<FetchEvent> {
        self.events.subscribe()
    }

    pub async fn reload(&self) -> Result<()> {
        self.send(SessionCommand::Reload).await
    }

    pub async fn set_auto_reload(&self, enabled: bool) -> Result<()> {
        self.send(SessionCommand::SetAutoReload(enabled)).await
    }

    pub async fn set_interval_secs(&self, secs: u64) -> Result<()> {
        self.send(SessionCommand::SetIntervalSecs(secs)).await
    }

    pub async fn set_source(&self, id: impl Into<String>) -> Result<()> {
        self.send(SessionCommand::SetSource(id.into())).await
    }

    pub async fn set_nsfw_mode(&self, mode: NsfwMode) -> Result<()> {
        self.send(SessionCommand::SetNsfwMode(mode)).await
    }

    pub async fn snapshot(&self) -> Result<FetchSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot(tx)).await?;
        rx.await
            .map_err(|_| anyhow::anyhow!("Session stopped before answering"))
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SessionCommand::Shutdown).await
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("Session is closed"))
    }
}

/// Owner of all fetch and schedule state; see the module docs.
pub struct Session {
    prefs: Preferences,
    orchestrator: FetchOrchestrator,
    scheduler: AutoReloadScheduler,
    commands: mpsc::Receiver<SessionCommand>,
    completions: mpsc::Receiver<FetchCompletion>,
    timer_fires: mpsc::Receiver<u64>,
    events: broadcast::Sender<FetchEvent>,
}

impl Session {
    /// Create a session and its handle. Call [`run`](Self::run) to start it.
    pub fn new(registry: Arc<ProviderRegistry>, prefs: Preferences) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (completion_tx, completion_rx) = mpsc::channel(INTERNAL_CAPACITY);
        let (fire_tx, fire_rx) = mpsc::channel(INTERNAL_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let session = Self {
            prefs,
            orchestrator: FetchOrchestrator::new(registry, completion_tx),
            scheduler: AutoReloadScheduler::new(fire_tx),
            commands: command_rx,
            completions: completion_rx,
            timer_fires: fire_rx,
            events: event_tx.clone(),
        };
        let handle = SessionHandle {
            commands: command_tx,
            events: event_tx,
        };
        (session, handle)
    }

    /// Run until [`SessionHandle::shutdown`] is called or every handle is
    /// dropped.
    ///
    /// Auto-reload settings are taken from the preferences on start.
    pub async fn run(mut self) {
        self.scheduler
            .set_interval_secs(self.prefs.auto_reload_interval());
        self.scheduler
            .set_enabled(self.prefs.auto_reload_enabled(), self.orchestrator.is_loading());
        info!(
            auto_reload = self.scheduler.is_enabled(),
            interval_secs = self.scheduler.interval_secs(),
            "Session started"
        );

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = self.completions.recv() => self.handle_completion(completion),
                Some(generation) = self.timer_fires.recv() => self.handle_timer_fired(generation),
            }
        }

        self.scheduler.cancel();
        info!("Session stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Reload => self.start_fetch(),
            SessionCommand::SetAutoReload(enabled) => {
                if let Err(e) = self.prefs.set_auto_reload_enabled(enabled) {
                    warn!(error = %e, "Failed to persist auto-reload setting");
                }
                self.scheduler
                    .set_enabled(enabled, self.orchestrator.is_loading());
            }
            SessionCommand::SetIntervalSecs(secs) => {
                if let Err(e) = self.prefs.set_auto_reload_interval(secs) {
                    warn!(error = %e, "Failed to persist auto-reload interval");
                }
                self.scheduler.set_interval_secs(secs);
            }
            SessionCommand::SetSource(id) => {
                if !self.orchestrator.registry().contains(&id) {
                    warn!(source_id = %id, "Unknown source id; the first source will be used");
                }
                if let Err(e) = self.prefs.set_source(&id) {
                    warn!(error = %e, "Failed to persist source");
                }
                self.restart_in_flight();
            }
            SessionCommand::SetNsfwMode(mode) => {
                if let Err(e) = self.prefs.set_nsfw_mode(mode) {
                    warn!(error = %e, "Failed to persist NSFW mode");
                }
                self.restart_in_flight();
            }
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn handle_completion(&mut self, completion: FetchCompletion) {
        if let Some(event) = self.orchestrator.complete(completion) {
            self.scheduler.on_fetch_completed();
            self.emit(event);
        }
    }

    fn handle_timer_fired(&mut self, generation: u64) {
        if self.scheduler.take_fired(generation) {
            debug!(generation, "Auto-reload tick");
            self.start_fetch();
        } else {
            debug!(generation, "Ignoring stale reload tick");
        }
    }

    /// Request a fetch using the current preferences.
    fn start_fetch(&mut self) {
        let source = self.prefs.source();
        let mode = self.prefs.nsfw_mode();
        if let Some(event) = self.orchestrator.request_fetch(source.as_deref(), mode) {
            self.scheduler.on_fetch_started();
            self.emit(event);
        }
    }

    /// Drop the in-flight fetch, if any, and fetch again with new settings.
    fn restart_in_flight(&mut self) {
        if self.orchestrator.invalidate() {
            self.start_fetch();
        }
    }

    fn snapshot(&self) -> FetchSnapshot {
        let state = self.orchestrator.state();
        FetchSnapshot {
            is_loading: state.is_loading(),
            last_result: state.last_result().cloned(),
            last_error: state.last_error().cloned(),
            scheduler: self.scheduler.state(),
            interval_secs: self.scheduler.interval_secs(),
        }
    }

    fn emit(&self, event: FetchEvent) {
        // No subscribers is fine; the state is still recorded.
        let _ = self.events.send(event);
    }
}
