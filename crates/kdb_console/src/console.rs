//! Query/session orchestration: runs manual queries, drives live and
//! pointer-driven polling, keeps the ledger current and tells the host what
//! to show.
//!
//! All state sits behind one mutex that is never held across an await, so
//! the console behaves like a single event loop whether the runtime has one
//! thread or many.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use chrono::Local;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::aggregate::{self, ViewEntry};
use crate::classify::is_display_worthy;
use crate::client::{Client, ClientOptions, ConnectionState, TransportEvent};
use crate::config::ConsoleSection;
use crate::engine::EngineControl;
use crate::error::TransportError;
use crate::export;
use crate::format::{auto_expand_error, auto_expand_result, format_result};
use crate::ledger::{
    ContinuousSession, EntryId, History, Ledger, LogKind, PollMode, PollOutcome, PolledResult,
    ResultGroup,
};
use crate::messages::{display_scalar, frame_query, Outcome};
use crate::pointer::{PointerGate, PointerPosition, PointerTracker, RateGate};
use crate::scheduler::{LiveTicker, SessionMachine, Transition};

/// Receives the latest display-worthy value, or `None` to clear.
pub type VisualSink = Arc<dyn Fn(Option<Value>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// What the host should surface to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    Connection(ConnectionState),
    Notice { level: NoticeLevel, text: String },
}

/// Timing and display tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsoleSettings {
    pub live_interval: Duration,
    pub pointer_min_interval: Duration,
    pub pointer_threshold: f64,
    pub pointer_display_interval: Duration,
    pub visual_min_interval: Duration,
    pub display_cap: usize,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self::from(&ConsoleSection::default())
    }
}

impl From<&ConsoleSection> for ConsoleSettings {
    fn from(c: &ConsoleSection) -> Self {
        Self {
            live_interval: Duration::from_millis(c.live_interval_ms),
            pointer_min_interval: Duration::from_millis(c.pointer_min_interval_ms),
            pointer_threshold: c.pointer_threshold,
            pointer_display_interval: Duration::from_millis(c.pointer_display_interval_ms),
            visual_min_interval: Duration::from_millis(c.visual_min_interval_ms),
            display_cap: c.display_cap,
        }
    }
}

/// Where the user's pointer and focus are; pointer tracking only runs while
/// one of these holds or pointer mode is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interaction {
    pub pointer_over: bool,
    pub input_focused: bool,
}

struct State {
    ledger: Ledger,
    history: History,
    input: String,
    last_query: String,
    modes: SessionMachine,
    live_results: Vec<PolledResult>,
    loading: bool,
    connect_attempts: u32,
    pointer_gate: PointerGate,
    visual_gate: RateGate,
    interaction: Interaction,
    ticker: Option<LiveTicker>,
}

struct Shared {
    settings: ConsoleSettings,
    state: Mutex<State>,
    client: Mutex<Option<Client>>,
    pointer: Mutex<PointerTracker>,
    sink: Option<VisualSink>,
    engine: Option<Arc<dyn EngineControl>>,
    events: broadcast::Sender<ConsoleEvent>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    fn client(&self) -> Option<Client> {
        lock(&self.client).clone()
    }

    fn connected_client(&self) -> Option<Client> {
        self.client().filter(Client::is_connected)
    }

    fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        let text = text.into();
        tracing::debug!(?level, %text, "notice");
        let _ = self.events.send(ConsoleEvent::Notice { level, text });
    }

    fn show(&self, value: Option<Value>) {
        if let Some(sink) = &self.sink {
            sink(value);
        }
    }

    fn current_pointer(&self) -> PointerPosition {
        lock(&self.pointer).current()
    }

    /// Close the open session and stop its timer.
    fn end_modes(&self, state: &mut State) -> Option<EntryId> {
        state.ticker = None;
        state.modes.disable(&mut state.ledger, Local::now())
    }
}

/// Builder for [`Console`].
#[derive(Default)]
pub struct ConsoleBuilder {
    settings: ConsoleSettings,
    sink: Option<VisualSink>,
    engine: Option<Arc<dyn EngineControl>>,
}

impl ConsoleBuilder {
    pub fn settings(mut self, settings: ConsoleSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn sink(mut self, sink: VisualSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn engine(mut self, engine: Arc<dyn EngineControl>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn build(self) -> Console {
        let settings = self.settings;
        let (events, _) = broadcast::channel(256);
        Console {
            shared: Arc::new(Shared {
                settings,
                state: Mutex::new(State {
                    ledger: Ledger::new(),
                    history: History::new(),
                    input: String::new(),
                    last_query: String::new(),
                    modes: SessionMachine::new(),
                    live_results: Vec::new(),
                    loading: false,
                    connect_attempts: 0,
                    pointer_gate: PointerGate::new(
                        settings.pointer_threshold,
                        settings.pointer_min_interval,
                    ),
                    visual_gate: RateGate::new(settings.visual_min_interval),
                    interaction: Interaction::default(),
                    ticker: None,
                }),
                client: Mutex::new(None),
                pointer: Mutex::new(PointerTracker::new(settings.pointer_display_interval)),
                sink: self.sink,
                engine: self.engine,
                events,
                watcher: Mutex::new(None),
            }),
        }
    }
}

/// The console core. Cheap to clone; clones share state.
///
/// Methods that start polling (`toggle_live`, `pointer_moved`) spawn tasks
/// and must run inside a tokio runtime.
#[derive(Clone)]
pub struct Console {
    shared: Arc<Shared>,
}

impl Console {
    pub fn builder() -> ConsoleBuilder {
        ConsoleBuilder::default()
    }

    pub fn new(settings: ConsoleSettings) -> Self {
        Self::builder().settings(settings).build()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.shared.events.subscribe()
    }

    pub fn settings(&self) -> ConsoleSettings {
        self.shared.settings
    }

    // ── connection ──────────────────────────────────────────────────────

    /// Use `client` as the transport and follow its notifications.
    pub fn attach(&self, client: Client) {
        let events = client.subscribe();
        let watcher = tokio::spawn(watch_transport(Arc::downgrade(&self.shared), events));
        if let Some(old) = lock(&self.shared.watcher).replace(watcher) {
            old.abort();
        }
        *lock(&self.shared.client) = Some(client);
    }

    /// Connect to `url`, reusing the attached client when it points there.
    pub async fn connect(&self, url: &str, options: ClientOptions) -> Result<(), TransportError> {
        let client = match self.shared.client() {
            Some(existing) if existing.url() == url => existing,
            _ => {
                let client = Client::new(url, options);
                self.attach(client.clone());
                client
            }
        };
        let attempt = {
            let mut state = self.shared.state();
            state.connect_attempts += 1;
            state.connect_attempts
        };
        tracing::info!(url, attempt, "connection attempt");
        let _ = self
            .shared
            .events
            .send(ConsoleEvent::Connection(ConnectionState::Connecting));
        let result = client.connect().await;
        if result.is_err() {
            let _ = self
                .shared
                .events
                .send(ConsoleEvent::Connection(ConnectionState::Disconnected));
        }
        result
    }

    /// Connect to the port the engine collaborator reports.
    pub async fn connect_engine(&self, options: ClientOptions) -> Result<(), TransportError> {
        let port = match &self.shared.engine {
            Some(engine) => engine.port(),
            None => crate::config::DEFAULT_PORT,
        };
        self.connect(&format!("ws://127.0.0.1:{}", port), options).await
    }

    pub async fn disconnect(&self) {
        self.shared.state().connect_attempts = 0;
        if let Some(client) = self.shared.client() {
            client.disconnect().await;
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared
            .client()
            .map_or(ConnectionState::Disconnected, |c| c.state())
    }

    // ── input and history ───────────────────────────────────────────────

    /// Replace the input buffer. Editing abandons history recall.
    pub fn set_input(&self, text: &str) {
        let mut state = self.shared.state();
        state.input = text.to_string();
        if state.history.cursor().is_some() {
            state.history.reset_cursor();
        }
    }

    pub fn input(&self) -> String {
        self.shared.state().input.clone()
    }

    pub fn history_up(&self) -> Option<String> {
        let mut state = self.shared.state();
        let current = state.input.clone();
        let recalled = state.history.up(&current)?;
        state.input = recalled.clone();
        Some(recalled)
    }

    pub fn history_down(&self) -> Option<String> {
        let mut state = self.shared.state();
        let recalled = state.history.down()?;
        state.input = recalled.clone();
        Some(recalled)
    }

    pub fn history(&self) -> Vec<String> {
        self.shared.state().history.entries().to_vec()
    }

    pub fn history_cursor(&self) -> Option<usize> {
        self.shared.state().history.cursor()
    }

    // ── manual queries ──────────────────────────────────────────────────

    pub fn is_loading(&self) -> bool {
        self.shared.state().loading
    }

    /// Run the input buffer. Ignored while a manual query is in flight.
    pub async fn submit(&self) -> Option<EntryId> {
        let query = {
            let state = self.shared.state();
            if state.loading {
                tracing::debug!("submit ignored, query in flight");
                return None;
            }
            state.input.clone()
        };
        self.execute_query(&query).await
    }

    /// Send `raw` with the current pointer context and record the outcome in
    /// a new group. Returns the group id, or `None` when nothing was sent.
    /// Callers serialize manual queries.
    pub async fn execute_query(&self, raw: &str) -> Option<EntryId> {
        let query = raw.trim();
        if query.is_empty() {
            return None;
        }
        let Some(client) = self.shared.connected_client() else {
            tracing::warn!(query, "query skipped, not connected");
            self.shared.notify(NoticeLevel::Warning, "Not connected to kdb+");
            return None;
        };

        let request = frame_query(self.shared.current_pointer(), query);
        let id = {
            let mut state = self.shared.state();
            state.loading = true;
            state.last_query = query.to_string();
            state.history.push(query);
            state.ledger.open_group(query, Local::now())
        };
        tracing::debug!(%id, %request, "dispatching query");

        let reply = client.send(&request).await;
        let now = Local::now();
        let mut visual = None;
        {
            let mut state = self.shared.state();
            match reply {
                Ok(reply) => match Outcome::from_value(reply.into_value()) {
                    Outcome::Failure(failure) => {
                        tracing::warn!(%id, error = %failure.message, "engine reported error");
                        let text = failure.to_string();
                        let expanded = auto_expand_error(&text);
                        state.ledger.resolve_error(id, text, now, expanded);
                    }
                    Outcome::Success(value) => {
                        let expanded = auto_expand_result(&format_result(&value));
                        let worthy = is_display_worthy(&value).then(|| value.clone());
                        // A group removed or cleared in flight drops its reply.
                        if state.ledger.resolve_response(id, value, now, expanded) {
                            visual = worthy;
                        } else {
                            tracing::debug!(%id, "reply for removed group dropped");
                        }
                    }
                },
                Err(e) => {
                    tracing::warn!(%id, error = %e, "query failed");
                    let text = format!("Query failed: {}", e);
                    let expanded = auto_expand_error(&text);
                    state.ledger.resolve_error(id, text, now, expanded);
                }
            }
            state.loading = false;
            state.input.clear();
            state.history.reset_cursor();
        }
        if visual.is_some() {
            self.shared.show(visual);
        }
        Some(id)
    }

    // ── continuous modes ────────────────────────────────────────────────

    pub fn toggle_live(&self) -> Transition {
        self.toggle(PollMode::Live)
    }

    pub fn toggle_pointer(&self) -> Transition {
        self.toggle(PollMode::Pointer)
    }

    fn toggle(&self, mode: PollMode) -> Transition {
        let transition = {
            let mut guard = self.shared.state();
            let state = &mut *guard;
            let candidate = match state.input.trim() {
                "" => state.last_query.clone(),
                typed => typed.to_string(),
            };
            let transition = state
                .modes
                .toggle(mode, &candidate, &mut state.ledger, Local::now());
            match &transition {
                Transition::Opened { mode, .. } => {
                    state.last_query = candidate;
                    state.live_results.clear();
                    state.pointer_gate.reset();
                    state.visual_gate.reset();
                    state.ticker = match mode {
                        PollMode::Live => Some(self.spawn_ticker()),
                        PollMode::Pointer => None,
                    };
                }
                Transition::Closed(_) => state.ticker = None,
                Transition::Rejected(_) => {}
            }
            transition
        };
        if let Transition::Rejected(mode) = transition {
            self.shared.notify(
                NoticeLevel::Warning,
                format!("No query available for {} mode", mode),
            );
        }
        transition
    }

    fn spawn_ticker(&self) -> LiveTicker {
        let weak = Arc::downgrade(&self.shared);
        LiveTicker::spawn(self.shared.settings.live_interval, move || {
            let weak = weak.clone();
            async move {
                if let Some(shared) = weak.upgrade() {
                    poll_once(shared, PollMode::Live).await;
                }
            }
        })
    }

    /// Turn live mode off if it is on.
    pub fn cancel_live(&self) -> Option<EntryId> {
        self.cancel(PollMode::Live)
    }

    /// Turn pointer mode off if it is on.
    pub fn cancel_pointer(&self) -> Option<EntryId> {
        self.cancel(PollMode::Pointer)
    }

    fn cancel(&self, mode: PollMode) -> Option<EntryId> {
        let mut state = self.shared.state();
        if state.modes.is_enabled(mode) {
            self.shared.end_modes(&mut state)
        } else {
            None
        }
    }

    pub fn active_mode(&self) -> Option<PollMode> {
        self.shared.state().modes.active_mode()
    }

    pub fn current_session(&self) -> Option<EntryId> {
        self.shared.state().modes.active_session()
    }

    pub fn last_query(&self) -> String {
        self.shared.state().last_query.clone()
    }

    pub fn live_results(&self) -> Vec<PolledResult> {
        self.shared.state().live_results.clone()
    }

    pub fn clear_live_results(&self) {
        self.shared.state().live_results.clear();
    }

    // ── pointer ─────────────────────────────────────────────────────────

    pub fn set_interaction(&self, interaction: Interaction) {
        self.shared.state().interaction = interaction;
    }

    /// Raw pointer event on a `width`×`height` surface.
    pub fn pointer_moved(&self, raw_x: f64, raw_y: f64, width: f64, height: f64) -> bool {
        let position = PointerPosition::normalize(raw_x, raw_y, width, height);
        self.pointer_moved_at(position, Instant::now())
    }

    /// Record a normalized pointer position observed at `now`. Returns true
    /// when the move issued a pointer-mode poll.
    pub fn pointer_moved_at(&self, position: PointerPosition, now: Instant) -> bool {
        let position = PointerPosition::clamped(position.x, position.y);
        let connected = self.shared.connected_client().is_some();
        let fire = {
            let mut state = self.shared.state();
            let pointer_mode = state.modes.is_enabled(PollMode::Pointer);
            let listening =
                pointer_mode || state.interaction.pointer_over || state.interaction.input_focused;
            if !listening {
                return false;
            }
            lock(&self.shared.pointer).record(position, now);
            let ready = pointer_mode && connected && !state.loading;
            state.pointer_gate.observe(position, now, ready)
        };
        if fire {
            tokio::spawn(poll_once(Arc::clone(&self.shared), PollMode::Pointer));
        }
        fire
    }

    pub fn pointer(&self) -> PointerPosition {
        self.shared.current_pointer()
    }

    /// Position on the (throttled) display path, catching up with the
    /// resting position once the display interval has passed.
    pub fn displayed_pointer(&self) -> PointerPosition {
        let mut tracker = lock(&self.shared.pointer);
        tracker.flush(Instant::now());
        tracker.displayed()
    }

    // ── ledger views and edits ──────────────────────────────────────────

    pub fn groups(&self) -> Vec<ResultGroup> {
        self.shared.state().ledger.groups().to_vec()
    }

    pub fn group(&self, id: EntryId) -> Option<ResultGroup> {
        self.shared.state().ledger.group(id).cloned()
    }

    pub fn sessions(&self) -> Vec<ContinuousSession> {
        self.shared.state().ledger.sessions().to_vec()
    }

    pub fn session(&self, id: EntryId) -> Option<ContinuousSession> {
        self.shared.state().ledger.session(id).cloned()
    }

    /// Add a free-standing line to the console.
    pub fn log(&self, kind: LogKind, content: Value) {
        self.shared
            .state()
            .ledger
            .push_log(kind, content, Local::now());
    }

    /// Run `f` over the capped, time-ordered view.
    pub fn with_view<R>(&self, f: impl FnOnce(&[ViewEntry<'_>]) -> R) -> R {
        let state = self.shared.state();
        let entries = aggregate::aggregate(&state.ledger, self.shared.settings.display_cap);
        f(&entries)
    }

    pub fn view_len(&self) -> usize {
        self.with_view(|entries| entries.len())
    }

    pub fn toggle_group(&self, id: EntryId) -> Option<bool> {
        self.shared.state().ledger.toggle_group(id)
    }

    pub fn toggle_session(&self, id: EntryId) -> Option<bool> {
        self.shared.state().ledger.toggle_session(id)
    }

    /// Delete a group and point the visualization at the newest remaining
    /// successful result, or clear it.
    pub fn remove_group(&self, id: EntryId) -> bool {
        let (removed, visual) = {
            let mut state = self.shared.state();
            let removed = state.ledger.remove_group(id).is_some();
            (removed, state.ledger.last_visual_response().cloned())
        };
        if removed {
            self.shared.show(visual);
        }
        removed
    }

    /// Delete a session. Removing the open one turns its mode off.
    pub fn remove_session(&self, id: EntryId) -> bool {
        let mut state = self.shared.state();
        if state.modes.forget(id) {
            tracing::info!(session = %id, "open session removed, mode off");
            state.ticker = None;
            state.live_results.clear();
        }
        state.ledger.remove_session(id).is_some()
    }

    pub fn export_group(&self, id: EntryId) -> Option<Value> {
        self.shared
            .state()
            .ledger
            .group(id)
            .map(export::group_export)
    }

    pub fn export_session(&self, id: EntryId) -> Option<Value> {
        self.shared
            .state()
            .ledger
            .session(id)
            .map(export::session_export)
    }

    /// Drop query groups and log lines and clear the visualization.
    pub fn clear_results(&self) {
        {
            let mut state = self.shared.state();
            state.ledger.clear_log();
            state.ledger.clear_groups();
        }
        self.shared.show(None);
    }

    /// End the open session and drop every session.
    pub fn clear_sessions(&self) {
        let mut state = self.shared.state();
        self.shared.end_modes(&mut state);
        state.ledger.clear_sessions();
        state.live_results.clear();
    }

    /// Back to a fresh console: modes off, everything cleared, history too.
    pub fn clear_console(&self) {
        {
            let mut state = self.shared.state();
            self.shared.end_modes(&mut state);
            state.ledger.clear();
            state.live_results.clear();
            state.input.clear();
            state.history.clear();
            state.last_query.clear();
        }
        self.shared.show(None);
        self.shared
            .notify(NoticeLevel::Success, "Console cleared successfully");
    }

    // ── engine ──────────────────────────────────────────────────────────

    /// Ask the engine collaborator for its reset command, run it, and clear
    /// the console when the engine accepts it.
    pub async fn reset_engine(&self) -> bool {
        let Some(client) = self.shared.connected_client() else {
            self.shared
                .notify(NoticeLevel::Error, "Not connected to KDB server");
            return false;
        };
        let Some(engine) = self.shared.engine.clone() else {
            self.shared
                .notify(NoticeLevel::Error, "No engine control available");
            return false;
        };
        let command = engine.reset_command();
        if command.starts_with("ERROR:") {
            self.shared.notify(NoticeLevel::Error, command);
            return false;
        }

        tracing::info!(%command, "resetting engine");
        self.shared.state().loading = true;
        let reply = client.send(&command).await;
        self.shared.state().loading = false;

        match reply.map(|r| Outcome::from_value(r.into_value())) {
            Ok(Outcome::Failure(failure)) => {
                self.shared.notify(
                    NoticeLevel::Error,
                    format!("Reset failed: {}", failure.message),
                );
                false
            }
            Ok(Outcome::Success(value)) => {
                let message = value
                    .get("message")
                    .map(display_scalar)
                    .unwrap_or_else(|| display_scalar(&value));
                self.shared.notify(NoticeLevel::Success, message);
                self.clear_console();
                true
            }
            Err(e) => {
                self.shared
                    .notify(NoticeLevel::Error, format!("Server reset failed: {}", e));
                false
            }
        }
    }
}

/// One continuous-mode poll: send the session query with the pointer
/// position read now, then record the outcome if the session still exists.
async fn poll_once(shared: Arc<Shared>, mode: PollMode) {
    let (session, query) = {
        let mut guard = shared.state();
        let state = &mut *guard;
        if state.modes.active_mode() != Some(mode) {
            return;
        }
        let query = state.modes.active_query().unwrap_or_default().to_string();
        if query.is_empty() {
            shared.end_modes(state);
            return;
        }
        match state.modes.active_session() {
            Some(session) => (session, query),
            None => return,
        }
    };
    let Some(client) = shared.connected_client() else {
        return;
    };

    let coordinates = shared.current_pointer();
    let reply = client.send(&frame_query(coordinates, &query)).await;
    let outcome = match reply {
        Ok(reply) => match Outcome::from_value(reply.into_value()) {
            Outcome::Success(value) => PollOutcome::Result(value),
            Outcome::Failure(failure) => PollOutcome::Error(failure.to_string()),
        },
        Err(e) => {
            tracing::warn!(%mode, %session, error = %e, "poll failed");
            PollOutcome::Error(e.to_string())
        }
    };
    let polled = PolledResult {
        timestamp: Local::now(),
        coordinates,
        outcome,
    };

    let visual = {
        let mut state = shared.state();
        if !state.ledger.append_poll(session, polled.clone()) {
            tracing::debug!(%session, "late poll reply dropped, session removed");
            return;
        }
        let current = state.modes.active_session() == Some(session);
        if current {
            state.live_results.push(polled.clone());
        }
        match polled.result() {
            Some(value)
                if current
                    && is_display_worthy(value)
                    && state.ledger.groups().is_empty()
                    && state.visual_gate.try_pass(Instant::now()) =>
            {
                Some(value.clone())
            }
            _ => None,
        }
    };
    if visual.is_some() {
        shared.show(visual);
    }
}

async fn watch_transport(shared: Weak<Shared>, mut events: broadcast::Receiver<TransportEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "transport events lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let Some(shared) = shared.upgrade() else {
            break;
        };
        match event {
            TransportEvent::Connected => {
                let attempts = {
                    let mut state = shared.state();
                    let attempts = state.connect_attempts;
                    state.connect_attempts = 0;
                    state
                        .ledger
                        .push_log(LogKind::System, Value::from("Connected"), Local::now());
                    attempts
                };
                let _ = shared
                    .events
                    .send(ConsoleEvent::Connection(ConnectionState::Connected));
                if attempts > 1 {
                    shared.notify(NoticeLevel::Success, "Connected successfully!");
                }
            }
            TransportEvent::Closed { expected } => {
                {
                    let mut state = shared.state();
                    if let Some(session) = shared.end_modes(&mut state) {
                        tracing::info!(%session, "session closed by disconnect");
                    }
                    state.loading = false;
                    state.ledger.push_log(
                        LogKind::System,
                        Value::from("Disconnected"),
                        Local::now(),
                    );
                }
                let _ = shared
                    .events
                    .send(ConsoleEvent::Connection(ConnectionState::Disconnected));
                if !expected {
                    shared.notify(NoticeLevel::Info, "Connection lost. Reconnect to continue.");
                }
            }
            TransportEvent::Error(message) => {
                shared.notify(NoticeLevel::Error, message);
            }
        }
    }
}
