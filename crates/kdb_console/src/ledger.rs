//! Authoritative console state: query groups, continuous sessions, ad-hoc
//! log entries and the command history.

use std::fmt;

use chrono::{DateTime, Local};
use serde_json::Value;

use crate::pointer::PointerPosition;

/// Identifier shared by groups and sessions. Derived from the creation time
/// in milliseconds and bumped when two entries land in the same millisecond,
/// so ids are unique and increase in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(EntryId)
    }
}

/// How a query group ended. `Pending` until a reply or failure arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupOutcome {
    Pending,
    Response { value: Value, at: DateTime<Local> },
    Error { text: String, at: DateTime<Local> },
}

/// One submitted query and its single eventual outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultGroup {
    pub id: EntryId,
    pub query: String,
    pub query_time: DateTime<Local>,
    pub outcome: GroupOutcome,
    pub expanded: bool,
    pub created_at: DateTime<Local>,
    seq: u64,
}

impl ResultGroup {
    pub fn is_pending(&self) -> bool {
        matches!(self.outcome, GroupOutcome::Pending)
    }

    pub fn response(&self) -> Option<&Value> {
        match &self.outcome {
            GroupOutcome::Response { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn response_time(&self) -> Option<DateTime<Local>> {
        match &self.outcome {
            GroupOutcome::Response { at, .. } => Some(*at),
            _ => None,
        }
    }

    pub fn error_text(&self) -> Option<&str> {
        match &self.outcome {
            GroupOutcome::Error { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn error_time(&self) -> Option<DateTime<Local>> {
        match &self.outcome {
            GroupOutcome::Error { at, .. } => Some(*at),
            _ => None,
        }
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }
}

/// Which continuous mode produced a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollMode {
    Live,
    Pointer,
}

impl PollMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollMode::Live => "live",
            PollMode::Pointer => "pointer",
        }
    }
}

impl fmt::Display for PollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Result(Value),
    Error(String),
}

/// One automatically repeated query and what came back.
#[derive(Debug, Clone, PartialEq)]
pub struct PolledResult {
    pub timestamp: DateTime<Local>,
    pub coordinates: PointerPosition,
    pub outcome: PollOutcome,
}

impl PolledResult {
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            PollOutcome::Result(v) => Some(v),
            PollOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            PollOutcome::Error(e) => Some(e),
            PollOutcome::Result(_) => None,
        }
    }
}

/// An open-ended run of live or pointer-driven polls.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousSession {
    pub id: EntryId,
    pub mode: PollMode,
    pub query: String,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub results: Vec<PolledResult>,
    pub expanded: bool,
    pub created_at: DateTime<Local>,
    seq: u64,
}

impl ContinuousSession {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn last_result(&self) -> Option<&PolledResult> {
        self.results.last()
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Query,
    Response,
    Error,
    System,
}

impl LogKind {
    /// Console gutter marker.
    pub fn marker(&self) -> char {
        match self {
            LogKind::Query => '>',
            LogKind::Response => '<',
            LogKind::Error => '!',
            LogKind::System => '#',
        }
    }
}

/// Free-standing console line (system messages and the like).
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub kind: LogKind,
    pub content: Value,
    pub created_at: DateTime<Local>,
    seq: u64,
}

impl LogEntry {
    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }
}

/// The three ordered collections behind the console view.
#[derive(Debug, Default)]
pub struct Ledger {
    groups: Vec<ResultGroup>,
    sessions: Vec<ContinuousSession>,
    log: Vec<LogEntry>,
    last_id: u64,
    seq: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self, now: DateTime<Local>) -> EntryId {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        self.last_id = millis.max(self.last_id + 1);
        EntryId(self.last_id)
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    // ── groups ──────────────────────────────────────────────────────────

    /// Append a pending group for `query`.
    pub fn open_group(&mut self, query: &str, now: DateTime<Local>) -> EntryId {
        let id = self.next_id(now);
        let seq = self.next_seq();
        self.groups.push(ResultGroup {
            id,
            query: query.to_string(),
            query_time: now,
            outcome: GroupOutcome::Pending,
            expanded: false,
            created_at: now,
            seq,
        });
        id
    }

    /// Resolve a pending group with a response. Returns false when the group
    /// is gone or already resolved.
    pub fn resolve_response(
        &mut self,
        id: EntryId,
        value: Value,
        at: DateTime<Local>,
        expanded: bool,
    ) -> bool {
        self.resolve(id, GroupOutcome::Response { value, at }, expanded)
    }

    /// Resolve a pending group with an error text.
    pub fn resolve_error(
        &mut self,
        id: EntryId,
        text: String,
        at: DateTime<Local>,
        expanded: bool,
    ) -> bool {
        self.resolve(id, GroupOutcome::Error { text, at }, expanded)
    }

    fn resolve(&mut self, id: EntryId, outcome: GroupOutcome, expanded: bool) -> bool {
        match self.groups.iter_mut().find(|g| g.id == id) {
            Some(group) if group.is_pending() => {
                group.outcome = outcome;
                group.expanded = expanded;
                true
            }
            _ => false,
        }
    }

    pub fn group(&self, id: EntryId) -> Option<&ResultGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn groups(&self) -> &[ResultGroup] {
        &self.groups
    }

    pub fn toggle_group(&mut self, id: EntryId) -> Option<bool> {
        let group = self.groups.iter_mut().find(|g| g.id == id)?;
        group.expanded = !group.expanded;
        Some(group.expanded)
    }

    pub fn remove_group(&mut self, id: EntryId) -> Option<ResultGroup> {
        let pos = self.groups.iter().position(|g| g.id == id)?;
        Some(self.groups.remove(pos))
    }

    pub fn clear_groups(&mut self) {
        self.groups.clear();
    }

    /// Most recent successful response that is not a plain scalar.
    pub fn last_visual_response(&self) -> Option<&Value> {
        let last = self.groups.iter().rev().find_map(ResultGroup::response)?;
        match last {
            Value::Null | Value::String(_) | Value::Number(_) | Value::Bool(_) => None,
            other => Some(other),
        }
    }

    // ── sessions ────────────────────────────────────────────────────────

    pub fn open_session(&mut self, mode: PollMode, query: &str, now: DateTime<Local>) -> EntryId {
        let id = self.next_id(now);
        let seq = self.next_seq();
        self.sessions.push(ContinuousSession {
            id,
            mode,
            query: query.to_string(),
            start_time: now,
            end_time: None,
            results: Vec::new(),
            expanded: false,
            created_at: now,
            seq,
        });
        id
    }

    /// Set the end time of an open session. Closed sessions stay closed.
    pub fn close_session(&mut self, id: EntryId, at: DateTime<Local>) -> bool {
        match self.sessions.iter_mut().find(|s| s.id == id) {
            Some(session) if session.is_open() => {
                session.end_time = Some(at);
                true
            }
            _ => false,
        }
    }

    /// Append a polled result. Dropped when the session no longer exists.
    pub fn append_poll(&mut self, id: EntryId, result: PolledResult) -> bool {
        match self.sessions.iter_mut().find(|s| s.id == id) {
            Some(session) => {
                session.results.push(result);
                true
            }
            None => false,
        }
    }

    pub fn session(&self, id: EntryId) -> Option<&ContinuousSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn sessions(&self) -> &[ContinuousSession] {
        &self.sessions
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_open()).count()
    }

    pub fn toggle_session(&mut self, id: EntryId) -> Option<bool> {
        let session = self.sessions.iter_mut().find(|s| s.id == id)?;
        session.expanded = !session.expanded;
        Some(session.expanded)
    }

    pub fn remove_session(&mut self, id: EntryId) -> Option<ContinuousSession> {
        let pos = self.sessions.iter().position(|s| s.id == id)?;
        Some(self.sessions.remove(pos))
    }

    pub fn clear_sessions(&mut self) {
        self.sessions.clear();
    }

    // ── log ─────────────────────────────────────────────────────────────

    pub fn push_log(&mut self, kind: LogKind, content: Value, now: DateTime<Local>) {
        let seq = self.next_seq();
        self.log.push(LogEntry {
            kind,
            content,
            created_at: now,
            seq,
        });
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.sessions.clear();
        self.log.clear();
    }
}

/// Submitted queries for recall, deduplicated against the previous entry,
/// plus the in-progress recall cursor.
#[derive(Debug, Default, Clone)]
pub struct History {
    entries: Vec<String>,
    index: Option<usize>,
    temp: String,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, query: &str) {
        if self.entries.last().map(String::as_str) != Some(query) {
            self.entries.push(query.to_string());
        }
    }

    /// Step back. The first step stashes `current` so stepping past the
    /// newest entry restores it.
    pub fn up(&mut self, current: &str) -> Option<String> {
        match self.index {
            None if !self.entries.is_empty() => {
                self.temp = current.to_string();
                let idx = self.entries.len() - 1;
                self.index = Some(idx);
                Some(self.entries[idx].clone())
            }
            Some(idx) if idx > 0 => {
                self.index = Some(idx - 1);
                Some(self.entries[idx - 1].clone())
            }
            _ => None,
        }
    }

    /// Step forward; past the newest entry returns the stashed input.
    pub fn down(&mut self) -> Option<String> {
        let idx = self.index?;
        if idx + 1 < self.entries.len() {
            self.index = Some(idx + 1);
            Some(self.entries[idx + 1].clone())
        } else {
            self.index = None;
            Some(std::mem::take(&mut self.temp))
        }
    }

    pub fn reset_cursor(&mut self) {
        self.index = None;
        self.temp.clear();
    }

    pub fn cursor(&self) -> Option<usize> {
        self.index
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.reset_cursor();
    }
}
