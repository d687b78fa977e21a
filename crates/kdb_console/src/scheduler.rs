//! Continuous-mode lifecycle and the live-mode ticker.
//!
//! At most one session is open across both modes. Every transition goes
//! through [`SessionMachine`], which owns the open session's id and closes it
//! in the ledger before anything else is opened.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::ledger::{EntryId, Ledger, PollMode};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModeState {
    #[default]
    Idle,
    Open {
        mode: PollMode,
        session: EntryId,
        query: String,
    },
}

/// Result of a mode toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A session was opened; `closed` is the session the switch ended, if any.
    Opened {
        mode: PollMode,
        session: EntryId,
        closed: Option<EntryId>,
    },
    Closed(EntryId),
    /// No usable query; nothing changed.
    Rejected(PollMode),
}

#[derive(Debug, Default)]
pub struct SessionMachine {
    state: ModeState,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ModeState {
        &self.state
    }

    pub fn active_mode(&self) -> Option<PollMode> {
        match &self.state {
            ModeState::Open { mode, .. } => Some(*mode),
            ModeState::Idle => None,
        }
    }

    pub fn active_session(&self) -> Option<EntryId> {
        match &self.state {
            ModeState::Open { session, .. } => Some(*session),
            ModeState::Idle => None,
        }
    }

    pub fn active_query(&self) -> Option<&str> {
        match &self.state {
            ModeState::Open { query, .. } => Some(query),
            ModeState::Idle => None,
        }
    }

    pub fn is_enabled(&self, mode: PollMode) -> bool {
        self.active_mode() == Some(mode)
    }

    /// Open a session for `mode` with `query`, closing whatever was open.
    pub fn enable(
        &mut self,
        mode: PollMode,
        query: &str,
        ledger: &mut Ledger,
        now: DateTime<Local>,
    ) -> Transition {
        let query = query.trim();
        if query.is_empty() {
            tracing::warn!(%mode, "no query available, mode stays off");
            return Transition::Rejected(mode);
        }
        let closed = self.disable(ledger, now);
        let session = ledger.open_session(mode, query, now);
        tracing::info!(%mode, %session, query, "continuous session opened");
        self.state = ModeState::Open {
            mode,
            session,
            query: query.to_string(),
        };
        Transition::Opened {
            mode,
            session,
            closed,
        }
    }

    /// Close the open session, if any.
    pub fn disable(&mut self, ledger: &mut Ledger, now: DateTime<Local>) -> Option<EntryId> {
        match std::mem::take(&mut self.state) {
            ModeState::Open { mode, session, .. } => {
                ledger.close_session(session, now);
                tracing::info!(%mode, %session, "continuous session closed");
                Some(session)
            }
            ModeState::Idle => None,
        }
    }

    /// Flip `mode`: off when it is the active mode, otherwise on with
    /// `candidate` as its query.
    pub fn toggle(
        &mut self,
        mode: PollMode,
        candidate: &str,
        ledger: &mut Ledger,
        now: DateTime<Local>,
    ) -> Transition {
        if self.is_enabled(mode) {
            match self.disable(ledger, now) {
                Some(id) => Transition::Closed(id),
                None => Transition::Rejected(mode),
            }
        } else {
            self.enable(mode, candidate, ledger, now)
        }
    }

    /// Drop back to idle when `session` is the open one (it is being removed
    /// from the ledger, so there is nothing to close).
    pub fn forget(&mut self, session: EntryId) -> bool {
        if self.active_session() == Some(session) {
            self.state = ModeState::Idle;
            true
        } else {
            false
        }
    }
}

/// Fixed-period timer for live mode. Each tick spawns its own task, so a slow
/// reply never delays the next tick. Dropping the ticker stops
/// future ticks; requests already sent still complete.
#[derive(Debug)]
pub struct LiveTicker {
    handle: JoinHandle<()>,
}

impl LiveTicker {
    pub fn spawn<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tokio::spawn(on_tick());
            }
        });
        Self { handle }
    }

}

impl Drop for LiveTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
