//! Merges groups, sessions and log entries into the single time-ordered list
//! the console displays. The projection borrows from the ledger and never
//! modifies it.

use chrono::{DateTime, Local};

use crate::ledger::{ContinuousSession, Ledger, LogEntry, ResultGroup};

/// Default number of entries kept in the view.
pub const DEFAULT_DISPLAY_CAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewEntry<'a> {
    Group(&'a ResultGroup),
    Session(&'a ContinuousSession),
    Log(&'a LogEntry),
}

impl ViewEntry<'_> {
    pub fn created_at(&self) -> DateTime<Local> {
        match self {
            ViewEntry::Group(g) => g.created_at,
            ViewEntry::Session(s) => s.created_at,
            ViewEntry::Log(l) => l.created_at,
        }
    }

    fn seq(&self) -> u64 {
        match self {
            ViewEntry::Group(g) => g.seq(),
            ViewEntry::Session(s) => s.seq(),
            ViewEntry::Log(l) => l.seq(),
        }
    }
}

/// Oldest-first view of the most recent `cap` entries. Ties on creation time
/// keep insertion order.
pub fn aggregate(ledger: &Ledger, cap: usize) -> Vec<ViewEntry<'_>> {
    let mut entries: Vec<ViewEntry<'_>> = ledger
        .groups()
        .iter()
        .map(ViewEntry::Group)
        .chain(ledger.sessions().iter().map(ViewEntry::Session))
        .chain(ledger.log().iter().map(ViewEntry::Log))
        .collect();
    entries.sort_by_key(|e| (e.created_at(), e.seq()));
    let excess = entries.len().saturating_sub(cap);
    entries.drain(..excess);
    entries
}
