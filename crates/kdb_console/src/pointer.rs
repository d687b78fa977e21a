//! Pointer context shared by manual queries, the live ticker and the
//! pointer-driven poller.
//!
//! The tracker is the only writer. Readers take the latest value at the
//! moment they build a request; nothing is snapshotted ahead of time.

use std::time::{Duration, Instant};

use tokio::sync::watch;

/// Normalized pointer coordinates, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    /// Normalize raw surface coordinates and clamp into `[0, 1]`.
    pub fn normalize(raw_x: f64, raw_y: f64, width: f64, height: f64) -> Self {
        Self {
            x: clamp_unit(ratio(raw_x, width)),
            y: clamp_unit(ratio(raw_y, height)),
        }
    }

    /// Already-normalized input, clamped.
    pub fn clamped(x: f64, y: f64) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }
}

fn ratio(value: f64, extent: f64) -> f64 {
    if extent > 0.0 {
        value / extent
    } else {
        0.0
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Latest pointer value with the instant it was written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub position: PointerPosition,
    pub at: Instant,
}

/// Single-writer pointer cell with a fast path (every event) and a display
/// path (throttled).
#[derive(Debug)]
pub struct PointerTracker {
    latest: watch::Sender<PointerSample>,
    display: watch::Sender<PointerPosition>,
    display_interval: Duration,
    last_display: Option<Instant>,
    pending: Option<PointerPosition>,
}

impl PointerTracker {
    pub fn new(display_interval: Duration) -> Self {
        let (latest, _) = watch::channel(PointerSample {
            position: PointerPosition::default(),
            at: Instant::now(),
        });
        let (display, _) = watch::channel(PointerPosition::default());
        Self {
            latest,
            display,
            display_interval,
            last_display: None,
            pending: None,
        }
    }

    /// Record a move. The fast path is always written; the display path only
    /// when `display_interval` has passed since its previous update. A move
    /// held back is published by the next `record` or `flush` that is due.
    pub fn record(&mut self, position: PointerPosition, now: Instant) {
        self.latest.send_replace(PointerSample { position, at: now });
        self.pending = Some(position);
        self.flush(now);
    }

    /// Publish the held-back position once the display interval has passed.
    /// Returns true when the display path was updated.
    pub fn flush(&mut self, now: Instant) -> bool {
        let Some(position) = self.pending else {
            return false;
        };
        let due = self
            .last_display
            .map_or(true, |last| now.saturating_duration_since(last) >= self.display_interval);
        if due {
            self.last_display = Some(now);
            self.pending = None;
            self.display.send_replace(position);
        }
        due
    }

    pub fn current(&self) -> PointerPosition {
        self.latest.borrow().position
    }

    pub fn sample(&self) -> PointerSample {
        *self.latest.borrow()
    }

    pub fn displayed(&self) -> PointerPosition {
        *self.display.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PointerSample> {
        self.latest.subscribe()
    }

    pub fn subscribe_display(&self) -> watch::Receiver<PointerPosition> {
        self.display.subscribe()
    }
}

/// Decides whether a pointer move should issue a poll.
///
/// A poll fires when the move differs from the previous event by more than
/// `threshold` on either axis and at least `min_interval` has passed since
/// the previous poll. Connection and loading checks belong to the caller.
#[derive(Debug, Clone)]
pub struct PointerGate {
    threshold: f64,
    min_interval: Duration,
    last_position: PointerPosition,
    last_poll: Option<Instant>,
}

impl PointerGate {
    pub fn new(threshold: f64, min_interval: Duration) -> Self {
        Self {
            threshold,
            min_interval,
            last_position: PointerPosition::default(),
            last_poll: None,
        }
    }

    /// Feed one event; returns true when a poll should be issued now.
    /// `ready` carries the caller's own preconditions (mode on, connected,
    /// no manual query in flight). The last position is updated either way.
    pub fn observe(&mut self, position: PointerPosition, now: Instant, ready: bool) -> bool {
        let moved = (position.x - self.last_position.x).abs() > self.threshold
            || (position.y - self.last_position.y).abs() > self.threshold;
        self.last_position = position;

        if !(ready && moved) {
            return false;
        }
        let elapsed_ok = self
            .last_poll
            .map_or(true, |last| now.saturating_duration_since(last) >= self.min_interval);
        if elapsed_ok {
            self.last_poll = Some(now);
        }
        elapsed_ok
    }

    pub fn reset(&mut self) {
        self.last_poll = None;
    }
}

/// Lets an action through at most once per `min_interval`.
#[derive(Debug, Clone)]
pub struct RateGate {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn try_pass(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
