//! kdb+ console core: WebSocket transport, result classification, manual
//! queries, live and pointer-driven polling, the session ledger and the
//! merged console view. Used by the `kdb-console` binary.

pub mod aggregate;
pub mod classify;
pub mod client;
pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod export;
pub mod format;
pub mod ledger;
pub mod messages;
pub mod pointer;
pub mod scheduler;

pub use aggregate::{aggregate, ViewEntry, DEFAULT_DISPLAY_CAP};
pub use classify::{classify, Shape, ShapeKind};
pub use client::{connect, Client, ClientOptions, ConnectionState, TransportEvent};
pub use config::{default_config_path, Config, ConfigError, ConsoleSection, EngineSection};
pub use console::{
    Console, ConsoleBuilder, ConsoleEvent, ConsoleSettings, Interaction, NoticeLevel, VisualSink,
};
pub use engine::{EngineControl, EngineError, EngineStatus, LocalEngine, RemoteEngine};
pub use error::{EngineFailure, TransportError};
pub use export::ExportError;
pub use ledger::{
    ContinuousSession, EntryId, GroupOutcome, History, Ledger, LogEntry, LogKind, PollMode,
    PollOutcome, PolledResult, ResultGroup,
};
pub use messages::{frame_query, Outcome, Reply};
pub use pointer::{PointerGate, PointerPosition, PointerTracker, RateGate};
pub use scheduler::{LiveTicker, ModeState, SessionMachine, Transition};
