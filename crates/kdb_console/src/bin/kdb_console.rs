//! kdb-console: line console for a kdb+ engine over WebSocket.
//! With a query argument, runs it once and prints the result. Without one,
//! reads queries and `:` commands from stdin. `--start-engine` runs a local
//! kdb+ process for the lifetime of the console.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use clap::Parser;
use kdb_console::classify::classify;
use kdb_console::config::{self, Config};
use kdb_console::engine::{EngineControl, EngineError, EngineStatus, LocalEngine};
use kdb_console::format::{format_result, preview, summary_line};
use kdb_console::ledger::{EntryId, GroupOutcome, PollOutcome};
use kdb_console::messages::display_scalar;
use kdb_console::{
    ClientOptions, Console, ConsoleEvent, ConsoleSettings, Interaction, NoticeLevel,
    PointerPosition, Transition, ViewEntry,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kdb-console")]
#[command(about = "Query console for a kdb+ WebSocket engine", long_about = None)]
struct Cli {
    /// Config file (defaults to $KDB_CONSOLE_CONFIG, then ~/.kdb-console/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Start a local kdb+ process (engine.executable) before connecting
    #[arg(long)]
    start_engine: bool,
    /// Run this query once and exit
    query: Option<String>,
}

/// Explicit paths must load; the default path may be missing.
fn load_config(flag: Option<PathBuf>) -> Result<Config, String> {
    let explicit = flag.or_else(|| std::env::var_os("KDB_CONSOLE_CONFIG").map(PathBuf::from));
    match explicit {
        Some(path) => config::load(&path)
            .map_err(|e| format!("failed to load config from {}: {}", path.display(), e)),
        None => match config::default_config_path() {
            Some(path) => config::load_or_default(&path)
                .map_err(|e| format!("failed to load config from {}: {}", path.display(), e)),
            None => Ok(Config::default()),
        },
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let cfg = match load_config(cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to create runtime: {}", e);
            process::exit(1);
        });

    let engine = Arc::new(LocalEngine::new(
        cfg.engine.executable(),
        cfg.engine.port(),
    ));
    let code = rt.block_on(async {
        if cli.start_engine {
            if let Err(e) = ensure_started(&engine).await {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
        match cli.query {
            Some(query) => run_once(&cfg, &query).await,
            None => run_interactive(&cfg, Arc::clone(&engine)).await,
        }
    });
    drop(rt);
    // Stops a process this run started; exit skips destructors.
    drop(engine);
    process::exit(code);
}

fn client_options(cfg: &Config) -> ClientOptions {
    ClientOptions {
        connect_timeout: cfg.engine.connect_timeout(),
        request_timeout: cfg.engine.request_timeout(),
    }
}

async fn run_once(cfg: &Config, query: &str) -> i32 {
    let console = Console::new(ConsoleSettings::from(&cfg.console));
    if let Err(e) = console
        .connect(&cfg.engine.url(), client_options(cfg))
        .await
    {
        eprintln!("Error: {}", e);
        return 1;
    }

    let code = match console.execute_query(query).await.and_then(|id| console.group(id)) {
        Some(group) => match group.outcome {
            GroupOutcome::Response { value, .. } => {
                println!("{}", format_result(&value));
                0
            }
            GroupOutcome::Error { text, .. } => {
                eprintln!("Error: {}", text);
                1
            }
            GroupOutcome::Pending => 1,
        },
        None => {
            eprintln!("Error: query was not sent");
            1
        }
    };
    console.disconnect().await;
    code
}

/// Run a blocking supervisor call off the runtime thread.
async fn engine_call<T, F>(engine: &Arc<LocalEngine>, op: F) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: FnOnce(&LocalEngine) -> Result<T, EngineError> + Send + 'static,
{
    let engine = Arc::clone(engine);
    tokio::task::spawn_blocking(move || op(&engine))
        .await
        .map_err(|e| EngineError::Io(io::Error::other(e)))?
}

/// Start the local engine unless something already serves its port.
async fn ensure_started(engine: &Arc<LocalEngine>) -> Result<(), EngineError> {
    match engine_call(engine, LocalEngine::start).await {
        Ok(()) => {
            println!("kdb+ started on port {}", engine.port());
            Ok(())
        }
        Err(EngineError::AlreadyRunning) => {
            tracing::info!(port = engine.port(), "engine already running");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn engine_command(engine: &Arc<LocalEngine>, args: &[&str]) {
    let port = engine.port();
    let outcome = match args.first().copied() {
        Some("start") => engine_call(engine, LocalEngine::start)
            .await
            .map(|()| format!("kdb+ started on port {}", port)),
        Some("stop") => engine_call(engine, LocalEngine::stop)
            .await
            .map(|()| "kdb+ stopped".to_string()),
        Some("restart") => engine_call(engine, LocalEngine::restart)
            .await
            .map(|()| format!("kdb+ restarted on port {}", port)),
        Some("force") => engine_call(engine, LocalEngine::force_start)
            .await
            .map(|()| format!("kdb+ started on port {}", port)),
        Some("status") => engine_call(engine, |e| Ok(e.status()))
            .await
            .map(|status| match status {
                EngineStatus::Running => format!("kdb+ running on port {}", port),
                EngineStatus::Stopped => "kdb+ stopped".to_string(),
            }),
        _ => {
            eprintln!("Usage: :engine start|stop|restart|force|status");
            return;
        }
    };
    match outcome {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: {}", e),
    }
}

async fn run_interactive(cfg: &Config, engine: Arc<LocalEngine>) -> i32 {
    let visual: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let sink_slot = Arc::clone(&visual);
    let console = Console::builder()
        .settings(ConsoleSettings::from(&cfg.console))
        .engine(engine.clone())
        .sink(Arc::new(move |value| {
            if let Ok(mut slot) = sink_slot.lock() {
                *slot = value;
            }
        }))
        .build();
    console.set_interaction(Interaction {
        pointer_over: false,
        input_focused: true,
    });

    let mut events = console.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let ConsoleEvent::Notice { level, text } = event {
                let tag = match level {
                    NoticeLevel::Info => "info",
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Warning => "warn",
                    NoticeLevel::Error => "error",
                };
                eprintln!("[{}] {}", tag, text);
            }
        }
    });

    let options = client_options(cfg);
    let url = cfg.engine.url();
    // Failures arrive as notices.
    let _ = console.connect(&url, options).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: failed to read input: {}", e);
                break;
            }
        };
        let line = line.trim();
        if let Some(command) = line.strip_prefix(':') {
            let mut parts = command.split_whitespace();
            let name = parts.next().unwrap_or_default();
            let args: Vec<&str> = parts.collect();
            match name {
                "quit" | "q" => break,
                "connect" => {
                    let _ = console.connect(&url, options).await;
                }
                "disconnect" => console.disconnect().await,
                "live" => report(console.toggle_live()),
                "pointer" => report(console.toggle_pointer()),
                "move" => move_pointer(&console, &args),
                "up" => recall(console.history_up()),
                "down" => recall(console.history_down()),
                "clear" => console.clear_results(),
                "clear-live" => console.clear_live_results(),
                "clear-sessions" => console.clear_sessions(),
                "clear-all" => console.clear_console(),
                "engine" => engine_command(&engine, &args).await,
                "reset" => {
                    console.reset_engine().await;
                }
                "rm" => with_id(&args, |id| {
                    if !(console.remove_group(id) || console.remove_session(id)) {
                        eprintln!("No entry {}", id);
                    }
                }),
                "toggle" => with_id(&args, |id| {
                    if console
                        .toggle_group(id)
                        .or_else(|| console.toggle_session(id))
                        .is_none()
                    {
                        eprintln!("No entry {}", id);
                    }
                }),
                "export" => with_id(&args, |id| export(&console, id, args.get(1).copied())),
                "view" => print_view(&console, &visual),
                other => eprintln!("Unknown command :{}", other),
            }
            continue;
        }

        // An empty line runs whatever history recall put in the buffer.
        if !line.is_empty() {
            console.set_input(line);
        }
        if let Some(id) = console.submit().await {
            if let Some(group) = console.group(id) {
                print_group_body(&group.outcome, true);
            }
        }
    }

    console.clear_sessions();
    console.disconnect().await;
    0
}

fn prompt() {
    let mut out = io::stdout().lock();
    let _ = write!(out, "q)");
    let _ = out.flush();
}

fn report(transition: Transition) {
    match transition {
        Transition::Opened { mode, session, .. } => println!("{} mode on (session {})", mode, session),
        Transition::Closed(session) => println!("session {} closed", session),
        Transition::Rejected(_) => {}
    }
}

fn recall(entry: Option<String>) {
    if let Some(query) = entry {
        println!("{}", query);
    }
}

fn move_pointer(console: &Console, args: &[&str]) {
    let coords: Option<Vec<f64>> = args.iter().map(|a| a.parse().ok()).collect();
    match coords.as_deref() {
        Some([x, y]) => {
            console.pointer_moved_at(PointerPosition::clamped(*x, *y), Instant::now());
        }
        _ => eprintln!("Usage: :move X Y (0..1)"),
    }
}

fn with_id(args: &[&str], f: impl FnOnce(EntryId)) {
    match args.first().map(|a| a.parse::<EntryId>()) {
        Some(Ok(id)) => f(id),
        _ => eprintln!("Expected an entry id"),
    }
}

fn export(console: &Console, id: EntryId, csv_path: Option<&str>) {
    if let Some(path) = csv_path {
        let value = console.group(id).and_then(|g| g.response().cloned());
        match value {
            Some(value) => match kdb_console::export::write_table_csv(&value, Path::new(path)) {
                Ok(()) => println!("Exported to {}", path),
                Err(e) => eprintln!("Error: {}", e),
            },
            None => eprintln!("No result for {}", id),
        }
        return;
    }
    let exported = console
        .export_group(id)
        .or_else(|| console.export_session(id));
    match exported {
        Some(json) => println!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        ),
        None => eprintln!("No entry {}", id),
    }
}

fn print_group_body(outcome: &GroupOutcome, expanded: bool) {
    match outcome {
        GroupOutcome::Pending => println!("  ..."),
        GroupOutcome::Response { value, .. } => {
            let text = format_result(value);
            let shown = if expanded { text } else { preview(&text).text };
            println!("{}", shown);
        }
        GroupOutcome::Error { text, .. } => eprintln!("{}", text),
    }
}

fn print_view(console: &Console, visual: &Mutex<Option<Value>>) {
    console.with_view(|entries| {
        for entry in entries {
            match entry {
                ViewEntry::Group(g) => {
                    println!("[{}] > {}", g.id, g.query);
                    match (&g.outcome, g.expanded) {
                        (GroupOutcome::Response { value, .. }, false) => {
                            println!("  {}", summary_line(value))
                        }
                        (outcome, expanded) => print_group_body(outcome, expanded),
                    }
                }
                ViewEntry::Session(s) => {
                    let state = if s.is_open() { "open" } else { "closed" };
                    println!(
                        "[{}] {} {} ({} results, {})",
                        s.id,
                        s.mode,
                        s.query,
                        s.results.len(),
                        state
                    );
                    if let Some(last) = s.last_result() {
                        match &last.outcome {
                            PollOutcome::Result(v) => println!("  last: {}", summary_line(v)),
                            PollOutcome::Error(e) => println!("  last: {}", e),
                        }
                    }
                }
                ViewEntry::Log(l) => println!("{} {}", l.kind.marker(), display_scalar(&l.content)),
            }
        }
    });
    let current = visual.lock().ok().and_then(|slot| slot.clone());
    if let Some(value) = current {
        println!("visual: {:?}", classify(&value).kind());
    }
}
