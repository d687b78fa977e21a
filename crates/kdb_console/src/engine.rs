//! Engine lifecycle collaborator.
//!
//! The console only needs two things from whoever runs the engine: the port
//! to connect to and the command that resets engine state. [`LocalEngine`]
//! provides both and also supervises a local `q` process started with a
//! WebSocket handler script.

use std::fs::File;
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Command that clears every root-namespace variable and reports success.
pub const RESET_COMMAND: &str =
    "delete from `.; `status`message!(`ok;\"KDB+ server reset complete\")";

/// What the console needs from the engine's owner.
pub trait EngineControl: Send + Sync {
    fn port(&self) -> u16;

    /// Command to run as a query to reset the engine. A value starting with
    /// `ERROR:` reports that no reset is possible.
    fn reset_command(&self) -> String;
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("'{0}' executable not found in PATH. Install kdb+ and add it to your PATH")]
    ExecutableNotFound(String),
    #[error("kdb+ is already running")]
    AlreadyRunning,
    #[error("kdb+ process exited unexpectedly: {0}")]
    EarlyExit(String),
    #[error("port {0} is served by a process this console does not manage")]
    PortInUse(u16),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Running,
    Stopped,
}

/// Supervisor for a local `q` process.
#[derive(Debug)]
pub struct LocalEngine {
    executable: String,
    port: u16,
    work_dir: PathBuf,
    startup_grace: Duration,
    restart_delay: Duration,
    process: Mutex<Option<Child>>,
}

impl LocalEngine {
    pub fn new(executable: &str, port: u16) -> Self {
        Self {
            executable: executable.to_string(),
            port,
            work_dir: std::env::temp_dir(),
            startup_grace: Duration::from_secs(2),
            restart_delay: Duration::from_secs(2),
            process: Mutex::new(None),
        }
    }

    /// Directory for the init script and the engine log.
    pub fn with_work_dir(mut self, dir: &Path) -> Self {
        self.work_dir = dir.to_path_buf();
        self
    }

    /// How long a fresh process must survive to count as started.
    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Handler script: evaluate each frame, answer with JSON, and turn
    /// evaluation failures into `{error:ExecutionError, msg:...}`.
    pub fn init_script(&self) -> String {
        format!(
            r#"/ WebSocket handler for kdb-console
.z.wo:{{[x] 0N!"[INFO] WebSocket opened: ",string x}}
.z.wc:{{[x] 0N!"[INFO] WebSocket closed: ",string x}}
.z.ws:{{[x]
  0N!"[QUERY] Received: ",x;
  result: @[value; x; {{[e] 0N!"[ERROR] ",e; (`error;`msg)!(`ExecutionError;e)}}];
  neg[.z.w] .j.j result;
 }}
\p {port}
0N!"[OK] kdb+ WebSocket server listening on port {port}";
"#,
            port = self.port
        )
    }

    pub fn script_path(&self) -> PathBuf {
        self.work_dir.join("kdb_ws_init.q")
    }

    fn process(&self) -> std::sync::MutexGuard<'_, Option<Child>> {
        self.process.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether something accepts TCP connections on the engine port.
    pub fn is_port_served(&self) -> bool {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_ok()
    }

    fn owned_running(&self) -> bool {
        let mut guard = self.process();
        match guard.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(_) => {
                *guard = None;
                false
            }
            None => false,
        }
    }

    pub fn status(&self) -> EngineStatus {
        if self.owned_running() || self.is_port_served() {
            EngineStatus::Running
        } else {
            EngineStatus::Stopped
        }
    }

    pub fn start(&self) -> Result<(), EngineError> {
        if self.status() == EngineStatus::Running {
            return Err(EngineError::AlreadyRunning);
        }
        self.spawn()
    }

    fn spawn(&self) -> Result<(), EngineError> {
        std::fs::create_dir_all(&self.work_dir)?;
        let script = self.script_path();
        std::fs::write(&script, self.init_script())?;
        let log = File::create(self.work_dir.join("kdb_engine.log"))?;

        tracing::info!(executable = %self.executable, port = self.port, "starting kdb+");
        let mut child = Command::new(&self.executable)
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    EngineError::ExecutableNotFound(self.executable.clone())
                }
                _ => EngineError::Io(e),
            })?;

        let deadline = Instant::now() + self.startup_grace;
        while Instant::now() < deadline {
            if let Some(exit) = child.try_wait()? {
                if self.is_port_served() {
                    tracing::info!(port = self.port, "process exited but port is served, assuming external engine");
                    return Ok(());
                }
                return Err(EngineError::EarlyExit(exit.to_string()));
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        tracing::info!(pid = child.id(), "kdb+ process running");
        *self.process() = Some(child);
        Ok(())
    }

    /// Stop the process this supervisor started. Engines it did not start are
    /// left alone.
    pub fn stop(&self) -> Result<(), EngineError> {
        if let Some(mut child) = self.process().take() {
            tracing::info!(pid = child.id(), "stopping kdb+");
            if child.try_wait()?.is_none() {
                child.kill()?;
            }
            child.wait()?;
        }
        Ok(())
    }

    pub fn restart(&self) -> Result<(), EngineError> {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "stop before restart failed");
        }
        std::thread::sleep(self.restart_delay);
        self.spawn()
    }

    /// Stop the owned process and start fresh. Fails when a foreign process
    /// holds the port.
    pub fn force_start(&self) -> Result<(), EngineError> {
        self.stop()?;
        if self.is_port_served() {
            return Err(EngineError::PortInUse(self.port));
        }
        self.spawn()
    }
}

impl EngineControl for LocalEngine {
    fn port(&self) -> u16 {
        self.port
    }

    fn reset_command(&self) -> String {
        RESET_COMMAND.to_string()
    }
}

impl Drop for LocalEngine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "failed to stop kdb+ on shutdown");
        }
    }
}

/// Engine owned elsewhere: a fixed port and the standard reset command.
#[derive(Debug, Clone, Copy)]
pub struct RemoteEngine {
    pub port: u16,
}

impl EngineControl for RemoteEngine {
    fn port(&self) -> u16 {
        self.port
    }

    fn reset_command(&self) -> String {
        RESET_COMMAND.to_string()
    }
}
