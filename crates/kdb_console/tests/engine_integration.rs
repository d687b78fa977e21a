//! Local engine supervisor: script generation, spawn failures, status and the
//! process lifecycle (driven by small stand-in executables).

use std::net::TcpListener;
use std::time::Duration;

use kdb_console::engine::{
    EngineControl, EngineError, EngineStatus, LocalEngine, RemoteEngine, RESET_COMMAND,
};

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn init_script_installs_handler_on_port() {
    let engine = LocalEngine::new("q", 6123);
    let script = engine.init_script();
    assert!(script.contains(".z.ws:{[x]"));
    assert!(script.contains("`ExecutionError"));
    assert!(script.contains(".j.j result"));
    assert!(script.contains("\\p 6123"));
    assert_eq!(engine.port(), 6123);
    assert_eq!(engine.reset_command(), RESET_COMMAND);
}

#[test]
fn remote_engine_reports_port_and_reset() {
    let remote = RemoteEngine { port: 5001 };
    assert_eq!(remote.port(), 5001);
    assert!(remote.reset_command().starts_with("delete from `."));
}

#[test]
fn missing_executable_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let engine =
        LocalEngine::new("kdb-console-no-such-q", free_port()).with_work_dir(dir.path());
    let err = engine.start().unwrap_err();
    assert!(matches!(err, EngineError::ExecutableNotFound(ref exe) if exe == "kdb-console-no-such-q"));
    assert!(err.to_string().contains("not found in PATH"));
    // The script is written before the spawn attempt.
    assert!(engine.script_path().exists());
}

#[test]
fn stopped_when_nothing_runs() {
    let engine = LocalEngine::new("q", free_port());
    assert_eq!(engine.status(), EngineStatus::Stopped);
    assert!(!engine.is_port_served());
    engine.stop().unwrap();
}

#[test]
fn foreign_listener_blocks_start() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let engine = LocalEngine::new("q", port);

    assert!(engine.is_port_served());
    assert_eq!(engine.status(), EngineStatus::Running);
    assert!(matches!(engine.start(), Err(EngineError::AlreadyRunning)));
    assert!(matches!(engine.force_start(), Err(EngineError::PortInUse(p)) if p == port));
}

#[cfg(unix)]
mod process {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn stand_in(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-q");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn early_exit_is_a_start_failure() {
        let dir = tempfile::tempdir().unwrap();
        let exe = stand_in(dir.path(), "exit 3");
        let engine = LocalEngine::new(exe.to_str().unwrap(), free_port())
            .with_work_dir(dir.path())
            .with_startup_grace(Duration::from_millis(500));

        let err = engine.start().unwrap_err();
        assert!(matches!(err, EngineError::EarlyExit(_)), "got {:?}", err);
        assert_eq!(engine.status(), EngineStatus::Stopped);
    }

    #[test]
    fn start_stop_restart_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let exe = stand_in(dir.path(), "exec sleep 30");
        let engine = LocalEngine::new(exe.to_str().unwrap(), free_port())
            .with_work_dir(dir.path())
            .with_startup_grace(Duration::from_millis(200))
            .with_restart_delay(Duration::from_millis(10));

        engine.start().unwrap();
        assert_eq!(engine.status(), EngineStatus::Running);
        assert!(matches!(engine.start(), Err(EngineError::AlreadyRunning)));
        let script = std::fs::read_to_string(engine.script_path()).unwrap();
        assert_eq!(script, engine.init_script());

        engine.stop().unwrap();
        assert_eq!(engine.status(), EngineStatus::Stopped);

        engine.restart().unwrap();
        assert_eq!(engine.status(), EngineStatus::Running);

        engine.force_start().unwrap();
        assert_eq!(engine.status(), EngineStatus::Running);
        engine.stop().unwrap();
        assert_eq!(engine.status(), EngineStatus::Stopped);
    }
}
