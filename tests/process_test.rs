//! Integration tests for the llama-server process lifecycle manager. A
//! throwaway shell script stands in for the server executable and an axum
//! mock answers the health polls.

#![cfg(unix)]

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

use llama_server_mcp::{Config, ProcessError, ServerManager, StartOptions};

fn fake_server(dir: &tempfile::TempDir, script: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("llama-server");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Mock llama-server that always reports the given health status.
async fn health_server(status: &'static str) -> String {
    let app = Router::new().route(
        "/health",
        get(move || async move {
            Json(json!({"status": status, "slots_idle": 1, "slots_processing": 0}))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn manager(base_url: String, bin: PathBuf) -> ServerManager {
    ServerManager::new(Config::new(base_url, Duration::from_secs(2), bin))
        .with_health_poll(3, Duration::from_millis(50))
}

#[tokio::test]
async fn stop_when_not_running_fails_without_signaling() {
    let mgr = manager("http://127.0.0.1:9".to_string(), PathBuf::from("/bin/true"));
    let err = mgr.stop().await.unwrap_err();
    assert!(matches!(err, ProcessError::NotRunning), "got {:?}", err);
    assert!(err.to_string().contains("not running"));
}

#[tokio::test]
async fn start_with_missing_executable_fails_and_stays_stopped() {
    let mgr = manager(
        "http://127.0.0.1:9".to_string(),
        PathBuf::from("/nonexistent/llama-server-test"),
    );
    let err = mgr.start(StartOptions::new("/m.gguf")).await.unwrap_err();
    assert!(err.to_string().contains("failed to start"));
    assert!(err.to_string().contains("/nonexistent/llama-server-test"));
    assert!(mgr.current_pid().await.is_none());
}

#[tokio::test]
async fn start_succeeds_once_health_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_server(&dir, "exec sleep 30");
    let base_url = health_server("ok").await;
    let mgr = manager(base_url, bin);

    let started = mgr.start(StartOptions::new("/m.gguf")).await.unwrap();
    assert_eq!(started.status, "started");
    assert_eq!(started.model, "/m.gguf");
    assert_eq!(started.port, 8080);
    assert!(started.pid > 0);
    assert_eq!(mgr.current_pid().await, Some(started.pid));

    let stopped = mgr.stop().await.unwrap();
    assert_eq!(stopped.status, "stopped");
    assert_eq!(stopped.pid, started.pid);
    assert!(mgr.current_pid().await.is_none());
}

#[tokio::test]
async fn second_start_fails_with_running_pid() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_server(&dir, "exec sleep 30");
    let base_url = health_server("ok").await;
    let mgr = manager(base_url, bin);

    let started = mgr.start(StartOptions::new("/m.gguf")).await.unwrap();
    let err = mgr.start(StartOptions::new("/other.gguf")).await.unwrap_err();
    assert!(matches!(err, ProcessError::AlreadyRunning(pid) if pid == started.pid));
    assert!(err.to_string().contains("already running"));
    assert!(err.to_string().contains(&started.pid.to_string()));

    // Still exactly one process recorded.
    assert_eq!(mgr.current_pid().await, Some(started.pid));
    mgr.stop().await.unwrap();
}

#[tokio::test]
async fn second_stop_fails_after_first() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_server(&dir, "exec sleep 30");
    let base_url = health_server("ok").await;
    let mgr = manager(base_url, bin);

    mgr.start(StartOptions::new("/m.gguf")).await.unwrap();
    mgr.stop().await.unwrap();
    let err = mgr.stop().await.unwrap_err();
    assert!(matches!(err, ProcessError::NotRunning));
}

#[tokio::test]
async fn start_rolls_back_when_server_stays_loading() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_server(&dir, "exec sleep 30");
    let base_url = health_server("loading").await;
    let mgr = manager(base_url, bin);

    let err = mgr.start(StartOptions::new("/m.gguf")).await.unwrap_err();
    assert!(matches!(err, ProcessError::Unhealthy { attempts: 3 }), "got {:?}", err);
    assert!(err.to_string().contains("did not become healthy"));
    assert!(mgr.current_pid().await.is_none());

    let err = mgr.stop().await.unwrap_err();
    assert!(matches!(err, ProcessError::NotRunning));
}

#[tokio::test]
async fn start_rolls_back_when_health_is_unreachable() {
    // Health polls hit a port nothing listens on; every attempt errors.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let bin = fake_server(&dir, "exec sleep 30");
    let mgr = manager(format!("http://{}", addr), bin);

    let err = mgr.start(StartOptions::new("/m.gguf")).await.unwrap_err();
    assert!(matches!(err, ProcessError::Unhealthy { .. }), "got {:?}", err);
    assert!(mgr.current_pid().await.is_none());
}

#[tokio::test]
async fn child_exit_clears_state_on_its_own() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_server(&dir, "exec sleep 1");
    let base_url = health_server("ok").await;
    let mgr = manager(base_url, bin);

    let started = mgr.start(StartOptions::new("/m.gguf")).await.unwrap();
    assert_eq!(mgr.current_pid().await, Some(started.pid));

    // The script exits after a second; the exit watcher clears the slot.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(mgr.current_pid().await.is_none());

    let err = mgr.stop().await.unwrap_err();
    assert!(matches!(err, ProcessError::NotRunning));
}

#[tokio::test]
async fn start_result_serializes_for_tool_output() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_server(&dir, "exec sleep 30");
    let base_url = health_server("ok").await;
    let mgr = manager(base_url, bin);

    let mut opts = StartOptions::new("/m.gguf");
    opts.port = 9090;
    let started = mgr.start(opts).await.unwrap();

    let value: Value = serde_json::to_value(&started).unwrap();
    assert_eq!(value["status"], "started");
    assert_eq!(value["model"], "/m.gguf");
    assert_eq!(value["port"], 9090);
    assert_eq!(value["pid"], started.pid);

    mgr.stop().await.unwrap();
}
