//! Child-process lifecycle for a locally spawned llama-server.
//!
//! [`ServerManager`] owns at most one server process at a time. `start`
//! spawns the executable, records the handle, then polls `/health` until the
//! server reports ok; if it never does, the process is killed and state
//! rolled back. `stop` signals the held process and clears state. A watcher
//! task clears state if the child exits on its own.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::client::LlamaClient;
use crate::config::Config;
use crate::error::ProcessError;
use crate::types::HealthStatus;

const HEALTH_POLL_ATTEMPTS: u32 = 30;
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(1);
const EXIT_WATCH_INTERVAL: Duration = Duration::from_millis(500);

/// Shared record of the managed child process.
///
/// Invariant: `child` and `pid` are either both present (server presumed
/// running) or both absent. Mutated only by `start`, `stop`, and the
/// exit watcher.
#[derive(Debug, Default)]
pub struct ProcessState {
    child: Option<Child>,
    pid: Option<u32>,
}

impl ProcessState {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_running(&self) -> bool {
        self.pid.is_some()
    }

    fn record(&mut self, child: Child, pid: u32) {
        self.child = Some(child);
        self.pid = Some(pid);
    }

    fn clear(&mut self) {
        self.child = None;
        self.pid = None;
    }

    fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }
}

/// Parameters for [`ServerManager::start`].
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub model: String,
    pub port: u16,
    pub ctx_size: u32,
    pub n_gpu_layers: i32,
    pub threads: Option<u32>,
}

impl StartOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            port: 8080,
            ctx_size: 2048,
            n_gpu_layers: -1,
            threads: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartResult {
    pub status: String,
    pub pid: u32,
    pub model: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopResult {
    pub status: String,
    pub pid: u32,
}

#[derive(Debug, Clone)]
pub struct ServerManager {
    config: Config,
    client: LlamaClient,
    state: Arc<Mutex<ProcessState>>,
    health_attempts: u32,
    health_interval: Duration,
}

impl ServerManager {
    pub fn new(config: Config) -> Self {
        Self::with_state(config, Arc::new(Mutex::new(ProcessState::default())))
    }

    /// Build a manager around an existing state record, letting independent
    /// instances share (or tests inspect) the same process slot.
    pub fn with_state(config: Config, state: Arc<Mutex<ProcessState>>) -> Self {
        let client = LlamaClient::new(config.clone());
        Self {
            config,
            client,
            state,
            health_attempts: HEALTH_POLL_ATTEMPTS,
            health_interval: HEALTH_POLL_INTERVAL,
        }
    }

    /// Override the health-poll budget. Defaults are 30 attempts, 1 s apart.
    pub fn with_health_poll(mut self, attempts: u32, interval: Duration) -> Self {
        self.health_attempts = attempts;
        self.health_interval = interval;
        self
    }

    /// Pid of the managed process, if one is recorded as running.
    pub async fn current_pid(&self) -> Option<u32> {
        self.state.lock().await.pid()
    }

    pub async fn start(&self, opts: StartOptions) -> Result<StartResult, ProcessError> {
        let mut state = self.state.lock().await;
        if let Some(pid) = state.pid() {
            return Err(ProcessError::AlreadyRunning(pid));
        }

        let args = build_args(&opts);
        tracing::info!(model = %opts.model, port = opts.port, "starting llama-server");

        let mut child = Command::new(&self.config.server_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                path: self.config.server_bin.clone(),
                source,
            })?;

        let pid = match child.id() {
            Some(pid) => pid,
            None => {
                let _ = child.start_kill();
                return Err(ProcessError::NoPid {
                    path: self.config.server_bin.clone(),
                });
            }
        };

        if let Some(stdout) = child.stdout.take() {
            spawn_output_drain("stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_output_drain("stderr", stderr);
        }

        // Recorded before health confirmation: the process exists from here on.
        state.record(child, pid);
        drop(state);

        self.spawn_exit_watcher(pid);

        if !self.poll_until_healthy().await {
            let mut state = self.state.lock().await;
            // The exit watcher may have cleared the slot already.
            if state.pid() == Some(pid) {
                if let Some(child) = state.child_mut() {
                    let _ = child.start_kill();
                }
                state.clear();
            }
            return Err(ProcessError::Unhealthy {
                attempts: self.health_attempts,
            });
        }

        tracing::info!(pid, "llama-server healthy");
        Ok(StartResult {
            status: "started".to_string(),
            pid,
            model: opts.model,
            port: opts.port,
        })
    }

    /// One attempt per health call; "loading" and transport errors both
    /// count as not-yet-ready.
    async fn poll_until_healthy(&self) -> bool {
        for attempt in 1..=self.health_attempts {
            match self.client.health().await {
                Ok(health) if health.status == HealthStatus::Ok => return true,
                Ok(health) => {
                    tracing::debug!(attempt, status = ?health.status, "llama-server not ready")
                }
                Err(e) => tracing::debug!(attempt, error = %e, "health check failed"),
            }
            if attempt < self.health_attempts {
                tokio::time::sleep(self.health_interval).await;
            }
        }
        false
    }

    pub async fn stop(&self) -> Result<StopResult, ProcessError> {
        let mut state = self.state.lock().await;
        let pid = state.pid().ok_or(ProcessError::NotRunning)?;

        // State is cleared only after the signal goes through; a failed
        // signal leaves the record untouched.
        if let Some(child) = state.child_mut() {
            child
                .start_kill()
                .map_err(|source| ProcessError::Signal { pid, source })?;
        }
        state.clear();

        tracing::info!(pid, "llama-server stopped");
        Ok(StopResult {
            status: "stopped".to_string(),
            pid,
        })
    }

    /// Clears the state record back to stopped when the child exits on its
    /// own. The task ends once the slot no longer holds the watched pid.
    fn spawn_exit_watcher(&self, pid: u32) {
        let state = self.state.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(EXIT_WATCH_INTERVAL).await;
                let mut guard = state.lock().await;
                if guard.pid() != Some(pid) {
                    break;
                }
                match guard.child_mut().map(|child| child.try_wait()) {
                    Some(Ok(None)) => {}
                    Some(Ok(Some(status))) => {
                        tracing::warn!(pid, %status, "llama-server exited");
                        guard.clear();
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(pid, error = %e, "failed to poll llama-server");
                        guard.clear();
                        break;
                    }
                    None => break,
                }
            }
        });
    }
}

fn build_args(opts: &StartOptions) -> Vec<String> {
    let mut args = vec![
        "-m".to_string(),
        opts.model.clone(),
        "--port".to_string(),
        opts.port.to_string(),
        "-c".to_string(),
        opts.ctx_size.to_string(),
        "-ngl".to_string(),
        opts.n_gpu_layers.to_string(),
    ];
    if let Some(threads) = opts.threads {
        args.push("-t".to_string());
        args.push(threads.to_string());
    }
    args
}

fn spawn_output_drain<R>(stream: &'static str, mut reader: R)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        use tokio::io::AsyncReadExt;
        let mut buf = [0u8; 1024];
        while let Ok(n) = reader.read(&mut buf).await {
            if n == 0 {
                break;
            }
            let msg = String::from_utf8_lossy(&buf[..n]);
            tracing::debug!(stream, "llama-server: {}", msg.trim());
        }
    });
}
