//! Backend process supervision - spawns the backend, observes its exit,
//! and delivers termination

use crate::bundle::StartupContext;
use crate::error::LaunchError;
use parking_lot::RwLock;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{Notify, watch};

/// Backend process state as observed by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    /// Spawned, not yet confirmed ready.
    Starting,
    /// Confirmed accepting connections.
    Running,
    /// Terminated; `None` means the process was killed by a signal.
    Exited(Option<i32>),
}

/// Handle to the spawned backend process.
///
/// The `Child` itself is owned by a waiter task, so the handle carries only
/// the state cell and the channels needed to observe exit and request
/// termination. Exit is observed asynchronously, never polled by callers.
#[derive(Debug)]
pub struct BackendHandle {
    pid: u32,
    state: Arc<RwLock<BackendState>>,
    terminate: Arc<Notify>,
    terminate_requested: Arc<AtomicBool>,
    exit_rx: watch::Receiver<BackendState>,
}

impl BackendHandle {
    /// Spawn the backend described by `context`, with the allocated port
    /// appended in decimal as the final argument.
    ///
    /// Returns as soon as the OS confirms process creation; readiness is a
    /// separate, explicit step. stdout/stderr are captured and forwarded to
    /// the logging sink line by line.
    pub fn spawn(context: &StartupContext, port: u16) -> Result<Self, LaunchError> {
        let program = context.command.first().ok_or_else(|| {
            LaunchError::Spawn(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "startup context has an empty command",
            ))
        })?;

        tracing::info!(program = %program, port, "Spawning backend");

        let mut child = Command::new(program)
            .args(&context.command[1..])
            .arg(port.to_string())
            .current_dir(&context.cwd)
            .envs(&context.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(LaunchError::Spawn)?;

        let pid = child.id().unwrap_or(0);

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, "backend stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, "backend stderr"));
        }

        let state = Arc::new(RwLock::new(BackendState::Starting));
        let terminate = Arc::new(Notify::new());
        let terminate_requested = Arc::new(AtomicBool::new(false));
        let (exit_tx, exit_rx) = watch::channel(BackendState::Starting);

        let waiter_state = state.clone();
        let waiter_terminate = terminate.clone();
        let waiter_requested = terminate_requested.clone();
        tokio::spawn(async move {
            let natural = tokio::select! {
                status = child.wait() => Some(status),
                _ = waiter_terminate.notified() => None,
            };

            let status = match natural {
                Some(status) => status,
                None => {
                    // Termination requested: deliver the kill, then collect
                    // the exit so the process is reaped.
                    let _ = child.start_kill();
                    child.wait().await
                }
            };

            let code = match &status {
                Ok(status) => status.code(),
                Err(_) => None,
            };

            let was_running = {
                let mut state = waiter_state.write();
                let was_running = *state == BackendState::Running;
                *state = BackendState::Exited(code);
                was_running
            };

            let requested = waiter_requested.load(Ordering::Relaxed);
            match &status {
                Ok(status) if was_running && !requested => {
                    tracing::warn!(pid, status = %status, "Backend exited unexpectedly");
                }
                Ok(status) => {
                    tracing::info!(pid, status = %status, "Backend exited");
                }
                Err(e) => {
                    tracing::warn!(pid, error = %e, "Failed to collect backend exit status");
                }
            }

            let _ = exit_tx.send(BackendState::Exited(code));
        });

        Ok(Self {
            pid,
            state,
            terminate,
            terminate_requested,
            exit_rx,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> BackendState {
        *self.state.read()
    }

    /// Exit code if the process has exited (`Some(None)` = killed by a
    /// signal), `None` while it is still alive.
    pub fn exit_code(&self) -> Option<Option<i32>> {
        match self.state() {
            BackendState::Exited(code) => Some(code),
            _ => None,
        }
    }

    /// Mark the backend as confirmed ready. Called by the coordinator once
    /// the readiness probe succeeds.
    pub(crate) fn mark_running(&self) {
        let mut state = self.state.write();
        if *state == BackendState::Starting {
            *state = BackendState::Running;
        }
    }

    /// Request termination of the backend. Fire-and-forget: safe to call
    /// after the process exited, repeatedly, or concurrently.
    pub fn terminate(&self) {
        if matches!(self.state(), BackendState::Exited(_)) {
            return;
        }
        tracing::info!(pid = self.pid, "Terminating backend");
        self.terminate_requested.store(true, Ordering::Relaxed);
        self.terminate.notify_one();
    }

    /// Terminate, then wait up to `bound` for the exit to be observed.
    /// Returns whether the exit was confirmed within the bound.
    pub async fn terminate_and_wait(&self, bound: Duration) -> bool {
        self.terminate();
        tokio::time::timeout(bound, self.wait_exited()).await.is_ok()
    }

    /// Wait until the supervisor observes the process exit; returns the
    /// exit code (`None` = killed by a signal). Returns immediately if the
    /// exit has already been observed.
    pub async fn wait_exited(&self) -> Option<i32> {
        let mut rx = self.exit_rx.clone();
        match rx.wait_for(|s| matches!(*s, BackendState::Exited(_))).await {
            Ok(state) => match *state {
                BackendState::Exited(code) => code,
                _ => None,
            },
            Err(_) => self.exit_code().flatten(),
        }
    }
}

/// Forward one captured output stream to the logging sink, line by line.
/// Fire-and-forget observability; the stream has exactly one consumer.
async fn forward_output<R>(stream: R, tag: &'static str)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::info!("[{tag}] {line}");
    }
}
