//! Lifecycle coordination - drives allocation, spawn, and readiness in
//! order at startup, and owns teardown

use crate::bundle::StartupContext;
use crate::error::LaunchError;
use crate::port;
use crate::readiness::{self, ProbeConfig, ReadinessResult};
use crate::supervisor::{BackendHandle, BackendState};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Coordinator phases. `Failed` and `Terminated` are terminal: there is no
/// path back to `Idle` within a process lifetime, a fresh `Lifecycle` is
/// required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Idle,
    Allocating,
    Spawning,
    WaitingReady,
    Ready,
    Failed,
    ShuttingDown,
    Terminated,
}

/// Drives one backend lifecycle: a single startup attempt followed by a
/// single (idempotent) shutdown.
///
/// The backend handle lives inside the coordinator instance, so multiple
/// independent lifecycles can coexist (in tests, for example); at most one
/// handle exists per coordinator at a time.
pub struct Lifecycle {
    context: StartupContext,
    probe: ProbeConfig,
    phase: RwLock<LifecyclePhase>,
    handle: RwLock<Option<Arc<BackendHandle>>>,
}

impl Lifecycle {
    pub fn new(context: StartupContext) -> Self {
        Self::with_probe_config(context, ProbeConfig::default())
    }

    pub fn with_probe_config(context: StartupContext, probe: ProbeConfig) -> Self {
        Self {
            context,
            probe,
            phase: RwLock::new(LifecyclePhase::Idle),
            handle: RwLock::new(None),
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.read()
    }

    /// Backend process state, if a backend was spawned.
    pub fn backend_state(&self) -> Option<BackendState> {
        self.handle.read().as_ref().map(|h| h.state())
    }

    /// Run the startup sequence: allocate a loopback port, spawn the
    /// backend with it, and wait until the port accepts connections.
    /// Returns the confirmed port; the GUI layer must not load backend
    /// content before this returns.
    ///
    /// Fatal on the first failing step - any spawned child is terminated
    /// before the error propagates, and nothing is retried.
    pub async fn startup(&self) -> Result<u16, LaunchError> {
        {
            let mut phase = self.phase.write();
            if *phase != LifecyclePhase::Idle {
                return Err(LaunchError::NotIdle(*phase));
            }
            *phase = LifecyclePhase::Allocating;
        }

        let port = match port::allocate().await {
            Ok(port) => port,
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };

        if !self.advance(LifecyclePhase::Spawning) {
            return Err(LaunchError::NotIdle(self.phase()));
        }

        let handle = match BackendHandle::spawn(&self.context, port) {
            Ok(handle) => Arc::new(handle),
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };
        *self.handle.write() = Some(handle.clone());

        if !self.advance(LifecyclePhase::WaitingReady) {
            // A shutdown raced the spawn; make sure the child dies.
            handle.terminate();
            let code = handle.wait_exited().await;
            return Err(LaunchError::BackendExited { code });
        }

        tracing::info!(port, pid = handle.pid(), "Waiting for backend readiness");

        let result = tokio::select! {
            result = readiness::wait_until_ready(port, &self.probe) => result,
            code = handle.wait_exited() => {
                // Fast-fail: the child died before ever accepting a
                // connection, no point waiting out the probe deadline.
                self.fail();
                return Err(LaunchError::BackendExited { code });
            }
        };

        match result {
            ReadinessResult::Ready { elapsed } => {
                if !self.advance(LifecyclePhase::Ready) {
                    handle.terminate();
                    return Err(LaunchError::NotIdle(self.phase()));
                }
                handle.mark_running();
                tracing::info!(port, ?elapsed, "Backend is ready");
                Ok(port)
            }
            ReadinessResult::TimedOut { elapsed } => {
                handle.terminate();
                self.fail();
                Err(LaunchError::StartupTimeout { elapsed })
            }
        }
    }

    /// Idempotent shutdown: terminate the backend if one was spawned.
    ///
    /// Safe to call from any phase, repeatedly across distinct quit
    /// triggers, and concurrently with an in-flight `startup` - once a
    /// child exists it is terminated even if readiness never completed.
    /// Termination-path failures are suppressed, never surfaced.
    pub fn shutdown(&self) {
        {
            let mut phase = self.phase.write();
            if *phase == LifecyclePhase::Terminated {
                return;
            }
            *phase = LifecyclePhase::ShuttingDown;
        }

        if let Some(handle) = self.handle.read().clone() {
            handle.terminate();
        }

        self.set_phase(LifecyclePhase::Terminated);
    }

    /// Shutdown, then wait up to `bound` for the supervisor to observe the
    /// exit. Returns false when a backend was spawned but its exit was not
    /// confirmed within the bound.
    pub async fn shutdown_and_wait(&self, bound: Duration) -> bool {
        self.shutdown();
        let handle = self.handle.read().clone();
        match handle {
            Some(handle) => handle.terminate_and_wait(bound).await,
            None => true,
        }
    }

    fn set_phase(&self, phase: LifecyclePhase) {
        *self.phase.write() = phase;
    }

    /// Move to `next` unless a shutdown raced in; returns false when the
    /// lifecycle is already shutting down or terminated.
    fn advance(&self, next: LifecyclePhase) -> bool {
        let mut phase = self.phase.write();
        if matches!(
            *phase,
            LifecyclePhase::ShuttingDown | LifecyclePhase::Terminated
        ) {
            return false;
        }
        *phase = next;
        true
    }

    /// Mark the lifecycle failed, unless a shutdown already claimed it.
    fn fail(&self) {
        let mut phase = self.phase.write();
        if !matches!(
            *phase,
            LifecyclePhase::ShuttingDown | LifecyclePhase::Terminated
        ) {
            *phase = LifecyclePhase::Failed;
        }
    }
}


#[cfg(all(test, unix))]
mod unix_tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Instant;
    use tempfile::TempDir;

    fn script_context(dir: &TempDir, script: &str) -> StartupContext {
        let path = dir.path().join("backend.sh");
        std::fs::write(&path, script).unwrap();
        StartupContext {
            command: vec!["/bin/sh".to_string(), path.to_string_lossy().to_string()],
            env: HashMap::new(),
            cwd: dir.path().to_path_buf(),
        }
    }

    #[tokio::test]
    async fn child_exit_during_wait_fails_fast() {
        let dir = TempDir::new().unwrap();
        let lifecycle = Lifecycle::with_probe_config(
            script_context(&dir, "exit 3"),
            ProbeConfig {
                timeout: Duration::from_secs(10),
                backoff: Duration::from_millis(100),
            },
        );

        let started = Instant::now();
        let err = lifecycle.startup().await.unwrap_err();

        assert!(matches!(err, LaunchError::BackendExited { code: Some(3) }));
        // Far below the 10s probe deadline.
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(lifecycle.phase(), LifecyclePhase::Failed);
    }

    #[tokio::test]
    async fn readiness_timeout_terminates_the_child() {
        let dir = TempDir::new().unwrap();
        let lifecycle = Lifecycle::with_probe_config(
            script_context(&dir, "sleep 30"),
            ProbeConfig {
                timeout: Duration::from_millis(500),
                backoff: Duration::from_millis(200),
            },
        );

        let err = lifecycle.startup().await.unwrap_err();
        assert!(matches!(err, LaunchError::StartupTimeout { .. }));
        assert_eq!(lifecycle.phase(), LifecyclePhase::Failed);

        // No orphan: the sleeping child received the termination signal.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if matches!(lifecycle.backend_state(), Some(BackendState::Exited(_))) {
                break;
            }
            assert!(Instant::now() < deadline, "child was never terminated");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
