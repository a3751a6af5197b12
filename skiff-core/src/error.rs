//! Startup failure taxonomy shared across the lifecycle components

use crate::lifecycle::LifecyclePhase;
use std::time::Duration;

/// Errors that abort a backend startup. All of these are fatal: the caller
/// is expected to surface them and terminate the application rather than
/// retry or present a half-initialized window.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Failed to allocate a loopback port: {0}")]
    PortAllocation(#[source] std::io::Error),

    #[error("Failed to spawn backend process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Backend did not accept connections within {elapsed:?}")]
    StartupTimeout { elapsed: Duration },

    #[error("Backend exited during startup (exit code {code:?})")]
    BackendExited { code: Option<i32> },

    #[error("Startup is only valid from the idle phase (current phase {0:?})")]
    NotIdle(LifecyclePhase),
}
