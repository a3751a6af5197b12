//! Loopback port allocation - asks the OS for a free ephemeral port

use crate::error::LaunchError;
use tokio::net::TcpListener;

/// Bind an ephemeral listener on loopback, read back the OS-assigned port,
/// and release it.
///
/// The port can in principle be reclaimed by another process between the
/// release here and the backend's own bind; the readiness probe plus the
/// supervisor's exit observation cover that window. Bind failures are
/// surfaced, never silently retried.
pub async fn allocate() -> Result<u16, LaunchError> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(LaunchError::PortAllocation)?;
    let port = listener
        .local_addr()
        .map_err(LaunchError::PortAllocation)?
        .port();
    drop(listener);

    tracing::debug!(port, "Allocated backend port");
    Ok(port)
}
