//! Readiness probing - polls the backend port until it accepts connections

use crate::defaults;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Probe timing knobs.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Overall deadline for the backend to start accepting connections.
    pub timeout: Duration,
    /// Fixed delay between connection attempts. Interpreter startup is
    /// short and bounded, so a fixed interval beats exponential backoff
    /// here: no added latency in the common 1-3 second case.
    pub backoff: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: defaults::READY_TIMEOUT,
            backoff: defaults::READY_BACKOFF,
        }
    }
}

/// Outcome of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessResult {
    /// The port accepted a connection.
    Ready { elapsed: Duration },
    /// Nothing accepted within the deadline. Callers must surface this as
    /// a fatal startup error, not ignore it.
    TimedOut { elapsed: Duration },
}

/// Poll `127.0.0.1:port` at a fixed interval until it accepts a TCP
/// connection or the deadline passes.
///
/// A bare accept is the whole contract; payload-level health is the
/// caller's concern. The probe connection is closed immediately.
pub async fn wait_until_ready(port: u16, config: &ProbeConfig) -> ReadinessResult {
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        match TcpStream::connect(("127.0.0.1", port)).await {
            Ok(stream) => {
                drop(stream);
                let elapsed = started.elapsed();
                tracing::debug!(port, attempts, ?elapsed, "Backend accepted a probe connection");
                return ReadinessResult::Ready { elapsed };
            }
            Err(e) => {
                tracing::trace!(port, attempts, error = %e, "Probe connection failed");
            }
        }

        attempts += 1;
        if started.elapsed() >= config.timeout {
            return ReadinessResult::TimedOut {
                elapsed: started.elapsed(),
            };
        }
        tokio::time::sleep(config.backoff).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_when_listener_already_bound() {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = wait_until_ready(port, &ProbeConfig::default()).await;
        match result {
            ReadinessResult::Ready { elapsed } => {
                assert!(elapsed < Duration::from_secs(1), "too slow: {elapsed:?}");
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn times_out_when_nothing_listens() {
        let port = crate::port::allocate().await.unwrap();
        let config = ProbeConfig {
            timeout: Duration::from_millis(500),
            backoff: Duration::from_millis(200),
        };

        let result = wait_until_ready(port, &config).await;
        match result {
            ReadinessResult::TimedOut { elapsed } => {
                assert!(
                    elapsed >= Duration::from_millis(500),
                    "timed out too early: {elapsed:?}"
                );
                assert!(
                    elapsed < Duration::from_millis(900),
                    "timed out too late: {elapsed:?}"
                );
            }
            other => panic!("expected TimedOut, got {other:?}"),
        }
    }
}
