//! Renderer bridge - the allow-listed, read-only surface exposed to the
//! rendering context
//!
//! The rendering context is untrusted; nothing here grants process,
//! filesystem, or network capabilities. It receives exactly these values,
//! once, after readiness.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgePayload {
    /// Host operating system identifier.
    pub platform: &'static str,
    /// Confirmed backend port on loopback.
    pub backend_port: u16,
    /// URL the window layer loads once the backend is ready.
    pub backend_url: String,
}

impl BridgePayload {
    pub fn for_port(port: u16) -> Self {
        Self {
            platform: std::env::consts::OS,
            backend_port: port,
            backend_url: format!("http://127.0.0.1:{port}/"),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
