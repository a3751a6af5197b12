//! Stand-in for the bundled backend, used by integration tests and local
//! smoke runs. Honors the backend invocation contract: invoked as
//! `backend-stub <entrypoint> <port>`, it binds 127.0.0.1:<port> and
//! accepts connections until killed.
//!
//! Behavior toggles (env):
//! - `SKIFF_STUB_DELAY_MS`: sleep this long before binding
//! - `SKIFF_STUB_EXIT_CODE`: exit with this code immediately, without
//!   binding

use std::net::TcpListener;
use std::thread;
use std::time::Duration;

fn main() {
    let port: u16 = std::env::args()
        .nth(2)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or_else(|| {
            eprintln!("usage: backend-stub <entrypoint> <port>");
            std::process::exit(2);
        });

    if let Ok(code) = std::env::var("SKIFF_STUB_EXIT_CODE") {
        let code: i32 = code.parse().unwrap_or(1);
        eprintln!("backend-stub: exiting early with code {code}");
        std::process::exit(code);
    }

    if let Ok(delay) = std::env::var("SKIFF_STUB_DELAY_MS") {
        let delay: u64 = delay.parse().unwrap_or(0);
        thread::sleep(Duration::from_millis(delay));
    }

    let listener = match TcpListener::bind(("127.0.0.1", port)) {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("backend-stub: failed to bind 127.0.0.1:{port}: {e}");
            std::process::exit(1);
        }
    };
    println!("backend-stub: listening on 127.0.0.1:{port}");

    for stream in listener.incoming() {
        // A bare accept is the whole readiness contract.
        drop(stream);
    }
}
