use std::time::Duration;

pub const READY_TIMEOUT: Duration = Duration::from_secs(15);
pub const READY_BACKOFF: Duration = Duration::from_millis(200);

pub const TERMINATE_WAIT: Duration = Duration::from_secs(5);
