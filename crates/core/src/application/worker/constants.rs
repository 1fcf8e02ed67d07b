// Worker constants (no magic values in the loop body)
use std::time::Duration;

/// Sleep after a transport error before polling again (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Bounded attempts for job-store writes before the message is left for
/// redelivery
pub const STORE_WRITE_ATTEMPTS: u32 = 3;

/// Delay between job-store write attempts (200ms)
pub const STORE_WRITE_RETRY_DELAY: Duration = Duration::from_millis(200);
