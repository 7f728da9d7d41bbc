use std::thread::sleep;

use tracing::debug;
use tracing::warn;

use crate::BackoffPolicy;
use crate::ClientError;
use crate::Error;
use crate::Result;

/// Runs `task` until it succeeds, fails with a non-retryable error, or the
/// policy's attempt budget is spent.
///
/// Blocks the calling thread between attempts. Refresh handlers already run on
/// the coordination client's notification thread, so there is nothing to
/// yield to.
pub(crate) fn retry_with_exponential_backoff<F, T>(
    task: F,
    policy: BackoffPolicy,
) -> Result<T>
where
    F: Fn() -> std::result::Result<T, ClientError>,
{
    let max_attempts = policy.max_retries.max(1);
    let mut attempt = 0;

    loop {
        match task() {
            Ok(r) => return Ok(r),
            Err(e) if !e.is_retryable() => {
                debug!(attempt, error = %e, "non-retryable failure");
                return Err(Error::Client(e));
            }
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    warn!("Task failed after {} attempts: {}", attempt, e);
                    return Err(Error::RetryExhausted {
                        attempts: attempt,
                        source: e,
                    });
                }

                let delay = policy.delay_for(attempt - 1);
                debug!(attempt, ?delay, error = %e, "retrying after backoff");
                sleep(delay);
            }
        }
    }
}
