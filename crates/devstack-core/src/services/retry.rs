use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Run `op` up to `max_attempts` times with a fixed `delay` between tries.
///
/// At least one attempt is always made. When every attempt fails the error of
/// the last attempt is returned.
pub async fn retry<T, F, Fut>(max_attempts: u32, delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                tracing::warn!(attempt, max_attempts = attempts, error = %e, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
