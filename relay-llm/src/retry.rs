use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Re-invoke `op` until it succeeds, waiting a fixed `delay` between
/// attempts. Returns the first success, or the last error after
/// `max_retries` additional attempts.
pub async fn retry<T, E, F, Fut>(
    mut op: F,
    max_retries: u32,
    delay: Duration,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                tracing::debug!(%e, attempt, "retrying after error");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_the_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("not yet".to_string())
                    } else {
                        Ok(n)
                    }
                }
            },
            5,
            Duration::ZERO,
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_the_retry_limit() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("always".to_string()) }
            },
            2,
            Duration::ZERO,
        )
        .await;

        assert_eq!(result.unwrap_err(), "always");
        // One initial attempt plus two retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
