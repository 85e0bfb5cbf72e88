use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Runs an HTTP request, retrying transport failures and non-success statuses.
///
/// `retries` counts the extra attempts, so at most `1 + retries` requests are
/// sent with `delay` between them. The last error is returned once all
/// attempts are spent.
pub async fn with_retry<F, Fut>(
    mut request: F,
    retries: usize,
    delay: Duration,
) -> Result<reqwest::Response, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        let outcome = request()
            .await
            .and_then(|response| response.error_for_status());
        match outcome {
            Ok(response) => return Ok(response),
            Err(err) => {
                if attempt > retries {
                    return Err(err.into());
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt,
                    retries + 1,
                    err
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}
