use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{error, warn};

const RETRY_DELAY: Duration = Duration::from_millis(300);
const LOGGED_BODY_LIMIT: usize = 2048;

pub fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Sends a request that is safe to repeat (a status read, or a write carrying an idempotency
/// key), retrying once on a transport error, 429 or 5xx.
pub async fn send_with_single_retry(
    provider: &'static str,
    context: &str,
    build: impl Fn() -> RequestBuilder,
) -> Result<Response> {
    match build().send().await {
        Ok(resp) if !is_retryable_status(resp.status()) => return Ok(resp),
        Ok(resp) => warn!(
            provider,
            context,
            status = %resp.status(),
            "payments: retrying after gateway error status"
        ),
        Err(err) => warn!(
            provider,
            context,
            error = %err.without_url(),
            "payments: retrying after transport error"
        ),
    }

    tokio::time::sleep(RETRY_DELAY).await;
    Ok(build().send().await?)
}

/// Passes 2xx responses through; otherwise logs what the gateway said and fails.
pub async fn ensure_success(
    resp: Response,
    provider: &'static str,
    context: &str,
) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status();
    let request_id = ["request-id", "stripe-request-id", "paypal-debug-id", "x-request-id"]
        .iter()
        .find_map(|name| resp.headers().get(*name))
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let body = match resp.text().await {
        Ok(text) if !text.is_empty() => text.chars().take(LOGGED_BODY_LIMIT).collect(),
        Ok(_) => "<empty response body>".to_string(),
        Err(err) => format!("<failed to read response body: {err}>"),
    };

    error!(
        provider,
        status = %status,
        request_id = ?request_id,
        response_body = %body,
        context = %context,
        "payments: gateway request failed"
    );

    anyhow::bail!(
        "{provider} request failed: {context} (status {status}, request_id={request_id:?})"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_only_transient_statuses() {
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(!is_retryable_status(StatusCode::OK));
    }
}
