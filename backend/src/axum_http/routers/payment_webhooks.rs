use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use crates::domain::value_objects::{
    enums::payment_gateways::PaymentGateway, payments::WebhookHeaders,
};
use serde_json::json;

use super::PaymentService;
use crate::usecases::booking_errors::BookingError;

pub fn routes(usecase: Arc<PaymentService>) -> Router {
    Router::new()
        .route("/:gateway", post(handle_webhook))
        .with_state(usecase)
}

/// Header names arrive lower-cased from hyper; values that are not visible ASCII are dropped.
pub fn webhook_headers(headers: &HeaderMap) -> WebhookHeaders {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

pub async fn handle_webhook(
    State(usecase): State<Arc<PaymentService>>,
    Path(gateway): Path<PaymentGateway>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, BookingError> {
    usecase
        .handle_webhook(gateway, webhook_headers(&headers), body.to_vec())
        .await?;
    Ok(Json(json!({ "received": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn collects_lowercased_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("Stripe-Signature", HeaderValue::from_static("t=1,v1=abc"));
        headers.insert("x-sadad-signature", HeaderValue::from_static("deadbeef"));

        let collected = webhook_headers(&headers);

        assert_eq!(collected.get("stripe-signature").map(String::as_str), Some("t=1,v1=abc"));
        assert_eq!(collected.get("x-sadad-signature").map(String::as_str), Some("deadbeef"));
    }
}
