use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use crates::domain::value_objects::payments::{ConfirmPaymentRequest, InitiatePaymentRequest};

use super::PaymentService;
use crate::{auth::AuthUser, usecases::booking_errors::BookingError};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_BACKEND/api/v1/payments" \
//     -H "Authorization: Bearer $ACCESS_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"booking_id":"<uuid>","gateway":"stripe"}'

pub fn routes(usecase: Arc<PaymentService>) -> Router {
    Router::new()
        .route("/", post(initiate_payment))
        .route("/confirm", post(confirm_payment))
        .with_state(usecase)
}

pub async fn initiate_payment(
    State(usecase): State<Arc<PaymentService>>,
    auth: AuthUser,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let order = usecase.initiate_payment(auth.actor(), request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn confirm_payment(
    State(usecase): State<Arc<PaymentService>>,
    auth: AuthUser,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(usecase.confirm_payment(auth.actor(), request).await?))
}
