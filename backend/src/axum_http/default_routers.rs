use axum::{
    Json,
    http::{StatusCode, Uri},
    response::IntoResponse,
};
use tracing::info;

use super::error_responses::ErrorResponse;

pub async fn not_found(uri: Uri) -> impl IntoResponse {
    info!(path = %uri.path(), "backend router: no route matched");
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::plain(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no route for {}", uri.path()),
        )),
    )
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
