use axum::{
    http::{StatusCode, Uri},
    response::IntoResponse,
};
use tracing::info;

pub async fn not_found(uri: Uri) -> impl IntoResponse {
    info!(path = %uri.path(), "worker router: no internal route matched");
    (StatusCode::NOT_FOUND, "NOT_FOUND").into_response()
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}
