use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use crates::domain::value_objects::bookings::AvailabilityQuery;
use uuid::Uuid;

use super::BookingService;
use crate::usecases::booking_errors::BookingError;

// Public: listing pages show availability before sign-in.
pub fn routes(usecase: Arc<BookingService>) -> Router {
    Router::new()
        .route("/:property_id/availability", get(check_availability))
        .with_state(usecase)
}

pub async fn check_availability(
    State(usecase): State<Arc<BookingService>>,
    Path(property_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(usecase.check_availability(property_id, query).await?))
}
