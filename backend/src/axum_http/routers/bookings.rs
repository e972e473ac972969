use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::domain::value_objects::bookings::{
    CreateBookingRequest, ListBookingsQuery, QuoteRequest, TransitionBookingRequest,
};
use uuid::Uuid;

use super::BookingService;
use crate::{auth::AuthUser, usecases::booking_errors::BookingError};

pub fn routes(usecase: Arc<BookingService>) -> Router {
    Router::new()
        .route("/", get(list_bookings).post(create_booking))
        .route("/quote", post(quote))
        .route("/:booking_id", get(get_booking).patch(transition_booking))
        .with_state(usecase)
}

pub async fn create_booking(
    State(usecase): State<Arc<BookingService>>,
    auth: AuthUser,
    Json(request): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let booking = usecase.create_booking(auth.actor(), request).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn quote(
    State(usecase): State<Arc<BookingService>>,
    _auth: AuthUser,
    Json(request): Json<QuoteRequest>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(usecase.quote(request).await?))
}

pub async fn list_bookings(
    State(usecase): State<Arc<BookingService>>,
    auth: AuthUser,
    Query(query): Query<ListBookingsQuery>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(usecase.list_bookings(auth.actor(), query).await?))
}

pub async fn get_booking(
    State(usecase): State<Arc<BookingService>>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(usecase.get_booking(auth.actor(), booking_id).await?))
}

pub async fn transition_booking(
    State(usecase): State<Arc<BookingService>>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<TransitionBookingRequest>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(
        usecase
            .transition_booking(auth.actor(), booking_id, request)
            .await?,
    ))
}
