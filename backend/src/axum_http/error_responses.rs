use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use crates::domain::value_objects::{
    enums::{booking_statuses::BookingStatus, payment_statuses::PaymentStatus},
    stay_ranges::ConflictingStay,
};
use serde::Serialize;
use thiserror::Error;

use crate::usecases::booking_errors::BookingError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_status: Option<BookingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<ConflictingStay>,
}

impl ErrorResponse {
    pub(crate) fn plain(status: StatusCode, error: &'static str, message: String) -> Self {
        Self {
            code: status.as_u16(),
            error,
            message,
            current_status: None,
            payment_status: None,
            conflicts: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AppError::Internal(_) => {
                // Don't leak internal error detail to client
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::plain(status, error, message))).into_response()
    }
}

impl From<BookingError> for ErrorResponse {
    fn from(err: BookingError) -> Self {
        let status = err.status_code();
        let message = match &err {
            BookingError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let mut body = ErrorResponse::plain(status, err.code(), message);

        match err {
            BookingError::Conflict { conflicts } => body.conflicts = conflicts,
            BookingError::InvalidTransition {
                current_status,
                payment_status,
                ..
            }
            | BookingError::StatusConflict {
                current_status,
                payment_status,
            } => {
                body.current_status = Some(current_status);
                body.payment_status = Some(payment_status);
            }
            BookingError::HoldExpired { current_status }
            | BookingError::AlreadyExpired { current_status } => {
                body.current_status = Some(current_status);
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorResponse::from(self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn conflict_body_lists_the_taken_ranges() {
        let stay = ConflictingStay {
            check_in: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2026, 7, 4).unwrap(),
        };
        let body = ErrorResponse::from(BookingError::Conflict {
            conflicts: vec![stay.clone()],
        });

        assert_eq!(body.code, 409);
        assert_eq!(body.error, "conflict_error");
        assert_eq!(body.conflicts, vec![stay]);
    }

    #[test]
    fn status_conflict_body_carries_current_state() {
        let body = ErrorResponse::from(BookingError::StatusConflict {
            current_status: BookingStatus::Expired,
            payment_status: PaymentStatus::Pending,
        });
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["code"], 400);
        assert_eq!(json["current_status"], serde_json::json!(BookingStatus::Expired));
        assert_eq!(json["payment_status"], serde_json::json!(PaymentStatus::Pending));
        assert!(json.get("conflicts").is_none());
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let body = ErrorResponse::from(BookingError::Internal(anyhow::anyhow!(
            "relation \"bookings\" does not exist"
        )));

        assert_eq!(body.code, 500);
        assert_eq!(body.message, "Internal server error");
    }
}
