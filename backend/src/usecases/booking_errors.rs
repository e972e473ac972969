use axum::http::StatusCode;
use crates::domain::value_objects::{
    enums::{
        booking_actions::BookingAction, booking_statuses::BookingStatus,
        payment_gateways::PaymentGateway, payment_statuses::PaymentStatus,
    },
    stay_ranges::ConflictingStay,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),
    #[error("property not found")]
    PropertyNotFound,
    /// Also used for bookings that do not exist, so ids cannot be probed.
    #[error("booking not found or not accessible")]
    NotAccessible,
    #[error("the requested dates are no longer available")]
    Conflict { conflicts: Vec<ConflictingStay> },
    #[error("cannot {action} a booking in status {current_status}")]
    InvalidTransition {
        action: BookingAction,
        current_status: BookingStatus,
        payment_status: PaymentStatus,
    },
    #[error("booking in status {current_status} with payment {payment_status} cannot be paid")]
    StatusConflict {
        current_status: BookingStatus,
        payment_status: PaymentStatus,
    },
    #[error("the payment hold of this booking has expired")]
    HoldExpired { current_status: BookingStatus },
    #[error("booking expired before the payment was confirmed; the charge is being refunded")]
    AlreadyExpired { current_status: BookingStatus },
    #[error("payment gateway {0} is not configured")]
    GatewayNotConfigured(PaymentGateway),
    #[error("payment gateway request failed")]
    Gateway(#[source] anyhow::Error),
    #[error("payment declined: {reason}")]
    PaymentDeclined { reason: String },
    #[error("payment is not completed yet")]
    PaymentPending,
    #[error("payment not found")]
    PaymentNotFound,
    #[error("invalid webhook: {0}")]
    InvalidWebhook(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::Validation(_)
            | BookingError::InvalidTransition { .. }
            | BookingError::StatusConflict { .. }
            | BookingError::GatewayNotConfigured(_)
            | BookingError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            BookingError::PropertyNotFound | BookingError::PaymentNotFound => StatusCode::NOT_FOUND,
            BookingError::NotAccessible => StatusCode::FORBIDDEN,
            BookingError::Conflict { .. }
            | BookingError::HoldExpired { .. }
            | BookingError::AlreadyExpired { .. }
            | BookingError::PaymentPending => StatusCode::CONFLICT,
            BookingError::PaymentDeclined { .. } => StatusCode::PAYMENT_REQUIRED,
            BookingError::Gateway(_) => StatusCode::BAD_GATEWAY,
            BookingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "validation_error",
            BookingError::PropertyNotFound => "property_not_found",
            BookingError::NotAccessible => "authorization_error",
            BookingError::Conflict { .. } => "conflict_error",
            BookingError::InvalidTransition { .. } => "invalid_transition",
            BookingError::StatusConflict { .. } => "status_conflict",
            BookingError::HoldExpired { .. } => "hold_expired",
            BookingError::AlreadyExpired { .. } => "already_expired",
            BookingError::GatewayNotConfigured(_) => "gateway_not_configured",
            BookingError::Gateway(_) => "gateway_error",
            BookingError::PaymentDeclined { .. } => "payment_declined",
            BookingError::PaymentPending => "payment_pending",
            BookingError::PaymentNotFound => "payment_not_found",
            BookingError::InvalidWebhook(_) => "invalid_webhook",
            BookingError::Internal(_) => "internal_error",
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_http_statuses() {
        assert_eq!(
            BookingError::Conflict { conflicts: vec![] }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(BookingError::NotAccessible.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            BookingError::StatusConflict {
                current_status: BookingStatus::Confirmed,
                payment_status: PaymentStatus::Paid,
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BookingError::AlreadyExpired {
                current_status: BookingStatus::Expired
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            BookingError::Internal(anyhow::anyhow!("pool timed out")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
