use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    entities::bookings::BookingEntity,
    value_objects::enums::{
        booking_actions::BookingAction, booking_statuses::BookingStatus,
        cancelled_by::CancelledBy, payment_statuses::PaymentStatus,
    },
};

pub const EXPIRED_HOLD_REASON: &str = "Payment hold expired";

/// Authenticated caller of a state-changing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_host: bool,
    pub is_admin: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleViolation {
    /// Deliberately vague so callers cannot probe which booking ids exist.
    #[error("booking not found or not accessible")]
    NotAuthorized,
    #[error("cannot {action} a booking in status {current}")]
    InvalidTransition {
        current: BookingStatus,
        action: BookingAction,
    },
}

/// The caller's relationship to a booking, strongest first.
pub fn relation_to(actor: &Actor, booking: &BookingEntity) -> Option<CancelledBy> {
    if actor.is_admin {
        Some(CancelledBy::Admin)
    } else if booking.host_id == actor.user_id {
        Some(CancelledBy::Host)
    } else if booking.guest_id == actor.user_id {
        Some(CancelledBy::Guest)
    } else {
        None
    }
}

pub fn authorize_action(
    actor: &Actor,
    booking: &BookingEntity,
    action: BookingAction,
) -> Result<CancelledBy, LifecycleViolation> {
    let relation = relation_to(actor, booking).ok_or(LifecycleViolation::NotAuthorized)?;

    let allowed = match (relation, action) {
        (CancelledBy::Admin, _) => true,
        (CancelledBy::Host, _) => true,
        (CancelledBy::Guest, BookingAction::Cancel) => true,
        (CancelledBy::Guest, _) | (CancelledBy::System, _) => false,
    };

    if allowed {
        Ok(relation)
    } else {
        Err(LifecycleViolation::NotAuthorized)
    }
}

/// Transition table for user-requested actions.
pub fn next_status(
    current: BookingStatus,
    payment_status: PaymentStatus,
    action: BookingAction,
) -> Result<BookingStatus, LifecycleViolation> {
    use BookingStatus::*;

    let next = match (action, current) {
        // A request paid ahead of approval already satisfies the confirmation guard.
        (BookingAction::Approve, Requested) if payment_status == PaymentStatus::Paid => Confirmed,
        (BookingAction::Approve, Requested) => Approved,
        (BookingAction::Reject, Requested) => Rejected,
        (
            BookingAction::Cancel,
            Pending | Requested | Approved | AwaitingPayment | Confirmed | CheckedIn,
        ) => Cancelled,
        (_, current) => {
            return Err(LifecycleViolation::InvalidTransition { current, action });
        }
    };

    Ok(next)
}

/// What a gateway-verified payment does to the booking it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationTarget {
    /// Move to this status and mark the booking paid.
    Confirm(BookingStatus),
    /// Mark paid but wait for the host; approval finishes the confirmation.
    PaidAwaitingApproval,
    /// Payment already applied; nothing to do.
    AlreadyConfirmed,
    /// Booking left the live set before the money arrived. The payment must be refunded.
    Unavailable(BookingStatus),
}

pub fn confirmation_target(
    current: BookingStatus,
    payment_status: PaymentStatus,
) -> ConfirmationTarget {
    use BookingStatus::*;

    match current {
        Pending | AwaitingPayment | Approved => {
            if payment_status == PaymentStatus::Paid {
                ConfirmationTarget::AlreadyConfirmed
            } else {
                ConfirmationTarget::Confirm(Confirmed)
            }
        }
        Requested => {
            if payment_status == PaymentStatus::Paid {
                ConfirmationTarget::AlreadyConfirmed
            } else {
                ConfirmationTarget::PaidAwaitingApproval
            }
        }
        Confirmed | CheckedIn | Completed => ConfirmationTarget::AlreadyConfirmed,
        Cancelled | Rejected | Expired => ConfirmationTarget::Unavailable(current),
    }
}

/// Expiry guard: an unpaid pre-payment booking whose hold lapsed strictly before `now`.
pub fn is_hold_expired(booking: &BookingEntity, now: DateTime<Utc>) -> bool {
    booking.status.is_expirable()
        && booking.payment_status != PaymentStatus::Paid
        && booking
            .hold_expires_at
            .is_some_and(|expires_at| expires_at < now)
}

/// Date-driven progress of a paid stay.
pub fn stay_advance(booking: &BookingEntity, today: NaiveDate) -> Option<BookingStatus> {
    match booking.status {
        BookingStatus::Confirmed if booking.check_in <= today => Some(BookingStatus::CheckedIn),
        BookingStatus::CheckedIn if booking.check_out <= today => Some(BookingStatus::Completed),
        _ => None,
    }
}
