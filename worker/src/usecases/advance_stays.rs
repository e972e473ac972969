use anyhow::Result;
use backend::usecases::booking_effects::{
    TransitionActor, notify_status_change, record_transition,
};
use chrono::NaiveDate;
use crates::domain::{
    entities::bookings::{BookingStatusChange, StatusChangeOutcome},
    repositories::{
        booking_events::BookingEventRepository, booking_notifier::BookingNotifier,
        bookings::BookingRepository,
    },
    value_objects::{booking_lifecycle::stay_advance, enums::booking_statuses::BookingStatus},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::sweep_expired_holds::BookingFailure;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AdvanceStaysResult {
    pub scanned: usize,
    pub checked_in: Vec<Uuid>,
    pub completed: Vec<Uuid>,
    pub skipped: usize,
    pub failures: Vec<BookingFailure>,
}

/// Moves confirmed stays to CHECKED_IN on their check-in date and to COMPLETED on their
/// check-out date.
pub struct AdvanceStaysUseCase<B, E, N>
where
    B: BookingRepository + Send + Sync,
    E: BookingEventRepository + Send + Sync,
    N: BookingNotifier + Send + Sync,
{
    booking_repo: Arc<B>,
    event_repo: Arc<E>,
    notifier: Arc<N>,
}

impl<B, E, N> AdvanceStaysUseCase<B, E, N>
where
    B: BookingRepository + Send + Sync,
    E: BookingEventRepository + Send + Sync,
    N: BookingNotifier + Send + Sync,
{
    pub fn new(booking_repo: Arc<B>, event_repo: Arc<E>, notifier: Arc<N>) -> Self {
        Self {
            booking_repo,
            event_repo,
            notifier,
        }
    }

    pub async fn run(&self, today: NaiveDate, limit: i64) -> Result<AdvanceStaysResult> {
        let due = self
            .booking_repo
            .list_due_stay_transitions(today, limit.max(1))
            .await?;

        let mut result = AdvanceStaysResult {
            scanned: due.len(),
            ..Default::default()
        };

        for booking in due {
            let Some(next) = stay_advance(&booking, today) else {
                result.skipped += 1;
                continue;
            };

            let change = BookingStatusChange {
                booking_id: booking.id,
                expected_status: booking.status,
                new_status: next,
                new_payment_status: None,
                hold_expires_at: None,
                cancellation: None,
            };

            match self.booking_repo.apply_status_change(change).await {
                Ok(StatusChangeOutcome::Applied(updated)) => {
                    match next {
                        BookingStatus::CheckedIn => result.checked_in.push(updated.id),
                        _ => result.completed.push(updated.id),
                    }
                    record_transition(
                        self.event_repo.as_ref(),
                        updated.id,
                        Some(booking.status),
                        next,
                        TransitionActor::system(),
                        None,
                    )
                    .await;
                    notify_status_change(self.notifier.as_ref(), &updated).await;
                }
                Ok(StatusChangeOutcome::Stale(current)) => {
                    info!(
                        booking_id = %booking.id,
                        current = %current.status,
                        "advance_stays: booking moved concurrently; skipped"
                    );
                    result.skipped += 1;
                }
                Ok(StatusChangeOutcome::NotFound) => {
                    result.skipped += 1;
                }
                Err(err) => {
                    error!(
                        booking_id = %booking.id,
                        to = %next,
                        error = ?err,
                        "advance_stays: failed to advance booking"
                    );
                    result.failures.push(BookingFailure {
                        booking_id: booking.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            scanned = result.scanned,
            checked_in = result.checked_in.len(),
            completed = result.completed.len(),
            skipped = result.skipped,
            failed = result.failures.len(),
            "advance_stays: finished"
        );

        Ok(result)
    }
}
