use anyhow::Result;
use backend::usecases::booking_effects::{
    TransitionActor, notify_status_change, record_transition,
};
use chrono::{DateTime, Utc};
use crates::domain::{
    entities::bookings::ExpireHoldOutcome,
    repositories::{
        booking_events::BookingEventRepository, booking_notifier::BookingNotifier,
        bookings::BookingRepository,
    },
    value_objects::{booking_lifecycle::EXPIRED_HOLD_REASON, enums::booking_statuses::BookingStatus},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BookingFailure {
    pub booking_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SweepResult {
    pub scanned: usize,
    pub expired_count: usize,
    pub released_booking_ids: Vec<Uuid>,
    pub released_dates: usize,
    /// Candidates that no longer matched the expiry guard under lock.
    pub skipped: usize,
    pub failures: Vec<BookingFailure>,
}

pub struct SweepExpiredHoldsUseCase<B, E, N>
where
    B: BookingRepository + Send + Sync,
    E: BookingEventRepository + Send + Sync,
    N: BookingNotifier + Send + Sync,
{
    booking_repo: Arc<B>,
    event_repo: Arc<E>,
    notifier: Arc<N>,
}

impl<B, E, N> SweepExpiredHoldsUseCase<B, E, N>
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

    /// Expires every lapsed, unpaid hold in one bounded batch. Each booking is expired in its
    /// own transaction, so a failure on one row is reported and the rest still run.
    pub async fn run(&self, now: DateTime<Utc>, limit: i64) -> Result<SweepResult> {
        let candidates = self.booking_repo.list_expirable(now, limit.max(1)).await?;

        let mut result = SweepResult {
            scanned: candidates.len(),
            ..Default::default()
        };

        for candidate in candidates {
            match self.booking_repo.expire_hold(candidate.id, now).await {
                Ok(ExpireHoldOutcome::Expired {
                    booking,
                    released_dates,
                }) => {
                    result.expired_count += 1;
                    result.released_dates += released_dates;
                    result.released_booking_ids.push(booking.id);

                    record_transition(
                        self.event_repo.as_ref(),
                        booking.id,
                        Some(candidate.status),
                        BookingStatus::Expired,
                        TransitionActor::system(),
                        Some(EXPIRED_HOLD_REASON.to_string()),
                    )
                    .await;
                    notify_status_change(self.notifier.as_ref(), &booking).await;
                }
                Ok(ExpireHoldOutcome::Skipped(current)) => {
                    info!(
                        booking_id = %candidate.id,
                        %current,
                        "sweep_expired_holds: booking no longer expirable; skipped"
                    );
                    result.skipped += 1;
                }
                Err(err) => {
                    error!(
                        booking_id = %candidate.id,
                        error = ?err,
                        "sweep_expired_holds: failed to expire booking"
                    );
                    result.failures.push(BookingFailure {
                        booking_id: candidate.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            scanned = result.scanned,
            expired = result.expired_count,
            released_dates = result.released_dates,
            skipped = result.skipped,
            failed = result.failures.len(),
            "sweep_expired_holds: finished"
        );

        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::Duration;
    use crates::domain::{
        entities::bookings::BookingEntity,
        repositories::{
            booking_events::MockBookingEventRepository, booking_notifier::MockBookingNotifier,
            bookings::MockBookingRepository,
        },
        value_objects::{
            cancellation::cancellation_deadline,
            enums::{
                cancellation_policies::CancellationPolicy, cancelled_by::CancelledBy,
                payment_statuses::PaymentStatus,
            },
            pricing::price_stay,
            stay_ranges::StayRange,
        },
    };
    use mockall::predicate::{always, eq};

    pub(crate) fn booking(status: BookingStatus, check_in_in_days: i64) -> BookingEntity {
        let now = Utc::now();
        let check_in = now.date_naive() + Duration::days(check_in_in_days);
        let stay = StayRange::new(check_in, check_in + Duration::days(3)).unwrap();
        let price = price_stay(&stay, 120_00, 25_00).unwrap();
        BookingEntity {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            guest_id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            check_in: stay.check_in,
            check_out: stay.check_out,
            number_of_nights: 3,
            number_of_guests: 2,
            adults: 2,
            children: 0,
            infants: 0,
            currency: "USD".to_string(),
            price,
            status,
            payment_status: PaymentStatus::Pending,
            hold_expires_at: Some(now - Duration::minutes(5)),
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            cancellation_policy: CancellationPolicy::Moderate,
            cancellation_deadline: cancellation_deadline(CancellationPolicy::Moderate, check_in),
            created_at: now - Duration::minutes(20),
            updated_at: now - Duration::minutes(20),
        }
    }

    fn expired(mut booking: BookingEntity, now: DateTime<Utc>) -> BookingEntity {
        booking.status = BookingStatus::Expired;
        booking.cancelled_at = Some(now);
        booking.cancelled_by = Some(CancelledBy::System);
        booking.cancellation_reason = Some(EXPIRED_HOLD_REASON.to_string());
        booking
    }

    fn quiet_effects() -> (MockBookingEventRepository, MockBookingNotifier) {
        let mut events = MockBookingEventRepository::new();
        events.expect_record_event().returning(|_| Ok(()));
        let mut notifier = MockBookingNotifier::new();
        notifier.expect_notify().returning(|_| Ok(()));
        (events, notifier)
    }

    #[tokio::test]
    async fn expires_a_lapsed_hold_and_releases_its_nights() {
        let now = Utc::now();
        let pending = booking(BookingStatus::AwaitingPayment, 10);
        let after = expired(pending.clone(), now);
        let booking_id = pending.id;

        let mut repo = MockBookingRepository::new();
        let listed = pending.clone();
        repo.expect_list_expirable()
            .with(eq(now), eq(500))
            .times(1)
            .returning(move |_, _| Ok(vec![listed.clone()]));
        repo.expect_expire_hold()
            .with(eq(booking_id), eq(now))
            .times(1)
            .returning(move |_, _| {
                Ok(ExpireHoldOutcome::Expired {
                    booking: after.clone(),
                    released_dates: 3,
                })
            });

        let mut events = MockBookingEventRepository::new();
        events
            .expect_record_event()
            .withf(move |event| {
                event.booking_id == booking_id
                    && event.from_status.as_deref() == Some("awaiting_payment")
                    && event.to_status == "expired"
                    && event.actor_id.is_none()
                    && event.actor_role == "system"
            })
            .times(1)
            .returning(|_| Ok(()));
        let mut notifier = MockBookingNotifier::new();
        notifier
            .expect_notify()
            .withf(move |n| n.booking_id == booking_id && n.status == BookingStatus::Expired)
            .times(1)
            .returning(|_| Ok(()));

        let usecase =
            SweepExpiredHoldsUseCase::new(Arc::new(repo), Arc::new(events), Arc::new(notifier));
        let result = usecase.run(now, 500).await.unwrap();

        assert_eq!(result.scanned, 1);
        assert_eq!(result.expired_count, 1);
        assert_eq!(result.released_booking_ids, vec![booking_id]);
        assert_eq!(result.released_dates, 3);
        assert!(result.failures.is_empty());
    }

    #[tokio::test]
    async fn second_run_finds_nothing_to_expire() {
        let now = Utc::now();
        let mut repo = MockBookingRepository::new();
        repo.expect_list_expirable()
            .with(always(), always())
            .returning(|_, _| Ok(vec![]));
        repo.expect_expire_hold().never();

        let mut events = MockBookingEventRepository::new();
        events.expect_record_event().never();
        let mut notifier = MockBookingNotifier::new();
        notifier.expect_notify().never();

        let usecase =
            SweepExpiredHoldsUseCase::new(Arc::new(repo), Arc::new(events), Arc::new(notifier));
        let result = usecase.run(now, 500).await.unwrap();

        assert_eq!(result, SweepResult::default());
    }

    #[tokio::test]
    async fn one_failing_booking_does_not_stop_the_batch() {
        let now = Utc::now();
        let broken = booking(BookingStatus::AwaitingPayment, 5);
        let lapsed_request = booking(BookingStatus::Requested, 8);
        let broken_id = broken.id;
        let lapsed_id = lapsed_request.id;
        let after = expired(lapsed_request.clone(), now);

        let mut repo = MockBookingRepository::new();
        let listed = vec![broken.clone(), lapsed_request.clone()];
        repo.expect_list_expirable()
            .returning(move |_, _| Ok(listed.clone()));
        repo.expect_expire_hold()
            .with(eq(broken_id), eq(now))
            .returning(|_, _| Err(anyhow!("could not serialize access")));
        repo.expect_expire_hold()
            .with(eq(lapsed_id), eq(now))
            .returning(move |_, _| {
                Ok(ExpireHoldOutcome::Expired {
                    booking: after.clone(),
                    released_dates: 3,
                })
            });

        let (events, notifier) = quiet_effects();
        let usecase =
            SweepExpiredHoldsUseCase::new(Arc::new(repo), Arc::new(events), Arc::new(notifier));
        let result = usecase.run(now, 500).await.unwrap();

        assert_eq!(result.scanned, 2);
        assert_eq!(result.expired_count, 1);
        assert_eq!(result.released_booking_ids, vec![lapsed_id]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].booking_id, broken_id);
    }

    #[tokio::test]
    async fn booking_paid_since_listing_is_skipped() {
        let now = Utc::now();
        let candidate = booking(BookingStatus::AwaitingPayment, 4);

        let mut repo = MockBookingRepository::new();
        let listed = candidate.clone();
        repo.expect_list_expirable()
            .returning(move |_, _| Ok(vec![listed.clone()]));
        repo.expect_expire_hold()
            .returning(|_, _| Ok(ExpireHoldOutcome::Skipped(BookingStatus::Confirmed)));

        let mut events = MockBookingEventRepository::new();
        events.expect_record_event().never();
        let mut notifier = MockBookingNotifier::new();
        notifier.expect_notify().never();

        let usecase =
            SweepExpiredHoldsUseCase::new(Arc::new(repo), Arc::new(events), Arc::new(notifier));
        let result = usecase.run(now, 500).await.unwrap();

        assert_eq!(result.scanned, 1);
        assert_eq!(result.expired_count, 0);
        assert_eq!(result.skipped, 1);
        assert!(result.released_booking_ids.is_empty());
    }

    #[tokio::test]
    async fn listing_failure_fails_the_sweep() {
        let mut repo = MockBookingRepository::new();
        repo.expect_list_expirable()
            .returning(|_, _| Err(anyhow!("connection refused")));

        let (events, notifier) = quiet_effects();
        let usecase =
            SweepExpiredHoldsUseCase::new(Arc::new(repo), Arc::new(events), Arc::new(notifier));

        assert!(usecase.run(Utc::now(), 500).await.is_err());
    }
}
