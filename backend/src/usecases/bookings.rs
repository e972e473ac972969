use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use crates::{
    domain::{
        entities::{
            bookings::{
                BookingEntity, BookingStatusChange, CancellationRecord, CreateBookingOutcome,
                NewBookingEntity, StatusChangeOutcome,
            },
            properties::PropertyEntity,
        },
        repositories::{
            booking_events::BookingEventRepository, booking_notifier::BookingNotifier,
            bookings::BookingRepository, payments::PaymentRepository,
            properties::PropertyRepository,
        },
        value_objects::{
            booking_lifecycle::{
                Actor, LifecycleViolation, authorize_action, is_hold_expired, next_status,
                relation_to,
            },
            bookings::{
                AvailabilityDto, AvailabilityQuery, BookingDto, BookingListScope,
                CreateBookingRequest, GuestCounts, ListBookingsQuery, QuoteDto, QuoteRequest,
                TransitionBookingRequest,
            },
            cancellation::{cancellation_deadline, refund_quote},
            enums::{
                booking_actions::BookingAction, booking_statuses::BookingStatus,
                cancelled_by::CancelledBy, payment_statuses::PaymentStatus,
            },
            holds::HoldPolicy,
            pricing::price_stay,
            stay_ranges::{ConflictCheck, StayRange, check_conflict},
        },
    },
    payments::gateways::PaymentGateways,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    booking_effects::{TransitionActor, notify_status_change, record_transition, refund_booking},
    booking_errors::{BookingError, UseCaseResult},
};

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 100;
/// Longest bookable stay. Each night is one availability row written with the booking.
pub const MAX_STAY_NIGHTS: i64 = 365;

fn validate_stay(check_in: NaiveDate, check_out: NaiveDate, today: NaiveDate) -> UseCaseResult<StayRange> {
    let stay = StayRange::new(check_in, check_out)
        .map_err(|err| BookingError::Validation(err.to_string()))?;
    if stay.check_in < today {
        return Err(BookingError::Validation(format!(
            "check_in ({check_in}) must not be in the past"
        )));
    }
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(BookingError::Validation(format!(
            "stays are limited to {MAX_STAY_NIGHTS} nights"
        )));
    }
    Ok(stay)
}

fn validate_guests(guests: &GuestCounts, capacity: i32) -> UseCaseResult<()> {
    if guests.adults < 1 {
        return Err(BookingError::Validation(
            "at least one adult is required".to_string(),
        ));
    }
    if guests.children < 0 || guests.infants < 0 {
        return Err(BookingError::Validation(
            "guest counts must not be negative".to_string(),
        ));
    }
    let number_of_guests = guests.number_of_guests().ok_or_else(|| {
        BookingError::Validation("guest counts are out of range".to_string())
    })?;
    if number_of_guests > capacity {
        return Err(BookingError::Validation(format!(
            "{number_of_guests} guests exceed the property capacity of {capacity}"
        )));
    }
    Ok(())
}

fn violation_error(violation: LifecycleViolation, booking: &BookingEntity) -> BookingError {
    match violation {
        LifecycleViolation::NotAuthorized => BookingError::NotAccessible,
        LifecycleViolation::InvalidTransition { current, action } => BookingError::InvalidTransition {
            action,
            current_status: current,
            payment_status: booking.payment_status,
        },
    }
}

pub struct BookingUseCase<B, P, Pay, E, N>
where
    B: BookingRepository + Send + Sync + 'static,
    P: PropertyRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    E: BookingEventRepository + Send + Sync + 'static,
    N: BookingNotifier + Send + Sync + 'static,
{
    booking_repo: Arc<B>,
    property_repo: Arc<P>,
    payment_repo: Arc<Pay>,
    event_repo: Arc<E>,
    notifier: Arc<N>,
    gateways: PaymentGateways,
    hold_policy: HoldPolicy,
}

impl<B, P, Pay, E, N> BookingUseCase<B, P, Pay, E, N>
where
    B: BookingRepository + Send + Sync + 'static,
    P: PropertyRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    E: BookingEventRepository + Send + Sync + 'static,
    N: BookingNotifier + Send + Sync + 'static,
{
    pub fn new(
        booking_repo: Arc<B>,
        property_repo: Arc<P>,
        payment_repo: Arc<Pay>,
        event_repo: Arc<E>,
        notifier: Arc<N>,
        gateways: PaymentGateways,
        hold_policy: HoldPolicy,
    ) -> Self {
        Self {
            booking_repo,
            property_repo,
            payment_repo,
            event_repo,
            notifier,
            gateways,
            hold_policy,
        }
    }

    async fn load_property(&self, property_id: Uuid) -> UseCaseResult<PropertyEntity> {
        self.property_repo
            .find_by_id(property_id)
            .await
            .map_err(|err| {
                error!(%property_id, db_error = ?err, "bookings: failed to load property");
                BookingError::Internal(err)
            })?
            .ok_or(BookingError::PropertyNotFound)
    }

    /// Loads a booking the actor is related to. Missing and foreign bookings look the same.
    async fn load_visible_booking(&self, actor: &Actor, booking_id: Uuid) -> UseCaseResult<BookingEntity> {
        let booking = self
            .booking_repo
            .find_by_id(booking_id)
            .await
            .map_err(|err| {
                error!(%booking_id, db_error = ?err, "bookings: failed to load booking");
                BookingError::Internal(err)
            })?
            .ok_or(BookingError::NotAccessible)?;

        if relation_to(actor, &booking).is_none() {
            warn!(
                %booking_id,
                user_id = %actor.user_id,
                "bookings: access to a foreign booking denied"
            );
            return Err(BookingError::NotAccessible);
        }
        Ok(booking)
    }

    pub async fn check_availability(
        &self,
        property_id: Uuid,
        query: AvailabilityQuery,
    ) -> UseCaseResult<AvailabilityDto> {
        let stay = StayRange::new(query.check_in, query.check_out)
            .map_err(|err| BookingError::Validation(err.to_string()))?;
        self.load_property(property_id).await?;

        let existing = self
            .booking_repo
            .find_live_overlapping(property_id, stay.check_in, stay.check_out)
            .await
            .map_err(|err| {
                error!(%property_id, db_error = ?err, "bookings: failed to load overlapping bookings");
                BookingError::Internal(err)
            })?;
        let check = check_conflict(property_id, &stay, existing);

        Ok(AvailabilityDto {
            property_id,
            check_in: stay.check_in,
            check_out: stay.check_out,
            has_conflict: check.has_conflict,
            conflicts: check.conflicting_stays(),
        })
    }

    pub async fn quote(&self, request: QuoteRequest) -> UseCaseResult<QuoteDto> {
        let stay = validate_stay(request.check_in, request.check_out, Utc::now().date_naive())?;
        let property = self.load_property(request.property_id).await?;
        validate_guests(&request.guests, property.capacity)?;

        let price = price_stay(&stay, property.nightly_rate_minor, property.cleaning_fee_minor)
            .map_err(|err| BookingError::Validation(err.to_string()))?;

        Ok(QuoteDto {
            property_id: property.id,
            check_in: stay.check_in,
            check_out: stay.check_out,
            currency: property.currency,
            price,
        })
    }

    pub async fn create_booking(
        &self,
        actor: Actor,
        request: CreateBookingRequest,
    ) -> UseCaseResult<BookingDto> {
        let now = Utc::now();
        let stay = validate_stay(request.check_in, request.check_out, now.date_naive())?;
        let property = self.load_property(request.property_id).await?;
        if property.owner_id == actor.user_id {
            return Err(BookingError::Validation(
                "hosts cannot book their own property".to_string(),
            ));
        }
        validate_guests(&request.guests, property.capacity)?;

        let price = price_stay(&stay, property.nightly_rate_minor, property.cleaning_fee_minor)
            .map_err(|err| BookingError::Validation(err.to_string()))?;
        let status = if property.instant_book {
            BookingStatus::AwaitingPayment
        } else {
            BookingStatus::Requested
        };

        let new_booking = NewBookingEntity {
            property_id: property.id,
            guest_id: actor.user_id,
            host_id: property.owner_id,
            stay,
            adults: request.guests.adults,
            children: request.guests.children,
            infants: request.guests.infants,
            currency: property.currency.clone(),
            price,
            status,
            hold_expires_at: self.hold_policy.expires_at(status, now),
            cancellation_policy: property.cancellation_policy,
            cancellation_deadline: cancellation_deadline(property.cancellation_policy, stay.check_in),
        };

        let outcome = self
            .booking_repo
            .create_with_hold(new_booking)
            .await
            .map_err(|err| {
                error!(
                    property_id = %property.id,
                    guest_id = %actor.user_id,
                    db_error = ?err,
                    "bookings: failed to create booking"
                );
                BookingError::Internal(err)
            })?;

        match outcome {
            CreateBookingOutcome::Created(booking) => {
                info!(
                    booking_id = %booking.id,
                    property_id = %booking.property_id,
                    guest_id = %booking.guest_id,
                    status = %booking.status,
                    total_price_minor = booking.price.total_price_minor,
                    "bookings: booking created with inventory hold"
                );
                record_transition(
                    self.event_repo.as_ref(),
                    booking.id,
                    None,
                    booking.status,
                    TransitionActor {
                        user_id: Some(actor.user_id),
                        role: CancelledBy::Guest,
                    },
                    None,
                )
                .await;
                Ok(BookingDto::from(booking))
            }
            CreateBookingOutcome::Conflict(existing) => {
                info!(
                    property_id = %property.id,
                    check_in = %stay.check_in,
                    check_out = %stay.check_out,
                    conflicts = existing.len(),
                    "bookings: requested dates are taken"
                );
                let check = ConflictCheck {
                    has_conflict: true,
                    conflicting_bookings: existing,
                };
                Err(BookingError::Conflict {
                    conflicts: check.conflicting_stays(),
                })
            }
        }
    }

    pub async fn get_booking(&self, actor: Actor, booking_id: Uuid) -> UseCaseResult<BookingDto> {
        let booking = self.load_visible_booking(&actor, booking_id).await?;
        Ok(BookingDto::from(booking))
    }

    pub async fn list_bookings(
        &self,
        actor: Actor,
        query: ListBookingsQuery,
    ) -> UseCaseResult<Vec<BookingDto>> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        let bookings = match query.scope {
            BookingListScope::Guest => self.booking_repo.list_for_guest(actor.user_id, limit).await,
            BookingListScope::Host => self.booking_repo.list_for_host(actor.user_id, limit).await,
        }
        .map_err(|err| {
            error!(user_id = %actor.user_id, db_error = ?err, "bookings: failed to list bookings");
            BookingError::Internal(err)
        })?;

        Ok(bookings.into_iter().map(BookingDto::from).collect())
    }

    pub async fn transition_booking(
        &self,
        actor: Actor,
        booking_id: Uuid,
        request: TransitionBookingRequest,
    ) -> UseCaseResult<BookingDto> {
        let booking = self
            .booking_repo
            .find_by_id(booking_id)
            .await
            .map_err(|err| {
                error!(%booking_id, db_error = ?err, "bookings: failed to load booking");
                BookingError::Internal(err)
            })?
            .ok_or(BookingError::NotAccessible)?;

        let relation = authorize_action(&actor, &booking, request.action).map_err(|violation| {
            warn!(
                %booking_id,
                user_id = %actor.user_id,
                action = %request.action,
                "bookings: transition not authorized"
            );
            violation_error(violation, &booking)
        })?;
        let next = next_status(booking.status, booking.payment_status, request.action)
            .map_err(|violation| violation_error(violation, &booking))?;

        let now = Utc::now();
        // A lapsed hold belongs to the sweeper; approving it would restart the clock.
        if request.action == BookingAction::Approve && is_hold_expired(&booking, now) {
            warn!(%booking_id, "bookings: refusing to approve a lapsed hold");
            return Err(BookingError::HoldExpired {
                current_status: booking.status,
            });
        }

        let change = BookingStatusChange {
            booking_id,
            expected_status: booking.status,
            new_status: next,
            new_payment_status: None,
            hold_expires_at: match next {
                BookingStatus::Approved => Some(Some(self.hold_policy.expires_at(next, now))),
                BookingStatus::Confirmed => Some(None),
                _ => None,
            },
            cancellation: (!next.is_live()).then(|| CancellationRecord {
                cancelled_at: now,
                cancelled_by: relation,
                reason: request.reason.clone(),
            }),
        };

        let outcome = self
            .booking_repo
            .apply_status_change(change)
            .await
            .map_err(|err| {
                error!(%booking_id, db_error = ?err, "bookings: failed to apply transition");
                BookingError::Internal(err)
            })?;

        let mut updated = match outcome {
            StatusChangeOutcome::Applied(updated) => updated,
            StatusChangeOutcome::Stale(current) => {
                info!(
                    %booking_id,
                    expected = %booking.status,
                    current = %current.status,
                    "bookings: booking moved concurrently, transition dropped"
                );
                return Err(BookingError::InvalidTransition {
                    action: request.action,
                    current_status: current.status,
                    payment_status: current.payment_status,
                });
            }
            StatusChangeOutcome::NotFound => return Err(BookingError::NotAccessible),
        };

        info!(
            %booking_id,
            from = %booking.status,
            to = %updated.status,
            action = %request.action,
            by = %relation,
            "bookings: booking transitioned"
        );
        record_transition(
            self.event_repo.as_ref(),
            booking_id,
            Some(booking.status),
            updated.status,
            TransitionActor {
                user_id: Some(actor.user_id),
                role: relation,
            },
            request.reason.clone(),
        )
        .await;

        if !updated.status.is_live() && updated.payment_status == PaymentStatus::Paid {
            if let Some(status) = self.refund_cancelled(&updated, relation, now).await {
                updated.payment_status = status;
            }
        }

        notify_status_change(self.notifier.as_ref(), &updated).await;
        Ok(BookingDto::from(updated))
    }

    /// Issues the refund a cancellation or rejection of a paid booking owes. Returns the new
    /// payment status when money went back.
    async fn refund_cancelled(
        &self,
        booking: &BookingEntity,
        cancelled_by: CancelledBy,
        now: DateTime<Utc>,
    ) -> Option<PaymentStatus> {
        let quote = match refund_quote(
            booking.cancellation_policy,
            cancelled_by,
            booking.price.total_price_minor,
            booking.cancellation_deadline,
            now,
        ) {
            Ok(quote) => quote,
            Err(err) => {
                error!(booking_id = %booking.id, error = ?err, "refunds: failed to compute refund");
                return None;
            }
        };

        if quote.is_empty() {
            info!(
                booking_id = %booking.id,
                policy = %booking.cancellation_policy,
                "refunds: cancelled after the deadline, nothing refundable"
            );
            return None;
        }

        refund_booking(
            &self.gateways,
            self.payment_repo.as_ref(),
            booking,
            quote.amount_minor,
            quote.resulting_status,
        )
        .await
        .then_some(quote.resulting_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crates::domain::{
        entities::payments::PaymentEntity,
        repositories::{
            booking_events::MockBookingEventRepository, booking_notifier::MockBookingNotifier,
            bookings::MockBookingRepository, payment_gateways::MockPaymentGatewayClient,
            payments::MockPaymentRepository, properties::MockPropertyRepository,
        },
        value_objects::{
            enums::{
                cancellation_policies::CancellationPolicy, payment_gateways::PaymentGateway,
            },
            payments::GatewayRefund,
        },
    };
    use mockall::predicate::{always, eq};

    type TestUseCase = BookingUseCase<
        MockBookingRepository,
        MockPropertyRepository,
        MockPaymentRepository,
        MockBookingEventRepository,
        MockBookingNotifier,
    >;

    struct Mocks {
        bookings: MockBookingRepository,
        properties: MockPropertyRepository,
        payments: MockPaymentRepository,
        events: MockBookingEventRepository,
        notifier: MockBookingNotifier,
        gateways: PaymentGateways,
    }

    impl Mocks {
        fn new() -> Self {
            let mut events = MockBookingEventRepository::new();
            events.expect_record_event().returning(|_| Ok(()));
            let mut notifier = MockBookingNotifier::new();
            notifier.expect_notify().returning(|_| Ok(()));

            Self {
                bookings: MockBookingRepository::new(),
                properties: MockPropertyRepository::new(),
                payments: MockPaymentRepository::new(),
                events,
                notifier,
                gateways: PaymentGateways::new(),
            }
        }

        fn into_usecase(self) -> TestUseCase {
            BookingUseCase::new(
                Arc::new(self.bookings),
                Arc::new(self.properties),
                Arc::new(self.payments),
                Arc::new(self.events),
                Arc::new(self.notifier),
                self.gateways,
                HoldPolicy::default(),
            )
        }
    }

    fn property(instant_book: bool) -> PropertyEntity {
        PropertyEntity {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Harbour loft".to_string(),
            nightly_rate_minor: 120_00,
            cleaning_fee_minor: 25_00,
            currency: "USD".to_string(),
            cancellation_policy: CancellationPolicy::Moderate,
            capacity: 4,
            instant_book,
        }
    }

    fn future_stay(offset_days: i64, nights: i64) -> StayRange {
        let check_in = Utc::now().date_naive() + Duration::days(offset_days);
        StayRange::new(check_in, check_in + Duration::days(nights)).unwrap()
    }

    fn booking_for(property: &PropertyEntity, stay: StayRange, status: BookingStatus) -> BookingEntity {
        let now = Utc::now();
        let price = price_stay(&stay, property.nightly_rate_minor, property.cleaning_fee_minor).unwrap();
        BookingEntity {
            id: Uuid::new_v4(),
            property_id: property.id,
            guest_id: Uuid::new_v4(),
            host_id: property.owner_id,
            check_in: stay.check_in,
            check_out: stay.check_out,
            number_of_nights: price.nights as i32,
            number_of_guests: 2,
            adults: 2,
            children: 0,
            infants: 0,
            currency: property.currency.clone(),
            price,
            status,
            payment_status: PaymentStatus::Pending,
            hold_expires_at: Some(now + Duration::minutes(15)),
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            cancellation_policy: property.cancellation_policy,
            cancellation_deadline: cancellation_deadline(property.cancellation_policy, stay.check_in),
            created_at: now,
            updated_at: now,
        }
    }

    fn actor(user_id: Uuid) -> Actor {
        Actor {
            user_id,
            is_host: false,
            is_admin: false,
        }
    }

    fn create_request(property: &PropertyEntity, stay: StayRange, adults: i32) -> CreateBookingRequest {
        CreateBookingRequest {
            property_id: property.id,
            check_in: stay.check_in,
            check_out: stay.check_out,
            guests: GuestCounts {
                adults,
                children: 0,
                infants: 1,
            },
        }
    }

    /// Stands in for the database: applies the change to the loaded booking.
    fn applied(booking: &BookingEntity, change: &BookingStatusChange) -> BookingEntity {
        let mut updated = booking.clone();
        updated.status = change.new_status;
        if let Some(hold) = change.hold_expires_at {
            updated.hold_expires_at = hold;
        }
        if let Some(record) = &change.cancellation {
            updated.cancelled_at = Some(record.cancelled_at);
            updated.cancelled_by = Some(record.cancelled_by);
            updated.cancellation_reason = record.reason.clone();
        }
        updated
    }

    #[tokio::test]
    async fn instant_book_holds_the_dates_awaiting_payment() {
        let property = property(true);
        let stay = future_stay(30, 3);
        let guest = actor(Uuid::new_v4());
        let mut mocks = Mocks::new();

        let loaded = property.clone();
        mocks
            .properties
            .expect_find_by_id()
            .with(eq(property.id))
            .returning(move |_| Ok(Some(loaded.clone())));
        let template = booking_for(&property, stay, BookingStatus::AwaitingPayment);
        mocks
            .bookings
            .expect_create_with_hold()
            .withf(|new| {
                new.status == BookingStatus::AwaitingPayment
                    && new.price.subtotal_minor == 360_00
                    && new.hold_expires_at > Utc::now() + Duration::minutes(14)
                    && new.hold_expires_at <= Utc::now() + Duration::minutes(15)
            })
            .times(1)
            .returning(move |new| {
                let mut created = template.clone();
                created.guest_id = new.guest_id;
                Ok(CreateBookingOutcome::Created(created))
            });

        let dto = mocks
            .into_usecase()
            .create_booking(guest, create_request(&property, stay, 2))
            .await
            .unwrap();

        assert_eq!(dto.status, BookingStatus::AwaitingPayment);
        assert_eq!(dto.guest_id, guest.user_id);
        assert_eq!(dto.number_of_nights, 3);
    }

    #[tokio::test]
    async fn request_to_book_starts_in_requested_with_the_longer_hold() {
        let property = property(false);
        let stay = future_stay(10, 2);
        let mut mocks = Mocks::new();

        let loaded = property.clone();
        mocks
            .properties
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));
        let template = booking_for(&property, stay, BookingStatus::Requested);
        mocks
            .bookings
            .expect_create_with_hold()
            .withf(|new| {
                new.status == BookingStatus::Requested
                    && new.hold_expires_at > Utc::now() + Duration::hours(23)
            })
            .returning(move |_| Ok(CreateBookingOutcome::Created(template.clone())));

        let dto = mocks
            .into_usecase()
            .create_booking(actor(Uuid::new_v4()), create_request(&property, stay, 1))
            .await
            .unwrap();

        assert_eq!(dto.status, BookingStatus::Requested);
    }

    #[tokio::test]
    async fn second_guest_for_the_same_dates_gets_a_conflict() {
        let property = property(true);
        let stay = future_stay(20, 3);
        let mut mocks = Mocks::new();

        let loaded = property.clone();
        mocks
            .properties
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));

        let winner = booking_for(&property, stay, BookingStatus::AwaitingPayment);
        let mut first_call = true;
        mocks
            .bookings
            .expect_create_with_hold()
            .times(2)
            .returning(move |_| {
                if std::mem::take(&mut first_call) {
                    Ok(CreateBookingOutcome::Created(winner.clone()))
                } else {
                    Ok(CreateBookingOutcome::Conflict(vec![winner.clone()]))
                }
            });

        let usecase = mocks.into_usecase();
        let first = usecase
            .create_booking(actor(Uuid::new_v4()), create_request(&property, stay, 2))
            .await;
        let second = usecase
            .create_booking(actor(Uuid::new_v4()), create_request(&property, stay, 2))
            .await;

        assert!(first.is_ok());
        match second {
            Err(BookingError::Conflict { conflicts }) => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].check_in, stay.check_in);
                assert_eq!(conflicts[0].check_out, stay.check_out);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_invalid_requests_before_touching_inventory() {
        let property = property(true);
        let mut mocks = Mocks::new();
        let loaded = property.clone();
        mocks
            .properties
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));
        let usecase = mocks.into_usecase();
        let guest = actor(Uuid::new_v4());
        let stay = future_stay(5, 2);

        let same_day = CreateBookingRequest {
            check_out: stay.check_in,
            ..create_request(&property, stay, 2)
        };
        assert!(matches!(
            usecase.create_booking(guest, same_day).await,
            Err(BookingError::Validation(_))
        ));

        let past = create_request(&property, future_stay(-2, 3), 2);
        assert!(matches!(
            usecase.create_booking(guest, past).await,
            Err(BookingError::Validation(_))
        ));

        let no_adults = create_request(&property, stay, 0);
        assert!(matches!(
            usecase.create_booking(guest, no_adults).await,
            Err(BookingError::Validation(_))
        ));

        let crowded = CreateBookingRequest {
            guests: GuestCounts {
                adults: 3,
                children: 2,
                infants: 0,
            },
            ..create_request(&property, stay, 3)
        };
        assert!(matches!(
            usecase.create_booking(guest, crowded).await,
            Err(BookingError::Validation(_))
        ));

        let own_listing = actor(property.owner_id);
        assert!(matches!(
            usecase
                .create_booking(own_listing, create_request(&property, stay, 2))
                .await,
            Err(BookingError::Validation(_))
        ));

        let overflowing = CreateBookingRequest {
            guests: GuestCounts {
                adults: i32::MAX,
                children: 1,
                infants: 0,
            },
            ..create_request(&property, stay, 1)
        };
        assert!(matches!(
            usecase.create_booking(guest, overflowing).await,
            Err(BookingError::Validation(_))
        ));

        let endless = create_request(&property, future_stay(5, MAX_STAY_NIGHTS + 1), 2);
        assert!(matches!(
            usecase.create_booking(guest, endless).await,
            Err(BookingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn quote_rejects_guest_counts_that_overflow() {
        let property = property(true);
        let mut mocks = Mocks::new();
        let loaded = property.clone();
        mocks
            .properties
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));
        let usecase = mocks.into_usecase();
        let stay = future_stay(5, 2);

        let result = usecase
            .quote(QuoteRequest {
                property_id: property.id,
                check_in: stay.check_in,
                check_out: stay.check_out,
                guests: GuestCounts {
                    adults: i32::MAX,
                    children: 1,
                    infants: 0,
                },
            })
            .await;

        assert!(matches!(result, Err(BookingError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_property_is_not_found() {
        let mut mocks = Mocks::new();
        mocks.properties.expect_find_by_id().returning(|_| Ok(None));
        let property = property(true);

        let result = mocks
            .into_usecase()
            .create_booking(actor(Uuid::new_v4()), create_request(&property, future_stay(3, 1), 1))
            .await;

        assert!(matches!(result, Err(BookingError::PropertyNotFound)));
    }

    #[tokio::test]
    async fn availability_reports_live_overlaps_only() {
        let property = property(true);
        let stay = future_stay(40, 4);
        let mut mocks = Mocks::new();

        let loaded = property.clone();
        mocks
            .properties
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));
        let live = booking_for(&property, future_stay(42, 3), BookingStatus::Confirmed);
        let cancelled = booking_for(&property, future_stay(40, 1), BookingStatus::Cancelled);
        mocks
            .bookings
            .expect_find_live_overlapping()
            .with(eq(property.id), eq(stay.check_in), eq(stay.check_out))
            .returning(move |_, _, _| Ok(vec![live.clone(), cancelled.clone()]));

        let dto = mocks
            .into_usecase()
            .check_availability(
                property.id,
                AvailabilityQuery {
                    check_in: stay.check_in,
                    check_out: stay.check_out,
                },
            )
            .await
            .unwrap();

        assert!(dto.has_conflict);
        assert_eq!(dto.conflicts.len(), 1);
    }

    #[tokio::test]
    async fn quote_prices_without_holding_inventory() {
        let property = property(true);
        let stay = future_stay(12, 3);
        let mut mocks = Mocks::new();
        let loaded = property.clone();
        mocks
            .properties
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));

        let quote = mocks
            .into_usecase()
            .quote(QuoteRequest {
                property_id: property.id,
                check_in: stay.check_in,
                check_out: stay.check_out,
                guests: GuestCounts {
                    adults: 2,
                    children: 1,
                    infants: 0,
                },
            })
            .await
            .unwrap();

        assert_eq!(quote.price.subtotal_minor, 360_00);
        assert_eq!(quote.price.service_fee_minor, 36_00);
        assert_eq!(quote.currency, "USD");
    }

    #[tokio::test]
    async fn host_of_another_property_cannot_touch_the_booking() {
        let property = property(false);
        let booking = booking_for(&property, future_stay(9, 2), BookingStatus::Requested);
        let mut mocks = Mocks::new();
        let loaded = booking.clone();
        mocks
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));
        mocks.bookings.expect_apply_status_change().never();

        let stranger = Actor {
            user_id: Uuid::new_v4(),
            is_host: true,
            is_admin: false,
        };
        let usecase = mocks.into_usecase();

        let result = usecase
            .transition_booking(
                stranger,
                booking.id,
                TransitionBookingRequest {
                    action: BookingAction::Cancel,
                    reason: None,
                },
            )
            .await;
        assert!(matches!(result, Err(BookingError::NotAccessible)));

        let read = usecase.get_booking(stranger, booking.id).await;
        assert!(matches!(read, Err(BookingError::NotAccessible)));
    }

    #[tokio::test]
    async fn guest_cannot_approve_their_own_request() {
        let property = property(false);
        let booking = booking_for(&property, future_stay(9, 2), BookingStatus::Requested);
        let guest = actor(booking.guest_id);
        let mut mocks = Mocks::new();
        let loaded = booking.clone();
        mocks
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));
        mocks.bookings.expect_apply_status_change().never();

        let result = mocks
            .into_usecase()
            .transition_booking(
                guest,
                booking.id,
                TransitionBookingRequest {
                    action: BookingAction::Approve,
                    reason: None,
                },
            )
            .await;

        assert!(matches!(result, Err(BookingError::NotAccessible)));
    }

    #[tokio::test]
    async fn host_approval_restarts_the_payment_hold() {
        let property = property(false);
        let booking = booking_for(&property, future_stay(9, 2), BookingStatus::Requested);
        let host = actor(property.owner_id);
        let mut mocks = Mocks::new();

        let loaded = booking.clone();
        mocks
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));
        let current = booking.clone();
        mocks
            .bookings
            .expect_apply_status_change()
            .withf(|change| {
                change.expected_status == BookingStatus::Requested
                    && change.new_status == BookingStatus::Approved
                    && change.cancellation.is_none()
                    && matches!(change.hold_expires_at, Some(Some(_)))
            })
            .times(1)
            .returning(move |change| Ok(StatusChangeOutcome::Applied(applied(&current, &change))));

        let dto = mocks
            .into_usecase()
            .transition_booking(
                host,
                booking.id,
                TransitionBookingRequest {
                    action: BookingAction::Approve,
                    reason: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(dto.status, BookingStatus::Approved);
    }

    #[tokio::test]
    async fn host_cannot_approve_a_lapsed_request() {
        let property = property(false);
        let mut booking = booking_for(&property, future_stay(9, 2), BookingStatus::Requested);
        booking.hold_expires_at = Some(Utc::now() - Duration::hours(1));
        let host = actor(property.owner_id);
        let mut mocks = Mocks::new();
        let loaded = booking.clone();
        mocks
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));
        mocks.bookings.expect_apply_status_change().never();

        let result = mocks
            .into_usecase()
            .transition_booking(
                host,
                booking.id,
                TransitionBookingRequest {
                    action: BookingAction::Approve,
                    reason: None,
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(BookingError::HoldExpired {
                current_status: BookingStatus::Requested
            })
        ));
    }

    #[tokio::test]
    async fn invalid_transition_reports_current_state() {
        let property = property(true);
        let booking = booking_for(&property, future_stay(9, 2), BookingStatus::Expired);
        let host = actor(property.owner_id);
        let mut mocks = Mocks::new();
        let loaded = booking.clone();
        mocks
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));
        mocks.bookings.expect_apply_status_change().never();

        let result = mocks
            .into_usecase()
            .transition_booking(
                host,
                booking.id,
                TransitionBookingRequest {
                    action: BookingAction::Cancel,
                    reason: None,
                },
            )
            .await;

        match result {
            Err(BookingError::InvalidTransition {
                current_status,
                action,
                ..
            }) => {
                assert_eq!(current_status, BookingStatus::Expired);
                assert_eq!(action, BookingAction::Cancel);
            }
            other => panic!("expected invalid transition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_move_surfaces_as_invalid_transition() {
        let property = property(true);
        let booking = booking_for(&property, future_stay(9, 2), BookingStatus::AwaitingPayment);
        let guest = actor(booking.guest_id);
        let mut mocks = Mocks::new();
        let loaded = booking.clone();
        mocks
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));
        let mut expired = booking.clone();
        expired.status = BookingStatus::Expired;
        mocks
            .bookings
            .expect_apply_status_change()
            .returning(move |_| Ok(StatusChangeOutcome::Stale(expired.clone())));

        let result = mocks
            .into_usecase()
            .transition_booking(
                guest,
                booking.id,
                TransitionBookingRequest {
                    action: BookingAction::Cancel,
                    reason: None,
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(BookingError::InvalidTransition {
                current_status: BookingStatus::Expired,
                ..
            })
        ));
    }

    fn paid_booking(policy: CancellationPolicy, check_in_offset_days: i64) -> (PropertyEntity, BookingEntity) {
        let mut property = property(true);
        property.cancellation_policy = policy;
        let mut booking = booking_for(
            &property,
            future_stay(check_in_offset_days, 3),
            BookingStatus::Confirmed,
        );
        booking.payment_status = PaymentStatus::Paid;
        booking.hold_expires_at = None;
        (property, booking)
    }

    fn paid_attempt(booking: &BookingEntity) -> PaymentEntity {
        let now = Utc::now();
        PaymentEntity {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            payer_id: booking.guest_id,
            amount_minor: booking.price.total_price_minor,
            currency: booking.currency.clone(),
            status: PaymentStatus::Paid,
            method: PaymentGateway::Stripe,
            gateway_ref: Some("pi_123".to_string()),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn cancel_mocks(booking: &BookingEntity, refund_amount: Option<i64>) -> Mocks {
        let mut mocks = Mocks::new();
        let loaded = booking.clone();
        mocks
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(loaded.clone())));
        let current = booking.clone();
        mocks
            .bookings
            .expect_apply_status_change()
            .withf(|change| {
                change.new_status == BookingStatus::Cancelled && change.cancellation.is_some()
            })
            .returning(move |change| Ok(StatusChangeOutcome::Applied(applied(&current, &change))));

        match refund_amount {
            Some(amount) => {
                let payment = paid_attempt(booking);
                let payment_id = payment.id;
                mocks
                    .payments
                    .expect_find_paid_for_booking()
                    .with(eq(booking.id))
                    .returning(move |_| Ok(Some(payment.clone())));

                let mut gateway = MockPaymentGatewayClient::new();
                gateway.expect_gateway().return_const(PaymentGateway::Stripe);
                gateway
                    .expect_refund()
                    .with(eq("pi_123".to_string()), eq(amount), always(), eq(format!("refund-{payment_id}")))
                    .times(1)
                    .returning(|_, _, _, _| {
                        Ok(GatewayRefund {
                            refund_id: "re_1".to_string(),
                        })
                    });
                mocks.gateways = PaymentGateways::new().with(Arc::new(gateway));

                mocks
                    .payments
                    .expect_record_refund()
                    .with(eq(payment_id), eq("re_1".to_string()), eq(amount), always())
                    .times(1)
                    .returning(|_, _, _, _| Ok(()));
            }
            None => {
                mocks.payments.expect_find_paid_for_booking().never();
                mocks.payments.expect_record_refund().never();
            }
        }
        mocks
    }

    fn cancel() -> TransitionBookingRequest {
        TransitionBookingRequest {
            action: BookingAction::Cancel,
            reason: Some("plans changed".to_string()),
        }
    }

    #[tokio::test]
    async fn guest_cancelling_early_gets_a_full_refund() {
        let (_, booking) = paid_booking(CancellationPolicy::Strict, 60);
        let total = booking.price.total_price_minor;

        let dto = cancel_mocks(&booking, Some(total))
            .into_usecase()
            .transition_booking(actor(booking.guest_id), booking.id, cancel())
            .await
            .unwrap();

        assert_eq!(dto.status, BookingStatus::Cancelled);
        assert_eq!(dto.cancelled_by, Some(CancelledBy::Guest));
        assert_eq!(dto.payment_status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn late_guest_cancellation_under_moderate_refunds_half() {
        let (_, booking) = paid_booking(CancellationPolicy::Moderate, 2);
        let half = (booking.price.total_price_minor + 1) / 2;

        let dto = cancel_mocks(&booking, Some(half))
            .into_usecase()
            .transition_booking(actor(booking.guest_id), booking.id, cancel())
            .await
            .unwrap();

        assert_eq!(dto.payment_status, PaymentStatus::PartiallyRefunded);
    }

    #[tokio::test]
    async fn late_guest_cancellation_under_strict_refunds_nothing() {
        let (_, booking) = paid_booking(CancellationPolicy::Strict, 3);

        let dto = cancel_mocks(&booking, None)
            .into_usecase()
            .transition_booking(actor(booking.guest_id), booking.id, cancel())
            .await
            .unwrap();

        assert_eq!(dto.status, BookingStatus::Cancelled);
        assert_eq!(dto.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn host_cancellation_always_refunds_in_full() {
        let (property, booking) = paid_booking(CancellationPolicy::Strict, 1);
        let total = booking.price.total_price_minor;

        let dto = cancel_mocks(&booking, Some(total))
            .into_usecase()
            .transition_booking(actor(property.owner_id), booking.id, cancel())
            .await
            .unwrap();

        assert_eq!(dto.cancelled_by, Some(CancelledBy::Host));
        assert_eq!(dto.payment_status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn failed_refund_does_not_undo_the_cancellation() {
        let (_, booking) = paid_booking(CancellationPolicy::Flexible, 30);
        let mut mocks = cancel_mocks(&booking, None);
        mocks.payments = MockPaymentRepository::new();
        mocks
            .payments
            .expect_find_paid_for_booking()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));

        let dto = mocks
            .into_usecase()
            .transition_booking(actor(booking.guest_id), booking.id, cancel())
            .await
            .unwrap();

        assert_eq!(dto.status, BookingStatus::Cancelled);
        assert_eq!(dto.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn lists_bookings_in_the_requested_role_with_a_bounded_limit() {
        let user = actor(Uuid::new_v4());
        let mut mocks = Mocks::new();
        mocks
            .bookings
            .expect_list_for_host()
            .with(eq(user.user_id), eq(MAX_LIST_LIMIT))
            .times(1)
            .returning(|_, _| Ok(vec![]));
        mocks.bookings.expect_list_for_guest().never();

        let listed = mocks
            .into_usecase()
            .list_bookings(
                user,
                ListBookingsQuery {
                    scope: BookingListScope::Host,
                    limit: Some(10_000),
                },
            )
            .await
            .unwrap();

        assert!(listed.is_empty());
    }
}
