use std::sync::Arc;

use chrono::Utc;
use crates::{
    domain::{
        entities::{
            bookings::BookingEntity,
            payments::{NewPaymentEntity, PaymentConfirmation, PaymentEntity},
        },
        repositories::{
            booking_events::BookingEventRepository, booking_notifier::BookingNotifier,
            bookings::BookingRepository, payments::PaymentRepository,
        },
        value_objects::{
            booking_lifecycle::{Actor, is_hold_expired},
            bookings::BookingDto,
            enums::{payment_gateways::PaymentGateway, payment_statuses::PaymentStatus},
            payments::{
                ConfirmPaymentRequest, GatewayOrderRequest, GatewayPaymentStatus,
                InitiatePaymentRequest, OrderRefDto, WebhookHeaders,
            },
        },
    },
    payments::gateways::{PaymentGateways, SharedGatewayClient},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    booking_effects::{
        TransitionActor, notify_booking, notify_status_change, record_transition, refund_payment,
    },
    booking_errors::{BookingError, UseCaseResult},
};

const LATE_PAYMENT_NOTE: &str = "payment arrived after the booking left the live set; refunded";

pub struct PaymentUseCase<B, Pay, E, N>
where
    B: BookingRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    E: BookingEventRepository + Send + Sync + 'static,
    N: BookingNotifier + Send + Sync + 'static,
{
    booking_repo: Arc<B>,
    payment_repo: Arc<Pay>,
    event_repo: Arc<E>,
    notifier: Arc<N>,
    gateways: PaymentGateways,
}

impl<B, Pay, E, N> PaymentUseCase<B, Pay, E, N>
where
    B: BookingRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    E: BookingEventRepository + Send + Sync + 'static,
    N: BookingNotifier + Send + Sync + 'static,
{
    pub fn new(
        booking_repo: Arc<B>,
        payment_repo: Arc<Pay>,
        event_repo: Arc<E>,
        notifier: Arc<N>,
        gateways: PaymentGateways,
    ) -> Self {
        Self {
            booking_repo,
            payment_repo,
            event_repo,
            notifier,
            gateways,
        }
    }

    fn client(&self, gateway: PaymentGateway) -> UseCaseResult<SharedGatewayClient> {
        self.gateways
            .get(gateway)
            .ok_or(BookingError::GatewayNotConfigured(gateway))
    }

    async fn load_booking(&self, booking_id: Uuid) -> UseCaseResult<Option<BookingEntity>> {
        self.booking_repo.find_by_id(booking_id).await.map_err(|err| {
            error!(%booking_id, db_error = ?err, "payments: failed to load booking");
            BookingError::Internal(err)
        })
    }

    /// Opens a gateway order for a booking that is still waiting for its money. Only the guest
    /// who made the booking can pay for it.
    pub async fn initiate_payment(
        &self,
        actor: Actor,
        request: InitiatePaymentRequest,
    ) -> UseCaseResult<OrderRefDto> {
        let booking = self
            .load_booking(request.booking_id)
            .await?
            .filter(|booking| booking.guest_id == actor.user_id)
            .ok_or(BookingError::NotAccessible)?;

        if !booking.status.is_payable() || booking.payment_status == PaymentStatus::Paid {
            info!(
                booking_id = %booking.id,
                status = %booking.status,
                payment_status = %booking.payment_status,
                "payments: booking is not payable"
            );
            return Err(BookingError::StatusConflict {
                current_status: booking.status,
                payment_status: booking.payment_status,
            });
        }
        if is_hold_expired(&booking, Utc::now()) {
            info!(booking_id = %booking.id, "payments: hold lapsed before payment started");
            return Err(BookingError::HoldExpired {
                current_status: booking.status,
            });
        }

        let client = self.client(request.gateway)?;
        let payment_id = Uuid::new_v4();
        let order_request = GatewayOrderRequest {
            payment_id,
            booking_id: booking.id,
            amount_minor: booking.price.total_price_minor,
            currency: booking.currency.clone(),
            description: format!(
                "Stay {} to {} ({} nights)",
                booking.check_in, booking.check_out, booking.number_of_nights
            ),
        };

        let mut attempt = NewPaymentEntity {
            id: payment_id,
            booking_id: booking.id,
            payer_id: actor.user_id,
            amount_minor: booking.price.total_price_minor,
            currency: booking.currency.clone(),
            status: PaymentStatus::Pending,
            method: request.gateway,
            gateway_ref: None,
            error: None,
        };

        let order = match client.create_order(order_request).await {
            Ok(order) => order,
            Err(err) => {
                error!(
                    booking_id = %booking.id,
                    gateway = %request.gateway,
                    error = ?err,
                    "payments: gateway rejected order creation"
                );
                attempt.status = PaymentStatus::Failed;
                attempt.error = Some(err.to_string());
                if let Err(db_err) = self.payment_repo.record_payment(attempt).await {
                    error!(
                        booking_id = %booking.id,
                        db_error = ?db_err,
                        "payments: failed to record failed attempt"
                    );
                }
                return Err(BookingError::Gateway(err));
            }
        };

        attempt.gateway_ref = Some(order.gateway_ref.clone());
        self.payment_repo
            .record_payment(attempt)
            .await
            .map_err(|err| {
                error!(
                    booking_id = %booking.id,
                    gateway_ref = %order.gateway_ref,
                    db_error = ?err,
                    "payments: failed to record payment attempt"
                );
                BookingError::Internal(err)
            })?;

        info!(
            booking_id = %booking.id,
            %payment_id,
            gateway = %request.gateway,
            gateway_ref = %order.gateway_ref,
            "payments: gateway order created"
        );

        Ok(OrderRefDto {
            payment_id,
            booking_id: booking.id,
            gateway: request.gateway,
            order_ref: order.gateway_ref,
            amount_minor: booking.price.total_price_minor,
            currency: booking.currency,
            client_secret: order.client_secret,
            redirect_url: order.redirect_url,
        })
    }

    /// Explicit verify call after the guest returns from the gateway. The client's claim is
    /// only a hint; the gateway is asked for the real status.
    pub async fn confirm_payment(
        &self,
        actor: Actor,
        request: ConfirmPaymentRequest,
    ) -> UseCaseResult<BookingDto> {
        // Unknown and foreign orders look the same to the caller.
        let payment = self
            .find_payment(request.gateway, request.order_ref.clone())
            .await
            .map_err(|err| match err {
                BookingError::PaymentNotFound => BookingError::NotAccessible,
                other => other,
            })?;
        let booking = self
            .load_booking(payment.booking_id)
            .await?
            .ok_or(BookingError::NotAccessible)?;
        if booking.guest_id != actor.user_id && !actor.is_admin {
            return Err(BookingError::NotAccessible);
        }

        let booking = self.reconcile(payment, booking).await?;
        Ok(BookingDto::from(booking))
    }

    /// Authenticates a gateway notification and reconciles the order it names. After the
    /// signature check every outcome is logged rather than returned, so the gateway stops
    /// redelivering.
    pub async fn handle_webhook(
        &self,
        gateway: PaymentGateway,
        headers: WebhookHeaders,
        payload: Vec<u8>,
    ) -> UseCaseResult<()> {
        let client = self.client(gateway)?;
        let order_ref = client.verify_webhook(headers, payload).await.map_err(|err| {
            warn!(%gateway, error = ?err, "payment_webhooks: rejected unauthenticated delivery");
            BookingError::InvalidWebhook(err.to_string())
        })?;

        let Some(order_ref) = order_ref else {
            info!(%gateway, "payment_webhooks: event carries no order, ignored");
            return Ok(());
        };

        let outcome = async {
            let payment = self.find_payment(gateway, order_ref.clone()).await?;
            let booking = self
                .load_booking(payment.booking_id)
                .await?
                .ok_or_else(|| {
                    BookingError::Internal(anyhow::anyhow!(
                        "booking {} of payment {} is missing",
                        payment.booking_id,
                        payment.id
                    ))
                })?;
            self.reconcile(payment, booking).await
        }
        .await;

        match outcome {
            Ok(booking) => info!(
                %gateway,
                %order_ref,
                booking_id = %booking.id,
                status = %booking.status,
                "payment_webhooks: order reconciled"
            ),
            Err(
                err @ (BookingError::PaymentPending
                | BookingError::PaymentDeclined { .. }
                | BookingError::AlreadyExpired { .. }
                | BookingError::PaymentNotFound),
            ) => info!(%gateway, %order_ref, outcome = %err, "payment_webhooks: order reconciled"),
            Err(err) => error!(
                %gateway,
                %order_ref,
                error = ?err,
                "payment_webhooks: reconciliation failed, manual follow-up needed"
            ),
        }

        Ok(())
    }

    async fn find_payment(&self, gateway: PaymentGateway, order_ref: String) -> UseCaseResult<PaymentEntity> {
        self.payment_repo
            .find_by_gateway_ref(gateway, order_ref.clone())
            .await
            .map_err(|err| {
                error!(%gateway, %order_ref, db_error = ?err, "payments: failed to load payment");
                BookingError::Internal(err)
            })?
            .ok_or(BookingError::PaymentNotFound)
    }

    /// Applies the gateway's authoritative status to one payment attempt. Shared by the explicit
    /// confirm call and the webhooks; safe to run any number of times.
    async fn reconcile(&self, payment: PaymentEntity, booking: BookingEntity) -> UseCaseResult<BookingEntity> {
        let client = self.client(payment.method)?;
        let gateway_ref = payment.gateway_ref.clone().ok_or_else(|| {
            BookingError::Internal(anyhow::anyhow!("payment {} has no gateway reference", payment.id))
        })?;

        let state = client
            .capture_or_sync(gateway_ref.clone())
            .await
            .map_err(|err| {
                error!(
                    payment_id = %payment.id,
                    %gateway_ref,
                    error = ?err,
                    "payments: failed to fetch gateway status"
                );
                BookingError::Gateway(err)
            })?;

        match state.status {
            GatewayPaymentStatus::Pending => Err(BookingError::PaymentPending),
            GatewayPaymentStatus::Failed => {
                let reason = state
                    .failure_reason
                    .unwrap_or_else(|| "payment declined".to_string());
                self.payment_repo
                    .mark_failed(payment.id, reason.clone())
                    .await
                    .map_err(|err| {
                        error!(payment_id = %payment.id, db_error = ?err, "payments: failed to mark attempt failed");
                        BookingError::Internal(err)
                    })?;
                info!(
                    payment_id = %payment.id,
                    booking_id = %payment.booking_id,
                    %reason,
                    "payments: gateway reported failure, booking left payable"
                );
                Err(BookingError::PaymentDeclined { reason })
            }
            GatewayPaymentStatus::Succeeded => {
                // A capture whose amount or currency cannot be read is treated as a mismatch.
                let amount_matches = state.amount_minor == Some(payment.amount_minor);
                let currency_matches = state
                    .currency
                    .as_deref()
                    .is_some_and(|currency| currency.eq_ignore_ascii_case(&payment.currency));
                if !amount_matches || !currency_matches {
                    error!(
                        payment_id = %payment.id,
                        expected_minor = payment.amount_minor,
                        expected_currency = %payment.currency,
                        gateway_minor = ?state.amount_minor,
                        gateway_currency = ?state.currency,
                        "payments: captured amount does not match the booking, manual reconciliation needed"
                    );
                    return Err(BookingError::Internal(anyhow::anyhow!(
                        "captured amount mismatch on payment {}",
                        payment.id
                    )));
                }

                let transaction_id = state.gateway_transaction_id.unwrap_or(gateway_ref);
                self.apply_success(payment, booking, transaction_id).await
            }
        }
    }

    async fn apply_success(
        &self,
        payment: PaymentEntity,
        before: BookingEntity,
        transaction_id: String,
    ) -> UseCaseResult<BookingEntity> {
        let confirmation = self
            .payment_repo
            .confirm_payment(payment.id, transaction_id, payment.amount_minor)
            .await
            .map_err(|err| {
                error!(payment_id = %payment.id, db_error = ?err, "payments: failed to apply payment");
                BookingError::Internal(err)
            })?;

        match confirmation {
            PaymentConfirmation::Confirmed(booking) => {
                info!(
                    booking_id = %booking.id,
                    payment_id = %payment.id,
                    status = %booking.status,
                    "payments: booking paid"
                );
                if booking.status != before.status {
                    record_transition(
                        self.event_repo.as_ref(),
                        booking.id,
                        Some(before.status),
                        booking.status,
                        TransitionActor::system(),
                        Some(format!("payment {} confirmed by {}", payment.id, payment.method)),
                    )
                    .await;
                    notify_status_change(self.notifier.as_ref(), &booking).await;
                }
                Ok(booking)
            }
            PaymentConfirmation::AlreadyApplied(booking) => {
                info!(payment_id = %payment.id, "payments: payment already applied");
                Ok(booking)
            }
            PaymentConfirmation::BookingUnavailable(booking) => {
                warn!(
                    booking_id = %booking.id,
                    payment_id = %payment.id,
                    status = %booking.status,
                    "payments: payment arrived after the booking left the live set, refunding"
                );
                self.refund_in_full(&payment).await;
                record_transition(
                    self.event_repo.as_ref(),
                    booking.id,
                    Some(booking.status),
                    booking.status,
                    TransitionActor::system(),
                    Some(LATE_PAYMENT_NOTE.to_string()),
                )
                .await;
                notify_booking(
                    self.notifier.as_ref(),
                    &booking,
                    "Payment received after the booking expired; it is being refunded",
                )
                .await;
                Err(BookingError::AlreadyExpired {
                    current_status: booking.status,
                })
            }
            PaymentConfirmation::DuplicateCharge(booking) => {
                warn!(
                    booking_id = %booking.id,
                    payment_id = %payment.id,
                    "payments: booking already paid by another attempt, refunding duplicate charge"
                );
                self.refund_in_full(&payment).await;
                Ok(booking)
            }
            PaymentConfirmation::PaymentNotFound => Err(BookingError::PaymentNotFound),
        }
    }

    async fn refund_in_full(&self, payment: &PaymentEntity) {
        if let Err(err) = refund_payment(
            &self.gateways,
            self.payment_repo.as_ref(),
            payment,
            payment.amount_minor,
            PaymentStatus::Refunded,
        )
        .await
        {
            error!(
                payment_id = %payment.id,
                booking_id = %payment.booking_id,
                amount_minor = payment.amount_minor,
                error = ?err,
                "refunds: automatic refund failed, manual reconciliation needed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crates::domain::{
        repositories::{
            booking_events::MockBookingEventRepository, booking_notifier::MockBookingNotifier,
            bookings::MockBookingRepository, payment_gateways::MockPaymentGatewayClient,
            payments::MockPaymentRepository,
        },
        value_objects::{
            cancellation::cancellation_deadline,
            enums::{
                booking_statuses::BookingStatus, cancellation_policies::CancellationPolicy,
            },
            payments::{GatewayOrder, GatewayPaymentState, GatewayRefund},
            pricing::price_stay,
            stay_ranges::StayRange,
        },
    };
    use mockall::predicate::{always, eq};

    type TestUseCase = PaymentUseCase<
        MockBookingRepository,
        MockPaymentRepository,
        MockBookingEventRepository,
        MockBookingNotifier,
    >;

    fn booking(status: BookingStatus) -> BookingEntity {
        let now = Utc::now();
        let check_in = now.date_naive() + Duration::days(14);
        let stay = StayRange::new(check_in, check_in + Duration::days(2)).unwrap();
        let price = price_stay(&stay, 150_00, 30_00).unwrap();
        BookingEntity {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            guest_id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            check_in: stay.check_in,
            check_out: stay.check_out,
            number_of_nights: 2,
            number_of_guests: 2,
            adults: 2,
            children: 0,
            infants: 0,
            currency: "USD".to_string(),
            price,
            status,
            payment_status: PaymentStatus::Pending,
            hold_expires_at: Some(now + Duration::minutes(10)),
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            cancellation_policy: CancellationPolicy::Flexible,
            cancellation_deadline: cancellation_deadline(CancellationPolicy::Flexible, check_in),
            created_at: now,
            updated_at: now,
        }
    }

    fn attempt(booking: &BookingEntity, gateway: PaymentGateway, gateway_ref: &str) -> PaymentEntity {
        let now = Utc::now();
        PaymentEntity {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            payer_id: booking.guest_id,
            amount_minor: booking.price.total_price_minor,
            currency: booking.currency.clone(),
            status: PaymentStatus::Pending,
            method: gateway,
            gateway_ref: Some(gateway_ref.to_string()),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn guest_of(booking: &BookingEntity) -> Actor {
        Actor {
            user_id: booking.guest_id,
            is_host: false,
            is_admin: false,
        }
    }

    fn gateway_state(status: GatewayPaymentStatus, amount_minor: i64) -> GatewayPaymentState {
        GatewayPaymentState {
            status,
            amount_minor: Some(amount_minor),
            currency: Some("USD".to_string()),
            gateway_transaction_id: Some("ch_1".to_string()),
            failure_reason: match status {
                GatewayPaymentStatus::Failed => Some("Your card was declined.".to_string()),
                _ => None,
            },
        }
    }

    fn gateway_client(gateway: PaymentGateway) -> MockPaymentGatewayClient {
        let mut client = MockPaymentGatewayClient::new();
        client.expect_gateway().return_const(gateway);
        client
    }

    fn usecase(
        bookings: MockBookingRepository,
        payments: MockPaymentRepository,
        clients: Vec<MockPaymentGatewayClient>,
    ) -> TestUseCase {
        let mut events = MockBookingEventRepository::new();
        events.expect_record_event().returning(|_| Ok(()));
        let mut notifier = MockBookingNotifier::new();
        notifier.expect_notify().returning(|_| Ok(()));

        let gateways = clients
            .into_iter()
            .fold(PaymentGateways::new(), |gateways, client| {
                gateways.with(Arc::new(client))
            });

        PaymentUseCase::new(
            Arc::new(bookings),
            Arc::new(payments),
            Arc::new(events),
            Arc::new(notifier),
            gateways,
        )
    }

    fn bookings_returning(booking: &BookingEntity) -> MockBookingRepository {
        let mut bookings = MockBookingRepository::new();
        let loaded = booking.clone();
        bookings
            .expect_find_by_id()
            .with(eq(booking.id))
            .returning(move |_| Ok(Some(loaded.clone())));
        bookings
    }

    #[tokio::test]
    async fn initiate_records_a_pending_attempt_with_the_gateway_reference() {
        let booking = booking(BookingStatus::AwaitingPayment);
        let total = booking.price.total_price_minor;

        let mut stripe = gateway_client(PaymentGateway::Stripe);
        stripe
            .expect_create_order()
            .withf(move |request| request.amount_minor == total && request.currency == "USD")
            .times(1)
            .returning(|_| {
                Ok(GatewayOrder {
                    gateway_ref: "pi_1".to_string(),
                    client_secret: Some("pi_1_secret".to_string()),
                    redirect_url: None,
                })
            });

        let mut payments = MockPaymentRepository::new();
        payments
            .expect_record_payment()
            .withf(|attempt| {
                attempt.status == PaymentStatus::Pending
                    && attempt.gateway_ref.as_deref() == Some("pi_1")
                    && attempt.method == PaymentGateway::Stripe
            })
            .times(1)
            .returning(|attempt| Ok(attempt.id));

        let order = usecase(bookings_returning(&booking), payments, vec![stripe])
            .initiate_payment(
                guest_of(&booking),
                InitiatePaymentRequest {
                    booking_id: booking.id,
                    gateway: PaymentGateway::Stripe,
                },
            )
            .await
            .unwrap();

        assert_eq!(order.order_ref, "pi_1");
        assert_eq!(order.amount_minor, total);
        assert_eq!(order.client_secret.as_deref(), Some("pi_1_secret"));
    }

    #[tokio::test]
    async fn initiate_refuses_paid_or_closed_bookings() {
        let mut paid = booking(BookingStatus::Confirmed);
        paid.payment_status = PaymentStatus::Paid;

        let result = usecase(bookings_returning(&paid), MockPaymentRepository::new(), vec![])
            .initiate_payment(
                guest_of(&paid),
                InitiatePaymentRequest {
                    booking_id: paid.id,
                    gateway: PaymentGateway::Paypal,
                },
            )
            .await;

        match result {
            Err(BookingError::StatusConflict {
                current_status,
                payment_status,
            }) => {
                assert_eq!(current_status, BookingStatus::Confirmed);
                assert_eq!(payment_status, PaymentStatus::Paid);
            }
            other => panic!("expected status conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn initiate_is_limited_to_the_booking_guest() {
        let booking = booking(BookingStatus::AwaitingPayment);
        let stranger = Actor {
            user_id: Uuid::new_v4(),
            is_host: true,
            is_admin: false,
        };

        let result = usecase(bookings_returning(&booking), MockPaymentRepository::new(), vec![])
            .initiate_payment(
                stranger,
                InitiatePaymentRequest {
                    booking_id: booking.id,
                    gateway: PaymentGateway::Stripe,
                },
            )
            .await;

        assert!(matches!(result, Err(BookingError::NotAccessible)));
    }

    #[tokio::test]
    async fn initiate_rejects_a_lapsed_hold_and_unconfigured_gateways() {
        let mut lapsed = booking(BookingStatus::AwaitingPayment);
        lapsed.hold_expires_at = Some(Utc::now() - Duration::minutes(1));
        let result = usecase(bookings_returning(&lapsed), MockPaymentRepository::new(), vec![])
            .initiate_payment(
                guest_of(&lapsed),
                InitiatePaymentRequest {
                    booking_id: lapsed.id,
                    gateway: PaymentGateway::Stripe,
                },
            )
            .await;
        assert!(matches!(result, Err(BookingError::HoldExpired { .. })));

        let open = booking(BookingStatus::AwaitingPayment);
        let result = usecase(bookings_returning(&open), MockPaymentRepository::new(), vec![])
            .initiate_payment(
                guest_of(&open),
                InitiatePaymentRequest {
                    booking_id: open.id,
                    gateway: PaymentGateway::Sadad,
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(BookingError::GatewayNotConfigured(PaymentGateway::Sadad))
        ));
    }

    #[tokio::test]
    async fn gateway_error_on_create_records_a_failed_attempt() {
        let booking = booking(BookingStatus::AwaitingPayment);

        let mut paypal = gateway_client(PaymentGateway::Paypal);
        paypal
            .expect_create_order()
            .returning(|_| Err(anyhow::anyhow!("paypal create order failed with 503")));
        let mut payments = MockPaymentRepository::new();
        payments
            .expect_record_payment()
            .withf(|attempt| attempt.status == PaymentStatus::Failed && attempt.error.is_some())
            .times(1)
            .returning(|attempt| Ok(attempt.id));

        let result = usecase(bookings_returning(&booking), payments, vec![paypal])
            .initiate_payment(
                guest_of(&booking),
                InitiatePaymentRequest {
                    booking_id: booking.id,
                    gateway: PaymentGateway::Paypal,
                },
            )
            .await;

        assert!(matches!(result, Err(BookingError::Gateway(_))));
    }

    fn payments_finding(payment: &PaymentEntity) -> MockPaymentRepository {
        let mut payments = MockPaymentRepository::new();
        let found = payment.clone();
        payments
            .expect_find_by_gateway_ref()
            .with(eq(payment.method), eq(payment.gateway_ref.clone().unwrap()))
            .returning(move |_, _| Ok(Some(found.clone())));
        payments
    }

    #[tokio::test]
    async fn verified_success_confirms_the_booking() {
        let booking = booking(BookingStatus::AwaitingPayment);
        let payment = attempt(&booking, PaymentGateway::Stripe, "pi_ok");
        let total = booking.price.total_price_minor;

        let mut stripe = gateway_client(PaymentGateway::Stripe);
        stripe
            .expect_capture_or_sync()
            .with(eq("pi_ok".to_string()))
            .returning(move |_| Ok(gateway_state(GatewayPaymentStatus::Succeeded, total)));

        let mut payments = payments_finding(&payment);
        let mut confirmed = booking.clone();
        confirmed.status = BookingStatus::Confirmed;
        confirmed.payment_status = PaymentStatus::Paid;
        confirmed.hold_expires_at = None;
        payments
            .expect_confirm_payment()
            .with(eq(payment.id), eq("ch_1".to_string()), eq(total))
            .times(1)
            .returning(move |_, _, _| Ok(PaymentConfirmation::Confirmed(confirmed.clone())));

        let dto = usecase(bookings_returning(&booking), payments, vec![stripe])
            .confirm_payment(
                guest_of(&booking),
                ConfirmPaymentRequest {
                    gateway: PaymentGateway::Stripe,
                    order_ref: "pi_ok".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(dto.status, BookingStatus::Confirmed);
        assert_eq!(dto.payment_status, PaymentStatus::Paid);
        assert!(dto.hold_expires_at.is_none());
    }

    #[tokio::test]
    async fn declined_payment_leaves_the_booking_payable() {
        let booking = booking(BookingStatus::AwaitingPayment);
        let payment = attempt(&booking, PaymentGateway::Stripe, "pi_declined");
        let total = booking.price.total_price_minor;

        let mut stripe = gateway_client(PaymentGateway::Stripe);
        stripe
            .expect_capture_or_sync()
            .returning(move |_| Ok(gateway_state(GatewayPaymentStatus::Failed, total)));

        let mut payments = payments_finding(&payment);
        payments
            .expect_mark_failed()
            .with(eq(payment.id), eq("Your card was declined.".to_string()))
            .times(1)
            .returning(|_, _| Ok(()));
        payments.expect_confirm_payment().never();

        let mut bookings = bookings_returning(&booking);
        bookings.expect_apply_status_change().never();

        let result = usecase(bookings, payments, vec![stripe])
            .confirm_payment(
                guest_of(&booking),
                ConfirmPaymentRequest {
                    gateway: PaymentGateway::Stripe,
                    order_ref: "pi_declined".to_string(),
                },
            )
            .await;

        match result {
            Err(BookingError::PaymentDeclined { reason }) => {
                assert_eq!(reason, "Your card was declined.")
            }
            other => panic!("expected declined payment, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn late_confirmation_is_refunded_and_reported_expired() {
        let mut expired = booking(BookingStatus::Expired);
        expired.hold_expires_at = Some(Utc::now() - Duration::minutes(5));
        let payment = attempt(&expired, PaymentGateway::Paypal, "PP-ORDER-1");
        let total = expired.price.total_price_minor;

        let mut paypal = gateway_client(PaymentGateway::Paypal);
        paypal
            .expect_capture_or_sync()
            .returning(move |_| Ok(gateway_state(GatewayPaymentStatus::Succeeded, total)));
        paypal
            .expect_refund()
            .with(
                eq("PP-ORDER-1".to_string()),
                eq(total),
                eq("USD".to_string()),
                eq(format!("refund-{}", payment.id)),
            )
            .times(1)
            .returning(|_, _, _, _| {
                Ok(GatewayRefund {
                    refund_id: "PP-REFUND-1".to_string(),
                })
            });

        let mut payments = payments_finding(&payment);
        let unavailable = expired.clone();
        payments
            .expect_confirm_payment()
            .returning(move |_, _, _| Ok(PaymentConfirmation::BookingUnavailable(unavailable.clone())));
        payments
            .expect_record_refund()
            .with(
                eq(payment.id),
                eq("PP-REFUND-1".to_string()),
                eq(total),
                eq(PaymentStatus::Refunded),
            )
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let result = usecase(bookings_returning(&expired), payments, vec![paypal])
            .confirm_payment(
                guest_of(&expired),
                ConfirmPaymentRequest {
                    gateway: PaymentGateway::Paypal,
                    order_ref: "PP-ORDER-1".to_string(),
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(BookingError::AlreadyExpired {
                current_status: BookingStatus::Expired
            })
        ));
    }

    #[tokio::test]
    async fn amount_mismatch_is_never_applied() {
        let booking = booking(BookingStatus::AwaitingPayment);
        let payment = attempt(&booking, PaymentGateway::Sadad, "SD-1");

        let mut sadad = gateway_client(PaymentGateway::Sadad);
        sadad
            .expect_capture_or_sync()
            .returning(|_| Ok(gateway_state(GatewayPaymentStatus::Succeeded, 1_00)));
        let mut payments = payments_finding(&payment);
        payments.expect_confirm_payment().never();

        let result = usecase(bookings_returning(&booking), payments, vec![sadad])
            .confirm_payment(
                guest_of(&booking),
                ConfirmPaymentRequest {
                    gateway: PaymentGateway::Sadad,
                    order_ref: "SD-1".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(BookingError::Internal(_))));
    }

    #[tokio::test]
    async fn unreadable_captured_amount_is_never_applied() {
        let booking = booking(BookingStatus::AwaitingPayment);
        let payment = attempt(&booking, PaymentGateway::Sadad, "SD-2");

        let mut sadad = gateway_client(PaymentGateway::Sadad);
        sadad.expect_capture_or_sync().returning(|_| {
            Ok(GatewayPaymentState {
                amount_minor: None,
                ..gateway_state(GatewayPaymentStatus::Succeeded, 0)
            })
        });
        let mut payments = payments_finding(&payment);
        payments.expect_confirm_payment().never();

        let result = usecase(bookings_returning(&booking), payments, vec![sadad])
            .confirm_payment(
                guest_of(&booking),
                ConfirmPaymentRequest {
                    gateway: PaymentGateway::Sadad,
                    order_ref: "SD-2".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(BookingError::Internal(_))));
    }

    #[tokio::test]
    async fn missing_currency_is_never_applied() {
        let booking = booking(BookingStatus::AwaitingPayment);
        let payment = attempt(&booking, PaymentGateway::Sadad, "SD-3");
        let total = booking.price.total_price_minor;

        let mut sadad = gateway_client(PaymentGateway::Sadad);
        sadad.expect_capture_or_sync().returning(move |_| {
            Ok(GatewayPaymentState {
                currency: None,
                ..gateway_state(GatewayPaymentStatus::Succeeded, total)
            })
        });
        let mut payments = payments_finding(&payment);
        payments.expect_confirm_payment().never();

        let result = usecase(bookings_returning(&booking), payments, vec![sadad])
            .confirm_payment(
                guest_of(&booking),
                ConfirmPaymentRequest {
                    gateway: PaymentGateway::Sadad,
                    order_ref: "SD-3".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(BookingError::Internal(_))));
    }

    #[tokio::test]
    async fn unknown_order_looks_like_a_foreign_one() {
        let mut payments = MockPaymentRepository::new();
        payments
            .expect_find_by_gateway_ref()
            .returning(|_, _| Ok(None));

        let result = usecase(
            MockBookingRepository::new(),
            payments,
            vec![gateway_client(PaymentGateway::Stripe)],
        )
        .confirm_payment(
            Actor {
                user_id: Uuid::new_v4(),
                is_host: false,
                is_admin: false,
            },
            ConfirmPaymentRequest {
                gateway: PaymentGateway::Stripe,
                order_ref: "pi_unknown".to_string(),
            },
        )
        .await;

        assert!(matches!(result, Err(BookingError::NotAccessible)));
    }

    #[tokio::test]
    async fn duplicate_charge_is_refunded_and_the_booking_stays_confirmed() {
        let mut confirmed = booking(BookingStatus::Confirmed);
        confirmed.payment_status = PaymentStatus::Paid;
        let payment = attempt(&confirmed, PaymentGateway::Stripe, "pi_second");
        let total = confirmed.price.total_price_minor;

        let mut stripe = gateway_client(PaymentGateway::Stripe);
        stripe
            .expect_capture_or_sync()
            .returning(move |_| Ok(gateway_state(GatewayPaymentStatus::Succeeded, total)));
        stripe
            .expect_refund()
            .times(1)
            .returning(|_, _, _, _| {
                Ok(GatewayRefund {
                    refund_id: "re_dup".to_string(),
                })
            });

        let mut payments = payments_finding(&payment);
        let current = confirmed.clone();
        payments
            .expect_confirm_payment()
            .returning(move |_, _, _| Ok(PaymentConfirmation::DuplicateCharge(current.clone())));
        payments
            .expect_record_refund()
            .with(eq(payment.id), always(), eq(total), eq(PaymentStatus::Refunded))
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let dto = usecase(bookings_returning(&confirmed), payments, vec![stripe])
            .confirm_payment(
                guest_of(&confirmed),
                ConfirmPaymentRequest {
                    gateway: PaymentGateway::Stripe,
                    order_ref: "pi_second".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(dto.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_is_rejected() {
        let mut sadad = gateway_client(PaymentGateway::Sadad);
        sadad
            .expect_verify_webhook()
            .returning(|_, _| Err(anyhow::anyhow!("invalid sadad signature")));

        let result = usecase(MockBookingRepository::new(), MockPaymentRepository::new(), vec![sadad])
            .handle_webhook(PaymentGateway::Sadad, WebhookHeaders::new(), b"{}".to_vec())
            .await;

        assert!(matches!(result, Err(BookingError::InvalidWebhook(_))));
    }

    #[tokio::test]
    async fn authenticated_webhook_acknowledges_even_when_processing_fails() {
        let booking = booking(BookingStatus::AwaitingPayment);
        let payment = attempt(&booking, PaymentGateway::Stripe, "pi_hook");

        let mut stripe = gateway_client(PaymentGateway::Stripe);
        stripe
            .expect_verify_webhook()
            .returning(|_, _| Ok(Some("pi_hook".to_string())));
        stripe
            .expect_capture_or_sync()
            .returning(|_| Err(anyhow::anyhow!("stripe timed out")));

        let result = usecase(bookings_returning(&booking), payments_finding(&payment), vec![stripe])
            .handle_webhook(PaymentGateway::Stripe, WebhookHeaders::new(), b"{}".to_vec())
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn webhook_without_an_order_is_ignored() {
        let mut stripe = gateway_client(PaymentGateway::Stripe);
        stripe.expect_verify_webhook().returning(|_, _| Ok(None));
        let mut payments = MockPaymentRepository::new();
        payments.expect_find_by_gateway_ref().never();

        let result = usecase(MockBookingRepository::new(), payments, vec![stripe])
            .handle_webhook(PaymentGateway::Stripe, WebhookHeaders::new(), Vec::new())
            .await;

        assert!(result.is_ok());
    }
}
