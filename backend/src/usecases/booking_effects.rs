use anyhow::{Result, anyhow};
use crates::{
    domain::{
        entities::{
            booking_events::InsertBookingEventEntity, bookings::BookingEntity,
            payments::PaymentEntity,
        },
        repositories::{
            booking_events::BookingEventRepository,
            booking_notifier::{BookingNotification, BookingNotifier},
            payments::PaymentRepository,
        },
        value_objects::enums::{
            booking_statuses::BookingStatus, cancelled_by::CancelledBy,
            payment_statuses::PaymentStatus,
        },
    },
    payments::gateways::PaymentGateways,
};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Who moved a booking, as written to the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionActor {
    pub user_id: Option<Uuid>,
    pub role: CancelledBy,
}

impl TransitionActor {
    pub fn system() -> Self {
        Self {
            user_id: None,
            role: CancelledBy::System,
        }
    }
}

/// Audit trail entries are best effort; a failed insert is logged and dropped.
pub async fn record_transition<E>(
    event_repo: &E,
    booking_id: Uuid,
    from_status: Option<BookingStatus>,
    to_status: BookingStatus,
    actor: TransitionActor,
    note: Option<String>,
) where
    E: BookingEventRepository + Send + Sync + ?Sized,
{
    let event = InsertBookingEventEntity {
        booking_id,
        from_status: from_status.map(|s| s.to_string()),
        to_status: to_status.to_string(),
        actor_id: actor.user_id,
        actor_role: actor.role.to_string(),
        note,
    };

    if let Err(err) = event_repo.record_event(event).await {
        warn!(
            %booking_id,
            %to_status,
            error = ?err,
            "booking_events: failed to append audit entry"
        );
    }
}

/// Status changes the guest and host hear about.
pub fn notification_message(status: BookingStatus) -> Option<&'static str> {
    match status {
        BookingStatus::Confirmed => Some("Booking confirmed"),
        BookingStatus::Expired => Some("Booking expired because the payment hold lapsed"),
        BookingStatus::Cancelled => Some("Booking cancelled"),
        BookingStatus::Rejected => Some("Booking request declined by the host"),
        _ => None,
    }
}

pub async fn notify_booking<N>(notifier: &N, booking: &BookingEntity, message: &str)
where
    N: BookingNotifier + Send + Sync + ?Sized,
{
    let notification = BookingNotification {
        booking_id: booking.id,
        guest_id: booking.guest_id,
        host_id: booking.host_id,
        status: booking.status,
        message: message.to_string(),
    };

    if let Err(err) = notifier.notify(notification).await {
        warn!(
            booking_id = %booking.id,
            status = %booking.status,
            error = ?err,
            "notifications: booking notification failed"
        );
    }
}

pub async fn notify_status_change<N>(notifier: &N, booking: &BookingEntity)
where
    N: BookingNotifier + Send + Sync + ?Sized,
{
    if let Some(message) = notification_message(booking.status) {
        notify_booking(notifier, booking, message).await;
    }
}

/// Sends money back through the gateway that captured `payment` and records the refund. The
/// idempotency key is derived from the payment so a retried refund is not paid out twice.
pub async fn refund_payment<Pay>(
    gateways: &PaymentGateways,
    payment_repo: &Pay,
    payment: &PaymentEntity,
    amount_minor: i64,
    resulting_status: PaymentStatus,
) -> Result<()>
where
    Pay: PaymentRepository + Send + Sync + ?Sized,
{
    let client = gateways
        .get(payment.method)
        .ok_or_else(|| anyhow!("gateway {} is not configured", payment.method))?;
    let gateway_ref = payment
        .gateway_ref
        .clone()
        .ok_or_else(|| anyhow!("payment {} has no gateway reference", payment.id))?;

    let refund = client
        .refund(
            gateway_ref,
            amount_minor,
            payment.currency.clone(),
            format!("refund-{}", payment.id),
        )
        .await?;

    payment_repo
        .record_refund(
            payment.id,
            refund.refund_id.clone(),
            amount_minor,
            resulting_status,
        )
        .await?;

    info!(
        payment_id = %payment.id,
        booking_id = %payment.booking_id,
        refund_id = %refund.refund_id,
        amount_minor,
        %resulting_status,
        "refunds: refund issued"
    );
    Ok(())
}

/// Refunds the paid attempt of a booking. Failures are logged for manual reconciliation and
/// reported as `false`; they never undo the transition that triggered the refund.
pub async fn refund_booking<Pay>(
    gateways: &PaymentGateways,
    payment_repo: &Pay,
    booking: &BookingEntity,
    amount_minor: i64,
    resulting_status: PaymentStatus,
) -> bool
where
    Pay: PaymentRepository + Send + Sync + ?Sized,
{
    let payment = match payment_repo.find_paid_for_booking(booking.id).await {
        Ok(Some(payment)) => payment,
        Ok(None) => {
            error!(
                booking_id = %booking.id,
                amount_minor,
                "refunds: booking is marked paid but has no paid attempt, manual reconciliation needed"
            );
            return false;
        }
        Err(err) => {
            error!(
                booking_id = %booking.id,
                db_error = ?err,
                "refunds: failed to load paid attempt, manual reconciliation needed"
            );
            return false;
        }
    };

    match refund_payment(gateways, payment_repo, &payment, amount_minor, resulting_status).await {
        Ok(()) => true,
        Err(err) => {
            error!(
                booking_id = %booking.id,
                payment_id = %payment.id,
                amount_minor,
                error = ?err,
                "refunds: refund failed, manual reconciliation needed"
            );
            false
        }
    }
}
