use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{PgConnection, insert_into, prelude::*};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    domain,
    infra::db::{
        postgres::{
            postgres_connection::PgPoolSquad,
            schema::{bookings, payments, transactions},
        },
        repositories::bookings::write_status_change,
    },
};
use domain::{
    entities::{
        bookings::{BookingEntity, BookingRow, BookingStatusChange},
        payments::{
            InsertPaymentEntity, NewPaymentEntity, PaymentConfirmation, PaymentEntity, PaymentRow,
        },
        transactions::{InsertTransactionEntity, TRANSACTION_KIND_CHARGE, TRANSACTION_KIND_REFUND},
    },
    repositories::payments::PaymentRepository,
    value_objects::{
        booking_lifecycle::{ConfirmationTarget, confirmation_target},
        enums::{
            booking_statuses::BookingStatus, payment_gateways::PaymentGateway,
            payment_statuses::PaymentStatus,
        },
    },
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn lock_payment(conn: &mut PgConnection, payment_id: Uuid) -> Result<Option<PaymentEntity>> {
    let row = payments::table
        .find(payment_id)
        .select(PaymentRow::as_select())
        .for_update()
        .first::<PaymentRow>(conn)
        .optional()?;

    row.map(PaymentEntity::try_from).transpose()
}

fn lock_booking_of(conn: &mut PgConnection, payment: &PaymentEntity) -> Result<BookingEntity> {
    let row = bookings::table
        .find(payment.booking_id)
        .select(BookingRow::as_select())
        .for_update()
        .first::<BookingRow>(conn)?;

    BookingEntity::try_from(row)
}

fn set_payment_status(
    conn: &mut PgConnection,
    payment_id: Uuid,
    status: PaymentStatus,
) -> Result<()> {
    diesel::update(payments::table.find(payment_id))
        .set((
            payments::status.eq(status.as_str()),
            payments::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    Ok(())
}

fn set_booking_payment_status(
    conn: &mut PgConnection,
    booking_id: Uuid,
    status: PaymentStatus,
) -> Result<BookingEntity> {
    let row = diesel::update(bookings::table.find(booking_id))
        .set((
            bookings::payment_status.eq(status.as_str()),
            bookings::updated_at.eq(Utc::now()),
        ))
        .returning(BookingRow::as_returning())
        .get_result::<BookingRow>(conn)?;

    BookingEntity::try_from(row)
}

fn append_ledger(
    conn: &mut PgConnection,
    payment: &PaymentEntity,
    kind: &str,
    gateway_transaction_id: String,
    amount_minor: i64,
) -> Result<()> {
    // Redelivered notifications carry the same gateway id and are dropped here.
    insert_into(transactions::table)
        .values(&InsertTransactionEntity {
            booking_id: payment.booking_id,
            payment_id: payment.id,
            kind: kind.to_string(),
            gateway: payment.method.to_string(),
            gateway_transaction_id,
            amount_minor,
            currency: payment.currency.clone(),
        })
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(())
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn record_payment(&self, payment: NewPaymentEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment_id = insert_into(payments::table)
            .values(&InsertPaymentEntity::from(&payment))
            .returning(payments::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(payment_id)
    }

    async fn find_by_gateway_ref(
        &self,
        gateway: PaymentGateway,
        gateway_ref: String,
    ) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = payments::table
            .filter(payments::method.eq(gateway.as_str()))
            .filter(payments::gateway_ref.eq(gateway_ref))
            .select(PaymentRow::as_select())
            .first::<PaymentRow>(&mut conn)
            .optional()?;

        row.map(PaymentEntity::try_from).transpose()
    }

    async fn find_paid_for_booking(&self, booking_id: Uuid) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = payments::table
            .filter(payments::booking_id.eq(booking_id))
            .filter(payments::status.eq(PaymentStatus::Paid.as_str()))
            .order(payments::updated_at.desc())
            .select(PaymentRow::as_select())
            .first::<PaymentRow>(&mut conn)
            .optional()?;

        row.map(PaymentEntity::try_from).transpose()
    }

    async fn mark_failed(&self, payment_id: Uuid, reason: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<(), anyhow::Error, _>(|conn| {
            let Some(payment) = lock_payment(conn, payment_id)? else {
                return Err(anyhow!("payment {payment_id} not found"));
            };
            if payment.status != PaymentStatus::Pending {
                warn!(
                    %payment_id,
                    status = %payment.status,
                    "payments: ignoring failure for a settled attempt"
                );
                return Ok(());
            }

            diesel::update(payments::table.find(payment_id))
                .set((
                    payments::status.eq(PaymentStatus::Failed.as_str()),
                    payments::error.eq(Some(reason.as_str())),
                    payments::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            // A booking that is already paid through another attempt keeps its PAID status.
            let booking = lock_booking_of(conn, &payment)?;
            if booking.payment_status == PaymentStatus::Pending
                || booking.payment_status == PaymentStatus::Failed
            {
                set_booking_payment_status(conn, booking.id, PaymentStatus::Failed)?;
            }

            Ok(())
        })
    }

    async fn confirm_payment(
        &self,
        payment_id: Uuid,
        gateway_transaction_id: String,
        amount_minor: i64,
    ) -> Result<PaymentConfirmation> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<PaymentConfirmation, anyhow::Error, _>(|conn| {
            let Some(payment) = lock_payment(conn, payment_id)? else {
                return Ok(PaymentConfirmation::PaymentNotFound);
            };
            let booking = lock_booking_of(conn, &payment)?;

            if payment.status != PaymentStatus::Pending && payment.status != PaymentStatus::Failed {
                return Ok(PaymentConfirmation::AlreadyApplied(booking));
            }

            set_payment_status(conn, payment.id, PaymentStatus::Paid)?;
            append_ledger(
                conn,
                &payment,
                TRANSACTION_KIND_CHARGE,
                gateway_transaction_id,
                amount_minor,
            )?;

            let outcome = match confirmation_target(booking.status, booking.payment_status) {
                ConfirmationTarget::Confirm(expected_status) => {
                    let change = BookingStatusChange {
                        booking_id: booking.id,
                        expected_status,
                        new_status: BookingStatus::Confirmed,
                        new_payment_status: Some(PaymentStatus::Paid),
                        hold_expires_at: Some(None),
                        cancellation: None,
                    };
                    let updated = write_status_change(conn, &booking, &change, Utc::now())?;
                    PaymentConfirmation::Confirmed(updated)
                }
                ConfirmationTarget::PaidAwaitingApproval => {
                    let updated = set_booking_payment_status(conn, booking.id, PaymentStatus::Paid)?;
                    PaymentConfirmation::Confirmed(updated)
                }
                ConfirmationTarget::AlreadyConfirmed => PaymentConfirmation::DuplicateCharge(booking),
                ConfirmationTarget::Unavailable(_) => PaymentConfirmation::BookingUnavailable(booking),
            };

            info!(
                %payment_id,
                booking_id = %payment.booking_id,
                amount_minor,
                "payments: charge recorded"
            );

            Ok(outcome)
        })
    }

    async fn record_refund(
        &self,
        payment_id: Uuid,
        refund_id: String,
        amount_minor: i64,
        resulting_status: PaymentStatus,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<(), anyhow::Error, _>(|conn| {
            let Some(payment) = lock_payment(conn, payment_id)? else {
                return Err(anyhow!("payment {payment_id} not found"));
            };

            append_ledger(conn, &payment, TRANSACTION_KIND_REFUND, refund_id, amount_minor)?;
            if resulting_status == PaymentStatus::Refunded {
                set_payment_status(conn, payment.id, PaymentStatus::Refunded)?;
            }

            // A duplicate charge refunded on a booking that stays paid leaves the booking alone.
            let booking = lock_booking_of(conn, &payment)?;
            let other_paid = payments::table
                .filter(payments::booking_id.eq(booking.id))
                .filter(payments::id.ne(payment.id))
                .filter(payments::status.eq(PaymentStatus::Paid.as_str()))
                .count()
                .get_result::<i64>(conn)?;
            if other_paid == 0 {
                set_booking_payment_status(conn, booking.id, resulting_status)?;
            }

            Ok(())
        })
    }
}
