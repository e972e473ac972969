use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::payments::{NewPaymentEntity, PaymentConfirmation, PaymentEntity},
    value_objects::enums::{payment_gateways::PaymentGateway, payment_statuses::PaymentStatus},
};

#[automock]
#[async_trait]
pub trait PaymentRepository {
    async fn record_payment(&self, payment: NewPaymentEntity) -> Result<Uuid>;

    async fn find_by_gateway_ref(
        &self,
        gateway: PaymentGateway,
        gateway_ref: String,
    ) -> Result<Option<PaymentEntity>>;

    /// Most recent PAID attempt of a booking, the one a refund goes back through.
    async fn find_paid_for_booking(&self, booking_id: Uuid) -> Result<Option<PaymentEntity>>;

    /// Marks a pending attempt FAILED and the booking's payment status FAILED. The booking
    /// status itself is left alone so the guest can retry.
    async fn mark_failed(&self, payment_id: Uuid, reason: String) -> Result<()>;

    /// In one transaction: lock the booking, re-check that it can still be confirmed, mark the
    /// payment PAID, move the booking, append the charge ledger row.
    async fn confirm_payment(
        &self,
        payment_id: Uuid,
        gateway_transaction_id: String,
        amount_minor: i64,
    ) -> Result<PaymentConfirmation>;

    /// Appends the refund ledger row and moves payment and booking payment status.
    async fn record_refund(
        &self,
        payment_id: Uuid,
        refund_id: String,
        amount_minor: i64,
        resulting_status: PaymentStatus,
    ) -> Result<()>;
}
