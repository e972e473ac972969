use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        payment_gateways::PaymentGateway, payment_statuses::PaymentStatus,
    },
    infra::db::postgres::schema::payments,
};

/// One gateway attempt for a booking.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payer_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: PaymentGateway,
    pub gateway_ref: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
pub struct PaymentRow {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payer_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub method: String,
    pub gateway_ref: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentEntity {
    type Error = anyhow::Error;

    fn try_from(row: PaymentRow) -> Result<Self> {
        Ok(Self {
            status: PaymentStatus::from_str(&row.status)
                .ok_or_else(|| anyhow!("payment {} has unknown status {}", row.id, row.status))?,
            method: PaymentGateway::from_str(&row.method)
                .ok_or_else(|| anyhow!("payment {} has unknown method {}", row.id, row.method))?,
            id: row.id,
            booking_id: row.booking_id,
            payer_id: row.payer_id,
            amount_minor: row.amount_minor,
            currency: row.currency,
            gateway_ref: row.gateway_ref,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentEntity {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payer_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: PaymentGateway,
    pub gateway_ref: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payer_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub method: String,
    pub gateway_ref: Option<String>,
    pub error: Option<String>,
}

impl From<&NewPaymentEntity> for InsertPaymentEntity {
    fn from(value: &NewPaymentEntity) -> Self {
        Self {
            id: value.id,
            booking_id: value.booking_id,
            payer_id: value.payer_id,
            amount_minor: value.amount_minor,
            currency: value.currency.clone(),
            status: value.status.to_string(),
            method: value.method.to_string(),
            gateway_ref: value.gateway_ref.clone(),
            error: value.error.clone(),
        }
    }
}

/// Result of applying a gateway-verified success to a payment and its booking in one
/// transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentConfirmation {
    /// Booking moved to CONFIRMED (or stays REQUESTED but paid) and the ledger row was written.
    Confirmed(super::bookings::BookingEntity),
    /// Duplicate notification; payment was already applied.
    AlreadyApplied(super::bookings::BookingEntity),
    /// The hold lapsed or the booking was cancelled first. Payment is marked PAID so the refund
    /// can be tracked, the booking is untouched.
    BookingUnavailable(super::bookings::BookingEntity),
    /// The booking was already paid through another attempt; this charge has to go back.
    DuplicateCharge(super::bookings::BookingEntity),
    PaymentNotFound,
}
