use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::{
            booking_statuses::BookingStatus, cancellation_policies::CancellationPolicy,
            cancelled_by::CancelledBy, payment_statuses::PaymentStatus,
        },
        pricing::PriceBreakdown,
        stay_ranges::StayRange,
    },
    infra::db::postgres::schema::bookings,
};

/// Booking with typed statuses. The price snapshot is written once at creation and never
/// recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingEntity {
    pub id: Uuid,
    pub property_id: Uuid,
    pub guest_id: Uuid,
    pub host_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub number_of_nights: i32,
    pub number_of_guests: i32,
    pub adults: i32,
    pub children: i32,
    pub infants: i32,
    pub currency: String,
    pub price: PriceBreakdown,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
    pub cancellation_policy: CancellationPolicy,
    pub cancellation_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingEntity {
    pub fn stay(&self) -> StayRange {
        StayRange {
            check_in: self.check_in,
            check_out: self.check_out,
        }
    }
}

/// Raw row used for Diesel queries. Status columns stay as text and are parsed into enums.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = bookings)]
pub struct BookingRow {
    pub id: Uuid,
    pub property_id: Uuid,
    pub guest_id: Uuid,
    pub host_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub number_of_nights: i32,
    pub number_of_guests: i32,
    pub adults: i32,
    pub children: i32,
    pub infants: i32,
    pub currency: String,
    pub nightly_rate_minor: i64,
    pub subtotal_minor: i64,
    pub cleaning_fee_minor: i64,
    pub service_fee_minor: i64,
    pub tax_minor: i64,
    pub total_price_minor: i64,
    pub platform_commission_minor: i64,
    pub host_earnings_minor: i64,
    pub status: String,
    pub payment_status: String,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancellation_policy_type: String,
    pub cancellation_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for BookingEntity {
    type Error = anyhow::Error;

    fn try_from(row: BookingRow) -> Result<Self> {
        let status = BookingStatus::from_str(&row.status)
            .ok_or_else(|| anyhow!("booking {} has unknown status {}", row.id, row.status))?;
        let payment_status = PaymentStatus::from_str(&row.payment_status).ok_or_else(|| {
            anyhow!(
                "booking {} has unknown payment status {}",
                row.id,
                row.payment_status
            )
        })?;
        let cancelled_by = match row.cancelled_by.as_deref() {
            Some(raw) => Some(
                CancelledBy::from_str(raw)
                    .ok_or_else(|| anyhow!("booking {} has unknown cancelled_by {}", row.id, raw))?,
            ),
            None => None,
        };

        Ok(Self {
            id: row.id,
            property_id: row.property_id,
            guest_id: row.guest_id,
            host_id: row.host_id,
            check_in: row.check_in,
            check_out: row.check_out,
            number_of_nights: row.number_of_nights,
            number_of_guests: row.number_of_guests,
            adults: row.adults,
            children: row.children,
            infants: row.infants,
            currency: row.currency,
            price: PriceBreakdown {
                nights: i64::from(row.number_of_nights),
                nightly_rate_minor: row.nightly_rate_minor,
                subtotal_minor: row.subtotal_minor,
                cleaning_fee_minor: row.cleaning_fee_minor,
                service_fee_minor: row.service_fee_minor,
                tax_minor: row.tax_minor,
                total_price_minor: row.total_price_minor,
                platform_commission_minor: row.platform_commission_minor,
                host_earnings_minor: row.host_earnings_minor,
            },
            status,
            payment_status,
            hold_expires_at: row.hold_expires_at,
            cancelled_at: row.cancelled_at,
            cancelled_by,
            cancellation_reason: row.cancellation_reason,
            cancellation_policy: CancellationPolicy::from_str(&row.cancellation_policy_type),
            cancellation_deadline: row.cancellation_deadline,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Everything needed to insert a new held booking.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBookingEntity {
    pub property_id: Uuid,
    pub guest_id: Uuid,
    pub host_id: Uuid,
    pub stay: StayRange,
    pub adults: i32,
    pub children: i32,
    pub infants: i32,
    pub currency: String,
    pub price: PriceBreakdown,
    pub status: BookingStatus,
    pub hold_expires_at: DateTime<Utc>,
    pub cancellation_policy: CancellationPolicy,
    pub cancellation_deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bookings)]
pub struct InsertBookingEntity {
    pub property_id: Uuid,
    pub guest_id: Uuid,
    pub host_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub number_of_nights: i32,
    pub number_of_guests: i32,
    pub adults: i32,
    pub children: i32,
    pub infants: i32,
    pub currency: String,
    pub nightly_rate_minor: i64,
    pub subtotal_minor: i64,
    pub cleaning_fee_minor: i64,
    pub service_fee_minor: i64,
    pub tax_minor: i64,
    pub total_price_minor: i64,
    pub platform_commission_minor: i64,
    pub host_earnings_minor: i64,
    pub status: String,
    pub payment_status: String,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub cancellation_policy_type: String,
    pub cancellation_deadline: DateTime<Utc>,
}

impl TryFrom<&NewBookingEntity> for InsertBookingEntity {
    type Error = anyhow::Error;

    fn try_from(value: &NewBookingEntity) -> Result<Self> {
        let number_of_nights = i32::try_from(value.price.nights)
            .map_err(|_| anyhow!("stay of {} nights is too long", value.price.nights))?;
        let number_of_guests = value
            .adults
            .checked_add(value.children)
            .ok_or_else(|| anyhow!("guest count overflows"))?;

        Ok(Self {
            property_id: value.property_id,
            guest_id: value.guest_id,
            host_id: value.host_id,
            check_in: value.stay.check_in,
            check_out: value.stay.check_out,
            number_of_nights,
            number_of_guests,
            adults: value.adults,
            children: value.children,
            infants: value.infants,
            currency: value.currency.clone(),
            nightly_rate_minor: value.price.nightly_rate_minor,
            subtotal_minor: value.price.subtotal_minor,
            cleaning_fee_minor: value.price.cleaning_fee_minor,
            service_fee_minor: value.price.service_fee_minor,
            tax_minor: value.price.tax_minor,
            total_price_minor: value.price.total_price_minor,
            platform_commission_minor: value.price.platform_commission_minor,
            host_earnings_minor: value.price.host_earnings_minor,
            status: value.status.to_string(),
            payment_status: PaymentStatus::Pending.to_string(),
            hold_expires_at: Some(value.hold_expires_at),
            cancellation_policy_type: value.cancellation_policy.to_string(),
            cancellation_deadline: value.cancellation_deadline,
        })
    }
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = bookings)]
pub struct UpdateBookingStatusEntity {
    pub status: String,
    pub payment_status: Option<String>,
    pub hold_expires_at: Option<Option<DateTime<Utc>>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UpdateBookingStatusEntity {
    pub fn from_change(change: &BookingStatusChange, now: DateTime<Utc>) -> Self {
        Self {
            status: change.new_status.to_string(),
            payment_status: change.new_payment_status.map(|s| s.to_string()),
            hold_expires_at: change.hold_expires_at,
            cancelled_at: change.cancellation.as_ref().map(|c| c.cancelled_at),
            cancelled_by: change.cancellation.as_ref().map(|c| c.cancelled_by.to_string()),
            cancellation_reason: change.cancellation.as_ref().and_then(|c| c.reason.clone()),
            updated_at: now,
        }
    }
}

/// Cancellation metadata written together with a move out of the live set.
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationRecord {
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: CancelledBy,
    pub reason: Option<String>,
}

/// A compare-and-set status change. The repository applies it only if the booking is still in
/// `expected_status` when its row lock is taken.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingStatusChange {
    pub booking_id: Uuid,
    pub expected_status: BookingStatus,
    pub new_status: BookingStatus,
    pub new_payment_status: Option<PaymentStatus>,
    /// `Some(None)` clears the hold, `Some(Some(t))` restarts it.
    pub hold_expires_at: Option<Option<DateTime<Utc>>>,
    pub cancellation: Option<CancellationRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusChangeOutcome {
    Applied(BookingEntity),
    /// Someone else moved the booking first; carries the current state.
    Stale(BookingEntity),
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateBookingOutcome {
    Created(BookingEntity),
    Conflict(Vec<BookingEntity>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpireHoldOutcome {
    Expired {
        booking: BookingEntity,
        released_dates: usize,
    },
    /// The guard no longer holds under lock (paid in the meantime, already expired, ...).
    Skipped(BookingStatus),
}
