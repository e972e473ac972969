use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::bookings::BookingEntity,
    value_objects::{
        enums::{
            booking_actions::BookingAction, booking_statuses::BookingStatus,
            cancellation_policies::CancellationPolicy, cancelled_by::CancelledBy,
            payment_statuses::PaymentStatus,
        },
        pricing::PriceBreakdown,
        stay_ranges::ConflictingStay,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCounts {
    pub adults: i32,
    #[serde(default)]
    pub children: i32,
    #[serde(default)]
    pub infants: i32,
}

impl GuestCounts {
    /// Infants do not count towards the property's capacity. `None` when the sum overflows.
    pub fn number_of_guests(&self) -> Option<i32> {
        self.adults.checked_add(self.children)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(flatten)]
    pub guests: GuestCounts,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(flatten)]
    pub guests: GuestCounts,
}

#[derive(Debug, Serialize)]
pub struct QuoteDto {
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub currency: String,
    pub price: PriceBreakdown,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityDto {
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub has_conflict: bool,
    pub conflicts: Vec<ConflictingStay>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionBookingRequest {
    pub action: BookingAction,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingListScope {
    #[default]
    Guest,
    Host,
}

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    #[serde(rename = "as", default)]
    pub scope: BookingListScope,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BookingDto {
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
}

impl From<BookingEntity> for BookingDto {
    fn from(value: BookingEntity) -> Self {
        Self {
            id: value.id,
            property_id: value.property_id,
            guest_id: value.guest_id,
            host_id: value.host_id,
            check_in: value.check_in,
            check_out: value.check_out,
            number_of_nights: value.number_of_nights,
            number_of_guests: value.number_of_guests,
            adults: value.adults,
            children: value.children,
            infants: value.infants,
            currency: value.currency,
            price: value.price,
            status: value.status,
            payment_status: value.payment_status,
            // Hold metadata is meaningless once the booking is paid or out of the pre-payment set.
            hold_expires_at: value
                .hold_expires_at
                .filter(|_| value.status.is_expirable() && value.payment_status != PaymentStatus::Paid),
            cancelled_at: value.cancelled_at,
            cancelled_by: value.cancelled_by,
            cancellation_reason: value.cancellation_reason,
            cancellation_policy: value.cancellation_policy,
            cancellation_deadline: value.cancellation_deadline,
            created_at: value.created_at,
        }
    }
}
