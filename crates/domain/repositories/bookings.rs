use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::bookings::{
    BookingEntity, BookingStatusChange, CreateBookingOutcome, ExpireHoldOutcome,
    NewBookingEntity, StatusChangeOutcome,
};

#[automock]
#[async_trait]
pub trait BookingRepository {
    /// Conflict check and insert in one transaction holding the property row lock. The nights
    /// of a created booking are marked unavailable in the same transaction.
    async fn create_with_hold(&self, booking: NewBookingEntity) -> Result<CreateBookingOutcome>;

    async fn find_by_id(&self, booking_id: Uuid) -> Result<Option<BookingEntity>>;

    /// Live bookings of the property overlapping `[check_in, check_out)`.
    async fn find_live_overlapping(
        &self,
        property_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<BookingEntity>>;

    async fn list_for_guest(&self, guest_id: Uuid, limit: i64) -> Result<Vec<BookingEntity>>;

    async fn list_for_host(&self, host_id: Uuid, limit: i64) -> Result<Vec<BookingEntity>>;

    /// Applies the change under a row lock if the status still matches. Moves out of the live
    /// set release the booking's nights.
    async fn apply_status_change(&self, change: BookingStatusChange)
    -> Result<StatusChangeOutcome>;

    /// Candidates for the sweeper, oldest hold first. The guard is re-checked by `expire_hold`.
    async fn list_expirable(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<BookingEntity>>;

    /// Re-checks the expiry guard under lock, expires the booking and releases its nights.
    async fn expire_hold(&self, booking_id: Uuid, now: DateTime<Utc>)
    -> Result<ExpireHoldOutcome>;

    /// CONFIRMED bookings whose check-in date has arrived and CHECKED_IN bookings whose
    /// check-out date has arrived.
    async fn list_due_stay_transitions(
        &self,
        today: NaiveDate,
        limit: i64,
    ) -> Result<Vec<BookingEntity>>;
}
