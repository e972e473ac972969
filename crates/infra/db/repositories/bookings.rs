use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    PgConnection,
    prelude::*,
    result::{DatabaseErrorInformation, Error as DieselError},
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{bookings, properties, property_availability},
    },
};
use domain::{
    entities::{
        bookings::{
            BookingEntity, BookingRow, BookingStatusChange, CreateBookingOutcome,
            ExpireHoldOutcome, InsertBookingEntity, NewBookingEntity, StatusChangeOutcome,
            UpdateBookingStatusEntity,
        },
        property_availability::PropertyAvailabilityEntity,
    },
    repositories::bookings::BookingRepository,
    value_objects::{
        booking_lifecycle::{EXPIRED_HOLD_REASON, is_hold_expired},
        enums::{
            booking_statuses::BookingStatus, cancelled_by::CancelledBy,
            payment_statuses::PaymentStatus,
        },
        stay_ranges::{StayRange, check_conflict, nights_to_release},
    },
};

pub const OVERLAP_CONSTRAINT: &str = "bookings_no_overlapping_live_stays";

pub struct BookingPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl BookingPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn into_entities(rows: Vec<BookingRow>) -> Result<Vec<BookingEntity>> {
    rows.into_iter().map(BookingEntity::try_from).collect()
}

fn is_overlap_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<DieselError>(),
        Some(DieselError::DatabaseError(_, info)) if info.constraint_name() == Some(OVERLAP_CONSTRAINT)
    )
}

fn load_live_overlapping(
    conn: &mut PgConnection,
    property_id: Uuid,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Result<Vec<BookingEntity>> {
    let rows = bookings::table
        .filter(bookings::property_id.eq(property_id))
        .filter(bookings::status.eq_any(BookingStatus::live_strings()))
        .filter(bookings::check_in.lt(check_out))
        .filter(bookings::check_out.gt(check_in))
        .order(bookings::check_in.asc())
        .select(BookingRow::as_select())
        .load::<BookingRow>(conn)?;

    into_entities(rows)
}

fn lock_booking(conn: &mut PgConnection, booking_id: Uuid) -> Result<Option<BookingEntity>> {
    let row = bookings::table
        .find(booking_id)
        .select(BookingRow::as_select())
        .for_update()
        .first::<BookingRow>(conn)
        .optional()?;

    row.map(BookingEntity::try_from).transpose()
}

fn set_nights_available(
    conn: &mut PgConnection,
    property_id: Uuid,
    nights: &[NaiveDate],
    available: bool,
    now: DateTime<Utc>,
) -> Result<usize> {
    if nights.is_empty() {
        return Ok(0);
    }

    let rows: Vec<PropertyAvailabilityEntity> = nights
        .iter()
        .map(|date| PropertyAvailabilityEntity {
            property_id,
            date: *date,
            available,
            updated_at: now,
        })
        .collect();

    diesel::insert_into(property_availability::table)
        .values(&rows)
        .on_conflict((property_availability::property_id, property_availability::date))
        .do_update()
        .set((
            property_availability::available.eq(available),
            property_availability::updated_at.eq(now),
        ))
        .execute(conn)?;

    Ok(rows.len())
}

/// Re-opens the nights of a booking that just left the live set, except nights another live
/// booking still covers.
pub(crate) fn release_nights(
    conn: &mut PgConnection,
    booking: &BookingEntity,
    now: DateTime<Utc>,
) -> Result<usize> {
    let still_live: Vec<StayRange> = bookings::table
        .filter(bookings::property_id.eq(booking.property_id))
        .filter(bookings::id.ne(booking.id))
        .filter(bookings::status.eq_any(BookingStatus::live_strings()))
        .filter(bookings::check_in.lt(booking.check_out))
        .filter(bookings::check_out.gt(booking.check_in))
        .select((bookings::check_in, bookings::check_out))
        .load::<(NaiveDate, NaiveDate)>(conn)?
        .into_iter()
        .map(|(check_in, check_out)| StayRange {
            check_in,
            check_out,
        })
        .collect();

    let nights = nights_to_release(&booking.stay(), &still_live);
    set_nights_available(conn, booking.property_id, &nights, true, now)
}

/// Writes a status change on an already locked booking and releases its nights when it leaves
/// the live set.
pub(crate) fn write_status_change(
    conn: &mut PgConnection,
    current: &BookingEntity,
    change: &BookingStatusChange,
    now: DateTime<Utc>,
) -> Result<BookingEntity> {
    let row = diesel::update(bookings::table.find(current.id))
        .set(UpdateBookingStatusEntity::from_change(change, now))
        .returning(BookingRow::as_returning())
        .get_result::<BookingRow>(conn)?;
    let updated = BookingEntity::try_from(row)?;

    if current.status.is_live() && !updated.status.is_live() {
        release_nights(conn, &updated, now)?;
    }

    Ok(updated)
}

#[async_trait]
impl BookingRepository for BookingPostgres {
    async fn create_with_hold(&self, booking: NewBookingEntity) -> Result<CreateBookingOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let insert_entity = InsertBookingEntity::try_from(&booking)?;
        let property_id = booking.property_id;
        let stay = booking.stay;

        let outcome = conn.transaction::<CreateBookingOutcome, anyhow::Error, _>(|conn| {
            // Concurrent requests for the same property queue up here.
            properties::table
                .find(property_id)
                .select(properties::id)
                .for_update()
                .first::<Uuid>(conn)?;

            let overlapping = load_live_overlapping(conn, property_id, stay.check_in, stay.check_out)?;
            let check = check_conflict(property_id, &stay, overlapping);
            if check.has_conflict {
                return Ok(CreateBookingOutcome::Conflict(check.conflicting_bookings));
            }

            let row = diesel::insert_into(bookings::table)
                .values(&insert_entity)
                .returning(BookingRow::as_returning())
                .get_result::<BookingRow>(conn)?;
            let created = BookingEntity::try_from(row)?;

            let nights: Vec<NaiveDate> = stay.nights_iter().collect();
            set_nights_available(conn, property_id, &nights, false, created.created_at)?;

            Ok(CreateBookingOutcome::Created(created))
        });

        match outcome {
            Ok(outcome) => Ok(outcome),
            Err(err) if is_overlap_violation(&err) => {
                warn!(
                    %property_id,
                    check_in = %stay.check_in,
                    check_out = %stay.check_out,
                    "bookings: exclusion constraint rejected an overlapping insert"
                );
                let existing =
                    load_live_overlapping(&mut conn, property_id, stay.check_in, stay.check_out)?;
                Ok(CreateBookingOutcome::Conflict(existing))
            }
            Err(err) => Err(err),
        }
    }

    async fn find_by_id(&self, booking_id: Uuid) -> Result<Option<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = bookings::table
            .find(booking_id)
            .select(BookingRow::as_select())
            .first::<BookingRow>(&mut conn)
            .optional()?;

        row.map(BookingEntity::try_from).transpose()
    }

    async fn find_live_overlapping(
        &self,
        property_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        load_live_overlapping(&mut conn, property_id, check_in, check_out)
    }

    async fn list_for_guest(&self, guest_id: Uuid, limit: i64) -> Result<Vec<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = bookings::table
            .filter(bookings::guest_id.eq(guest_id))
            .order(bookings::created_at.desc())
            .limit(limit)
            .select(BookingRow::as_select())
            .load::<BookingRow>(&mut conn)?;

        into_entities(rows)
    }

    async fn list_for_host(&self, host_id: Uuid, limit: i64) -> Result<Vec<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = bookings::table
            .filter(bookings::host_id.eq(host_id))
            .order(bookings::created_at.desc())
            .limit(limit)
            .select(BookingRow::as_select())
            .load::<BookingRow>(&mut conn)?;

        into_entities(rows)
    }

    async fn apply_status_change(
        &self,
        change: BookingStatusChange,
    ) -> Result<StatusChangeOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        conn.transaction::<StatusChangeOutcome, anyhow::Error, _>(|conn| {
            let Some(current) = lock_booking(conn, change.booking_id)? else {
                return Ok(StatusChangeOutcome::NotFound);
            };
            if current.status != change.expected_status {
                return Ok(StatusChangeOutcome::Stale(current));
            }

            let updated = write_status_change(conn, &current, &change, now)?;
            Ok(StatusChangeOutcome::Applied(updated))
        })
    }

    async fn list_expirable(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = bookings::table
            .filter(bookings::status.eq_any(BookingStatus::expirable_strings()))
            .filter(bookings::payment_status.ne(PaymentStatus::Paid.as_str()))
            .filter(bookings::hold_expires_at.lt(now))
            .order(bookings::hold_expires_at.asc())
            .limit(limit)
            .select(BookingRow::as_select())
            .load::<BookingRow>(&mut conn)?;

        into_entities(rows)
    }

    async fn expire_hold(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ExpireHoldOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<ExpireHoldOutcome, anyhow::Error, _>(|conn| {
            let Some(current) = lock_booking(conn, booking_id)? else {
                anyhow::bail!("booking {booking_id} disappeared before it could be expired");
            };
            if !is_hold_expired(&current, now) {
                return Ok(ExpireHoldOutcome::Skipped(current.status));
            }

            let updated = diesel::update(bookings::table.find(booking_id))
                .set((
                    bookings::status.eq(BookingStatus::Expired.as_str()),
                    bookings::cancelled_at.eq(Some(now)),
                    bookings::cancelled_by.eq(Some(CancelledBy::System.as_str())),
                    bookings::cancellation_reason.eq(Some(EXPIRED_HOLD_REASON)),
                    bookings::updated_at.eq(now),
                ))
                .returning(BookingRow::as_returning())
                .get_result::<BookingRow>(conn)?;
            let booking = BookingEntity::try_from(updated)?;
            let released_dates = release_nights(conn, &booking, now)?;

            info!(
                %booking_id,
                from_status = %current.status,
                released_dates,
                "bookings: hold expired"
            );

            Ok(ExpireHoldOutcome::Expired {
                booking,
                released_dates,
            })
        })
    }

    async fn list_due_stay_transitions(
        &self,
        today: NaiveDate,
        limit: i64,
    ) -> Result<Vec<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = bookings::table
            .filter(
                bookings::status
                    .eq(BookingStatus::Confirmed.as_str())
                    .and(bookings::check_in.le(today))
                    .or(bookings::status
                        .eq(BookingStatus::CheckedIn.as_str())
                        .and(bookings::check_out.le(today))),
            )
            .order(bookings::check_in.asc())
            .limit(limit)
            .select(BookingRow::as_select())
            .load::<BookingRow>(&mut conn)?;

        into_entities(rows)
    }
}
