use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::bookings::BookingEntity;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StayRangeError {
    #[error("check_out ({check_out}) must be at least one night after check_in ({check_in})")]
    NoNights {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
}

/// Half-open stay window `[check_in, check_out)`: the guest sleeps every night from
/// `check_in` up to, but not including, `check_out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, StayRangeError> {
        if check_out <= check_in {
            return Err(StayRangeError::NoNights {
                check_in,
                check_out,
            });
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Back-to-back stays (one checks out the day the other checks in) do not overlap.
    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    pub fn contains_night(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }

    /// Every calendar night covered by the stay.
    pub fn nights_iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let mut next = Some(self.check_in);
        std::iter::from_fn(move || {
            let current = next?;
            if current >= self.check_out {
                return None;
            }
            next = current.checked_add_days(Days::new(1));
            Some(current)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictingStay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct ConflictCheck {
    pub has_conflict: bool,
    pub conflicting_bookings: Vec<BookingEntity>,
}

impl ConflictCheck {
    pub fn conflicting_stays(&self) -> Vec<ConflictingStay> {
        self.conflicting_bookings
            .iter()
            .map(|booking| ConflictingStay {
                check_in: booking.check_in,
                check_out: booking.check_out,
            })
            .collect()
    }
}

/// Conflict test used both for the read-only availability check and, under lock, right before
/// a booking insert. Only live bookings of the same property count.
pub fn check_conflict(
    property_id: Uuid,
    candidate: &StayRange,
    existing: impl IntoIterator<Item = BookingEntity>,
) -> ConflictCheck {
    let conflicting_bookings: Vec<BookingEntity> = existing
        .into_iter()
        .filter(|booking| booking.property_id == property_id)
        .filter(|booking| booking.status.is_live())
        .filter(|booking| booking.stay().overlaps(candidate))
        .collect();

    ConflictCheck {
        has_conflict: !conflicting_bookings.is_empty(),
        conflicting_bookings,
    }
}

/// Nights of `stay` that become free again when it leaves the live set, i.e. those not also
/// covered by one of the `still_live` stays.
pub fn nights_to_release(stay: &StayRange, still_live: &[StayRange]) -> Vec<NaiveDate> {
    stay.nights_iter()
        .filter(|night| !still_live.iter().any(|other| other.contains_night(*night)))
        .collect()
}
