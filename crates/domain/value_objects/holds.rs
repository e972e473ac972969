use chrono::{DateTime, Duration, Utc};

use crate::domain::value_objects::enums::booking_statuses::BookingStatus;

/// How long unpaid inventory stays reserved. Request-to-book stays get a longer window so the
/// host has time to answer; approval restarts the shorter payment window.
#[derive(Debug, Clone, Copy)]
pub struct HoldPolicy {
    pub payment_hold: Duration,
    pub request_hold: Duration,
}

impl Default for HoldPolicy {
    fn default() -> Self {
        Self {
            payment_hold: Duration::minutes(15),
            request_hold: Duration::hours(24),
        }
    }
}

impl HoldPolicy {
    pub fn expires_at(&self, status: BookingStatus, now: DateTime<Utc>) -> DateTime<Utc> {
        match status {
            BookingStatus::Requested => now + self.request_hold,
            _ => now + self.payment_hold,
        }
    }
}
