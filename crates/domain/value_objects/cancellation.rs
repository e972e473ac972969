use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::value_objects::{
    enums::{
        cancellation_policies::CancellationPolicy, cancelled_by::CancelledBy,
        payment_statuses::PaymentStatus,
    },
    pricing::{PricingError, percent_half_up},
};

/// Last instant (midnight UTC, N days before check-in) a guest can cancel for a full refund.
pub fn cancellation_deadline(policy: CancellationPolicy, check_in: NaiveDate) -> DateTime<Utc> {
    let check_in_start = check_in.and_time(chrono::NaiveTime::MIN).and_utc();
    check_in_start - Duration::days(policy.full_refund_days())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefundQuote {
    pub amount_minor: i64,
    pub resulting_status: PaymentStatus,
}

impl RefundQuote {
    pub fn is_empty(&self) -> bool {
        self.amount_minor == 0
    }
}

/// Refund owed when a paid booking is cancelled. Host and admin cancellations always refund in
/// full; guests get a full refund before the deadline and the policy's late share after it.
pub fn refund_quote(
    policy: CancellationPolicy,
    cancelled_by: CancelledBy,
    total_price_minor: i64,
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<RefundQuote, PricingError> {
    let percent = match cancelled_by {
        CancelledBy::Guest if now > deadline => policy.late_refund_percent(),
        _ => 100,
    };

    let amount_minor = percent_half_up(total_price_minor, percent)?;
    let resulting_status = if amount_minor >= total_price_minor {
        PaymentStatus::Refunded
    } else if amount_minor > 0 {
        PaymentStatus::PartiallyRefunded
    } else {
        PaymentStatus::Paid
    };

    Ok(RefundQuote {
        amount_minor,
        resulting_status,
    })
}
