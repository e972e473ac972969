use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Requested,
    Approved,
    AwaitingPayment,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    Rejected,
    Expired,
}

impl BookingStatus {
    /// Statuses that hold the property's nights. Everything that is not terminal blocks the
    /// calendar, including pre-payment holds.
    pub const LIVE: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Requested,
        BookingStatus::Approved,
        BookingStatus::AwaitingPayment,
        BookingStatus::Confirmed,
        BookingStatus::CheckedIn,
    ];

    /// Statuses in which a guest may start a new payment attempt.
    pub const PAYABLE: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Requested,
        BookingStatus::Approved,
        BookingStatus::AwaitingPayment,
    ];

    /// Pre-payment statuses the sweeper may expire once the hold lapses.
    pub const EXPIRABLE: [BookingStatus; 4] = BookingStatus::PAYABLE;

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Requested => "requested",
            BookingStatus::Approved => "approved",
            BookingStatus::AwaitingPayment => "awaiting_payment",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Expired => "expired",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(BookingStatus::Pending),
            "requested" => Some(BookingStatus::Requested),
            "approved" => Some(BookingStatus::Approved),
            "awaiting_payment" => Some(BookingStatus::AwaitingPayment),
            "confirmed" => Some(BookingStatus::Confirmed),
            "checked_in" => Some(BookingStatus::CheckedIn),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "rejected" => Some(BookingStatus::Rejected),
            "expired" => Some(BookingStatus::Expired),
            _ => None,
        }
    }

    pub fn is_live(&self) -> bool {
        Self::LIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }

    pub fn is_payable(&self) -> bool {
        Self::PAYABLE.contains(self)
    }

    pub fn is_expirable(&self) -> bool {
        Self::EXPIRABLE.contains(self)
    }

    pub fn live_strings() -> Vec<String> {
        Self::LIVE.iter().map(|s| s.to_string()).collect()
    }

    pub fn expirable_strings() -> Vec<String> {
        Self::EXPIRABLE.iter().map(|s| s.to_string()).collect()
    }
}

impl Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
