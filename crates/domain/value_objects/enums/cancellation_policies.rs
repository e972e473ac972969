use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationPolicy {
    #[default]
    Flexible,
    Moderate,
    Strict,
}

impl CancellationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationPolicy::Flexible => "flexible",
            CancellationPolicy::Moderate => "moderate",
            CancellationPolicy::Strict => "strict",
        }
    }

    /// Unknown values fall back to the most guest-friendly policy.
    pub fn from_str(value: &str) -> Self {
        match value {
            "moderate" => CancellationPolicy::Moderate,
            "strict" => CancellationPolicy::Strict,
            _ => CancellationPolicy::Flexible,
        }
    }

    /// Days before check-in after which a guest cancellation is no longer fully refunded.
    pub fn full_refund_days(&self) -> i64 {
        match self {
            CancellationPolicy::Flexible => 1,
            CancellationPolicy::Moderate => 5,
            CancellationPolicy::Strict => 14,
        }
    }

    /// Percentage of the total refunded to a guest who cancels after the deadline.
    pub fn late_refund_percent(&self) -> i64 {
        match self {
            CancellationPolicy::Flexible | CancellationPolicy::Moderate => 50,
            CancellationPolicy::Strict => 0,
        }
    }
}

impl Display for CancellationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
