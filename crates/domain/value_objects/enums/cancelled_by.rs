use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Who moved a booking out of the live set. Also used as the actor role on audit rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelledBy {
    System,
    Guest,
    Host,
    Admin,
}

impl CancelledBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelledBy::System => "system",
            CancelledBy::Guest => "guest",
            CancelledBy::Host => "host",
            CancelledBy::Admin => "admin",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "system" => Some(CancelledBy::System),
            "guest" => Some(CancelledBy::Guest),
            "host" => Some(CancelledBy::Host),
            "admin" => Some(CancelledBy::Admin),
            _ => None,
        }
    }
}

impl Display for CancelledBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
