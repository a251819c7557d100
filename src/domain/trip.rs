use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TripId = i64;

/// A named group of expenses. Trips tag expenses for reporting; balances are
/// shared across all trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
