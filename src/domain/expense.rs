use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, TripId, UserId};

pub type ExpenseId = i64;

/// An expense paid by one user on behalf of several participants.
/// Expenses are immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub description: String,
    /// Total amount in cents (always positive)
    pub total_cents: Cents,
    pub paid_by: UserId,
    pub trip_id: TripId,
    pub created_at: DateTime<Utc>,
}

/// An expense that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub description: String,
    pub total_cents: Cents,
    pub paid_by: UserId,
    pub trip_id: TripId,
    pub created_at: DateTime<Utc>,
}

/// One participant's portion of an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseShare {
    pub expense_id: ExpenseId,
    pub user_id: UserId,
    pub share_cents: Cents,
}
