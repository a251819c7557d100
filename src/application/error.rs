use thiserror::Error;

use crate::domain::{ExpenseId, LedgerError, UserId};

#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or missing input. Always raised before the store is touched.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A payment targeted a pair with nothing outstanding. Informational.
    #[error("No outstanding balance from user {from} to user {to}")]
    NoSuchBalance { from: UserId, to: UserId },

    #[error("Expense not found: {0}")]
    ExpenseNotFound(ExpenseId),

    #[error("Store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Store(err) => AppError::Store(err),
            other => AppError::Validation(other.to_string()),
        }
    }
}
