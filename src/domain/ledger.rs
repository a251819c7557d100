use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Cents, UserId};

/// A directed debt: `debtor` owes `creditor` `amount_cents`.
/// At most one edge exists per ordered pair and its amount is always positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub debtor: UserId,
    pub creditor: UserId,
    pub amount_cents: Cents,
}

/// A balance edge resolved against user names, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    pub debtor_id: UserId,
    pub debtor_name: String,
    pub creditor_id: UserId,
    pub creditor_name: String,
    pub amount_cents: Cents,
}

/// Single-pair access to persisted balances.
///
/// Implementations must read through to storage on every call: the engine
/// never caches an amount between a read and the write that follows it.
#[async_trait]
pub trait BalanceStore: Send {
    async fn balance(&mut self, debtor: UserId, creditor: UserId) -> anyhow::Result<Option<Cents>>;

    async fn insert_balance(
        &mut self,
        debtor: UserId,
        creditor: UserId,
        amount: Cents,
    ) -> anyhow::Result<()>;

    async fn update_balance(
        &mut self,
        debtor: UserId,
        creditor: UserId,
        amount: Cents,
    ) -> anyhow::Result<()>;

    async fn delete_balance(&mut self, debtor: UserId, creditor: UserId) -> anyhow::Result<()>;
}

/// Outcome of applying a payment to an existing balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Settlement {
    /// The balance reached zero or below and was removed.
    /// `overpaid` is the part of the payment above the debt; it is dropped.
    Cleared { previous: Cents, overpaid: Cents },
    /// The balance was reduced and is still outstanding.
    Reduced { previous: Cents, remaining: Cents },
}

impl Settlement {
    /// Amount still owed after the payment.
    pub fn remaining(&self) -> Cents {
        match self {
            Settlement::Cleared { .. } => 0,
            Settlement::Reduced { remaining, .. } => *remaining,
        }
    }

    pub fn is_cleared(&self) -> bool {
        matches!(self, Settlement::Cleared { .. })
    }
}

/// Equal share of `total` among `participant_count` people.
///
/// Uses integer division of cents. Any remainder is not redistributed; see
/// [`split_residual`].
pub fn split_expense(total: Cents, participant_count: usize) -> Result<Cents, LedgerError> {
    if participant_count == 0 {
        return Err(LedgerError::NoParticipants);
    }
    if total <= 0 {
        return Err(LedgerError::NonPositiveAmount(total));
    }
    Ok(total / participant_count as Cents)
}

/// Cents lost by [`split_expense`]: `total - share * participant_count`.
pub fn split_residual(total: Cents, participant_count: usize) -> Cents {
    if participant_count == 0 {
        return total;
    }
    total % participant_count as Cents
}

/// Add `amount` to what `debtor` owes `creditor`, creating the edge if needed.
/// Returns the new outstanding amount. The inverse edge is left untouched.
pub async fn accrue_debt<S: BalanceStore + ?Sized>(
    store: &mut S,
    debtor: UserId,
    creditor: UserId,
    amount: Cents,
) -> Result<Cents, LedgerError> {
    if debtor == creditor {
        return Err(LedgerError::SelfDebt(debtor));
    }
    if amount <= 0 {
        return Err(LedgerError::NonPositiveAmount(amount));
    }

    let updated = match store.balance(debtor, creditor).await? {
        Some(existing) => {
            let total = existing
                .checked_add(amount)
                .ok_or_else(|| anyhow::anyhow!("balance {} -> {} overflows", debtor, creditor))?;
            store.update_balance(debtor, creditor, total).await?;
            total
        }
        None => {
            store.insert_balance(debtor, creditor, amount).await?;
            amount
        }
    };

    debug!(debtor, creditor, amount, balance = updated, "accrued debt");
    Ok(updated)
}

/// Apply a payment of `amount` from `debtor` to `creditor`.
///
/// Returns `Ok(None)` without writing when no such balance exists.
pub async fn settle_debt<S: BalanceStore + ?Sized>(
    store: &mut S,
    debtor: UserId,
    creditor: UserId,
    amount: Cents,
) -> Result<Option<Settlement>, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::NonPositiveAmount(amount));
    }

    let Some(current) = store.balance(debtor, creditor).await? else {
        debug!(debtor, creditor, "no balance to settle");
        return Ok(None);
    };

    let remaining = current - amount;
    let settlement = if remaining <= 0 {
        store.delete_balance(debtor, creditor).await?;
        Settlement::Cleared {
            previous: current,
            overpaid: -remaining,
        }
    } else {
        store.update_balance(debtor, creditor, remaining).await?;
        Settlement::Reduced {
            previous: current,
            remaining,
        }
    };

    debug!(debtor, creditor, amount, remaining = settlement.remaining(), "settled debt");
    Ok(Some(settlement))
}

#[derive(Debug)]
pub enum LedgerError {
    /// A user cannot owe themselves.
    SelfDebt(UserId),
    NonPositiveAmount(Cents),
    NoParticipants,
    Store(anyhow::Error),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::SelfDebt(user) => write!(f, "user {} cannot owe themselves", user),
            LedgerError::NonPositiveAmount(amount) => {
                write!(f, "amount must be positive, got {} cents", amount)
            }
            LedgerError::NoParticipants => write!(f, "an expense needs at least one participant"),
            LedgerError::Store(err) => write!(f, "ledger store error: {}", err),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::Store(err) => {
                let source: &(dyn std::error::Error + 'static) = err.as_ref();
                Some(source)
            }
            _ => None,
        }
    }
}

impl From<anyhow::Error> for LedgerError {
    fn from(err: anyhow::Error) -> Self {
        LedgerError::Store(err)
    }
}
