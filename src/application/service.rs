use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{
    accrue_debt, settle_debt, split_expense, split_residual, BalanceView, Cents, Expense,
    ExpenseId, ExpenseShare, NewExpense, NewUser, Settlement, Trip, TripId, User, UserId,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing the ledger operations.
/// This is the only interface clients (CLI, exporters) use.
///
/// Mutating operations are serialized through a ledger-wide lock and each one
/// runs inside a single database transaction.
pub struct LedgerService {
    repo: Repository,
    write_lock: Mutex<()>,
}

/// Result of recording an expense
#[derive(Debug, Clone)]
pub struct ExpenseResult {
    pub expense: Expense,
    pub shares: Vec<ExpenseShare>,
    /// Equal share charged to every participant
    pub share_cents: Cents,
    /// Cents not covered by the shares (`total - share * participants`)
    pub residual_cents: Cents,
}

/// An expense together with its participant shares
#[derive(Debug, Clone)]
pub struct ExpenseDetail {
    pub expense: Expense,
    pub shares: Vec<ExpenseShare>,
}

/// Net position of a user across all balances
#[derive(Debug, Clone, PartialEq)]
pub struct UserPosition {
    pub user: User,
    /// Total others owe this user
    pub owed_to: Cents,
    /// Total this user owes others
    pub owes: Cents,
}

impl UserPosition {
    /// Positive when the user is owed money overall.
    pub fn net(&self) -> Cents {
        self.owed_to - self.owes
    }
}

impl LedgerService {
    /// Create a new ledger service around an owned repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            write_lock: Mutex::new(()),
        }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Users and trips
    // ========================

    /// Register a new user.
    pub async fn register_user(&self, name: &str, contact: &str) -> Result<User, AppError> {
        let new_user =
            NewUser::new(name, contact).ok_or_else(|| AppError::validation("User name is required"))?;

        let _guard = self.write_lock.lock().await;
        let user = self.repo.save_user(&new_user).await?;
        info!(user_id = user.id, name = %user.name, "registered user");
        Ok(user)
    }

    /// List all users in registration order.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.repo.list_users().await?)
    }

    /// Create a new trip.
    pub async fn create_trip(&self, name: &str) -> Result<Trip, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Trip name is required"));
        }

        let _guard = self.write_lock.lock().await;
        let trip = self.repo.save_trip(name).await?;
        info!(trip_id = trip.id, name = %trip.name, "created trip");
        Ok(trip)
    }

    pub async fn list_trips(&self) -> Result<Vec<Trip>, AppError> {
        Ok(self.repo.list_trips().await?)
    }

    // ========================
    // Expenses
    // ========================

    /// Record an expense paid by `payer` and split equally among `participants`.
    ///
    /// Every participant gets a share row; every participant other than the
    /// payer accrues a debt of one share towards the payer. The whole sequence
    /// commits or rolls back as one unit.
    pub async fn record_expense(
        &self,
        description: &str,
        total_cents: Cents,
        payer: UserId,
        trip_id: TripId,
        participants: &[UserId],
    ) -> Result<ExpenseResult, AppError> {
        validate_expense(total_cents, participants)?;
        let share_cents = split_expense(total_cents, participants.len())?;
        let residual_cents = split_residual(total_cents, participants.len());

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;

        let expense = tx
            .insert_expense(&NewExpense {
                description: description.trim().to_string(),
                total_cents,
                paid_by: payer,
                trip_id,
                created_at: Utc::now(),
            })
            .await?;

        let mut shares = Vec::with_capacity(participants.len());
        for &user_id in participants {
            let share = ExpenseShare {
                expense_id: expense.id,
                user_id,
                share_cents,
            };
            tx.insert_share(&share).await?;
            shares.push(share);
        }

        for &user_id in participants.iter().filter(|&&id| id != payer) {
            accrue_debt(&mut tx, user_id, payer, share_cents).await?;
        }

        tx.commit().await?;

        if residual_cents != 0 {
            debug!(
                expense_id = expense.id,
                residual_cents, "split left a residual that is not redistributed"
            );
        }
        info!(
            expense_id = expense.id,
            total_cents,
            payer,
            participants = participants.len(),
            "recorded expense"
        );

        Ok(ExpenseResult {
            expense,
            shares,
            share_cents,
            residual_cents,
        })
    }

    /// Get an expense with its participant shares.
    pub async fn get_expense(&self, id: ExpenseId) -> Result<ExpenseDetail, AppError> {
        let expense = self
            .repo
            .get_expense(id)
            .await?
            .ok_or(AppError::ExpenseNotFound(id))?;
        let shares = self.repo.list_shares(id).await?;
        Ok(ExpenseDetail { expense, shares })
    }

    /// List expenses in creation order, optionally for a single trip.
    pub async fn list_expenses(&self, trip_id: Option<TripId>) -> Result<Vec<Expense>, AppError> {
        Ok(self.repo.list_expenses(trip_id).await?)
    }

    // ========================
    // Payments and balances
    // ========================

    /// Record a payment of `amount_cents` from `from` to `to`, reducing what
    /// `from` owes `to`. Overpayment clears the balance and is discarded.
    pub async fn record_payment(
        &self,
        from: UserId,
        to: UserId,
        amount_cents: Cents,
    ) -> Result<Settlement, AppError> {
        if amount_cents <= 0 {
            return Err(AppError::validation("Payment amount must be positive"));
        }
        if from == to {
            return Err(AppError::validation("Payer and payee must be different users"));
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;

        // No row means nothing was written; dropping `tx` rolls back.
        let settlement = settle_debt(&mut tx, from, to, amount_cents)
            .await?
            .ok_or(AppError::NoSuchBalance { from, to })?;

        tx.commit().await?;

        info!(
            from,
            to,
            amount_cents,
            remaining = settlement.remaining(),
            "recorded payment"
        );
        Ok(settlement)
    }

    /// All outstanding balances with user names. Re-queried on every call.
    pub async fn list_balances(&self) -> Result<Vec<BalanceView>, AppError> {
        Ok(self.repo.list_named_balances().await?)
    }

    /// What `debtor` currently owes `creditor`, if anything.
    pub async fn balance_between(
        &self,
        debtor: UserId,
        creditor: UserId,
    ) -> Result<Option<Cents>, AppError> {
        Ok(self.repo.get_balance(debtor, creditor).await?)
    }

    /// Per-user totals of what they owe and are owed.
    pub async fn user_summary(&self) -> Result<Vec<UserPosition>, AppError> {
        let users = self.repo.list_users().await?;
        let balances = self.repo.list_balances().await?;

        let mut owed_to: HashMap<UserId, Cents> = HashMap::new();
        let mut owes: HashMap<UserId, Cents> = HashMap::new();
        for balance in &balances {
            add_to_total(&mut owed_to, balance.creditor, balance.amount_cents)?;
            add_to_total(&mut owes, balance.debtor, balance.amount_cents)?;
        }

        Ok(users
            .into_iter()
            .map(|user| UserPosition {
                owed_to: owed_to.get(&user.id).copied().unwrap_or(0),
                owes: owes.get(&user.id).copied().unwrap_or(0),
                user,
            })
            .collect())
    }
}

fn add_to_total(
    totals: &mut HashMap<UserId, Cents>,
    user: UserId,
    amount: Cents,
) -> Result<(), AppError> {
    let total = totals.entry(user).or_insert(0);
    *total = total
        .checked_add(amount)
        .ok_or_else(|| anyhow::anyhow!("total balance of user {} overflows", user))?;
    Ok(())
}

/// Reject malformed expenses before any store access.
fn validate_expense(total_cents: Cents, participants: &[UserId]) -> Result<(), AppError> {
    if total_cents <= 0 {
        return Err(AppError::validation("Expense amount must be positive"));
    }
    if participants.is_empty() {
        return Err(AppError::validation(
            "An expense needs at least one participant",
        ));
    }

    let mut seen = HashSet::with_capacity(participants.len());
    if let Some(dup) = participants.iter().find(|&&id| !seen.insert(id)) {
        return Err(AppError::Validation(format!(
            "User {} is listed more than once",
            dup
        )));
    }

    // A zero share would record participants who owe nothing.
    if total_cents < participants.len() as Cents {
        return Err(AppError::Validation(format!(
            "Amount is too small to split among {} participants",
            participants.len()
        )));
    }

    Ok(())
}
