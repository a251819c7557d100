use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::domain::{
    Balance, BalanceStore, BalanceView, Cents, Expense, ExpenseId, ExpenseShare, NewExpense,
    NewUser, Trip, TripId, User, UserId,
};

use super::MIGRATION_001_INITIAL;

/// Repository for persisting and querying the shared-expense ledger.
///
/// Owns the connection pool; every read goes straight to the database.
/// Multi-step writes go through [`LedgerTx`].
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database.
    /// Foreign key enforcement is on by default for sqlx SQLite connections.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Start a transaction. Dropping the returned handle without calling
    /// [`LedgerTx::commit`] rolls everything back.
    ///
    /// `BEGIN IMMEDIATE` takes the database write lock up front, so the
    /// read-then-write sequences in the balance engine never fail to upgrade
    /// when another connection or process writes in between.
    pub async fn begin(&self) -> Result<LedgerTx> {
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .context("Failed to begin transaction")?;
        Ok(LedgerTx { tx })
    }

    // ========================
    // User operations
    // ========================

    /// Insert a user and return it with its generated id.
    pub async fn save_user(&self, user: &NewUser) -> Result<User> {
        let created_at = Utc::now();
        let result = sqlx::query("INSERT INTO users (name, email, created_at) VALUES (?, ?, ?)")
            .bind(&user.name)
            .bind(&user.contact)
            .bind(created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to save user")?;

        Ok(User {
            id: result.last_insert_rowid(),
            name: user.name.clone(),
            contact: user.contact.clone(),
            created_at,
        })
    }

    /// List all users in registration order.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT user_id, name, email, created_at FROM users ORDER BY user_id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;

        rows.iter().map(Self::row_to_user).collect()
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
        let created_at_str: String = row.get("created_at");
        Ok(User {
            id: row.get("user_id"),
            name: row.get("name"),
            contact: row.get("email"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    // ========================
    // Trip operations
    // ========================

    pub async fn save_trip(&self, name: &str) -> Result<Trip> {
        let created_at = Utc::now();
        let result = sqlx::query("INSERT INTO trips (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to save trip")?;

        Ok(Trip {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            created_at,
        })
    }

    pub async fn list_trips(&self) -> Result<Vec<Trip>> {
        let rows = sqlx::query("SELECT trip_id, name, created_at FROM trips ORDER BY trip_id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list trips")?;

        rows.iter().map(Self::row_to_trip).collect()
    }

    fn row_to_trip(row: &sqlx::sqlite::SqliteRow) -> Result<Trip> {
        let created_at_str: String = row.get("created_at");
        Ok(Trip {
            id: row.get("trip_id"),
            name: row.get("name"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    // ========================
    // Expense operations
    // ========================

    pub async fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        let row = sqlx::query(
            r#"
            SELECT expense_id, description, total_cents, paid_by, trip_id, created_at
            FROM expenses
            WHERE expense_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch expense")?;

        row.as_ref().map(Self::row_to_expense).transpose()
    }

    /// List expenses in creation order, optionally restricted to one trip.
    pub async fn list_expenses(&self, trip_id: Option<TripId>) -> Result<Vec<Expense>> {
        let mut query = String::from(
            "SELECT expense_id, description, total_cents, paid_by, trip_id, created_at FROM expenses",
        );
        if trip_id.is_some() {
            query.push_str(" WHERE trip_id = ?");
        }
        query.push_str(" ORDER BY expense_id");

        let mut sql_query = sqlx::query(&query);
        if let Some(id) = trip_id {
            sql_query = sql_query.bind(id);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    pub async fn list_shares(&self, expense_id: ExpenseId) -> Result<Vec<ExpenseShare>> {
        let rows = sqlx::query(
            r#"
            SELECT expense_id, user_id, share_cents
            FROM participants
            WHERE expense_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(expense_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list expense shares")?;

        Ok(rows
            .iter()
            .map(|row| ExpenseShare {
                expense_id: row.get("expense_id"),
                user_id: row.get("user_id"),
                share_cents: row.get("share_cents"),
            })
            .collect())
    }

    fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<Expense> {
        let created_at_str: String = row.get("created_at");
        Ok(Expense {
            id: row.get("expense_id"),
            description: row.get("description"),
            total_cents: row.get("total_cents"),
            paid_by: row.get("paid_by"),
            trip_id: row.get("trip_id"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    // ========================
    // Balance operations
    // ========================

    /// Outstanding amount `debtor` owes `creditor`, if any.
    pub async fn get_balance(&self, debtor: UserId, creditor: UserId) -> Result<Option<Cents>> {
        let row = sqlx::query("SELECT amount_cents FROM balances WHERE from_user = ? AND to_user = ?")
            .bind(debtor)
            .bind(creditor)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch balance")?;

        Ok(row.map(|row| row.get("amount_cents")))
    }

    /// All balance edges, ordered by debtor then creditor.
    pub async fn list_balances(&self) -> Result<Vec<Balance>> {
        let rows = sqlx::query(
            "SELECT from_user, to_user, amount_cents FROM balances ORDER BY from_user, to_user",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list balances")?;

        Ok(rows
            .iter()
            .map(|row| Balance {
                debtor: row.get("from_user"),
                creditor: row.get("to_user"),
                amount_cents: row.get("amount_cents"),
            })
            .collect())
    }

    /// Balance edges joined with the names of both users.
    pub async fn list_named_balances(&self) -> Result<Vec<BalanceView>> {
        let rows = sqlx::query(
            r#"
            SELECT b.from_user, u1.name AS debtor_name, b.to_user, u2.name AS creditor_name, b.amount_cents
            FROM balances b
            JOIN users u1 ON b.from_user = u1.user_id
            JOIN users u2 ON b.to_user = u2.user_id
            ORDER BY b.from_user, b.to_user
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list balances")?;

        Ok(rows
            .iter()
            .map(|row| BalanceView {
                debtor_id: row.get("from_user"),
                debtor_name: row.get("debtor_name"),
                creditor_id: row.get("to_user"),
                creditor_name: row.get("creditor_name"),
                amount_cents: row.get("amount_cents"),
            })
            .collect())
    }
}

/// One unit of work against the ledger. Rolled back on drop unless committed.
pub struct LedgerTx {
    tx: Transaction<'static, Sqlite>,
}

impl LedgerTx {
    /// Insert an expense and return it with its generated id.
    pub async fn insert_expense(&mut self, expense: &NewExpense) -> Result<Expense> {
        let result = sqlx::query(
            r#"
            INSERT INTO expenses (description, total_cents, paid_by, trip_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&expense.description)
        .bind(expense.total_cents)
        .bind(expense.paid_by)
        .bind(expense.trip_id)
        .bind(expense.created_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .context("Failed to save expense")?;

        Ok(Expense {
            id: result.last_insert_rowid(),
            description: expense.description.clone(),
            total_cents: expense.total_cents,
            paid_by: expense.paid_by,
            trip_id: expense.trip_id,
            created_at: expense.created_at,
        })
    }

    pub async fn insert_share(&mut self, share: &ExpenseShare) -> Result<()> {
        sqlx::query("INSERT INTO participants (expense_id, user_id, share_cents) VALUES (?, ?, ?)")
            .bind(share.expense_id)
            .bind(share.user_id)
            .bind(share.share_cents)
            .execute(&mut *self.tx)
            .await
            .with_context(|| format!("Failed to save share for user {}", share.user_id))?;
        Ok(())
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Failed to commit transaction")
    }
}

#[async_trait]
impl BalanceStore for LedgerTx {
    async fn balance(&mut self, debtor: UserId, creditor: UserId) -> Result<Option<Cents>> {
        let row = sqlx::query("SELECT amount_cents FROM balances WHERE from_user = ? AND to_user = ?")
            .bind(debtor)
            .bind(creditor)
            .fetch_optional(&mut *self.tx)
            .await
            .context("Failed to fetch balance")?;

        Ok(row.map(|row| row.get("amount_cents")))
    }

    async fn insert_balance(&mut self, debtor: UserId, creditor: UserId, amount: Cents) -> Result<()> {
        sqlx::query("INSERT INTO balances (from_user, to_user, amount_cents) VALUES (?, ?, ?)")
            .bind(debtor)
            .bind(creditor)
            .bind(amount)
            .execute(&mut *self.tx)
            .await
            .with_context(|| format!("Failed to insert balance {} -> {}", debtor, creditor))?;
        Ok(())
    }

    async fn update_balance(&mut self, debtor: UserId, creditor: UserId, amount: Cents) -> Result<()> {
        sqlx::query("UPDATE balances SET amount_cents = ? WHERE from_user = ? AND to_user = ?")
            .bind(amount)
            .bind(debtor)
            .bind(creditor)
            .execute(&mut *self.tx)
            .await
            .with_context(|| format!("Failed to update balance {} -> {}", debtor, creditor))?;
        Ok(())
    }

    async fn delete_balance(&mut self, debtor: UserId, creditor: UserId) -> Result<()> {
        sqlx::query("DELETE FROM balances WHERE from_user = ? AND to_user = ?")
            .bind(debtor)
            .bind(creditor)
            .execute(&mut *self.tx)
            .await
            .with_context(|| format!("Failed to delete balance {} -> {}", debtor, creditor))?;
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp: {}", value))?
        .with_timezone(&Utc))
}
