use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Amount, Transaction, TransactionId, TransactionStatus, TransactionType, UserId, Wallet,
    WalletId, WalletType,
};

use super::MIGRATION_001_INITIAL;

const WALLET_COLUMNS: &str = "id, user_id, name, description, wallet_type, currency, \
     initial_balance, current_balance, credit_limit, is_default, excluded_from_total, \
     display_order, transaction_count, last_transaction_at, created_at, updated_at, \
     deleted_at, version";

const TRANSACTION_COLUMNS: &str = "id, user_id, wallet_id, category_id, to_wallet_id, \
     transaction_type, amount, currency, transaction_date, description, notes, status, \
     created_at, updated_at";

/// Repository for persisting and querying wallets and transactions.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

/// Scoped database transaction covering one logical ledger operation.
///
/// Every wallet write and the transaction write of an operation participate
/// in the same unit of work; commit happens only after all steps succeed.
/// Dropping the unit of work without committing rolls everything back.
pub struct UnitOfWork {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Failed to commit unit of work")
    }
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
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

    /// Open a unit of work spanning one logical operation.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin unit of work")?;
        Ok(UnitOfWork { tx })
    }

    /// The acting user of this database file. Created on first use.
    pub async fn local_user(&self) -> Result<UserId> {
        let row = sqlx::query("SELECT user_id FROM profile LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch profile")?;

        if let Some(row) = row {
            let id_str: String = row.get("user_id");
            return Uuid::parse_str(&id_str).context("Invalid profile user ID");
        }

        let user_id = Uuid::new_v4();
        sqlx::query("INSERT INTO profile (user_id, created_at) VALUES (?, ?)")
            .bind(user_id.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to create profile")?;
        Ok(user_id)
    }

    // ========================
    // Wallet operations
    // ========================

    /// Insert a freshly created wallet.
    pub async fn insert_wallet(conn: &mut SqliteConnection, wallet: &Wallet) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id, name, description, wallet_type, currency,
                initial_balance, current_balance, credit_limit, is_default,
                excluded_from_total, display_order, transaction_count, last_transaction_at,
                created_at, updated_at, deleted_at, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(wallet.id.to_string())
        .bind(wallet.user_id.to_string())
        .bind(&wallet.name)
        .bind(&wallet.description)
        .bind(wallet.wallet_type.as_str())
        .bind(&wallet.currency)
        .bind(wallet.initial_balance.to_string())
        .bind(wallet.current_balance.to_string())
        .bind(wallet.credit_limit.map(|l| l.to_string()))
        .bind(wallet.is_default)
        .bind(wallet.excluded_from_total)
        .bind(wallet.display_order)
        .bind(wallet.transaction_count)
        .bind(wallet.last_transaction_at.map(|dt| dt.to_rfc3339()))
        .bind(wallet.created_at.to_rfc3339())
        .bind(wallet.updated_at.to_rfc3339())
        .bind(wallet.deleted_at.map(|dt| dt.to_rfc3339()))
        .bind(wallet.version)
        .execute(&mut *conn)
        .await
        .context("Failed to insert wallet")?;
        Ok(())
    }

    /// Persist a wallet snapshot, conditioned on its version stamp.
    ///
    /// Returns false when the row's stamp no longer matches the snapshot's,
    /// meaning another writer got there first and the caller must restart
    /// from a fresh read.
    pub async fn update_wallet(conn: &mut SqliteConnection, wallet: &Wallet) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE wallets
            SET name = ?, description = ?, currency = ?, current_balance = ?,
                credit_limit = ?, is_default = ?, excluded_from_total = ?,
                display_order = ?, transaction_count = ?, last_transaction_at = ?,
                updated_at = ?, deleted_at = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(&wallet.name)
        .bind(&wallet.description)
        .bind(&wallet.currency)
        .bind(wallet.current_balance.to_string())
        .bind(wallet.credit_limit.map(|l| l.to_string()))
        .bind(wallet.is_default)
        .bind(wallet.excluded_from_total)
        .bind(wallet.display_order)
        .bind(wallet.transaction_count)
        .bind(wallet.last_transaction_at.map(|dt| dt.to_rfc3339()))
        .bind(wallet.updated_at.to_rfc3339())
        .bind(wallet.deleted_at.map(|dt| dt.to_rfc3339()))
        .bind(wallet.id.to_string())
        .bind(wallet.version)
        .execute(&mut *conn)
        .await
        .context("Failed to update wallet")?;

        Ok(result.rows_affected() == 1)
    }

    /// Fetch a wallet by ID, soft-deleted rows included.
    pub async fn wallet_by_id(
        conn: &mut SqliteConnection,
        id: WalletId,
    ) -> Result<Option<Wallet>> {
        let query = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch wallet")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_wallet(&row)?)),
            None => Ok(None),
        }
    }

    /// List a user's live wallets.
    pub async fn wallets_by_user(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<Vec<Wallet>> {
        let query = format!(
            "SELECT {WALLET_COLUMNS} FROM wallets \
             WHERE user_id = ? AND deleted_at IS NULL \
             ORDER BY display_order, name"
        );
        let rows = sqlx::query(&query)
            .bind(user_id.to_string())
            .fetch_all(&mut *conn)
            .await
            .context("Failed to list wallets")?;

        rows.iter().map(Self::row_to_wallet).collect()
    }

    /// Find the user's default wallet, if any.
    pub async fn default_wallet(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<Option<Wallet>> {
        let query = format!(
            "SELECT {WALLET_COLUMNS} FROM wallets \
             WHERE user_id = ? AND is_default = 1 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&query)
            .bind(user_id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch default wallet")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_wallet(&row)?)),
            None => Ok(None),
        }
    }

    /// Case-insensitive name check among the user's live wallets.
    pub async fn wallet_name_exists(
        conn: &mut SqliteConnection,
        user_id: UserId,
        name: &str,
    ) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM wallets \
             WHERE user_id = ? AND LOWER(name) = LOWER(?) AND deleted_at IS NULL",
        )
        .bind(user_id.to_string())
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to check wallet name")?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    pub async fn get_wallet(&self, id: WalletId) -> Result<Option<Wallet>> {
        let mut conn = self.pool.acquire().await?;
        Self::wallet_by_id(&mut conn, id).await
    }

    pub async fn list_wallets(&self, user_id: UserId) -> Result<Vec<Wallet>> {
        let mut conn = self.pool.acquire().await?;
        Self::wallets_by_user(&mut conn, user_id).await
    }

    pub async fn find_default_wallet(&self, user_id: UserId) -> Result<Option<Wallet>> {
        let mut conn = self.pool.acquire().await?;
        Self::default_wallet(&mut conn, user_id).await
    }

    // ========================
    // Transaction operations
    // ========================

    pub async fn insert_transaction(
        conn: &mut SqliteConnection,
        transaction: &Transaction,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, wallet_id, category_id, to_wallet_id,
                transaction_type, amount, currency, transaction_date, description, notes,
                status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(transaction.user_id.to_string())
        .bind(transaction.wallet_id.to_string())
        .bind(transaction.category_id.map(|id| id.to_string()))
        .bind(transaction.to_wallet_id.map(|id| id.to_string()))
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.amount.to_string())
        .bind(&transaction.currency)
        .bind(transaction.transaction_date.format("%Y-%m-%d").to_string())
        .bind(&transaction.description)
        .bind(&transaction.notes)
        .bind(transaction.status.as_str())
        .bind(transaction.created_at.to_rfc3339())
        .bind(transaction.updated_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut *conn)
        .await
        .context("Failed to insert transaction")?;
        Ok(())
    }

    /// Persist the mutable fields of an updated transaction. The type column
    /// is never rewritten.
    pub async fn update_transaction(
        conn: &mut SqliteConnection,
        transaction: &Transaction,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE transactions
            SET wallet_id = ?, category_id = ?, to_wallet_id = ?, amount = ?, currency = ?,
                transaction_date = ?, description = ?, notes = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(transaction.wallet_id.to_string())
        .bind(transaction.category_id.map(|id| id.to_string()))
        .bind(transaction.to_wallet_id.map(|id| id.to_string()))
        .bind(transaction.amount.to_string())
        .bind(&transaction.currency)
        .bind(transaction.transaction_date.format("%Y-%m-%d").to_string())
        .bind(&transaction.description)
        .bind(&transaction.notes)
        .bind(transaction.status.as_str())
        .bind(transaction.updated_at.map(|dt| dt.to_rfc3339()))
        .bind(transaction.id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to update transaction")?;
        Ok(())
    }

    pub async fn delete_transaction(
        conn: &mut SqliteConnection,
        id: TransactionId,
    ) -> Result<()> {
        sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await
            .context("Failed to delete transaction")?;
        Ok(())
    }

    pub async fn transaction_by_id(
        conn: &mut SqliteConnection,
        id: TransactionId,
    ) -> Result<Option<Transaction>> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch transaction")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        Self::transaction_by_id(&mut conn, id).await
    }

    /// List all transactions for a user, newest first.
    pub async fn list_transactions(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE user_id = ? ORDER BY transaction_date DESC, created_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// List transactions touching a wallet, as source or destination.
    pub async fn list_transactions_for_wallet(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
    ) -> Result<Vec<Transaction>> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE user_id = ? AND (wallet_id = ? OR to_wallet_id = ?) \
             ORDER BY transaction_date DESC, created_at DESC"
        );
        let wallet_id_str = wallet_id.to_string();
        let rows = sqlx::query(&query)
            .bind(user_id.to_string())
            .bind(&wallet_id_str)
            .bind(&wallet_id_str)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions for wallet")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    pub async fn recent_transactions(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Transaction>> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE user_id = ? ORDER BY transaction_date DESC, created_at DESC LIMIT ?"
        );
        let rows = sqlx::query(&query)
            .bind(user_id.to_string())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list recent transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    // ========================
    // Row mapping
    // ========================

    fn row_to_wallet(row: &sqlx::sqlite::SqliteRow) -> Result<Wallet> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");
        let wallet_type_str: String = row.get("wallet_type");
        let initial_balance_str: String = row.get("initial_balance");
        let current_balance_str: String = row.get("current_balance");
        let credit_limit_str: Option<String> = row.get("credit_limit");

        Ok(Wallet {
            id: Uuid::parse_str(&id_str).context("Invalid wallet ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            name: row.get("name"),
            description: row.get("description"),
            wallet_type: WalletType::from_str(&wallet_type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid wallet type: {}", wallet_type_str))?,
            currency: row.get("currency"),
            initial_balance: parse_stored_amount(&initial_balance_str)?,
            current_balance: parse_stored_amount(&current_balance_str)?,
            credit_limit: credit_limit_str
                .map(|s| parse_stored_amount(&s))
                .transpose()?,
            is_default: row.get::<i32, _>("is_default") != 0,
            excluded_from_total: row.get::<i32, _>("excluded_from_total") != 0,
            display_order: row.get("display_order"),
            transaction_count: row.get("transaction_count"),
            last_transaction_at: parse_optional_timestamp(row.get("last_transaction_at"))?,
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
            updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
            deleted_at: parse_optional_timestamp(row.get("deleted_at"))?,
            version: row.get("version"),
        })
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");
        let wallet_id_str: String = row.get("wallet_id");
        let category_id_str: Option<String> = row.get("category_id");
        let to_wallet_id_str: Option<String> = row.get("to_wallet_id");
        let type_str: String = row.get("transaction_type");
        let amount_str: String = row.get("amount");
        let date_str: String = row.get("transaction_date");
        let status_str: String = row.get("status");
        let updated_at_str: Option<String> = row.get("updated_at");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            wallet_id: Uuid::parse_str(&wallet_id_str).context("Invalid wallet ID")?,
            category_id: category_id_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid category ID")?,
            to_wallet_id: to_wallet_id_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid destination wallet ID")?,
            transaction_type: TransactionType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction type: {}", type_str))?,
            amount: parse_stored_amount(&amount_str)?,
            currency: row.get("currency"),
            transaction_date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                .context("Invalid transaction date")?,
            description: row.get("description"),
            notes: row.get("notes"),
            status: TransactionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction status: {}", status_str))?,
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
            updated_at: updated_at_str.map(|s| parse_timestamp(&s)).transpose()?,
        })
    }
}

fn parse_stored_amount(s: &str) -> Result<Amount> {
    s.parse::<Decimal>()
        .map_err(|_| anyhow::anyhow!("Invalid stored amount: {}", s))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .context("Invalid timestamp")?
        .with_timezone(&Utc))
}

fn parse_optional_timestamp(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_timestamp(&s)).transpose()
}
