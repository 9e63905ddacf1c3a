use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::domain::{
    Amount, BalanceError, Transaction, TransactionId, TransactionUpdate, UserId, Wallet, WalletId,
};
use crate::storage::Repository;

use super::wallets::{load_live_wallet, persist_wallet};
use super::AppError;

/// The ledger orchestrator: coordinates multi-wallet mutation for
/// create/update/delete of transactions.
///
/// Every operation runs inside one unit of work; wallet balance writes and
/// the transaction write commit or roll back together. Balances only ever
/// change through [`Wallet::apply_delta`] and [`Wallet::reverse_delta`], so
/// the per-type guards cannot be bypassed.
pub struct TransactionService {
    repo: Repository,
}

impl TransactionService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Record a new transaction and apply its effect to the wallet(s).
    pub async fn create_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<Transaction, AppError> {
        info!(
            transaction_type = %transaction.transaction_type,
            user_id = %transaction.user_id,
            "Creating transaction"
        );

        let mut uow = self.repo.begin().await?;
        apply_effect(uow.conn(), &transaction).await?;
        Repository::insert_transaction(uow.conn(), &transaction).await?;
        uow.commit().await?;

        info!(transaction_id = %transaction.id, "Created transaction and updated wallet balances");
        Ok(transaction)
    }

    /// Update a transaction: reverse the old effect, then apply the new one
    /// from freshly-read wallet state. Up to four wallet writes when the
    /// wallet references change. The transaction type never changes; the
    /// update value carries no type field.
    pub async fn update_transaction(
        &self,
        user_id: UserId,
        id: TransactionId,
        update: TransactionUpdate,
    ) -> Result<Transaction, AppError> {
        info!(transaction_id = %id, "Updating transaction");

        let mut uow = self.repo.begin().await?;
        let existing = Repository::transaction_by_id(uow.conn(), id)
            .await?
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))?;

        // Fails fast before any wallet is touched.
        let updated = existing.apply_update(update)?;

        reverse_effect(uow.conn(), &existing).await?;
        apply_effect(uow.conn(), &updated).await?;
        Repository::update_transaction(uow.conn(), &updated).await?;
        uow.commit().await?;

        info!(transaction_id = %id, "Updated transaction and adjusted wallet balances");
        Ok(updated)
    }

    /// Delete a transaction, reversing its effect on the wallet(s).
    pub async fn delete_transaction(
        &self,
        user_id: UserId,
        id: TransactionId,
    ) -> Result<(), AppError> {
        info!(transaction_id = %id, "Deleting transaction");

        let mut uow = self.repo.begin().await?;
        let transaction = Repository::transaction_by_id(uow.conn(), id)
            .await?
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))?;

        reverse_effect(uow.conn(), &transaction).await?;
        Repository::delete_transaction(uow.conn(), id).await?;
        uow.commit().await?;

        info!(transaction_id = %id, "Deleted transaction and adjusted wallet balances");
        Ok(())
    }

    /// Move money between two wallets of the same user.
    ///
    /// This is a thin wrapper over the transaction create path, so transfers
    /// share the guarded balance primitive with every other flow.
    pub async fn transfer(
        &self,
        user_id: UserId,
        from_wallet_id: WalletId,
        to_wallet_id: WalletId,
        amount: Amount,
        transaction_date: NaiveDate,
        description: Option<String>,
    ) -> Result<Transaction, AppError> {
        let mut transaction =
            Transaction::transfer(user_id, from_wallet_id, to_wallet_id, amount, transaction_date)?;
        if let Some(description) = description {
            transaction = transaction.with_description(description);
        }
        self.create_transaction(transaction).await
    }

    /// Get a transaction by ID.
    pub async fn get_transaction(
        &self,
        user_id: UserId,
        id: TransactionId,
    ) -> Result<Transaction, AppError> {
        debug!(transaction_id = %id, "Fetching transaction");
        self.repo
            .get_transaction(id)
            .await?
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))
    }

    /// List all of the user's transactions, newest first.
    pub async fn list_transactions(&self, user_id: UserId) -> Result<Vec<Transaction>, AppError> {
        debug!(user_id = %user_id, "Listing transactions");
        Ok(self.repo.list_transactions(user_id).await?)
    }

    /// List transactions touching a wallet, as source or destination.
    pub async fn list_wallet_transactions(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
    ) -> Result<Vec<Transaction>, AppError> {
        debug!(wallet_id = %wallet_id, "Listing wallet transactions");
        Ok(self
            .repo
            .list_transactions_for_wallet(user_id, wallet_id)
            .await?)
    }

    /// The user's most recent transactions.
    pub async fn recent_transactions(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Transaction>, AppError> {
        debug!(user_id = %user_id, limit, "Listing recent transactions");
        Ok(self.repo.recent_transactions(user_id, limit).await?)
    }
}

/// Apply a transaction's effect: credit the destination first (transfers),
/// then apply the signed effective amount to the source wallet. Wallets are
/// read fresh from the store so earlier writes in the same unit of work are
/// visible.
async fn apply_effect(
    conn: &mut SqliteConnection,
    transaction: &Transaction,
) -> Result<(), AppError> {
    let source = load_live_wallet(conn, transaction.user_id, transaction.wallet_id).await?;

    if let Some(to_wallet_id) = transaction.to_wallet_id {
        let destination = load_live_wallet(conn, transaction.user_id, to_wallet_id).await?;
        if destination.currency != source.currency {
            return Err(AppError::CurrencyMismatch {
                from_currency: source.currency,
                to_currency: destination.currency,
            });
        }
        let credited = destination
            .apply_delta(transaction.amount, Utc::now())
            .map_err(|e| balance_error(&destination, e))?;
        persist_wallet(conn, &credited).await?;
    }

    let debited = source
        .apply_delta(transaction.effective_amount(), Utc::now())
        .map_err(|e| balance_error(&source, e))?;
    persist_wallet(conn, &debited).await?;
    Ok(())
}

/// Undo a transaction's effect by applying the negated amounts. Reversal
/// reaches soft-deleted wallets too: hiding a wallet must not strand the
/// balance effects of its history.
async fn reverse_effect(
    conn: &mut SqliteConnection,
    transaction: &Transaction,
) -> Result<(), AppError> {
    let source = load_wallet_any(conn, transaction.user_id, transaction.wallet_id).await?;
    let reverted = source
        .reverse_delta(transaction.effective_amount())
        .map_err(|e| balance_error(&source, e))?;
    persist_wallet(conn, &reverted).await?;

    if let Some(to_wallet_id) = transaction.to_wallet_id {
        let destination = load_wallet_any(conn, transaction.user_id, to_wallet_id).await?;
        let reverted = destination
            .reverse_delta(transaction.amount)
            .map_err(|e| balance_error(&destination, e))?;
        persist_wallet(conn, &reverted).await?;
    }
    Ok(())
}

/// Load a wallet regardless of its soft-delete state (reversals only).
async fn load_wallet_any(
    conn: &mut SqliteConnection,
    user_id: UserId,
    id: WalletId,
) -> Result<Wallet, AppError> {
    Repository::wallet_by_id(conn, id)
        .await?
        .filter(|w| w.user_id == user_id)
        .ok_or_else(|| AppError::WalletNotFound(id.to_string()))
}

fn balance_error(wallet: &Wallet, err: BalanceError) -> AppError {
    match err {
        BalanceError::InsufficientFunds { balance, delta } => AppError::InsufficientFunds {
            wallet_name: wallet.name.clone(),
            balance,
            required: -delta,
        },
        BalanceError::CreditLimitExceeded {
            would_owe,
            credit_limit,
        } => AppError::CreditLimitExceeded {
            wallet_name: wallet.name.clone(),
            would_owe,
            credit_limit,
        },
    }
}
