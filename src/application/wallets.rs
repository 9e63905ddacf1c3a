use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::domain::{Amount, UserId, Wallet, WalletId, WalletType};
use crate::storage::Repository;

use super::AppError;

/// Request to create a wallet.
pub struct NewWallet {
    pub name: String,
    pub wallet_type: WalletType,
    pub currency: String,
    pub initial_balance: Amount,
    pub credit_limit: Option<Amount>,
    pub description: Option<String>,
    pub is_default: bool,
    pub excluded_from_total: bool,
}

/// Changes applicable to an existing wallet's descriptive fields.
/// `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct WalletChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub display_order: Option<i32>,
    pub excluded_from_total: Option<bool>,
}

/// Wallet lifecycle and administration: creation with the unique-name and
/// single-default invariants, soft deletion, default and credit-limit
/// management. Balance mutation lives in [`super::TransactionService`].
pub struct WalletService {
    repo: Repository,
}

impl WalletService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a new wallet.
    ///
    /// The user's first wallet is forced default regardless of the request;
    /// afterwards a requested default unseats the previous one atomically.
    pub async fn create_wallet(
        &self,
        user_id: UserId,
        request: NewWallet,
    ) -> Result<Wallet, AppError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidWallet("wallet name is required".into()));
        }

        let mut uow = self.repo.begin().await?;

        let existing = Repository::wallets_by_user(uow.conn(), user_id).await?;
        if existing.iter().any(|w| w.name.eq_ignore_ascii_case(&name)) {
            return Err(AppError::WalletAlreadyExists(name));
        }

        let is_first_wallet = existing.is_empty();
        let should_be_default = is_first_wallet || request.is_default;
        if should_be_default && !is_first_wallet {
            if let Some(previous) = existing.into_iter().find(|w| w.is_default) {
                info!(wallet_id = %previous.id, "Removing default status from wallet");
                persist_wallet(uow.conn(), &previous.set_default(false)).await?;
            }
        }

        let mut wallet = Wallet::new(
            user_id,
            name,
            request.wallet_type,
            request.currency,
            request.initial_balance,
        )
        .with_excluded_from_total(request.excluded_from_total);
        if let Some(description) = request.description {
            wallet = wallet.with_description(description);
        }
        if let Some(limit) = request.credit_limit {
            wallet = wallet.with_credit_limit(limit);
        }
        if should_be_default {
            wallet = wallet.set_default(true);
        }

        Repository::insert_wallet(uow.conn(), &wallet).await?;
        uow.commit().await?;

        info!(
            wallet_id = %wallet.id,
            user_id = %user_id,
            is_default = wallet.is_default,
            "Created wallet"
        );
        Ok(wallet)
    }

    /// Get a live wallet by ID.
    pub async fn get_wallet(&self, user_id: UserId, id: WalletId) -> Result<Wallet, AppError> {
        debug!(wallet_id = %id, "Fetching wallet");
        self.repo
            .get_wallet(id)
            .await?
            .filter(|w| w.user_id == user_id && w.is_active())
            .ok_or_else(|| AppError::WalletNotFound(id.to_string()))
    }

    /// Get a live wallet by its (case-insensitive) name.
    pub async fn get_wallet_by_name(
        &self,
        user_id: UserId,
        name: &str,
    ) -> Result<Wallet, AppError> {
        self.repo
            .list_wallets(user_id)
            .await?
            .into_iter()
            .find(|w| w.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| AppError::WalletNotFound(name.to_string()))
    }

    /// List the user's live wallets.
    pub async fn list_wallets(&self, user_id: UserId) -> Result<Vec<Wallet>, AppError> {
        debug!(user_id = %user_id, "Listing wallets");
        Ok(self.repo.list_wallets(user_id).await?)
    }

    /// The user's default wallet, if any.
    pub async fn default_wallet(&self, user_id: UserId) -> Result<Option<Wallet>, AppError> {
        Ok(self.repo.find_default_wallet(user_id).await?)
    }

    /// Update descriptive fields; a rename re-checks name uniqueness.
    pub async fn update_wallet(
        &self,
        user_id: UserId,
        id: WalletId,
        changes: WalletChanges,
    ) -> Result<Wallet, AppError> {
        let mut uow = self.repo.begin().await?;
        let wallet = load_live_wallet(uow.conn(), user_id, id).await?;

        if let Some(new_name) = &changes.name {
            let new_name = new_name.trim();
            if new_name.is_empty() {
                return Err(AppError::InvalidWallet("wallet name is required".into()));
            }
            if !wallet.name.eq_ignore_ascii_case(new_name)
                && Repository::wallet_name_exists(uow.conn(), user_id, new_name).await?
            {
                return Err(AppError::WalletAlreadyExists(new_name.to_string()));
            }
        }

        let updated = wallet.update_details(
            changes.name.map(|n| n.trim().to_string()),
            changes.description,
            changes.display_order,
            changes.excluded_from_total,
        );
        persist_wallet(uow.conn(), &updated).await?;
        uow.commit().await?;

        info!(wallet_id = %id, "Updated wallet");
        Ok(updated)
    }

    /// Soft-delete a wallet. The record stays in the store but disappears
    /// from every listing, lookup and balance query.
    pub async fn delete_wallet(&self, user_id: UserId, id: WalletId) -> Result<(), AppError> {
        let mut uow = self.repo.begin().await?;
        let wallet = load_live_wallet(uow.conn(), user_id, id).await?;

        persist_wallet(uow.conn(), &wallet.mark_deleted()).await?;
        uow.commit().await?;

        info!(wallet_id = %id, "Soft-deleted wallet");
        Ok(())
    }

    /// Set or unset the default flag. Setting unseats any other default for
    /// the user within the same unit of work.
    pub async fn set_default_wallet(
        &self,
        user_id: UserId,
        id: WalletId,
        is_default: bool,
    ) -> Result<Wallet, AppError> {
        let mut uow = self.repo.begin().await?;
        let wallet = load_live_wallet(uow.conn(), user_id, id).await?;

        if is_default {
            if let Some(previous) = Repository::default_wallet(uow.conn(), user_id)
                .await?
                .filter(|w| w.id != id)
            {
                persist_wallet(uow.conn(), &previous.set_default(false)).await?;
            }
        }

        let updated = wallet.set_default(is_default);
        persist_wallet(uow.conn(), &updated).await?;
        uow.commit().await?;

        info!(wallet_id = %id, is_default, "Changed default wallet status");
        Ok(updated)
    }

    /// Update the credit limit of a credit-card wallet.
    pub async fn update_credit_limit(
        &self,
        user_id: UserId,
        id: WalletId,
        new_limit: Amount,
    ) -> Result<Wallet, AppError> {
        let mut uow = self.repo.begin().await?;
        let wallet = load_live_wallet(uow.conn(), user_id, id).await?;

        let updated = wallet
            .update_credit_limit(new_limit)
            .map_err(|e| AppError::InvalidWallet(e.to_string()))?;
        persist_wallet(uow.conn(), &updated).await?;
        uow.commit().await?;

        info!(wallet_id = %id, "Updated credit limit");
        Ok(updated)
    }

    /// Sum of current balances over live wallets not excluded from totals.
    pub async fn total_balance(&self, user_id: UserId) -> Result<Amount, AppError> {
        debug!(user_id = %user_id, "Calculating total balance");
        let wallets = self.repo.list_wallets(user_id).await?;
        Ok(wallets
            .iter()
            .filter(|w| !w.excluded_from_total)
            .map(|w| w.current_balance)
            .fold(Decimal::ZERO, |acc, balance| acc + balance))
    }
}

/// Load a wallet that must exist, belong to the user, and not be deleted.
pub(crate) async fn load_live_wallet(
    conn: &mut SqliteConnection,
    user_id: UserId,
    id: WalletId,
) -> Result<Wallet, AppError> {
    Repository::wallet_by_id(conn, id)
        .await?
        .filter(|w| w.user_id == user_id && w.is_active())
        .ok_or_else(|| AppError::WalletNotFound(id.to_string()))
}

/// Persist a wallet snapshot, surfacing a version conflict as
/// `ConcurrentModification`. The caller retries the whole operation.
pub(crate) async fn persist_wallet(
    conn: &mut SqliteConnection,
    wallet: &Wallet,
) -> Result<(), AppError> {
    if !Repository::update_wallet(conn, wallet).await? {
        return Err(AppError::ConcurrentModification {
            wallet_name: wallet.name.clone(),
        });
    }
    Ok(())
}
