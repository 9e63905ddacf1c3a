// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use moneta::application::{NewWallet, TransactionService, WalletService};
use moneta::domain::{Amount, UserId, Wallet, WalletType};
use moneta::storage::Repository;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

/// Services plus the acting user, backed by a temporary database.
pub struct TestApp {
    pub repo: Repository,
    pub wallets: WalletService,
    pub transactions: TransactionService,
    pub user: UserId,
}

/// Helper to create the services against a temporary database.
pub async fn test_app() -> Result<(TestApp, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.to_str().unwrap());
    let repo = Repository::init(&db_url).await?;
    let user = repo.local_user().await?;

    Ok((
        TestApp {
            repo: repo.clone(),
            wallets: WalletService::new(repo.clone()),
            transactions: TransactionService::new(repo),
            user,
        },
        temp_dir,
    ))
}

/// Helper to parse a date string into a NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// A fresh category reference, stands in for the out-of-scope taxonomy.
pub fn category() -> Uuid {
    Uuid::new_v4()
}

/// Wallet creation request with typical defaults.
pub fn new_wallet(name: &str, wallet_type: WalletType, balance: Amount) -> NewWallet {
    NewWallet {
        name: name.to_string(),
        wallet_type,
        currency: "EUR".to_string(),
        initial_balance: balance,
        credit_limit: None,
        description: None,
        is_default: false,
        excluded_from_total: false,
    }
}

impl TestApp {
    /// Create a wallet with defaults.
    pub async fn wallet(
        &self,
        name: &str,
        wallet_type: WalletType,
        balance: Amount,
    ) -> Result<Wallet> {
        Ok(self
            .wallets
            .create_wallet(self.user, new_wallet(name, wallet_type, balance))
            .await?)
    }

    /// Create a credit-card wallet with the given limit.
    pub async fn credit_card(&self, name: &str, limit: Amount) -> Result<Wallet> {
        let mut request = new_wallet(name, WalletType::CreditCard, Decimal::ZERO);
        request.credit_limit = Some(limit);
        Ok(self.wallets.create_wallet(self.user, request).await?)
    }

    /// Reload a wallet's current state.
    pub async fn balance_of(&self, wallet: &Wallet) -> Result<Amount> {
        Ok(self
            .wallets
            .get_wallet(self.user, wallet.id)
            .await?
            .current_balance)
    }
}
