use thiserror::Error;

use crate::domain::{Amount, TransactionRule};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Wallet already exists: {0}")]
    WalletAlreadyExists(String),

    #[error("Invalid wallet: {0}")]
    InvalidWallet(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionRule),

    #[error("Insufficient funds in wallet {wallet_name}: balance {balance}, required {required}")]
    InsufficientFunds {
        wallet_name: String,
        balance: Amount,
        required: Amount,
    },

    #[error(
        "Credit limit exceeded for wallet {wallet_name}: would owe {would_owe}, limit {credit_limit}"
    )]
    CreditLimitExceeded {
        wallet_name: String,
        would_owe: Amount,
        credit_limit: Amount,
    },

    #[error("Wallet {wallet_name} was modified concurrently, retry the operation")]
    ConcurrentModification { wallet_name: String },

    #[error("Currency mismatch between wallets: {from_currency} vs {to_currency}")]
    CurrencyMismatch {
        from_currency: String,
        to_currency: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
