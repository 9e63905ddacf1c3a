use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Amount;

pub type WalletId = Uuid;
pub type UserId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    /// Physical cash
    Cash,
    /// Traditional bank account
    BankAccount,
    /// Credit card - the only type whose balance may go negative
    CreditCard,
    /// Investment account (stocks, bonds, etc.)
    Investment,
    /// Savings account
    Savings,
    /// Digital wallet (PayPal, Venmo, etc.)
    DigitalWallet,
    /// Anything not covered by the above
    Other,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Cash => "cash",
            WalletType::BankAccount => "bank_account",
            WalletType::CreditCard => "credit_card",
            WalletType::Investment => "investment",
            WalletType::Savings => "savings",
            WalletType::DigitalWallet => "digital_wallet",
            WalletType::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cash" => Some(WalletType::Cash),
            "bank_account" => Some(WalletType::BankAccount),
            "credit_card" => Some(WalletType::CreditCard),
            "investment" => Some(WalletType::Investment),
            "savings" => Some(WalletType::Savings),
            "digital_wallet" => Some(WalletType::DigitalWallet),
            "other" => Some(WalletType::Other),
            _ => None,
        }
    }

    pub fn is_credit_card(&self) -> bool {
        matches!(self, WalletType::CreditCard)
    }
}

impl std::fmt::Display for WalletType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure of a balance mutation. The wallet is left untouched; `apply_delta`
/// returns a fresh snapshot only on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    /// A non-credit-card wallet would have gone negative.
    InsufficientFunds { balance: Amount, delta: Amount },
    /// A credit-card wallet would have owed more than its credit limit.
    CreditLimitExceeded {
        would_owe: Amount,
        credit_limit: Amount,
    },
}

impl std::fmt::Display for BalanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalanceError::InsufficientFunds { balance, delta } => {
                write!(
                    f,
                    "insufficient funds: balance {} cannot absorb {}",
                    balance, delta
                )
            }
            BalanceError::CreditLimitExceeded {
                would_owe,
                credit_limit,
            } => {
                write!(
                    f,
                    "credit limit exceeded: would owe {} against a limit of {}",
                    would_owe, credit_limit
                )
            }
        }
    }
}

impl std::error::Error for BalanceError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletRule {
    /// Credit limits only exist on credit-card wallets.
    CreditLimitNotAllowed,
}

impl std::fmt::Display for WalletRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletRule::CreditLimitNotAllowed => {
                write!(f, "only credit-card wallets can have a credit limit")
            }
        }
    }
}

impl std::error::Error for WalletRule {}

/// A named monetary account with a type-specific balance constraint.
///
/// Wallets are immutable value types: every state transition returns a new
/// snapshot, and `apply_delta`/`reverse_delta` are the only operations that
/// change the balance. Persistence of a snapshot is the caller's
/// responsibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub wallet_type: WalletType,
    pub currency: String,
    pub initial_balance: Amount,
    pub current_balance: Amount,
    /// Present only for credit-card wallets, always >= 0.
    pub credit_limit: Option<Amount>,
    pub is_default: bool,
    pub excluded_from_total: bool,
    pub display_order: i32,
    pub transaction_count: i64,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency stamp, bumped by the store on every write.
    pub version: i64,
}

impl Wallet {
    pub fn new(
        user_id: UserId,
        name: String,
        wallet_type: WalletType,
        currency: String,
        initial_balance: Amount,
    ) -> Self {
        // Non-credit-card wallets never start below zero; credit cards start
        // with a zero limit until one is set.
        let initial_balance = if !wallet_type.is_credit_card() && initial_balance < Decimal::ZERO {
            Decimal::ZERO
        } else {
            initial_balance
        };
        let credit_limit = wallet_type.is_credit_card().then_some(Decimal::ZERO);
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            description: None,
            wallet_type,
            currency,
            initial_balance,
            current_balance: initial_balance,
            credit_limit,
            is_default: false,
            excluded_from_total: false,
            display_order: 0,
            transaction_count: 0,
            last_transaction_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Ignored for wallet types that have no credit limit.
    pub fn with_credit_limit(mut self, limit: Amount) -> Self {
        if self.wallet_type.is_credit_card() {
            self.credit_limit = Some(limit.max(Decimal::ZERO));
        }
        self
    }

    pub fn with_excluded_from_total(mut self, excluded: bool) -> Self {
        self.excluded_from_total = excluded;
        self
    }

    pub fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = order;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Active is always the logical negation of deleted.
    pub fn is_active(&self) -> bool {
        !self.is_deleted()
    }

    pub fn is_credit_card(&self) -> bool {
        self.wallet_type.is_credit_card()
    }

    fn credit_limit_or_zero(&self) -> Amount {
        self.credit_limit.unwrap_or(Decimal::ZERO)
    }

    fn checked_balance(&self, delta: Amount) -> Result<Amount, BalanceError> {
        let new_balance = self.current_balance + delta;

        if !self.is_credit_card() {
            if new_balance < Decimal::ZERO {
                return Err(BalanceError::InsufficientFunds {
                    balance: self.current_balance,
                    delta,
                });
            }
        } else if -new_balance > self.credit_limit_or_zero() {
            return Err(BalanceError::CreditLimitExceeded {
                would_owe: -new_balance,
                credit_limit: self.credit_limit_or_zero(),
            });
        }

        Ok(new_balance)
    }

    /// Apply a signed delta to the balance, enforcing the per-type guards.
    ///
    /// This is the only sanctioned way a transaction's effect reaches a
    /// balance: every higher-level flow (create, update, delete, transfer -
    /// source debits and destination credits alike) routes through it or
    /// through [`Wallet::reverse_delta`], its undo counterpart.
    pub fn apply_delta(
        &self,
        delta: Amount,
        occurred_at: DateTime<Utc>,
    ) -> Result<Wallet, BalanceError> {
        let new_balance = self.checked_balance(delta)?;

        Ok(Wallet {
            current_balance: new_balance,
            transaction_count: self.transaction_count + 1,
            last_transaction_at: Some(occurred_at),
            updated_at: Utc::now(),
            ..self.clone()
        })
    }

    /// Undo a previously applied delta, under the same guards.
    ///
    /// The transaction counter goes back down and the last-transaction
    /// timestamp stays put: an undo is not a transaction of its own.
    pub fn reverse_delta(&self, delta: Amount) -> Result<Wallet, BalanceError> {
        let new_balance = self.checked_balance(-delta)?;

        Ok(Wallet {
            current_balance: new_balance,
            transaction_count: (self.transaction_count - 1).max(0),
            updated_at: Utc::now(),
            ..self.clone()
        })
    }

    pub fn set_default(&self, is_default: bool) -> Wallet {
        Wallet {
            is_default,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Soft delete: the wallet stays in the store but disappears from every
    /// listing, lookup and balance query.
    pub fn mark_deleted(&self) -> Wallet {
        let now = Utc::now();
        Wallet {
            deleted_at: Some(now),
            is_default: false,
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn update_credit_limit(&self, new_limit: Amount) -> Result<Wallet, WalletRule> {
        if !self.is_credit_card() {
            return Err(WalletRule::CreditLimitNotAllowed);
        }
        Ok(Wallet {
            credit_limit: Some(new_limit.max(Decimal::ZERO)),
            updated_at: Utc::now(),
            ..self.clone()
        })
    }

    /// Update descriptive fields; `None` keeps the current value.
    pub fn update_details(
        &self,
        name: Option<String>,
        description: Option<String>,
        display_order: Option<i32>,
        excluded_from_total: Option<bool>,
    ) -> Wallet {
        Wallet {
            name: name.unwrap_or_else(|| self.name.clone()),
            description: description.or_else(|| self.description.clone()),
            display_order: display_order.unwrap_or(self.display_order),
            excluded_from_total: excluded_from_total.unwrap_or(self.excluded_from_total),
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}
