use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Amount, UserId, WalletId};

pub type TransactionId = Uuid;
pub type CategoryId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money coming in
    Income,
    /// Money going out
    Expense,
    /// Movement between two wallets
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
            TransactionType::Transfer => "transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "income" => Some(TransactionType::Income),
            "expense" => Some(TransactionType::Expense),
            "transfer" => Some(TransactionType::Transfer),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

/// Structural rule violated while building or updating a transaction.
/// Checked before any wallet is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionRule {
    NonPositiveAmount,
    MissingCategory,
    MissingDestinationWallet,
    SameWalletTransfer,
}

impl std::fmt::Display for TransactionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionRule::NonPositiveAmount => write!(f, "amount must be positive"),
            TransactionRule::MissingCategory => {
                write!(f, "income and expense transactions require a category")
            }
            TransactionRule::MissingDestinationWallet => {
                write!(f, "transfers require a destination wallet")
            }
            TransactionRule::SameWalletTransfer => {
                write!(f, "transfers require two distinct wallets")
            }
        }
    }
}

impl std::error::Error for TransactionRule {}

/// An immutable record of a money movement affecting one or two wallets.
///
/// The type never changes once the record exists; updates go through
/// [`TransactionUpdate`], which carries no type field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    /// Source wallet: the wallet the effective amount applies to.
    pub wallet_id: WalletId,
    pub category_id: Option<CategoryId>,
    /// Destination wallet, transfers only.
    pub to_wallet_id: Option<WalletId>,
    pub transaction_type: TransactionType,
    /// Always strictly positive; the sign comes from the type.
    pub amount: Amount,
    pub currency: String,
    pub transaction_date: NaiveDate,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Changes applicable to an existing transaction. There is deliberately no
/// type field here: wallet references, amount, category, date and the
/// descriptive fields may change, the type may not.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub wallet_id: Option<WalletId>,
    pub to_wallet_id: Option<WalletId>,
    pub category_id: Option<CategoryId>,
    pub amount: Option<Amount>,
    pub transaction_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub notes: Option<String>,
}

impl Transaction {
    pub fn income(
        user_id: UserId,
        wallet_id: WalletId,
        category_id: CategoryId,
        amount: Amount,
        transaction_date: NaiveDate,
    ) -> Result<Self, TransactionRule> {
        Self::build(
            user_id,
            wallet_id,
            Some(category_id),
            None,
            TransactionType::Income,
            amount,
            transaction_date,
        )
    }

    pub fn expense(
        user_id: UserId,
        wallet_id: WalletId,
        category_id: CategoryId,
        amount: Amount,
        transaction_date: NaiveDate,
    ) -> Result<Self, TransactionRule> {
        Self::build(
            user_id,
            wallet_id,
            Some(category_id),
            None,
            TransactionType::Expense,
            amount,
            transaction_date,
        )
    }

    pub fn transfer(
        user_id: UserId,
        from_wallet_id: WalletId,
        to_wallet_id: WalletId,
        amount: Amount,
        transaction_date: NaiveDate,
    ) -> Result<Self, TransactionRule> {
        Self::build(
            user_id,
            from_wallet_id,
            None,
            Some(to_wallet_id),
            TransactionType::Transfer,
            amount,
            transaction_date,
        )
    }

    fn build(
        user_id: UserId,
        wallet_id: WalletId,
        category_id: Option<CategoryId>,
        to_wallet_id: Option<WalletId>,
        transaction_type: TransactionType,
        amount: Amount,
        transaction_date: NaiveDate,
    ) -> Result<Self, TransactionRule> {
        let transaction = Self {
            id: Uuid::new_v4(),
            user_id,
            wallet_id,
            category_id,
            to_wallet_id,
            transaction_type,
            amount,
            currency: "EUR".to_string(),
            transaction_date,
            description: None,
            notes: None,
            status: TransactionStatus::Completed,
            created_at: Utc::now(),
            updated_at: None,
        };
        transaction.validate()?;
        Ok(transaction)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn is_transfer(&self) -> bool {
        self.transaction_type == TransactionType::Transfer
    }

    /// The signed value this transaction contributes to its source wallet.
    /// The destination wallet of a transfer always receives `+amount`,
    /// independently of this function.
    pub fn effective_amount(&self) -> Amount {
        match self.transaction_type {
            TransactionType::Income => self.amount,
            TransactionType::Expense | TransactionType::Transfer => -self.amount,
        }
    }

    /// Produce the post-update record, revalidating the structural rules.
    /// `None` fields keep their current value; the type always carries over.
    pub fn apply_update(&self, update: TransactionUpdate) -> Result<Self, TransactionRule> {
        let to_wallet_id = if self.is_transfer() {
            update.to_wallet_id.or(self.to_wallet_id)
        } else {
            self.to_wallet_id
        };

        let updated = Self {
            wallet_id: update.wallet_id.unwrap_or(self.wallet_id),
            to_wallet_id,
            category_id: update.category_id.or(self.category_id),
            amount: update.amount.unwrap_or(self.amount),
            transaction_date: update.transaction_date.unwrap_or(self.transaction_date),
            description: update.description.or_else(|| self.description.clone()),
            notes: update.notes.or_else(|| self.notes.clone()),
            updated_at: Some(Utc::now()),
            ..self.clone()
        };
        updated.validate()?;
        Ok(updated)
    }

    fn validate(&self) -> Result<(), TransactionRule> {
        if self.amount <= Decimal::ZERO {
            return Err(TransactionRule::NonPositiveAmount);
        }
        match self.transaction_type {
            TransactionType::Transfer => match self.to_wallet_id {
                None => return Err(TransactionRule::MissingDestinationWallet),
                Some(to) if to == self.wallet_id => {
                    return Err(TransactionRule::SameWalletTransfer);
                }
                Some(_) => {}
            },
            TransactionType::Income | TransactionType::Expense => {
                if self.category_id.is_none() {
                    return Err(TransactionRule::MissingCategory);
                }
            }
        }
        Ok(())
    }
}
