use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{
    NewWallet, TransactionService, WalletChanges, WalletService,
};
use crate::domain::{
    format_amount, parse_amount, Transaction, TransactionUpdate, UserId, WalletType,
};
use crate::storage::Repository;

/// Moneta - Personal Finance Tracker
#[derive(Parser)]
#[command(name = "moneta")]
#[command(about = "A local-first personal finance tracker with balance-consistent wallets")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "moneta.db")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Wallet management commands
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Record an income transaction
    Income {
        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Wallet name (defaults to the default wallet)
        #[arg(short, long)]
        wallet: Option<String>,

        /// Category ID
        #[arg(short, long)]
        category: String,

        /// Date of the transaction (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Description
        #[arg(long)]
        description: Option<String>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Record an expense transaction
    Expense {
        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Wallet name (defaults to the default wallet)
        #[arg(short, long)]
        wallet: Option<String>,

        /// Category ID
        #[arg(short, long)]
        category: String,

        /// Date of the transaction (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Description
        #[arg(long)]
        description: Option<String>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Move money between two wallets
    Transfer {
        /// Amount to transfer
        amount: String,

        /// Source wallet name
        #[arg(long)]
        from: String,

        /// Destination wallet name
        #[arg(long)]
        to: String,

        /// Date of the transfer (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Description
        #[arg(long)]
        description: Option<String>,
    },

    /// List transactions
    Transactions {
        /// Filter by wallet name
        #[arg(long)]
        wallet: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Edit an existing transaction (its type never changes)
    Edit {
        /// Transaction ID
        id: String,

        /// New amount
        #[arg(long)]
        amount: Option<String>,

        /// New wallet name
        #[arg(long)]
        wallet: Option<String>,

        /// New destination wallet name (transfers only)
        #[arg(long)]
        to: Option<String>,

        /// New category ID
        #[arg(long)]
        category: Option<String>,

        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// New notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a transaction, reversing its effect on the wallet(s)
    Remove {
        /// Transaction ID
        id: String,
    },

    /// Show balance for a wallet or all wallets
    Balance {
        /// Wallet name (omit for all wallets)
        wallet: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Create a new wallet
    Create {
        /// Wallet name (must be unique)
        name: String,

        /// Wallet type: cash, bank_account, credit_card, investment, savings,
        /// digital_wallet, other
        #[arg(short = 't', long = "type")]
        wallet_type: String,

        /// Currency code (e.g., EUR, USD)
        #[arg(short, long, default_value = "EUR")]
        currency: String,

        /// Opening balance
        #[arg(short, long, default_value = "0")]
        balance: String,

        /// Credit limit (credit cards only)
        #[arg(long)]
        credit_limit: Option<String>,

        /// Description
        #[arg(long)]
        description: Option<String>,

        /// Make this the default wallet
        #[arg(long)]
        default: bool,

        /// Exclude this wallet from the total balance
        #[arg(long)]
        exclude_from_total: bool,
    },

    /// List all wallets
    List,

    /// Show detailed wallet information
    Show {
        /// Wallet name
        name: String,
    },

    /// Rename a wallet
    Rename {
        /// Current wallet name
        name: String,

        /// New wallet name
        new_name: String,
    },

    /// Delete a wallet (soft delete)
    Delete {
        /// Wallet name
        name: String,
    },

    /// Make a wallet the default
    SetDefault {
        /// Wallet name
        name: String,
    },

    /// Set the credit limit of a credit-card wallet
    CreditLimit {
        /// Wallet name
        name: String,

        /// New credit limit
        limit: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                let db_url = format!("sqlite:{}?mode=rwc", self.database);
                let repo = Repository::init(&db_url).await?;
                repo.local_user().await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Wallet(wallet_cmd) => {
                let (wallets, _, user) = connect(&self.database).await?;
                run_wallet_command(&wallets, user, wallet_cmd).await?;
            }

            Commands::Income {
                amount,
                wallet,
                category,
                date,
                description,
                notes,
            } => {
                let (wallets, transactions, user) = connect(&self.database).await?;
                let wallet = resolve_wallet(&wallets, user, wallet.as_deref()).await?;
                let amount = parse_amount(&amount).context("Invalid amount format")?;
                let category = parse_id(&category).context("Invalid category ID")?;

                let mut transaction =
                    Transaction::income(user, wallet.id, category, amount, parse_date_or_today(date.as_deref())?)?
                        .with_currency(wallet.currency.clone());
                if let Some(description) = description {
                    transaction = transaction.with_description(description);
                }
                if let Some(notes) = notes {
                    transaction = transaction.with_notes(notes);
                }

                let created = transactions.create_transaction(transaction).await?;
                println!(
                    "Recorded income: {} into {} ({})",
                    format_amount(created.amount),
                    wallet.name,
                    created.id
                );
            }

            Commands::Expense {
                amount,
                wallet,
                category,
                date,
                description,
                notes,
            } => {
                let (wallets, transactions, user) = connect(&self.database).await?;
                let wallet = resolve_wallet(&wallets, user, wallet.as_deref()).await?;
                let amount = parse_amount(&amount).context("Invalid amount format")?;
                let category = parse_id(&category).context("Invalid category ID")?;

                let mut transaction =
                    Transaction::expense(user, wallet.id, category, amount, parse_date_or_today(date.as_deref())?)?
                        .with_currency(wallet.currency.clone());
                if let Some(description) = description {
                    transaction = transaction.with_description(description);
                }
                if let Some(notes) = notes {
                    transaction = transaction.with_notes(notes);
                }

                let created = transactions.create_transaction(transaction).await?;
                println!(
                    "Recorded expense: {} from {} ({})",
                    format_amount(created.amount),
                    wallet.name,
                    created.id
                );
            }

            Commands::Transfer {
                amount,
                from,
                to,
                date,
                description,
            } => {
                let (wallets, transactions, user) = connect(&self.database).await?;
                let from_wallet = wallets.get_wallet_by_name(user, &from).await?;
                let to_wallet = wallets.get_wallet_by_name(user, &to).await?;
                let amount = parse_amount(&amount).context("Invalid amount format")?;

                let created = transactions
                    .transfer(
                        user,
                        from_wallet.id,
                        to_wallet.id,
                        amount,
                        parse_date_or_today(date.as_deref())?,
                        description,
                    )
                    .await?;
                println!(
                    "Recorded transfer: {} {} -> {} ({})",
                    format_amount(created.amount),
                    from_wallet.name,
                    to_wallet.name,
                    created.id
                );
            }

            Commands::Transactions { wallet, limit } => {
                let (wallets, transactions, user) = connect(&self.database).await?;
                let list = match wallet {
                    Some(name) => {
                        let wallet = wallets.get_wallet_by_name(user, &name).await?;
                        transactions.list_wallet_transactions(user, wallet.id).await?
                    }
                    None => match limit {
                        Some(limit) => transactions.recent_transactions(user, limit).await?,
                        None => transactions.list_transactions(user).await?,
                    },
                };

                if list.is_empty() {
                    println!("No transactions found.");
                } else {
                    println!("{:<12} {:<10} {:>12}  {}", "DATE", "TYPE", "AMOUNT", "DESCRIPTION");
                    println!("{}", "-".repeat(60));
                    for transaction in &list {
                        println!(
                            "{:<12} {:<10} {:>12}  {}",
                            transaction.transaction_date,
                            transaction.transaction_type.as_str(),
                            format_amount(transaction.amount),
                            transaction.description.as_deref().unwrap_or("")
                        );
                    }
                    println!();
                    println!("{} transaction(s)", list.len());
                }
            }

            Commands::Edit {
                id,
                amount,
                wallet,
                to,
                category,
                date,
                description,
                notes,
            } => {
                let (wallets, transactions, user) = connect(&self.database).await?;
                let id = parse_id(&id).context("Invalid transaction ID")?;

                let wallet_id = match wallet {
                    Some(name) => Some(wallets.get_wallet_by_name(user, &name).await?.id),
                    None => None,
                };
                let to_wallet_id = match to {
                    Some(name) => Some(wallets.get_wallet_by_name(user, &name).await?.id),
                    None => None,
                };

                let update = TransactionUpdate {
                    wallet_id,
                    to_wallet_id,
                    category_id: category
                        .map(|c| parse_id(&c))
                        .transpose()
                        .context("Invalid category ID")?,
                    amount: amount
                        .map(|a| parse_amount(&a))
                        .transpose()
                        .context("Invalid amount format")?,
                    transaction_date: date
                        .map(|d| parse_date(&d))
                        .transpose()?,
                    description,
                    notes,
                };

                let updated = transactions.update_transaction(user, id, update).await?;
                println!(
                    "Updated transaction: {} {} ({})",
                    updated.transaction_type.as_str(),
                    format_amount(updated.amount),
                    updated.id
                );
            }

            Commands::Remove { id } => {
                let (_, transactions, user) = connect(&self.database).await?;
                let id = parse_id(&id).context("Invalid transaction ID")?;
                transactions.delete_transaction(user, id).await?;
                println!("Deleted transaction: {}", id);
            }

            Commands::Balance { wallet } => {
                let (wallets, _, user) = connect(&self.database).await?;
                match wallet {
                    Some(name) => {
                        let wallet = wallets.get_wallet_by_name(user, &name).await?;
                        println!(
                            "{}: {} {}",
                            wallet.name,
                            format_amount(wallet.current_balance),
                            wallet.currency
                        );
                    }
                    None => {
                        let all = wallets.list_wallets(user).await?;
                        if all.is_empty() {
                            println!("No wallets found.");
                        } else {
                            for wallet in &all {
                                let marker = if wallet.is_default { "*" } else { " " };
                                println!(
                                    "{} {:<20} {:>12} {}",
                                    marker,
                                    wallet.name,
                                    format_amount(wallet.current_balance),
                                    wallet.currency
                                );
                            }
                            let total = wallets.total_balance(user).await?;
                            println!();
                            println!("  {:<20} {:>12}", "TOTAL", format_amount(total));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

async fn connect(database: &str) -> Result<(WalletService, TransactionService, UserId)> {
    let repo = Repository::connect(&format!("sqlite:{}", database)).await?;
    let user = repo.local_user().await?;
    Ok((
        WalletService::new(repo.clone()),
        TransactionService::new(repo),
        user,
    ))
}

async fn run_wallet_command(
    service: &WalletService,
    user: UserId,
    cmd: WalletCommands,
) -> Result<()> {
    match cmd {
        WalletCommands::Create {
            name,
            wallet_type,
            currency,
            balance,
            credit_limit,
            description,
            default,
            exclude_from_total,
        } => {
            let wallet_type = WalletType::from_str(&wallet_type).ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid wallet type '{}'. Valid types: cash, bank_account, credit_card, \
                     investment, savings, digital_wallet, other",
                    wallet_type
                )
            })?;
            let initial_balance = parse_amount(&balance).context("Invalid balance format")?;
            let credit_limit = credit_limit
                .map(|l| parse_amount(&l))
                .transpose()
                .context("Invalid credit limit format")?;

            let wallet = service
                .create_wallet(
                    user,
                    NewWallet {
                        name,
                        wallet_type,
                        currency,
                        initial_balance,
                        credit_limit,
                        description,
                        is_default: default,
                        excluded_from_total: exclude_from_total,
                    },
                )
                .await?;
            println!("Created wallet: {} ({})", wallet.name, wallet.wallet_type);
        }

        WalletCommands::List => {
            let wallets = service.list_wallets(user).await?;
            if wallets.is_empty() {
                println!("No wallets found.");
            } else {
                println!(
                    "{:<20} {:<14} {:<8} {:>12}  {}",
                    "NAME", "TYPE", "CURRENCY", "BALANCE", "DEFAULT"
                );
                println!("{}", "-".repeat(64));
                for wallet in wallets {
                    println!(
                        "{:<20} {:<14} {:<8} {:>12}  {}",
                        wallet.name,
                        wallet.wallet_type,
                        wallet.currency,
                        format_amount(wallet.current_balance),
                        if wallet.is_default { "yes" } else { "" }
                    );
                }
            }
        }

        WalletCommands::Show { name } => {
            let wallet = service.get_wallet_by_name(user, &name).await?;
            println!("Wallet: {}", wallet.name);
            println!("  ID:            {}", wallet.id);
            println!("  Type:          {}", wallet.wallet_type);
            println!("  Currency:      {}", wallet.currency);
            println!(
                "  Balance:       {} {}",
                format_amount(wallet.current_balance),
                wallet.currency
            );
            println!(
                "  Initial:       {} {}",
                format_amount(wallet.initial_balance),
                wallet.currency
            );
            if let Some(limit) = wallet.credit_limit {
                println!("  Credit limit:  {} {}", format_amount(limit), wallet.currency);
            }
            println!("  Default:       {}", if wallet.is_default { "yes" } else { "no" });
            if wallet.excluded_from_total {
                println!("  Excluded from total");
            }
            if let Some(desc) = &wallet.description {
                println!("  Description:   {}", desc);
            }
            println!("  Transactions:  {}", wallet.transaction_count);
            if let Some(last) = wallet.last_transaction_at {
                println!("  Last activity: {}", last.format("%Y-%m-%d %H:%M:%S"));
            }
            println!(
                "  Created:       {}",
                wallet.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        WalletCommands::Rename { name, new_name } => {
            let wallet = service.get_wallet_by_name(user, &name).await?;
            let updated = service
                .update_wallet(
                    user,
                    wallet.id,
                    WalletChanges {
                        name: Some(new_name),
                        ..Default::default()
                    },
                )
                .await?;
            println!("Renamed wallet: {} -> {}", name, updated.name);
        }

        WalletCommands::Delete { name } => {
            let wallet = service.get_wallet_by_name(user, &name).await?;
            service.delete_wallet(user, wallet.id).await?;
            println!("Deleted wallet: {}", name);
        }

        WalletCommands::SetDefault { name } => {
            let wallet = service.get_wallet_by_name(user, &name).await?;
            service.set_default_wallet(user, wallet.id, true).await?;
            println!("Default wallet: {}", name);
        }

        WalletCommands::CreditLimit { name, limit } => {
            let wallet = service.get_wallet_by_name(user, &name).await?;
            let limit = parse_amount(&limit).context("Invalid credit limit format")?;
            let updated = service.update_credit_limit(user, wallet.id, limit).await?;
            println!(
                "Credit limit for {}: {}",
                updated.name,
                format_amount(updated.credit_limit.unwrap_or_default())
            );
        }
    }

    Ok(())
}

/// Resolve a wallet by name, falling back to the user's default wallet.
async fn resolve_wallet(
    service: &WalletService,
    user: UserId,
    name: Option<&str>,
) -> Result<crate::domain::Wallet> {
    match name {
        Some(name) => Ok(service.get_wallet_by_name(user, name).await?),
        None => service
            .default_wallet(user)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No default wallet; specify one with --wallet")),
    }
}

fn parse_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim()).context("expected a UUID")
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", input))
}

fn parse_date_or_today(input: Option<&str>) -> Result<NaiveDate> {
    match input {
        Some(input) => parse_date(input),
        None => Ok(Utc::now().date_naive()),
    }
}
