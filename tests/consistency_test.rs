mod common;

use anyhow::Result;
use common::{category, parse_date, test_app};
use moneta::domain::{Transaction, TransactionUpdate, WalletType};
use moneta::storage::Repository;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Sum of all current balances must equal the sum of initial balances plus
/// the net effect of every transaction still on record.
#[tokio::test]
async fn test_balance_conservation_over_mixed_operations() -> Result<()> {
    let (app, _temp) = test_app().await?;
    let checking = app.wallet("Checking", WalletType::BankAccount, dec!(1000)).await?;
    let savings = app.wallet("Savings", WalletType::Savings, dec!(250)).await?;
    let cash = app.wallet("Cash", WalletType::Cash, dec!(40)).await?;

    let salary = Transaction::income(
        app.user,
        checking.id,
        category(),
        dec!(1800),
        parse_date("2024-04-01"),
    )?;
    app.transactions.create_transaction(salary).await?;

    let rent = Transaction::expense(
        app.user,
        checking.id,
        category(),
        dec!(900),
        parse_date("2024-04-02"),
    )?;
    let rent = app.transactions.create_transaction(rent).await?;

    let stash = app
        .transactions
        .transfer(
            app.user,
            checking.id,
            savings.id,
            dec!(500),
            parse_date("2024-04-03"),
            None,
        )
        .await?;

    let groceries = Transaction::expense(
        app.user,
        cash.id,
        category(),
        dec!(25.40),
        parse_date("2024-04-04"),
    )?;
    app.transactions.create_transaction(groceries).await?;

    // Rework the month: rent was actually 950, the stash only 300,
    // and the groceries were paid back.
    app.transactions
        .update_transaction(
            app.user,
            rent.id,
            TransactionUpdate {
                amount: Some(dec!(950)),
                ..Default::default()
            },
        )
        .await?;
    app.transactions
        .update_transaction(
            app.user,
            stash.id,
            TransactionUpdate {
                amount: Some(dec!(300)),
                ..Default::default()
            },
        )
        .await?;
    let refund = Transaction::income(
        app.user,
        cash.id,
        category(),
        dec!(25.40),
        parse_date("2024-04-05"),
    )?;
    let refund = app.transactions.create_transaction(refund).await?;
    app.transactions.delete_transaction(app.user, refund.id).await?;

    let wallets = app.wallets.list_wallets(app.user).await?;
    let total_current: Decimal = wallets.iter().map(|w| w.current_balance).sum();
    let total_initial: Decimal = wallets.iter().map(|w| w.initial_balance).sum();

    let net_effect: Decimal = app
        .transactions
        .list_transactions(app.user)
        .await?
        .iter()
        .map(|t| {
            let mut net = t.effective_amount();
            if t.is_transfer() {
                net += t.amount;
            }
            net
        })
        .sum();

    assert_eq!(total_current, total_initial + net_effect);
    assert_eq!(total_current, dec!(1550) + dec!(550) + dec!(14.60));

    Ok(())
}

/// Updating a transaction to its current state nets to zero balance change.
#[tokio::test]
async fn test_update_to_identical_state_is_a_balance_noop() -> Result<()> {
    let (app, _temp) = test_app().await?;
    let w1 = app.wallet("W1", WalletType::Cash, dec!(80)).await?;
    let w2 = app.wallet("W2", WalletType::Cash, dec!(0)).await?;

    let transfer = app
        .transactions
        .transfer(app.user, w1.id, w2.id, dec!(35), parse_date("2024-04-01"), None)
        .await?;

    app.transactions
        .update_transaction(
            app.user,
            transfer.id,
            TransactionUpdate {
                wallet_id: Some(w1.id),
                to_wallet_id: Some(w2.id),
                amount: Some(dec!(35)),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(app.balance_of(&w1).await?, dec!(45));
    assert_eq!(app.balance_of(&w2).await?, dec!(35));

    // An empty patch behaves the same way
    app.transactions
        .update_transaction(app.user, transfer.id, TransactionUpdate::default())
        .await?;
    assert_eq!(app.balance_of(&w1).await?, dec!(45));
    assert_eq!(app.balance_of(&w2).await?, dec!(35));

    Ok(())
}

/// A write based on a stale snapshot must not overwrite a newer one.
#[tokio::test]
async fn test_stale_wallet_snapshot_cannot_overwrite() -> Result<()> {
    let (app, _temp) = test_app().await?;
    let wallet = app.wallet("W1", WalletType::Cash, dec!(100)).await?;

    let fresh = app.repo.get_wallet(wallet.id).await?.unwrap();
    let stale = fresh.clone();

    let mut uow = app.repo.begin().await?;
    let first = Repository::update_wallet(
        uow.conn(),
        &fresh.apply_delta(dec!(-10), chrono::Utc::now()).unwrap(),
    )
    .await?;
    assert!(first);
    uow.commit().await?;

    // Same version stamp again: the row has moved on, the write is refused
    let mut uow = app.repo.begin().await?;
    let second = Repository::update_wallet(
        uow.conn(),
        &stale.apply_delta(dec!(-10), chrono::Utc::now()).unwrap(),
    )
    .await?;
    assert!(!second);
    drop(uow);

    assert_eq!(app.balance_of(&wallet).await?, dec!(90));

    Ok(())
}

/// Failed mutations leave the wallet exactly as it was.
#[tokio::test]
async fn test_failed_operations_never_move_balances() -> Result<()> {
    let (app, _temp) = test_app().await?;
    let w1 = app.wallet("W1", WalletType::Cash, dec!(15)).await?;
    let card = app.credit_card("Visa", dec!(50)).await?;

    let overdraw = Transaction::expense(
        app.user,
        w1.id,
        category(),
        dec!(100),
        parse_date("2024-04-01"),
    )?;
    assert!(app.transactions.create_transaction(overdraw).await.is_err());

    let over_limit = Transaction::expense(
        app.user,
        card.id,
        category(),
        dec!(60),
        parse_date("2024-04-01"),
    )?;
    assert!(app.transactions.create_transaction(over_limit).await.is_err());

    let too_big_transfer = app
        .transactions
        .transfer(app.user, w1.id, card.id, dec!(20), parse_date("2024-04-02"), None)
        .await;
    assert!(too_big_transfer.is_err());

    assert_eq!(app.balance_of(&w1).await?, dec!(15));
    assert_eq!(app.balance_of(&card).await?, dec!(0));
    assert!(app.transactions.list_transactions(app.user).await?.is_empty());

    Ok(())
}
