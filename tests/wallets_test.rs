mod common;

use anyhow::Result;
use common::{new_wallet, test_app};
use moneta::application::{AppError, WalletChanges};
use moneta::domain::WalletType;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_first_wallet_is_forced_default() -> Result<()> {
    let (app, _temp) = test_app().await?;

    // Not requested as default, but it is the user's first wallet
    let wallet = app.wallet("Checking", WalletType::BankAccount, dec!(100)).await?;
    assert!(wallet.is_default);

    let second = app.wallet("Cash", WalletType::Cash, dec!(20)).await?;
    assert!(!second.is_default);

    Ok(())
}

#[tokio::test]
async fn test_requested_default_unseats_previous() -> Result<()> {
    let (app, _temp) = test_app().await?;

    let first = app.wallet("Checking", WalletType::BankAccount, dec!(100)).await?;

    let mut request = new_wallet("Savings", WalletType::Savings, dec!(500));
    request.is_default = true;
    let second = app.wallets.create_wallet(app.user, request).await?;
    assert!(second.is_default);

    let all = app.wallets.list_wallets(app.user).await?;
    let defaults: Vec<_> = all.iter().filter(|w| w.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, second.id);

    let first = app.wallets.get_wallet(app.user, first.id).await?;
    assert!(!first.is_default);

    Ok(())
}

#[tokio::test]
async fn test_set_default_keeps_exactly_one() -> Result<()> {
    let (app, _temp) = test_app().await?;

    let a = app.wallet("A", WalletType::Cash, dec!(0)).await?;
    let b = app.wallet("B", WalletType::Cash, dec!(0)).await?;
    let c = app.wallet("C", WalletType::Cash, dec!(0)).await?;

    app.wallets.set_default_wallet(app.user, b.id, true).await?;
    app.wallets.set_default_wallet(app.user, c.id, true).await?;
    app.wallets.set_default_wallet(app.user, a.id, true).await?;

    let all = app.wallets.list_wallets(app.user).await?;
    let defaults: Vec<_> = all.iter().filter(|w| w.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].name, "A");

    Ok(())
}

#[tokio::test]
async fn test_wallet_names_are_unique_per_user_case_insensitive() -> Result<()> {
    let (app, _temp) = test_app().await?;

    app.wallet("Checking", WalletType::BankAccount, dec!(0)).await?;

    let err = app
        .wallet("CHECKING", WalletType::Cash, dec!(0))
        .await
        .unwrap_err();
    let err = err.downcast::<AppError>()?;
    assert!(matches!(err, AppError::WalletAlreadyExists(_)));

    Ok(())
}

#[tokio::test]
async fn test_rename_checks_uniqueness() -> Result<()> {
    let (app, _temp) = test_app().await?;

    app.wallet("Checking", WalletType::BankAccount, dec!(0)).await?;
    let cash = app.wallet("Cash", WalletType::Cash, dec!(0)).await?;

    let err = app
        .wallets
        .update_wallet(
            app.user,
            cash.id,
            WalletChanges {
                name: Some("checking".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::WalletAlreadyExists(_)));

    let renamed = app
        .wallets
        .update_wallet(
            app.user,
            cash.id,
            WalletChanges {
                name: Some("Pocket Money".into()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(renamed.name, "Pocket Money");

    Ok(())
}

#[tokio::test]
async fn test_soft_deleted_wallet_disappears() -> Result<()> {
    let (app, _temp) = test_app().await?;

    let wallet = app.wallet("Old Account", WalletType::BankAccount, dec!(10)).await?;
    app.wallets.delete_wallet(app.user, wallet.id).await?;

    let err = app.wallets.get_wallet(app.user, wallet.id).await.unwrap_err();
    assert!(matches!(err, AppError::WalletNotFound(_)));

    let all = app.wallets.list_wallets(app.user).await?;
    assert!(all.is_empty());

    // The name becomes available again
    let recreated = app.wallet("Old Account", WalletType::BankAccount, dec!(0)).await?;
    assert_eq!(recreated.name, "Old Account");

    Ok(())
}

#[tokio::test]
async fn test_deleting_default_wallet_leaves_no_default() -> Result<()> {
    let (app, _temp) = test_app().await?;

    let first = app.wallet("Main", WalletType::Cash, dec!(0)).await?;
    app.wallet("Side", WalletType::Cash, dec!(0)).await?;
    app.wallets.delete_wallet(app.user, first.id).await?;

    assert!(app.wallets.default_wallet(app.user).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_credit_limit_administration() -> Result<()> {
    let (app, _temp) = test_app().await?;

    let card = app.credit_card("Visa", dec!(100)).await?;
    assert_eq!(card.credit_limit, Some(dec!(100)));

    let updated = app
        .wallets
        .update_credit_limit(app.user, card.id, dec!(250))
        .await?;
    assert_eq!(updated.credit_limit, Some(dec!(250)));

    let cash = app.wallet("Cash", WalletType::Cash, dec!(0)).await?;
    let err = app
        .wallets
        .update_credit_limit(app.user, cash.id, dec!(100))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidWallet(_)));

    Ok(())
}

#[tokio::test]
async fn test_negative_initial_balance_is_normalized_to_zero() -> Result<()> {
    let (app, _temp) = test_app().await?;

    let wallet = app.wallet("Cash", WalletType::Cash, dec!(-25)).await?;
    assert_eq!(wallet.initial_balance, Decimal::ZERO);
    assert_eq!(wallet.current_balance, Decimal::ZERO);

    Ok(())
}

#[tokio::test]
async fn test_total_balance_skips_excluded_wallets() -> Result<()> {
    let (app, _temp) = test_app().await?;

    app.wallet("Checking", WalletType::BankAccount, dec!(100)).await?;
    app.wallet("Savings", WalletType::Savings, dec!(400)).await?;

    let mut request = new_wallet("Vault", WalletType::Other, dec!(1000));
    request.excluded_from_total = true;
    app.wallets.create_wallet(app.user, request).await?;

    assert_eq!(app.wallets.total_balance(app.user).await?, dec!(500));

    Ok(())
}

#[tokio::test]
async fn test_blank_wallet_name_is_rejected() -> Result<()> {
    let (app, _temp) = test_app().await?;

    let err = app
        .wallet("   ", WalletType::Cash, dec!(0))
        .await
        .unwrap_err();
    let err = err.downcast::<AppError>()?;
    assert!(matches!(err, AppError::InvalidWallet(_)));

    Ok(())
}
