//! Runs against a real database when `DATABASE_URL` is set; skipped otherwise.

use bigdecimal::BigDecimal;
use paybridge_core::adapters::{PostgresTransactionRepository, PostgresWalletRepository};
use paybridge_core::domain::{PaymentMethod, Transaction, TransactionStatus, TransactionType, Wallet};
use paybridge_core::gateway::GatewayName;
use paybridge_core::ports::{RepositoryError, TransactionRepository, WalletRepository};
use serde_json::json;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use std::path::Path;
use uuid::Uuid;

async fn pool() -> Option<PgPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping");
            return None;
        }
    };

    let pool = PgPool::connect(&url).await.unwrap();
    let migrator = Migrator::new(Path::join(
        Path::new(env!("CARGO_MANIFEST_DIR")),
        "migrations",
    ))
    .await
    .unwrap();
    migrator.run(&pool).await.unwrap();
    Some(pool)
}

fn deposit(wallet_id: Uuid) -> Transaction {
    Transaction::new(
        wallet_id,
        BigDecimal::from(250),
        TransactionType::Deposit,
        GatewayName::from("gateway_a"),
        PaymentMethod::CreditCard,
        json!({"number": "**** **** **** 1111", "expiry": "12/39", "cvv": "***"}),
    )
}

#[tokio::test]
async fn test_transaction_lifecycle_round_trip() {
    let Some(pool) = pool().await else { return };
    let wallets = PostgresWalletRepository::new(pool.clone());
    let transactions = PostgresTransactionRepository::new(pool);

    let wallet = wallets.create(&Wallet::new()).await.unwrap();
    assert_eq!(wallets.get_by_id(wallet.id).await.unwrap().id, wallet.id);

    let created = transactions.create(&deposit(wallet.id)).await.unwrap();
    assert_eq!(created.status, TransactionStatus::Created);
    assert_eq!(created.amount, BigDecimal::from(250));

    let mut tx = created.clone();
    tx.mark_submitted("REF-PG".to_string()).unwrap();
    let pending = transactions.update(&tx).await.unwrap();
    assert_eq!(pending.status, TransactionStatus::Pending);
    assert_eq!(pending.version, created.version + 1);

    let fetched = transactions
        .get_by_id_and_wallet(created.id, wallet.id)
        .await
        .unwrap();
    assert_eq!(fetched.reference_id.as_deref(), Some("REF-PG"));
    assert_eq!(fetched.payment_method_details["cvv"], "***");

    let listed = transactions.list_by_wallet(wallet.id).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_stale_update_conflicts() {
    let Some(pool) = pool().await else { return };
    let wallets = PostgresWalletRepository::new(pool.clone());
    let transactions = PostgresTransactionRepository::new(pool);

    let wallet = wallets.create(&Wallet::new()).await.unwrap();
    let created = transactions.create(&deposit(wallet.id)).await.unwrap();

    let mut first = created.clone();
    first.mark_submitted("REF-A".to_string()).unwrap();
    transactions.update(&first).await.unwrap();

    let mut stale = created;
    stale.mark_submission_failed("late").unwrap();
    assert!(matches!(
        transactions.update(&stale).await,
        Err(RepositoryError::Conflict(_))
    ));

    assert!(matches!(
        transactions.get_by_id(Uuid::new_v4()).await,
        Err(RepositoryError::NotFound(_))
    ));
    assert!(matches!(
        transactions
            .get_by_id_and_wallet(stale.id, Uuid::new_v4())
            .await,
        Err(RepositoryError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_review_flag_is_listed() {
    let Some(pool) = pool().await else { return };
    let wallets = PostgresWalletRepository::new(pool.clone());
    let transactions = PostgresTransactionRepository::new(pool);

    let wallet = wallets.create(&Wallet::new()).await.unwrap();
    let mut tx = transactions.create(&deposit(wallet.id)).await.unwrap();
    tx.mark_submitted("REF-R".to_string()).unwrap();
    let mut tx = transactions.update(&tx).await.unwrap();
    tx.needs_review = true;
    let tx = transactions.update(&tx).await.unwrap();

    let flagged = transactions.list_needing_review().await.unwrap();
    assert!(flagged.iter().any(|t| t.id == tx.id));
}
