//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::Transaction;
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

const COLUMNS: &str = "id, wallet_id, amount, transaction_type, status, payment_gateway, \
     payment_method, payment_method_details, reference_id, failure_reason, needs_review, \
     version, created_at, updated_at";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn create(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (
                id, wallet_id, amount, transaction_type, status, payment_gateway,
                payment_method, payment_method_details, reference_id, failure_reason,
                needs_review, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(tx.id)
        .bind(tx.wallet_id)
        .bind(&tx.amount)
        .bind(tx.transaction_type.as_str())
        .bind(tx.status.as_str())
        .bind(tx.payment_gateway.as_str())
        .bind(tx.payment_method.as_str())
        .bind(&tx.payment_method_details)
        .bind(&tx.reference_id)
        .bind(&tx.failure_reason)
        .bind(tx.needs_review)
        .bind(tx.version)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?
            .into_domain()
    }

    async fn get_by_id_and_wallet(&self, id: Uuid, wallet_id: Uuid) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1 AND wallet_id = $2",
            COLUMNS
        ))
        .bind(id)
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.ok_or_else(|| {
            RepositoryError::NotFound(format!("transaction {} in wallet {}", id, wallet_id))
        })?
        .into_domain()
    }

    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions SET
                status = $3,
                reference_id = $4,
                failure_reason = $5,
                needs_review = $6,
                updated_at = $7,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(tx.id)
        .bind(tx.version)
        .bind(tx.status.as_str())
        .bind(&tx.reference_id)
        .bind(&tx.failure_reason)
        .bind(tx.needs_review)
        .bind(tx.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(row) => row.into_domain(),
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM transactions WHERE id = $1)")
                        .bind(tx.id)
                        .fetch_one(&self.pool)
                        .await
                        .map_err(RepositoryError::from)?;

                if exists {
                    Err(RepositoryError::Conflict(format!("transaction {}", tx.id)))
                } else {
                    Err(RepositoryError::NotFound(format!("transaction {}", tx.id)))
                }
            }
        }
    }

    async fn list_by_wallet(&self, wallet_id: Uuid) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE wallet_id = $1 ORDER BY created_at DESC",
            COLUMNS
        ))
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn list_needing_review(&self) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE needs_review ORDER BY updated_at",
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    wallet_id: Uuid,
    amount: bigdecimal::BigDecimal,
    transaction_type: String,
    status: String,
    payment_gateway: String,
    payment_method: String,
    payment_method_details: serde_json::Value,
    reference_id: Option<String>,
    failure_reason: Option<String>,
    needs_review: bool,
    version: i64,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        Ok(Transaction {
            id: self.id,
            wallet_id: self.wallet_id,
            amount: self.amount,
            transaction_type: self.transaction_type.parse().map_err(RepositoryError::Corrupt)?,
            status: self.status.parse().map_err(RepositoryError::Corrupt)?,
            payment_gateway: self.payment_gateway.into(),
            payment_method: self
                .payment_method
                .parse()
                .map_err(|e: crate::validation::ValidationError| {
                    RepositoryError::Corrupt(e.to_string())
                })?,
            payment_method_details: self.payment_method_details,
            reference_id: self.reference_id,
            failure_reason: self.failure_reason,
            needs_review: self.needs_review,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
