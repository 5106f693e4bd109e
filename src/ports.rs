//! Persistence ports.
//!
//! Services depend on these traits only; Postgres and in-memory adapters
//! live in `crate::adapters`.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Transaction, Wallet};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The row changed since it was read.
    #[error("concurrent update of {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn create(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction>;

    async fn get_by_id_and_wallet(&self, id: Uuid, wallet_id: Uuid) -> RepositoryResult<Transaction>;

    /// Writes `tx` if its `version` still matches the stored one and returns
    /// the stored row with the bumped version. Otherwise `Conflict`.
    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    /// Newest first.
    async fn list_by_wallet(&self, wallet_id: Uuid) -> RepositoryResult<Vec<Transaction>>;

    async fn list_needing_review(&self) -> RepositoryResult<Vec<Transaction>>;
}

#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn create(&self, wallet: &Wallet) -> RepositoryResult<Wallet>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Wallet>;

    async fn list(&self) -> RepositoryResult<Vec<Wallet>>;
}
