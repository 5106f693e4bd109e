use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Transaction, Wallet};
use crate::ports::{
    RepositoryError, RepositoryResult, TransactionRepository, WalletRepository,
};

/// Transaction store kept in process memory, with the same optimistic
/// versioning as the Postgres adapter. Used by tests and `serve --in-memory`.
#[derive(Default, Clone)]
pub struct InMemoryTransactionRepository {
    transactions: Arc<RwLock<HashMap<Uuid, Transaction>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut txs: Vec<Transaction>) -> Vec<Transaction> {
    txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    txs
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn create(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&tx.id) {
            return Err(RepositoryError::Conflict(format!("transaction {}", tx.id)));
        }
        transactions.insert(tx.id, tx.clone());
        Ok(tx.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let transactions = self.transactions.read().await;
        transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    async fn get_by_id_and_wallet(&self, id: Uuid, wallet_id: Uuid) -> RepositoryResult<Transaction> {
        let transactions = self.transactions.read().await;
        transactions
            .get(&id)
            .filter(|tx| tx.wallet_id == wallet_id)
            .cloned()
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("transaction {} in wallet {}", id, wallet_id))
            })
    }

    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        let stored = transactions
            .get_mut(&tx.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", tx.id)))?;

        if stored.version != tx.version {
            return Err(RepositoryError::Conflict(format!("transaction {}", tx.id)));
        }

        stored.status = tx.status;
        stored.reference_id = tx.reference_id.clone();
        stored.failure_reason = tx.failure_reason.clone();
        stored.needs_review = tx.needs_review;
        stored.updated_at = tx.updated_at;
        stored.version += 1;

        Ok(stored.clone())
    }

    async fn list_by_wallet(&self, wallet_id: Uuid) -> RepositoryResult<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(newest_first(
            transactions
                .values()
                .filter(|tx| tx.wallet_id == wallet_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_needing_review(&self) -> RepositoryResult<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        let mut flagged: Vec<_> = transactions
            .values()
            .filter(|tx| tx.needs_review)
            .cloned()
            .collect();
        flagged.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(flagged)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryWalletRepository {
    wallets: Arc<RwLock<HashMap<Uuid, Wallet>>>,
}

impl InMemoryWalletRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletRepository for InMemoryWalletRepository {
    async fn create(&self, wallet: &Wallet) -> RepositoryResult<Wallet> {
        let mut wallets = self.wallets.write().await;
        if wallets.contains_key(&wallet.id) {
            return Err(RepositoryError::Conflict(format!("wallet {}", wallet.id)));
        }
        wallets.insert(wallet.id, wallet.clone());
        Ok(wallet.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Wallet> {
        let wallets = self.wallets.read().await;
        wallets
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("wallet {}", id)))
    }

    async fn list(&self) -> RepositoryResult<Vec<Wallet>> {
        let wallets = self.wallets.read().await;
        let mut all: Vec<_> = wallets.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}
