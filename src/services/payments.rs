use bigdecimal::{BigDecimal, Zero};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::queue::{QueueItem, SubmissionQueue};
use crate::domain::{PaymentMethod, Transaction, TransactionType, Wallet};
use crate::error::AppError;
use crate::gateway::{GatewayName, GatewayRouter};
use crate::ports::{TransactionRepository, WalletRepository};

/// How the caller wants to pay: which gateway, which method, and the raw
/// method details.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInstruction {
    pub gateway: GatewayName,
    pub method: String,
    #[serde(default)]
    pub method_details: Value,
}

/// Accepts deposits and withdrawals and answers wallet and transaction
/// queries. Gateway I/O never happens here; accepted transactions are
/// queued for the submission worker.
#[derive(Clone)]
pub struct PaymentService {
    transactions: Arc<dyn TransactionRepository>,
    wallets: Arc<dyn WalletRepository>,
    router: GatewayRouter,
    queue: Arc<SubmissionQueue>,
}

impl PaymentService {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        wallets: Arc<dyn WalletRepository>,
        router: GatewayRouter,
        queue: Arc<SubmissionQueue>,
    ) -> Self {
        Self {
            transactions,
            wallets,
            router,
            queue,
        }
    }

    pub async fn create_wallet(&self) -> Result<Wallet, AppError> {
        let wallet = self.wallets.create(&Wallet::new()).await?;
        info!(wallet_id = %wallet.id, "wallet created");
        Ok(wallet)
    }

    pub async fn list_wallets(&self) -> Result<Vec<Wallet>, AppError> {
        Ok(self.wallets.list().await?)
    }

    pub async fn deposit(
        &self,
        wallet_id: Uuid,
        amount: BigDecimal,
        payment: PaymentInstruction,
    ) -> Result<Transaction, AppError> {
        self.accept(wallet_id, amount, TransactionType::Deposit, payment)
            .await
    }

    pub async fn withdraw(
        &self,
        wallet_id: Uuid,
        amount: BigDecimal,
        payment: PaymentInstruction,
    ) -> Result<Transaction, AppError> {
        self.accept(wallet_id, amount, TransactionType::Withdrawal, payment)
            .await
    }

    /// Validates, persists as `created` with masked details, then queues the
    /// unmasked details for submission.
    async fn accept(
        &self,
        wallet_id: Uuid,
        amount: BigDecimal,
        transaction_type: TransactionType,
        payment: PaymentInstruction,
    ) -> Result<Transaction, AppError> {
        if amount <= BigDecimal::zero() {
            return Err(AppError::InvalidArgument(
                "amount must be greater than zero".to_string(),
            ));
        }

        let method: PaymentMethod = payment.method.parse()?;
        let details = self.router.verify_method(
            &payment.gateway,
            transaction_type,
            method,
            &payment.method_details,
        )?;

        self.wallets.get_by_id(wallet_id).await?;

        let tx = Transaction::new(
            wallet_id,
            amount,
            transaction_type,
            payment.gateway,
            method,
            details.masked(),
        );
        let tx = self.transactions.create(&tx).await?;

        self.queue.enqueue(QueueItem {
            transaction_id: tx.id,
            payment_details: details,
        });

        info!(
            transaction_id = %tx.id,
            wallet_id = %wallet_id,
            gateway = %tx.payment_gateway,
            transaction_type = %transaction_type,
            "transaction accepted"
        );

        Ok(tx)
    }

    pub async fn list_transactions(&self, wallet_id: Uuid) -> Result<Vec<Transaction>, AppError> {
        self.wallets.get_by_id(wallet_id).await?;
        Ok(self.transactions.list_by_wallet(wallet_id).await?)
    }

    pub async fn get_transaction(
        &self,
        wallet_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Transaction, AppError> {
        Ok(self
            .transactions
            .get_by_id_and_wallet(transaction_id, wallet_id)
            .await?)
    }
}
