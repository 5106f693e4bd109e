use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{CallbackOutcome, Transaction, TransactionStatus, TransitionError};
use crate::error::AppError;
use crate::gateway::GatewayRouter;
use crate::ports::TransactionRepository;

/// Applies gateway callbacks to pending transactions, and operator
/// resolutions to the ones flagged for review.
#[derive(Clone)]
pub struct Reconciler {
    transactions: Arc<dyn TransactionRepository>,
    router: GatewayRouter,
}

impl Reconciler {
    pub fn new(transactions: Arc<dyn TransactionRepository>, router: GatewayRouter) -> Self {
        Self {
            transactions,
            router,
        }
    }

    /// Verifies `body` against the transaction's gateway reference and moves
    /// the transaction forward. Rejects callbacks for transactions that are
    /// not pending or that belong to another wallet.
    pub async fn process_callback(
        &self,
        wallet_id: Uuid,
        transaction_id: Uuid,
        body: &[u8],
    ) -> Result<Transaction, AppError> {
        let mut tx = self.transactions.get_by_id(transaction_id).await?;

        if tx.wallet_id != wallet_id {
            warn!(
                transaction_id = %transaction_id,
                wallet_id = %wallet_id,
                "callback rejected: wallet mismatch"
            );
            return Err(AppError::InvalidArgument(format!(
                "transaction {} does not belong to wallet {}",
                transaction_id, wallet_id
            )));
        }

        if tx.status != TransactionStatus::Pending {
            warn!(
                transaction_id = %transaction_id,
                status = %tx.status,
                "callback rejected: transaction not pending"
            );
            return Err(AppError::InvalidArgument(format!(
                "transaction {} is {}, callbacks are only accepted while pending",
                transaction_id, tx.status
            )));
        }

        let reference_id = tx.reference_id.clone().ok_or_else(|| {
            AppError::Internal(format!("pending transaction {} has no reference id", transaction_id))
        })?;

        let verified = self
            .router
            .verify_callback(&tx.payment_gateway, &reference_id, body)
            .map_err(|e| {
                warn!(
                    transaction_id = %transaction_id,
                    gateway = %tx.payment_gateway,
                    reference_id = %reference_id,
                    error = %e,
                    "callback rejected"
                );
                AppError::InvalidArgument(e.to_string())
            })?;

        match tx.apply_gateway_status(verified.status) {
            Ok(CallbackOutcome::StillPending) => {
                debug!(transaction_id = %transaction_id, reference_id = %reference_id, "gateway still pending");
                Ok(tx)
            }
            Ok(outcome) => {
                let tx = self.transactions.update(&tx).await?;
                info!(
                    transaction_id = %transaction_id,
                    wallet_id = %wallet_id,
                    reference_id = %reference_id,
                    outcome = ?outcome,
                    status = %tx.status,
                    "transaction reconciled"
                );
                Ok(tx)
            }
            Err(TransitionError::UnknownGatewayStatus) => {
                self.transactions.update(&tx).await?;
                error!(
                    transaction_id = %transaction_id,
                    wallet_id = %wallet_id,
                    gateway = %tx.payment_gateway,
                    reference_id = %reference_id,
                    "gateway reported an unknown status, transaction flagged for review"
                );
                Err(AppError::InvalidArgument(format!(
                    "gateway reported an unknown status for transaction {}; flagged for manual review",
                    transaction_id
                )))
            }
            Err(e) => Err(AppError::InvalidArgument(e.to_string())),
        }
    }

    pub async fn list_needing_review(&self) -> Result<Vec<Transaction>, AppError> {
        Ok(self.transactions.list_needing_review().await?)
    }

    /// Operator decision on a flagged transaction: `pending → completed|failed`.
    pub async fn resolve_review(
        &self,
        transaction_id: Uuid,
        target: TransactionStatus,
    ) -> Result<Transaction, AppError> {
        let mut tx = self.transactions.get_by_id(transaction_id).await?;

        if !tx.needs_review {
            return Err(AppError::InvalidArgument(format!(
                "transaction {} is not flagged for review",
                transaction_id
            )));
        }

        tx.resolve_review(target)
            .map_err(|e| AppError::InvalidArgument(e.to_string()))?;
        let tx = self.transactions.update(&tx).await?;

        info!(transaction_id = %transaction_id, status = %tx.status, "review resolved by operator");
        Ok(tx)
    }
}
