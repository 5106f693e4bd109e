use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::queue::{QueueItem, SubmissionQueue};
use crate::gateway::retrier::shutdown_requested;
use crate::gateway::{GatewayRequest, GatewayRouter, Shutdown};
use crate::ports::TransactionRepository;

/// Fills `{wallet_id}` and `{transaction_id}` in the callback URL pattern.
pub fn callback_url(pattern: &str, wallet_id: Uuid, transaction_id: Uuid) -> String {
    pattern
        .replace("{wallet_id}", &wallet_id.to_string())
        .replace("{transaction_id}", &transaction_id.to_string())
}

/// Drains the submission queue, one item at a time, in enqueue order.
/// This is the only place a transaction leaves `created`.
pub struct SubmissionWorker {
    queue: Arc<SubmissionQueue>,
    transactions: Arc<dyn TransactionRepository>,
    router: GatewayRouter,
    callback_pattern: String,
    poll_interval: Duration,
}

impl SubmissionWorker {
    pub fn new(
        queue: Arc<SubmissionQueue>,
        transactions: Arc<dyn TransactionRepository>,
        router: GatewayRouter,
        callback_pattern: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            transactions,
            router,
            callback_pattern,
            poll_interval,
        }
    }

    /// Runs until `shutdown` flips to `true`. Shutdown is observed between
    /// items and while idle; an in-flight submission sees it through the
    /// retrier.
    pub async fn run(self, mut shutdown: Shutdown) {
        info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "submission worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if !self.process_next(&shutdown).await {
                tokio::select! {
                    _ = sleep(self.poll_interval) => {}
                    _ = shutdown_requested(&mut shutdown) => {}
                }
            }
        }

        info!(pending_items = self.queue.len(), "submission worker stopped");
    }

    /// Processes one queued item. Returns `false` when the queue was empty.
    pub async fn process_next(&self, shutdown: &Shutdown) -> bool {
        match self.queue.dequeue() {
            Some(item) => {
                self.process(item, shutdown).await;
                true
            }
            None => false,
        }
    }

    async fn process(&self, item: QueueItem, shutdown: &Shutdown) {
        let transaction_id = item.transaction_id;

        let mut tx = match self.transactions.get_by_id(transaction_id).await {
            Ok(tx) => tx,
            Err(e) => {
                error!(transaction_id = %transaction_id, error = %e, "queued transaction could not be loaded, dropping");
                return;
            }
        };

        let request = GatewayRequest {
            transaction_id,
            amount: tx.amount.clone(),
            callback_url: callback_url(&self.callback_pattern, tx.wallet_id, transaction_id),
            payment_details: item.payment_details,
        };

        let outcome = self
            .router
            .submit(&tx.payment_gateway, tx.transaction_type, &request, shutdown)
            .await;

        let transition = match outcome {
            Ok(response) if !response.reference_id.is_empty() => {
                let reference_id = response.reference_id;
                info!(
                    transaction_id = %transaction_id,
                    wallet_id = %tx.wallet_id,
                    gateway = %tx.payment_gateway,
                    reference_id = %reference_id,
                    "submission accepted, transaction pending"
                );
                tx.mark_submitted(reference_id)
            }
            Ok(_) => {
                warn!(transaction_id = %transaction_id, gateway = %tx.payment_gateway, "gateway returned an empty reference id");
                tx.mark_submission_failed("gateway returned an empty reference id")
            }
            Err(e) => {
                warn!(
                    transaction_id = %transaction_id,
                    wallet_id = %tx.wallet_id,
                    gateway = %tx.payment_gateway,
                    error = %e,
                    "submission failed, transaction failed"
                );
                tx.mark_submission_failed(e.to_string())
            }
        };

        if let Err(e) = transition {
            warn!(transaction_id = %transaction_id, error = %e, "queued transaction no longer submittable");
            return;
        }

        if let Err(e) = self.transactions.update(&tx).await {
            error!(transaction_id = %transaction_id, status = %tx.status, error = %e, "failed to persist submission result");
        }
    }
}
