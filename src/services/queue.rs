use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::domain::PaymentMethodDetails;

/// Handoff from the request path to the submission worker. Carries the
/// unmasked details, which are never persisted.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub transaction_id: Uuid,
    pub payment_details: PaymentMethodDetails,
}

/// In-process FIFO between request handlers and the single worker.
///
/// Items are lost if the process stops before the worker picks them up;
/// their transactions stay in `created`.
#[derive(Debug, Default)]
pub struct SubmissionQueue {
    items: Mutex<VecDeque<QueueItem>>,
}

impl SubmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueueItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, item: QueueItem) {
        self.lock().push_back(item);
    }

    pub fn dequeue(&self) -> Option<QueueItem> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
