//! Transaction domain entity and its lifecycle.
//!
//! `created → pending → {completed, failed}`, with `created → failed` when
//! the gateway submission itself fails. Every mutation goes through one of
//! the transition methods below; none of them moves a transaction backwards.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::payment_method::PaymentMethod;
use crate::gateway::{GatewayName, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Created,
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Created => "created",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(TransactionStatus::Created),
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {event} a transaction in status {from}")]
    InvalidTransition {
        from: TransactionStatus,
        event: &'static str,
    },

    #[error("gateway reported an unknown payment status")]
    UnknownGatewayStatus,
}

/// What a verified callback did to the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Completed,
    Failed,
    /// Gateway still reports `pending`; nothing to persist.
    StillPending,
}

/// Domain entity representing a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub amount: BigDecimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub payment_gateway: GatewayName,
    pub payment_method: PaymentMethod,
    /// Masked view only.
    pub payment_method_details: serde_json::Value,
    pub reference_id: Option<String>,
    pub failure_reason: Option<String>,
    pub needs_review: bool,
    #[serde(skip)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        wallet_id: Uuid,
        amount: BigDecimal,
        transaction_type: TransactionType,
        payment_gateway: GatewayName,
        payment_method: PaymentMethod,
        masked_details: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            amount,
            transaction_type,
            status: TransactionStatus::Created,
            payment_gateway,
            payment_method,
            payment_method_details: masked_details,
            reference_id: None,
            failure_reason: None,
            needs_review: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// `created → pending`: the gateway accepted the submission.
    pub fn mark_submitted(&mut self, reference_id: String) -> Result<(), TransitionError> {
        self.require(TransactionStatus::Created, "submit")?;
        self.reference_id = Some(reference_id);
        self.set_status(TransactionStatus::Pending);
        Ok(())
    }

    /// `created → failed`: the submission failed terminally or exhausted
    /// its retries.
    pub fn mark_submission_failed(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.require(TransactionStatus::Created, "fail submission of")?;
        self.failure_reason = Some(reason.into());
        self.set_status(TransactionStatus::Failed);
        Ok(())
    }

    /// Applies a verified gateway status to a pending transaction.
    ///
    /// An `unknown` status leaves the status untouched but flags the
    /// transaction for manual review; the caller persists the flag and
    /// rejects the callback.
    pub fn apply_gateway_status(
        &mut self,
        status: PaymentStatus,
    ) -> Result<CallbackOutcome, TransitionError> {
        self.require(TransactionStatus::Pending, "reconcile")?;

        match status {
            PaymentStatus::Success => {
                self.set_status(TransactionStatus::Completed);
                Ok(CallbackOutcome::Completed)
            }
            PaymentStatus::Failed => {
                self.set_status(TransactionStatus::Failed);
                Ok(CallbackOutcome::Failed)
            }
            PaymentStatus::Pending => Ok(CallbackOutcome::StillPending),
            PaymentStatus::Unknown => {
                self.needs_review = true;
                self.updated_at = Utc::now();
                Err(TransitionError::UnknownGatewayStatus)
            }
        }
    }

    /// Operator resolution of a pending transaction that was flagged for
    /// review. Only terminal targets are accepted.
    pub fn resolve_review(&mut self, target: TransactionStatus) -> Result<(), TransitionError> {
        self.require(TransactionStatus::Pending, "resolve")?;
        if !target.is_terminal() {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                event: "resolve to a non-terminal status",
            });
        }

        self.set_status(target);
        Ok(())
    }

    fn require(
        &self,
        expected: TransactionStatus,
        event: &'static str,
    ) -> Result<(), TransitionError> {
        if self.status != expected {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                event,
            });
        }
        Ok(())
    }

    /// Terminal statuses also clear the review flag.
    fn set_status(&mut self, status: TransactionStatus) {
        self.status = status;
        if status.is_terminal() {
            self.needs_review = false;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn created() -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            BigDecimal::from(100),
            TransactionType::Deposit,
            GatewayName::from("gateway_a"),
            PaymentMethod::CreditCard,
            json!({"number": "**** **** **** 1111"}),
        )
    }

    fn pending() -> Transaction {
        let mut tx = created();
        tx.mark_submitted("REF1".to_string()).unwrap();
        tx
    }

    #[test]
    fn test_new_transaction_is_created_without_reference() {
        let tx = created();
        assert_eq!(tx.status, TransactionStatus::Created);
        assert!(tx.reference_id.is_none());
        assert_eq!(tx.created_at, tx.updated_at);
    }

    #[test]
    fn test_submission_sets_reference_and_pending() {
        let tx = pending();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.reference_id.as_deref(), Some("REF1"));
    }

    #[test]
    fn test_submission_failure_records_reason() {
        let mut tx = created();
        tx.mark_submission_failed("gateway unavailable").unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.failure_reason.as_deref(), Some("gateway unavailable"));
        assert!(tx.reference_id.is_none());
    }

    #[test]
    fn test_submission_only_leaves_created_once() {
        let mut tx = pending();
        assert!(tx.mark_submitted("REF2".to_string()).is_err());
        assert!(tx.mark_submission_failed("late").is_err());
        assert_eq!(tx.reference_id.as_deref(), Some("REF1"));
    }

    #[test]
    fn test_callback_transitions() {
        let mut tx = pending();
        assert_eq!(
            tx.apply_gateway_status(PaymentStatus::Success),
            Ok(CallbackOutcome::Completed)
        );
        assert_eq!(tx.status, TransactionStatus::Completed);

        let mut tx = pending();
        assert_eq!(
            tx.apply_gateway_status(PaymentStatus::Failed),
            Ok(CallbackOutcome::Failed)
        );
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.reference_id.as_deref(), Some("REF1"));

        let mut tx = pending();
        assert_eq!(
            tx.apply_gateway_status(PaymentStatus::Pending),
            Ok(CallbackOutcome::StillPending)
        );
        assert_eq!(tx.status, TransactionStatus::Pending);
    }

    #[test]
    fn test_unknown_status_flags_for_review_without_transition() {
        let mut tx = pending();
        assert_eq!(
            tx.apply_gateway_status(PaymentStatus::Unknown),
            Err(TransitionError::UnknownGatewayStatus)
        );
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.needs_review);
    }

    #[test]
    fn test_failed_callback_clears_review_flag() {
        let mut tx = pending();
        let _ = tx.apply_gateway_status(PaymentStatus::Unknown);
        assert_eq!(
            tx.apply_gateway_status(PaymentStatus::Failed),
            Ok(CallbackOutcome::Failed)
        );
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert!(!tx.needs_review);
    }

    #[test]
    fn test_terminal_states_reject_callbacks() {
        for status in [PaymentStatus::Success, PaymentStatus::Failed, PaymentStatus::Pending] {
            let mut tx = pending();
            tx.apply_gateway_status(PaymentStatus::Success).unwrap();
            assert!(tx.apply_gateway_status(status).is_err());
            assert_eq!(tx.status, TransactionStatus::Completed);
        }

        let mut tx = created();
        assert!(matches!(
            tx.apply_gateway_status(PaymentStatus::Success),
            Err(TransitionError::InvalidTransition {
                from: TransactionStatus::Created,
                ..
            })
        ));
    }

    #[test]
    fn test_resolve_review() {
        let mut tx = pending();
        let _ = tx.apply_gateway_status(PaymentStatus::Unknown);
        assert!(tx.resolve_review(TransactionStatus::Pending).is_err());
        tx.resolve_review(TransactionStatus::Completed).unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(!tx.needs_review);
        assert!(tx.resolve_review(TransactionStatus::Failed).is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TransactionStatus::Created,
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<TransactionStatus>(), Ok(status));
        }
        assert!("settled".parse::<TransactionStatus>().is_err());
    }
}
