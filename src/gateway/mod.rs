//! Payment gateway abstraction.
//!
//! Every external processor sits behind [`PaymentGateway`]. Adapters
//! translate to and from their own wire format and share the resilience
//! stack in [`client`]: circuit breaker outside, retrier inside.

pub mod breaker;
pub mod client;
pub mod json;
pub mod retrier;
pub mod router;
pub mod soap;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::{PaymentMethod, PaymentMethodDetails, TransactionType};
use crate::validation::ValidationError;

pub use breaker::{BreakerSettings, CircuitBreaker, CircuitState};
pub use client::GatewayClient;
pub use json::JsonGateway;
pub use retrier::{Retrier, RetryError};
pub use router::GatewayRouter;
pub use soap::SoapGateway;

/// Shutdown signal shared by the worker and in-flight gateway calls.
/// `true` means stop.
pub type Shutdown = watch::Receiver<bool>;

/// Identifier under which a gateway is registered, e.g. `gateway_a`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatewayName(String);

impl GatewayName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GatewayName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for GatewayName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for GatewayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized gateway status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Unknown,
}

impl PaymentStatus {
    /// Maps a gateway's status string; anything unrecognised is `Unknown`.
    pub fn from_wire(status: &str) -> Self {
        match status {
            "success" => PaymentStatus::Success,
            "pending" => PaymentStatus::Pending,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Unknown,
        }
    }
}

/// Everything an adapter needs to submit one transaction.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub transaction_id: Uuid,
    pub amount: BigDecimal,
    pub callback_url: String,
    pub payment_details: PaymentMethodDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub reference_id: String,
    pub status: PaymentStatus,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway responded with status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("circuit breaker open for {0}")]
    CircuitOpen(GatewayName),

    #[error("gateway call cancelled")]
    Cancelled,

    #[error("failed to encode request: {0}")]
    Encode(String),

    #[error("invalid response from gateway: {0}")]
    InvalidResponse(String),

    #[error("invalid callback: {0}")]
    InvalidCallback(String),

    #[error("unsupported gateway: {0}")]
    UnknownGateway(GatewayName),

    #[error("gateway {gateway} does not support {method} for {transaction_type}")]
    UnsupportedMethod {
        gateway: GatewayName,
        transaction_type: TransactionType,
        method: PaymentMethod,
    },

    #[error("invalid payment details: {0}")]
    InvalidDetails(#[from] ValidationError),
}

impl GatewayError {
    /// Transport failures and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Transport(_) => true,
            GatewayError::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Caller-side problems, rejected before or without touching the network.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidCallback(_)
                | GatewayError::UnknownGateway(_)
                | GatewayError::UnsupportedMethod { .. }
                | GatewayError::InvalidDetails(_)
        )
    }
}

/// Both reference gateways take card deposits and bank-transfer withdrawals.
pub(crate) const CARD_IN_BANK_OUT: &[(TransactionType, PaymentMethod)] = &[
    (TransactionType::Deposit, PaymentMethod::CreditCard),
    (TransactionType::Withdrawal, PaymentMethod::BankTransfer),
];

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &GatewayName;

    /// Sends a deposit or withdrawal and returns the gateway's reference.
    async fn submit(
        &self,
        kind: TransactionType,
        request: &GatewayRequest,
        shutdown: &Shutdown,
    ) -> Result<GatewayResponse, GatewayError>;

    /// Decodes an inbound callback and checks it belongs to `expected_reference`.
    fn verify_callback(
        &self,
        expected_reference: &str,
        body: &[u8],
    ) -> Result<GatewayResponse, GatewayError>;

    fn supports_method(&self, transaction_type: TransactionType, method: PaymentMethod) -> bool;

    fn circuit_state(&self) -> CircuitState;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_vocabulary() {
        assert_eq!(PaymentStatus::from_wire("success"), PaymentStatus::Success);
        assert_eq!(PaymentStatus::from_wire("pending"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_wire("failed"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_wire("SUCCESS"), PaymentStatus::Unknown);
        assert_eq!(PaymentStatus::from_wire(""), PaymentStatus::Unknown);
    }

    #[test]
    fn test_retryable_classification() {
        let server_error = GatewayError::UnexpectedStatus {
            status: 503,
            body: String::new(),
        };
        let client_error = GatewayError::UnexpectedStatus {
            status: 400,
            body: String::new(),
        };
        assert!(server_error.is_retryable());
        assert!(!client_error.is_retryable());
        assert!(!GatewayError::CircuitOpen(GatewayName::from("gateway_a")).is_retryable());
    }

    #[test]
    fn test_invalid_argument_classification() {
        assert!(GatewayError::UnknownGateway(GatewayName::from("x")).is_invalid_argument());
        assert!(GatewayError::InvalidCallback("mismatch".into()).is_invalid_argument());
        assert!(!GatewayError::Cancelled.is_invalid_argument());
    }
}
