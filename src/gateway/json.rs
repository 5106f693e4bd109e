use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::client::{GatewayClient, JSON_CONTENT_TYPE};
use super::{
    CircuitState, GatewayError, GatewayName, GatewayRequest, GatewayResponse, PaymentGateway,
    PaymentStatus, Shutdown, CARD_IN_BANK_OUT,
};
use crate::domain::{PaymentMethod, TransactionType};

#[derive(Serialize)]
struct JsonSubmission<'a> {
    amount: f64,
    callback_url: &'a str,
    payment_details: Value,
}

/// Response and callback payload share one shape.
#[derive(Debug, Deserialize)]
struct JsonStatusPayload {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    id: String,
}

/// Gateway speaking JSON over `POST /deposit` and `POST /withdrawal`.
pub struct JsonGateway {
    client: GatewayClient,
}

impl JsonGateway {
    pub fn new(client: GatewayClient) -> Self {
        Self { client }
    }

    fn path(kind: TransactionType) -> &'static str {
        match kind {
            TransactionType::Deposit => "/deposit",
            TransactionType::Withdrawal => "/withdrawal",
        }
    }
}

pub(crate) fn amount_as_f64(amount: &BigDecimal) -> Result<f64, GatewayError> {
    amount
        .to_f64()
        .ok_or_else(|| GatewayError::Encode(format!("amount {} is not representable", amount)))
}

#[async_trait]
impl PaymentGateway for JsonGateway {
    fn name(&self) -> &GatewayName {
        self.client.name()
    }

    async fn submit(
        &self,
        kind: TransactionType,
        request: &GatewayRequest,
        shutdown: &Shutdown,
    ) -> Result<GatewayResponse, GatewayError> {
        let body = serde_json::to_vec(&JsonSubmission {
            amount: amount_as_f64(&request.amount)?,
            callback_url: &request.callback_url,
            payment_details: request.payment_details.raw(),
        })
        .map_err(|e| GatewayError::Encode(e.to_string()))?;

        let response = self
            .client
            .post(Self::path(kind), body, JSON_CONTENT_TYPE, shutdown)
            .await?;

        let payload: JsonStatusPayload = serde_json::from_slice(&response)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if payload.id.is_empty() {
            return Err(GatewayError::InvalidResponse(
                "response carries no reference id".to_string(),
            ));
        }

        info!(
            gateway = %self.name(),
            transaction_id = %request.transaction_id,
            reference_id = %payload.id,
            status = %payload.status,
            message = %payload.message,
            "gateway accepted submission"
        );

        Ok(GatewayResponse {
            reference_id: payload.id,
            status: PaymentStatus::from_wire(&payload.status),
        })
    }

    fn verify_callback(
        &self,
        expected_reference: &str,
        body: &[u8],
    ) -> Result<GatewayResponse, GatewayError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(GatewayError::InvalidCallback("empty payload".to_string()));
        }

        let payload: JsonStatusPayload = serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidCallback(format!("malformed payload: {}", e)))?;

        if payload.status.is_empty() {
            return Err(GatewayError::InvalidCallback("missing status".to_string()));
        }

        if payload.id != expected_reference {
            return Err(GatewayError::InvalidCallback(format!(
                "reference id mismatch: expected {}, got {}",
                expected_reference, payload.id
            )));
        }

        Ok(GatewayResponse {
            reference_id: payload.id,
            status: PaymentStatus::from_wire(&payload.status),
        })
    }

    fn supports_method(&self, transaction_type: TransactionType, method: PaymentMethod) -> bool {
        CARD_IN_BANK_OUT.contains(&(transaction_type, method))
    }

    fn circuit_state(&self) -> CircuitState {
        self.client.circuit_state()
    }
}
