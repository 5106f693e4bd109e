use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::{
    CircuitState, GatewayError, GatewayName, GatewayRequest, GatewayResponse, PaymentGateway,
    Shutdown,
};
use crate::domain::{PaymentMethod, PaymentMethodDetails, TransactionType};

/// Registry of gateway adapters keyed by name.
#[derive(Clone, Default)]
pub struct GatewayRouter {
    gateways: HashMap<GatewayName, Arc<dyn PaymentGateway>>,
}

impl GatewayRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.name().clone(), gateway);
        self
    }

    fn resolve(&self, name: &GatewayName) -> Result<&Arc<dyn PaymentGateway>, GatewayError> {
        self.gateways
            .get(name)
            .ok_or_else(|| GatewayError::UnknownGateway(name.clone()))
    }

    fn ensure_supported(
        gateway: &dyn PaymentGateway,
        transaction_type: TransactionType,
        method: PaymentMethod,
    ) -> Result<(), GatewayError> {
        if !gateway.supports_method(transaction_type, method) {
            return Err(GatewayError::UnsupportedMethod {
                gateway: gateway.name().clone(),
                transaction_type,
                method,
            });
        }
        Ok(())
    }

    /// Checks the gateway exists and accepts `method` for `transaction_type`,
    /// then validates the caller's details for that method.
    pub fn verify_method(
        &self,
        name: &GatewayName,
        transaction_type: TransactionType,
        method: PaymentMethod,
        method_details: &Value,
    ) -> Result<PaymentMethodDetails, GatewayError> {
        let gateway = self.resolve(name)?;
        Self::ensure_supported(gateway.as_ref(), transaction_type, method)?;
        Ok(PaymentMethodDetails::parse(method, method_details)?)
    }

    /// Dispatches a submission. Unknown gateways and unsupported methods are
    /// rejected before any network call.
    pub async fn submit(
        &self,
        name: &GatewayName,
        transaction_type: TransactionType,
        request: &GatewayRequest,
        shutdown: &Shutdown,
    ) -> Result<GatewayResponse, GatewayError> {
        let gateway = self.resolve(name)?;
        Self::ensure_supported(
            gateway.as_ref(),
            transaction_type,
            request.payment_details.method(),
        )?;
        gateway.submit(transaction_type, request, shutdown).await
    }

    pub fn verify_callback(
        &self,
        name: &GatewayName,
        expected_reference: &str,
        body: &[u8],
    ) -> Result<GatewayResponse, GatewayError> {
        self.resolve(name)?.verify_callback(expected_reference, body)
    }

    /// Breaker state of every registered gateway, sorted by name.
    pub fn circuit_states(&self) -> Vec<(GatewayName, CircuitState)> {
        let mut states: Vec<_> = self
            .gateways
            .iter()
            .map(|(name, gateway)| (name.clone(), gateway.circuit_state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}
