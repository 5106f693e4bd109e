pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod startup;
pub mod utils;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::config::{Config, GATEWAY_A, GATEWAY_B};
use crate::gateway::retrier::InvalidRetryConfig;
use crate::gateway::{GatewayClient, GatewayRouter, JsonGateway, SoapGateway};
use crate::health::HealthChecker;
use crate::middleware::request_logger::{request_logger_middleware, RequestLogConfig};
use crate::services::{PaymentService, Reconciler};

#[derive(Clone)]
pub struct AppState {
    pub payments: PaymentService,
    pub reconciler: Reconciler,
    pub health: HealthChecker,
    pub request_log: RequestLogConfig,
}

/// Registers the JSON gateway as `gateway_a` and the SOAP gateway as
/// `gateway_b`.
pub fn build_gateway_router(config: &Config) -> Result<GatewayRouter, InvalidRetryConfig> {
    let gateway_a = GatewayClient::new(GATEWAY_A.into(), &config.gateway_a)?;
    let gateway_b = GatewayClient::new(GATEWAY_B.into(), &config.gateway_b)?;

    Ok(GatewayRouter::new()
        .register(Arc::new(JsonGateway::new(gateway_a)))
        .register(Arc::new(SoapGateway::new(gateway_b))))
}

pub fn create_app(state: AppState) -> Router {
    let request_log = state.request_log;

    let wallets = Router::new()
        .route(
            "/wallets",
            get(handlers::wallets::list_wallets).post(handlers::wallets::create_wallet),
        )
        .route("/wallets/:wallet_id/deposit", post(handlers::wallets::deposit))
        .route("/wallets/:wallet_id/withdraw", post(handlers::wallets::withdraw))
        .route(
            "/wallets/:wallet_id/transactions",
            get(handlers::wallets::list_transactions),
        )
        .route(
            "/wallets/:wallet_id/transactions/:transaction_id",
            get(handlers::wallets::get_transaction),
        )
        .route(
            "/wallets/:wallet_id/transactions/:transaction_id/callback",
            post(handlers::webhook::callback),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", wallets)
        .layer(axum::middleware::from_fn_with_state(
            request_log,
            request_logger_middleware,
        ))
        .with_state(state)
}
