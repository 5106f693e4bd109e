use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::PaymentInstruction;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: BigDecimal,
    pub payment: PaymentInstruction,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::InvalidArgument(rejection.body_text()))
}

pub async fn create_wallet(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let wallet = state.payments.create_wallet().await?;
    Ok((StatusCode::CREATED, Json(wallet)))
}

pub async fn list_wallets(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.payments.list_wallets().await?))
}

pub async fn deposit(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let tx = state
        .payments
        .deposit(wallet_id, request.amount, request.payment)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(tx)))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let tx = state
        .payments
        .withdraw(wallet_id, request.amount, request.payment)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(tx)))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.payments.list_transactions(wallet_id).await?))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path((wallet_id, transaction_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(
        state
            .payments
            .get_transaction(wallet_id, transaction_id)
            .await?,
    ))
}
