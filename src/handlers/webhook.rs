use axum::{
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// Gateway callback. The raw body goes to the reconciler untouched because
/// each gateway has its own wire format.
pub async fn callback(
    State(state): State<AppState>,
    Path((wallet_id, transaction_id)): Path<(Uuid, Uuid)>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let tx = state
        .reconciler
        .process_callback(wallet_id, transaction_id, &body)
        .await?;

    Ok(Json(tx))
}
