use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use common::types::{record_id, Record};
use tracing::{error, info};

use crate::errors::JsonApiError;
use crate::extract::JsonRecord;
use crate::state::AppState;

/// 接收客户端提交的记录，写入存储后原样返回（附带 `_id`）
pub async fn submit(
    State(state): State<AppState>,
    JsonRecord(record): JsonRecord,
) -> Result<Json<Record>, JsonApiError> {
    let stored = state.store.insert(record).await.map_err(|e| {
        error!(service = "server", event = "record_insert_failed", error = %e, "insert failed");
        JsonApiError::internal(e.to_string())
    })?;
    info!(service = "server", event = "record_inserted", id = record_id(&stored).unwrap_or_default());
    Ok(Json(stored))
}

/// 返回全部记录。
///
/// A store failure ends the response with no body and the default status;
/// no partial data is ever written.
pub async fn list_all(State(state): State<AppState>) -> Response {
    match state.store.find_all().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            error!(service = "server", event = "store_read_failed", error = %e, "find_all failed; ending response");
            Response::default()
        }
    }
}
