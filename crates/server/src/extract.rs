use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderMap, StatusCode};
use common::types::Record;
use serde_json::Value;

use crate::errors::JsonApiError;

/// Extracts a request body that must be a single JSON object.
///
/// Oversize bodies are rejected with 413; everything else that is not a JSON
/// object (wrong content type, empty body, syntax error, array or scalar) with 400.
#[derive(Debug)]
pub struct JsonRecord(pub Record);

#[async_trait]
impl<S> FromRequest<S> for JsonRecord
where
    S: Send + Sync,
{
    type Rejection = JsonApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = json_content_type(req.headers());
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                JsonApiError::payload_too_large(rejection.body_text())
            } else {
                JsonApiError::bad_request(rejection.body_text())
            }
        })?;

        if !is_json {
            return Err(JsonApiError::bad_request("expected `Content-Type: application/json`"));
        }
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(record)) => Ok(JsonRecord(record)),
            Ok(_) => Err(JsonApiError::bad_request("body must be a JSON object")),
            Err(e) => Err(JsonApiError::bad_request(format!("malformed JSON: {e}"))),
        }
    }
}

fn json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}
