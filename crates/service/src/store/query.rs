//! Equality filters over top-level record fields.

use common::types::Record;

use crate::errors::ServiceError;

/// Reject filters using operator keys; only plain equality is supported.
pub fn validate(filter: &Record) -> Result<(), ServiceError> {
    match filter.keys().find(|k| k.starts_with('$')) {
        Some(op) => Err(ServiceError::Query(format!("unsupported operator {op}"))),
        None => Ok(()),
    }
}

/// An empty filter matches everything.
pub fn matches(record: &Record, filter: &Record) -> bool {
    filter.iter().all(|(k, v)| record.get(k) == Some(v))
}
