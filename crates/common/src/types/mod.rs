use serde::{Deserialize, Serialize};

/// A schema-less document as submitted by a client.
///
/// Key order is kept as submitted so responses echo the payload faithfully.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Key under which every stored record carries its identifier.
pub const ID_FIELD: &str = "_id";

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    pub status: &'static str,
}

/// Read the identifier of a record, if it has a string one.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(|v| v.as_str())
}
