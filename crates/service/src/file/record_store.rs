use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use common::types::{Record, ID_FIELD};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use tokio::fs::File;
use tokio::sync::RwLock;
use tracing::info;

use crate::errors::ServiceError;
use crate::storage::datafile::{self, Datafile};
use crate::store::{query, RecordStore};

const ID_LEN: usize = 16;

struct State {
    records: Vec<Record>,
    ids: HashSet<String>,
    file: File,
}

/// File-backed record store.
///
/// The whole collection lives in memory; every insert is appended to the
/// datafile before it becomes visible. The datafile is compacted once on open.
pub struct FileRecordStore {
    state: RwLock<State>,
}

impl FileRecordStore {
    /// Load the datafile at `path` (creating it if missing) and compact it.
    pub async fn open<P: Into<PathBuf>>(
        path: P,
        corrupt_alert_threshold: f64,
    ) -> Result<Arc<Self>, ServiceError> {
        let df = Datafile::new(path);
        let loaded = df.load(corrupt_alert_threshold).await?;
        df.compact(&loaded.records).await?;
        let file = df.open_append().await?;

        let ids = loaded
            .records
            .iter()
            .filter_map(|r| r.get(ID_FIELD).map(datafile::id_key))
            .collect();

        info!(
            event = "store_loaded",
            path = %df.path().display(),
            records = loaded.records.len(),
            corrupt = loaded.corrupt,
            "record store ready"
        );
        Ok(Arc::new(Self {
            state: RwLock::new(State { records: loaded.records, ids, file }),
        }))
    }
}

fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn insert(&self, mut record: Record) -> Result<Record, ServiceError> {
        let mut state = self.state.write().await;

        let key = match record.get(ID_FIELD) {
            Some(v) if !v.is_null() => {
                let key = datafile::id_key(v);
                if state.ids.contains(&key) {
                    return Err(ServiceError::UniqueViolation(key));
                }
                key
            }
            _ => {
                let mut id = generate_id();
                while state.ids.contains(&id) {
                    id = generate_id();
                }
                record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };

        // on disk first; a failed write leaves memory untouched
        datafile::append_record(&mut state.file, &record).await?;
        state.ids.insert(key);
        state.records.push(record.clone());
        Ok(record)
    }

    async fn find(&self, filter: &Record) -> Result<Vec<Record>, ServiceError> {
        query::validate(filter)?;
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|r| query::matches(r, filter))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, ServiceError> {
        Ok(self.state.read().await.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn tmp_path() -> PathBuf {
        std::env::temp_dir().join(format!("record_store_{}.db", Uuid::new_v4()))
    }

    fn obj(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_id_and_keeps_fields() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        let store = FileRecordStore::open(&tmp, 0.1).await?;

        let stored = store.insert(obj(json!({"lat": 40.7, "lon": -74.0}))).await?;
        assert_eq!(stored.len(), 3);
        assert_eq!(stored["lat"], json!(40.7));
        assert_eq!(stored["lon"], json!(-74.0));
        let id = stored[ID_FIELD].as_str().unwrap();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        // identifier is appended after the submitted fields
        assert_eq!(stored.keys().last().map(String::as_str), Some(ID_FIELD));

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn find_all_in_insertion_order_with_distinct_ids() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        let store = FileRecordStore::open(&tmp, 0.1).await?;
        assert!(store.find_all().await?.is_empty());

        let a = store.insert(obj(json!({"n": 1}))).await?;
        let b = store.insert(obj(json!({"n": 2}))).await?;
        assert_ne!(a[ID_FIELD], b[ID_FIELD]);

        let all = store.find_all().await?;
        assert_eq!(all, vec![a, b]);
        assert_eq!(store.count().await?, 2);

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn records_survive_reopen() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        let inserted = {
            let store = FileRecordStore::open(&tmp, 0.1).await?;
            let first = store.insert(obj(json!({"lat": 1.0, "nested": {"k": [1, 2]}}))).await?;
            let second = store.insert(obj(json!({"lat": 2.0}))).await?;
            vec![first, second]
        };

        let reopened = FileRecordStore::open(&tmp, 0.1).await?;
        assert_eq!(reopened.find_all().await?, inserted);

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn dollar_prefixed_fields_survive_reopen() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        let inserted = {
            let store = FileRecordStore::open(&tmp, 0.1).await?;
            let a = store.insert(obj(json!({"lat": 1.0, "$$deleted": true}))).await?;
            let b = store.insert(obj(json!({"lat": 2.0, "$$indexCreated": "x"}))).await?;
            vec![a, b]
        };

        let reopened = FileRecordStore::open(&tmp, 0.1).await?;
        assert_eq!(reopened.find_all().await?, inserted);

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn client_id_is_kept_and_must_be_unique() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        let store = FileRecordStore::open(&tmp, 0.1).await?;

        let stored = store.insert(obj(json!({"_id": "mine", "v": 1}))).await?;
        assert_eq!(stored, obj(json!({"_id": "mine", "v": 1})));

        let err = store.insert(obj(json!({"_id": "mine", "v": 2}))).await.unwrap_err();
        assert!(matches!(err, ServiceError::UniqueViolation(ref id) if id == "mine"));
        assert_eq!(store.count().await?, 1);

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn find_filters_by_equality() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        let store = FileRecordStore::open(&tmp, 0.1).await?;
        store.insert(obj(json!({"device": "a", "lat": 1}))).await?;
        store.insert(obj(json!({"device": "b", "lat": 2}))).await?;
        store.insert(obj(json!({"device": "a", "lat": 3}))).await?;

        let hits = store.find(&obj(json!({"device": "a"}))).await?;
        let lats: Vec<_> = hits.iter().map(|r| r["lat"].clone()).collect();
        assert_eq!(lats, vec![json!(1), json!(3)]);

        let err = store.find(&obj(json!({"$where": "x"}))).await.unwrap_err();
        assert!(matches!(err, ServiceError::Query(_)));

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_inserts_are_all_persisted() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        let store = FileRecordStore::open(&tmp, 0.1).await?;

        let mut handles = Vec::new();
        for n in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.insert(obj(json!({"n": n}))).await }));
        }
        for h in handles {
            h.await??;
        }
        assert_eq!(store.count().await?, 20);

        let raw = tokio::fs::read_to_string(&tmp).await?;
        assert_eq!(raw.lines().count(), 20);

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }
}
