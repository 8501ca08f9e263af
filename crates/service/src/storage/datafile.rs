//! Append-only, newline-delimited JSON datafile.
//!
//! One document per line, written verbatim. Later lines win over earlier
//! ones with the same `_id`. Lines are never interpreted beyond that, so any
//! field a client submits round-trips unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use common::types::{Record, ID_FIELD};
use serde_json::Value;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::errors::ServiceError;

/// Result of reading a datafile back into memory.
#[derive(Debug, Default)]
pub struct Loaded {
    /// Live documents in order of first appearance.
    pub records: Vec<Record>,
    /// Unparseable lines that were skipped.
    pub corrupt: usize,
}

#[derive(Debug, Clone)]
pub struct Datafile {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl Datafile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let mut tmp = path.clone().into_os_string();
        tmp.push("~");
        Self { path, tmp_path: PathBuf::from(tmp) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make sure a datafile exists, recovering an interrupted compaction if needed.
    pub async fn ensure_integrity(&self) -> Result<(), ServiceError> {
        if fs::metadata(&self.path).await.is_ok() {
            return Ok(());
        }
        if fs::metadata(&self.tmp_path).await.is_ok() {
            warn!(path = %self.path.display(), "datafile missing, recovering from compaction temp file");
            fs::rename(&self.tmp_path, &self.path).await?;
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&self.path, b"").await?;
        Ok(())
    }

    /// Read every line and rebuild the live document set.
    ///
    /// Fails with [`ServiceError::Corrupt`] when the share of unreadable lines
    /// is above `corrupt_alert_threshold`.
    pub async fn load(&self, corrupt_alert_threshold: f64) -> Result<Loaded, ServiceError> {
        self.ensure_integrity().await?;
        let raw = fs::read_to_string(&self.path).await?;
        let loaded = parse_lines(&raw);

        let total = loaded.total;
        if total > 0 && (loaded.corrupt as f64 / total as f64) > corrupt_alert_threshold {
            return Err(ServiceError::Corrupt { corrupt: loaded.corrupt, total });
        }
        if loaded.corrupt > 0 {
            warn!(path = %self.path.display(), corrupt = loaded.corrupt, total, "skipped unreadable datafile lines");
        }
        Ok(Loaded { records: loaded.records, corrupt: loaded.corrupt })
    }

    /// Rewrite the datafile with exactly `records`, crash-safely.
    ///
    /// The new content goes to `<path>~` first and is synced before being
    /// renamed over the datafile.
    pub async fn compact(&self, records: &[Record]) -> Result<(), ServiceError> {
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }
        let mut tmp = File::create(&self.tmp_path).await?;
        tmp.write_all(&buf).await?;
        tmp.flush().await?;
        tmp.sync_all().await?;
        drop(tmp);
        fs::rename(&self.tmp_path, &self.path).await?;
        info!(path = %self.path.display(), records = records.len(), "datafile compacted");
        Ok(())
    }

    /// Open the datafile for appending; the handle is meant to be held for the store's lifetime.
    ///
    /// A torn last line (no trailing newline) is cut off first so the next
    /// append starts on a fresh line.
    pub async fn open_append(&self) -> Result<File, ServiceError> {
        let raw = fs::read(&self.path).await.unwrap_or_default();
        let keep = raw.iter().rposition(|b| *b == b'\n').map_or(0, |p| p + 1);
        let file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        if keep < raw.len() {
            warn!(path = %self.path.display(), dropped = raw.len() - keep, "truncating torn datafile tail");
            file.set_len(keep as u64).await?;
        }
        Ok(file)
    }
}

/// Append one document as a single line and wait until it reaches the disk.
///
/// On failure the file is cut back to its previous length so a partial line
/// never prefixes the next append.
pub async fn append_record(file: &mut File, record: &Record) -> Result<(), ServiceError> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    let start = file.metadata().await?.len();
    if let Err(e) = write_line(file, &line).await {
        if let Err(trunc) = file.set_len(start).await {
            warn!(error = %trunc, len = start, "could not roll back partial datafile append");
        }
        return Err(e.into());
    }
    Ok(())
}

async fn write_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line).await?;
    file.flush().await?;
    file.sync_data().await
}

/// Index key for an `_id` value. Non-string identifiers are keyed by their JSON text.
pub fn id_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

struct Parsed {
    records: Vec<Record>,
    corrupt: usize,
    total: usize,
}

fn parse_lines(raw: &str) -> Parsed {
    let mut records: Vec<Record> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut corrupt = 0;
    let mut total = 0;

    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        total += 1;
        let doc = match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(doc)) => doc,
            _ => {
                corrupt += 1;
                continue;
            }
        };

        let id = match doc.get(ID_FIELD) {
            Some(v) if !v.is_null() => id_key(v),
            _ => {
                corrupt += 1;
                continue;
            }
        };

        match by_id.get(&id) {
            Some(&pos) => records[pos] = doc,
            None => {
                by_id.insert(id, records.len());
                records.push(doc);
            }
        }
    }

    Parsed { records, corrupt, total }
}
