//! Workbook persistence
//!
//! A key-value store of [`WorkbookRecord`]s. Updates are read-modify-write
//! on a whole record; concurrent writers to the same record are
//! last-write-wins.

use crate::{Error, Result, WorkbookConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Upload details stored with a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub rows: u32,
    pub cols: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// A persisted workbook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub formula_config: WorkbookConfig,
    pub metadata: RecordMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkbookRecord {
    /// Wrap a freshly ingested configuration
    pub fn new(config: WorkbookConfig, file_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: record_id(config.name(), now),
            name: config.name().to_string(),
            description: config.description().to_string(),
            metadata: RecordMetadata {
                rows: config.rows(),
                cols: config.cols(),
                file_name,
                uploaded_at: now,
            },
            formula_config: config,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the configuration, bumping `updated_at`
    pub fn with_config(mut self, config: WorkbookConfig) -> Self {
        self.formula_config = config;
        self.updated_at = Utc::now();
        self
    }
}

/// Record listing entry without the formula configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub metadata: RecordMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&WorkbookRecord> for WorkbookSummary {
    fn from(record: &WorkbookRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            metadata: record.metadata.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Generate a record id from a timestamp and a display name
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use vault_sheets::store::record_id;
///
/// let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap();
/// assert_eq!(record_id("My Budget (v2)", at), "20240501102030000-my-budget-v2");
/// ```
pub fn record_id(name: &str, at: DateTime<Utc>) -> String {
    let mut slug = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');

    let stamp = at.format("%Y%m%d%H%M%S%3f");
    if slug.is_empty() {
        format!("{}-workbook", stamp)
    } else {
        format!("{}-{}", stamp, slug)
    }
}

/// Storage for workbook records
pub trait WorkbookStore {
    /// Fetch a record; `None` when absent
    fn get(&self, id: &str) -> Result<Option<WorkbookRecord>>;

    /// Insert or replace a record
    fn put(&mut self, record: WorkbookRecord) -> Result<()>;

    /// Remove a record, returning whether it existed
    fn delete(&mut self, id: &str) -> Result<bool>;

    /// Every record, newest first
    fn list(&self) -> Result<Vec<WorkbookRecord>>;
}

fn newest_first(records: &mut [WorkbookRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

/// In-memory store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: HashMap<String, WorkbookRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl WorkbookStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<WorkbookRecord>> {
        Ok(self.records.get(id).cloned())
    }

    fn put(&mut self, record: WorkbookRecord) -> Result<()> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        Ok(self.records.remove(id).is_some())
    }

    fn list(&self) -> Result<Vec<WorkbookRecord>> {
        let mut records: Vec<WorkbookRecord> = self.records.values().cloned().collect();
        newest_first(&mut records);
        Ok(records)
    }
}

/// Directory of `<id>.json` files
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| Error::Store(format!("cannot create {}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a record file; `None` for ids that could escape the directory
    fn path(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.root.join(format!("{}.json", id)))
    }

    fn read_record(path: &Path) -> Result<WorkbookRecord> {
        let bytes = fs::read(path)
            .map_err(|e| Error::Store(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Store(format!("corrupt record {}: {}", path.display(), e)))
    }
}

impl WorkbookStore for FileStore {
    fn get(&self, id: &str) -> Result<Option<WorkbookRecord>> {
        let Some(path) = self.path(id) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::read_record(&path).map(Some)
    }

    fn put(&mut self, record: WorkbookRecord) -> Result<()> {
        let path = self
            .path(&record.id)
            .ok_or_else(|| Error::Store(format!("invalid record id: {}", record.id)))?;
        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| Error::Store(format!("cannot serialize {}: {}", record.id, e)))?;

        // Write then rename so readers never see a half-written record
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| Error::Store(format!("cannot write {}: {}", path.display(), e)))?;

        tracing::debug!(id = %record.id, path = %path.display(), "stored workbook");
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let Some(path) = self.path(id) else {
            return Ok(false);
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Store(format!(
                "cannot delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn list(&self) -> Result<Vec<WorkbookRecord>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| Error::Store(format!("cannot list {}: {}", self.root.display(), e)))?;

        let mut records = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable store entry");
                    continue;
                }
            };
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "skipping unreadable record"),
            }
        }

        newest_first(&mut records);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{default_workbook, CellAddress};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn record(name: &str, minutes: i64) -> WorkbookRecord {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        let mut record = WorkbookRecord::new(default_workbook(), Some("box.xlsx".into()));
        record.id = record_id(name, at);
        record.name = name.to_string();
        record.created_at = at;
        record.updated_at = at;
        record
    }

    fn exercise(store: &mut dyn WorkbookStore) {
        let older = record("Older", 0);
        let newer = record("Newer", 5);

        store.put(older.clone()).unwrap();
        store.put(newer.clone()).unwrap();

        assert_eq!(store.get(&older.id).unwrap(), Some(older.clone()));
        assert_eq!(store.get("missing").unwrap(), None);

        let ids: Vec<String> = store.list().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![newer.id.clone(), older.id.clone()]);

        // Last write wins
        let b1 = CellAddress::new(0, 1);
        let demoted = older
            .clone()
            .with_config(older.formula_config.with_input_flag(b1, false).unwrap());
        store.put(demoted).unwrap();
        let stored = store.get(&older.id).unwrap().unwrap();
        assert!(!stored.formula_config.cell(b1).unwrap().is_input);

        assert!(store.delete(&older.id).unwrap());
        assert!(!store.delete(&older.id).unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        exercise(&mut store);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("records")).unwrap();
        exercise(&mut store);

        // A second handle sees the same data
        let reopened = FileStore::open(store.root()).unwrap();
        assert_eq!(reopened.list().unwrap().len(), 1);
    }

    #[test]
    fn test_file_store_rejects_path_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();

        assert_eq!(store.get("../etc/passwd").unwrap(), None);
        assert!(!store.delete("../x").unwrap());

        let mut bad = record("x", 0);
        bad.id = "a/b".into();
        assert!(matches!(store.put(bad), Err(Error::Store(_))));
    }

    #[test]
    fn test_file_store_skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store.put(record("Good", 0)).unwrap();
        fs::write(dir.path().join("broken.json"), b"{not json").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        assert!(matches!(store.get("broken"), Err(Error::Store(_))));
    }

    #[test]
    fn test_record_json_shape() {
        let record = record("Box", 0);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["metadata"]["fileName"], "box.xlsx");
        assert_eq!(json["metadata"]["rows"], 20);
        assert!(json["formulaConfig"]["cells"].is_array());
        assert_eq!(json["createdAt"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_record_id() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap();
        assert_eq!(record_id("  ", at), "20240501102030000-workbook");
        assert_eq!(record_id("Q3 -- Costs!", at), "20240501102030000-q3-costs");
    }
}
