//! Attribution persistence with time-based expiry.
//!
//! The resolver is the only writer. Readers never see an error: anything
//! absent, expired, or unparseable reads as "no prior record".
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "attribution_data": {
//!       "value": "{\"source\":\"google\",\"medium\":\"organic\",...}",
//!       "expires_at": "2026-11-14T12:00:00Z"
//!     }
//!   }
//! }
//! ```
//!
//! The record is stored as a serialized string, the way a cookie value would
//! be, so a corrupt record and a corrupt file fail independently.
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash mid-write never leaves a torn file.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{AttributionError, Result};
use crate::record::AttributionRecord;

const STORE_VERSION: u32 = 1;

/// Durable key/value persistence for attribution records.
pub trait AttributionStore {
    /// The live record at `key`, or `None` if absent, expired, or corrupt.
    fn read(&self, key: &str) -> Option<AttributionRecord>;

    /// Persists `record` at `key` until `ttl_days` from now, replacing any
    /// prior value.
    fn write(&mut self, key: &str, record: &AttributionRecord, ttl_days: i64) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl StoredEntry {
    fn new(record: &AttributionRecord, ttl_days: i64, now: DateTime<Utc>) -> Result<Self> {
        let value = serde_json::to_string(record).map_err(|source| AttributionError::Json {
            context: "serialize attribution record".to_string(),
            source,
        })?;
        let expires_at = Duration::try_days(ttl_days)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(AttributionError::TtlOutOfRange { ttl_days })?;
        Ok(StoredEntry { value, expires_at })
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    fn decode(&self, key: &str, now: DateTime<Utc>) -> Option<AttributionRecord> {
        if !self.is_live(now) {
            debug!(key, expires_at = %self.expires_at, "Stored attribution expired");
            return None;
        }
        match serde_json::from_str::<AttributionRecord>(&self.value) {
            Ok(record) => Some(record),
            Err(err) => {
                debug!(key, error = %err, "Stored attribution is corrupt, treating as absent");
                None
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-Memory Store
// ═══════════════════════════════════════════════════════════════════════════════

/// Store that lives only as long as the process. Used by tests and by hosts
/// that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, StoredEntry>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a raw payload at `key`, bypassing serialization.
    pub fn insert_raw(&mut self, key: &str, value: impl Into<String>, expires_at: DateTime<Utc>) {
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.into(),
                expires_at,
            },
        );
    }

    /// The raw payload at `key`, expired or not.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|entry| entry.value.as_str())
    }

    pub fn expires_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|entry| entry.expires_at)
    }

    /// Number of successful writes since construction.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl AttributionStore for MemoryStore {
    fn read(&self, key: &str) -> Option<AttributionRecord> {
        self.entries.get(key)?.decode(key, Utc::now())
    }

    fn write(&mut self, key: &str, record: &AttributionRecord, ttl_days: i64) -> Result<()> {
        let entry = StoredEntry::new(record, ttl_days, Utc::now())?;
        self.entries.insert(key.to_string(), entry);
        self.writes += 1;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// File-Backed Store
// ═══════════════════════════════════════════════════════════════════════════════

/// The on-disk JSON structure for the store file.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    /// Schema version. We only load files with version == 1.
    version: u32,
    entries: HashMap<String, StoredEntry>,
}

impl Default for StoreFile {
    fn default() -> Self {
        StoreFile {
            version: STORE_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// JSON-file store. Entries are loaded once and written through on every
/// `write`.
#[derive(Debug)]
pub struct FileStore {
    entries: HashMap<String, StoredEntry>,
    file_path: PathBuf,
}

impl FileStore {
    /// Loads the store at `file_path`. Missing, empty, corrupt, and
    /// wrong-version files all load as an empty store.
    pub fn load(file_path: &Path) -> Self {
        let empty = || FileStore {
            entries: HashMap::new(),
            file_path: file_path.to_path_buf(),
        };

        if !file_path.exists() {
            return empty();
        }

        let content = match fs::read_to_string(file_path) {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "Failed to read attribution store, starting empty");
                return empty();
            }
        };

        if content.trim().is_empty() {
            return empty();
        }

        match serde_json::from_str::<StoreFile>(&content) {
            Ok(store_file) if store_file.version == STORE_VERSION => FileStore {
                entries: store_file.entries,
                file_path: file_path.to_path_buf(),
            },
            Ok(store_file) => {
                warn!(
                    version = store_file.version,
                    expected = STORE_VERSION,
                    "Unsupported attribution store version, starting empty"
                );
                empty()
            }
            Err(err) => {
                warn!(error = %err, "Attribution store file is corrupt, starting empty");
                empty()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn save(&self, entries: &HashMap<String, StoredEntry>) -> Result<()> {
        let store_file = StoreFile {
            version: STORE_VERSION,
            entries: entries.clone(),
        };

        let content =
            serde_json::to_string_pretty(&store_file).map_err(|source| AttributionError::Json {
                context: "serialize attribution store".to_string(),
                source,
            })?;

        let parent_dir = self
            .file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent_dir)
            .map_err(|source| io_error("create store directory", source))?;

        let mut temp_file = NamedTempFile::new_in(parent_dir)
            .map_err(|source| io_error("create temp store file", source))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|source| io_error("write temp store file", source))?;
        temp_file
            .flush()
            .map_err(|source| io_error("flush temp store file", source))?;
        temp_file
            .persist(&self.file_path)
            .map_err(|e| io_error("replace store file", e.error))?;

        Ok(())
    }
}

fn io_error(context: &str, source: std::io::Error) -> AttributionError {
    AttributionError::Io {
        context: context.to_string(),
        source,
    }
}

impl AttributionStore for FileStore {
    fn read(&self, key: &str) -> Option<AttributionRecord> {
        self.entries.get(key)?.decode(key, Utc::now())
    }

    fn write(&mut self, key: &str, record: &AttributionRecord, ttl_days: i64) -> Result<()> {
        let now = Utc::now();
        let entry = StoredEntry::new(record, ttl_days, now)?;
        let mut entries: HashMap<String, StoredEntry> = self
            .entries
            .iter()
            .filter(|(_, existing)| existing.is_live(now))
            .map(|(k, existing)| (k.clone(), existing.clone()))
            .collect();
        entries.insert(key.to_string(), entry);

        self.save(&entries)?;
        self.entries = entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(source: &str, medium: &str) -> AttributionRecord {
        AttributionRecord {
            source: Some(source.to_string()),
            medium: Some(medium.to_string()),
            ..AttributionRecord::default()
        }
    }

    #[test]
    fn test_empty_store_reads_none() {
        let store = MemoryStore::new();
        assert!(store.read("attribution_data").is_none());
    }

    #[test]
    fn test_write_then_read() {
        let mut store = MemoryStore::new();
        store.write("k", &record("google", "organic"), 30).unwrap();
        assert_eq!(store.read("k"), Some(record("google", "organic")));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_write_overwrites_unconditionally() {
        let mut store = MemoryStore::new();
        store.write("k", &record("google", "organic"), 30).unwrap();
        store.write("k", &AttributionRecord::default(), 30).unwrap();
        assert_eq!(store.read("k"), Some(AttributionRecord::default()));
    }

    #[test]
    fn test_expiry_horizon_is_ttl_days() {
        let mut store = MemoryStore::new();
        let before = Utc::now();
        store.write("k", &record("a", "b"), 30).unwrap();
        let expires_at = store.expires_at("k").unwrap();
        assert!(expires_at >= before + Duration::days(30));
        assert!(expires_at <= Utc::now() + Duration::days(30));
    }

    #[test]
    fn test_unrepresentable_expiry_is_an_error() {
        let mut store = MemoryStore::new();
        let result = store.write("k", &record("a", "b"), 1_000_000_000);
        assert!(matches!(
            result,
            Err(AttributionError::TtlOutOfRange {
                ttl_days: 1_000_000_000
            })
        ));
        assert!(store.raw("k").is_none());
        assert_eq!(store.write_count(), 0);

        let temp = tempdir().unwrap();
        let mut file_store = FileStore::load(&temp.path().join("store.json"));
        assert!(file_store.write("k", &record("a", "b"), i64::MAX).is_err());
        assert!(file_store.read("k").is_none());
    }

    #[test]
    fn test_expired_entry_reads_none() {
        let mut store = MemoryStore::new();
        store.insert_raw(
            "k",
            r#"{"source":"google","medium":"organic"}"#,
            Utc::now() - Duration::seconds(1),
        );
        assert!(store.read("k").is_none());
    }

    #[test]
    fn test_corrupt_payload_reads_none() {
        let mut store = MemoryStore::new();
        let tomorrow = Utc::now() + Duration::days(1);
        for payload in ["{not json", "[1,2,3]", r#""just a string""#, r#"{"source":5}"#] {
            store.insert_raw("k", payload, tomorrow);
            assert!(store.read("k").is_none(), "{}", payload);
        }
    }

    #[test]
    fn test_file_store_persistence_round_trip() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("nested").join("attribution.json");

        {
            let mut store = FileStore::load(&file);
            store.write("k", &record("t.co", "referral"), 30).unwrap();
        }

        let store = FileStore::load(&file);
        assert_eq!(store.read("k"), Some(record("t.co", "referral")));
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let temp = tempdir().unwrap();
        let store = FileStore::load(&temp.path().join("missing.json"));
        assert!(store.read("k").is_none());
    }

    #[test]
    fn test_file_store_corrupt_file_is_empty() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("corrupt.json");
        fs::write(&file, "{invalid json}").unwrap();

        let mut store = FileStore::load(&file);
        assert!(store.read("k").is_none());

        store.write("k", &record("a", "b"), 30).unwrap();
        assert_eq!(FileStore::load(&file).read("k"), Some(record("a", "b")));
    }

    #[test]
    fn test_file_store_unsupported_version_is_empty() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("v9.json");
        fs::write(
            &file,
            r#"{"version":9,"entries":{"k":{"value":"{}","expires_at":"2999-01-01T00:00:00Z"}}}"#,
        )
        .unwrap();
        assert!(FileStore::load(&file).read("k").is_none());
    }

    #[test]
    fn test_file_store_prunes_expired_entries_on_write() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("store.json");
        fs::write(
            &file,
            r#"{"version":1,"entries":{"old":{"value":"{}","expires_at":"2000-01-01T00:00:00Z"}}}"#,
        )
        .unwrap();

        let mut store = FileStore::load(&file);
        store.write("k", &record("a", "b"), 30).unwrap();

        let content = fs::read_to_string(&file).unwrap();
        assert!(!content.contains("\"old\""));
        assert!(content.contains("\"k\""));
    }

    #[test]
    fn test_failed_save_leaves_entries_untouched() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("store.json");
        let mut store = FileStore::load(&file);
        store.write("k", &record("google", "organic"), 30).unwrap();

        // A plain file in place of the parent directory makes every save fail.
        let blocked = temp.path().join("blocker");
        fs::write(&blocked, "").unwrap();
        store.file_path = blocked.join("store.json");

        assert!(store.write("k", &record("t.co", "referral"), 30).is_err());
        assert!(store.write("other", &record("bing", "cpc"), 30).is_err());
        assert_eq!(store.read("k"), Some(record("google", "organic")));
        assert!(store.read("other").is_none());
    }
}
