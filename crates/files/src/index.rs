//! In-memory metadata index.
//!
//! Maps storage names to [`FileRecord`]s. The index never touches disk and carries no
//! persistence; it starts empty and is filled by uploads and by directory listings.

use crate::FileRecord;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Concurrent mapping from storage name to file record.
///
/// Locks are only held for the duration of a single map operation, never across an `.await`.
#[derive(Debug, Default)]
pub struct MetadataIndex {
    records: RwLock<HashMap<String, FileRecord>>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the record for `storage_name`.
    pub fn put(&self, storage_name: impl Into<String>, record: FileRecord) {
        self.write().insert(storage_name.into(), record);
    }

    /// Returns a copy of the record for `storage_name`, if any.
    pub fn get(&self, storage_name: &str) -> Option<FileRecord> {
        self.read().get(storage_name).cloned()
    }

    /// Removes and returns the record for `storage_name`. Absence is not an error.
    pub fn remove(&self, storage_name: &str) -> Option<FileRecord> {
        self.write().remove(storage_name)
    }

    /// Snapshot of every entry, in no particular order.
    pub fn entries(&self) -> Vec<(String, FileRecord)> {
        self.read()
            .iter()
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect()
    }

    /// Returns the existing record, or inserts the one built by `make` and returns that.
    pub fn get_or_insert_with(
        &self,
        storage_name: &str,
        make: impl FnOnce() -> FileRecord,
    ) -> FileRecord {
        if let Some(existing) = self.get(storage_name) {
            return existing;
        }

        self.write()
            .entry(storage_name.to_owned())
            .or_insert_with(make)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave a half-written HashMap entry behind, so a
    // poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, FileRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, FileRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn record(name: &str, original: &str) -> FileRecord {
        FileRecord {
            storage_name: name.to_owned(),
            original_name: original.to_owned(),
            size_bytes: 3,
            uploaded_at: "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap(),
        }
    }

    #[test]
    fn test_put_get_remove() {
        let index = MetadataIndex::new();
        index.put("n1", record("n1", "a.txt"));

        assert_eq!(index.get("n1").unwrap().original_name, "a.txt");
        assert_eq!(index.len(), 1);

        let removed = index.remove("n1");
        assert!(removed.is_some());
        assert!(index.get("n1").is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let index = MetadataIndex::new();

        assert!(index.remove("missing").is_none());
    }

    #[test]
    fn test_get_or_insert_prefers_existing_record() {
        let index = MetadataIndex::new();
        index.put("n1", record("n1", "original.pdf"));

        let got = index.get_or_insert_with("n1", || record("n1", "n1"));

        assert_eq!(got.original_name, "original.pdf");
    }

    #[test]
    fn test_get_or_insert_inserts_when_absent() {
        let index = MetadataIndex::new();

        let got = index.get_or_insert_with("n2", || record("n2", "n2"));

        assert_eq!(got.original_name, "n2");
        assert_eq!(index.get("n2"), Some(got));
    }

    #[test]
    fn test_entries_snapshot() {
        let index = MetadataIndex::new();
        index.put("a", record("a", "a"));
        index.put("b", record("b", "b"));

        let mut names: Vec<_> = index.entries().into_iter().map(|(n, _)| n).collect();
        names.sort();

        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_concurrent_writers() {
        let index = std::sync::Arc::new(MetadataIndex::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let index = index.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let name = format!("{}-{}", t, i);
                        index.put(name.clone(), record(&name, "x"));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(index.len(), 800);
    }
}
