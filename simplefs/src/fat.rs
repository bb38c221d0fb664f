use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::fs::BLOCK_SIZE;

/// The storage location and payload of a live file. Content occupies one block per byte, so
/// the record's length is always the content length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    start: usize,
    content: Vec<u8>,
}

impl Record {
    pub fn new(start: usize, content: Vec<u8>) -> Self {
        Self { start, content }
    }

    /// The first block holding the content.
    pub fn start(&self) -> usize {
        self.start
    }

    /// The number of blocks occupied.
    pub fn length(&self) -> usize {
        self.content.len()
    }

    /// The byte address of the first block.
    pub fn address(&self) -> usize {
        self.start * BLOCK_SIZE
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn blocks(&self) -> Range<usize> {
        self.start..self.start + self.length()
    }
}

/// A slot in the allocation table. Deleting a file leaves a tombstone behind so the key stays
/// known to the table while reading as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entry {
    Live(Record),
    Tombstone,
}

impl Entry {
    pub fn live(&self) -> Option<&Record> {
        match self {
            Entry::Live(record) => Some(record),
            Entry::Tombstone => None,
        }
    }

    /// Tombstones occupy no blocks.
    pub fn length(&self) -> usize {
        self.live().map_or(0, Record::length)
    }

    pub fn start(&self) -> Option<usize> {
        self.live().map(Record::start)
    }
}

/// The flat file allocation table, keyed by normalized path. It is the only owner of file
/// records; the directory tree refers back to it by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationTable {
    entries: BTreeMap<String, Entry>,
}

impl AllocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: BTreeMap<String, Entry>) -> Self {
        Self { entries }
    }

    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.entries.get(key).and_then(Entry::live)
    }

    pub fn is_live(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Stores a live record, replacing a tombstone if one is present.
    pub fn insert(&mut self, key: String, record: Record) {
        let prior = self.entries.insert(key, Entry::Live(record));
        debug_assert!(
            prior.as_ref().and_then(Entry::live).is_none(),
            "live record replaced without being freed"
        );
    }

    /// Replaces a live record with a tombstone, returning the record. Returns `None` and leaves
    /// the table untouched if the key has no live record.
    pub fn tombstone(&mut self, key: &str) -> Option<Record> {
        let slot = self.entries.get_mut(key)?;
        match std::mem::replace(slot, Entry::Tombstone) {
            Entry::Live(record) => Some(record),
            Entry::Tombstone => None,
        }
    }

    /// All entries, tombstones included, in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Live records in key order.
    pub fn live(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.live().map(|r| (k.as_str(), r)))
    }

    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    pub(crate) fn raw(&self) -> &BTreeMap<String, Entry> {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_reports_extent_and_address() {
        let record = Record::new(3, b"abcd".to_vec());
        assert_eq!(record.length(), 4);
        assert_eq!(record.blocks(), 3..7);
        assert_eq!(record.address(), 3 * BLOCK_SIZE);
    }

    #[test]
    fn tombstone_hides_record_but_keeps_key() {
        let mut fat = AllocationTable::new();
        fat.insert("a".to_string(), Record::new(0, b"xx".to_vec()));

        let freed = fat.tombstone("a").unwrap();
        assert_eq!(freed.blocks(), 0..2);

        assert!(fat.get("a").is_none());
        let entry = fat.entry("a").unwrap();
        assert_eq!(entry, &Entry::Tombstone);
        assert_eq!(entry.length(), 0);
        assert_eq!(entry.start(), None);
    }

    #[test]
    fn tombstoning_twice_or_missing_key_is_a_no_op() {
        let mut fat = AllocationTable::new();
        assert!(fat.tombstone("missing").is_none());
        assert!(fat.entry("missing").is_none());

        fat.insert("a".to_string(), Record::new(0, b"x".to_vec()));
        assert!(fat.tombstone("a").is_some());
        assert!(fat.tombstone("a").is_none());
    }

    #[test]
    fn live_iteration_skips_tombstones() {
        let mut fat = AllocationTable::new();
        fat.insert("b".to_string(), Record::new(1, b"y".to_vec()));
        fat.insert("a".to_string(), Record::new(0, b"x".to_vec()));
        fat.insert("c".to_string(), Record::new(2, b"z".to_vec()));
        fat.tombstone("c");

        let keys: Vec<&str> = fat.live().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(fat.entries().count(), 3);
        assert_eq!(fat.live_count(), 2);
    }
}
