use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alloc::{Bitmap, State};
use crate::fat::{AllocationTable, Entry, Record};
use crate::path;
use crate::tree::{DirEntry, DirectoryTree, Node};

/// Nominal bytes per block. Content is accounted one block per byte, this only scales the
/// reported address of a file.
pub const BLOCK_SIZE: usize = 1024;

pub const DEFAULT_BLOCK_COUNT: usize = 1024;

#[derive(Error, Debug)]
pub enum SFSError {
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    #[error("found no file at path {0:?}")]
    PathNotFound(String),
    #[error("a file already exists at {0:?}")]
    AlreadyExists(String),
    #[error("{0:?} is a file, not a directory")]
    NotADirectory(String),
    #[error("{0:?} is a directory")]
    IsADirectory(String),
    #[error("no run of {requested} free blocks ({free} blocks free in total)")]
    InsufficientSpace { requested: usize, free: usize },
    #[error("inconsistent volume state: {0}")]
    CorruptState(String),
    #[error("invalid volume image: {0}")]
    CorruptImage(String),
    #[error("could not access volume image")]
    Io(#[from] std::io::Error),
    #[error("could not encode volume state")]
    Encoding(#[from] bincode::Error),
}

/// The result of reading a live file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileView<'a> {
    pub length: usize,
    pub content: &'a [u8],
}

/// Where a live file is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub start: usize,
    pub length: usize,
    pub address: usize,
}

/// A complete, self-contained copy of a volume: allocation bitmap, allocation table (tombstones
/// included) and directory tree. Produced by [`Volume::export_state`] and consumed by
/// [`Volume::import_state`]; the byte encoding is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeState {
    pub block_count: usize,
    pub bitmap: Vec<u64>,
    pub entries: BTreeMap<String, Entry>,
    pub tree: DirectoryTree,
}

/// An in-memory, single volume file system. Files are stored contiguously in a fixed number of
/// blocks tracked by a bitmap, located through a flat allocation table keyed by path, and
/// indexed by a directory tree that mirrors the path namespace.
///
/// # Layout
/// ==================================================================
/// | Bitmap (block states) | Allocation table | Directory tree index |
/// ==================================================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    data_map: Bitmap,
    fat: AllocationTable,
    tree: DirectoryTree,
}

impl Default for Volume {
    fn default() -> Self {
        VolumeBuilder::new().build()
    }
}

impl Volume {
    pub fn new(block_count: usize) -> Self {
        VolumeBuilder::new().with_block_count(block_count).build()
    }

    /// Stores `content` at `path`, occupying one block per byte in the lowest run of free
    /// blocks large enough to hold it.
    ///
    /// # Errors
    ///
    /// Fails without modifying the volume if the path is malformed, already names a live file
    /// or a directory, passes through a file, or no free run is large enough.
    pub fn create<C: Into<Vec<u8>>>(&mut self, path: &str, content: C) -> Result<(), SFSError> {
        let (key, segments) = path::normalize(path)?;
        let content = content.into();

        if self.fat.is_live(&key) {
            warn!("Refusing to create {:?}: file exists.", key);
            return Err(SFSError::AlreadyExists(key));
        }
        self.tree.check_insert(&segments)?;

        let size = content.len();
        let start = match self.data_map.find_contiguous(size) {
            Some(start) => start,
            None => {
                warn!("No run of {} free blocks for {:?}.", size, key);
                return Err(SFSError::InsufficientSpace {
                    requested: size,
                    free: self.data_map.free_blocks(),
                });
            }
        };

        self.data_map.mark(start, size, true);
        self.fat.insert(key.clone(), Record::new(start, content));
        self.tree.insert(&segments, key.clone());
        debug!("Created {:?} at blocks {}..{}.", key, start, start + size);
        Ok(())
    }

    /// Frees the blocks of the file at `path` and removes it from the directory tree. The
    /// allocation table keeps a zero length tombstone under the path.
    ///
    /// # Errors
    ///
    /// Returns [`SFSError::PathNotFound`] without modifying the volume if no live file exists at
    /// the path.
    pub fn delete(&mut self, path: &str) -> Result<(), SFSError> {
        let (key, segments) = path::normalize(path)?;
        self.remove_live(&key, &segments)
            .map(|_| ())
            .ok_or(SFSError::PathNotFound(key))
    }

    fn remove_live(&mut self, key: &str, segments: &[&str]) -> Option<Record> {
        let record = self.fat.tombstone(key)?;
        self.data_map.mark(record.start(), record.length(), false);
        let leaf_key = self.tree.remove(segments);
        debug_assert_eq!(leaf_key, key);
        debug!("Deleted {:?}, freed blocks {:?}.", key, record.blocks());
        Some(record)
    }

    /// Returns the length and content of the live file at `path`. Missing, deleted and malformed
    /// paths all read as `None`.
    pub fn read(&self, path: &str) -> Option<FileView<'_>> {
        let (key, _) = path::normalize(path).ok()?;
        self.fat.get(&key).map(|record| FileView {
            length: record.length(),
            content: record.content(),
        })
    }

    pub fn stat(&self, path: &str) -> Result<FileStat, SFSError> {
        let (key, _) = path::normalize(path)?;
        match self.fat.get(&key) {
            Some(record) => Ok(FileStat {
                start: record.start(),
                length: record.length(),
                address: record.address(),
            }),
            None => Err(SFSError::PathNotFound(key)),
        }
    }

    /// Replaces the file at `path` by deleting it and creating it again with `content`, so the
    /// file may move to a different block range. A path with no live file is simply created.
    ///
    /// If the new content does not fit, the previous content is put back in its original blocks
    /// and [`SFSError::InsufficientSpace`] is returned.
    pub fn write<C: Into<Vec<u8>>>(&mut self, path: &str, content: C) -> Result<(), SFSError> {
        let (key, segments) = path::normalize(path)?;
        let previous = self.remove_live(&key, &segments);

        match (self.create(&key, content), previous) {
            (Err(SFSError::InsufficientSpace { requested, .. }), Some(record)) => {
                // The failed create reserved nothing, so the old range is still free.
                self.data_map.mark(record.start(), record.length(), true);
                self.fat.insert(key.clone(), record);
                self.tree.insert(&segments, key.clone());
                warn!("Write to {:?} did not fit, restored previous content.", key);
                Err(SFSError::InsufficientSpace {
                    requested,
                    free: self.data_map.free_blocks(),
                })
            }
            (result, _) => result,
        }
    }

    /// Discards every file and directory and frees all blocks.
    pub fn reset(&mut self) {
        self.data_map = Bitmap::new(self.data_map.len());
        self.fat.clear();
        self.tree.clear();
        debug!("Reset volume of {} blocks.", self.data_map.len());
    }

    /// Lists the directory at `path`; `""` and `"/"` name the root.
    pub fn list(&self, path: &str) -> Result<Vec<DirEntry>, SFSError> {
        let segments = path::normalize_dir(path)?;
        self.tree.list(&segments)
    }

    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.data_map
    }

    pub fn table(&self) -> &AllocationTable {
        &self.fat
    }

    pub fn block_count(&self) -> usize {
        self.data_map.len()
    }

    pub fn free_blocks(&self) -> usize {
        self.data_map.free_blocks()
    }

    pub fn export_state(&self) -> VolumeState {
        VolumeState {
            block_count: self.data_map.len(),
            bitmap: self.data_map.words().to_vec(),
            entries: self.fat.raw().clone(),
            tree: self.tree.clone(),
        }
    }

    /// Replaces this volume with `state` after checking that its bitmap, allocation table and
    /// directory tree agree with one another. On error the volume is left unchanged.
    pub fn import_state(&mut self, state: VolumeState) -> Result<(), SFSError> {
        *self = Volume::from_state(state)?;
        Ok(())
    }

    /// Builds a volume from a previously exported state. See [`Volume::import_state`].
    pub fn from_state(state: VolumeState) -> Result<Self, SFSError> {
        let VolumeState {
            block_count,
            bitmap,
            entries,
            tree,
        } = state;

        let data_map = Bitmap::from_words(bitmap, block_count).ok_or_else(|| {
            SFSError::CorruptState(format!("bitmap does not describe {} blocks", block_count))
        })?;

        // Rebuild the bitmap from the live records, catching overlaps and out of range extents.
        let mut expected = Bitmap::new(block_count);
        for (key, entry) in &entries {
            let record = match entry {
                Entry::Live(record) => record,
                Entry::Tombstone => continue,
            };
            if path::normalize(key).map(|(k, _)| k != *key).unwrap_or(true) {
                return Err(SFSError::CorruptState(format!(
                    "record key {:?} is not a normalized path",
                    key
                )));
            }
            let end = record.start().checked_add(record.length());
            if end.map_or(true, |end| end > block_count) {
                return Err(SFSError::CorruptState(format!(
                    "{:?} extends past block {}",
                    key, block_count
                )));
            }
            if record.blocks().any(|b| expected.get(b) == State::Used) {
                return Err(SFSError::CorruptState(format!(
                    "{:?} overlaps another file",
                    key
                )));
            }
            expected.mark(record.start(), record.length(), true);
        }
        if expected != data_map {
            return Err(SFSError::CorruptState(
                "bitmap disagrees with allocation table".to_string(),
            ));
        }

        let fat = AllocationTable::from_entries(entries);
        tree.check_names().map_err(|path| {
            SFSError::CorruptState(format!("tree entry {:?} is not a valid path", path))
        })?;
        let mut leaves = BTreeSet::new();
        for (resolved, key) in tree.files() {
            if resolved != key || !fat.is_live(key) || !leaves.insert(resolved.clone()) {
                return Err(SFSError::CorruptState(format!(
                    "tree entry {:?} has no matching record",
                    resolved
                )));
            }
        }
        for (key, _) in fat.live() {
            let segments: Vec<&str> = key.split('/').collect();
            match tree.lookup(&segments) {
                Some(Node::File(leaf)) if leaf == key => {}
                _ => {
                    return Err(SFSError::CorruptState(format!(
                        "record {:?} is missing from the tree",
                        key
                    )))
                }
            }
        }

        Ok(Volume {
            data_map,
            fat,
            tree,
        })
    }
}

/// Configures a new, empty volume.
pub struct VolumeBuilder {
    block_count: usize,
}

impl Default for VolumeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeBuilder {
    pub fn new() -> Self {
        VolumeBuilder {
            block_count: DEFAULT_BLOCK_COUNT,
        }
    }

    /// Sets the number of blocks available for file content.
    pub fn with_block_count(mut self, blocks: usize) -> Self {
        self.block_count = blocks;
        self
    }

    pub fn build(self) -> Volume {
        Volume {
            data_map: Bitmap::new(self.block_count),
            fat: AllocationTable::new(),
            tree: DirectoryTree::new(),
        }
    }
}
