//! An in-memory, single volume file system: a bitmap block allocator, a flat file allocation
//! table keyed by path, and a directory tree index kept in step with the table.
//!
//! ```
//! use simplefs::Volume;
//!
//! let mut vol = Volume::new(8);
//! vol.create("dir1/f", "v").unwrap();
//! assert_eq!(vol.read("dir1/f").unwrap().content, b"v");
//! ```

pub mod alloc;
pub mod fat;
mod fs;
pub mod image;
mod path;
pub mod sync;
pub mod tree;

pub use crate::fs::{
    FileStat, FileView, SFSError, Volume, VolumeBuilder, VolumeState, BLOCK_SIZE,
    DEFAULT_BLOCK_COUNT,
};
pub use crate::sync::SharedVolume;
