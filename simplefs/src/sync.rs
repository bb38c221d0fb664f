use std::sync::{Arc, Mutex, MutexGuard};

use crate::fs::{FileStat, SFSError, Volume, VolumeState};

/// A cloneable handle to one volume shared between threads. Every call holds a single lock for
/// its whole duration, so a `write` (delete then create) is never observed half done.
#[derive(Clone, Default)]
pub struct SharedVolume(Arc<Mutex<Volume>>);

impl From<Volume> for SharedVolume {
    fn from(volume: Volume) -> Self {
        SharedVolume(Arc::new(Mutex::new(volume)))
    }
}

impl SharedVolume {
    /// Locks the volume for a sequence of operations that must not interleave with others.
    pub fn lock(&self) -> MutexGuard<'_, Volume> {
        // A panic while holding the lock means a broken invariant; the volume is unusable.
        self.0.lock().expect("volume lock poisoned")
    }

    pub fn create<C: Into<Vec<u8>>>(&self, path: &str, content: C) -> Result<(), SFSError> {
        self.lock().create(path, content)
    }

    pub fn delete(&self, path: &str) -> Result<(), SFSError> {
        self.lock().delete(path)
    }

    /// Returns an owned copy of the content, since the lock is released on return.
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().read(path).map(|view| view.content.to_vec())
    }

    pub fn stat(&self, path: &str) -> Result<FileStat, SFSError> {
        self.lock().stat(path)
    }

    pub fn write<C: Into<Vec<u8>>>(&self, path: &str, content: C) -> Result<(), SFSError> {
        self.lock().write(path, content)
    }

    pub fn reset(&self) {
        self.lock().reset()
    }

    pub fn export_state(&self) -> VolumeState {
        self.lock().export_state()
    }

    pub fn import_state(&self, state: VolumeState) -> Result<(), SFSError> {
        self.lock().import_state(state)
    }
}
