//! Per-seed-root advisory file lock.
//!
//! Writers of the same package serialize on the lock; readers never take it.
//! The lock is cooperative across processes (OS advisory file lock on a
//! `.lock` sentinel) and re-entrant within one process via a refcount
//! registry, so nested operations on the same seed do not self-deadlock.
//! The guard releases on drop on every exit path.

use devac_core::error::StorageError;
use std::collections::HashMap;
use std::fs::{File, TryLockError};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

const LOCK_FILE: &str = ".lock";
const POLL_INTERVAL: Duration = Duration::from_millis(25);

struct LockEntry {
    file: File,
    count: usize,
}

fn registry() -> &'static Mutex<HashMap<PathBuf, LockEntry>> {
    static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, LockEntry>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Held exclusive lock on a seed root. Released on drop.
#[derive(Debug)]
pub struct SeedLockGuard {
    key: PathBuf,
}

impl Drop for SeedLockGuard {
    fn drop(&mut self) {
        let mut map = registry().lock().expect("lock registry poisoned");
        if let Some(entry) = map.get_mut(&self.key) {
            entry.count -= 1;
            if entry.count == 0 {
                if let Some(entry) = map.remove(&self.key) {
                    let _ = entry.file.unlock();
                }
            }
        }
    }
}

/// Acquire the exclusive lock for a seed root, blocking up to `timeout`.
///
/// Re-entrant: if this process already holds the lock, the refcount is bumped
/// and the call returns immediately.
pub fn acquire(seed_root: &Path, timeout: Duration) -> Result<SeedLockGuard, StorageError> {
    std::fs::create_dir_all(seed_root).map_err(|e| StorageError::io(seed_root, e))?;
    let key = seed_root
        .canonicalize()
        .map_err(|e| StorageError::io(seed_root, e))?;

    {
        let mut map = registry().lock().expect("lock registry poisoned");
        if let Some(entry) = map.get_mut(&key) {
            entry.count += 1;
            return Ok(SeedLockGuard { key });
        }
    }

    let lock_path = key.join(LOCK_FILE);
    let file = File::create(&lock_path).map_err(|e| StorageError::io(&lock_path, e))?;

    let deadline = Instant::now() + timeout;
    loop {
        match file.try_lock() {
            Ok(()) => break,
            Err(TryLockError::WouldBlock) => {
                if Instant::now() >= deadline {
                    return Err(StorageError::LockTimeout { path: key });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(TryLockError::Error(e)) => return Err(StorageError::io(&lock_path, e)),
        }
    }

    let mut map = registry().lock().expect("lock registry poisoned");
    // Another thread may have registered while we were polling the OS lock;
    // the OS lock is per-process, so fold into the existing entry.
    if let Some(entry) = map.get_mut(&key) {
        entry.count += 1;
    } else {
        map.insert(key.clone(), LockEntry { file, count: 1 });
    }
    Ok(SeedLockGuard { key })
}
