//! Bounded two-way mapping between NFS handles and backing store paths.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::trace;
use uuid::Uuid;

use crate::protocol::xdr::nfs3::{nfs_fh3, nfsstat3};

struct CacheState {
    handles: LruCache<Uuid, PathBuf>,
    paths: HashMap<PathBuf, Uuid>,
}

impl CacheState {
    fn forget(&mut self, id: &Uuid) {
        if let Some(path) = self.handles.pop(id) {
            self.paths.remove(&path);
        }
    }
}

/// LRU cache of handles. Every handle is a random 16 byte v4 UUID.
///
/// Both directions are kept under one lock so they can never disagree:
/// `paths[p] == id` exactly when `handles[id] == p`. The lock is only held
/// for map operations.
pub struct HandleCache {
    state: Mutex<CacheState>,
}

impl HandleCache {
    pub fn new(capacity: NonZeroUsize) -> HandleCache {
        HandleCache {
            state: Mutex::new(CacheState {
                handles: LruCache::new(capacity),
                paths: HashMap::with_capacity(capacity.get()),
            }),
        }
    }

    // Map operations cannot leave the state half updated, so a poisoned
    // lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the live handle for `path` or issues a new one, evicting the
    /// least recently used entry when full.
    pub fn to_handle(&self, path: &Path) -> nfs_fh3 {
        let mut state = self.lock();
        if let Some(id) = state.paths.get(path).copied() {
            if state.handles.get(&id).is_some() {
                return nfs_fh3 { data: id.as_bytes().to_vec() };
            }
        }

        let id = Uuid::new_v4();
        if let Some((evicted_id, evicted_path)) = state.handles.push(id, path.to_path_buf()) {
            if evicted_id != id {
                trace!("evicting handle for {:?}", evicted_path);
                state.paths.remove(&evicted_path);
            }
        }
        state.paths.insert(path.to_path_buf(), id);
        nfs_fh3 { data: id.as_bytes().to_vec() }
    }

    pub fn from_handle(&self, fh: &nfs_fh3) -> Result<PathBuf, nfsstat3> {
        let id = Uuid::from_slice(&fh.data).map_err(|_| nfsstat3::NFS3ERR_STALE)?;
        self.lock().handles.get(&id).cloned().ok_or(nfsstat3::NFS3ERR_STALE)
    }

    pub fn invalidate_handle(&self, fh: &nfs_fh3) {
        if let Ok(id) = Uuid::from_slice(&fh.data) {
            self.lock().forget(&id);
        }
    }

    /// Drops the handle of `path` and of everything below it.
    pub fn invalidate_path(&self, path: &Path) {
        let mut state = self.lock();
        let stale: Vec<Uuid> = state
            .paths
            .iter()
            .filter(|(p, _)| p.starts_with(path))
            .map(|(_, id)| *id)
            .collect();
        for id in stale {
            state.forget(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().handles.cap().get()
    }
}
