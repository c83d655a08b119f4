use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{HandleCache, NfsHandler};
use crate::protocol::xdr::mount::mountstat3;
use crate::protocol::xdr::nfs3::{nfs_fh3, nfsstat3};
use crate::protocol::xdr::rpc::{auth_stat, opaque_auth};
use crate::vfs::BackingFs;

pub const DEFAULT_HANDLE_LIMIT: usize = 1024;

/// Issues fixed-size handles from a [`HandleCache`] in front of `inner`.
///
/// A handle that fell out of the cache answers `NFS3ERR_STALE`; clients then
/// look the object up again from the root.
pub struct CachingHandler<H> {
    inner: H,
    cache: HandleCache,
}

impl<H: NfsHandler> CachingHandler<H> {
    /// `limit` is the number of handles kept alive; zero is treated as one.
    pub fn new(inner: H, limit: usize) -> CachingHandler<H> {
        let capacity = NonZeroUsize::new(limit).unwrap_or(NonZeroUsize::MIN);
        CachingHandler { inner, cache: HandleCache::new(capacity) }
    }

    pub fn cache(&self) -> &HandleCache {
        &self.cache
    }
}

#[async_trait]
impl<H: NfsHandler> NfsHandler for CachingHandler<H> {
    fn authenticate(&self, cred: &opaque_auth) -> Result<(), auth_stat> {
        self.inner.authenticate(cred)
    }

    async fn mount(&self, path: &Path) -> Result<PathBuf, mountstat3> {
        self.inner.mount(path).await
    }

    fn filesystem(&self) -> &dyn BackingFs {
        self.inner.filesystem()
    }

    fn to_handle(&self, path: &Path) -> nfs_fh3 {
        self.cache.to_handle(path)
    }

    fn from_handle(&self, fh: &nfs_fh3) -> Result<PathBuf, nfsstat3> {
        self.cache.from_handle(fh)
    }

    fn invalidate_handle(&self, fh: &nfs_fh3) {
        self.cache.invalidate_handle(fh)
    }

    fn invalidate_path(&self, path: &Path) {
        self.cache.invalidate_path(path)
    }

    fn handle_limit(&self) -> usize {
        self.cache.capacity()
    }
}
