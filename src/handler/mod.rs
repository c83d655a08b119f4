//! Handlers sit between the protocol procedures and a [`BackingFs`].
//!
//! A handler decides who may call ([`NfsHandler::authenticate`]), what a
//! MOUNT resolves to, and how backing store paths become opaque NFS handles.
//! Handlers compose as decorators:
//!
//! ```text
//! CachingHandler::new(NullAuthHandler::new(FsHandler::new(MemFs::new())), 1024)
//! ```
//!
//! [`FsHandler`] is the base over a backing store. Its handles carry the path
//! itself, so it only works for short paths; [`CachingHandler`] replaces them
//! with fixed-size handles backed by an LRU cache.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::protocol::xdr::mount::mountstat3;
use crate::protocol::xdr::nfs3::{nfs_fh3, nfsstat3};
use crate::protocol::xdr::rpc::{auth_flavor, auth_stat, opaque_auth};
use crate::vfs::BackingFs;

mod caching;
mod handle_cache;

pub use caching::{CachingHandler, DEFAULT_HANDLE_LIMIT};
pub use handle_cache::HandleCache;

#[async_trait]
pub trait NfsHandler: Send + Sync {
    /// Checks the credential of a call before it is dispatched. A rejection
    /// is sent back as an RPC `AUTH_ERROR`.
    fn authenticate(&self, cred: &opaque_auth) -> Result<(), auth_stat>;

    /// Resolves the path a client asked to MOUNT (relative to the export) to
    /// the directory that becomes its root.
    async fn mount(&self, path: &Path) -> Result<PathBuf, mountstat3>;

    fn filesystem(&self) -> &dyn BackingFs;

    /// Handle for `path`. Stable for as long as the handler remembers the path.
    fn to_handle(&self, path: &Path) -> nfs_fh3;

    /// Path behind `fh`, or `NFS3ERR_STALE` when the handle is unknown.
    fn from_handle(&self, fh: &nfs_fh3) -> Result<PathBuf, nfsstat3>;

    fn invalidate_handle(&self, fh: &nfs_fh3);

    /// Forgets `path` and everything below it.
    fn invalidate_path(&self, path: &Path);

    /// How many handles the handler keeps alive, `usize::MAX` if unbounded.
    fn handle_limit(&self) -> usize;
}

/// Base handler over a backing store.
///
/// Accepts `AUTH_NULL` and `AUTH_UNIX` credentials. Handles are the UTF-8 bytes
/// of the path, which keeps it stateless but limits it to paths that fit into
/// [`crate::protocol::xdr::nfs3::NFS3_FHSIZE`] bytes.
#[derive(Debug)]
pub struct FsHandler<F> {
    fs: F,
}

impl<F: BackingFs> FsHandler<F> {
    pub fn new(fs: F) -> FsHandler<F> {
        FsHandler { fs }
    }
}

#[async_trait]
impl<F: BackingFs> NfsHandler for FsHandler<F> {
    fn authenticate(&self, cred: &opaque_auth) -> Result<(), auth_stat> {
        match cred.flavor {
            auth_flavor::AUTH_NULL | auth_flavor::AUTH_UNIX => Ok(()),
            _ => Err(auth_stat::AUTH_BADCRED),
        }
    }

    async fn mount(&self, path: &Path) -> Result<PathBuf, mountstat3> {
        match self.fs.stat(path).await {
            Ok(meta) if meta.is_dir() => Ok(path.to_path_buf()),
            Ok(_) => Err(mountstat3::MNT3ERR_NOTDIR),
            Err(e) => {
                debug!("mount of {:?} failed: {:?}", path, e);
                Err(match e.kind() {
                    io::ErrorKind::NotFound => mountstat3::MNT3ERR_NOENT,
                    io::ErrorKind::PermissionDenied => mountstat3::MNT3ERR_ACCES,
                    _ => mountstat3::MNT3ERR_IO,
                })
            }
        }
    }

    fn filesystem(&self) -> &dyn BackingFs {
        &self.fs
    }

    fn to_handle(&self, path: &Path) -> nfs_fh3 {
        nfs_fh3 { data: path.to_string_lossy().as_bytes().to_vec() }
    }

    fn from_handle(&self, fh: &nfs_fh3) -> Result<PathBuf, nfsstat3> {
        match std::str::from_utf8(&fh.data) {
            Ok(path) if path.starts_with('/') => Ok(PathBuf::from(path)),
            _ => Err(nfsstat3::NFS3ERR_BADHANDLE),
        }
    }

    fn invalidate_handle(&self, _fh: &nfs_fh3) {}

    fn invalidate_path(&self, _path: &Path) {}

    fn handle_limit(&self) -> usize {
        usize::MAX
    }
}

/// Accepts every credential, whatever its flavor.
#[derive(Debug)]
pub struct NullAuthHandler<H> {
    inner: H,
}

impl<H: NfsHandler> NullAuthHandler<H> {
    pub fn new(inner: H) -> NullAuthHandler<H> {
        NullAuthHandler { inner }
    }
}

#[async_trait]
impl<H: NfsHandler> NfsHandler for NullAuthHandler<H> {
    fn authenticate(&self, _cred: &opaque_auth) -> Result<(), auth_stat> {
        Ok(())
    }

    async fn mount(&self, path: &Path) -> Result<PathBuf, mountstat3> {
        self.inner.mount(path).await
    }

    fn filesystem(&self) -> &dyn BackingFs {
        self.inner.filesystem()
    }

    fn to_handle(&self, path: &Path) -> nfs_fh3 {
        self.inner.to_handle(path)
    }

    fn from_handle(&self, fh: &nfs_fh3) -> Result<PathBuf, nfsstat3> {
        self.inner.from_handle(fh)
    }

    fn invalidate_handle(&self, fh: &nfs_fh3) {
        self.inner.invalidate_handle(fh)
    }

    fn invalidate_path(&self, path: &Path) {
        self.inner.invalidate_path(path)
    }

    fn handle_limit(&self) -> usize {
        self.inner.handle_limit()
    }
}
