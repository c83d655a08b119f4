//! Backing file system interface.
//!
//! The server addresses every object by its absolute path inside the export
//! (`/` is the export root). A [`BackingFs`] only has to understand paths;
//! turning paths into opaque NFS handles and back is the job of
//! [`crate::handler::NfsHandler`].
//!
//! Errors are plain [`std::io::Error`]s. Their [`std::io::ErrorKind`] decides
//! the `nfsstat3` a client sees, see [`crate::error::nfsstat_from_io`].

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;

/// Largest file size a store accepts unless it reports a lower one. NFS
/// clients treat offsets as signed 64-bit values.
pub const MAX_FILE_SIZE: u64 = i64::MAX as u64;

/// What a backing store allows clients to do.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Capabilities {
    /// Only queries; every mutating procedure replies `NFS3ERR_ROFS`.
    ReadOnly,
    ReadWrite,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

/// Attributes of a single object as the backing store sees them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub kind: FileKind,
    /// Permission bits only (`0o7777`), no file type bits.
    pub mode: u32,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    /// Stable object identifier if the store has one (an inode number). When
    /// `None` the server derives one from the path.
    pub fileid: Option<u64>,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

/// One child of a directory. `.` and `..` are never included.
#[derive(Clone, Debug)]
pub struct DirEntry {
    pub name: Vec<u8>,
    pub metadata: Metadata,
}

/// Attribute changes requested by SETATTR or by CREATE/MKDIR attributes.
/// `None` leaves the attribute unchanged.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SetAttributes {
    pub mode: Option<u32>,
    pub size: Option<u64>,
    pub atime: Option<SystemTime>,
    pub mtime: Option<SystemTime>,
}

impl SetAttributes {
    pub fn is_empty(&self) -> bool {
        *self == SetAttributes::default()
    }
}

/// Space and object counts reported by FSSTAT.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FsStat {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub avail_bytes: u64,
    pub total_files: u64,
    pub free_files: u64,
    pub avail_files: u64,
}

/// A hierarchical store the server exports.
///
/// Implementations must be safe to call concurrently: several calls of one
/// connection and calls of different connections run at the same time.
#[async_trait]
pub trait BackingFs: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Largest size a file may grow to. Writes and truncations past it fail
    /// with `FileTooLarge`; FSINFO reports it as `maxfilesize`.
    fn max_file_size(&self) -> u64 {
        MAX_FILE_SIZE
    }

    /// Attributes of `path` without following a final symlink.
    async fn stat(&self, path: &Path) -> io::Result<Metadata>;

    /// Creates an empty regular file. With `exclusive` an existing object
    /// fails with `AlreadyExists`; otherwise an existing file is kept as is.
    async fn create(&self, path: &Path, mode: u32, exclusive: bool) -> io::Result<Metadata>;

    /// Reads up to `count` bytes at `offset`. The flag is true when the read
    /// reached the end of the file.
    async fn read(&self, path: &Path, offset: u64, count: u32) -> io::Result<(Vec<u8>, bool)>;

    /// Writes `data` at `offset`, growing the file as needed, and returns the
    /// attributes after the write.
    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> io::Result<Metadata>;

    async fn mkdir(&self, path: &Path, mode: u32) -> io::Result<Metadata>;

    /// Children of a directory, in any order.
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Fails with `DirectoryNotEmpty` unless the directory is empty.
    async fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Moves `from` to `to`, replacing a file at `to`.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    async fn set_attr(&self, path: &Path, attrs: SetAttributes) -> io::Result<Metadata>;

    async fn symlink(&self, path: &Path, target: &[u8]) -> io::Result<Metadata>;

    async fn read_link(&self, path: &Path) -> io::Result<Vec<u8>>;

    async fn fs_stat(&self) -> io::Result<FsStat> {
        Ok(FsStat::default())
    }
}

/// Joins a client supplied file name onto a directory path.
///
/// Names containing a separator, empty names and `.`/`..` are refused with
/// `InvalidInput`; callers resolve the dot entries themselves.
pub fn child_path(dir: &Path, name: &[u8]) -> io::Result<PathBuf> {
    if name.is_empty() || name == b"." || name == b".." || name.contains(&b'/') {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid file name"));
    }
    let name = std::str::from_utf8(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file name is not UTF-8"))?;
    Ok(dir.join(name))
}

/// Parent of an export path; the root is its own parent.
pub fn parent_path(path: &Path) -> PathBuf {
    path.parent().map_or_else(|| path.to_path_buf(), Path::to_path_buf)
}
