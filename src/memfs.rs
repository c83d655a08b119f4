//! In-memory [`BackingFs`].
//!
//! Objects live in a single map keyed by their export path. Used by the demo
//! binary when no directory is given and by the tests.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use async_trait::async_trait;

use crate::vfs::{self, BackingFs, Capabilities, DirEntry, FileKind, FsStat, Metadata};

#[derive(Debug)]
enum MemContents {
    File(Vec<u8>),
    Directory,
    Symlink(Vec<u8>),
}

#[derive(Debug)]
struct MemNode {
    meta: Metadata,
    contents: MemContents,
}

#[derive(Debug)]
struct MemState {
    nodes: BTreeMap<PathBuf, MemNode>,
    next_id: u64,
}

impl MemState {
    fn node(&self, path: &Path) -> io::Result<&MemNode> {
        self.nodes.get(path).ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn node_mut(&mut self, path: &Path) -> io::Result<&mut MemNode> {
        self.nodes.get_mut(path).ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn has_children(&self, path: &Path) -> bool {
        self.nodes.keys().any(|p| p.parent() == Some(path))
    }

    /// The parent of `path` must exist and be a directory.
    fn check_parent(&self, path: &Path) -> io::Result<()> {
        let parent = vfs::parent_path(path);
        if parent == path {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists));
        }
        match self.node(&parent)?.meta.kind {
            FileKind::Directory => Ok(()),
            _ => Err(io::Error::from(io::ErrorKind::NotADirectory)),
        }
    }

    fn touch_parent(&mut self, path: &Path) {
        let parent = vfs::parent_path(path);
        if let Some(node) = self.nodes.get_mut(&parent) {
            let now = SystemTime::now();
            node.meta.mtime = now;
            node.meta.ctime = now;
        }
    }

    fn insert(&mut self, path: &Path, kind: FileKind, mode: u32, contents: MemContents) -> Metadata {
        let now = SystemTime::now();
        let size = match &contents {
            MemContents::File(data) | MemContents::Symlink(data) => data.len() as u64,
            MemContents::Directory => 0,
        };
        let meta = Metadata {
            kind,
            mode: mode & 0o7777,
            size,
            uid: 0,
            gid: 0,
            atime: now,
            mtime: now,
            ctime: now,
            fileid: Some(self.next_id),
        };
        self.next_id += 1;
        self.nodes.insert(path.to_path_buf(), MemNode { meta: meta.clone(), contents });
        self.touch_parent(path);
        meta
    }
}

/// Grows or shrinks file contents, failing with `StorageFull` instead of
/// aborting when the memory cannot be reserved.
fn resize(bytes: &mut Vec<u8>, len: usize) -> io::Result<()> {
    if let Some(additional) = len.checked_sub(bytes.len()) {
        bytes
            .try_reserve_exact(additional)
            .map_err(|_| io::Error::from(io::ErrorKind::StorageFull))?;
    }
    bytes.resize(len, 0);
    Ok(())
}

/// Volatile file system kept entirely in memory.
#[derive(Debug)]
pub struct MemFs {
    state: Mutex<MemState>,
    capabilities: Capabilities,
    max_file_size: u64,
}

/// Default size limit of a single in-memory file.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 32;

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFs {
    /// An empty, writable file system holding only the root directory.
    pub fn new() -> MemFs {
        let mut state = MemState { nodes: BTreeMap::new(), next_id: 1 };
        state.insert(Path::new("/"), FileKind::Directory, 0o755, MemContents::Directory);
        MemFs {
            state: Mutex::new(state),
            capabilities: Capabilities::ReadWrite,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Caps the size of every file. Values beyond the address space are
    /// clamped to it.
    pub fn with_max_file_size(mut self, max_file_size: u64) -> MemFs {
        self.max_file_size = max_file_size.min(isize::MAX as u64);
        self
    }

    /// Same store, reported to clients as read only.
    pub fn read_only(mut self) -> MemFs {
        self.capabilities = Capabilities::ReadOnly;
        self
    }

    /// Checks `size` against the limit and converts it to a buffer length.
    fn file_len(&self, size: u64) -> io::Result<usize> {
        if size > self.max_file_size {
            return Err(io::Error::from(io::ErrorKind::FileTooLarge));
        }
        usize::try_from(size).map_err(|_| io::Error::from(io::ErrorKind::FileTooLarge))
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, MemState>> {
        self.state.lock().map_err(|_| io::Error::other("memory file system lock poisoned"))
    }
}

#[async_trait]
impl BackingFs for MemFs {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    async fn stat(&self, path: &Path) -> io::Result<Metadata> {
        Ok(self.lock()?.node(path)?.meta.clone())
    }

    async fn create(&self, path: &Path, mode: u32, exclusive: bool) -> io::Result<Metadata> {
        let mut state = self.lock()?;
        state.check_parent(path)?;
        if let Some(node) = state.nodes.get(path) {
            return match node.meta.kind {
                _ if exclusive => Err(io::Error::from(io::ErrorKind::AlreadyExists)),
                FileKind::File => Ok(node.meta.clone()),
                FileKind::Directory => Err(io::Error::from(io::ErrorKind::IsADirectory)),
                FileKind::Symlink => Err(io::Error::from(io::ErrorKind::AlreadyExists)),
            };
        }
        Ok(state.insert(path, FileKind::File, mode, MemContents::File(Vec::new())))
    }

    async fn read(&self, path: &Path, offset: u64, count: u32) -> io::Result<(Vec<u8>, bool)> {
        let state = self.lock()?;
        let data = match &state.node(path)?.contents {
            MemContents::File(data) => data,
            MemContents::Directory => return Err(io::Error::from(io::ErrorKind::IsADirectory)),
            MemContents::Symlink(_) => return Err(io::Error::from(io::ErrorKind::InvalidInput)),
        };
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(count as usize).min(data.len());
        Ok((data[start..end].to_vec(), end >= data.len()))
    }

    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> io::Result<Metadata> {
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| io::Error::from(io::ErrorKind::FileTooLarge))?;
        let end = self.file_len(end)?;
        let start = end - data.len();

        let mut state = self.lock()?;
        let node = state.node_mut(path)?;
        let MemContents::File(bytes) = &mut node.contents else {
            return Err(io::Error::from(io::ErrorKind::IsADirectory));
        };
        resize(bytes, end.max(bytes.len()))?;
        bytes[start..end].copy_from_slice(data);
        let now = SystemTime::now();
        node.meta.size = bytes.len() as u64;
        node.meta.mtime = now;
        node.meta.ctime = now;
        Ok(node.meta.clone())
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> io::Result<Metadata> {
        let mut state = self.lock()?;
        state.check_parent(path)?;
        if state.nodes.contains_key(path) {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists));
        }
        Ok(state.insert(path, FileKind::Directory, mode, MemContents::Directory))
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let state = self.lock()?;
        if !state.node(path)?.meta.is_dir() {
            return Err(io::Error::from(io::ErrorKind::NotADirectory));
        }
        let entries = state
            .nodes
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .filter_map(|(p, node)| {
                let name = p.file_name()?.to_str()?.as_bytes().to_vec();
                Some(DirEntry { name, metadata: node.meta.clone() })
            })
            .collect();
        Ok(entries)
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock()?;
        if state.node(path)?.meta.is_dir() {
            return Err(io::Error::from(io::ErrorKind::IsADirectory));
        }
        state.nodes.remove(path);
        state.touch_parent(path);
        Ok(())
    }

    async fn remove_dir(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock()?;
        if !state.node(path)?.meta.is_dir() {
            return Err(io::Error::from(io::ErrorKind::NotADirectory));
        }
        if vfs::parent_path(path) == path {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        if state.has_children(path) {
            return Err(io::Error::from(io::ErrorKind::DirectoryNotEmpty));
        }
        state.nodes.remove(path);
        state.touch_parent(path);
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.lock()?;
        let from_is_dir = state.node(from)?.meta.is_dir();
        state.check_parent(to)?;
        if from == to {
            return Ok(());
        }
        if to.starts_with(from) {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        }
        if let Some(existing) = state.nodes.get(to) {
            match (from_is_dir, existing.meta.is_dir()) {
                (false, true) => return Err(io::Error::from(io::ErrorKind::IsADirectory)),
                (true, false) => return Err(io::Error::from(io::ErrorKind::NotADirectory)),
                (true, true) if state.has_children(to) => {
                    return Err(io::Error::from(io::ErrorKind::DirectoryNotEmpty))
                }
                _ => {}
            }
            state.nodes.remove(to);
        }

        let moved: Vec<PathBuf> =
            state.nodes.keys().filter(|p| p.starts_with(from)).cloned().collect();
        for old in moved {
            if let Some(node) = state.nodes.remove(&old) {
                let new = match old.strip_prefix(from) {
                    Ok(rest) if rest.as_os_str().is_empty() => to.to_path_buf(),
                    Ok(rest) => to.join(rest),
                    Err(_) => continue,
                };
                state.nodes.insert(new, node);
            }
        }
        state.touch_parent(from);
        state.touch_parent(to);
        Ok(())
    }

    async fn set_attr(&self, path: &Path, attrs: vfs::SetAttributes) -> io::Result<Metadata> {
        let new_len = attrs.size.map(|size| self.file_len(size)).transpose()?;
        let mut state = self.lock()?;
        let node = state.node_mut(path)?;
        if let Some(size) = new_len {
            let MemContents::File(bytes) = &mut node.contents else {
                return Err(io::Error::from(io::ErrorKind::IsADirectory));
            };
            resize(bytes, size)?;
            node.meta.size = size as u64;
            node.meta.mtime = SystemTime::now();
        }
        if let Some(mode) = attrs.mode {
            node.meta.mode = mode & 0o7777;
        }
        if let Some(atime) = attrs.atime {
            node.meta.atime = atime;
        }
        if let Some(mtime) = attrs.mtime {
            node.meta.mtime = mtime;
        }
        node.meta.ctime = SystemTime::now();
        Ok(node.meta.clone())
    }

    async fn symlink(&self, path: &Path, target: &[u8]) -> io::Result<Metadata> {
        let mut state = self.lock()?;
        state.check_parent(path)?;
        if state.nodes.contains_key(path) {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists));
        }
        Ok(state.insert(path, FileKind::Symlink, 0o777, MemContents::Symlink(target.to_vec())))
    }

    async fn read_link(&self, path: &Path) -> io::Result<Vec<u8>> {
        match &self.lock()?.node(path)?.contents {
            MemContents::Symlink(target) => Ok(target.clone()),
            _ => Err(io::Error::from(io::ErrorKind::InvalidInput)),
        }
    }

    async fn fs_stat(&self) -> io::Result<FsStat> {
        let state = self.lock()?;
        let used: u64 = state
            .nodes
            .values()
            .map(|node| match &node.contents {
                MemContents::File(data) => data.len() as u64,
                _ => 0,
            })
            .sum();
        let files = state.nodes.len() as u64;
        let free_bytes = u64::from(u32::MAX).saturating_sub(used);
        let free_files = u64::from(u32::MAX).saturating_sub(files);
        Ok(FsStat {
            total_bytes: u64::from(u32::MAX),
            free_bytes,
            avail_bytes: free_bytes,
            total_files: u64::from(u32::MAX),
            free_files,
            avail_files: free_files,
        })
    }
}
