//! [`BackingFs`] over a directory of the local file system.

use std::ffi::OsStr;
use std::io::{self, SeekFrom};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use filetime::FileTime;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use crate::vfs::{BackingFs, Capabilities, DirEntry, FileKind, Metadata, SetAttributes};

/// Exports everything below `root`.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
    capabilities: Capabilities,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> LocalFs {
        LocalFs { root: root.into(), capabilities: Capabilities::ReadWrite }
    }

    pub fn read_only(mut self) -> LocalFs {
        self.capabilities = Capabilities::ReadOnly;
        self
    }

    /// Maps an export path onto the local file system. Only normal
    /// components are kept, so a path can never leave `root`.
    fn local_path(&self, path: &Path) -> PathBuf {
        let mut local = self.root.clone();
        for component in path.components() {
            if let Component::Normal(name) = component {
                local.push(name);
            }
        }
        local
    }

    fn check_size(&self, size: Option<u64>) -> io::Result<()> {
        match size {
            Some(size) if size <= self.max_file_size() => Ok(()),
            _ => Err(io::Error::from(io::ErrorKind::FileTooLarge)),
        }
    }

    fn check_writable(&self) -> io::Result<()> {
        match self.capabilities {
            Capabilities::ReadWrite => Ok(()),
            Capabilities::ReadOnly => Err(io::Error::from(io::ErrorKind::ReadOnlyFilesystem)),
        }
    }
}

fn timestamp(seconds: i64, nanos: i64) -> SystemTime {
    let since_epoch = Duration::new(seconds.max(0) as u64, nanos.clamp(0, 999_999_999) as u32);
    UNIX_EPOCH + since_epoch
}

fn to_metadata(meta: &std::fs::Metadata) -> Metadata {
    let file_type = meta.file_type();
    let kind = if file_type.is_symlink() {
        FileKind::Symlink
    } else if file_type.is_dir() {
        FileKind::Directory
    } else {
        FileKind::File
    };
    Metadata {
        kind,
        mode: meta.mode() & 0o7777,
        size: meta.size(),
        uid: meta.uid(),
        gid: meta.gid(),
        atime: timestamp(meta.atime(), meta.atime_nsec()),
        mtime: timestamp(meta.mtime(), meta.mtime_nsec()),
        ctime: timestamp(meta.ctime(), meta.ctime_nsec()),
        fileid: Some(meta.ino()),
    }
}

async fn stat_local(path: &Path) -> io::Result<Metadata> {
    Ok(to_metadata(&fs::symlink_metadata(path).await?))
}

#[async_trait]
impl BackingFs for LocalFs {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn stat(&self, path: &Path) -> io::Result<Metadata> {
        stat_local(&self.local_path(path)).await
    }

    async fn create(&self, path: &Path, mode: u32, exclusive: bool) -> io::Result<Metadata> {
        self.check_writable()?;
        let local = self.local_path(path);
        let mut options = OpenOptions::new();
        options.write(true).mode(mode & 0o7777);
        if exclusive {
            options.create_new(true);
        } else {
            options.create(true).truncate(false);
        }
        let file = options.open(&local).await?;
        debug!("created {:?}", local);
        Ok(to_metadata(&file.metadata().await?))
    }

    async fn read(&self, path: &Path, offset: u64, count: u32) -> io::Result<(Vec<u8>, bool)> {
        let local = self.local_path(path);
        let mut file = fs::File::open(&local).await?;
        let len = file.metadata().await?.len();
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = Vec::with_capacity(count as usize);
        file.take(u64::from(count)).read_to_end(&mut buf).await?;
        let eof = offset.saturating_add(buf.len() as u64) >= len;
        Ok((buf, eof))
    }

    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> io::Result<Metadata> {
        self.check_writable()?;
        self.check_size(offset.checked_add(data.len() as u64))?;
        let local = self.local_path(path);
        let mut file = OpenOptions::new().write(true).truncate(false).open(&local).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await?;
        debug!("write to {:?} {:?} {:?}", local, offset, data.len());
        Ok(to_metadata(&file.metadata().await?))
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> io::Result<Metadata> {
        self.check_writable()?;
        let local = self.local_path(path);
        fs::create_dir(&local).await?;
        fs::set_permissions(&local, std::fs::Permissions::from_mode(mode & 0o7777)).await?;
        stat_local(&local).await
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut dir = fs::read_dir(self.local_path(path)).await?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            // Entries removed while listing are skipped.
            let Ok(meta) = fs::symlink_metadata(entry.path()).await else {
                continue;
            };
            entries.push(DirEntry {
                name: entry.file_name().as_bytes().to_vec(),
                metadata: to_metadata(&meta),
            });
        }
        Ok(entries)
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.check_writable()?;
        fs::remove_file(self.local_path(path)).await
    }

    async fn remove_dir(&self, path: &Path) -> io::Result<()> {
        self.check_writable()?;
        fs::remove_dir(self.local_path(path)).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.check_writable()?;
        fs::rename(self.local_path(from), self.local_path(to)).await
    }

    async fn set_attr(&self, path: &Path, attrs: SetAttributes) -> io::Result<Metadata> {
        self.check_writable()?;
        let local = self.local_path(path);
        if let Some(size) = attrs.size {
            self.check_size(Some(size))?;
            let file = OpenOptions::new().write(true).truncate(false).open(&local).await?;
            debug!(" -- set size {:?} {:?}", local, size);
            file.set_len(size).await?;
        }
        if let Some(mode) = attrs.mode {
            debug!(" -- set permissions {:?} {:o}", local, mode);
            fs::set_permissions(&local, std::fs::Permissions::from_mode(mode & 0o7777)).await?;
        }
        if let Some(atime) = attrs.atime {
            filetime::set_symlink_file_times(
                &local,
                FileTime::from_system_time(atime),
                FileTime::from_last_modification_time(&fs::symlink_metadata(&local).await?),
            )?;
        }
        if let Some(mtime) = attrs.mtime {
            filetime::set_file_mtime(&local, FileTime::from_system_time(mtime))?;
        }
        stat_local(&local).await
    }

    async fn symlink(&self, path: &Path, target: &[u8]) -> io::Result<Metadata> {
        self.check_writable()?;
        let local = self.local_path(path);
        debug!("symlink {:?} {:?}", local, String::from_utf8_lossy(target));
        fs::symlink(OsStr::from_bytes(target), &local).await?;
        stat_local(&local).await
    }

    async fn read_link(&self, path: &Path) -> io::Result<Vec<u8>> {
        let target = fs::read_link(self.local_path(path)).await?;
        Ok(target.as_os_str().as_bytes().to_vec())
    }
}
