//! Cookie based paging of directory listings for READDIR and READDIRPLUS.
//!
//! A listing is `.`, `..` and then the children sorted by name. The entry at
//! position `i` carries cookie `i + 1`, so a client that sends back the cookie
//! of the last entry it received resumes right after it. Listings are built
//! from the live directory on every call; the cookie verifier is a hash of
//! the directory path and its child names, so a client paging through a
//! directory that changed meanwhile gets `NFS3ERR_BAD_COOKIE`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::{NfsResult, NfsResultExt};
use crate::fs_util;
use crate::protocol::xdr::{nfs3, Serialize};
use crate::vfs::{self, BackingFs, Metadata};

/// Bytes of a READDIR3resok / READDIRPLUS3resok outside the entry list:
/// `dir_attributes`, `cookieverf`, the list terminator and `eof`.
const RESOK_OVERHEAD: usize = 4 + 84 + nfs3::NFS3_COOKIEVERFSIZE + 4 + 4;

#[derive(Clone, Debug)]
pub struct ListedEntry {
    pub name: Vec<u8>,
    pub path: PathBuf,
    pub metadata: Metadata,
}

impl ListedEntry {
    pub fn fileid(&self) -> nfs3::fileid3 {
        fs_util::path_fattr3(&self.path, &self.metadata).fileid
    }

    pub fn attributes(&self) -> nfs3::fattr3 {
        fs_util::path_fattr3(&self.path, &self.metadata)
    }
}

/// Snapshot of one directory, taken for a single READDIR(PLUS) call.
#[derive(Clone, Debug)]
pub struct DirListing {
    entries: Vec<ListedEntry>,
    verifier: nfs3::cookieverf3,
}

impl DirListing {
    /// Lists `dir`. Its own metadata must already be known to the caller;
    /// it becomes the `.` entry.
    pub async fn read(fs: &dyn BackingFs, dir: &Path, dir_meta: &Metadata) -> NfsResult<DirListing> {
        let mut children = fs.read_dir(dir).await.or_nfs_error()?;
        children.sort_by(|a, b| a.name.cmp(&b.name));

        let mut hasher = DefaultHasher::new();
        dir.hash(&mut hasher);
        for child in &children {
            child.name.hash(&mut hasher);
        }
        let verifier = hasher.finish().max(1).to_be_bytes();

        let parent = vfs::parent_path(dir);
        let parent_meta =
            if parent == dir { dir_meta.clone() } else { fs.stat(&parent).await.or_nfs_error()? };

        let mut entries = Vec::with_capacity(children.len() + 2);
        entries.push(ListedEntry {
            name: b".".to_vec(),
            path: dir.to_path_buf(),
            metadata: dir_meta.clone(),
        });
        entries.push(ListedEntry { name: b"..".to_vec(), path: parent, metadata: parent_meta });
        for child in children {
            let path = vfs::child_path(dir, &child.name).or_nfs_error()?;
            entries.push(ListedEntry { name: child.name, path, metadata: child.metadata });
        }
        Ok(DirListing { entries, verifier })
    }

    pub fn verifier(&self) -> nfs3::cookieverf3 {
        self.verifier
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ListedEntry] {
        &self.entries
    }

    /// Index of the first entry to return for `cookie`.
    ///
    /// An all-zero verifier is accepted with any cookie, for clients that
    /// never echo the verifier back.
    pub fn resume_index(&self, cookie: nfs3::cookie3, verf: &nfs3::cookieverf3) -> NfsResult<usize> {
        if cookie == 0 {
            return Ok(0);
        }
        if *verf != nfs3::cookieverf3::default() && *verf != self.verifier {
            trace!("cookie verifier mismatch {:?} != {:?}", verf, self.verifier);
            return Err(nfs3::nfsstat3::NFS3ERR_BAD_COOKIE);
        }
        match usize::try_from(cookie) {
            Ok(index) if index <= self.entries.len() => Ok(index),
            _ => Err(nfs3::nfsstat3::NFS3ERR_BAD_COOKIE),
        }
    }
}

/// Reply size limits requested by the client.
#[derive(Copy, Clone, Debug)]
pub struct PageBudget {
    /// Limit for the whole resok structure.
    pub max_bytes: usize,
    /// READDIRPLUS only: limit for the fileid, name and cookie of all entries.
    pub max_dir_bytes: Option<usize>,
    /// Bytes counted per entry for a file handle that is attached only after
    /// the page is cut.
    pub handle_reserve: usize,
}

impl PageBudget {
    pub fn readdir(count: nfs3::count3) -> PageBudget {
        PageBudget { max_bytes: count as usize, max_dir_bytes: None, handle_reserve: 0 }
    }

    /// Entries are built without handles; room for the largest handle
    /// (length word plus [`nfs3::NFS3_FHSIZE`] bytes) is reserved for each.
    pub fn readdirplus(dircount: nfs3::count3, maxcount: nfs3::count3) -> PageBudget {
        PageBudget {
            max_bytes: maxcount as usize,
            max_dir_bytes: Some(dircount as usize),
            handle_reserve: 4 + nfs3::NFS3_FHSIZE,
        }
    }
}

pub struct Page<T> {
    pub entries: Vec<T>,
    pub eof: bool,
}

fn encoded_len<T: Serialize>(value: &T) -> NfsResult<usize> {
    let mut buf = Cursor::new(Vec::new());
    value.serialize(&mut buf).map_err(|_| nfs3::nfsstat3::NFS3ERR_SERVERFAULT)?;
    Ok(buf.into_inner().len())
}

/// Cuts the next page out of `listing`, starting at index `start`.
///
/// `make_entry` builds the wire entry for a listed entry and its cookie. It
/// runs for accepted entries and at most one more. Fails with
/// `NFS3ERR_TOOSMALL` when entries remain but not one fits.
pub fn paginate<T, F>(
    listing: &DirListing,
    start: usize,
    budget: PageBudget,
    mut make_entry: F,
) -> NfsResult<Page<T>>
where
    T: Serialize,
    F: FnMut(&ListedEntry, nfs3::cookie3) -> T,
{
    let mut used = RESOK_OVERHEAD;
    let mut dir_used = 0_usize;
    let mut entries = Vec::new();
    let remaining = listing.entries.get(start..).unwrap_or_default();

    for (offset, listed) in remaining.iter().enumerate() {
        // fileid, name length, padded name, cookie
        let dir_bytes = 8 + 4 + listed.name.len().next_multiple_of(4) + 8;
        if budget.max_dir_bytes.is_some_and(|max| dir_used + dir_bytes > max) {
            trace!(" -- dircount exhausted, truncating at {}", start + offset);
            break;
        }

        let cookie = (start + offset + 1) as nfs3::cookie3;
        let entry = make_entry(listed, cookie);
        // value_follows flag plus the entry itself
        let entry_bytes = 4 + encoded_len(&entry)? + budget.handle_reserve;
        if used + entry_bytes > budget.max_bytes {
            trace!(" -- insufficient space, truncating at {}", start + offset);
            break;
        }
        used += entry_bytes;
        dir_used += dir_bytes;
        entries.push(entry);
    }

    if entries.is_empty() && !remaining.is_empty() {
        return Err(nfs3::nfsstat3::NFS3ERR_TOOSMALL);
    }
    let eof = entries.len() == remaining.len();
    Ok(Page { entries, eof })
}
