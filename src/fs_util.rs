//! Conversions between backing store metadata and NFS attribute structures.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::protocol::xdr::nfs3;
use crate::vfs::{FileKind, Metadata, SetAttributes};

/// Converts a time stamp to `nfstime3`. Times before the epoch clamp to zero
/// and seconds past `u32::MAX` saturate.
pub fn system_time_to_nfstime(time: SystemTime) -> nfs3::nfstime3 {
    let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
    nfs3::nfstime3 {
        seconds: u32::try_from(since_epoch.as_secs()).unwrap_or(u32::MAX),
        nseconds: since_epoch.subsec_nanos(),
    }
}

pub fn nfstime_to_system_time(time: nfs3::nfstime3) -> SystemTime {
    UNIX_EPOCH + Duration::new(u64::from(time.seconds), time.nseconds.min(999_999_999))
}

/// Object id used when the backing store does not provide one.
pub fn fileid_for_path(path: &Path) -> nfs3::fileid3 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}

/// Builds `fattr3` for an object. `fileid` is used when `meta` has none.
pub fn metadata_to_fattr3(fileid: nfs3::fileid3, meta: &Metadata) -> nfs3::fattr3 {
    let (ftype, nlink) = match meta.kind {
        FileKind::File => (nfs3::ftype3::NF3REG, 1),
        FileKind::Directory => (nfs3::ftype3::NF3DIR, 2),
        FileKind::Symlink => (nfs3::ftype3::NF3LNK, 1),
    };
    nfs3::fattr3 {
        ftype,
        mode: meta.mode & 0o7777,
        nlink,
        uid: meta.uid,
        gid: meta.gid,
        size: meta.size,
        used: meta.size,
        rdev: nfs3::specdata3::default(),
        fsid: 0,
        fileid: meta.fileid.unwrap_or(fileid),
        atime: system_time_to_nfstime(meta.atime),
        mtime: system_time_to_nfstime(meta.mtime),
        ctime: system_time_to_nfstime(meta.ctime),
    }
}

/// `fattr3` for `path`, deriving the object id from the path if needed.
pub fn path_fattr3(path: &Path, meta: &Metadata) -> nfs3::fattr3 {
    metadata_to_fattr3(fileid_for_path(path), meta)
}

pub fn metadata_to_wcc_attr(meta: &Metadata) -> nfs3::wcc_attr {
    nfs3::wcc_attr {
        size: meta.size,
        mtime: system_time_to_nfstime(meta.mtime),
        ctime: system_time_to_nfstime(meta.ctime),
    }
}

/// Converts client requested attributes into backing store changes.
/// Ownership changes are not supported and are dropped.
pub fn sattr3_to_set_attributes(attr: &nfs3::sattr3) -> SetAttributes {
    let resolve = |how: nfs3::set_time| match how {
        nfs3::set_time::DONT_CHANGE => None,
        nfs3::set_time::SET_TO_SERVER_TIME => Some(SystemTime::now()),
        nfs3::set_time::SET_TO_CLIENT_TIME(t) => Some(nfstime_to_system_time(t)),
    };
    SetAttributes {
        mode: attr.mode,
        size: attr.size,
        atime: resolve(attr.atime),
        mtime: resolve(attr.mtime),
    }
}

