//! Translation of backing store errors into NFS status codes.

use std::io;

use tracing::error;

use crate::protocol::xdr::nfs3::nfsstat3;

pub type NfsResult<T> = Result<T, nfsstat3>;

/// Maps an I/O error onto the closest `nfsstat3`.
///
/// Kinds without a dedicated status become `NFS3ERR_IO` and are logged, they
/// usually point at a bug or an unhealthy backing store.
pub fn nfsstat_from_io(err: &io::Error) -> nfsstat3 {
    match err.kind() {
        io::ErrorKind::NotFound => nfsstat3::NFS3ERR_NOENT,
        io::ErrorKind::AlreadyExists => nfsstat3::NFS3ERR_EXIST,
        io::ErrorKind::PermissionDenied => nfsstat3::NFS3ERR_ACCES,
        io::ErrorKind::NotADirectory => nfsstat3::NFS3ERR_NOTDIR,
        io::ErrorKind::IsADirectory => nfsstat3::NFS3ERR_ISDIR,
        io::ErrorKind::DirectoryNotEmpty => nfsstat3::NFS3ERR_NOTEMPTY,
        io::ErrorKind::StorageFull => nfsstat3::NFS3ERR_NOSPC,
        io::ErrorKind::ReadOnlyFilesystem => nfsstat3::NFS3ERR_ROFS,
        io::ErrorKind::FileTooLarge => nfsstat3::NFS3ERR_FBIG,
        io::ErrorKind::InvalidInput => nfsstat3::NFS3ERR_INVAL,
        io::ErrorKind::Unsupported => nfsstat3::NFS3ERR_NOTSUPP,
        _ => {
            error!("backing store error: {:?}", err);
            nfsstat3::NFS3ERR_IO
        }
    }
}

/// Extension trait turning backing store results into NFS results.
pub trait NfsResultExt<T> {
    fn or_nfs_error(self) -> NfsResult<T>;
}

impl<T> NfsResultExt<T> for io::Result<T> {
    fn or_nfs_error(self) -> NfsResult<T> {
        self.map_err(|e| nfsstat_from_io(&e))
    }
}

/// `NFS3ERR_NAMETOOLONG` for names longer than a single path component may be.
pub fn check_name(name: &[u8]) -> NfsResult<()> {
    if name.len() > crate::protocol::xdr::nfs3::NFS3_MAXNAMLEN {
        return Err(nfsstat3::NFS3ERR_NAMETOOLONG);
    }
    Ok(())
}
