//! ACCESS (procedure 4), RFC 1813 section 3.3.4.
//!
//! ACCESS tells a client which operations it may perform on an object, so it
//! can cache permissions instead of trying an operation to find out.
//! The client specifies:
//! - The file handle of the object
//! - A bit mask of the rights it asks about (`ACCESS3_READ`, `ACCESS3_LOOKUP`,
//!   `ACCESS3_MODIFY`, `ACCESS3_EXTEND`, `ACCESS3_DELETE`, `ACCESS3_EXECUTE`)
//!
//! The server answers with the subset it grants, derived from the object's
//! permission bits, plus the object's attributes.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::NfsResultExt;
use crate::fs_util;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};
use crate::vfs::Metadata;

/// Access bits the object's permission bits allow, ignoring ownership.
/// Modifying bits are never granted on a read-only store.
fn allowed_access(meta: &Metadata, read_only: bool) -> u32 {
    let readable = meta.mode & 0o444 != 0;
    let writable = meta.mode & 0o222 != 0 && !read_only;
    let executable = meta.mode & 0o111 != 0;

    let mut allowed = 0;
    if readable {
        allowed |= nfs3::ACCESS3_READ;
    }
    if writable {
        allowed |= nfs3::ACCESS3_MODIFY | nfs3::ACCESS3_EXTEND;
    }
    if meta.is_dir() {
        if executable {
            allowed |= nfs3::ACCESS3_LOOKUP;
        }
        if writable {
            allowed |= nfs3::ACCESS3_DELETE;
        }
    } else if executable {
        allowed |= nfs3::ACCESS3_EXECUTE;
    }
    allowed
}

/// Handles `NFSv3` `ACCESS` procedure (procedure 4)
///
/// Grants only bits the client asked for. Nothing that modifies the object
/// is granted on a read-only store.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the file handle and the requested access mask
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_access(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::ACCESS3args>(input)?;
    debug!("nfsproc3_access({:?},{:?}) ", xid, args);

    let found = match context.handler.from_handle(&args.object) {
        Ok(path) => super::filesystem(context).stat(&path).await.or_nfs_error().map(|m| (path, m)),
        Err(stat) => Err(stat),
    };
    match found {
        Ok((path, meta)) => {
            let access = args.access & allowed_access(&meta, super::is_read_only(context));
            debug!(" {:?} ---> {:?}", xid, access);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            Some(fs_util::path_fattr3(&path, &meta)).serialize(output)?;
            access.serialize(output)?;
        }
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
        }
    }
    Ok(())
}
