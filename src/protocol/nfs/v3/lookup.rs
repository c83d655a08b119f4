//! LOOKUP (procedure 3), RFC 1813 section 3.3.3.
//!
//! LOOKUP turns a name inside a directory into a file handle. The client
//! specifies:
//! - The file handle of the directory to search
//! - The name to look up
//!
//! On success the server returns the handle and attributes of the object and
//! the attributes of the directory. `.` and `..` resolve to the directory
//! itself and its parent; the root is its own parent.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::NfsResultExt;
use crate::fs_util;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};
use crate::vfs;

/// Handles `NFSv3` `LOOKUP` procedure (procedure 3)
///
/// Fails with `NFS3ERR_NOTDIR` when the handle is not a directory and with
/// `NFS3ERR_NOENT` when the name is absent. The directory attributes are
/// returned in both cases.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the `diropargs3`
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_lookup(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let dirops = deserialize::<nfs3::diropargs3>(input)?;
    debug!("nfsproc3_lookup({:?},{:?}) ", xid, dirops);

    let dir = match context.handler.from_handle(&dirops.dir) {
        Ok(dir) => dir,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };

    let fs = super::filesystem(context);
    let dir_meta = match fs.stat(&dir).await.or_nfs_error() {
        Ok(meta) => meta,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };
    let dir_attr = Some(fs_util::path_fattr3(&dir, &dir_meta));

    let target = if !dir_meta.is_dir() {
        Err(nfs3::nfsstat3::NFS3ERR_NOTDIR)
    } else if dirops.name.as_ref() == b"." {
        Ok(dir.clone())
    } else if dirops.name.as_ref() == b".." {
        Ok(vfs::parent_path(&dir))
    } else {
        super::child_path(&dir, &dirops.name)
    };

    let found = match target {
        Ok(path) => fs.stat(&path).await.or_nfs_error().map(|meta| (path, meta)),
        Err(stat) => Err(stat),
    };

    match found {
        Ok((path, meta)) => {
            let obj_attr = Some(fs_util::path_fattr3(&path, &meta));
            debug!("nfsproc3_lookup success {:?} --> {:?}", xid, obj_attr);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            context.handler.to_handle(&path).serialize(output)?;
            obj_attr.serialize(output)?;
            dir_attr.serialize(output)?;
        }
        Err(stat) => {
            debug!("nfsproc3_lookup error {:?}({:?}) --> {:?}", xid, dirops.name, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            dir_attr.serialize(output)?;
        }
    }
    Ok(())
}
