//! RMDIR (procedure 13), RFC 1813 section 3.3.13.
//!
//! RMDIR deletes an empty directory. `.` is rejected with `NFS3ERR_INVAL`
//! and `..` with `NFS3ERR_EXIST`; a directory with entries fails with
//! `NFS3ERR_NOTEMPTY`. Handles of the removed directory are dropped.

use std::io::{Read, Write};

use tracing::{debug, warn};

use crate::error::NfsResultExt;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `RMDIR` procedure (procedure 13)
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the `diropargs3` of the directory
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_rmdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let dirops = deserialize::<nfs3::diropargs3>(input)?;
    debug!("nfsproc3_rmdir({:?}, {:?}) ", xid, dirops);

    if super::is_read_only(context) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let dir = match context.handler.from_handle(&dirops.dir) {
        Ok(dir) => dir,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let pre_dir_attr = super::pre_op_attr(context, &dir).await;

    let removed = if dirops.name.as_ref() == b"." {
        Err(nfs3::nfsstat3::NFS3ERR_INVAL)
    } else if dirops.name.as_ref() == b".." {
        Err(nfs3::nfsstat3::NFS3ERR_EXIST)
    } else {
        match super::child_path(&dir, &dirops.name) {
            Ok(path) => {
                let res = super::filesystem(context).remove_dir(&path).await.or_nfs_error();
                if res.is_ok() {
                    context.handler.invalidate_path(&path);
                }
                res
            }
            Err(stat) => Err(stat),
        }
    };

    let dir_wcc =
        nfs3::wcc_data { before: pre_dir_attr, after: super::post_op_attr(context, &dir).await };
    match removed {
        Ok(()) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
        }
        Err(stat) => {
            debug!("rmdir error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
        }
    }
    dir_wcc.serialize(output)?;
    Ok(())
}
