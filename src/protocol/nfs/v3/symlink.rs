//! SYMLINK (procedure 10), RFC 1813 section 3.3.10.
//!
//! SYMLINK creates a symbolic link with the given target. The target is
//! stored as given and never resolved by the server.

use std::io::{Read, Write};

use tracing::{debug, warn};

use crate::error::NfsResultExt;
use crate::fs_util;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `SYMLINK` procedure (procedure 10)
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the `SYMLINK3args`
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_symlink(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::SYMLINK3args>(input)?;
    debug!("nfsproc3_symlink({:?}, {:?}) ", xid, args);

    if super::is_read_only(context) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let dir = match context.handler.from_handle(&args.dirops.dir) {
        Ok(dir) => dir,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let pre_dir_attr = super::pre_op_attr(context, &dir).await;

    let created = match super::child_path(&dir, &args.dirops.name) {
        Ok(path) => super::filesystem(context)
            .symlink(&path, &args.symlink.symlink_data)
            .await
            .or_nfs_error()
            .map(|meta| (path, meta)),
        Err(stat) => Err(stat),
    };

    let dir_wcc =
        nfs3::wcc_data { before: pre_dir_attr, after: super::post_op_attr(context, &dir).await };

    match created {
        Ok((path, meta)) => {
            let res = nfs3::diropres3ok {
                obj: Some(context.handler.to_handle(&path)),
                obj_attributes: Some(fs_util::path_fattr3(&path, &meta)),
                dir_wcc,
            };
            debug!("symlink success {:?} --> {:?}", xid, res);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            debug!("symlink error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            dir_wcc.serialize(output)?;
        }
    }
    Ok(())
}
