//! MKDIR (procedure 9), RFC 1813 section 3.3.9.
//!
//! MKDIR creates a directory with the requested attributes, mode 0755 when
//! none is given. An existing name fails with `NFS3ERR_EXIST`. The reply
//! carries the new directory's handle and attributes and the parent's wcc
//! data.

use std::io::{Read, Write};

use tracing::{debug, warn};

use crate::error::NfsResultExt;
use crate::fs_util;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

const DEFAULT_DIR_MODE: u32 = 0o755;

/// Handles `NFSv3` `MKDIR` procedure (procedure 9)
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the `MKDIR3args`
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_mkdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::MKDIR3args>(input)?;
    debug!("nfsproc3_mkdir({:?}, {:?}) ", xid, args);

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

    let fs = super::filesystem(context);
    let created = async {
        let path = super::child_path(&dir, &args.dirops.name)?;
        let mode = args.attributes.mode.unwrap_or(DEFAULT_DIR_MODE);
        let mut meta = fs.mkdir(&path, mode).await.or_nfs_error()?;
        // the mode was applied on creation
        let changes = fs_util::sattr3_to_set_attributes(&nfs3::sattr3 {
            mode: None,
            ..args.attributes
        });
        if !changes.is_empty() {
            meta = fs.set_attr(&path, changes).await.or_nfs_error()?;
        }
        Ok::<_, nfs3::nfsstat3>((path, meta))
    }
    .await;

    let dir_wcc =
        nfs3::wcc_data { before: pre_dir_attr, after: super::post_op_attr(context, &dir).await };

    match created {
        Ok((path, meta)) => {
            let res = nfs3::diropres3ok {
                obj: Some(context.handler.to_handle(&path)),
                obj_attributes: Some(fs_util::path_fattr3(&path, &meta)),
                dir_wcc,
            };
            debug!("mkdir success {:?} --> {:?}", xid, res);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            debug!("mkdir error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            dir_wcc.serialize(output)?;
        }
    }
    Ok(())
}
