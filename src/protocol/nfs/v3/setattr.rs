//! SETATTR (procedure 2), RFC 1813 section 3.3.2.
//!
//! Mode, size and times are applied; owner changes are accepted and ignored.
//! A guard makes the call fail with `NFS3ERR_NOT_SYNC` unless the object's
//! ctime still matches the one the client saw.

use std::io::{Read, Write};

use tracing::{debug, warn};

use crate::error::NfsResultExt;
use crate::fs_util;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `SETATTR` procedure (procedure 2)
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the `SETATTR3args`
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_setattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::SETATTR3args>(input)?;
    debug!("nfsproc3_setattr({:?},{:?}) ", xid, args);

    if super::is_read_only(context) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let path = match context.handler.from_handle(&args.object) {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let pre_obj_attr = super::pre_op_attr(context, &path).await;
    if let Some(guard_ctime) = args.guard {
        if pre_obj_attr.map(|attr| attr.ctime) != Some(guard_ctime) {
            debug!("setattr guard mismatch {:?} --> NOT_SYNC", xid);
            let post_obj_attr = super::post_op_attr(context, &path).await;
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3ERR_NOT_SYNC.serialize(output)?;
            nfs3::wcc_data { before: pre_obj_attr, after: post_obj_attr }.serialize(output)?;
            return Ok(());
        }
    }

    let changes = fs_util::sattr3_to_set_attributes(&args.new_attribute);
    match super::filesystem(context).set_attr(&path, changes).await.or_nfs_error() {
        Ok(meta) => {
            let wcc_res = nfs3::wcc_data {
                before: pre_obj_attr,
                after: Some(fs_util::path_fattr3(&path, &meta)),
            };
            debug!("setattr success {:?} --> {:?}", xid, wcc_res);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            wcc_res.serialize(output)?;
        }
        Err(stat) => {
            debug!("setattr error {:?} --> {:?}", xid, stat);
            let post_obj_attr = super::post_op_attr(context, &path).await;
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data { before: pre_obj_attr, after: post_obj_attr }.serialize(output)?;
        }
    }
    Ok(())
}
