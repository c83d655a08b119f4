//! WRITE (procedure 7), RFC 1813 section 3.3.7.
//!
//! Data always reaches the backing store before the reply, so every write is
//! answered as `FILE_SYNC`.

use std::io::{Read, Write};

use tracing::{debug, error, warn};

use crate::error::NfsResultExt;
use crate::fs_util;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `WRITE` procedure (procedure 7)
///
/// A `count` that differs from the length of the data is answered with
/// `GARBAGE_ARGS`. Writes past the store's maximum file size fail with
/// `NFS3ERR_FBIG`.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the `WRITE3args`
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_write(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::WRITE3args>(input)?;
    debug!("nfsproc3_write({:?},{:?},{:?},{:?}) ", xid, args.file, args.offset, args.count);
    // sanity check the length
    if args.data.len() != args.count as usize {
        xdr::rpc::garbage_args_reply_message(xid).serialize(output)?;
        return Ok(());
    }

    if super::is_read_only(context) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let path = match context.handler.from_handle(&args.file) {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    // get the object attributes before the write
    let pre_obj_attr = super::pre_op_attr(context, &path).await;

    match super::filesystem(context).write(&path, args.offset, &args.data).await.or_nfs_error() {
        Ok(meta) => {
            let fattr = fs_util::path_fattr3(&path, &meta);
            debug!("write success {:?} --> {:?}", xid, fattr);
            let res = nfs3::file::WRITE3resok {
                file_wcc: nfs3::wcc_data { before: pre_obj_attr, after: Some(fattr) },
                count: args.count,
                committed: nfs3::file::stable_how::FILE_SYNC,
                verf: context.write_verifier,
            };
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("write error {:?} --> {:?}", xid, stat);
            let post_obj_attr = super::post_op_attr(context, &path).await;
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data { before: pre_obj_attr, after: post_obj_attr }.serialize(output)?;
        }
    }
    Ok(())
}
