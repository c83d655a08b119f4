//! RENAME (procedure 14), RFC 1813 section 3.3.14.
//!
//! Handles issued for the source, the replaced target and anything below
//! either of them are dropped after a successful rename.

use std::io::{Read, Write};

use tracing::{debug, warn};

use crate::error::NfsResultExt;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `RENAME` procedure (procedure 14)
///
/// Replies with the wcc data of both directories, also on failure.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the `RENAME3args`
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_rename(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::RENAME3args>(input)?;
    debug!("nfsproc3_rename({:?}, {:?}) ", xid, args);

    if super::is_read_only(context) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let dirs = context
        .handler
        .from_handle(&args.from.dir)
        .and_then(|from| Ok((from, context.handler.from_handle(&args.to.dir)?)));
    let (from_dir, to_dir) = match dirs {
        Ok(dirs) => dirs,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let pre_from_dir_attr = super::pre_op_attr(context, &from_dir).await;
    let pre_to_dir_attr = super::pre_op_attr(context, &to_dir).await;

    let renamed = async {
        let from = super::child_path(&from_dir, &args.from.name)?;
        let to = super::child_path(&to_dir, &args.to.name)?;
        super::filesystem(context).rename(&from, &to).await.or_nfs_error()?;
        context.handler.invalidate_path(&from);
        context.handler.invalidate_path(&to);
        Ok::<_, nfs3::nfsstat3>(())
    }
    .await;

    let from_dir_wcc = nfs3::wcc_data {
        before: pre_from_dir_attr,
        after: super::post_op_attr(context, &from_dir).await,
    };
    let to_dir_wcc = nfs3::wcc_data {
        before: pre_to_dir_attr,
        after: super::post_op_attr(context, &to_dir).await,
    };

    let stat = match renamed {
        Ok(()) => nfs3::nfsstat3::NFS3_OK,
        Err(stat) => {
            debug!("rename error {:?} --> {:?}", xid, stat);
            stat
        }
    };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    stat.serialize(output)?;
    from_dir_wcc.serialize(output)?;
    to_dir_wcc.serialize(output)?;
    Ok(())
}
