//! FSSTAT (procedure 18), RFC 1813 section 3.3.18.
//!
//! Reports space and file slot counts of the backing store. Stores that do
//! not track them report zeros.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::NfsResultExt;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `FSSTAT` procedure (procedure 18)
pub async fn nfsproc3_fsstat(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_fsstat({:?},{:?}) ", xid, handle);

    let path = match context.handler.from_handle(&handle) {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };

    let obj_attr = super::post_op_attr(context, &path).await;
    match super::filesystem(context).fs_stat().await.or_nfs_error() {
        Ok(stat) => {
            let res = nfs3::fs::FSSTAT3resok {
                obj_attributes: obj_attr,
                tbytes: stat.total_bytes,
                fbytes: stat.free_bytes,
                abytes: stat.avail_bytes,
                tfiles: stat.total_files,
                ffiles: stat.free_files,
                afiles: stat.avail_files,
                invarsec: 0,
            };
            debug!(" {:?} --> {:?}", xid, res);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            obj_attr.serialize(output)?;
        }
    }
    Ok(())
}
