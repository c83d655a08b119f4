//! READLINK (procedure 5), RFC 1813 section 3.3.5.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::NfsResultExt;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `READLINK` procedure (procedure 5)
///
/// Returns the target of a symbolic link exactly as stored, with the link's
/// attributes.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the file handle of the link
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_readlink(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_readlink({:?},{:?}) ", xid, handle);

    let path = match context.handler.from_handle(&handle) {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };
    let symlink_attr = super::post_op_attr(context, &path).await;
    match super::filesystem(context).read_link(&path).await.or_nfs_error() {
        Ok(target) => {
            debug!(" {:?} --> {:?}", xid, String::from_utf8_lossy(&target));
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            symlink_attr.serialize(output)?;
            nfs3::nfspath3::from(target).serialize(output)?;
        }
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            symlink_attr.serialize(output)?;
        }
    }
    Ok(())
}
