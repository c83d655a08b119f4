//! MKNOD (procedure 11), RFC 1813 section 3.3.11.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `MKNOD` procedure (procedure 11)
///
/// Special files cannot be created. The arguments are still decoded, and
/// the reply is `NFS3ERR_NOTSUPP` with the directory's wcc data.
pub async fn nfsproc3_mknod(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::MKNOD3args>(input)?;
    debug!("nfsproc3_mknod({:?}, {:?}) ", xid, args);

    let dir_attr = match context.handler.from_handle(&args.where_dir.dir) {
        Ok(dir) => super::post_op_attr(context, &dir).await,
        Err(_) => None,
    };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3ERR_NOTSUPP.serialize(output)?;
    nfs3::wcc_data { before: None, after: dir_attr }.serialize(output)?;
    Ok(())
}
