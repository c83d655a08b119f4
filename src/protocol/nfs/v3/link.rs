//! LINK (procedure 15), RFC 1813 section 3.3.15.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `LINK` procedure (procedure 15)
///
/// Hard links are not supported by the backing store interface. The reply
/// is `NFS3ERR_NOTSUPP` with the file's attributes and the directory's wcc
/// data.
pub async fn nfsproc3_link(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::LINK3args>(input)?;
    debug!("nfsproc3_link({:?}, {:?}) ", xid, args);

    let file_attr = match context.handler.from_handle(&args.file) {
        Ok(path) => super::post_op_attr(context, &path).await,
        Err(_) => None,
    };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3ERR_NOTSUPP.serialize(output)?;
    file_attr.serialize(output)?;
    nfs3::wcc_data::default().serialize(output)?;
    Ok(())
}
