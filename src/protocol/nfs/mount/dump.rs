use std::io::Write;

use tracing::debug;

use crate::protocol::xdr::{self, Serialize};

/// Mounts are not recorded, so the mount list is always empty.
pub fn mountproc3_dump(xid: u32, output: &mut impl Write) -> Result<(), anyhow::Error> {
    debug!("mountproc3_dump({:?}) ", xid);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    false.serialize(output)?;
    Ok(())
}
