use std::io::Write;

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, Serialize};

/// Lists the single export, open to every client (no groups).
pub fn mountproc3_export(
    xid: u32,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    debug!("mountproc3_export({:?}) ", xid);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    true.serialize(output)?;
    context.export_name.as_bytes().serialize(output)?;
    false.serialize(output)?;
    false.serialize(output)?;
    Ok(())
}
