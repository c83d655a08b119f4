use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, mount, Serialize};

pub async fn mountproc3_umnt(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let path = deserialize::<mount::dirpath>(input)?;
    debug!("mountproc3_umnt({:?},{:?}) ", xid, String::from_utf8_lossy(&path));
    if let Some(ref chan) = context.mount_signal {
        let _ = chan.send(false).await;
    }
    // UMNT has a void result
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    Ok(())
}
