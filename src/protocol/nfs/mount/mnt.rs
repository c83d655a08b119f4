use std::io::{Read, Write};

use num_traits::cast::ToPrimitive;
use tracing::{debug, info};

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, mount, Serialize};

/// Resolves a mount request to the root handle of the mounted directory.
pub async fn mountproc3_mnt(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let path = deserialize::<mount::dirpath>(input)?;
    let utf8path = String::from_utf8_lossy(&path);
    debug!("mountproc3_mnt({:?},{:?}) ", xid, utf8path);

    if path.len() > mount::MNTPATHLEN {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        mount::mountstat3::MNT3ERR_NAMETOOLONG.serialize(output)?;
        return Ok(());
    }
    let Some(relative) = super::export_relative(&context.export_name, &utf8path) else {
        debug!("{:?} --> no matching export", xid);
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        mount::mountstat3::MNT3ERR_NOENT.serialize(output)?;
        return Ok(());
    };

    match context.handler.mount(&relative).await {
        Ok(root) => {
            let auth_flavors = [xdr::rpc::auth_flavor::AUTH_NULL, xdr::rpc::auth_flavor::AUTH_UNIX]
                .iter()
                .filter_map(ToPrimitive::to_u32)
                .collect();
            let response =
                mount::mountres3_ok { fhandle: context.handler.to_handle(&root).data, auth_flavors };
            info!("{} mounted {:?}", context.client_addr, root);
            debug!("{:?} --> {:?}", xid, response);
            if let Some(ref chan) = context.mount_signal {
                let _ = chan.send(true).await;
            }
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            mount::mountstat3::MNT3_OK.serialize(output)?;
            response.serialize(output)?;
        }
        Err(stat) => {
            debug!("{:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
        }
    }
    Ok(())
}
