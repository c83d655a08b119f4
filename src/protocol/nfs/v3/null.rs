//! NULL (procedure 0), RFC 1813 section 3.3.0.
//!
//! Does no work. Clients call it to check that the server answers.

use std::io::Write;

use tracing::debug;

use crate::protocol::xdr::{self, Serialize};

/// Handles `NFSv3` `NULL` procedure
pub fn nfsproc3_null(xid: u32, output: &mut impl Write) -> Result<(), anyhow::Error> {
    debug!("nfsproc3_null({:?}) ", xid);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    Ok(())
}
