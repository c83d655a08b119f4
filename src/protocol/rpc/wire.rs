//! Record marking (RFC 5531 section 11) and per-call processing.

use std::io::Cursor;
use std::io::{Read, Write};

use anyhow::anyhow;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};
use tracing_attributes::instrument;

use crate::protocol::xdr::{self, deserialize, Serialize};
use crate::protocol::{nfs, rpc};

/// Processes one complete RPC message.
///
/// Returns `Ok(false)` when nothing has to be sent back (a retransmission of
/// a call already in progress). Errors are connection level: an undecodable
/// call header, undecodable procedure arguments or a reply where a call was
/// expected. No reply is written for them.
pub async fn handle_rpc(
    input: &mut impl Read,
    output: &mut impl Write,
    mut context: rpc::Context,
) -> Result<bool, anyhow::Error> {
    let recv = deserialize::<xdr::rpc::rpc_msg>(input)?;
    let xid = recv.xid;
    let xdr::rpc::rpc_body::CALL(call) = recv.body else {
        error!("Unexpectedly received a Reply instead of a Call");
        return Err(anyhow!("Bad RPC Call format"));
    };

    if call.rpcvers != xdr::rpc::RPC_VERSION {
        warn!("Invalid RPC version {} != {}", call.rpcvers, xdr::rpc::RPC_VERSION);
        xdr::rpc::rpc_vers_mismatch(xid).serialize(output)?;
        return Ok(true);
    }

    if let Err(stat) = context.handler.authenticate(&call.cred) {
        warn!("Rejected credential {:?} of {}: {:?}", call.cred.flavor, context.client_addr, stat);
        xdr::rpc::auth_error_reply_message(xid, stat).serialize(output)?;
        return Ok(true);
    }
    if call.cred.flavor == xdr::rpc::auth_flavor::AUTH_UNIX {
        match deserialize(&mut Cursor::new(&call.cred.body)) {
            Ok(auth) => context.auth = auth,
            Err(e) => {
                warn!("Malformed AUTH_UNIX credential: {:?}", e);
                xdr::rpc::auth_error_reply_message(xid, xdr::rpc::auth_stat::AUTH_BADCRED)
                    .serialize(output)?;
                return Ok(true);
            }
        }
    }

    if context.transaction_tracker.is_retransmission(xid, &context.client_addr) {
        debug!(
            "Retransmission detected, xid: {}, client_addr: {}, call: {:?}",
            xid, context.client_addr, call
        );
        return Ok(false);
    }

    let procedure = match context.dispatch.lookup(call.prog, call.vers, call.proc) {
        Ok(procedure) => procedure,
        Err(e) => {
            warn!("Cannot dispatch prog {} vers {} proc {}: {:?}", call.prog, call.vers, call.proc, e);
            e.reply(xid).serialize(output)?;
            context.transaction_tracker.mark_processed(xid, &context.client_addr);
            return Ok(true);
        }
    };

    // Procedures write into a scratch buffer; nothing of a call whose
    // arguments fail to decode reaches the client.
    let mut reply = Cursor::new(Vec::new());
    let res = match procedure {
        rpc::Procedure::Nfs(proc) => {
            nfs::v3::handle_nfs(xid, proc, input, &mut reply, &context).await
        }
        rpc::Procedure::Mount(proc) => {
            nfs::mount::handle_mount(xid, proc, input, &mut reply, &context).await
        }
    };
    context.transaction_tracker.mark_processed(xid, &context.client_addr);

    if let Err(e) = res {
        error!("Undecodable arguments for {:?}, xid {}: {:?}", procedure, xid, e);
        return Err(e);
    }
    output.write_all(&reply.into_inner())?;
    Ok(true)
}

/// Reads one record fragment, appending it to `append_to`. Returns true for
/// the last fragment of a record.
async fn read_fragment(
    socket: &mut DuplexStream,
    append_to: &mut Vec<u8>,
) -> Result<bool, anyhow::Error> {
    let mut header_buf = [0_u8; 4];
    socket.read_exact(&mut header_buf).await?;
    let fragment_header = u32::from_be_bytes(header_buf);
    let is_last = (fragment_header & (1 << 31)) > 0;
    let length = (fragment_header & ((1 << 31) - 1)) as usize;
    trace!("Reading fragment length:{}, last:{}", length, is_last);
    if append_to.len().saturating_add(length) > rpc::MAX_RPC_RECORD_LENGTH {
        return Err(anyhow!(
            "RPC record length {} exceeds max {}",
            append_to.len().saturating_add(length),
            rpc::MAX_RPC_RECORD_LENGTH
        ));
    }
    let start_offset = append_to.len();
    append_to.resize(start_offset + length, 0);
    socket.read_exact(&mut append_to[start_offset..]).await?;
    trace!("Finishing Reading fragment length:{}, last:{}", length, is_last);
    Ok(is_last)
}

/// Writes `buf` as one record, split into fragments of at most 2^31 - 1 bytes.
pub async fn write_fragment(
    socket: &mut (impl AsyncWrite + Unpin),
    buf: &[u8],
) -> Result<(), anyhow::Error> {
    const MAX_FRAGMENT_SIZE: usize = (1 << 31) - 1;

    let mut offset = 0;
    loop {
        let fragment_size = std::cmp::min(buf.len() - offset, MAX_FRAGMENT_SIZE);
        let is_last = offset + fragment_size >= buf.len();
        let fragment_header =
            if is_last { fragment_size as u32 | (1 << 31) } else { fragment_size as u32 };

        socket.write_all(&fragment_header.to_be_bytes()).await?;
        trace!("Writing fragment length:{}, last:{}", fragment_size, is_last);
        socket.write_all(&buf[offset..offset + fragment_size]).await?;

        offset += fragment_size;
        if is_last {
            return Ok(());
        }
    }
}

pub type SocketMessageType = Result<Vec<u8>, anyhow::Error>;

/// Reassembles records from a connection and runs each call on its own task.
///
/// Bytes read from the socket are written into the [`DuplexStream`] returned
/// by [`SocketMessageHandler::new`]; encoded replies, or the error that ends
/// the connection, come out of the returned receiver. Replies of concurrent
/// calls arrive in completion order.
#[derive(Debug)]
pub struct SocketMessageHandler {
    cur_fragment: Vec<u8>,
    socket_receive_channel: DuplexStream,
    reply_send_channel: mpsc::UnboundedSender<SocketMessageType>,
    context: rpc::Context,
}

impl SocketMessageHandler {
    pub fn new(
        context: &rpc::Context,
    ) -> (Self, DuplexStream, mpsc::UnboundedReceiver<SocketMessageType>) {
        let (socksend, sockrecv) = tokio::io::duplex(256_000);
        let (msgsend, msgrecv) = mpsc::unbounded_channel();
        (
            Self {
                cur_fragment: Vec::new(),
                socket_receive_channel: sockrecv,
                reply_send_channel: msgsend,
                context: context.clone(),
            },
            socksend,
            msgrecv,
        )
    }

    /// Reads one fragment. Once a record is complete its call is spawned.
    /// Should be called in a loop until it fails.
    pub async fn read(&mut self) -> Result<(), anyhow::Error> {
        let is_last =
            match read_fragment(&mut self.socket_receive_channel, &mut self.cur_fragment).await {
                Ok(is_last) => is_last,
                Err(e) => {
                    let _ = self.reply_send_channel.send(Err(anyhow!("{e}")));
                    return Err(e);
                }
            };
        if is_last {
            let record = std::mem::take(&mut self.cur_fragment);
            let context = self.context.clone();
            let replies = self.reply_send_channel.clone();
            tokio::spawn(process_call(record, context, replies));
        }
        Ok(())
    }
}

#[instrument(skip_all, fields(client = %context.client_addr))]
async fn process_call(
    record: Vec<u8>,
    context: rpc::Context,
    replies: mpsc::UnboundedSender<SocketMessageType>,
) {
    let mut input = Cursor::new(record);
    let mut output = Cursor::new(Vec::new());
    match handle_rpc(&mut input, &mut output, context).await {
        Ok(true) => {
            // The connection may be gone already; the reply is dropped then.
            let _ = replies.send(Ok(output.into_inner()));
        }
        Ok(false) => {}
        Err(e) => {
            error!("RPC error: {:?}", e);
            let _ = replies.send(Err(e));
        }
    }
}
