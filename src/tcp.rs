//! TCP front end of the server.
//!
//! [`NFSTcpListener`] accepts client connections and runs every connection on
//! its own task. Bytes read from a socket are fed into an
//! [`rpc::SocketMessageHandler`], which spawns a task per complete call;
//! replies come back over a channel and are written, record marked, by the
//! connection task.

use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_attributes::instrument;

use crate::handler::NfsHandler;
use crate::protocol::{rpc, xdr};

/// How long a processed xid is remembered for retransmission detection.
const RETRANSMISSION_WINDOW: Duration = Duration::from_secs(60);

/// Accepts NFS and MOUNT clients over TCP for one handler.
pub struct NFSTcpListener<H: NfsHandler + 'static> {
    listener: TcpListener,
    port: u16,
    handler: Arc<H>,
    dispatch: Arc<rpc::DispatchTable>,
    mount_signal: Option<mpsc::Sender<bool>>,
    export_name: Arc<String>,
    transaction_tracker: Arc<rpc::TransactionTracker>,
    write_verifier: xdr::nfs3::writeverf3,
}

/// Generates a local loopback IP address from a 16-bit host number, in the
/// 127.88.x.y range.
pub fn generate_host_ip(hostnum: u16) -> String {
    format!("127.88.{}.{}", ((hostnum >> 8) & 0xFF) as u8, (hostnum & 0xFF) as u8)
}

/// Shuttles bytes between a client socket and its message handler until the
/// client disconnects or the framing breaks.
#[instrument(skip_all, fields(client = %context.client_addr))]
async fn process_socket(mut socket: TcpStream, context: rpc::Context) -> Result<(), anyhow::Error> {
    let (mut message_handler, mut socksend, mut msgrecvchan) =
        rpc::SocketMessageHandler::new(&context);
    let _ = socket.set_nodelay(true);

    tokio::spawn(async move {
        loop {
            if let Err(e) = message_handler.read().await {
                debug!("Message loop broken due to {:?}", e);
                break;
            }
        }
    });
    loop {
        tokio::select! {
            _ = socket.readable() => {
                let mut buf = [0; 128_000];

                match socket.try_read(&mut buf) {
                    Ok(0) => {
                        debug!("Client closed the connection");
                        return Ok(());
                    }
                    Ok(n) => {
                        let _ = socksend.write_all(&buf[..n]).await;
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => {
                        debug!("Message handling closed : {:?}", e);
                        return Err(e.into());
                    }
                }
            },
            reply = msgrecvchan.recv() => {
                match reply {
                    Some(Err(e)) => {
                        debug!("Message handling closed : {:?}", e);
                        return Err(e);
                    }
                    Some(Ok(msg)) => {
                        if let Err(e) = rpc::write_fragment(&mut socket, &msg).await {
                            error!("Write error {:?}", e);
                        }
                    }
                    None => {
                        return Err(anyhow::anyhow!("Unexpected socket context termination"));
                    }
                }
            }
        }
    }
}

/// Operations of a running NFS TCP server.
#[async_trait]
pub trait NFSTcp: Send + Sync {
    /// Port the server listens on. Useful after binding to port 0.
    fn get_listen_port(&self) -> u16;

    /// Address the server listens on, e.g. the one picked by `auto`.
    fn get_listen_ip(&self) -> IpAddr;

    /// Registers a channel that receives `true` on every MNT and `false` on
    /// every UMNT/UMNTALL.
    fn set_mount_listener(&mut self, signal: mpsc::Sender<bool>);

    /// Accepts connections until the listener fails.
    async fn handle_forever(&self) -> io::Result<()>;
}

impl<H: NfsHandler + 'static> NFSTcpListener<H> {
    /// Binds to `ipstr`, either `ip:port` or `auto:port`. `auto` tries
    /// addresses from [`generate_host_ip`] until one is free.
    pub async fn bind(ipstr: &str, handler: H) -> io::Result<NFSTcpListener<H>> {
        let (ip, port) = ipstr.split_once(':').ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "IP Address must be of form ip:port")
        })?;
        let port = port.parse::<u16>().map_err(|_| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "Port not in range 0..=65535")
        })?;
        let handler = Arc::new(handler);

        if ip != "auto" {
            return NFSTcpListener::bind_internal(ip, port, handler).await;
        }

        const NUM_TRIES: u16 = 32;
        for try_ip in 1..=NUM_TRIES {
            let ip = generate_host_ip(try_ip);
            let result = NFSTcpListener::bind_internal(&ip, port, handler.clone()).await;

            if result.is_ok() {
                return result;
            }
        }

        Err(io::Error::other("Can't bind automatically"))
    }

    async fn bind_internal(ip: &str, port: u16, handler: Arc<H>) -> io::Result<NFSTcpListener<H>> {
        let ipstr = format!("{ip}:{port}");
        let listener = TcpListener::bind(&ipstr).await?;
        let port = listener.local_addr()?.port();
        info!("Listening on {}:{}", ip, port);

        Ok(NFSTcpListener {
            listener,
            port,
            handler,
            dispatch: Arc::new(rpc::DispatchTable::new()),
            mount_signal: None,
            export_name: Arc::new("/".to_string()),
            transaction_tracker: Arc::new(rpc::TransactionTracker::new(RETRANSMISSION_WINDOW)),
            write_verifier: rpc::server_write_verifier(),
        })
    }

    /// Sets the path clients mount. Leading and trailing slashes are
    /// normalized, so `"data/"` is exported as `/data`.
    pub fn with_export_name<S: AsRef<str>>(&mut self, export_name: S) {
        self.export_name = Arc::new(format!(
            "/{}",
            export_name.as_ref().trim_end_matches('/').trim_start_matches('/')
        ));
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    fn connection_context(&self, socket: &TcpStream) -> io::Result<rpc::Context> {
        Ok(rpc::Context {
            local_port: self.port,
            client_addr: socket.peer_addr()?.to_string(),
            auth: xdr::rpc::auth_unix::default(),
            handler: self.handler.clone(),
            dispatch: self.dispatch.clone(),
            mount_signal: self.mount_signal.clone(),
            export_name: self.export_name.clone(),
            transaction_tracker: self.transaction_tracker.clone(),
            write_verifier: self.write_verifier,
        })
    }
}

#[async_trait]
impl<H: NfsHandler + 'static> NFSTcp for NFSTcpListener<H> {
    fn get_listen_port(&self) -> u16 {
        self.port
    }

    fn get_listen_ip(&self) -> IpAddr {
        self.listener
            .local_addr()
            .map_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), |addr| addr.ip())
    }

    fn set_mount_listener(&mut self, signal: mpsc::Sender<bool>) {
        self.mount_signal = Some(signal);
    }

    async fn handle_forever(&self) -> io::Result<()> {
        loop {
            let (socket, _) = self.listener.accept().await?;
            let context = match self.connection_context(&socket) {
                Ok(context) => context,
                Err(e) => {
                    // the peer is already gone
                    debug!("Dropping connection: {:?}", e);
                    continue;
                }
            };
            info!("Accepting connection from {}", context.client_addr);
            debug!("Accepting socket {:?} {:?}", socket, context);
            tokio::spawn(async move {
                if let Err(e) = process_socket(socket, context).await {
                    debug!("Connection closed: {:?}", e);
                }
            });
        }
    }
}
