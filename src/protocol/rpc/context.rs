//! Per-connection state handed to every procedure.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::handler::NfsHandler;
use crate::protocol::xdr;
use crate::protocol::xdr::nfs3;

/// State shared by all calls on one connection.
///
/// `auth` is filled per call from an `AUTH_UNIX` credential; everything else
/// is set up when the connection is accepted.
#[derive(Clone)]
pub struct Context {
    pub local_port: u16,
    /// Client `ip:port`, also the key for retransmission detection.
    pub client_addr: String,
    pub auth: xdr::rpc::auth_unix,
    pub handler: Arc<dyn NfsHandler>,
    pub dispatch: Arc<super::DispatchTable>,
    /// Receives `true` on MNT and `false` on UMNT/UMNTALL.
    pub mount_signal: Option<mpsc::Sender<bool>>,
    /// Path clients mount, always starting with `/`.
    pub export_name: Arc<String>,
    pub transaction_tracker: Arc<super::TransactionTracker>,
    /// Returned by WRITE and COMMIT; changes when the server restarts.
    pub write_verifier: nfs3::writeverf3,
}

impl Context {
    /// Context for a handler without a network connection behind it.
    pub fn new(handler: Arc<dyn NfsHandler>) -> Context {
        Context {
            local_port: 0,
            client_addr: String::new(),
            auth: xdr::rpc::auth_unix::default(),
            handler,
            dispatch: Arc::new(super::DispatchTable::new()),
            mount_signal: None,
            export_name: Arc::new("/".to_string()),
            transaction_tracker: Arc::new(super::TransactionTracker::new(
                std::time::Duration::from_secs(60),
            )),
            write_verifier: server_write_verifier(),
        }
    }
}

/// Verifier derived from the current time, taken once per listener.
pub fn server_write_verifier() -> nfs3::writeverf3 {
    let since_epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    (since_epoch.as_nanos() as u64).to_be_bytes()
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("rpc::Context")
            .field("local_port", &self.local_port)
            .field("client_addr", &self.client_addr)
            .field("auth", &self.auth)
            .field("export_name", &self.export_name)
            .finish()
    }
}
