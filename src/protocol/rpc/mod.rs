//! ONC RPC version 2 (RFC 5531) transport and dispatch.
//!
//! Calls arrive as record-marked messages over TCP. Each complete message is
//! decoded, authenticated through the connection's handler, looked up in the
//! [`DispatchTable`] and run on its own task; replies go back through a
//! channel to the single socket writer.

mod context;
mod dispatch;
mod transaction_tracker;
mod wire;

pub use context::{server_write_verifier, Context};
pub use dispatch::{DispatchError, DispatchTable, Procedure};
pub use transaction_tracker::TransactionTracker;
pub use wire::{handle_rpc, write_fragment, SocketMessageHandler, SocketMessageType};

/// Largest RPC record accepted from a client. Anything bigger is treated as a
/// framing error and closes the connection.
pub const MAX_RPC_RECORD_LENGTH: usize = 4 * 1024 * 1024;
