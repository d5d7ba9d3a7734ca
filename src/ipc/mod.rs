//! IPC subsystem — Unix socket server, message framing, and dispatch.
//!
//! Protocol: length-prefixed s-expression frames (4-byte big-endian
//! length + UTF-8 payload). Clients must complete a `hello` handshake
//! before any other message is accepted.

pub mod dispatch;
pub mod server;

pub use server::IpcServer;
