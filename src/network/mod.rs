//! Network Module Implementation
//!
//! This module provides the client side transport: the connection lifecycle of
//! a remote server and the serialization of outgoing messages.
//!
//! # Components
//!
//! - `Server`: validates settings, drives connect/disconnect, owns the socket,
//!   the event loop registration and both message queues
//! - `WireWriter`: writes the header and payload of a message and measures the
//!   send lag
//! - `tls`: client side TLS upgrade used by the tokio host
//!
//! # Failure model
//!
//! Any write failure is fatal to the connection: the server disconnects and
//! the message is handed back to the caller, which either queues it
//! (`send_or_queue`) or decides otherwise.

pub use connection::{close_socket, ConnectStarted, ConnectionState, SendError, Server};
pub use tls::{client_config, connect_tls, ClientTlsStream};
pub use wire::WireWriter;
mod connection;
mod tls;
mod wire;
