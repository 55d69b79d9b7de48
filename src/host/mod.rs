//! Host Capability Interface
//!
//! The transport never talks to the UI or the event loop directly. Everything
//! it needs from its embedder goes through the [`Host`] trait, injected into
//! each [`Server`](crate::Server):
//!
//! - `notify` prints a user visible status line into a display target
//! - `create_display_target` creates the per server display target
//! - `register_connect` starts an asynchronous connect attempt
//! - `unregister` cancels a connect attempt or read registration
//!
//! Connect completion is delivered through the one-shot channel carried by
//! [`ConnectRequest`], so it fires at most once and never on the caller's
//! stack.

use std::fmt::{self, Debug, Display, Formatter};
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;

use crate::TlsConfig;

pub use tokio_host::TokioHost;

mod tokio_host;

/// A connected, already handshaked byte stream.
pub trait AsyncSocket: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> AsyncSocket for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type Socket = Box<dyn AsyncSocket>;

/// Result handed back by the host once a connect attempt finishes.
pub type ConnectOutcome = io::Result<Socket>;

/// Token for an event loop registration. Must be passed to
/// [`Host::unregister`] to stop further notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(u64);

impl HookHandle {
    pub fn new(id: u64) -> Self {
        HookHandle(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// The user visible status area of one server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayTarget(String);

impl DisplayTarget {
    pub fn new(name: impl Into<String>) -> Self {
        DisplayTarget(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for DisplayTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct ConnectRequest {
    /// Identity of the server the attempt belongs to.
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tls: TlsConfig,
    pub completion: oneshot::Sender<ConnectOutcome>,
}

impl Debug for ConnectRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

pub trait Host: Send + Sync {
    /// Prints a status line. `None` targets the global display.
    fn notify(&self, target: Option<&DisplayTarget>, line: &str);

    fn create_display_target(&self, name: &str) -> DisplayTarget;

    /// Starts a non-blocking connect. The returned handle stays valid for the
    /// read registration of the resulting connection.
    fn register_connect(&self, request: ConnectRequest) -> HookHandle;

    fn unregister(&self, handle: HookHandle);
}
