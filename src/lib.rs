pub mod host;
pub mod message;
pub mod network;
pub mod service;

pub use host::{
    AsyncSocket, ConnectOutcome, ConnectRequest, DisplayTarget, HookHandle, Host, Socket,
    TokioHost,
};
pub use message::{Message, MessageId, MessageQueue, MessageType};
pub use network::{ConnectStarted, ConnectionState, SendError, Server, WireWriter};
pub use service::{
    setup_console_tracing, setup_local_tracing, setup_tracing, AppError, AppResult, ConfigError,
    GeneralConfig, LinkConfig, ServerConfig, TlsConfig, TransportError,
};
