// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt::{self, Debug, Display, Formatter};
use std::io::{self, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::time;
use tracing::{debug, info, trace, warn};

use crate::host::{ConnectOutcome, ConnectRequest, DisplayTarget, HookHandle, Host, Socket};
use crate::message::{Message, MessageQueue};
use crate::network::WireWriter;
use crate::{AppError, AppResult, ConfigError, LinkConfig, TlsConfig, TransportError};

/// Upper bound for the orderly shutdown of a socket being closed.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(state)
    }
}

/// What a successful [`Server::connect`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStarted {
    /// A new attempt was registered with the host.
    Initiated,
    AlreadyConnected,
    /// An earlier attempt is still in flight.
    InProgress,
}

/// A failed send. The message is handed back so the caller decides whether
/// to queue it; the transport never drops it.
#[derive(Debug, thiserror::Error)]
#[error("failed to send message {}: {}", .message.id(), .error)]
pub struct SendError {
    pub message: Message,
    #[source]
    pub error: TransportError,
}

impl From<SendError> for AppError {
    fn from(value: SendError) -> Self {
        AppError::Transport(value.error)
    }
}

/// Connection to one remote messaging server.
///
/// Owns the socket, the event loop registration (`fd_hook`) and both message
/// queues. The socket is present only while `Connected`; the hook only while
/// `Connecting` or `Connected`. Every state change updates all three
/// together.
///
/// A server is driven from a single task through `&mut self`, so none of its
/// state is locked.
pub struct Server {
    name: String,
    address: String,
    port: u16,
    user: String,
    password: String,
    tls: TlsConfig,

    state: ConnectionState,
    socket: Option<Socket>,
    fd_hook: Option<HookHandle>,
    pending_connect: Option<oneshot::Receiver<ConnectOutcome>>,
    server_buffer: Option<DisplayTarget>,

    send_queue: MessageQueue,
    receive_queue: MessageQueue,

    host: Arc<dyn Host>,
}

impl Server {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        host: Arc<dyn Host>,
    ) -> Self {
        Server {
            name: name.into(),
            address: address.into(),
            port,
            user: String::new(),
            password: String::new(),
            tls: TlsConfig::default(),
            state: ConnectionState::Disconnected,
            socket: None,
            fd_hook: None,
            pending_connect: None,
            server_buffer: None,
            send_queue: MessageQueue::new(),
            receive_queue: MessageQueue::new(),
            host,
        }
    }

    pub fn from_config(config: &LinkConfig, host: Arc<dyn Host>) -> Self {
        let server = &config.server;
        Server::new(&server.name, &server.address, server.port, host)
            .with_credentials(&server.user, &server.password)
            .with_tls(config.tls.clone())
    }

    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn has_socket(&self) -> bool {
        self.socket.is_some()
    }

    pub fn fd_hook(&self) -> Option<HookHandle> {
        self.fd_hook
    }

    pub fn server_buffer(&self) -> Option<&DisplayTarget> {
        self.server_buffer.as_ref()
    }

    /// Messages that failed to send, oldest first.
    pub fn send_queue(&self) -> &MessageQueue {
        &self.send_queue
    }

    pub fn send_queue_mut(&mut self) -> &mut MessageQueue {
        &mut self.send_queue
    }

    /// Messages written to the wire and waiting for their response.
    pub fn receive_queue(&self) -> &MessageQueue {
        &self.receive_queue
    }

    pub fn receive_queue_mut(&mut self) -> &mut MessageQueue {
        &mut self.receive_queue
    }

    fn print(&self, line: &str) {
        self.host.notify(self.server_buffer.as_ref(), line);
    }

    fn reject(&self, error: ConfigError) -> ConfigError {
        warn!(target: "matrixlink::network", server = %self.name, "{}", error);
        self.host.notify(None, &error.to_string());
        error
    }

    /// Starts a connect attempt and returns without waiting for it.
    ///
    /// Completion is collected later with [`Server::wait_connected`] or
    /// [`Server::try_complete_connect`].
    pub fn connect(&mut self) -> Result<ConnectStarted, ConfigError> {
        if self.address.is_empty() || self.port == 0 {
            return Err(self.reject(ConfigError::MissingAddress));
        }
        if self.user.is_empty() || self.password.is_empty() {
            return Err(self.reject(ConfigError::MissingCredentials));
        }

        match self.state {
            ConnectionState::Connected => return Ok(ConnectStarted::AlreadyConnected),
            ConnectionState::Connecting => return Ok(ConnectStarted::InProgress),
            ConnectionState::Disconnected => {}
        }

        if self.server_buffer.is_none() {
            self.server_buffer = Some(self.host.create_display_target(&self.name));
        }

        let ssl = if self.tls.verifies_hostname() {
            " (SSL)"
        } else {
            ""
        };
        self.print(&format!(
            "matrix: Connecting to {}:{}{}...",
            self.address, self.port, ssl
        ));

        let (completion, pending) = oneshot::channel();
        let hook = self.host.register_connect(ConnectRequest {
            name: self.name.clone(),
            address: self.address.clone(),
            port: self.port,
            tls: self.tls.clone(),
            completion,
        });
        self.fd_hook = Some(hook);
        self.pending_connect = Some(pending);
        self.state = ConnectionState::Connecting;
        debug!(target: "matrixlink::network", server = %self.name, hook = hook.id(), "connect registered");

        Ok(ConnectStarted::Initiated)
    }

    /// Waits for the in-flight connect attempt to finish.
    ///
    /// Dropping the returned future leaves the attempt pending.
    pub async fn wait_connected(&mut self) -> AppResult<()> {
        match self.state {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Connecting => {}
            ConnectionState::Disconnected => {
                return Err(AppError::IllegalStateError(format!(
                    "{}: no connect attempt in flight",
                    self.name
                )))
            }
        }
        let Some(pending) = self.pending_connect.as_mut() else {
            return Err(AppError::IllegalStateError(format!(
                "{}: connecting without a pending completion",
                self.name
            )));
        };
        let outcome = pending.await.unwrap_or_else(|_| Err(cancelled()));
        self.pending_connect = None;
        self.connect_cb(outcome)
    }

    /// Collects the connect completion if it already arrived. Returns `None`
    /// while the attempt is still running or when none is pending.
    pub fn try_complete_connect(&mut self) -> Option<AppResult<()>> {
        let pending = self.pending_connect.as_mut()?;
        let outcome = match pending.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(cancelled()),
        };
        self.pending_connect = None;
        Some(self.connect_cb(outcome))
    }

    fn connect_cb(&mut self, outcome: ConnectOutcome) -> AppResult<()> {
        if self.state != ConnectionState::Connecting {
            debug!(target: "matrixlink::network", server = %self.name, "ignoring stale connect completion");
            return Err(AppError::IllegalStateError(format!(
                "{}: connect completed while {}",
                self.name, self.state
            )));
        }
        match outcome {
            Ok(socket) => {
                self.socket = Some(socket);
                self.state = ConnectionState::Connected;
                info!(target: "matrixlink::network", server = %self.name, "connected to {}:{}", self.address, self.port);
                self.print(&format!("matrix: Connected to {}:{}", self.address, self.port));
                Ok(())
            }
            Err(e) => {
                if let Some(hook) = self.fd_hook.take() {
                    self.host.unregister(hook);
                }
                self.state = ConnectionState::Disconnected;
                warn!(target: "matrixlink::network", server = %self.name, "connect to {}:{} failed: {}", self.address, self.port, e);
                self.print(&format!(
                    "matrix: Error connecting to {}:{}: {}",
                    self.address, self.port, e
                ));
                Err(TransportError::from(e).into())
            }
        }
    }

    /// Tears the connection down. Calling it on a disconnected server does
    /// nothing: no unregister, no notification.
    pub async fn disconnect(&mut self) {
        if let Some(socket) = self.teardown() {
            close_socket(socket).await;
        }
    }

    fn teardown(&mut self) -> Option<Socket> {
        if self.state == ConnectionState::Disconnected {
            return None;
        }
        if let Some(hook) = self.fd_hook.take() {
            self.host.unregister(hook);
        }
        self.pending_connect = None;
        let socket = self.socket.take();
        self.state = ConnectionState::Disconnected;
        info!(target: "matrixlink::network", server = %self.name, "disconnected");
        self.print("Disconnected");
        socket
    }

    /// Writes `message` to the socket and moves it to the receive queue.
    ///
    /// Any write failure disconnects the server. Sending while not connected
    /// fails with [`TransportError::NotConnected`] and leaves the connection
    /// state alone. The message is returned in the error and is not queued
    /// here.
    pub async fn send(&mut self, mut message: Message) -> Result<(), SendError> {
        debug!(
            target: "matrixlink::messaging",
            server = %self.name,
            "Sending message of type {}.",
            message.message_type()
        );

        let connected = self.state == ConnectionState::Connected;
        let Some(socket) = self.socket.as_mut().filter(|_| connected) else {
            // nothing was written, an in-flight connect attempt stays alive
            let error = TransportError::NotConnected;
            self.print(&error.to_string());
            return Err(SendError { message, error });
        };

        let started_at = Local::now();
        match WireWriter::write(socket, &message).await {
            Ok(lag) => {
                message.mark_sent(started_at, lag);
                debug!(
                    target: "matrixlink::network",
                    server = %self.name,
                    "matrix: Message done sending (Lag: {}s), putting message in the receive queue.",
                    WireWriter::lag_string(lag)
                );
                self.receive_queue.push_back(message);
                Ok(())
            }
            Err(e) => {
                let error = TransportError::from(e);
                self.disconnect().await;
                self.print(&error.to_string());
                Err(SendError { message, error })
            }
        }
    }

    /// Sends `message`, or appends it to the send queue if that fails.
    pub async fn send_or_queue(&mut self, message: Message) {
        if let Err(SendError { message, error }) = self.send(message).await {
            debug!(
                target: "matrixlink::messaging",
                server = %self.name,
                "Failed sending message of type {}. Adding to queue ({})",
                message.message_type(),
                error
            );
            self.send_queue.push_back(message);
        }
    }

    /// Sends queued messages oldest first until the queue is empty or a send
    /// fails. A failed message goes back to the head. Returns how many were
    /// sent.
    pub async fn flush_send_queue(&mut self) -> usize {
        let mut sent = 0;
        while self.is_connected() {
            let Some(message) = self.send_queue.pop_front() else {
                break;
            };
            match self.send(message).await {
                Ok(()) => sent += 1,
                Err(SendError { message, .. }) => {
                    self.send_queue.push_front(message);
                    break;
                }
            }
        }
        if sent > 0 {
            trace!(target: "matrixlink::messaging", server = %self.name, "flushed {} queued messages", sent);
        }
        sent
    }
}

impl Debug for Server {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("state", &self.state)
            .field("fd_hook", &self.fd_hook)
            .field("send_queue", &self.send_queue.len())
            .field("receive_queue", &self.receive_queue.len())
            .finish_non_exhaustive()
    }
}

fn cancelled() -> io::Error {
    io::Error::new(ErrorKind::Interrupted, "connect attempt cancelled")
}

/// Shuts down the write half of the stream, then drops it to close it.
///
/// Failures are only logged: the socket is being thrown away either way.
pub async fn close_socket(mut socket: Socket) {
    match time::timeout(CLOSE_TIMEOUT, socket.shutdown()).await {
        Ok(Ok(())) => trace!(target: "matrixlink::network", "socket shut down"),
        Ok(Err(e)) => debug!(target: "matrixlink::network", "socket shutdown failed: {}", e),
        Err(_) => debug!(target: "matrixlink::network", "socket shutdown timed out"),
    }
    drop(socket);
}
