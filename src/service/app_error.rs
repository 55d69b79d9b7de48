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

use std::io::{self, ErrorKind};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// general errors
    #[error("illegal state: {0}")]
    IllegalStateError(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("io error: {0}")]
    IoError(#[from] io::Error),

    #[error("config file error: {0}")]
    ConfigFileError(#[from] ::config::ConfigError),

    #[error("tls error: {0}")]
    TlsError(String),

    /// connection parameter errors, raised before any I/O
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// socket level failures
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Connection parameters that prevent a connect attempt from starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Server address or port not set")]
    MissingAddress,

    #[error("User or password not set")]
    MissingCredentials,
}

/// Failure while moving bytes over an established connection.
///
/// Every variant currently tears the connection down. The classification is
/// kept so a retry policy can treat transient conditions differently later.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("operation would block: {0}")]
    WouldBlock(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("not connected")]
    NotConnected,

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether the connection must be torn down. Always true: even the
    /// transient kinds (`WouldBlock`, `Timeout`) have no retry policy.
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        let text = error.to_string();
        match error.kind() {
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => TransportError::ConnectionReset(text),
            ErrorKind::WouldBlock => TransportError::WouldBlock(text),
            ErrorKind::TimedOut => TransportError::Timeout(text),
            ErrorKind::NotConnected => TransportError::NotConnected,
            _ => TransportError::Other(text),
        }
    }
}
