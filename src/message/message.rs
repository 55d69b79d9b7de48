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

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Local};

use crate::AppError;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process unique identity, used downstream to match a response to the
/// request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    fn next() -> Self {
        MessageId(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Login,
    Sync,
    Send,
    State,
    Redact,
    RoomMsg,
    Join,
    Part,
    Invite,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Login => "login",
            MessageType::Sync => "sync",
            MessageType::Send => "send",
            MessageType::State => "state",
            MessageType::Redact => "redact",
            MessageType::RoomMsg => "room_msg",
            MessageType::Join => "join",
            MessageType::Part => "part",
            MessageType::Invite => "invite",
        }
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "login" => Ok(MessageType::Login),
            "sync" => Ok(MessageType::Sync),
            "send" => Ok(MessageType::Send),
            "state" => Ok(MessageType::State),
            "redact" => Ok(MessageType::Redact),
            "room_msg" => Ok(MessageType::RoomMsg),
            "join" => Ok(MessageType::Join),
            "part" => Ok(MessageType::Part),
            "invite" => Ok(MessageType::Invite),
            other => Err(AppError::InvalidValue(format!("message type: {}", other))),
        }
    }
}

/// A protocol envelope handed to the transport.
///
/// `request` carries the header block and `payload` the optional body; both
/// are written back to back with no framing of their own.
#[derive(Debug, Clone)]
pub struct Message {
    id: MessageId,
    message_type: MessageType,
    request: Bytes,
    payload: Option<Bytes>,
    send_time: Option<DateTime<Local>>,
    send_lag: Option<Duration>,
}

impl Message {
    pub fn new(message_type: MessageType, request: impl Into<Bytes>) -> Self {
        Message {
            id: MessageId::next(),
            message_type,
            request: request.into(),
            payload: None,
            send_time: None,
            send_lag: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn request(&self) -> &Bytes {
        &self.request
    }

    /// Body to write after the header. An empty body counts as absent.
    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref().filter(|payload| !payload.is_empty())
    }

    /// When the first byte was handed to the socket. Only set once the whole
    /// message went out.
    pub fn send_time(&self) -> Option<DateTime<Local>> {
        self.send_time
    }

    pub fn send_lag(&self) -> Option<Duration> {
        self.send_lag
    }

    pub(crate) fn mark_sent(&mut self, started_at: DateTime<Local>, lag: Duration) {
        self.send_time = Some(started_at);
        self.send_lag = Some(lag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let first = Message::new(MessageType::Sync, "GET /sync");
        let second = Message::new(MessageType::Sync, "GET /sync");
        assert!(second.id() > first.id());
        assert_ne!(first.id().value(), second.id().value());
    }

    #[test]
    fn test_empty_payload_counts_as_absent() {
        let message = Message::new(MessageType::Send, "PUT /send").with_payload("");
        assert!(message.payload().is_none());

        let message = Message::new(MessageType::Send, "PUT /send").with_payload("{}");
        assert_eq!(message.payload().map(|p| p.as_ref()), Some(&b"{}"[..]));
    }

    #[test]
    fn test_new_message_is_unsent() {
        let message = Message::new(MessageType::Login, "POST /login");
        assert!(message.send_time().is_none());
        assert!(message.send_lag().is_none());
        assert_eq!(message.request().as_ref(), b"POST /login");
    }

    #[test]
    fn test_message_type_parse() {
        assert_eq!("room_msg".parse::<MessageType>().unwrap(), MessageType::RoomMsg);
        assert_eq!("JOIN".parse::<MessageType>().unwrap(), MessageType::Join);
        assert!("bogus".parse::<MessageType>().is_err());
        assert_eq!(MessageType::Redact.to_string(), "redact");
    }
}
