use std::io;
use std::time::{Duration, Instant};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::message::Message;

/// Writes messages onto an established stream.
///
/// A message is the header block followed by the optional payload, back to
/// back, with no length prefix. Either both blocks are fully written and
/// flushed or the write fails; callers never see a partial success.
#[derive(Debug, Default, Clone, Copy)]
pub struct WireWriter;

impl WireWriter {
    /// Writes `message` and returns how long the write took.
    pub async fn write<S>(socket: &mut S, message: &Message) -> io::Result<Duration>
    where
        S: AsyncWrite + Unpin + ?Sized,
    {
        let start = Instant::now();
        socket.write_all(message.request()).await?;
        if let Some(payload) = message.payload() {
            socket.write_all(payload).await?;
        }
        socket.flush().await?;
        Ok(start.elapsed())
    }

    /// Formats a send lag in seconds: millisecond precision below one second,
    /// centisecond precision above.
    pub fn lag_string(lag: Duration) -> String {
        let seconds = lag.as_secs_f64();
        if seconds < 1.0 {
            format!("{:.3}", seconds)
        } else {
            format!("{:.2}", seconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::message::MessageType;

    #[tokio::test]
    async fn test_writes_header_then_payload() {
        let mut socket = Builder::new()
            .write(b"PUT /send HTTP/1.1\r\n\r\n")
            .write(b"{\"body\":\"hi\"}")
            .build();
        let message = Message::new(MessageType::Send, "PUT /send HTTP/1.1\r\n\r\n")
            .with_payload("{\"body\":\"hi\"}");

        let lag = WireWriter::write(&mut socket, &message).await.unwrap();
        assert!(lag >= Duration::ZERO);
    }

    #[tokio::test]
    async fn test_header_only() {
        let mut socket = Builder::new().write(b"GET /sync\r\n\r\n").build();
        let message = Message::new(MessageType::Sync, "GET /sync\r\n\r\n");

        WireWriter::write(&mut socket, &message).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_payload_is_not_written() {
        let mut socket = Builder::new().write(b"H").build();
        let message = Message::new(MessageType::Send, "H").with_payload("");

        WireWriter::write(&mut socket, &message).await.unwrap();
    }

    #[tokio::test]
    async fn test_payload_failure_fails_the_write() {
        let mut socket = Builder::new()
            .write(b"H")
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"))
            .build();
        let message = Message::new(MessageType::Send, "H").with_payload("P");

        let err = WireWriter::write(&mut socket, &message).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_lag_string() {
        assert_eq!(WireWriter::lag_string(Duration::from_millis(0)), "0.000");
        assert_eq!(WireWriter::lag_string(Duration::from_millis(42)), "0.042");
        assert_eq!(WireWriter::lag_string(Duration::from_millis(999)), "0.999");
        assert_eq!(WireWriter::lag_string(Duration::from_millis(1000)), "1.00");
        assert_eq!(WireWriter::lag_string(Duration::from_millis(2346)), "2.35");
    }
}
