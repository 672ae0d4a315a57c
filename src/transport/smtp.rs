//! SMTP relay transport.
//!
//! A minimal asynchronous SMTP client conversation over plain TCP:
//! greeting, EHLO (with HELO fallback), optional AUTH PLAIN, MAIL FROM,
//! RCPT TO for every destination, DATA with dot-stuffing, QUIT. There is
//! deliberately no STARTTLS path here; encrypted upstream hops are outside
//! this crate's scope.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
};

use crate::error::TransportError;

use super::{SmtpDelivery, SmtpSender};

/// A complete (possibly multi-line) SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    /// All reply lines joined into one diagnostic string.
    fn message(&self) -> String {
        self.lines.join(" ")
    }

    /// 2xx: the command completed.
    const fn is_positive(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// 3xx: the server wants the rest of the transaction (354 after DATA).
    const fn is_intermediate(&self) -> bool {
        self.code >= 300 && self.code < 400
    }
}

impl From<Reply> for TransportError {
    fn from(reply: Reply) -> Self {
        Self::Smtp {
            code: reply.code,
            message: reply.message(),
        }
    }
}

/// One connection to an upstream relay.
struct RelayClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl RelayClient {
    async fn connect(relay: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(relay).await?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    /// Reads a complete reply, following continuation lines (`250-...`)
    /// until the final line (`250 ...`).
    async fn read_reply(&mut self) -> Result<Reply, TransportError> {
        let mut code = 0u16;
        let mut lines = Vec::new();

        loop {
            let mut line = String::new();
            let read = self.reader.read_line(&mut line).await?;
            if read == 0 {
                return Err(TransportError::UnexpectedEof);
            }

            let line = line.trim_end_matches(['\r', '\n']);
            if line.len() < 3 {
                return Err(TransportError::MalformedReply(format!(
                    "reply line too short: {line:?}"
                )));
            }

            let parsed = line
                .get(..3)
                .and_then(|code| code.parse::<u16>().ok())
                .ok_or_else(|| {
                    TransportError::MalformedReply(format!("invalid status code in {line:?}"))
                })?;

            let (is_last, text) = match line.as_bytes().get(3) {
                None => (true, ""),
                Some(b' ') => (true, &line[4..]),
                Some(b'-') => (false, &line[4..]),
                Some(_) => {
                    return Err(TransportError::MalformedReply(format!(
                        "invalid separator in {line:?}"
                    )));
                }
            };

            if code == 0 {
                code = parsed;
            }
            lines.push(text.to_string());

            if is_last {
                return Ok(Reply { code, lines });
            }
        }
    }

    /// Sends one command line and reads the reply.
    async fn command(&mut self, command: &str) -> Result<Reply, TransportError> {
        tracing::trace!(command = %command.split_whitespace().next().unwrap_or(command), "SMTP command");
        self.writer
            .write_all(format!("{command}\r\n").as_bytes())
            .await?;
        self.writer.flush().await?;
        self.read_reply().await
    }

    /// Streams the message body, dot-stuffed and CRLF-terminated, followed
    /// by the end-of-data marker.
    async fn send_data(&mut self, data: &[u8]) -> Result<Reply, TransportError> {
        let body = dot_stuff(data);
        self.writer.write_all(&body).await?;
        self.writer.write_all(b".\r\n").await?;
        self.writer.flush().await?;
        self.read_reply().await
    }
}

/// Doubles leading dots on every line and guarantees a CRLF before the
/// end-of-data marker.
fn dot_stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    let mut at_line_start = true;

    for &byte in data {
        if at_line_start && byte == b'.' {
            out.push(b'.');
        }
        out.push(byte);
        at_line_start = byte == b'\n';
    }

    if !out.ends_with(b"\r\n") {
        out.extend_from_slice(b"\r\n");
    }

    out
}

/// The real SMTP transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpTransport;

#[async_trait]
impl SmtpSender for SmtpTransport {
    async fn send(&self, delivery: SmtpDelivery<'_>) -> Result<(), TransportError> {
        // Host portion of the relay address, used both as the EHLO name and
        // as the scope of any authentication.
        let host = delivery.relay.split(':').next().unwrap_or_default();
        if host.is_empty() {
            return Err(TransportError::InvalidRelay(delivery.relay.to_string()));
        }

        let mut client = RelayClient::connect(delivery.relay).await?;

        let greeting = client.read_reply().await?;
        if !greeting.is_positive() {
            return Err(greeting.into());
        }

        let hello = client.command(&format!("EHLO {host}")).await?;
        if !hello.is_positive() {
            // Older relays only speak HELO.
            let hello = client.command(&format!("HELO {host}")).await?;
            if !hello.is_positive() {
                return Err(hello.into());
            }
        }

        if let Some(credentials) = delivery.credentials {
            let token = BASE64.encode(format!(
                "\0{}\0{}",
                credentials.username, credentials.password
            ));
            let reply = client.command(&format!("AUTH PLAIN {token}")).await?;
            if !reply.is_positive() {
                return Err(TransportError::AuthenticationFailed {
                    code: reply.code,
                    message: reply.message(),
                });
            }
        }

        let reply = client
            .command(&format!("MAIL FROM:<{}>", delivery.sender))
            .await?;
        if !reply.is_positive() {
            return Err(reply.into());
        }

        for destination in delivery.destinations {
            let reply = client.command(&format!("RCPT TO:<{destination}>")).await?;
            if !reply.is_positive() {
                return Err(reply.into());
            }
        }

        let reply = client.command("DATA").await?;
        if !reply.is_intermediate() {
            return Err(reply.into());
        }

        let reply = client.send_data(delivery.data).await?;
        if !reply.is_positive() {
            return Err(reply.into());
        }

        // The message has been accepted at this point; a failed QUIT is
        // worth a log line, not a failed delivery.
        if let Err(error) = client.command("QUIT").await {
            tracing::warn!(relay = %delivery.relay, %error, "QUIT failed after successful delivery");
        }

        Ok(())
    }
}
