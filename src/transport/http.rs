//! HTTP(S) endpoint transport.
//!
//! Serializes the envelope as a JSON object with the externally-defined
//! field names (`Sender`, `Recipients`, `Data`) and POSTs it to the route's
//! endpoint. The message body is base64-encoded inside the JSON string so
//! arbitrary bytes survive the trip.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::CONTENT_TYPE;
use serde::{Serialize, Serializer};

use crate::{envelope::Envelope, error::TransportError};

use super::HttpSender;

/// The wire shape consumed by configured endpoints.
#[derive(Debug, Serialize)]
struct Payload<'a> {
    #[serde(rename = "Sender")]
    sender: &'a str,
    #[serde(rename = "Recipients")]
    recipients: &'a [String],
    #[serde(rename = "Data", serialize_with = "bytes_as_base64")]
    data: &'a [u8],
}

fn bytes_as_base64<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

/// The real HTTP transport.
///
/// One `reqwest` client is shared across all dispatches; per-route timeouts
/// are applied per request. A configured timeout of zero applies no request
/// timeout at all, so such a request waits as long as the underlying
/// connection does.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpSender for HttpTransport {
    async fn send(
        &self,
        relay: &str,
        timeout_secs: u64,
        envelope: &Envelope,
    ) -> Result<(), TransportError> {
        let payload = Payload {
            sender: envelope.sender(),
            recipients: envelope.recipients(),
            data: envelope.data(),
        };
        let body = serde_json::to_vec(&payload)?;

        let mut request = self
            .client
            .post(relay)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if timeout_secs > 0 {
            request = request.timeout(Duration::from_secs(timeout_secs));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        Ok(())
    }
}
