//! Delivery transports.
//!
//! A transport forwards one message to one relay and reports success or a
//! typed [`TransportError`]; it never retries and never influences other
//! attempts. The dispatcher talks to transports through the [`SmtpSender`]
//! and [`HttpSender`] traits so tests can substitute recording mocks for
//! the real network clients.

pub mod http;
pub mod smtp;

use async_trait::async_trait;

use crate::{envelope::Envelope, error::TransportError, route::Credentials};

pub use http::HttpTransport;
pub use smtp::SmtpTransport;

/// Everything an SMTP transport needs to forward one message.
#[derive(Debug, Clone, Copy)]
pub struct SmtpDelivery<'a> {
    /// The upstream relay as `host:port`.
    pub relay: &'a str,
    /// AUTH PLAIN credentials, when the route configures them.
    pub credentials: Option<Credentials<'a>>,
    /// The return-path address.
    pub sender: &'a str,
    /// The effective destination set for this attempt.
    pub destinations: &'a [String],
    /// The complete message bytes.
    pub data: &'a [u8],
}

/// Forwards a message to an upstream SMTP relay.
#[async_trait]
pub trait SmtpSender: Send + Sync {
    /// Deliver the message, returning once the relay has accepted or
    /// rejected it.
    async fn send(&self, delivery: SmtpDelivery<'_>) -> Result<(), TransportError>;
}

/// Posts an envelope to an HTTP(S) endpoint.
#[async_trait]
pub trait HttpSender: Send + Sync {
    /// Serialize the envelope and POST it to `relay`. A `timeout_secs` of
    /// zero means no explicit request timeout is enforced.
    async fn send(
        &self,
        relay: &str,
        timeout_secs: u64,
        envelope: &Envelope,
    ) -> Result<(), TransportError>;
}
