//! Typed errors for configuration loading and delivery transports.
//!
//! The original behavior this crate replaces compared opaque error strings;
//! here every failure kind is a tagged variant so callers branch on kind,
//! never on text:
//! - Configuration gaps (unusable routes) are diagnosed, never fatal.
//! - Malformed recipient patterns are demoted to never-match at table
//!   construction and do not surface as error values at dispatch time.
//! - Transport failures are recorded per attempt and only ever influence
//!   the final accept/reject verdict.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that can occur while loading a route file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The route file could not be read.
    #[error("can't open route file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The route file is not a valid JSON route list.
    #[error("can't parse route file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by a delivery transport for a single attempt.
///
/// The dispatcher treats every variant uniformly: the attempt failed, the
/// error is recorded in the audit trail, and the route/recipient loop keeps
/// going.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not connect to, read from, or write to the relay.
    #[error("connection failed: {0}")]
    Connection(#[from] io::Error),

    /// The relay closed the connection mid-conversation.
    #[error("connection closed unexpectedly")]
    UnexpectedEof,

    /// The relay address cannot be used (e.g. no host portion).
    #[error("invalid relay address: {0}")]
    InvalidRelay(String),

    /// The relay sent a reply the client could not parse.
    #[error("malformed SMTP reply: {0}")]
    MalformedReply(String),

    /// The relay rejected a command with an error status.
    #[error("SMTP error: {code} {message}")]
    Smtp { code: u16, message: String },

    /// The relay rejected AUTH PLAIN.
    #[error("authentication failed: {code} {message}")]
    AuthenticationFailed { code: u16, message: String },

    /// The HTTP request failed at the network level (connection refused,
    /// timeout, TLS failure).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP {status} {reason}")]
    HttpStatus { status: u16, reason: String },

    /// The envelope could not be serialized for the HTTP payload.
    #[error("can't encode envelope: {0}")]
    Payload(#[from] serde_json::Error),
}

impl TransportError {
    /// Returns `true` if the remote end explicitly rejected the delivery
    /// (an SMTP error status or a non-2xx HTTP status), as opposed to the
    /// conversation failing before an answer arrived.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Smtp { .. } | Self::AuthenticationFailed { .. } | Self::HttpStatus { .. }
        )
    }

    /// Returns `true` for failures at the connection level, where no
    /// verdict from the remote end was received at all.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::UnexpectedEof | Self::Http(_))
    }
}
