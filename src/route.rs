//! Route table and recipient matching
//!
//! A [`Route`] is a single forwarding rule: a recipient pattern, a relay
//! kind, and the destination policy for messages that match. Routes are
//! loaded once at startup and collected into an immutable [`RouteTable`];
//! the table compiles every recipient pattern exactly once so that dispatch
//! never pays pattern-compilation costs and malformed patterns are diagnosed
//! up front.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The delivery mechanism used by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayKind {
    /// Forward over SMTP to an upstream relay.
    #[serde(rename = "SMTP")]
    Smtp,
    /// POST the envelope as JSON to an HTTP(S) endpoint.
    #[serde(rename = "HTTP")]
    Http,
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smtp => f.write_str("SMTP"),
            Self::Http => f.write_str("HTTP"),
        }
    }
}

/// Username and password for AUTH PLAIN against an upstream relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// A single forwarding rule.
///
/// Field names mirror the externally-defined route file format, so an
/// existing route list deserializes unchanged. Every field other than `Type`
/// defaults to its empty value; an empty string means "unset" throughout,
/// matching the original configuration semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    /// Recipient pattern (regular expression). Empty matches every
    /// recipient. Matching is an unanchored search: a hit anywhere in the
    /// address counts, so operators must anchor patterns themselves when
    /// full-address matching is intended.
    #[serde(rename = "Recipient", default)]
    pub recipient: String,

    /// The delivery mechanism for this route.
    #[serde(rename = "Type")]
    pub kind: RelayKind,

    /// Explicit destination override. When set, a matching route forwards to
    /// this single address; when empty, the entire original recipient list
    /// is forwarded unchanged.
    #[serde(rename = "Destination", default)]
    pub destination: String,

    /// Restrict this route to sessions originating from the loopback
    /// address.
    #[serde(rename = "LocalhostOnly", default)]
    pub localhost_only: bool,

    /// The upstream relay (`host:port`) or HTTP(S) endpoint URL. A route
    /// with an empty relay is never usable and is skipped with a diagnostic.
    #[serde(rename = "Relay", default)]
    pub relay: String,

    /// Username for authentication on the relay (SMTP only). Empty means
    /// unauthenticated.
    #[serde(rename = "Username", default)]
    pub username: String,

    /// Password for authentication on the relay (SMTP only).
    #[serde(rename = "Password", default)]
    pub password: String,

    /// HTTP request timeout in seconds. Zero means no explicit timeout is
    /// applied beyond transport defaults. Meaningless for SMTP routes.
    #[serde(rename = "Timeout", default)]
    pub timeout: u64,
}

impl Route {
    /// Returns the destination override, or `None` when the original
    /// recipient list should be forwarded unchanged.
    #[must_use]
    pub fn destination_override(&self) -> Option<&str> {
        if self.destination.is_empty() {
            None
        } else {
            Some(&self.destination)
        }
    }

    /// Returns the relay credentials, or `None` when the username is empty.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials<'_>> {
        if self.username.is_empty() {
            None
        } else {
            Some(Credentials {
                username: &self.username,
                password: &self.password,
            })
        }
    }

    /// Returns `true` if this route has a relay to deliver through.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.relay.is_empty()
    }
}

/// A compiled recipient pattern.
///
/// Matching is fail-open: a pattern that does not compile is demoted to
/// "never matches" rather than taking the whole route table down with it,
/// so one bad rule cannot block all mail.
#[derive(Debug, Clone)]
pub enum RecipientMatcher {
    /// Empty pattern: matches every recipient, including the empty string.
    Any,
    /// Unanchored regular-expression search over the recipient address.
    Pattern(Regex),
    /// Malformed pattern, diagnosed once at table construction.
    Never,
}

impl RecipientMatcher {
    /// Compile a route's recipient pattern.
    ///
    /// A malformed pattern is logged at warn level and returns
    /// [`RecipientMatcher::Never`]; the caller keeps going.
    #[must_use]
    pub fn compile(pattern: &str) -> Self {
        if pattern.is_empty() {
            return Self::Any;
        }

        match Regex::new(pattern) {
            Ok(regex) => Self::Pattern(regex),
            Err(error) => {
                tracing::warn!(
                    pattern = %pattern,
                    %error,
                    "Malformed recipient pattern, route will never match"
                );
                Self::Never
            }
        }
    }

    /// Returns `true` if the recipient address satisfies this pattern.
    #[must_use]
    pub fn matches(&self, recipient: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Pattern(regex) => regex.is_match(recipient),
            Self::Never => false,
        }
    }
}

/// A route paired with its compiled recipient matcher.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    route: Route,
    matcher: RecipientMatcher,
}

impl CompiledRoute {
    /// The underlying route definition.
    #[must_use]
    pub const fn route(&self) -> &Route {
        &self.route
    }

    /// Returns `true` if the recipient address satisfies this route's
    /// pattern.
    #[must_use]
    pub fn matches(&self, recipient: &str) -> bool {
        self.matcher.matches(recipient)
    }
}

/// An ordered, immutable collection of routes.
///
/// Construction is the only place patterns are compiled and the only place
/// configuration diagnostics are emitted; afterwards the table is read-only
/// and safe to share across concurrent dispatches.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    /// Build a table from routes in declaration order.
    #[must_use]
    pub fn new(routes: Vec<Route>) -> Self {
        let routes = routes
            .into_iter()
            .map(|route| {
                if !route.recipient.is_empty() {
                    tracing::info!(
                        pattern = %route.recipient,
                        kind = %route.kind,
                        relay = %route.relay,
                        "Handling route"
                    );
                }

                let matcher = RecipientMatcher::compile(&route.recipient);
                CompiledRoute { route, matcher }
            })
            .collect();

        Self { routes }
    }

    /// Iterate routes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &CompiledRoute> {
        self.routes.iter()
    }

    /// The number of routes in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if the table has no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
