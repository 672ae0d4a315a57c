//! Route matching and delivery dispatch for inbound mail
//!
//! This crate takes an accepted mail envelope and forwards it to one or more
//! configured destinations, chosen by matching recipient addresses against an
//! ordered route table. It provides:
//! - An immutable [`RouteTable`] with per-route recipient patterns
//! - A [`Dispatcher`] that evaluates every route for one envelope and
//!   produces a single accept/reject verdict with an audit trail
//! - Delivery transports for upstream SMTP relays and HTTPS endpoints
//!
//! The protocol server in front of this crate and the exact behavior of the
//! upstream relays behind it are deliberately out of scope: the dispatcher
//! receives a completed [`Envelope`] and reports a [`DispatchOutcome`].

pub mod config;
mod dispatch;
mod envelope;
mod error;
pub mod logging;
mod route;
pub mod transport;

pub use dispatch::{Attempt, AttemptOutcome, DispatchOutcome, Dispatcher, SkipReason};
pub use envelope::Envelope;
pub use error::{ConfigError, TransportError};
pub use route::{CompiledRoute, Credentials, RecipientMatcher, RelayKind, Route, RouteTable};
