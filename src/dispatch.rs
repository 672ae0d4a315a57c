//! Route evaluation and delivery dispatch.
//!
//! One [`Dispatcher::dispatch`] call per accepted transaction: walk the
//! route table in declaration order, evaluate every recipient against every
//! route, invoke the matching route's transport, and fold the results into
//! a single accept/reject verdict plus an ordered audit trail.

use std::sync::Arc;

use crate::{
    envelope::Envelope,
    error::TransportError,
    route::{RelayKind, RouteTable},
    transport::{HttpSender, HttpTransport, SmtpDelivery, SmtpSender, SmtpTransport},
};

/// Reply text surfaced to the sending client when nothing was forwarded.
const REJECTION: &str = "Invalid Recipient. This server does not handle the recipient";

/// Why a matching route/recipient pair was skipped without a delivery
/// attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The route has no relay configured. A configuration gap: diagnosed,
    /// never fatal.
    RelayUndefined,
}

/// How one route/recipient pair turned out.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The transport accepted the message.
    Delivered,
    /// The pair was skipped without invoking a transport.
    Skipped(SkipReason),
    /// The transport reported a failure; purely informational, the loop
    /// keeps going.
    Failed(TransportError),
}

impl AttemptOutcome {
    /// Returns `true` if this attempt forwarded the message.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// One entry in the dispatch audit trail.
#[derive(Debug)]
pub struct Attempt {
    /// The recipient whose match triggered this attempt.
    pub recipient: String,
    /// Index of the route in the table, in declaration order.
    pub route: usize,
    /// The relay the attempt went to (possibly empty for skips).
    pub relay: String,
    /// What happened.
    pub outcome: AttemptOutcome,
}

/// The result of dispatching one envelope.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    accepted: bool,
    attempts: Vec<Attempt>,
}

impl DispatchOutcome {
    /// `true` iff at least one route forwarded the message to at least one
    /// recipient.
    #[must_use]
    pub const fn accepted(&self) -> bool {
        self.accepted
    }

    /// The ordered audit trail of every attempt made.
    #[must_use]
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// The reply text for the protocol layer when the transaction was not
    /// accepted, `None` otherwise.
    #[must_use]
    pub fn rejection(&self) -> Option<&'static str> {
        if self.accepted {
            None
        } else {
            Some(REJECTION)
        }
    }
}

/// Evaluates the route table for one envelope at a time.
///
/// The table is immutable after construction and the transports are
/// stateless across attempts, so a single `Dispatcher` can serve any number
/// of concurrent transactions; within one transaction, attempts run
/// strictly sequentially with no retry and no cancellation.
pub struct Dispatcher {
    table: RouteTable,
    smtp: Arc<dyn SmtpSender>,
    http: Arc<dyn HttpSender>,
}

impl Dispatcher {
    /// A dispatcher wired to the real SMTP and HTTP transports.
    #[must_use]
    pub fn new(table: RouteTable) -> Self {
        Self::with_transports(
            table,
            Arc::new(SmtpTransport),
            Arc::new(HttpTransport::default()),
        )
    }

    /// A dispatcher with injected transports. Used by tests; also the hook
    /// for callers that wrap the real transports.
    #[must_use]
    pub fn with_transports(
        table: RouteTable,
        smtp: Arc<dyn SmtpSender>,
        http: Arc<dyn HttpSender>,
    ) -> Self {
        Self { table, smtp, http }
    }

    /// Evaluate every route for `envelope` and deliver through the ones
    /// that match.
    ///
    /// One success anywhere accepts the whole transaction; failures are
    /// recorded but never abort the loop.
    pub async fn dispatch(&self, envelope: &Envelope) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        for (index, compiled) in self.table.iter().enumerate() {
            let route = compiled.route();

            if route.localhost_only && !envelope.peer().is_loopback() {
                continue;
            }

            for recipient in envelope.recipients() {
                if !compiled.matches(recipient) {
                    continue;
                }

                if !route.is_usable() {
                    tracing::warn!(
                        recipient = %recipient,
                        pattern = %route.recipient,
                        "Email received but relay isn't defined for route, skipped"
                    );
                    outcome.attempts.push(Attempt {
                        recipient: recipient.clone(),
                        route: index,
                        relay: route.relay.clone(),
                        outcome: AttemptOutcome::Skipped(SkipReason::RelayUndefined),
                    });
                    continue;
                }

                let result = match route.kind {
                    RelayKind::Smtp => {
                        // A matching route forwards to its override or to
                        // the ENTIRE original recipient list, never to the
                        // matched address alone. Long-standing behavior;
                        // changing it changes what remote relays observe.
                        let destinations = match route.destination_override() {
                            Some(destination) => vec![destination.to_string()],
                            None => envelope.recipients().to_vec(),
                        };

                        self.smtp
                            .send(SmtpDelivery {
                                relay: &route.relay,
                                credentials: route.credentials(),
                                sender: envelope.sender(),
                                destinations: &destinations,
                                data: envelope.data(),
                            })
                            .await
                    }
                    // The HTTP payload always carries the original envelope.
                    RelayKind::Http => {
                        self.http
                            .send(&route.relay, route.timeout, envelope)
                            .await
                    }
                };

                match result {
                    Ok(()) => {
                        tracing::info!(
                            recipient = %recipient,
                            relay = %route.relay,
                            kind = %route.kind,
                            "Email forwarded"
                        );
                        outcome.accepted = true;
                        outcome.attempts.push(Attempt {
                            recipient: recipient.clone(),
                            route: index,
                            relay: route.relay.clone(),
                            outcome: AttemptOutcome::Delivered,
                        });
                    }
                    Err(error) => {
                        tracing::warn!(
                            recipient = %recipient,
                            relay = %route.relay,
                            kind = %route.kind,
                            %error,
                            "Email could not be forwarded"
                        );
                        outcome.attempts.push(Attempt {
                            recipient: recipient.clone(),
                            route: index,
                            relay: route.relay.clone(),
                            outcome: AttemptOutcome::Failed(error),
                        });
                    }
                }
            }
        }

        if !outcome.accepted {
            tracing::warn!(
                sender = %envelope.sender(),
                recipients = ?envelope.recipients(),
                "Mail rejected, no suitable route accepted it"
            );
        }

        outcome
    }
}
