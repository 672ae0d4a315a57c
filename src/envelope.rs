use std::{net::IpAddr, sync::Arc};

/// One mail transaction's sender, recipients, raw message body, and the
/// network origin of the session that produced it.
///
/// An `Envelope` is created by the protocol layer once per accepted
/// transaction and is immutable for the duration of dispatch. The raw body
/// is shared via `Arc` so cloning an envelope never copies message data.
#[derive(Debug, Clone)]
pub struct Envelope {
    sender: String,
    recipients: Vec<String>,
    data: Arc<[u8]>,
    peer: IpAddr,
}

impl Envelope {
    /// Create an envelope for a single transaction.
    ///
    /// Recipient order and duplicates are preserved; each entry is evaluated
    /// independently during dispatch.
    #[must_use]
    pub fn new(
        sender: impl Into<String>,
        recipients: Vec<String>,
        data: impl Into<Arc<[u8]>>,
        peer: IpAddr,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipients,
            data: data.into(),
            peer,
        }
    }

    /// The return-path address for this message.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// The ordered recipient list, exactly as accepted by the protocol layer.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// The complete message bytes, opaque to the dispatcher.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The network origin of the session, used for localhost-only routes.
    #[must_use]
    pub const fn peer(&self) -> IpAddr {
        self.peer
    }
}
