use tokio::sync::mpsc;

use crate::{Error, Result, message::CanonicalMessage};

/// Entry point through which the host bot framework receives normalized
/// messages. Adapters call [`MessageReceiver::accept`] exactly once per
/// accepted platform event, after all of that event's lookups have settled.
pub trait MessageReceiver: Send + Sync {
    fn accept(&self, message: CanonicalMessage) -> Result<()>;
}

/// Sender end of a receiver channel.
pub type MessageSender = mpsc::UnboundedSender<CanonicalMessage>;

impl MessageReceiver for MessageSender {
    fn accept(&self, message: CanonicalMessage) -> Result<()> {
        self.send(message)
            .map_err(|_| Error::unavailable("message channel closed"))
    }
}
