use tokio::sync::mpsc;
use tracing::warn;

use crate::Message;

/// A delivery endpoint for signals or eavesdropped messages.
///
/// The two modes trade differently against slow consumers: a lossy sink
/// drops messages when its channel is full, so the inbound loop never
/// waits; a sequential sink queues without bound, preserving exact arrival
/// order however slow the consumer is.
pub struct Sink {
    kind: SinkKind,
}

enum SinkKind {
    Lossy(mpsc::Sender<Message>),
    Sequential(mpsc::UnboundedSender<Message>),
}

impl Sink {
    /// A sink which drops messages when the channel is full.
    pub fn lossy(sender: mpsc::Sender<Message>) -> Self {
        Self {
            kind: SinkKind::Lossy(sender),
        }
    }

    /// A sink which preserves arrival order regardless of consumer pace.
    pub fn sequential(sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            kind: SinkKind::Sequential(sender),
        }
    }

    /// Deliver a message, reporting `false` when the receiving side is
    /// gone and the sink should be uninstalled.
    pub(crate) fn deliver(&self, message: Message) -> bool {
        match &self.kind {
            SinkKind::Lossy(sender) => match sender.try_send(message) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(message)) => {
                    warn!(serial = ?message.serial(), "sink full, dropping message");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(..)) => false,
            },
            SinkKind::Sequential(sender) => sender.send(message).is_ok(),
        }
    }
}
