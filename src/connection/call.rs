use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::ErrorKind;
use crate::{Error, Message, Result};

use super::shared::Shared;

/// State shared between a [`Call`] handle and the connection loops.
pub(crate) struct CallState {
    /// The serial of the call, set by the outbound loop just before the
    /// frame is written.
    pub(crate) serial: OnceLock<NonZeroU32>,
    /// Set when the caller gave up on the reply.
    pub(crate) cancelled: AtomicBool,
}

impl CallState {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            serial: OnceLock::new(),
            cancelled: AtomicBool::new(false),
        })
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// An in-flight method call.
///
/// Awaiting the handle yields the `METHOD_RETURN` message, or an error for
/// a peer `ERROR` reply, a transport failure, cancellation, or connection
/// close. Each call completes exactly once. Timeouts are a caller side
/// policy, typically `tokio::time::timeout` around the await.
pub struct Call {
    pub(crate) rx: oneshot::Receiver<Result<Message>>,
    pub(crate) state: Arc<CallState>,
    pub(crate) shared: Weak<Shared>,
}

impl Call {
    /// Cancel the call.
    ///
    /// The handle completes with a cancelled error and the serial is
    /// retired; a reply that still arrives later is discarded. A call
    /// still sitting in the outgoing queue is never written.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);

        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let Some(serial) = self.state.serial.get() else {
            // Not yet written; the outbound loop observes the flag and
            // completes the handle itself.
            return;
        };

        if let Some(entry) = shared.remove_call(*serial) {
            let _ = entry.tx.send(Err(Error::new(ErrorKind::Cancelled)));
            shared.retire_serial(*serial);
        }
    }
}

impl Future for Call {
    type Output = Result<Message>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| match result {
            Ok(result) => result,
            // The connection went away without completing us.
            Err(..) => Err(Error::disconnected(None)),
        })
    }
}
