use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::export::Interface;
use crate::message;
use crate::proto::Endianness;
use crate::{Error, Message, ObjectPathBuf, Result};

use super::call::CallState;
use super::Sink;

/// How many retired serials are kept around for reuse.
const MAX_FREE_SERIALS: usize = 1024;

/// A message handed to the outbound loop.
pub(crate) struct Outgoing {
    pub(crate) message: Message,
    /// Present when the message is a call expecting a reply.
    pub(crate) reply: Option<(oneshot::Sender<Result<Message>>, Arc<CallState>)>,
}

/// An entry in the table of outstanding calls, keyed by serial.
pub(crate) struct CallEntry {
    pub(crate) tx: oneshot::Sender<Result<Message>>,
    #[allow(dead_code)]
    pub(crate) state: Arc<CallState>,
}

/// The serial pool: 32-bit, never zero, unique among outstanding calls,
/// recycled on completion.
pub(crate) struct SerialPool {
    next: u32,
    free: Vec<u32>,
    live: HashSet<u32>,
}

impl SerialPool {
    fn new() -> Self {
        Self {
            next: 0,
            free: Vec::new(),
            live: HashSet::new(),
        }
    }

    fn allocate(&mut self) -> NonZeroU32 {
        if let Some(serial) = self.free.pop() {
            self.live.insert(serial);
            // Zero never enters the free list.
            return NonZeroU32::new(serial).expect("zero serial in free list");
        }

        loop {
            self.next = self.next.wrapping_add(1);

            if self.next != 0 && !self.live.contains(&self.next) {
                self.live.insert(self.next);
                return NonZeroU32::new(self.next).expect("checked non-zero");
            }
        }
    }

    fn retire(&mut self, serial: NonZeroU32) {
        if self.live.remove(&serial.get()) && self.free.len() < MAX_FREE_SERIALS {
            self.free.push(serial.get());
        }
    }
}

/// Installed delivery endpoints.
#[derive(Default)]
pub(crate) struct Sinks {
    pub(crate) signal: Option<Sink>,
    pub(crate) eavesdrop: Option<Sink>,
}

/// Whether the connection is still running, and why not if not.
enum CloseState {
    Open,
    Closed(Option<Arc<Error>>),
}

/// State shared by the connection handle and its I/O loops.
pub(crate) struct Shared {
    pub(crate) endianness: Endianness,
    /// The GUID of the server, from the authentication handshake.
    pub(crate) guid: String,
    /// Whether this connection talks to a bus daemon, as opposed to a
    /// direct peer.
    pub(crate) is_bus: bool,
    /// The unique name granted by `Hello`.
    pub(crate) unique_name: Mutex<Option<String>>,
    /// Every name this connection answers to, the unique name included.
    pub(crate) names: Mutex<HashSet<String>>,
    serials: Mutex<SerialPool>,
    calls: Mutex<HashMap<NonZeroU32, CallEntry>>,
    pub(crate) exports: RwLock<HashMap<ObjectPathBuf, HashMap<String, Arc<dyn Interface>>>>,
    pub(crate) sinks: Mutex<Sinks>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    closed: Mutex<CloseState>,
}

impl Shared {
    pub(crate) fn new(
        endianness: Endianness,
        guid: String,
        is_bus: bool,
        outgoing: mpsc::UnboundedSender<Outgoing>,
    ) -> Arc<Self> {
        Arc::new(Self {
            endianness,
            guid,
            is_bus,
            unique_name: Mutex::new(None),
            names: Mutex::new(HashSet::new()),
            serials: Mutex::new(SerialPool::new()),
            calls: Mutex::new(HashMap::new()),
            exports: RwLock::new(HashMap::new()),
            sinks: Mutex::new(Sinks::default()),
            outgoing,
            closed: Mutex::new(CloseState::Open),
        })
    }

    /// Queue a message for the outbound loop, validating its headers
    /// first so the caller learns about bad names synchronously.
    pub(crate) fn send_message(&self, message: Message, reply: Option<(oneshot::Sender<Result<Message>>, Arc<CallState>)>) -> Result<()> {
        message::validate(&message)?;

        if let Some(error) = self.close_error() {
            return Err(error);
        }

        if self
            .outgoing
            .send(Outgoing { message, reply })
            .is_err()
        {
            return Err(Error::disconnected(None));
        }

        Ok(())
    }

    /// The error every new operation fails with once the connection is
    /// closed, if it is.
    pub(crate) fn close_error(&self) -> Option<Error> {
        match &*self.closed.lock().expect("closed lock") {
            CloseState::Open => None,
            CloseState::Closed(cause) => Some(Error::disconnected(cause.clone())),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        !matches!(&*self.closed.lock().expect("closed lock"), CloseState::Open)
    }

    pub(crate) fn allocate_serial(&self) -> NonZeroU32 {
        self.serials.lock().expect("serials lock").allocate()
    }

    pub(crate) fn retire_serial(&self, serial: NonZeroU32) {
        self.serials.lock().expect("serials lock").retire(serial);
    }

    pub(crate) fn insert_call(&self, serial: NonZeroU32, entry: CallEntry) {
        self.calls.lock().expect("calls lock").insert(serial, entry);
    }

    pub(crate) fn remove_call(&self, serial: NonZeroU32) -> Option<CallEntry> {
        self.calls.lock().expect("calls lock").remove(&serial)
    }

    /// Test if a destination names this connection.
    pub(crate) fn is_local_destination(&self, destination: Option<&str>) -> bool {
        match destination {
            None => true,
            Some(destination) => self
                .names
                .lock()
                .expect("names lock")
                .contains(destination),
        }
    }

    /// Shut the connection down, failing every outstanding call.
    ///
    /// Idempotent; the first caller wins and later calls are no-ops.
    pub(crate) fn shut_down(&self, cause: Option<Arc<Error>>) {
        {
            let mut closed = self.closed.lock().expect("closed lock");

            if !matches!(&*closed, CloseState::Open) {
                return;
            }

            *closed = CloseState::Closed(cause.clone());
        }

        debug!(cause = ?cause.as_deref(), "connection shutting down");

        let entries = {
            let mut calls = self.calls.lock().expect("calls lock");
            calls.drain().collect::<Vec<_>>()
        };

        for (serial, entry) in entries {
            let _ = entry.tx.send(Err(Error::disconnected(cause.clone())));
            self.retire_serial(serial);
        }

        // Dropping the sinks closes their channels, which is how
        // consumers observe the shutdown.
        let mut sinks = self.sinks.lock().expect("sinks lock");
        sinks.signal = None;
        sinks.eavesdrop = None;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::SerialPool;

    #[test]
    fn serials_unique_and_never_zero() {
        let mut pool = SerialPool::new();
        let mut seen = HashSet::new();

        for _ in 0..10_000 {
            let serial = pool.allocate();
            assert!(seen.insert(serial), "serial {serial} issued twice");
        }
    }

    #[test]
    fn retired_serials_recycle() {
        let mut pool = SerialPool::new();

        let first = pool.allocate();
        pool.retire(first);

        let second = pool.allocate();
        assert_eq!(first, second);

        // Still live, so the next allocation differs.
        let third = pool.allocate();
        assert_ne!(second, third);
    }

    #[test]
    fn wraparound_skips_live_serials() {
        let mut pool = SerialPool::new();
        pool.next = u32::MAX - 1;

        let a = pool.allocate();
        let b = pool.allocate();
        let c = pool.allocate();

        assert_eq!(a.get(), u32::MAX);
        // Zero is skipped on wraparound.
        assert_eq!(b.get(), 1);
        assert_eq!(c.get(), 2);
    }
}
