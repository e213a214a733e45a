use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::ErrorKind;
use crate::message;
use crate::org_freedesktop_dbus as fdo;
use crate::transport::{ReadTransport, WriteTransport};
use crate::{Error, Message, MessageKind, Value};

use super::dispatch;
use super::shared::{CallEntry, Outgoing, Shared};

/// The outbound serializer: writes one message at a time, allocating its
/// serial immediately before the frame is produced.
pub(crate) async fn writer_loop(
    mut transport: WriteTransport,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    shared: Arc<Shared>,
) {
    while let Some(Outgoing { message, reply }) = rx.recv().await {
        // A call cancelled while still queued is never written.
        let reply = match reply {
            Some((tx, state)) if state.is_cancelled() => {
                let _ = tx.send(Err(Error::new(ErrorKind::Cancelled)));
                continue;
            }
            reply => reply,
        };

        let serial = shared.allocate_serial();

        // Register the call before writing so a reply racing the write
        // still finds it. A NO_REPLY_EXPECTED call instead completes once
        // the frame is out.
        let (registered, ack) = match reply {
            Some((tx, state)) => {
                let _ = state.serial.set(serial);

                if message.expects_reply() {
                    shared.insert_call(serial, CallEntry { tx, state });
                    (true, None)
                } else {
                    (false, Some(tx))
                }
            }
            None => (false, None),
        };

        let result = match message::encode(&message, serial, shared.endianness) {
            Ok((frame, fds)) => {
                trace!(
                    serial = serial.get(),
                    len = frame.len(),
                    fds = fds.len(),
                    "send"
                );
                transport.send_frame(&frame, &fds).await
            }
            Err(error) => Err(error),
        };

        match result {
            Ok(()) => {
                if !registered {
                    shared.retire_serial(serial);
                }

                if let Some(ack) = ack {
                    let _ = ack.send(Ok(Message::method_return(serial)));
                }
            }
            Err(error) => {
                // A failed write errors the affected call; other calls
                // keep going until the inbound loop notices the transport
                // is truly gone.
                warn!(%error, serial = serial.get(), "failed to send message");

                if registered {
                    if let Some(entry) = shared.remove_call(serial) {
                        let _ = entry.tx.send(Err(error.clone()));
                    }
                } else if let Some(ack) = ack {
                    let _ = ack.send(Err(error.clone()));
                }

                shared.retire_serial(serial);
            }
        }
    }

    trace!("outbound loop done");
}

/// The inbound demultiplexer: reads frames, matches replies to calls,
/// routes signals to sinks and method calls to the dispatcher.
pub(crate) async fn reader_loop(mut transport: ReadTransport, shared: Arc<Shared>) {
    loop {
        let message = match transport.read_frame().await {
            Ok((frame, fds)) => match message::decode(&frame, fds) {
                Ok(message) => message,
                Err(error) => {
                    // Structural framing already passed, so this is the
                    // peer's bug, not a reason to kill the connection.
                    warn!(%error, "dropping malformed message");
                    continue;
                }
            },
            Err(error) => {
                debug!(%error, "inbound transport error");
                shared.shut_down(Some(Arc::new(error)));
                return;
            }
        };

        handle_incoming(&shared, message);
    }
}

fn handle_incoming(shared: &Arc<Shared>, message: Message) {
    trace!(serial = ?message.serial(), kind = ?message.kind(), "recv");

    match message.kind().clone() {
        MessageKind::MethodReturn { reply_serial } => {
            let Some(entry) = shared.remove_call(reply_serial) else {
                // Cancelled or never ours; a reply with no call attached
                // is discarded.
                trace!(reply_serial = reply_serial.get(), "reply with no pending call");
                return;
            };

            let _ = entry.tx.send(Ok(message));
            shared.retire_serial(reply_serial);
        }
        MessageKind::Error {
            error_name,
            reply_serial,
        } => {
            let Some(entry) = shared.remove_call(reply_serial) else {
                trace!(reply_serial = reply_serial.get(), "reply with no pending call");
                return;
            };

            let error = Error::new(ErrorKind::Method(crate::error::MethodError {
                name: error_name,
                body: message.body().to_vec().into(),
            }));

            let _ = entry.tx.send(Err(error));
            shared.retire_serial(reply_serial);
        }
        MessageKind::Signal {
            path: _,
            interface,
            member,
        } => {
            // A NameLost from the bus daemon updates the owned names; from
            // anyone else it is an ordinary signal.
            if message.sender() == Some(fdo::DESTINATION)
                && interface == fdo::INTERFACE
                && member == "NameLost"
            {
                if let Some(Value::Str(name)) = message.body().first() {
                    debug!(%name, "name lost");
                    shared.names.lock().expect("names lock").remove(name);
                }
            }

            if shared.is_local_destination(message.destination()) {
                deliver_signal(shared, message);
            } else {
                deliver_eavesdrop(shared, message);
            }
        }
        MessageKind::MethodCall { .. } => {
            if shared.is_local_destination(message.destination()) {
                dispatch::method_call(shared, message);
            } else {
                deliver_eavesdrop(shared, message);
            }
        }
    }
}

fn deliver_signal(shared: &Arc<Shared>, message: Message) {
    let mut sinks = shared.sinks.lock().expect("sinks lock");

    if let Some(sink) = sinks.signal.take() {
        if sink.deliver(message) {
            sinks.signal = Some(sink);
        }
        // Otherwise the consumer hung up and the sink stays uninstalled.
    }
}

fn deliver_eavesdrop(shared: &Arc<Shared>, message: Message) {
    let mut sinks = shared.sinks.lock().expect("sinks lock");

    if let Some(sink) = sinks.eavesdrop.take() {
        if sink.deliver(message) {
            sinks.eavesdrop = Some(sink);
        }
    } else {
        trace!(destination = ?message.destination(), "dropping message for other destination");
    }
}
