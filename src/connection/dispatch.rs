use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::export::{Interface, ReplyError};
use crate::names::is_error_name;
use crate::org_freedesktop_dbus as fdo;
use crate::proto::Flags;
use crate::{Message, MessageKind, Value};

use super::shared::Shared;

/// Dispatch an incoming method call on its own task, so handler latency
/// never stalls the inbound loop.
pub(crate) fn method_call(shared: &Arc<Shared>, message: Message) {
    let shared = shared.clone();

    tokio::spawn(async move {
        let Some(serial) = message.serial() else {
            return;
        };

        let no_reply = message.flags() & Flags::NO_REPLY_EXPECTED;
        let sender = message.sender().map(str::to_owned);

        // Handler panics end up here as a generic failure rather than
        // taking the connection down.
        let result = match std::panic::AssertUnwindSafe(invoke(&shared, &message))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(..) => {
                warn!("exported method panicked");
                Err(ReplyError::failed("method call panicked"))
            }
        };

        if no_reply {
            if let Err(error) = result {
                debug!(name = error.name(), "error reply suppressed by NO_REPLY_EXPECTED");
            }

            return;
        }

        let reply = match result {
            Ok(values) => Message::method_return(serial).with_body(values),
            Err(error) => {
                let (name, body) = error.into_parts();

                // A handler-provided name that does not satisfy the error
                // name grammar must not poison the reply.
                let name = if is_error_name(&name) {
                    name
                } else {
                    fdo::ERROR_FAILED.to_owned()
                };

                Message::error(&name, serial).with_body(body)
            }
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(error) => {
                warn!(%error, "reply body cannot be encoded");

                let reply = Message::error(fdo::ERROR_FAILED, serial)
                    .with_body(vec![Value::from("reply body cannot be encoded")])
                    .expect("static body encodes");
                reply
            }
        };

        let reply = match &sender {
            Some(sender) => reply.with_destination(sender),
            None => reply,
        };

        if let Err(error) = shared.send_message(reply, None) {
            debug!(%error, "cannot send reply");
        }
    });
}

/// Resolve and invoke the handler for a method call.
async fn invoke(shared: &Arc<Shared>, message: &Message) -> Result<Vec<Value>, ReplyError> {
    let MessageKind::MethodCall { path, member } = message.kind() else {
        return Err(ReplyError::failed("not a method call"));
    };

    let interface = message.interface();

    // The peer interface is served for every exported path, without
    // registration.
    if interface == Some(fdo::PEER_INTERFACE) {
        return peer_method(shared, member, message).await;
    }

    let handler: Option<Arc<dyn Interface>> = {
        let exports = shared.exports.read().expect("exports lock");

        match exports.get(path) {
            Some(interfaces) => match interface {
                Some(interface) => interfaces.get(interface).cloned(),
                // With no interface header, any interface providing the
                // member will do.
                None => interfaces
                    .values()
                    .find(|candidate| candidate.input_signature(member).is_some())
                    .cloned(),
            },
            None => None,
        }
    };

    let Some(handler) = handler else {
        // Fall back to the built-in peer methods for interface-less calls
        // to paths with no matching export.
        if interface.is_none() && matches!(member.as_str(), "Ping" | "GetMachineId") {
            return peer_method(shared, member, message).await;
        }

        return Err(match interface {
            _ if !shared
                .exports
                .read()
                .expect("exports lock")
                .contains_key(path) =>
            {
                ReplyError::new(
                    fdo::ERROR_UNKNOWN_OBJECT,
                    &format!("no object at {path}"),
                )
            }
            Some(interface) => ReplyError::new(
                fdo::ERROR_UNKNOWN_INTERFACE,
                &format!("no interface {interface} at {path}"),
            ),
            None => ReplyError::unknown_method(member),
        });
    };

    let Some(declared) = handler.input_signature(member) else {
        return Err(ReplyError::unknown_method(member));
    };

    // Arity or type mismatch never reaches the handler.
    if declared != *message.signature() {
        return Err(ReplyError::invalid_args(&format!(
            "expected signature {declared:?}, got {:?}",
            message.signature()
        )));
    }

    handler.call(member, message.body().to_vec()).await
}

/// The built-in `org.freedesktop.DBus.Peer` methods.
async fn peer_method(
    shared: &Arc<Shared>,
    member: &str,
    message: &Message,
) -> Result<Vec<Value>, ReplyError> {
    if !message.signature().is_empty() {
        return Err(ReplyError::invalid_args("expected no arguments"));
    }

    match member {
        "Ping" => Ok(Vec::new()),
        "GetMachineId" => Ok(vec![Value::from(shared.guid.as_str())]),
        _ => Err(ReplyError::unknown_method(member)),
    }
}
