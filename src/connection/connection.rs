use std::os::unix::net::UnixStream;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::ErrorKind;
use crate::export::Interface;
use crate::names::{is_bus_name, is_interface_name};
use crate::org_freedesktop_dbus as fdo;
use crate::org_freedesktop_dbus::{NameFlag, NameReply, ReleaseNameReply};
use crate::proto::Flags;
use crate::sasl::ServerAuth;
use crate::{Error, Message, MessageKind, ObjectPath, Result, Value};

use super::builder::Tasks;
use super::call::CallState;
use super::shared::Shared;
use super::{Call, ConnectionBuilder, Sink};

/// The bus daemon's object path.
const BUS_PATH: &ObjectPath = ObjectPath::new_const(b"/org/freedesktop/DBus");

static SESSION: tokio::sync::Mutex<Option<Connection>> = tokio::sync::Mutex::const_new(None);
static SYSTEM: tokio::sync::Mutex<Option<Connection>> = tokio::sync::Mutex::const_new(None);

/// A connection to a message bus or a direct peer.
///
/// The handle is cheap to clone; all clones drive the same underlying
/// connection. The connection shuts down when [`close()`] is called or
/// when the last clone is dropped.
///
/// [`close()`]: Connection::close
#[derive(Clone)]
pub struct Connection {
    pub(crate) shared: Arc<Shared>,
    pub(crate) tasks: Arc<Tasks>,
}

impl Connection {
    /// Construct a builder for fine-grained configuration.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Connect a new private connection to the session bus.
    pub async fn session() -> Result<Self> {
        Self::builder().session_bus().connect().await
    }

    /// Connect a new private connection to the system bus.
    pub async fn system() -> Result<Self> {
        Self::builder().system_bus().connect().await
    }

    /// The process-wide shared connection to the session bus.
    ///
    /// The first caller establishes it; later callers get clones of the
    /// same connection. Private connections through [`session()`] are
    /// unaffected.
    ///
    /// [`session()`]: Connection::session
    pub async fn session_shared() -> Result<Self> {
        let mut guard = SESSION.lock().await;

        if let Some(connection) = &*guard {
            if !connection.is_closed() {
                return Ok(connection.clone());
            }
        }

        let connection = Self::session().await?;
        *guard = Some(connection.clone());
        Ok(connection)
    }

    /// The process-wide shared connection to the system bus.
    pub async fn system_shared() -> Result<Self> {
        let mut guard = SYSTEM.lock().await;

        if let Some(connection) = &*guard {
            if !connection.is_closed() {
                return Ok(connection.clone());
            }
        }

        let connection = Self::system().await?;
        *guard = Some(connection.clone());
        Ok(connection)
    }

    /// Connect the client side of a peer-to-peer connection over an
    /// already connected stream. No bus daemon, no `Hello`.
    pub async fn peer_client(stream: UnixStream) -> Result<Self> {
        Self::builder().unix_stream(stream).connect().await
    }

    /// Accept the server side of a peer-to-peer connection over an
    /// already connected stream, running the server half of the
    /// authentication handshake.
    pub async fn peer_server(stream: UnixStream, auth: ServerAuth) -> Result<Self> {
        Self::builder().unix_stream(stream).server(auth).connect().await
    }

    /// The GUID of the server, as exchanged during authentication.
    pub fn guid(&self) -> &str {
        &self.shared.guid
    }

    /// The unique name granted by the bus, if this is a bus connection
    /// and `Hello` has completed.
    pub fn unique_name(&self) -> Option<String> {
        self.shared
            .unique_name
            .lock()
            .expect("unique name lock")
            .clone()
    }

    /// Test if the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Send a method call message and get a handle for its reply.
    ///
    /// With `NO_REPLY_EXPECTED` set the handle completes with an empty
    /// reply as soon as the frame is on the wire.
    pub fn send_call(&self, message: Message) -> Result<Call> {
        if !matches!(message.kind(), MessageKind::MethodCall { .. }) {
            return Err(Error::new(ErrorKind::NotAMethodCall));
        }

        let (tx, rx) = oneshot::channel();
        let state = CallState::new();

        self.shared
            .send_message(message, Some((tx, state.clone())))?;

        Ok(Call {
            rx,
            state,
            shared: Arc::downgrade(&self.shared),
        })
    }

    /// Send any message without expecting a reply.
    pub fn send(&self, message: Message) -> Result<()> {
        self.shared.send_message(message, None)
    }

    /// Invoke a method on a named peer.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wirebus::{Connection, ObjectPath, Value};
    ///
    /// # #[tokio::main] async fn main() -> wirebus::Result<()> {
    /// let c = Connection::session().await?;
    ///
    /// let reply = c
    ///     .call(
    ///         "org.freedesktop.DBus",
    ///         ObjectPath::new_const(b"/org/freedesktop/DBus"),
    ///         "org.freedesktop.DBus",
    ///         "ListNames",
    ///         vec![],
    ///     )?
    ///     .await?;
    ///
    /// let Some(Value::Array(_, names)) = reply.body().first() else {
    ///     panic!("unexpected reply shape");
    /// };
    /// # Ok(()) }
    /// ```
    pub fn call(
        &self,
        destination: &str,
        path: &ObjectPath,
        interface: &str,
        member: &str,
        args: Vec<Value>,
    ) -> Result<Call> {
        self.call_with_flags(destination, path, interface, member, Flags::EMPTY, args)
    }

    /// Invoke a method on a named peer with explicit flags.
    pub fn call_with_flags(
        &self,
        destination: &str,
        path: &ObjectPath,
        interface: &str,
        member: &str,
        flags: Flags,
        args: Vec<Value>,
    ) -> Result<Call> {
        let message = Message::method_call(path, member)
            .with_interface(interface)
            .with_destination(destination)
            .with_flags(flags)
            .with_body(args)?;

        self.send_call(message)
    }

    /// Emit a signal. The name is the `interface.member` pair in one
    /// string, split at the last dot.
    pub fn emit(&self, path: &ObjectPath, name: &str, args: Vec<Value>) -> Result<()> {
        let Some((interface, member)) = name.rsplit_once('.') else {
            return Err(Error::new(ErrorKind::InvalidMemberName));
        };

        let message = Message::signal(path, interface, member).with_body(args)?;
        self.send(message)
    }

    /// Export a handler at `(path, interface)`.
    ///
    /// Incoming method calls for the pair are routed to the handler;
    /// `org.freedesktop.DBus.Peer` is served for every exported path
    /// without registration.
    pub fn export(
        &self,
        path: &ObjectPath,
        interface: &str,
        handler: Arc<dyn Interface>,
    ) -> Result<()> {
        if !is_interface_name(interface) {
            return Err(Error::new(ErrorKind::InvalidInterfaceName));
        }

        let mut exports = self.shared.exports.write().expect("exports lock");
        let interfaces = exports.entry(path.to_owned()).or_default();

        if interfaces.contains_key(interface) {
            return Err(Error::new(ErrorKind::AlreadyExported));
        }

        interfaces.insert(interface.to_owned(), handler);
        Ok(())
    }

    /// Remove the handler at `(path, interface)`, reporting whether one
    /// was registered.
    pub fn unexport(&self, path: &ObjectPath, interface: &str) -> bool {
        let mut exports = self.shared.exports.write().expect("exports lock");

        let Some(interfaces) = exports.get_mut(path) else {
            return false;
        };

        let removed = interfaces.remove(interface).is_some();

        if interfaces.is_empty() {
            exports.remove(path);
        }

        removed
    }

    /// Name ownership and match rules only exist on a bus daemon; on a
    /// peer-to-peer connection those operations fail without wire traffic.
    fn require_bus(&self) -> Result<()> {
        if !self.shared.is_bus {
            return Err(Error::new(ErrorKind::NotABusConnection));
        }

        Ok(())
    }

    /// Ask the bus for ownership of a well-known name.
    ///
    /// # Errors
    ///
    /// Errors on a connection which is not talking to a bus daemon.
    pub async fn request_name(&self, name: &str, flags: NameFlag) -> Result<NameReply> {
        self.require_bus()?;

        if !is_bus_name(name) || name.starts_with(':') {
            return Err(Error::new(ErrorKind::InvalidBusName));
        }

        let reply = self
            .call(
                fdo::DESTINATION,
                BUS_PATH,
                fdo::INTERFACE,
                "RequestName",
                vec![Value::from(name), Value::U32(flags.0)],
            )?
            .await?;

        let Some(Value::U32(code)) = reply.body().first() else {
            return Err(Error::new(ErrorKind::InvalidProtocol));
        };

        let reply = NameReply::new(*code);

        if matches!(reply, NameReply::PRIMARY_OWNER | NameReply::ALREADY_OWNER) {
            self.shared
                .names
                .lock()
                .expect("names lock")
                .insert(name.to_owned());
        }

        Ok(reply)
    }

    /// Give up ownership of a well-known name.
    ///
    /// # Errors
    ///
    /// Errors on a connection which is not talking to a bus daemon.
    pub async fn release_name(&self, name: &str) -> Result<ReleaseNameReply> {
        self.require_bus()?;

        let reply = self
            .call(
                fdo::DESTINATION,
                BUS_PATH,
                fdo::INTERFACE,
                "ReleaseName",
                vec![Value::from(name)],
            )?
            .await?;

        let Some(Value::U32(code)) = reply.body().first() else {
            return Err(Error::new(ErrorKind::InvalidProtocol));
        };

        let reply = ReleaseNameReply::new(*code);

        if reply == ReleaseNameReply::RELEASED {
            self.shared.names.lock().expect("names lock").remove(name);
        }

        Ok(reply)
    }

    /// Subscribe to the subset of signals matching a rule.
    ///
    /// # Errors
    ///
    /// Errors on a connection which is not talking to a bus daemon.
    pub async fn add_match(&self, rule: &str) -> Result<()> {
        self.require_bus()?;

        self.call(
            fdo::DESTINATION,
            BUS_PATH,
            fdo::INTERFACE,
            "AddMatch",
            vec![Value::from(rule)],
        )?
        .await?;

        Ok(())
    }

    /// Remove a previously added match rule.
    ///
    /// # Errors
    ///
    /// Errors on a connection which is not talking to a bus daemon.
    pub async fn remove_match(&self, rule: &str) -> Result<()> {
        self.require_bus()?;

        self.call(
            fdo::DESTINATION,
            BUS_PATH,
            fdo::INTERFACE,
            "RemoveMatch",
            vec![Value::from(rule)],
        )?
        .await?;

        Ok(())
    }

    /// Install, replace or remove the sink signals are delivered to.
    pub fn signal_sink(&self, sink: Option<Sink>) {
        self.shared.sinks.lock().expect("sinks lock").signal = sink;
    }

    /// Install, replace or remove the sink receiving messages addressed
    /// to other destinations.
    pub fn eavesdrop_sink(&self, sink: Option<Sink>) {
        self.shared.sinks.lock().expect("sinks lock").eavesdrop = sink;
    }

    /// Close the connection.
    ///
    /// Idempotent. Every outstanding call completes with a closed error,
    /// sinks are dropped, and the I/O loops stop.
    pub fn close(&self) {
        self.shared.shut_down(None);
        self.tasks.abort();
    }
}
