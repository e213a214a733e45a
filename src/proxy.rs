//! Client-side convenience over a `(destination, path)` pair.

use crate::org_freedesktop_dbus as fdo;
use crate::proto::Flags;
use crate::{Call, Connection, ObjectPath, ObjectPathBuf, Result, Value};

use crate::error::ErrorKind;
use crate::Error;

/// A lightweight descriptor of a remote object.
///
/// A proxy produces [`Call`] handles for asynchronous use; awaiting the
/// handle is the synchronous pattern.
///
/// # Examples
///
/// ```no_run
/// use wirebus::{Connection, ObjectPath, Proxy, Value};
///
/// # #[tokio::main] async fn main() -> wirebus::Result<()> {
/// let c = Connection::session().await?;
///
/// let bus = Proxy::new(
///     &c,
///     "org.freedesktop.DBus",
///     ObjectPath::new_const(b"/org/freedesktop/DBus"),
/// )
/// .with_interface("org.freedesktop.DBus");
///
/// let names = bus.call("ListNames", vec![])?.await?;
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct Proxy {
    connection: Connection,
    destination: String,
    path: ObjectPathBuf,
    interface: Option<String>,
}

impl Proxy {
    /// Construct a proxy for the given destination and path.
    pub fn new(connection: &Connection, destination: &str, path: &ObjectPath) -> Self {
        Self {
            connection: connection.clone(),
            destination: destination.to_owned(),
            path: path.to_owned(),
            interface: None,
        }
    }

    /// Set the default interface for [`call`].
    ///
    /// [`call`]: Proxy::call
    #[must_use]
    pub fn with_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_owned());
        self
    }

    /// The connection this proxy sends through.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The destination of this proxy.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// The object path of this proxy.
    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Invoke a method on the default interface.
    pub fn call(&self, member: &str, args: Vec<Value>) -> Result<Call> {
        let Some(interface) = &self.interface else {
            return Err(Error::new(ErrorKind::InvalidInterfaceName));
        };

        self.call_on(interface, member, args)
    }

    /// Invoke a method on an explicit interface.
    pub fn call_on(&self, interface: &str, member: &str, args: Vec<Value>) -> Result<Call> {
        self.connection
            .call(&self.destination, &self.path, interface, member, args)
    }

    /// Invoke a method with explicit flags.
    pub fn call_with_flags(
        &self,
        interface: &str,
        member: &str,
        flags: Flags,
        args: Vec<Value>,
    ) -> Result<Call> {
        self.connection.call_with_flags(
            &self.destination,
            &self.path,
            interface,
            member,
            flags,
            args,
        )
    }

    /// Wait for a method on the default interface and return the reply
    /// body.
    pub async fn call_wait(&self, member: &str, args: Vec<Value>) -> Result<Vec<Value>> {
        let mut reply = self.call(member, args)?.await?;
        Ok(reply.take_body())
    }

    /// Subscribe to signals matching a rule, through the bus daemon.
    ///
    /// Errors on a connection which is not talking to a bus daemon.
    pub async fn add_match(&self, rule: &str) -> Result<()> {
        self.connection.add_match(rule).await
    }

    /// Remove a previously added match rule.
    ///
    /// Errors on a connection which is not talking to a bus daemon.
    pub async fn remove_match(&self, rule: &str) -> Result<()> {
        self.connection.remove_match(rule).await
    }

    /// Fetch the introspection document of the remote object.
    pub async fn introspect(&self) -> Result<String> {
        let reply = self
            .call_on(fdo::INTROSPECTABLE_INTERFACE, "Introspect", vec![])?
            .await?;

        match reply.body().first() {
            Some(Value::Str(xml)) => Ok(xml.clone()),
            _ => Err(Error::new(ErrorKind::InvalidProtocol)),
        }
    }

    /// Ping the remote peer.
    pub async fn ping(&self) -> Result<()> {
        self.call_on(fdo::PEER_INTERFACE, "Ping", vec![])?.await?;
        Ok(())
    }

    /// Fetch the machine id of the remote peer.
    pub async fn get_machine_id(&self) -> Result<String> {
        let reply = self
            .call_on(fdo::PEER_INTERFACE, "GetMachineId", vec![])?
            .await?;

        match reply.body().first() {
            Some(Value::Str(id)) => Ok(id.clone()),
            _ => Err(Error::new(ErrorKind::InvalidProtocol)),
        }
    }
}
