use std::os::unix::net::UnixStream;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::address;
use crate::error::ErrorKind;
use crate::org_freedesktop_dbus as fdo;
use crate::proto::Endianness;
use crate::sasl::{self, ServerAuth};
use crate::transport::Transport;
use crate::{Address, Error, Message, ObjectPath, Result, Value};

use super::shared::Shared;
use super::{io, Connection};

enum Target {
    SessionBus,
    SystemBus,
    Address(String),
    UnixStream(UnixStream),
    Duplex(Transport),
}

/// Configure and establish a [`Connection`].
///
/// # Examples
///
/// ```no_run
/// use wirebus::Connection;
///
/// # #[tokio::main] async fn main() -> wirebus::Result<()> {
/// let c = Connection::builder().system_bus().connect().await?;
/// # Ok(()) }
/// ```
pub struct ConnectionBuilder {
    target: Target,
    endianness: Endianness,
    negotiate_fds: bool,
    server: Option<ServerAuth>,
    hello: bool,
}

impl ConnectionBuilder {
    /// Construct a builder targeting the session bus.
    pub fn new() -> Self {
        Self {
            target: Target::SessionBus,
            endianness: Endianness::NATIVE,
            negotiate_fds: true,
            server: None,
            hello: true,
        }
    }

    /// Target the session bus, discovered through the environment.
    #[must_use]
    pub fn session_bus(mut self) -> Self {
        self.target = Target::SessionBus;
        self.hello = true;
        self
    }

    /// Target the system bus, discovered through the environment or the
    /// well-known default address.
    #[must_use]
    pub fn system_bus(mut self) -> Self {
        self.target = Target::SystemBus;
        self.hello = true;
        self
    }

    /// Target an explicit address list.
    #[must_use]
    pub fn address(mut self, address: &str) -> Self {
        self.target = Target::Address(address.to_owned());
        self
    }

    /// Target an already connected stream, typically one half of a
    /// socketpair. Implies a peer-to-peer connection without the `Hello`
    /// exchange.
    #[must_use]
    pub fn unix_stream(mut self, stream: UnixStream) -> Self {
        self.target = Target::UnixStream(stream);
        self.hello = false;
        self
    }

    /// Target any connected duplex stream.
    ///
    /// No descriptor passing and no peer credentials; like
    /// [`unix_stream`] this implies a peer-to-peer connection.
    ///
    /// [`unix_stream`]: ConnectionBuilder::unix_stream
    #[must_use]
    pub fn duplex_stream<S>(mut self, stream: S) -> Self
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin + 'static,
    {
        self.target = Target::Duplex(Transport::from_duplex(stream));
        self.hello = false;
        self
    }

    /// Act as the server side of the authentication handshake.
    ///
    /// Implies a peer-to-peer connection.
    #[must_use]
    pub fn server(mut self, auth: ServerAuth) -> Self {
        self.server = Some(auth);
        self.hello = false;
        self
    }

    /// Override whether the `Hello` exchange runs after authentication.
    #[must_use]
    pub fn hello(mut self, hello: bool) -> Self {
        self.hello = hello;
        self
    }

    /// Set the byte order of outgoing messages.
    #[must_use]
    pub fn endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// Control whether unix descriptor passing is negotiated.
    #[must_use]
    pub fn negotiate_unix_fds(mut self, negotiate: bool) -> Self {
        self.negotiate_fds = negotiate;
        self
    }

    /// Connect, authenticate, start the I/O loops, and run the `Hello`
    /// exchange where the target is a bus.
    pub async fn connect(self) -> Result<Connection> {
        let mut transport = match self.target {
            Target::SessionBus => {
                Transport::connect_list(&address::session_bus_addresses()?).await?
            }
            Target::SystemBus => {
                Transport::connect_list(&address::system_bus_addresses()?).await?
            }
            Target::Address(list) => {
                Transport::connect_list(&Address::parse_list(&list)?).await?
            }
            Target::UnixStream(stream) => Transport::from_unix_stream(stream)?,
            Target::Duplex(transport) => transport,
        };

        let handshake = match &self.server {
            Some(auth) => sasl::server_handshake(&mut transport, auth).await?,
            None => sasl::client_handshake(&mut transport, self.negotiate_fds).await?,
        };

        debug!(
            guid = %handshake.guid,
            unix_fds = handshake.unix_fds,
            "transport authenticated"
        );

        let (read, write) = transport.split();
        let (outgoing, rx) = mpsc::unbounded_channel();

        let shared = Shared::new(self.endianness, handshake.guid, self.hello, outgoing);

        let connection = Connection {
            tasks: Arc::new(Tasks {
                reader: tokio::spawn(io::reader_loop(read, shared.clone())),
                writer: tokio::spawn(io::writer_loop(write, rx, shared.clone())),
            }),
            shared,
        };

        if self.hello {
            connection.hello().await?;
        }

        Ok(connection)
    }
}

impl Default for ConnectionBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// The two long-running loops; aborted when the last connection handle
/// goes away or on `close()`.
pub(crate) struct Tasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Tasks {
    pub(crate) fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl Drop for Tasks {
    fn drop(&mut self) {
        self.abort();
    }
}

impl Connection {
    /// Perform the `org.freedesktop.DBus.Hello` exchange; the returned
    /// unique name becomes the first owned name.
    async fn hello(&self) -> Result<()> {
        let message = Message::method_call(
            ObjectPath::new_const(fdo::PATH.as_bytes()),
            "Hello",
        )
        .with_interface(fdo::INTERFACE)
        .with_destination(fdo::DESTINATION);

        let reply = self.send_call(message)?.await?;

        let Some(Value::Str(name)) = reply.body().first() else {
            return Err(Error::new(ErrorKind::InvalidProtocol));
        };

        debug!(%name, "hello complete");

        *self.shared.unique_name.lock().expect("unique name lock") = Some(name.clone());
        self.shared
            .names
            .lock()
            .expect("names lock")
            .insert(name.clone());

        Ok(())
    }
}
