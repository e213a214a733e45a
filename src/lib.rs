//! An asynchronous D-Bus client and server runtime for the Tokio
//! ecosystem.
//!
//! The crate speaks the D-Bus wire protocol over unix domain sockets,
//! with descriptor passing and credentials, and over TCP. A
//! [`Connection`] multiplexes a single stream between any number of
//! concurrent callers: method calls are matched to their replies by
//! serial, signals are delivered to installed [`Sink`]s, and incoming
//! method calls are dispatched to exported [`Interface`] handlers on
//! their own tasks.
//!
//! ```no_run
//! use wirebus::{Connection, ObjectPath, Value};
//!
//! # #[tokio::main] async fn main() -> wirebus::Result<()> {
//! let c = Connection::session().await?;
//!
//! let reply = c
//!     .call(
//!         "org.freedesktop.DBus",
//!         ObjectPath::new_const(b"/org/freedesktop/DBus"),
//!         "org.freedesktop.DBus",
//!         "ListNames",
//!         vec![],
//!     )?
//!     .await?;
//!
//! println!("{:?}", reply.body());
//! # Ok(()) }
//! ```

#![allow(clippy::module_inception)]

#[macro_use]
mod macros;

pub mod proto;
#[doc(inline)]
pub use self::proto::{Endianness, Flags, MessageType};

#[doc(inline)]
pub use self::error::{Error, MethodError, Result};
mod error;

#[doc(inline)]
pub use self::signature::{Signature, SignatureBuf, SignatureError};
mod signature;

#[doc(inline)]
pub use self::object_path::{ObjectPath, ObjectPathBuf, ObjectPathError};
mod object_path;

mod names;

#[doc(inline)]
pub use self::value::{UnixFd, Value};
mod value;

#[doc(inline)]
pub use self::body::{Body, BodyBuf};
mod body;

#[doc(inline)]
pub use self::message::{Message, MessageKind};
mod message;

#[doc(inline)]
pub use self::address::Address;
mod address;

mod transport;

#[doc(inline)]
pub use self::sasl::ServerAuth;
mod sasl;

#[doc(inline)]
pub use self::connection::{Call, Connection, ConnectionBuilder, Sink};
mod connection;

#[doc(inline)]
pub use self::export::{Interface, InterfaceBuilder, ReplyError};
mod export;

#[doc(inline)]
pub use self::proxy::Proxy;
mod proxy;

pub mod org_freedesktop_dbus;

mod lossy_str;
mod utils;
