//! The connection multiplexer.
//!
//! A connection runs two long-lived loops over a split transport: the
//! inbound demultiplexer matches replies to pending calls by serial and
//! routes signals and incoming method calls, while the outbound
//! serializer writes one message at a time, allocating serials
//! immediately before each write. Exported handlers run on their own
//! tasks so their latency never stalls the inbound loop.

pub use self::connection::Connection;
mod connection;

pub use self::builder::ConnectionBuilder;
mod builder;

pub use self::call::Call;
mod call;

pub use self::sink::Sink;
mod sink;

mod dispatch;
mod io;
mod shared;
