//! The SASL-style line protocol spoken between the initial nul byte and
//! the first binary frame.
//!
//! Both halves of the handshake live here: clients walk their mechanism
//! list until the server accepts one, servers verify whatever the client
//! offers against the transport's out-of-band credentials. Either side may
//! then negotiate unix descriptor passing before `BEGIN`.

#[cfg(test)]
mod tests;

pub(crate) use self::client::client_handshake;
mod client;

pub use self::server::ServerAuth;
pub(crate) use self::server::server_handshake;
mod server;

pub(crate) mod cookies;

use crate::utils;

/// The outcome of a successful handshake.
#[derive(Debug)]
pub(crate) struct Handshake {
    /// The GUID of the server, from the `OK` line.
    pub(crate) guid: String,
    /// Whether `NEGOTIATE_UNIX_FD` succeeded.
    pub(crate) unix_fds: bool,
}

/// The mechanisms this crate speaks, in client preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mechanism {
    External,
    Cookie,
    Anonymous,
}

impl Mechanism {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Mechanism::External => "EXTERNAL",
            Mechanism::Cookie => "DBUS_COOKIE_SHA1",
            Mechanism::Anonymous => "ANONYMOUS",
        }
    }
}

/// Split a received line into its command and trailing data.
pub(crate) fn command(line: &[u8]) -> (&[u8], &[u8]) {
    let line = utils::trim_end(line);

    match utils::split_once(line, b' ') {
        Some((command, rest)) => (command, rest),
        None => (line, &[]),
    }
}
