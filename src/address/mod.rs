//! Parsing and discovery of bus addresses.
//!
//! An address is a transport name followed by `:` and a comma separated
//! list of `key=value` pairs, with `%`-escaped values. Several addresses
//! separated by `;` are tried in order when connecting.

#[cfg(test)]
mod tests;

use std::env;
use std::path::PathBuf;

use crate::error::ErrorKind;
use crate::{Error, Result};

/// The environment variable carrying the session bus address.
pub(crate) const ENV_SESSION_BUS: &str = "DBUS_SESSION_BUS_ADDRESS";
/// The environment variable carrying the system bus address.
pub(crate) const ENV_SYSTEM_BUS: &str = "DBUS_SYSTEM_BUS_ADDRESS";
/// The environment variable naming the XDG runtime directory.
pub(crate) const ENV_XDG_RUNTIME_DIR: &str = "XDG_RUNTIME_DIR";
/// The well-known address of the system bus.
pub(crate) const DEFAULT_SYSTEM_BUS: &str = "unix:path=/var/run/dbus/system_bus_socket";

/// A single parsed bus address.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Address {
    /// A unix domain socket at a filesystem path.
    Unix(PathBuf),
    /// An abstract unix domain socket, linux only.
    UnixAbstract(Vec<u8>),
    /// A TCP connection.
    Tcp {
        /// The host to connect to.
        host: String,
        /// The port to connect to.
        port: u16,
    },
    /// A TCP connection authenticated by a nonce file read out-of-band.
    NonceTcp {
        /// The host to connect to.
        host: String,
        /// The port to connect to.
        port: u16,
        /// The file holding the nonce to send before authentication.
        noncefile: PathBuf,
    },
}

impl Address {
    /// Parse a single address.
    pub fn parse(address: &str) -> Result<Self> {
        let Some((transport, options)) = address.split_once(':') else {
            return Err(Error::new(ErrorKind::InvalidAddress));
        };

        let mut pairs = Vec::new();

        for pair in options.split(',') {
            if pair.is_empty() {
                continue;
            }

            let Some((key, value)) = pair.split_once('=') else {
                return Err(Error::new(ErrorKind::InvalidAddress));
            };

            pairs.push((key, unescape(value)?));
        }

        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        };

        match transport {
            "unix" => match (get("path"), get("abstract")) {
                (Some(path), None) => Ok(Address::Unix(string_of(path)?.into())),
                (None, Some(name)) => Ok(Address::UnixAbstract(name)),
                _ => Err(Error::new(ErrorKind::InvalidAddress)),
            },
            "tcp" => {
                let (host, port) = host_port(&get("host"), &get("port"))?;
                Ok(Address::Tcp { host, port })
            }
            "nonce-tcp" => {
                let (host, port) = host_port(&get("host"), &get("port"))?;

                let Some(noncefile) = get("noncefile") else {
                    return Err(Error::new(ErrorKind::InvalidAddress));
                };

                Ok(Address::NonceTcp {
                    host,
                    port,
                    noncefile: string_of(noncefile)?.into(),
                })
            }
            _ => Err(Error::new(ErrorKind::InvalidAddress)),
        }
    }

    /// Parse a `;` separated list of addresses, in connection order.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirebus::Address;
    ///
    /// let addresses = Address::parse_list("unix:path=/tmp/bus;tcp:host=localhost,port=4711")?;
    /// assert_eq!(addresses.len(), 2);
    /// assert_eq!(addresses[0], Address::Unix("/tmp/bus".into()));
    /// # Ok::<_, wirebus::Error>(())
    /// ```
    pub fn parse_list(addresses: &str) -> Result<Vec<Self>> {
        let mut out = Vec::new();

        for address in addresses.split(';') {
            if address.is_empty() {
                continue;
            }

            out.push(Self::parse(address)?);
        }

        if out.is_empty() {
            return Err(Error::new(ErrorKind::InvalidAddress));
        }

        Ok(out)
    }
}

fn host_port(host: &Option<Vec<u8>>, port: &Option<Vec<u8>>) -> Result<(String, u16)> {
    let (Some(host), Some(port)) = (host, port) else {
        return Err(Error::new(ErrorKind::InvalidAddress));
    };

    let host = string_of(host.clone())?;

    let port = string_of(port.clone())?
        .parse()
        .map_err(|_| Error::new(ErrorKind::InvalidAddress))?;

    Ok((host, port))
}

fn string_of(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| Error::new(ErrorKind::InvalidAddress))
}

/// Undo the `%xx` escaping address values use.
fn unescape(value: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(value.len());
    let mut bytes = value.bytes();

    while let Some(b) = bytes.next() {
        if b != b'%' {
            out.push(b);
            continue;
        }

        let (Some(hi), Some(lo)) = (bytes.next(), bytes.next()) else {
            return Err(Error::new(ErrorKind::InvalidAddress));
        };

        let mut decoded = [0];
        hex::decode_to_slice([hi, lo], &mut decoded)
            .map_err(|_| Error::new(ErrorKind::InvalidAddress))?;
        out.push(decoded[0]);
    }

    Ok(out)
}

/// The address list of the session bus.
///
/// Uses `DBUS_SESSION_BUS_ADDRESS` when set to anything but `autolaunch:`,
/// falling back to probing the XDG runtime directory: `<dir>/bus` when it
/// exists, otherwise `<dir>/dbus-session` parsed for a
/// `DBUS_SESSION_BUS_ADDRESS=` line.
pub(crate) fn session_bus_addresses() -> Result<Vec<Address>> {
    if let Ok(address) = env::var(ENV_SESSION_BUS) {
        if !address.starts_with("autolaunch:") {
            return Address::parse_list(&address);
        }
    }

    let Ok(dir) = env::var(ENV_XDG_RUNTIME_DIR) else {
        return Err(Error::new(ErrorKind::MissingBus));
    };

    let bus = PathBuf::from(&dir).join("bus");

    if bus.exists() {
        return Ok(vec![Address::Unix(bus)]);
    }

    let session = PathBuf::from(&dir).join("dbus-session");

    if let Ok(contents) = std::fs::read_to_string(&session) {
        for line in contents.lines() {
            if let Some(address) = line.strip_prefix("DBUS_SESSION_BUS_ADDRESS=") {
                return Address::parse_list(address);
            }
        }
    }

    Err(Error::new(ErrorKind::MissingBus))
}

/// The address list of the system bus.
///
/// Uses `DBUS_SYSTEM_BUS_ADDRESS` when set, or the well-known default.
pub(crate) fn system_bus_addresses() -> Result<Vec<Address>> {
    match env::var(ENV_SYSTEM_BUS) {
        Ok(address) => Address::parse_list(&address),
        Err(..) => Address::parse_list(DEFAULT_SYSTEM_BUS),
    }
}
