use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ErrorKind;
use crate::transport::Transport;
use crate::{Error, Result};

use super::{command, cookies, Handshake, Mechanism};

/// The number of protocol violations tolerated before the connection is
/// aborted.
const MAX_STRIKES: usize = 5;

/// Configuration for the server half of the authentication handshake.
///
/// By default only `EXTERNAL` is accepted, verified against the uid the
/// transport reports for the peer.
#[derive(Clone)]
pub struct ServerAuth {
    pub(crate) guid: String,
    anonymous: bool,
    cookie: bool,
    external_filter: Option<Arc<dyn Fn(u32) -> bool + Send + Sync>>,
}

impl ServerAuth {
    /// Construct a server configuration with the given GUID.
    pub fn new(guid: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            anonymous: false,
            cookie: false,
            external_filter: None,
        }
    }

    /// Construct a server configuration with a freshly generated GUID.
    pub fn with_random_guid() -> Self {
        Self::new(cookies::challenge())
    }

    /// Also accept the `ANONYMOUS` mechanism.
    #[must_use]
    pub fn allow_anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    /// Also accept the `DBUS_COOKIE_SHA1` mechanism, verified against this
    /// user's keyring.
    #[must_use]
    pub fn allow_cookie(mut self) -> Self {
        self.cookie = true;
        self
    }

    /// Restrict `EXTERNAL` further than the uid match, for instance to a
    /// fixed set of uids.
    #[must_use]
    pub fn external_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(u32) -> bool + Send + Sync + 'static,
    {
        self.external_filter = Some(Arc::new(filter));
        self
    }

    fn mechanisms(&self) -> String {
        let mut out = String::from(Mechanism::External.name());

        if self.cookie {
            out.push(' ');
            out.push_str(Mechanism::Cookie.name());
        }

        if self.anonymous {
            out.push(' ');
            out.push_str(Mechanism::Anonymous.name());
        }

        out
    }
}

impl fmt::Debug for ServerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerAuth")
            .field("guid", &self.guid)
            .field("anonymous", &self.anonymous)
            .field("cookie", &self.cookie)
            .finish_non_exhaustive()
    }
}

enum State {
    /// Waiting for an AUTH command.
    WaitingForAuth,
    /// A cookie challenge is outstanding.
    WaitingForData { challenge: String, cookie: String },
    /// Authentication succeeded, waiting for BEGIN.
    WaitingForBegin,
}

/// Run the server half of the handshake.
pub(crate) async fn server_handshake(
    transport: &mut Transport,
    auth: &ServerAuth,
) -> Result<Handshake> {
    transport.read_null_byte().await?;

    let mut state = State::WaitingForAuth;
    let mut strikes = 0;
    let mut unix_fds = false;

    loop {
        let line = transport.read_line().await?;
        let (verb, rest) = command(&line);

        let ok = match verb {
            b"AUTH" if matches!(state, State::WaitingForAuth) => {
                match accept_auth(transport, auth, rest).await? {
                    Verdict::Accepted => {
                        accept(transport, auth).await?;
                        state = State::WaitingForBegin;
                    }
                    Verdict::Challenge { challenge, cookie } => {
                        state = State::WaitingForData { challenge, cookie };
                    }
                    Verdict::Rejected => {
                        reject(transport, auth).await?;
                    }
                }

                true
            }
            b"DATA" if matches!(state, State::WaitingForData { .. }) => {
                let previous = std::mem::replace(&mut state, State::WaitingForAuth);

                if let State::WaitingForData { challenge, cookie } = previous {
                    if verify_cookie_response(&challenge, &cookie, rest) {
                        accept(transport, auth).await?;
                        state = State::WaitingForBegin;
                    } else {
                        reject(transport, auth).await?;
                    }
                }

                true
            }
            b"CANCEL" | b"ERROR" => {
                state = State::WaitingForAuth;
                reject(transport, auth).await?;
                true
            }
            b"BEGIN" if matches!(state, State::WaitingForBegin) => {
                debug!(unix_fds, "peer authenticated");

                return Ok(Handshake {
                    guid: auth.guid.clone(),
                    unix_fds,
                });
            }
            b"NEGOTIATE_UNIX_FD" if matches!(state, State::WaitingForBegin) => {
                if transport.supports_unix_fds() {
                    transport.send_line(b"AGREE_UNIX_FD").await?;
                    transport.enable_unix_fds();
                    unix_fds = true;
                } else {
                    transport
                        .send_line(b"ERROR transport has no descriptor support")
                        .await?;
                }

                true
            }
            _ => false,
        };

        if !ok {
            strikes += 1;

            if strikes > MAX_STRIKES {
                warn!("too many protocol violations during auth");
                return Err(Error::new(ErrorKind::InvalidSasl));
            }

            transport.send_line(b"ERROR unexpected command").await?;
        }
    }
}

async fn accept(transport: &mut Transport, auth: &ServerAuth) -> Result<()> {
    let mut line = b"OK ".to_vec();
    line.extend_from_slice(auth.guid.as_bytes());
    transport.send_line(&line).await
}

enum Verdict {
    Accepted,
    Challenge { challenge: String, cookie: String },
    Rejected,
}

async fn reject(transport: &mut Transport, auth: &ServerAuth) -> Result<()> {
    let mut line = b"REJECTED ".to_vec();
    line.extend_from_slice(auth.mechanisms().as_bytes());
    transport.send_line(&line).await
}

/// Judge an `AUTH <mechanism> [initial-data]` command.
async fn accept_auth(
    transport: &mut Transport,
    auth: &ServerAuth,
    rest: &[u8],
) -> Result<Verdict> {
    let (mechanism, data) = match crate::utils::split_once(rest, b' ') {
        Some((mechanism, data)) => (mechanism, data),
        None => (rest, &[][..]),
    };

    match mechanism {
        b"EXTERNAL" => {
            let Some(claimed) = decode_uid(data) else {
                return Ok(Verdict::Rejected);
            };

            let Some(peer) = transport.peer_uid() else {
                debug!("no peer credentials available for EXTERNAL");
                return Ok(Verdict::Rejected);
            };

            if claimed != peer {
                debug!(claimed, peer, "EXTERNAL uid mismatch");
                return Ok(Verdict::Rejected);
            }

            if let Some(filter) = &auth.external_filter {
                if !filter(peer) {
                    debug!(peer, "EXTERNAL uid refused by policy");
                    return Ok(Verdict::Rejected);
                }
            }

            Ok(Verdict::Accepted)
        }
        b"ANONYMOUS" if auth.anonymous => Ok(Verdict::Accepted),
        b"DBUS_COOKIE_SHA1" if auth.cookie => {
            // The initial data names the client's user; the keyring
            // consulted is the one this process can read.
            let (id, cookie) = match cookies::newest(cookies::DEFAULT_CONTEXT) {
                Ok(found) => found,
                Err(..) => return Ok(Verdict::Rejected),
            };

            let challenge = cookies::challenge();

            let payload = format!("{} {id} {challenge}", cookies::DEFAULT_CONTEXT);
            let mut line = b"DATA ".to_vec();
            line.extend_from_slice(hex::encode(payload).as_bytes());
            transport.send_line(&line).await?;

            Ok(Verdict::Challenge { challenge, cookie })
        }
        _ => Ok(Verdict::Rejected),
    }
}

/// Verify a client's `DATA <hex(client-challenge SP hash)>` reply.
fn verify_cookie_response(server_challenge: &str, cookie: &str, rest: &[u8]) -> bool {
    let Ok(decoded) = hex::decode(rest) else {
        return false;
    };

    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };

    let mut fields = decoded.split_whitespace();

    let (Some(client_challenge), Some(hash)) = (fields.next(), fields.next()) else {
        return false;
    };

    cookies::response_hash(server_challenge, client_challenge, cookie) == hash
}

/// Decode the hex-of-decimal uid EXTERNAL carries.
fn decode_uid(data: &[u8]) -> Option<u32> {
    let decoded = hex::decode(data).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    decoded.parse().ok()
}
