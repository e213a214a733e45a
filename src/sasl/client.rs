use tracing::{debug, trace};

use crate::error::ErrorKind;
use crate::transport::Transport;
use crate::{Error, Result};

use super::{command, cookies, Handshake, Mechanism};

/// The mechanisms a client offers, in order.
const MECHANISMS: &[Mechanism] = &[Mechanism::External, Mechanism::Cookie, Mechanism::Anonymous];

/// Run the client half of the handshake.
///
/// Mechanisms are tried in preference order until the server accepts one.
/// When `negotiate_fds` is set and the transport is capable, descriptor
/// passing is negotiated before `BEGIN`.
pub(crate) async fn client_handshake(
    transport: &mut Transport,
    negotiate_fds: bool,
) -> Result<Handshake> {
    transport.send_null_byte().await?;

    let mut mechanisms = MECHANISMS.iter().copied();

    let guid = 'guid: loop {
        let Some(mechanism) = mechanisms.next() else {
            return Err(Error::new(ErrorKind::AuthRejected));
        };

        match initial(mechanism) {
            Some(data) => {
                let mut line = format!("AUTH {} ", mechanism.name()).into_bytes();
                line.extend_from_slice(data.as_bytes());
                transport.send_line(&line).await?;
            }
            None => {
                trace!(mechanism = mechanism.name(), "mechanism not available");
                continue;
            }
        }

        loop {
            let line = transport.read_line().await?;
            let (verb, rest) = command(&line);

            match verb {
                b"OK" => {
                    let guid = std::str::from_utf8(rest)
                        .map_err(|_| Error::new(ErrorKind::InvalidSasl))?;
                    break 'guid guid.to_owned();
                }
                b"REJECTED" => {
                    debug!(mechanism = mechanism.name(), "mechanism rejected");
                    break;
                }
                b"DATA" => match challenge_response(mechanism, rest) {
                    Ok(reply) => {
                        let mut line = b"DATA ".to_vec();
                        line.extend_from_slice(reply.as_bytes());
                        transport.send_line(&line).await?;
                    }
                    Err(error) => {
                        debug!(
                            mechanism = mechanism.name(),
                            %error,
                            "cannot answer challenge",
                        );
                        transport.send_line(b"CANCEL").await?;
                    }
                },
                b"ERROR" => {
                    transport.send_line(b"CANCEL").await?;
                }
                _ => return Err(Error::new(ErrorKind::InvalidSaslResponse)),
            }
        }
    };

    let mut unix_fds = false;

    if negotiate_fds && transport.supports_unix_fds() {
        transport.send_line(b"NEGOTIATE_UNIX_FD").await?;

        let line = transport.read_line().await?;
        let (verb, _) = command(&line);

        match verb {
            b"AGREE_UNIX_FD" => {
                transport.enable_unix_fds();
                unix_fds = true;
            }
            b"ERROR" => {
                debug!("server refused unix fd negotiation");
            }
            _ => return Err(Error::new(ErrorKind::InvalidSaslResponse)),
        }
    }

    transport.send_line(b"BEGIN").await?;
    debug!(%guid, unix_fds, "authenticated");
    Ok(Handshake { guid, unix_fds })
}

fn current_uid() -> u32 {
    // SAFETY: getuid is always safe to call.
    unsafe { libc::getuid() }
}

/// The initial data line of a mechanism, hex encoded where the protocol
/// requires it. `None` if the mechanism cannot be attempted.
fn initial(mechanism: Mechanism) -> Option<String> {
    match mechanism {
        Mechanism::External => Some(hex::encode(current_uid().to_string())),
        // The initial data names the user whose keyring will be consulted.
        Mechanism::Cookie => Some(hex::encode(current_uid().to_string())),
        Mechanism::Anonymous => Some(hex::encode("wirebus")),
    }
}

/// Answer a `DATA` challenge.
fn challenge_response(mechanism: Mechanism, rest: &[u8]) -> Result<String> {
    if mechanism != Mechanism::Cookie {
        return Err(Error::new(ErrorKind::InvalidSaslResponse));
    }

    let decoded = hex::decode(rest).map_err(|_| Error::new(ErrorKind::InvalidSasl))?;
    let decoded =
        String::from_utf8(decoded).map_err(|_| Error::new(ErrorKind::InvalidSasl))?;

    let mut fields = decoded.split_whitespace();

    let (Some(context), Some(id), Some(server_challenge)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return Err(Error::new(ErrorKind::InvalidSasl));
    };

    let cookie = cookies::lookup(context, id)?;
    let client_challenge = cookies::challenge();
    let hash = cookies::response_hash(server_challenge, &client_challenge, &cookie);

    Ok(hex::encode(format!("{client_challenge} {hash}")))
}
