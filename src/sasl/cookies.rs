//! The keyring files backing `DBUS_COOKIE_SHA1`.
//!
//! Cookies live in `$HOME/.dbus-keyrings/<context>`, one per line as
//! `<id> <creation-time> <hex-cookie>`. The keyring is managed by the
//! reference bus; this crate only ever reads it.

use std::path::PathBuf;

use sha1::{Digest, Sha1};

use crate::error::ErrorKind;
use crate::{Error, Result};

/// The context used when this crate acts as a server.
pub(crate) const DEFAULT_CONTEXT: &str = "org_freedesktop_general";

/// The directory holding the keyring files.
fn keyring_dir() -> Result<PathBuf> {
    let Some(home) = xdg_home::home_dir() else {
        return Err(Error::new(ErrorKind::MissingCookie));
    };

    Ok(home.join(".dbus-keyrings"))
}

/// A context name names a file inside the keyring directory, so anything
/// resembling a path is refused.
fn validate_context(context: &str) -> Result<()> {
    if context.is_empty() || context.bytes().any(|b| b == b'/' || b == b'\\' || b == b'.') {
        return Err(Error::new(ErrorKind::MissingCookie));
    }

    Ok(())
}

/// Look up the cookie with the given id in the named context.
pub(crate) fn lookup(context: &str, id: &str) -> Result<String> {
    validate_context(context)?;

    let path = keyring_dir()?.join(context);
    let contents = std::fs::read_to_string(path)
        .map_err(|_| Error::new(ErrorKind::MissingCookie))?;

    for line in contents.lines() {
        let mut fields = line.split_whitespace();

        let (Some(cookie_id), Some(_created), Some(cookie)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        if cookie_id == id {
            return Ok(cookie.to_owned());
        }
    }

    Err(Error::new(ErrorKind::MissingCookie))
}

/// The newest cookie in the named context, used by the server side to pick
/// a challenge.
pub(crate) fn newest(context: &str) -> Result<(String, String)> {
    validate_context(context)?;

    let path = keyring_dir()?.join(context);
    let contents = std::fs::read_to_string(path)
        .map_err(|_| Error::new(ErrorKind::MissingCookie))?;

    let mut best: Option<(u64, String, String)> = None;

    for line in contents.lines() {
        let mut fields = line.split_whitespace();

        let (Some(id), Some(created), Some(cookie)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        let Ok(created) = created.parse::<u64>() else {
            continue;
        };

        if best.as_ref().map_or(true, |(at, _, _)| created >= *at) {
            best = Some((created, id.to_owned(), cookie.to_owned()));
        }
    }

    match best {
        Some((_, id, cookie)) => Ok((id, cookie)),
        None => Err(Error::new(ErrorKind::MissingCookie)),
    }
}

/// The response hash: `SHA1(server-challenge:client-challenge:cookie)`,
/// hex encoded.
pub(crate) fn response_hash(
    server_challenge: &str,
    client_challenge: &str,
    cookie: &str,
) -> String {
    let mut hasher = Sha1::new();
    hasher.update(server_challenge.as_bytes());
    hasher.update(b":");
    hasher.update(client_challenge.as_bytes());
    hasher.update(b":");
    hasher.update(cookie.as_bytes());
    hex::encode(hasher.finalize())
}

/// A fresh 16-byte hex encoded challenge.
pub(crate) fn challenge() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
