use std::io::Write;
use std::os::unix::net::UnixStream;

use crate::transport::Transport;

use super::server::ServerAuth;
use super::{client_handshake, command, cookies, server_handshake};

fn pair() -> (Transport, Transport) {
    let (a, b) = UnixStream::pair().unwrap();
    (
        Transport::from_unix_stream(a).unwrap(),
        Transport::from_unix_stream(b).unwrap(),
    )
}

#[test]
fn command_splitting() {
    assert_eq!(command(b"OK abc123"), (&b"OK"[..], &b"abc123"[..]));
    assert_eq!(command(b"BEGIN"), (&b"BEGIN"[..], &[][..]));
    assert_eq!(command(b"REJECTED a b"), (&b"REJECTED"[..], &b"a b"[..]));
}

#[test]
fn cookie_hashing() {
    let hash = cookies::response_hash("aabb", "ccdd", "s3cr3t");
    assert_eq!(hash.len(), 40);
    assert!(hash.bytes().all(|b| b.is_ascii_hexdigit()));

    // Deterministic, and sensitive to every input.
    assert_eq!(hash, cookies::response_hash("aabb", "ccdd", "s3cr3t"));
    assert_ne!(hash, cookies::response_hash("aabb", "ccdd", "other"));
    assert_ne!(hash, cookies::response_hash("xxyy", "ccdd", "s3cr3t"));
}

#[test]
fn challenges_are_unique() {
    let a = cookies::challenge();
    let b = cookies::challenge();
    assert_eq!(a.len(), 32);
    assert_ne!(a, b);
}

#[tokio::test]
async fn external_handshake() {
    let (mut client, mut server) = pair();
    let auth = ServerAuth::new("0123456789abcdef0123456789abcdef");

    let (client_side, server_side) = tokio::join!(
        client_handshake(&mut client, false),
        server_handshake(&mut server, &auth),
    );

    let client_side = client_side.unwrap();
    let server_side = server_side.unwrap();

    assert_eq!(client_side.guid, "0123456789abcdef0123456789abcdef");
    assert_eq!(server_side.guid, client_side.guid);
    assert!(!client_side.unix_fds);
}

#[tokio::test]
async fn fd_negotiation() {
    let (mut client, mut server) = pair();
    let auth = ServerAuth::with_random_guid();

    let (client_side, server_side) = tokio::join!(
        client_handshake(&mut client, true),
        server_handshake(&mut server, &auth),
    );

    assert!(client_side.unwrap().unix_fds);
    assert!(server_side.unwrap().unix_fds);
    assert!(client.unix_fds_enabled());
    assert!(server.unix_fds_enabled());
}

#[tokio::test]
async fn anonymous_fallback() {
    let (mut client, mut server) = pair();

    // EXTERNAL is refused by policy, so the client walks down its
    // mechanism list until ANONYMOUS is accepted.
    let auth = ServerAuth::with_random_guid()
        .allow_anonymous()
        .external_filter(|_| false);

    let (client_side, server_side) = tokio::join!(
        client_handshake(&mut client, false),
        server_handshake(&mut server, &auth),
    );

    client_side.unwrap();
    server_side.unwrap();
}

#[tokio::test]
async fn everything_rejected() {
    let (mut client, mut server) = pair();
    let auth = ServerAuth::with_random_guid().external_filter(|_| false);

    let server = tokio::spawn(async move {
        server_handshake(&mut server, &auth).await.map(|_| ())
    });

    let err = client_handshake(&mut client, false).await.unwrap_err();
    assert!(matches!(
        err.kind(),
        crate::error::ErrorKind::AuthRejected
    ));

    // The server sees the client hang up after running out of mechanisms.
    drop(client);
    assert!(server.await.unwrap().is_err());
}

#[tokio::test]
async fn cookie_handshake() {
    let home = tempfile::tempdir().unwrap();
    let keyrings = home.path().join(".dbus-keyrings");
    std::fs::create_dir_all(&keyrings).unwrap();

    let mut keyring = std::fs::File::create(keyrings.join("org_freedesktop_general")).unwrap();
    writeln!(keyring, "42 1719000000 deadbeefcafe").unwrap();
    drop(keyring);

    // The keyring location is resolved through the home directory.
    std::env::set_var("HOME", home.path());

    let (mut client, mut server) = pair();

    let auth = ServerAuth::with_random_guid()
        .allow_cookie()
        .external_filter(|_| false);

    let (client_side, server_side) = tokio::join!(
        client_handshake(&mut client, false),
        server_handshake(&mut server, &auth),
    );

    client_side.unwrap();
    server_side.unwrap();
}
