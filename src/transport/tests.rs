use std::num::NonZeroU32;
use std::os::unix::net::UnixStream;

use crate::message::{decode, encode};
use crate::proto::Endianness;
use crate::{Message, ObjectPath, Value};

use super::Transport;

fn pair() -> (Transport, Transport) {
    let (a, b) = UnixStream::pair().unwrap();
    (
        Transport::from_unix_stream(a).unwrap(),
        Transport::from_unix_stream(b).unwrap(),
    )
}

#[tokio::test]
async fn frames_round_trip() {
    let (mut a, mut b) = pair();

    let message = Message::method_call(ObjectPath::new_const(b"/org/foo"), "Echo")
        .with_body(vec![Value::from("payload"), Value::U32(7)])
        .unwrap();

    let serial = NonZeroU32::new(11).unwrap();
    let (frame, fds) = encode(&message, serial, Endianness::LITTLE).unwrap();

    a.send_frame(&frame, &fds).await.unwrap();

    let (received, pending) = b.read_frame().await.unwrap();
    let decoded = decode(&received, pending).unwrap();
    assert_eq!(decoded.kind(), message.kind());
    assert_eq!(decoded.body(), message.body());
}

#[tokio::test]
async fn descriptors_ride_with_their_frame() {
    let (mut a, mut b) = pair();
    a.enable_unix_fds();
    b.enable_unix_fds();

    let file = std::fs::File::open("/dev/null").unwrap();
    let fd = crate::UnixFd::new(std::os::fd::OwnedFd::from(file));

    let message = Message::method_call(ObjectPath::new_const(b"/org/foo"), "TakeFd")
        .with_body(vec![Value::Fd(fd)])
        .unwrap();

    let serial = NonZeroU32::new(1).unwrap();
    let (frame, fds) = encode(&message, serial, Endianness::LITTLE).unwrap();
    assert_eq!(fds.len(), 1);

    a.send_frame(&frame, &fds).await.unwrap();

    let (received, pending) = b.read_frame().await.unwrap();
    let decoded = decode(&received, pending).unwrap();

    let [Value::Fd(received)] = decoded.body() else {
        panic!("expected an fd in the body");
    };

    // The descriptor is a working duplicate, not the sender's index.
    received.try_clone_to_owned().unwrap();
}

#[tokio::test]
async fn fds_refused_without_negotiation() {
    let (mut a, _b) = pair();

    let file = std::fs::File::open("/dev/null").unwrap();
    let fd = crate::UnixFd::new(std::os::fd::OwnedFd::from(file));

    let err = a.send_frame(b"xxxx", &[fd]).await.unwrap_err();
    assert!(matches!(
        err.kind(),
        crate::error::ErrorKind::FdsNotSupported
    ));
}

#[tokio::test]
async fn line_reading_leaves_frame_bytes() {
    let (mut a, mut b) = pair();

    let message = Message::method_call(ObjectPath::new_const(b"/org/foo"), "Ping");
    let serial = NonZeroU32::new(2).unwrap();
    let (frame, _) = encode(&message, serial, Endianness::LITTLE).unwrap();

    // A line and the first binary frame can arrive in one flood; the
    // leftover must stay available for framing.
    let mut flood = b"BEGIN\r\n".to_vec();
    flood.extend_from_slice(&frame);
    a.send_bytes(&flood).await.unwrap();

    assert_eq!(b.read_line().await.unwrap(), b"BEGIN");

    let (received, pending) = b.read_frame().await.unwrap();
    let decoded = decode(&received, pending).unwrap();
    assert_eq!(decoded.kind(), message.kind());
}

#[tokio::test]
async fn eof_is_an_error() {
    let (mut a, b) = pair();
    drop(b);

    let err = a.read_line().await.unwrap_err();
    assert!(err.to_string().contains("unexpected end of file"));
}
