//! End-to-end coverage over a socketpair: authentication, method calls,
//! typed export, signal sinks, cancellation and shutdown, without a bus
//! daemon in the picture.

use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use wirebus::org_freedesktop_dbus as fdo;
use wirebus::{
    Connection, Flags, Interface, InterfaceBuilder, Message, MessageKind, ObjectPath, ServerAuth,
    Sink, Value,
};

const PATH: &ObjectPath = ObjectPath::new_const(b"/com/example/Calc");
const INTERFACE: &str = "com.example.Calc";

fn calc() -> Arc<dyn Interface> {
    InterfaceBuilder::new()
        .method("Sum", "uu", "u", |args| async move {
            let (Some(Value::U32(a)), Some(Value::U32(b))) = (args.first(), args.get(1)) else {
                unreachable!("dispatch checks the signature");
            };

            Ok(vec![Value::U32(a.wrapping_add(*b))])
        })
        .unwrap()
        .method("Hang", "", "", |_| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        })
        .unwrap()
        .build()
}

async fn pair() -> Result<(Connection, Connection)> {
    let (a, b) = UnixStream::pair()?;

    let server = tokio::spawn(Connection::peer_server(b, ServerAuth::with_random_guid()));
    let client = Connection::peer_client(a).await?;
    let server = server.await??;

    server.export(PATH, INTERFACE, calc())?;
    Ok((client, server))
}

fn sum_call(a: u32, b: u32) -> Message {
    Message::method_call(PATH, "Sum")
        .with_interface(INTERFACE)
        .with_body(vec![Value::U32(a), Value::U32(b)])
        .unwrap()
}

#[tokio::test]
async fn sum_wraps_at_32_bits() -> Result<()> {
    let (client, _server) = pair().await?;

    let reply = client.send_call(sum_call(4_000_000_000, 1_000_000_000))?.await?;
    assert_eq!(reply.body(), [Value::U32(4_000_000_000u32.wrapping_add(1_000_000_000))]);

    Ok(())
}

#[tokio::test]
async fn arity_mismatch_is_invalid_args() -> Result<()> {
    let (client, _server) = pair().await?;

    let call = Message::method_call(PATH, "Sum")
        .with_interface(INTERFACE)
        .with_body(vec![Value::U32(1)])
        .unwrap();

    let err = client.send_call(call)?.await.unwrap_err();
    let method = err.method_error().expect("a peer error");
    assert_eq!(method.name(), fdo::ERROR_INVALID_ARGS);

    Ok(())
}

#[tokio::test]
async fn unknown_targets_are_named_errors() -> Result<()> {
    let (client, _server) = pair().await?;

    let call = Message::method_call(PATH, "Quotient").with_interface(INTERFACE);
    let err = client.send_call(call)?.await.unwrap_err();
    assert_eq!(
        err.method_error().expect("a peer error").name(),
        fdo::ERROR_UNKNOWN_METHOD,
    );

    let call = Message::method_call(ObjectPath::new_const(b"/nowhere"), "Sum")
        .with_interface(INTERFACE);
    let err = client.send_call(call)?.await.unwrap_err();
    assert_eq!(
        err.method_error().expect("a peer error").name(),
        fdo::ERROR_UNKNOWN_OBJECT,
    );

    Ok(())
}

#[tokio::test]
async fn peer_interface_is_always_served() -> Result<()> {
    let (client, server) = pair().await?;

    let ping = Message::method_call(PATH, "Ping").with_interface(fdo::PEER_INTERFACE);
    client.send_call(ping)?.await?;

    let machine = Message::method_call(PATH, "GetMachineId").with_interface(fdo::PEER_INTERFACE);
    let reply = client.send_call(machine)?.await?;

    // The machine id is the GUID both sides agreed on during auth.
    assert_eq!(reply.body(), [Value::from(server.guid())]);
    assert_eq!(client.guid(), server.guid());

    Ok(())
}

#[tokio::test]
async fn sequential_sink_preserves_order() -> Result<()> {
    let (client, server) = pair().await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    server.signal_sink(Some(Sink::sequential(tx)));

    for i in 0..100u32 {
        client.emit(PATH, "com.example.Events.Tick", vec![Value::U32(i)])?;
    }

    // A reply round trip guarantees every earlier frame has been
    // demultiplexed, however slow this consumer was.
    client.send_call(sum_call(1, 2))?.await?;

    for i in 0..100u32 {
        let signal = rx.try_recv().expect("signal queued");
        assert_eq!(signal.body(), [Value::U32(i)]);

        let MessageKind::Signal { member, .. } = signal.kind() else {
            panic!("expected a signal");
        };

        assert_eq!(member, "Tick");
    }

    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn lossy_sink_drops_when_full() -> Result<()> {
    let (client, server) = pair().await?;

    let (tx, mut rx) = mpsc::channel(1);
    server.signal_sink(Some(Sink::lossy(tx)));

    for i in 0..10u32 {
        client.emit(PATH, "com.example.Events.Tick", vec![Value::U32(i)])?;
    }

    client.send_call(sum_call(1, 2))?.await?;

    // Capacity one and an idle consumer: the first signal is buffered,
    // the rest were dropped rather than stalling the inbound loop.
    let signal = rx.try_recv().expect("one signal buffered");
    assert_eq!(signal.body(), [Value::U32(0)]);
    assert!(rx.try_recv().is_err());

    Ok(())
}

#[tokio::test]
async fn concurrent_calls_get_distinct_serials() -> Result<()> {
    let (client, _server) = pair().await?;

    let calls = (0..32u32)
        .map(|i| client.send_call(sum_call(i, 1)).unwrap())
        .collect::<Vec<_>>();

    let replies = futures::future::join_all(calls).await;

    let mut serials = std::collections::HashSet::new();

    for (i, reply) in replies.into_iter().enumerate() {
        let reply = reply?;
        assert_eq!(reply.body(), [Value::U32(i as u32 + 1)]);

        let MessageKind::MethodReturn { reply_serial } = reply.kind() else {
            panic!("expected a method return");
        };

        assert!(serials.insert(*reply_serial), "serial reused");
    }

    assert_eq!(serials.len(), 32);
    Ok(())
}

#[tokio::test]
async fn close_fails_outstanding_calls() -> Result<()> {
    let (client, _server) = pair().await?;

    let hang = || {
        Message::method_call(PATH, "Hang")
            .with_interface(INTERFACE)
            .with_body(vec![])
            .unwrap()
    };

    let calls = (0..8)
        .map(|_| client.send_call(hang()).unwrap())
        .collect::<Vec<_>>();

    // Give the writer a chance to put the calls on the wire.
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.close();

    for call in calls {
        let err = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .expect("completion is prompt")
            .unwrap_err();

        assert!(err.is_closed(), "{err}");
    }

    // Closed connections refuse new work.
    assert!(client.is_closed());
    assert!(client.send_call(sum_call(1, 1)).is_err());

    Ok(())
}

#[tokio::test]
async fn cancelled_call_completes_once() -> Result<()> {
    let (client, _server) = pair().await?;

    let call = client.send_call(
        Message::method_call(PATH, "Hang")
            .with_interface(INTERFACE)
            .with_body(vec![])
            .unwrap(),
    )?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    call.cancel();

    let err = call.await.unwrap_err();
    assert!(err.is_cancelled(), "{err}");

    Ok(())
}

#[tokio::test]
async fn no_reply_expected_completes_on_write() -> Result<()> {
    let (client, _server) = pair().await?;

    let call = client.send_call(sum_call(1, 2).with_flags(Flags::EMPTY | Flags::NO_REPLY_EXPECTED))?;
    let reply = call.await?;
    assert!(reply.body().is_empty());

    Ok(())
}

#[tokio::test]
async fn eavesdrop_receives_foreign_destinations() -> Result<()> {
    let (client, server) = pair().await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    server.eavesdrop_sink(Some(Sink::sequential(tx)));

    let foreign = sum_call(1, 2)
        .with_destination("com.example.SomeoneElse")
        .with_flags(Flags::EMPTY | Flags::NO_REPLY_EXPECTED);
    client.send_call(foreign)?.await?;

    client.send_call(sum_call(1, 2))?.await?;

    let seen = rx.try_recv().expect("eavesdropped message");
    assert_eq!(seen.destination(), Some("com.example.SomeoneElse"));

    Ok(())
}

#[tokio::test]
async fn bus_operations_refused_on_peer_connections() -> Result<()> {
    let (client, _server) = pair().await?;

    // There is no daemon on the other side to own names or hold match
    // rules, so these fail synchronously.
    let err = client
        .request_name("com.example.Nope", fdo::NameFlag::DO_NOT_QUEUE)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Not a message bus connection");

    assert!(client.release_name("com.example.Nope").await.is_err());
    assert!(client.add_match("type='signal'").await.is_err());
    assert!(client.remove_match("type='signal'").await.is_err());

    // Ordinary traffic is unaffected.
    client.send_call(sum_call(1, 2))?.await?;

    Ok(())
}

#[tokio::test]
async fn unexport_removes_the_handler() -> Result<()> {
    let (client, server) = pair().await?;

    assert!(server.unexport(PATH, INTERFACE));
    assert!(!server.unexport(PATH, INTERFACE));

    let err = client.send_call(sum_call(1, 2))?.await.unwrap_err();
    assert_eq!(
        err.method_error().expect("a peer error").name(),
        fdo::ERROR_UNKNOWN_OBJECT,
    );

    Ok(())
}

#[tokio::test]
async fn fds_pass_between_peers() -> Result<()> {
    let (client, server) = pair().await?;

    server.export(
        ObjectPath::new_const(b"/com/example/Files"),
        "com.example.Files",
        InterfaceBuilder::new()
            .method("Stash", "h", "b", |args| async move {
                let Some(Value::Fd(fd)) = args.first() else {
                    unreachable!("dispatch checks the signature");
                };

                Ok(vec![Value::Bool(fd.try_clone_to_owned().is_ok())])
            })
            .unwrap()
            .build(),
    )?;

    let file = std::fs::File::open("/dev/null")?;
    let fd = wirebus::UnixFd::new(std::os::fd::OwnedFd::from(file));

    let call = Message::method_call(ObjectPath::new_const(b"/com/example/Files"), "Stash")
        .with_interface("com.example.Files")
        .with_body(vec![Value::Fd(fd)])
        .unwrap();

    let reply = client.send_call(call)?.await?;
    assert_eq!(reply.body(), [Value::Bool(true)]);

    Ok(())
}
