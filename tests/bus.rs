//! Round trips against a live session bus.
//!
//! Every test returns early when no session bus is reachable, so the
//! suite stays green in minimal environments.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use wirebus::org_freedesktop_dbus::{NameFlag, NameReply, ReleaseNameReply};
use wirebus::{Connection, MessageKind, ObjectPath, Proxy, Sink, Value};

fn have_session_bus() -> bool {
    std::env::var("DBUS_SESSION_BUS_ADDRESS").is_ok()
}

fn name_is_plausible(name: &str) -> bool {
    if let Some(rest) = name.strip_prefix(':') {
        return rest.split('.').count() >= 2;
    }

    name.contains('.') && !name.starts_with('.') && !name.ends_with('.')
}

#[tokio::test]
async fn list_names_returns_valid_names() -> Result<()> {
    if !have_session_bus() {
        return Ok(());
    }

    let c = Connection::session().await?;
    assert!(c.unique_name().is_some());

    let bus = Proxy::new(
        &c,
        "org.freedesktop.DBus",
        ObjectPath::new_const(b"/org/freedesktop/DBus"),
    )
    .with_interface("org.freedesktop.DBus");

    let body = bus.call_wait("ListNames", vec![]).await?;

    let Some(Value::Array(element, names)) = body.first() else {
        panic!("unexpected ListNames reply");
    };

    assert_eq!(element.as_str(), "s");
    assert!(!names.is_empty());

    for name in names {
        let name = name.as_str().expect("names are strings");
        assert!(name_is_plausible(name), "implausible name {name:?}");
    }

    Ok(())
}

#[tokio::test]
async fn request_name_emits_name_acquired() -> Result<()> {
    if !have_session_bus() {
        return Ok(());
    }

    let c = Connection::session().await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    c.signal_sink(Some(Sink::sequential(tx)));
    c.add_match("type='signal',interface='org.freedesktop.DBus',member='NameAcquired'")
        .await?;

    let name = format!("com.example.Wirebus{}", std::process::id());

    let reply = c
        .request_name(&name, NameFlag::DO_NOT_QUEUE)
        .await?;
    assert_eq!(reply, NameReply::PRIMARY_OWNER);

    let acquired = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(signal) = rx.recv().await {
            let MessageKind::Signal { member, .. } = signal.kind() else {
                continue;
            };

            if member != "NameAcquired" {
                continue;
            }

            if signal.body().first().and_then(Value::as_str) == Some(&name) {
                return true;
            }
        }

        false
    })
    .await?;

    assert!(acquired, "no NameAcquired for {name}");

    let released = c.release_name(&name).await?;
    assert_eq!(released, ReleaseNameReply::RELEASED);

    Ok(())
}

#[tokio::test]
async fn shared_connection_is_shared() -> Result<()> {
    if !have_session_bus() {
        return Ok(());
    }

    let a = Connection::session_shared().await?;
    let b = Connection::session_shared().await?;
    assert_eq!(a.unique_name(), b.unique_name());

    // Private connections stay independent of the singleton.
    let private = Connection::session().await?;
    assert_ne!(private.unique_name(), a.unique_name());

    Ok(())
}

#[tokio::test]
async fn ping_the_bus() -> Result<()> {
    if !have_session_bus() {
        return Ok(());
    }

    let c = Connection::session().await?;

    let bus = Proxy::new(
        &c,
        "org.freedesktop.DBus",
        ObjectPath::new_const(b"/org/freedesktop/DBus"),
    );

    bus.ping().await?;
    let id = bus.get_machine_id().await?;
    assert!(!id.is_empty());

    Ok(())
}
