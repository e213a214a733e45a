use super::Address;

#[test]
fn unix_addresses() {
    assert_eq!(
        Address::parse("unix:path=/run/user/1000/bus").unwrap(),
        Address::Unix("/run/user/1000/bus".into())
    );

    assert_eq!(
        Address::parse("unix:abstract=/tmp/dbus-qnEW9DzD6k").unwrap(),
        Address::UnixAbstract(b"/tmp/dbus-qnEW9DzD6k".to_vec())
    );
}

#[test]
fn tcp_addresses() {
    assert_eq!(
        Address::parse("tcp:host=localhost,port=4711").unwrap(),
        Address::Tcp {
            host: "localhost".into(),
            port: 4711,
        }
    );

    assert_eq!(
        Address::parse("nonce-tcp:host=127.0.0.1,port=55556,noncefile=/tmp/nonce").unwrap(),
        Address::NonceTcp {
            host: "127.0.0.1".into(),
            port: 55556,
            noncefile: "/tmp/nonce".into(),
        }
    );
}

#[test]
fn escaped_values() {
    assert_eq!(
        Address::parse("unix:path=/tmp/with%20space").unwrap(),
        Address::Unix("/tmp/with space".into())
    );
}

#[test]
fn lists_in_order() {
    let list = Address::parse_list("unix:path=/a;tcp:host=h,port=1").unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0], Address::Unix("/a".into()));
}

#[test]
fn invalid_addresses() {
    for address in [
        "",
        "unix",
        "unix:",
        "unix:path=/a,abstract=b",
        "tcp:host=localhost",
        "tcp:host=localhost,port=notaport",
        "nonce-tcp:host=h,port=1",
        "carrier-pigeon:coop=roof",
        "unix:path=/tmp/%2",
        "unix:path=/tmp/%zz",
    ] {
        assert!(Address::parse(address).is_err(), "{address} should fail");
    }
}
