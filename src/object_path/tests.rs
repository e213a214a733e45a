use super::{ObjectPath, ObjectPathBuf};

#[test]
fn valid_paths() {
    for path in [
        "/",
        "/org",
        "/org/freedesktop/DBus",
        "/org/foo/bar",
        "/a/b/c/d",
        "/with_underscore/and_2_digits",
    ] {
        assert!(ObjectPath::new(path).is_ok(), "{path} should be valid");
    }
}

#[test]
fn invalid_paths() {
    for path in [
        "",
        "foo",
        "//",
        "/org//bar",
        "/org/",
        "/org/foo-bar",
        "/org/foo.bar",
        "/org/f\u{e9}o",
        "/ /",
    ] {
        assert!(ObjectPath::new(path).is_err(), "{path} should be invalid");
    }
}

#[test]
fn owned_round_trip() {
    let path = ObjectPath::new("/org/foo/bar").unwrap();
    let owned = ObjectPathBuf::new("/org/foo/bar").unwrap();
    assert_eq!(&*owned, path);
    assert_eq!(owned.to_string(), "/org/foo/bar");
    assert_eq!(path.to_owned(), owned);
    assert_eq!(ObjectPath::ROOT.as_str(), "/");
}
