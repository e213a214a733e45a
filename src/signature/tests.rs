use super::{Signature, SignatureBuf, SignatureError, SignatureErrorKind};

fn err(signature: &str) -> SignatureErrorKind {
    match Signature::new(signature) {
        Ok(sig) => panic!("{signature}: expected error, got {sig:?}"),
        Err(SignatureError { kind }) => kind,
    }
}

#[test]
fn valid_signatures() {
    for sig in [
        "y", "b", "n", "q", "i", "u", "x", "t", "d", "s", "o", "g", "v", "h", "ay", "aay",
        "a{sv}", "a{s(iu)}", "(y)", "(yy)", "(y(y))", "su", "sa{sv}as", "a(sa(iiay)ss)",
        "aaaaay", "a{ya{yv}}",
    ] {
        assert!(Signature::new(sig).is_ok(), "{sig} should be valid");
    }
}

#[test]
fn invalid_signatures() {
    assert_eq!(err(""), SignatureErrorKind::Empty);
    assert_eq!(err("z"), SignatureErrorKind::UnknownTypeCode(b'z'));
    assert_eq!(err("a"), SignatureErrorKind::MissingArrayElementType);
    assert_eq!(err("a{s"), SignatureErrorKind::DictStartedButNotEnded);
    assert_eq!(err("(s"), SignatureErrorKind::StructStartedButNotEnded);
    assert_eq!(err(")"), SignatureErrorKind::StructEndedButNotStarted);
    assert_eq!(err("()"), SignatureErrorKind::StructHasNoFields);
    assert_eq!(err("a{}s"), SignatureErrorKind::DictEntryHasWrongArity);
    assert_eq!(err("a{s}"), SignatureErrorKind::DictEntryHasWrongArity);
    assert_eq!(err("a{sss}"), SignatureErrorKind::DictEntryHasWrongArity);
    assert_eq!(err("a{vs}"), SignatureErrorKind::DictKeyMustBeBasicType);
    assert_eq!(err("a{ays}"), SignatureErrorKind::DictKeyMustBeBasicType);
    assert_eq!(err("a{(s)s}"), SignatureErrorKind::DictKeyMustBeBasicType);
    assert_eq!(err("{sv}"), SignatureErrorKind::DictEntryNotInsideArray);
    assert_eq!(err("({sv})"), SignatureErrorKind::DictEntryNotInsideArray);
}

#[test]
fn length_boundary() {
    let ok = "y".repeat(255);
    assert!(Signature::new(&ok).is_ok());

    let long = "y".repeat(256);
    assert_eq!(err(&long), SignatureErrorKind::SignatureTooLong);
}

#[test]
fn depth_boundary() {
    // 64 nested arrays is the limit; the element brings the signature to 65
    // bytes which is well inside the length limit.
    let deep = format!("{}y", "a".repeat(64));
    assert!(Signature::new(&deep).is_ok());

    let too_deep = format!("{}y", "a".repeat(65));
    assert_eq!(err(&too_deep), SignatureErrorKind::DepthExceeded);

    // Mixing arrays and structs counts towards the same limit.
    let mixed = format!("{}{}y{}", "a".repeat(32), "(".repeat(32), ")".repeat(32));
    assert!(Signature::new(&mixed).is_ok());

    let mixed = format!("{}{}y{}", "a".repeat(33), "(".repeat(32), ")".repeat(32));
    assert_eq!(err(&mixed), SignatureErrorKind::DepthExceeded);
}

#[test]
fn dict_depth_counts_double() {
    // A dict opens an array and an entry, so every nested level costs
    // two; 32 levels sit exactly at the limit.
    let mut sig = String::from("y");

    for _ in 0..32 {
        sig = format!("a{{y{sig}}}");
    }

    assert!(Signature::new(&sig).is_ok());

    let mut sig = String::from("y");

    for _ in 0..33 {
        sig = format!("a{{y{sig}}}");
    }

    assert_eq!(err(&sig), SignatureErrorKind::DepthExceeded);

    // 62 arrays around one dict level total 64. With 63 arrays the entry
    // lands at 65, even though only 64 containers are open before it.
    let ok = format!("{}a{{yy}}", "a".repeat(62));
    assert!(Signature::new(&ok).is_ok());

    let too_deep = format!("{}a{{yy}}", "a".repeat(63));
    assert_eq!(err(&too_deep), SignatureErrorKind::DepthExceeded);
}

#[test]
fn complete_types() {
    let sig = Signature::new("sa{sv}(ii)aay").unwrap();
    let types = sig.iter().map(|s| s.as_str()).collect::<Vec<_>>();
    assert_eq!(types, ["s", "a{sv}", "(ii)", "aay"]);

    assert!(Signature::new("v").unwrap().is_single_complete_type());
    assert!(Signature::new("a(sa(iiay)ss)")
        .unwrap()
        .is_single_complete_type());
    assert!(!Signature::new("ss").unwrap().is_single_complete_type());
    assert!(!Signature::EMPTY.is_single_complete_type());
}

#[test]
fn round_trip() {
    for sig in ["y", "a{sv}", "a(sa(iiay)ss)", "sa{sv}as"] {
        let parsed = Signature::new(sig).unwrap();
        assert_eq!(parsed.as_str(), sig);

        let owned = SignatureBuf::new(sig).unwrap();
        assert_eq!(&*owned, parsed);
        assert_eq!(owned.to_string(), sig);
    }
}

#[test]
fn alignments() {
    assert_eq!(Signature::new("y").unwrap().alignment(), 1);
    assert_eq!(Signature::new("g").unwrap().alignment(), 1);
    assert_eq!(Signature::new("v").unwrap().alignment(), 1);
    assert_eq!(Signature::new("n").unwrap().alignment(), 2);
    assert_eq!(Signature::new("b").unwrap().alignment(), 4);
    assert_eq!(Signature::new("s").unwrap().alignment(), 4);
    assert_eq!(Signature::new("h").unwrap().alignment(), 4);
    assert_eq!(Signature::new("ay").unwrap().alignment(), 4);
    assert_eq!(Signature::new("x").unwrap().alignment(), 8);
    assert_eq!(Signature::new("d").unwrap().alignment(), 8);
    assert_eq!(Signature::new("(y)").unwrap().alignment(), 8);
}
