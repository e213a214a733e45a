use crate::error::ErrorKind;
use crate::proto::Endianness;
use crate::{Body, BodyBuf, Signature, SignatureBuf, Value};

fn round_trip(values: Vec<Value>) {
    let signature = Value::signature_of(&values).unwrap();

    for endianness in [Endianness::LITTLE, Endianness::BIG] {
        let mut buf = BodyBuf::with_endianness(endianness);
        buf.store_all(&values).unwrap();

        let decoded = Body::new(buf.as_bytes(), endianness, buf.fds())
            .load(&signature)
            .unwrap();

        assert_eq!(decoded, values, "{signature} ({endianness:?})");
    }
}

#[test]
fn primitives() {
    round_trip(vec![
        Value::Byte(0xfe),
        Value::Bool(true),
        Value::I16(-2),
        Value::U16(0xbeef),
        Value::I32(-70_000),
        Value::U32(3_000_000_000),
        Value::I64(i64::MIN),
        Value::U64(u64::MAX),
        Value::F64(3.5),
        Value::from("hello"),
    ]);
}

#[test]
fn alignment_of_mixed_body() {
    // s then u then g: the string takes 4 (length) + 6 + 1 (nul), the u32
    // is padded to offset 12, and the signature length byte follows
    // unpadded at 16.
    let values = vec![
        Value::from(":1.391"),
        Value::U32(2),
        Value::Sig(SignatureBuf::new("v").unwrap()),
    ];

    let mut buf = BodyBuf::new();
    buf.store_all(&values).unwrap();

    assert_eq!(buf.len(), 19);
    assert_eq!(&buf.as_bytes()[4..10], b":1.391");
    assert_eq!(buf.as_bytes()[16], 1);
    assert_eq!(buf.as_bytes()[17], b'v');

    round_trip(values);
}

#[test]
fn containers() {
    round_trip(vec![
        Value::array("s", vec![Value::from("a"), Value::from("bc")]).unwrap(),
        Value::Struct(vec![Value::Byte(1), Value::from("x"), Value::I64(-1)]),
        Value::dict(
            "s",
            "v",
            vec![
                (Value::from("k"), Value::variant(Value::U32(1))),
                (Value::from("l"), Value::variant(Value::from("v"))),
            ],
        )
        .unwrap(),
        Value::variant(Value::Struct(vec![Value::Bool(false), Value::U16(7)])),
    ]);
}

#[test]
fn empty_array_of_structs_in_variant() {
    // The array is empty so only its length prefix and the padding up to
    // the 8-byte element alignment are written.
    let value = Value::variant(Value::array("(sa(iiay)ss)", vec![]).unwrap());

    let mut buf = BodyBuf::new();
    buf.store(&value).unwrap();

    let decoded = Body::new(buf.as_bytes(), buf.endianness(), &[])
        .load(Signature::new("v").unwrap())
        .unwrap();

    let Value::Variant(inner) = &decoded[0] else {
        panic!("expected variant");
    };

    let Value::Array(element, values) = &**inner else {
        panic!("expected array");
    };

    assert_eq!(element.as_str(), "(sa(iiay)ss)");
    assert!(values.is_empty());

    round_trip(vec![value]);
}

#[test]
fn nested_empty_containers() {
    round_trip(vec![
        Value::array("ay", vec![]).unwrap(),
        Value::array("a{sv}", vec![]).unwrap(),
        Value::dict("u", "as", vec![]).unwrap(),
    ]);
}

#[test]
fn array_length_excludes_element_padding() {
    // An array of u64 at offset 0: 4 bytes of length, 4 bytes of padding,
    // then the elements. The length must only cover the elements.
    let value = Value::array("t", vec![Value::U64(1), Value::U64(2)]).unwrap();

    let mut buf = BodyBuf::new();
    buf.store(&value).unwrap();

    assert_eq!(buf.len(), 24);
    assert_eq!(&buf.as_bytes()[..4], &16u32.to_le_bytes());

    round_trip(vec![value]);
}

#[test]
fn boolean_out_of_range() {
    let mut buf = BodyBuf::new();
    buf.store_u32(2);

    let err = Body::new(buf.as_bytes(), buf.endianness(), &[])
        .load(Signature::new("b").unwrap())
        .unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::InvalidBoolean(2)));
}

#[test]
fn string_with_embedded_nul() {
    let mut buf = BodyBuf::new();
    let err = buf.store(&Value::Str("a\0b".into())).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::StringContainsNull));

    // Hand-encode the same on the wire.
    let mut buf = BodyBuf::new();
    buf.store_u32(3);
    buf.extend_from_slice(b"a\0b\0");

    let err = Body::new(buf.as_bytes(), buf.endianness(), &[])
        .load(Signature::new("s").unwrap())
        .unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::StringContainsNull));
}

#[test]
fn invalid_utf8_rejected() {
    let mut buf = BodyBuf::new();
    buf.store_u32(2);
    buf.extend_from_slice(&[0xff, 0xfe, 0]);

    let err = Body::new(buf.as_bytes(), buf.endianness(), &[])
        .load(Signature::new("s").unwrap())
        .unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::Utf8(..)));
}

#[test]
fn variant_with_two_types_rejected() {
    let mut buf = BodyBuf::new();
    buf.extend_from_slice(b"\x02uu\0");
    buf.store_u32(1);
    buf.store_u32(2);

    let err = Body::new(buf.as_bytes(), buf.endianness(), &[])
        .load(Signature::new("v").unwrap())
        .unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::InvalidVariantSignature));
}

#[test]
fn nonzero_padding_rejected() {
    let mut buf = BodyBuf::new();
    buf.store(&Value::Byte(1)).unwrap();
    buf.extend_from_slice(&[0xaa, 0, 0]);
    buf.store_u32(7);

    // Rebuild the buffer with the corrupted padding byte in place.
    let err = Body::new(buf.as_bytes(), buf.endianness(), &[])
        .load(Signature::new("yu").unwrap())
        .unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::NonZeroPadding));
}

#[test]
fn depth_boundary_on_decode() {
    // 64 nested arrays round trip.
    let mut value = Value::Byte(1);

    for _ in 0..64 {
        let element = value.signature().unwrap();
        value = Value::Array(element, vec![value]);
    }

    round_trip(vec![value]);
}

#[test]
fn encode_beyond_depth_rejected() {
    let mut value = Value::Byte(1);

    for _ in 0..65 {
        let element = match value.signature() {
            Ok(element) => element,
            // Signature derivation already rejects the nesting; synthesize
            // the element type instead to reach the encoder check.
            Err(..) => break,
        };

        value = Value::Array(element, vec![value]);
    }

    let mut buf = BodyBuf::new();
    assert!(buf.store(&value).is_err());
}

#[test]
fn dict_depth_counts_double() {
    // Every dict level costs an array and an entry; 32 nested levels sit
    // exactly at the limit and round trip.
    let mut value = Value::Byte(7);

    for _ in 0..32 {
        let element = value.signature().unwrap();
        value = Value::Dict(
            SignatureBuf::new("y").unwrap(),
            element,
            vec![(Value::Byte(1), value)],
        );
    }

    round_trip(vec![value]);
}

#[test]
fn dict_beyond_depth_rejected() {
    let mut value = Value::dict("y", "y", vec![(Value::Byte(1), Value::Byte(2))]).unwrap();

    for _ in 0..62 {
        let element = value.signature().unwrap();
        value = Value::Array(element, vec![value]);
    }

    // 62 arrays plus the dict's two is exactly the limit.
    round_trip(vec![value.clone()]);

    // One more array pushes the entry to 65, even though only 64
    // containers are open before it.
    let element = value.signature().unwrap();
    let value = Value::Array(element, vec![value]);

    let mut buf = BodyBuf::new();
    let err = buf.store(&value).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::DepthExceeded));
}

#[test]
fn mismatched_array_element_rejected() {
    let value = Value::Array(
        SignatureBuf::new("s").unwrap(),
        vec![Value::from("ok"), Value::U32(1)],
    );

    let mut buf = BodyBuf::new();
    let err = buf.store(&value).unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::ValueSignatureMismatch { .. }
    ));
}

#[test]
fn trailing_bytes_rejected() {
    let mut buf = BodyBuf::new();
    buf.store(&Value::U32(1)).unwrap();
    buf.store(&Value::U32(2)).unwrap();

    let err = Body::new(buf.as_bytes(), buf.endianness(), &[])
        .load(Signature::new("u").unwrap())
        .unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::TrailingBodyBytes));
}

#[test]
fn big_endian_layout() {
    let mut buf = BodyBuf::with_endianness(Endianness::BIG);
    buf.store(&Value::U32(1)).unwrap();
    assert_eq!(buf.as_bytes(), &[0, 0, 0, 1]);
}
