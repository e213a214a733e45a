use crate::{ObjectPathBuf, SignatureBuf, Value};

#[test]
fn signatures_of_values() {
    assert_eq!(Value::Byte(1).signature().unwrap().as_str(), "y");
    assert_eq!(Value::from("x").signature().unwrap().as_str(), "s");

    let path = Value::Path(ObjectPathBuf::new("/a").unwrap());
    assert_eq!(path.signature().unwrap().as_str(), "o");

    let value = Value::Struct(vec![
        Value::from("name"),
        Value::array("i", vec![Value::I32(1), Value::I32(2)]).unwrap(),
    ]);
    assert_eq!(value.signature().unwrap().as_str(), "(sai)");

    let dict = Value::dict("s", "v", vec![]).unwrap();
    assert_eq!(dict.signature().unwrap().as_str(), "a{sv}");

    let variant = Value::variant(Value::U32(2));
    assert_eq!(variant.signature().unwrap().as_str(), "v");
}

#[test]
fn signature_of_sequence() {
    let body = [
        Value::from(":1.391"),
        Value::U32(2),
        Value::Sig(SignatureBuf::new("v").unwrap()),
    ];
    assert_eq!(Value::signature_of(&body).unwrap().as_str(), "sug");
    assert!(Value::signature_of(&[]).unwrap().is_empty());
}

#[test]
fn empty_struct_rejected() {
    assert!(Value::Struct(vec![]).signature().is_err());
}

#[test]
fn runaway_nesting_rejected() {
    let mut value = Value::array("y", vec![]).unwrap();

    for _ in 0..64 {
        let element = value.signature().unwrap();
        value = Value::Array(element, vec![value]);
    }

    assert!(value.signature().is_err());
}
