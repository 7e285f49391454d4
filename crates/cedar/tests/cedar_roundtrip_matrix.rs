use cedar_codec::{
    decode, decode_with, encode, encode_with, CedarDecoder, CedarEncoder, CodecOptions, DecodeErrorKind,
    EncodeErrorKind, Field, SchemaError, TypeDescriptor as T, Value,
};
use serde_json::json;

fn user_type() -> T {
    T::record([
        Field::new("id", T::Int32),
        Field::new("login", T::String),
        Field::new("avatar", T::nullable(T::Bytes)),
        Field::new("score", T::Float64),
        Field::new("admin", T::Boolean),
        Field::new("role", T::variant(["OWNER", "MEMBER", "GUEST"])),
        Field::new("digest", T::fixed(4)),
        Field::new("nothing", T::Null),
        Field::new("bio", T::String).omittable(),
        Field::new("labels", T::array(T::dedupe("label", T::String))).omittable(),
        Field::new(
            "friends",
            T::array(T::record([
                Field::new("login", T::String),
                Field::new("since", T::nullable(T::Int32)),
            ])),
        ),
    ])
}

fn user(id: i32, login: &str) -> Value {
    Value::record([
        ("id", Value::Int(id)),
        ("login", Value::from(login)),
        ("avatar", Value::Null),
        ("score", Value::Float(-12.5)),
        ("admin", Value::Bool(false)),
        ("role", Value::from("MEMBER")),
        ("digest", Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef])),
        ("nothing", Value::Null),
        ("bio", Value::Absent),
        (
            "labels",
            Value::Array(vec!["bug".into(), "triage".into(), "bug".into()]),
        ),
        (
            "friends",
            Value::Array(vec![
                Value::record([("login", Value::from("zed")), ("since", Value::Int(2019))]),
                Value::record([("login", Value::from(login)), ("since", Value::Null)]),
            ]),
        ),
    ])
}

#[test]
fn cedar_roundtrip_matrix() {
    let ty = user_type();
    let cases = vec![
        user(1, "ada"),
        user(i32::MIN, ""),
        user(i32::MAX, "日本語"),
        {
            let mut v = user(7, "grace");
            if let Value::Record(entries) = &mut v {
                entries.insert("avatar".into(), Value::Bytes(vec![0, 1, 2]));
                entries.insert("bio".into(), Value::from("compilers"));
                entries.insert("labels".into(), Value::Absent);
                entries.insert("score".into(), Value::Float(f64::MAX));
                entries.insert("friends".into(), Value::Array(vec![]));
            }
            v
        },
    ];
    for value in cases {
        let bytes = encode(&value, &ty).unwrap();
        assert_eq!(decode(&bytes, &ty).unwrap(), value, "bytes: {bytes:02x?}");
    }
}

#[test]
fn cedar_roundtrip_list_of_users_shares_pools() {
    let ty = T::array(user_type());
    let value = Value::Array((0..50).map(|i| user(i, "same")).collect());
    let bytes = encode(&value, &ty).unwrap();
    assert_eq!(decode(&bytes, &ty).unwrap(), value);
    let count = |needle: &[u8]| bytes.windows(needle.len()).filter(|w| *w == needle).count();
    assert_eq!(count(b"same"), 1);
    assert_eq!(count(b"triage"), 1);
    assert_eq!(count(b"MEMBER"), 1);
}

#[test]
fn cedar_repeated_string_costs_one_label() {
    let ty = T::array(T::dedupe("s", T::String));
    let value = Value::Array(vec!["hello".into(); 100]);
    let bytes = encode(&value, &ty).unwrap();
    // header, pool (label + 5), main label (2) + count (2) + new (1) + 99 backreferences
    assert_eq!(bytes.len(), 1 + 6 + 2 + 2 + 1 + 99);
    assert_eq!(decode(&bytes, &ty).unwrap(), value);
}

#[test]
fn cedar_roundtrip_from_json() {
    let ty = T::record([
        Field::new("title", T::String),
        Field::new("count", T::Int32),
        Field::new("ratio", T::nullable(T::Float64)),
        Field::new("flags", T::array(T::Boolean)),
    ]);
    let source = json!({"title": "t", "count": 3, "ratio": 0.25, "flags": [true, false]});
    let value = Value::from(source.clone());
    let bytes = encode(&value, &ty).unwrap();
    let back: serde_json::Value = decode(&bytes, &ty).unwrap().into();
    assert_eq!(back, source);
}

#[test]
fn cedar_options_matrix() {
    let options = CodecOptions {
        initial_capacity: 1,
        pool_capacity: 1,
        ..CodecOptions::default()
    };
    let ty = user_type();
    let value = user(3, "small buffers");
    let bytes = encode_with(&value, &ty, &options).unwrap();
    assert_eq!(bytes, encode(&value, &ty).unwrap());
    assert_eq!(decode_with(&bytes, &ty, &options).unwrap(), value);

    let shallow = CodecOptions {
        max_depth: 1,
        ..CodecOptions::default()
    };
    let err = CedarEncoder::with_options(shallow.clone())
        .encode(&value, &ty)
        .unwrap_err();
    assert_eq!(err.reason, EncodeErrorKind::Schema(SchemaError::DepthLimitExceeded(1)));
    let err = CedarDecoder::with_options(shallow).decode(&bytes, &ty).unwrap_err();
    assert_eq!(err.reason, DecodeErrorKind::Schema(SchemaError::DepthLimitExceeded(1)));
    assert_eq!(err.offset, 0);
}

#[test]
fn cedar_limits_matrix() {
    let ty = T::array(T::array(T::Null));
    let options = CodecOptions {
        max_array_len: 3,
        ..CodecOptions::default()
    };
    let value = Value::Array(vec![Value::Array(vec![Value::Null; 4])]);
    let err = encode_with(&value, &ty, &options).unwrap_err();
    assert_eq!(err.reason, EncodeErrorKind::ArrayTooLong { len: 4, max: 3 });
    assert_eq!(err.path.to_string(), "$[0]");
    let bytes = encode(&value, &ty).unwrap();
    assert_eq!(decode(&bytes, &ty).unwrap(), value);
    assert!(decode_with(&bytes, &ty, &options).is_err());

    // four inner arrays claiming 2^22 nulls each, in 19 bytes
    let mut data = vec![0x00, 0x22, 0x08];
    for _ in 0..4 {
        data.extend_from_slice(&[0x80, 0x80, 0x80, 0x04]);
    }
    assert_eq!(data.len(), 19);
    let err = decode(&data, &ty).unwrap_err();
    assert_eq!(err.reason, DecodeErrorKind::LengthOutOfRange(1 << 22));
    let wide = CodecOptions {
        max_array_len: 1 << 22,
        ..CodecOptions::default()
    };
    let err = decode_with(&data, &ty, &wide).unwrap_err();
    assert!(matches!(err.reason, DecodeErrorKind::LengthOutOfRange(_)));
}

#[test]
fn cedar_type_descriptor_json_roundtrip() {
    let ty = user_type();
    let json = serde_json::to_string(&ty).unwrap();
    let back: T = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ty);

    let parsed: T = serde_json::from_value(json!({
        "type": "RECORD",
        "fields": [
            {"name": "a", "type": {"type": "DEDUPE", "key": "k", "of": {"type": "STRING"}}},
            {"name": "b", "type": {"type": "INT32"}, "omittable": true}
        ]
    }))
    .unwrap();
    assert_eq!(
        parsed,
        T::record([
            Field::new("a", T::dedupe("k", T::String)),
            Field::new("b", T::Int32).omittable(),
        ])
    );
}
