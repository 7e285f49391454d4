use cedar_codec::label::{self, Label};
use cedar_codec::{decode, encode, Field, TypeDescriptor as T, Value};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn item_type() -> T {
    T::record([
        Field::new("id", T::Int32),
        Field::new("kind", T::dedupe("kind", T::String)),
        Field::new("note", T::nullable(T::String)).omittable(),
        Field::new("weight", T::Float64).omittable(),
        Field::new("done", T::nullable(T::Boolean)),
        Field::new("blob", T::nullable(T::Bytes)),
    ])
}

fn arb_item() -> impl Strategy<Value = Value> {
    (
        any::<i32>(),
        "[a-c]{0,3}",
        prop_oneof![
            Just(Value::Absent),
            Just(Value::Null),
            "[a-z ]{0,12}".prop_map(Value::Str)
        ],
        prop_oneof![Just(Value::Absent), (-1e12f64..1e12).prop_map(Value::Float)],
        proptest::option::of(any::<bool>()).prop_map(Value::from),
        proptest::option::of(proptest::collection::vec(any::<u8>(), 0..8)).prop_map(Value::from),
    )
        .prop_map(|(id, kind, note, weight, done, blob)| {
            Value::record([
                ("id", Value::Int(id)),
                ("kind", Value::Str(kind)),
                ("note", note),
                ("weight", weight),
                ("done", done),
                ("blob", blob),
            ])
        })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn label_roundtrip(n in any::<i64>()) {
        let bytes = label::encode(Label::new(n));
        prop_assert_eq!(bytes.len(), label::encoded_len(Label::new(n)));
        prop_assert!(bytes.len() <= label::MAX_VARINT_LEN);
        prop_assert_eq!(label::decode(&bytes), Ok(Label::new(n)));
    }

    #[test]
    fn truncated_label_is_malformed(n in any::<i64>()) {
        let bytes = label::encode(Label::new(n));
        if bytes.len() > 1 {
            prop_assert_eq!(
                label::decode(&bytes[..bytes.len() - 1]),
                Err(cedar_codec::DecodeErrorKind::MalformedVarint)
            );
        }
    }

    #[test]
    fn deduplicated_strings_roundtrip(strings in proptest::collection::vec("[a-d]{0,3}", 0..40)) {
        let ty = T::array(T::dedupe("s", T::String));
        let value = Value::Array(strings.iter().map(|s| Value::from(s.as_str())).collect());
        let bytes = encode(&value, &ty).unwrap();
        prop_assert_eq!(decode(&bytes, &ty).unwrap(), value);

        // each distinct string is stored once, in first-encounter order
        if !strings.is_empty() {
            let mut seen = Vec::new();
            for s in &strings {
                if !seen.contains(s) {
                    seen.push(s.clone());
                }
            }
            let pool = seen.concat().into_bytes();
            let mut block = label::encode(Label::length(pool.len()));
            block.extend_from_slice(&pool);
            prop_assert!(bytes[1..].starts_with(&block));
        }
    }

    #[test]
    fn records_roundtrip(items in proptest::collection::vec(arb_item(), 0..12)) {
        let ty = T::array(item_type());
        let value = Value::Array(items);
        let bytes = encode(&value, &ty).unwrap();
        prop_assert_eq!(decode(&bytes, &ty).unwrap(), value);
    }

    #[test]
    fn arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = decode(&data, &T::array(item_type()));
        let _ = decode(&data, &T::nullable(T::record([Field::new("x", T::nullable(T::Int32))])));
    }
}
