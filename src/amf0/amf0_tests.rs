use std::sync::Arc;

use bytes::Bytes;

use crate::{
    AmfClass, AmfCodec, AmfVersion, CodecConfig, TypeRegistry, decode_amf0, encode_amf0,
    error::{DecodingError, EncodingError, ReferenceTable, ValueError},
    value::{Object, Traits, Value, Vector},
};

fn roundtrip(value: &Value) -> Value {
    let encoded = encode_amf0(value).unwrap();
    let (decoded, consumed) = decode_amf0(&encoded).unwrap();
    assert_eq!(consumed, encoded.len());
    decoded
}

struct Song {
    title: String,
    plays: f64,
}

impl AmfClass for Song {
    const CLASS_NAME: &'static str = "com.example.Song";
    const MEMBERS: &'static [&'static str] = &["title", "plays"];

    fn to_object(&self) -> Result<Object, ValueError> {
        Object::new(
            Self::traits(),
            vec![
                ("title".to_string(), Value::from(self.title.as_str())),
                ("plays".to_string(), Value::Double(self.plays)),
            ],
        )
    }

    fn from_object(object: &Object) -> Result<Self, ValueError> {
        let title = object
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| ValueError::InvalidMember("title".to_string()))?;
        let plays = object
            .get("plays")
            .and_then(Value::as_f64)
            .ok_or_else(|| ValueError::InvalidMember("plays".to_string()))?;
        Ok(Self {
            title: title.to_string(),
            plays,
        })
    }
}

#[test]
fn test_boolean_and_null() {
    assert_eq!(
        encode_amf0(&Value::Boolean(true)).unwrap(),
        Bytes::from_static(&[0x01, 0x01])
    );
    assert_eq!(encode_amf0(&Value::Null).unwrap(), Bytes::from_static(&[0x05]));
}

#[test]
fn test_number() {
    assert_eq!(roundtrip(&Value::Double(21.37)), Value::Double(21.37));
    // AMF0 has a single number type.
    assert_eq!(roundtrip(&Value::Integer(-2137)), Value::Double(-2137.0));
}

#[test]
fn test_string_length_boundary() {
    let short = "a".repeat(65535);
    let encoded = encode_amf0(&Value::from(short.as_str())).unwrap();
    assert_eq!(&encoded[..3], &[0x02, 0xFF, 0xFF]);
    assert_eq!(encoded.len(), 3 + 65535);
    assert_eq!(roundtrip(&Value::from(short.as_str())), Value::from(short));

    let long = "a".repeat(65536);
    let encoded = encode_amf0(&Value::from(long.as_str())).unwrap();
    assert_eq!(&encoded[..5], &[0x0C, 0x00, 0x01, 0x00, 0x00]);
    assert_eq!(roundtrip(&Value::from(long.as_str())), Value::from(long));
}

#[test]
fn test_multibyte_string_length_is_in_bytes() {
    let value = Value::from("kremówki");
    let encoded = encode_amf0(&value).unwrap();
    assert_eq!(&encoded[..3], &[0x02, 0x00, 0x09]);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn test_object() {
    let object = Value::anonymous_object(vec![
        ("app".to_string(), Value::from("live")),
        ("tcUrl".to_string(), Value::from("rtmp://localhost/live")),
        ("fpad".to_string(), Value::Boolean(false)),
        ("audioCodecs".to_string(), Value::Double(3575.0)),
    ])
    .unwrap();
    assert_eq!(roundtrip(&object), object);
}

#[test]
fn test_date() {
    let date = Value::date(1_234_567_890_123.0);
    let encoded = encode_amf0(&date).unwrap();
    assert_eq!(encoded.len(), 11);
    assert_eq!(&encoded[9..], &[0x00, 0x00]);
    assert_eq!(roundtrip(&date), date);
}

#[test]
fn test_ecma_array() {
    let array = Value::associative_array(
        vec![Value::from("first"), Value::from("second")],
        vec![("duration".to_string(), Value::Double(0.0))],
    )
    .unwrap();
    assert_eq!(roundtrip(&array), array);

    let only_keys = Value::associative_array(
        vec![],
        vec![
            ("width".to_string(), Value::Double(1280.0)),
            ("height".to_string(), Value::Double(720.0)),
        ],
    )
    .unwrap();
    assert_eq!(roundtrip(&only_keys), only_keys);
}

#[test]
fn test_ecma_array_index_keys_after_dense_part() {
    let continued = Value::associative_array(
        vec![Value::from("a"), Value::from("b")],
        vec![("2".to_string(), Value::from("c"))],
    )
    .unwrap();
    assert_eq!(roundtrip(&continued), continued);
    assert_eq!(
        continued,
        Value::associative_array(
            vec![Value::from("a"), Value::from("b"), Value::from("c")],
            vec![]
        )
        .unwrap()
    );

    let first_index = Value::associative_array(vec![], vec![("0".to_string(), Value::from("x"))])
        .unwrap();
    assert_eq!(roundtrip(&first_index), first_index);
}

#[test]
fn test_xml_document() {
    let xml = Value::xml_document("<root attr=\"1\"/>");
    assert_eq!(roundtrip(&xml), xml);
    // E4X XML has no AMF0 form of its own.
    assert_eq!(roundtrip(&Value::xml("<a/>")), Value::xml_document("<a/>"));
}

#[test]
fn test_references() {
    let shared = Value::anonymous_object(vec![("k".to_string(), Value::Null)]).unwrap();
    let with_shared = Value::array(vec![shared.clone(), shared.clone(), shared]);
    let with_copies = Value::array(
        (0..3)
            .map(|_| Value::anonymous_object(vec![("k".to_string(), Value::Null)]).unwrap())
            .collect(),
    );

    let shared_bytes = encode_amf0(&with_shared).unwrap();
    let copies_bytes = encode_amf0(&with_copies).unwrap();
    assert!(shared_bytes.len() < copies_bytes.len());

    let (decoded, _) = decode_amf0(&shared_bytes).unwrap();
    let items = decoded.as_array().unwrap();
    assert!(Value::same_instance(&items[0], &items[1]));
    assert!(Value::same_instance(&items[1], &items[2]));
    assert_eq!(encode_amf0(&decoded).unwrap(), shared_bytes);
}

#[test]
fn test_invalid_reference() {
    assert_eq!(
        decode_amf0(&[0x07, 0x00, 0x00]),
        Err(DecodingError::InvalidReference {
            table: ReferenceTable::Amf0Objects,
            index: 0,
            len: 0
        })
    );
}

#[test]
fn test_unsupported_markers() {
    for marker in [0x04, 0x0D, 0x0E] {
        assert_eq!(
            decode_amf0(&[marker]),
            Err(DecodingError::UnsupportedType(marker))
        );
    }
    assert_eq!(decode_amf0(&[0x09]), Err(DecodingError::InvalidMarker(0x09)));
}

#[test]
fn test_truncated_input() {
    let value = Value::anonymous_object(vec![
        ("name".to_string(), Value::from("kremówki")),
        ("list".to_string(), Value::array(vec![Value::Double(1.0)])),
        ("when".to_string(), Value::date(0.0)),
    ])
    .unwrap();
    let encoded = encode_amf0(&value).unwrap();

    for len in 0..encoded.len() {
        assert_eq!(
            decode_amf0(&encoded[..len]),
            Err(DecodingError::UnexpectedEndOfInput),
            "prefix of {len} bytes"
        );
    }
}

#[test]
fn test_typed_object_without_registry() {
    let song = Song {
        title: "Bajm".to_string(),
        plays: 12.0,
    };
    let value = Value::object(song.to_object().unwrap());
    let encoded = encode_amf0(&value).unwrap();
    assert_eq!(encoded[0], 0x10);

    // Unregistered classes come back with their members as dynamic members.
    let (decoded, _) = decode_amf0(&encoded).unwrap();
    let object = decoded.as_object().unwrap();
    assert_eq!(object.class_name(), "com.example.Song");
    assert!(object.traits().dynamic);
    assert!(object.sealed_members().is_empty());

    let song = Song::from_value(&decoded).unwrap();
    assert_eq!(song.title, "Bajm");
    assert_eq!(song.plays, 12.0);
}

#[test]
fn test_typed_object_with_registry() {
    let mut codec = AmfCodec::default();
    codec.register_class(
        Song::CLASS_NAME,
        crate::ClassDefinition::Sealed(Arc::new(Song::traits())),
    );

    // Members arrive out of order, one missing sealed member, one undeclared extra.
    let wire = Value::object(
        Object::new(
            Traits::dynamic(Song::CLASS_NAME, &[]),
            vec![
                ("plays".to_string(), Value::Double(3.0)),
                ("extra".to_string(), Value::Boolean(true)),
            ],
        )
        .unwrap(),
    );
    let encoded = codec.encode(&wire, AmfVersion::Amf0).unwrap();
    let decoded = codec.decode(&encoded, AmfVersion::Amf0).unwrap();

    let object = decoded.as_object().unwrap();
    assert_eq!(object.traits().as_ref(), &Song::traits());
    assert_eq!(
        object.members(),
        &[
            ("title".to_string(), Value::Undefined),
            ("plays".to_string(), Value::Double(3.0)),
        ]
    );

    let song = Value::object(
        Song {
            title: "Lato".to_string(),
            plays: 1.0,
        }
        .to_object()
        .unwrap(),
    );
    let encoded = codec.encode(&song, AmfVersion::Amf0).unwrap();
    assert_eq!(codec.decode(&encoded, AmfVersion::Amf0).unwrap(), song);
}

#[test]
fn test_strict_types() {
    let strict = AmfCodec::new(
        CodecConfig {
            strict_types: true,
            ..Default::default()
        },
        TypeRegistry::default(),
    );
    let song = Value::object(
        Song {
            title: "Lato".to_string(),
            plays: 1.0,
        }
        .to_object()
        .unwrap(),
    );

    assert_eq!(
        strict.encode(&song, AmfVersion::Amf0),
        Err(EncodingError::UnknownType(Song::CLASS_NAME.to_string()))
    );
    let encoded = encode_amf0(&song).unwrap();
    assert_eq!(
        strict.decode(&encoded, AmfVersion::Amf0),
        Err(DecodingError::UnknownType(Song::CLASS_NAME.to_string()))
    );
}

#[test]
fn test_avmplus_switch() {
    let vector = Value::VectorInt(Arc::new(Vector {
        fixed_length: false,
        items: vec![7],
    }));
    let bytes = Value::byte_array(vec![0xCA, 0xFE]);
    let value = Value::array(vec![bytes.clone(), vector.clone(), bytes]);

    let encoded = encode_amf0(&value).unwrap();
    let expected = Bytes::from_static(&[
        0x0A, 0x00, 0x00, 0x00, 0x03, // strict array of three
        0x11, 0x0C, 0x05, 0xCA, 0xFE, // AMF3 byte array, object index 0
        0x11, 0x0D, 0x03, 0x00, 0x00, 0x00, 0x00, 0x07, // AMF3 vector, object index 1
        0x11, 0x0C, 0x00, // AMF3 reference to the byte array
    ]);
    assert_eq!(encoded, expected);

    let (decoded, _) = decode_amf0(&encoded).unwrap();
    assert_eq!(decoded, value);
    let items = decoded.as_array().unwrap();
    assert!(Value::same_instance(&items[0], &items[2]));
}

#[test]
fn test_recursion_limit() {
    let mut nested = Value::Null;
    for _ in 0..300 {
        nested = Value::array(vec![nested]);
    }
    assert_eq!(
        encode_amf0(&nested),
        Err(EncodingError::RecursionLimitExceeded(256))
    );

    let mut buf = vec![];
    for _ in 0..300 {
        buf.extend_from_slice(&[0x0A, 0x00, 0x00, 0x00, 0x01]);
    }
    buf.push(0x05);
    assert_eq!(
        decode_amf0(&buf),
        Err(DecodingError::RecursionLimitExceeded(256))
    );
}

#[test]
fn test_recursion_limit_counts_avmplus_switch() {
    let codec_with_depth = |max_depth| {
        AmfCodec::new(
            CodecConfig {
                max_depth,
                ..Default::default()
            },
            TypeRegistry::default(),
        )
    };
    // Strict array, AMF0 slot holding the AVM+ marker, AMF3 vector.
    let value = Value::array(vec![Value::VectorInt(Arc::new(Vector {
        fixed_length: false,
        items: vec![1],
    }))]);

    let codec = codec_with_depth(3);
    let encoded = codec.encode(&value, AmfVersion::Amf0).unwrap();
    assert_eq!(codec.decode(&encoded, AmfVersion::Amf0).unwrap(), value);

    let codec = codec_with_depth(2);
    assert_eq!(
        codec.encode(&value, AmfVersion::Amf0),
        Err(EncodingError::RecursionLimitExceeded(2))
    );
    assert_eq!(
        codec.decode(&encoded, AmfVersion::Amf0),
        Err(DecodingError::RecursionLimitExceeded(2))
    );
}

#[test]
fn test_avmplus_decoding() {
    // AMF3 integer and string written behind the AVM+ marker.
    assert_eq!(
        decode_amf0(&[0x11, 0x04, 0x7F]).unwrap(),
        (Value::Integer(127), 3)
    );
    assert_eq!(
        decode_amf0(&[0x11, 0x06, 0x05, b'o', b'k']).unwrap(),
        (Value::from("ok"), 5)
    );
}

#[test]
fn test_trailing_bytes_are_left() {
    let (value, consumed) = decode_amf0(&[0x05, 0x01, 0x01]).unwrap();
    assert_eq!(value, Value::Null);
    assert_eq!(consumed, 1);
}
