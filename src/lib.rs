//! Encoder and decoder for AMF0 and AMF3, the Action Message Format used by Flash
//! remoting and RTMP command messages.
//!
//! ```
//! use amf::{AmfVersion, Value};
//!
//! let value = Value::anonymous_object(vec![("app".to_string(), Value::from("live"))]).unwrap();
//! let encoded = amf::encode(&value, AmfVersion::Amf0).unwrap();
//! assert_eq!(amf::decode(&encoded, AmfVersion::Amf0).unwrap(), value);
//! ```

use bytes::Bytes;

mod amf0;
mod amf3;
mod codec;
mod config;
mod error;
mod reference;
mod registry;
mod session;
mod value;

pub use amf3::{DataInput, DataOutput};
pub use codec::{AmfCodec, AmfVersion};
pub use config::{CodecConfig, DEFAULT_MAX_DEPTH};
pub use error::{DecodingError, EncodingError, ReferenceTable, ValueError};
pub use registry::{
    ARRAY_COLLECTION, AmfClass, ClassDefinition, ExternalizableCodec, OBJECT_PROXY, TypeRegistry,
};
pub use value::{
    AssociativeArray, Date, Dictionary, Object, ObjectVector, Traits, Value, ValueKind, Vector,
};

/// Encodes `value` with the default configuration and an empty registry.
pub fn encode(value: &Value, version: AmfVersion) -> Result<Bytes, EncodingError> {
    AmfCodec::default().encode(value, version)
}

/// Decodes the first value of `buf` with the default configuration and an empty
/// registry. Bytes after the value are left unread.
pub fn decode(buf: &[u8], version: AmfVersion) -> Result<Value, DecodingError> {
    AmfCodec::default().decode(buf, version)
}

pub fn encode_amf0(value: &Value) -> Result<Bytes, EncodingError> {
    encode(value, AmfVersion::Amf0)
}

/// Returns the first value and the number of bytes it took.
pub fn decode_amf0(buf: &[u8]) -> Result<(Value, usize), DecodingError> {
    AmfCodec::default().decode_prefix(buf, AmfVersion::Amf0)
}

pub fn encode_amf3(value: &Value) -> Result<Bytes, EncodingError> {
    encode(value, AmfVersion::Amf3)
}

/// Returns the first value and the number of bytes it took.
pub fn decode_amf3(buf: &[u8]) -> Result<(Value, usize), DecodingError> {
    AmfCodec::default().decode_prefix(buf, AmfVersion::Amf3)
}
