use bytes::{BufMut, Bytes};
use tracing::{debug, warn};

use crate::{
    amf0::*,
    amf3::Amf3EncoderState,
    config::CodecConfig,
    error::{EncodingError, ValueError},
    reference::{Amf3EncodeReferences, InstanceTable},
    registry::TypeRegistry,
    session::EncodeSession,
    value::{AssociativeArray, Date, Object, Value},
};

pub(crate) struct Amf0EncoderState<'a> {
    session: EncodeSession<'a>,
    // Only Object, ECMA Array, Strict Array and Typed Object take reference indices
    // (https://rtmp.veriskope.com/pdf/amf0-file-format-specification.pdf).
    complexes: InstanceTable,
    amf3_refs: Amf3EncodeReferences,
}

impl<'a> Amf0EncoderState<'a> {
    pub(crate) fn new(config: &'a CodecConfig, registry: &'a TypeRegistry) -> Self {
        Self {
            session: EncodeSession::new(config, registry),
            complexes: InstanceTable::new(),
            amf3_refs: Amf3EncodeReferences::default(),
        }
    }

    pub(crate) fn finish(self) -> Bytes {
        self.session.finish()
    }

    pub(crate) fn put_value(&mut self, value: &Value) -> Result<(), EncodingError> {
        self.session.enter()?;
        let result = self.put_value_unguarded(value);
        self.session.leave();
        result
    }

    fn put_value_unguarded(&mut self, value: &Value) -> Result<(), EncodingError> {
        match value {
            Value::Undefined => self.put_undefined(),
            Value::Null => self.put_null(),
            Value::Boolean(b) => self.put_bool(*b),
            Value::Integer(i) => self.put_number(f64::from(*i)),
            Value::Double(d) => self.put_number(*d),
            Value::String(s) => self.put_string(s)?,
            Value::Date(date) => self.put_date(date),
            Value::Array(items) => self.put_strict_array(value, items)?,
            Value::AssociativeArray(array) => self.put_ecma_array(value, array)?,
            Value::Object(object) if object.traits().externalizable => {
                self.put_avmplus_object(value)?
            }
            Value::Object(object) => self.put_object(value, object)?,
            Value::XmlDocument(xml) | Value::Xml(xml) => self.put_xml_document(xml)?,
            Value::ByteArray(_)
            | Value::VectorInt(_)
            | Value::VectorUInt(_)
            | Value::VectorDouble(_)
            | Value::VectorObject(_)
            | Value::Dictionary(_) => self.put_avmplus_object(value)?,
        };
        Ok(())
    }

    fn put_number(&mut self, n: f64) {
        self.session.buf.put_u8(NUMBER);
        self.session.buf.put_f64(n);
    }

    fn put_bool(&mut self, b: bool) {
        self.session.buf.put_u8(BOOLEAN);
        self.session.buf.put_u8(b.into());
    }

    fn put_null(&mut self) {
        self.session.buf.put_u8(NULL);
    }

    fn put_undefined(&mut self) {
        self.session.buf.put_u8(UNDEFINED);
    }

    /// Short strings up to 65535 bytes, long strings above.
    fn put_string(&mut self, s: &str) -> Result<(), EncodingError> {
        if s.len() <= u16::MAX as usize {
            self.session.buf.put_u8(STRING);
            return self.put_utf8(s);
        }
        if s.len() > u32::MAX as usize {
            return Err(EncodingError::StringTooLong {
                len: s.len(),
                max: u32::MAX as usize,
            });
        }
        self.session.buf.put_u8(LONG_STRING);
        self.session.buf.put_u32(s.len() as u32);
        self.session.buf.put_slice(s.as_bytes());
        Ok(())
    }

    /// UTF-8 with a u16 length and no marker, as used by keys and class names.
    fn put_utf8(&mut self, s: &str) -> Result<(), EncodingError> {
        if s.len() > u16::MAX as usize {
            return Err(EncodingError::StringTooLong {
                len: s.len(),
                max: u16::MAX as usize,
            });
        }
        self.session.buf.put_u16(s.len() as u16);
        self.session.buf.put_slice(s.as_bytes());
        Ok(())
    }

    fn put_date(&mut self, date: &Date) {
        self.session.buf.put_u8(DATE);
        self.session.buf.put_f64(date.millis);
        if let Some(offset) = date.timezone_offset.filter(|offset| *offset != 0) {
            warn!(offset, "Timezone offset is not zero, writing zero.");
        }
        self.session.buf.put_i16(0);
    }

    /// Writes a back-reference if this instance was written before. Otherwise the
    /// instance takes the next complex index and the caller writes it inline.
    fn put_reference(&mut self, value: &Value) -> bool {
        match self.complexes.get(value) {
            Some(idx) if idx <= u16::MAX as usize => {
                self.session.buf.put_u8(REFERENCE);
                self.session.buf.put_u16(idx as u16);
                return true;
            }
            Some(idx) => warn!(idx, "Reference index too large for AMF0, writing inline."),
            None => {}
        }
        self.complexes.insert(value);
        false
    }

    fn put_strict_array(&mut self, value: &Value, items: &[Value]) -> Result<(), EncodingError> {
        if self.put_reference(value) {
            return Ok(());
        }
        if items.len() > u32::MAX as usize {
            return Err(EncodingError::ArrayTooLong {
                len: items.len(),
                max: u32::MAX as usize,
            });
        }
        self.session.buf.put_u8(STRICT_ARRAY);
        self.session.buf.put_u32(items.len() as u32);
        for item in items {
            self.put_value(item)?;
        }
        Ok(())
    }

    /// Dense elements go first, keyed by their decimal index.
    fn put_ecma_array(
        &mut self,
        value: &Value,
        array: &AssociativeArray,
    ) -> Result<(), EncodingError> {
        if self.put_reference(value) {
            return Ok(());
        }
        if array.len() > u32::MAX as usize {
            return Err(EncodingError::ArrayTooLong {
                len: array.len(),
                max: u32::MAX as usize,
            });
        }
        self.session.buf.put_u8(ECMA_ARRAY);
        self.session.buf.put_u32(array.len() as u32);
        for (idx, item) in array.dense().iter().enumerate() {
            self.put_utf8(&idx.to_string())?;
            self.put_value(item)?;
        }
        self.put_pairs(array.entries())
    }

    fn put_object(&mut self, value: &Value, object: &Object) -> Result<(), EncodingError> {
        let class_name = object.class_name();
        if self.session.config.strict_types && !self.session.registry.is_known(class_name) {
            return Err(EncodingError::UnknownType(class_name.to_string()));
        }
        if self.put_reference(value) {
            return Ok(());
        }

        match class_name.is_empty() {
            true => self.session.buf.put_u8(OBJECT),
            false => {
                self.session.buf.put_u8(TYPED_OBJECT);
                self.put_utf8(class_name)?;
            }
        }
        self.put_pairs(object.members())
    }

    fn put_pairs(&mut self, pairs: &[(String, Value)]) -> Result<(), EncodingError> {
        for (key, value) in pairs {
            if key.is_empty() {
                return Err(ValueError::EmptyMemberName.into());
            }
            self.put_utf8(key)?;
            self.put_value(value)?;
        }
        self.session.buf.put_slice(&OBJECT_END_MARKER);
        Ok(())
    }

    fn put_xml_document(&mut self, xml: &str) -> Result<(), EncodingError> {
        if xml.len() > u32::MAX as usize {
            return Err(EncodingError::StringTooLong {
                len: xml.len(),
                max: u32::MAX as usize,
            });
        }
        self.session.buf.put_u8(XML_DOCUMENT);
        self.session.buf.put_u32(xml.len() as u32);
        self.session.buf.put_slice(xml.as_bytes());
        Ok(())
    }

    /// Values AMF0 cannot express are written in AMF3 behind the AVM+ marker.
    fn put_avmplus_object(&mut self, value: &Value) -> Result<(), EncodingError> {
        debug!(kind = ?value.kind(), "Switching to AMF3.");
        self.session.buf.put_u8(AVMPLUS_OBJECT);
        let mut amf3_encoder = Amf3EncoderState::new(&mut self.session, &mut self.amf3_refs);
        amf3_encoder.put_value(value)
    }
}

#[cfg(test)]
mod encode_test {
    use bytes::Bytes;

    use crate::{
        amf0::Amf0EncoderState, config::CodecConfig, registry::TypeRegistry, value::Value,
    };

    fn encode(value: &Value) -> Bytes {
        let config = CodecConfig::default();
        let registry = TypeRegistry::default();
        let mut encoder = Amf0EncoderState::new(&config, &registry);
        encoder.put_value(value).unwrap();
        encoder.finish()
    }

    #[test]
    fn encode_scalars() {
        assert_eq!(encode(&Value::Boolean(true)), Bytes::from_static(&[0x01, 0x01]));
        assert_eq!(encode(&Value::Null), Bytes::from_static(&[0x05]));
        assert_eq!(encode(&Value::Undefined), Bytes::from_static(&[0x06]));

        let mut expected = vec![0x00];
        expected.extend_from_slice(&3f64.to_be_bytes());
        assert_eq!(encode(&Value::Integer(3)), Bytes::from(expected));
    }

    #[test]
    fn encode_ecma_array_dense_first() {
        let array = Value::associative_array(
            vec![Value::Boolean(false)],
            vec![("k".to_string(), Value::Null)],
        )
        .unwrap();
        let expected = Bytes::from_static(&[
            0x08, 0x00, 0x00, 0x00, 0x02, // ecma array of two
            0x00, 0x01, b'0', 0x01, 0x00, // "0": false
            0x00, 0x01, b'k', 0x05, // "k": null
            0x00, 0x00, 0x09,
        ]);
        assert_eq!(encode(&array), expected);
    }

    #[test]
    fn encode_shared_array_as_reference() {
        let shared = Value::array(vec![]);
        let value = Value::array(vec![shared.clone(), shared]);
        let expected = Bytes::from_static(&[
            0x0A, 0x00, 0x00, 0x00, 0x02, // outer strict array, index 0
            0x0A, 0x00, 0x00, 0x00, 0x00, // inner strict array, index 1
            0x07, 0x00, 0x01, // reference to index 1
        ]);
        assert_eq!(encode(&value), expected);
    }
}
