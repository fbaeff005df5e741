use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    amf0::*,
    amf3::Amf3DecoderState,
    config::CodecConfig,
    error::{DecodingError, ReferenceTable},
    reference::{Amf3DecodeReferences, ObjectSlots},
    registry::TypeRegistry,
    session::DecodeSession,
    value::{AssociativeArray, Date, Object, Traits, Value},
};

pub(crate) struct Amf0DecoderState<'a> {
    session: DecodeSession<'a>,
    // Only Object, ECMA Array, Strict Array and Typed Object take reference indices
    // (https://rtmp.veriskope.com/pdf/amf0-file-format-specification.pdf).
    complexes: ObjectSlots,
    amf3_refs: Amf3DecodeReferences,
}

impl<'a> Amf0DecoderState<'a> {
    pub(crate) fn new(buf: &'a [u8], config: &'a CodecConfig, registry: &'a TypeRegistry) -> Self {
        Self {
            session: DecodeSession::new(buf, config, registry),
            complexes: ObjectSlots::new(ReferenceTable::Amf0Objects),
            amf3_refs: Amf3DecodeReferences::default(),
        }
    }

    pub(crate) fn consumed(&self) -> usize {
        self.session.consumed()
    }

    pub(crate) fn decode_value(&mut self) -> Result<Value, DecodingError> {
        self.session.enter()?;
        let result = self.decode_value_unguarded();
        self.session.leave();
        result
    }

    fn decode_value_unguarded(&mut self) -> Result<Value, DecodingError> {
        let marker = self.session.get_u8()?;

        let amf_value = match marker {
            NUMBER => Value::Double(self.session.get_f64()?),
            BOOLEAN => Value::Boolean(self.session.get_u8()? != 0),
            STRING => Value::String(self.decode_utf8()?),
            OBJECT => self.decode_complex(|decoder| {
                let pairs = decoder.decode_object_pairs()?;
                let traits = Arc::new(Traits::anonymous());
                Ok(Value::Object(Arc::new(Object::from_wire(
                    traits,
                    Vec::new(),
                    pairs,
                ))))
            })?,
            NULL => Value::Null,
            UNDEFINED => Value::Undefined,
            REFERENCE => {
                let idx = self.session.get_u16()?;
                self.complexes.get(idx as usize)?
            }
            ECMA_ARRAY => self.decode_complex(|decoder| {
                // The count is informational, pairs run until the end marker.
                let _array_size = decoder.session.get_u32()?;
                let pairs = decoder.decode_object_pairs()?;
                Ok(Value::AssociativeArray(Arc::new(
                    AssociativeArray::from_wire_pairs(pairs),
                )))
            })?,
            STRICT_ARRAY => self.decode_complex(|decoder| {
                let size = decoder.session.get_u32()? as usize;
                let mut array = Vec::with_capacity(decoder.session.capacity_hint(size));
                for _ in 0..size {
                    array.push(decoder.decode_value()?);
                }
                Ok(Value::Array(Arc::new(array)))
            })?,
            DATE => {
                let millis = self.session.get_f64()?;
                let timezone_offset = self.session.get_i16()?;
                if timezone_offset != 0 {
                    debug!(timezone_offset, "Ignoring non-zero timezone offset.");
                }
                Value::Date(Arc::new(Date::new(millis)))
            }
            LONG_STRING => {
                let size = self.session.get_u32()? as usize;
                Value::String(self.session.get_utf8(size)?)
            }
            XML_DOCUMENT => {
                let size = self.session.get_u32()? as usize;
                Value::XmlDocument(Arc::from(self.session.get_utf8(size)?))
            }
            TYPED_OBJECT => self.decode_complex(Self::decode_typed_object)?,
            AVMPLUS_OBJECT => {
                debug!("Switching to AMF3.");
                Amf3DecoderState::new(&mut self.session, &mut self.amf3_refs).decode_value()?
            }
            MOVIECLIP | UNSUPPORTED | RECORDSET => {
                return Err(DecodingError::UnsupportedType(marker));
            }
            _ => return Err(DecodingError::InvalidMarker(marker)),
        };
        Ok(amf_value)
    }

    /// Reserves the complex index before `decode` reads any nested value.
    fn decode_complex<F>(&mut self, decode: F) -> Result<Value, DecodingError>
    where
        F: FnOnce(&mut Self) -> Result<Value, DecodingError>,
    {
        let idx = self.complexes.reserve();
        let value = decode(self)?;
        self.complexes.fill(idx, &value);
        Ok(value)
    }

    fn decode_utf8(&mut self) -> Result<String, DecodingError> {
        let size = self.session.get_u16()?;
        self.session.get_utf8(size as usize)
    }

    fn decode_typed_object(&mut self) -> Result<Value, DecodingError> {
        let class_name = self.decode_utf8()?;
        let registry = self.session.registry;
        if self.session.config.strict_types && !registry.is_known(&class_name) {
            return Err(DecodingError::UnknownType(class_name));
        }

        let pairs = self.decode_object_pairs()?;
        let object = match registry.sealed_traits(&class_name) {
            Some(traits) => conform_to_traits(traits.clone(), pairs),
            None => {
                let traits = Arc::new(Traits::dynamic(class_name, &[]));
                Object::from_wire(traits, Vec::new(), pairs)
            }
        };
        Ok(Value::Object(Arc::new(object)))
    }

    fn decode_object_pairs(&mut self) -> Result<Vec<(String, Value)>, DecodingError> {
        let mut pairs = vec![];

        loop {
            let key = self.decode_utf8()?;
            if key.is_empty() {
                return match self.session.get_u8()? {
                    OBJECT_END => Ok(pairs),
                    marker => Err(DecodingError::InvalidMarker(marker)),
                };
            }

            let value = self.decode_value()?;
            pairs.push((key, value));
        }
    }
}

/// Rebuilds a typed object to the registered traits. Missing sealed members become
/// `Undefined`, the rest are dynamic members when the class allows them.
fn conform_to_traits(traits: Arc<Traits>, mut pairs: Vec<(String, Value)>) -> Object {
    let sealed: Vec<Value> = traits
        .members
        .iter()
        .map(|member| match pairs.iter().position(|(key, _)| key == member) {
            Some(idx) => pairs.remove(idx).1,
            None => Value::Undefined,
        })
        .collect();

    if !traits.dynamic && !pairs.is_empty() {
        let dropped: Vec<&str> = pairs.iter().map(|(key, _)| key.as_str()).collect();
        warn!(
            class_name = %traits.class_name,
            ?dropped,
            "Dropping members not declared by the registered class."
        );
        pairs.clear();
    }

    Object::from_wire(traits, sealed, pairs)
}
