use std::sync::Arc;

use tracing::trace;

use crate::{
    amf3::{external::DataInput, *},
    error::DecodingError,
    reference::Amf3DecodeReferences,
    session::DecodeSession,
    value::{AssociativeArray, Date, Dictionary, Object, ObjectVector, Traits, Value, Vector},
};

pub(crate) struct Amf3DecoderState<'s, 'a> {
    pub(super) session: &'s mut DecodeSession<'a>,
    refs: &'s mut Amf3DecodeReferences,
}

impl<'s, 'a> Amf3DecoderState<'s, 'a> {
    pub(crate) fn new(
        session: &'s mut DecodeSession<'a>,
        refs: &'s mut Amf3DecodeReferences,
    ) -> Self {
        Self { session, refs }
    }

    fn reborrow(&mut self) -> Amf3DecoderState<'_, 'a> {
        Amf3DecoderState {
            session: &mut *self.session,
            refs: &mut *self.refs,
        }
    }

    pub(crate) fn decode_value(&mut self) -> Result<Value, DecodingError> {
        self.session.enter()?;
        let result = self.decode_value_unguarded();
        self.session.leave();
        result
    }

    fn decode_value_unguarded(&mut self) -> Result<Value, DecodingError> {
        let marker = self.session.get_u8()?;

        match marker {
            UNDEFINED => Ok(Value::Undefined),
            NULL => Ok(Value::Null),
            FALSE => Ok(Value::Boolean(false)),
            TRUE => Ok(Value::Boolean(true)),
            INTEGER => Ok(Value::Integer(self.decode_i29()?)),
            DOUBLE => Ok(Value::Double(self.session.get_f64()?)),
            STRING => Ok(Value::String(self.decode_string_raw()?)),
            XML_DOC => self.decode_complex(|decoder, size| {
                let xml = decoder.session.get_utf8(size as usize)?;
                Ok(Value::XmlDocument(Arc::from(xml)))
            }),
            DATE => self.decode_complex(|decoder, _| {
                let millis = decoder.session.get_f64()?;
                Ok(Value::Date(Arc::new(Date::new(millis))))
            }),
            ARRAY => self.decode_complex(Self::decode_array),
            OBJECT => self.decode_complex(Self::decode_object),
            XML => self.decode_complex(|decoder, size| {
                let xml = decoder.session.get_utf8(size as usize)?;
                Ok(Value::Xml(Arc::from(xml)))
            }),
            BYTE_ARRAY => self.decode_complex(|decoder, size| {
                let bytes = decoder.session.get_bytes(size as usize)?;
                Ok(Value::ByteArray(Arc::new(bytes)))
            }),
            VECTOR_INT => self.decode_complex(|decoder, count| {
                let vector = decoder.decode_vector(count, DecodeSession::get_i32)?;
                Ok(Value::VectorInt(Arc::new(vector)))
            }),
            VECTOR_UINT => self.decode_complex(|decoder, count| {
                let vector = decoder.decode_vector(count, DecodeSession::get_u32)?;
                Ok(Value::VectorUInt(Arc::new(vector)))
            }),
            VECTOR_DOUBLE => self.decode_complex(|decoder, count| {
                let vector = decoder.decode_vector(count, DecodeSession::get_f64)?;
                Ok(Value::VectorDouble(Arc::new(vector)))
            }),
            VECTOR_OBJECT => self.decode_complex(Self::decode_object_vector),
            DICTIONARY => self.decode_complex(Self::decode_dictionary),
            _ => Err(DecodingError::InvalidMarker(marker)),
        }
    }

    /// Resolves a reference descriptor. Inline values get their object slot before
    /// `decode` reads any nested value.
    fn decode_complex<F>(&mut self, decode: F) -> Result<Value, DecodingError>
    where
        F: FnOnce(&mut Self, u32) -> Result<Value, DecodingError>,
    {
        let u29 = self.decode_u29()?;
        let has_value = (u29 & 0b1) == 1;
        let u28 = u29 >> 1;

        match has_value {
            true => {
                let idx = self.refs.objects.reserve();
                let value = decode(self, u28)?;
                self.refs.objects.fill(idx, &value);
                Ok(value)
            }
            false => self.refs.objects.get(u28 as usize),
        }
    }

    fn decode_array(&mut self, dense_count: u32) -> Result<Value, DecodingError> {
        let associative = self.decode_pairs()?;

        let mut dense = Vec::with_capacity(self.session.capacity_hint(dense_count as usize));
        for _ in 0..dense_count {
            dense.push(self.decode_value()?);
        }

        match associative.is_empty() {
            true => Ok(Value::Array(Arc::new(dense))),
            false => Ok(Value::AssociativeArray(Arc::new(
                AssociativeArray::from_wire_parts(dense, associative),
            ))),
        }
    }

    fn decode_object(&mut self, u28: u32) -> Result<Value, DecodingError> {
        let traits = self.decode_traits(u28)?;

        let registry = self.session.registry;
        if self.session.config.strict_types && !registry.is_known(&traits.class_name) {
            return Err(DecodingError::UnknownType(traits.class_name.clone()));
        }

        if traits.externalizable {
            let codec = registry
                .externalizable_codec(&traits.class_name)
                .ok_or_else(|| DecodingError::UnregisteredExternalizable(traits.class_name.clone()))?;
            trace!(class_name = %traits.class_name, "Reading externalizable object.");

            let mut input = DataInput::new(self.reborrow());
            let members = codec.read_external(&mut input)?;
            return Ok(Value::Object(Arc::new(Object::from_wire(
                traits,
                Vec::new(),
                members,
            ))));
        }

        let mut sealed = Vec::with_capacity(self.session.capacity_hint(traits.members.len()));
        for _ in 0..traits.members.len() {
            sealed.push(self.decode_value()?);
        }
        let dynamic = match traits.dynamic {
            true => self.decode_pairs()?,
            false => Vec::new(),
        };

        Ok(Value::Object(Arc::new(Object::from_wire(
            traits, sealed, dynamic,
        ))))
    }

    // Flags are described in section 3.12 of the AMF3 format document.
    fn decode_traits(&mut self, u28: u32) -> Result<Arc<Traits>, DecodingError> {
        const INLINE_TRAITS_FLAG: u32 = 0b1;
        const EXTERNALIZABLE_FLAG: u32 = 0b10;
        const DYNAMIC_FLAG: u32 = 0b100;

        if (u28 & INLINE_TRAITS_FLAG) == 0 {
            return self.refs.traits.get((u28 >> 1) as usize);
        }

        let traits = match (u28 & EXTERNALIZABLE_FLAG) != 0 {
            true => Traits::externalizable(self.decode_string_raw()?),
            false => {
                let dynamic = (u28 & DYNAMIC_FLAG) != 0;
                let sealed_count = (u28 >> 3) as usize;

                let class_name = self.decode_string_raw()?;
                let mut members = Vec::with_capacity(self.session.capacity_hint(sealed_count));
                for _ in 0..sealed_count {
                    members.push(self.decode_string_raw()?);
                }

                Traits {
                    class_name,
                    members,
                    dynamic,
                    externalizable: false,
                }
            }
        };

        let traits = Arc::new(traits);
        self.refs.traits.push(traits.clone());
        Ok(traits)
    }

    fn decode_vector<T, F>(&mut self, count: u32, get_item: F) -> Result<Vector<T>, DecodingError>
    where
        F: Fn(&mut DecodeSession<'a>) -> Result<T, DecodingError>,
    {
        let fixed_length = self.session.get_u8()? == 0x01;

        let mut items = Vec::with_capacity(self.session.capacity_hint(count as usize));
        for _ in 0..count {
            items.push(get_item(&mut *self.session)?);
        }

        Ok(Vector {
            fixed_length,
            items,
        })
    }

    fn decode_object_vector(&mut self, count: u32) -> Result<Value, DecodingError> {
        let fixed_length = self.session.get_u8()? == 0x01;
        let type_name = self.decode_string_raw()?;

        let mut items = Vec::with_capacity(self.session.capacity_hint(count as usize));
        for _ in 0..count {
            items.push(self.decode_value()?);
        }

        Ok(Value::VectorObject(Arc::new(ObjectVector {
            fixed_length,
            type_name: (type_name != ANY_TYPE_NAME).then_some(type_name),
            items,
        })))
    }

    fn decode_dictionary(&mut self, count: u32) -> Result<Value, DecodingError> {
        let weak_keys = self.session.get_u8()? == 0x01;

        let mut entries = Vec::with_capacity(self.session.capacity_hint(count as usize));
        for _ in 0..count {
            let key = self.decode_value()?;
            let value = self.decode_value()?;
            entries.push((key, value));
        }

        Ok(Value::Dictionary(Arc::new(Dictionary { weak_keys, entries })))
    }

    // Sections 1.3.1 and 3.6 of the AMF3 format document describe this serialization.
    fn decode_u29(&mut self) -> Result<u32, DecodingError> {
        let mut result: u32 = 0;

        for bytes_used in 1..=4 {
            let byte = self.session.get_u8()?;
            if bytes_used == 4 {
                return Ok((result << 8) | u32::from(byte));
            }

            result = (result << 7) | u32::from(byte & 0x7F);
            if (byte >> 7) & 0b1 == 0 {
                break;
            }
        }

        Ok(result)
    }

    fn decode_i29(&mut self) -> Result<i32, DecodingError> {
        let u29 = self.decode_u29()?;
        if u29 & (1 << 28) != 0 {
            Ok((u29 as i32) - (1 << 29))
        } else {
            Ok(u29 as i32)
        }
    }

    pub(super) fn decode_string_raw(&mut self) -> Result<String, DecodingError> {
        let u29 = self.decode_u29()?;
        let has_value = (u29 & 0b1) == 1;
        let u28 = u29 >> 1;

        match has_value {
            true if u28 == 0 => Ok(String::new()),
            true => {
                let string = self.session.get_utf8(u28 as usize)?;
                self.refs.strings.push(string.clone());
                Ok(string)
            }
            false => self.refs.strings.get(u28 as usize),
        }
    }

    fn decode_pairs(&mut self) -> Result<Vec<(String, Value)>, DecodingError> {
        let mut pairs = vec![];
        loop {
            let key = self.decode_string_raw()?;
            if key.is_empty() {
                return Ok(pairs);
            }

            let value = self.decode_value()?;
            pairs.push((key, value));
        }
    }
}
