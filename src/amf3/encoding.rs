use bytes::BufMut;
use tracing::trace;

use crate::{
    amf3::{external::DataOutput, *},
    error::{EncodingError, ValueError},
    reference::Amf3EncodeReferences,
    session::EncodeSession,
    value::{AssociativeArray, Date, Dictionary, Object, ObjectVector, Traits, Value, Vector},
};

pub(crate) struct Amf3EncoderState<'s, 'a> {
    pub(super) session: &'s mut EncodeSession<'a>,
    refs: &'s mut Amf3EncodeReferences,
}

impl<'s, 'a> Amf3EncoderState<'s, 'a> {
    pub(crate) fn new(
        session: &'s mut EncodeSession<'a>,
        refs: &'s mut Amf3EncodeReferences,
    ) -> Self {
        Self { session, refs }
    }

    fn reborrow(&mut self) -> Amf3EncoderState<'_, 'a> {
        Amf3EncoderState {
            session: &mut *self.session,
            refs: &mut *self.refs,
        }
    }

    pub(crate) fn put_value(&mut self, value: &Value) -> Result<(), EncodingError> {
        self.session.enter()?;
        let result = self.put_value_unguarded(value);
        self.session.leave();
        result
    }

    fn put_value_unguarded(&mut self, value: &Value) -> Result<(), EncodingError> {
        match value {
            Value::Undefined => self.put_marker(UNDEFINED),
            Value::Null => self.put_marker(NULL),
            Value::Boolean(b) => self.put_boolean(*b),
            Value::Integer(i) => self.put_integer(*i)?,
            Value::Double(d) => self.put_double(*d),
            Value::String(s) => self.put_string(s)?,
            Value::Date(d) => self.put_date(value, d)?,
            Value::Array(items) => self.put_array(value, &[], items)?,
            Value::AssociativeArray(array) => self.put_associative_array(value, array)?,
            Value::Object(object) => self.put_object(value, object)?,
            Value::XmlDocument(xml) => self.put_utf8_complex(XML_DOC, value, xml)?,
            Value::Xml(xml) => self.put_utf8_complex(XML, value, xml)?,
            Value::ByteArray(bytes) => self.put_byte_array(value, bytes)?,
            Value::VectorInt(vector) => {
                self.put_vector(VECTOR_INT, value, vector, |buf, i| buf.put_i32(*i))?
            }
            Value::VectorUInt(vector) => {
                self.put_vector(VECTOR_UINT, value, vector, |buf, u| buf.put_u32(*u))?
            }
            Value::VectorDouble(vector) => {
                self.put_vector(VECTOR_DOUBLE, value, vector, |buf, d| buf.put_f64(*d))?
            }
            Value::VectorObject(vector) => self.put_object_vector(value, vector)?,
            Value::Dictionary(dictionary) => self.put_dictionary(value, dictionary)?,
        }
        Ok(())
    }

    fn put_marker(&mut self, marker: u8) {
        self.session.buf.put_u8(marker);
    }

    fn put_u29(&mut self, u29: u32) -> Result<(), EncodingError> {
        put_u29(&mut self.session.buf, u29)
    }

    /// Writes the inline descriptor `(len << 1) | 1`.
    fn put_inline_len(&mut self, len: usize) -> Result<(), EncodingError> {
        self.put_u29(((len as u32) << 1) | 0b1)
    }

    fn put_boolean(&mut self, b: bool) {
        match b {
            false => self.put_marker(FALSE),
            true => self.put_marker(TRUE),
        }
    }

    fn put_integer(&mut self, i: i32) -> Result<(), EncodingError> {
        if !(I29_MIN..=I29_MAX).contains(&i) {
            trace!(value = i, "Integer outside of the 29-bit range, writing a double.");
            self.put_double(f64::from(i));
            return Ok(());
        }

        self.put_marker(INTEGER);
        self.put_u29((i as u32) & U29_MAX)
    }

    fn put_double(&mut self, d: f64) {
        self.put_marker(DOUBLE);
        self.session.buf.put_f64(d);
    }

    fn put_string(&mut self, s: &str) -> Result<(), EncodingError> {
        self.put_marker(STRING);
        self.put_string_raw(s)
    }

    /// String without marker, through the string reference table. Empty strings are
    /// always inline and never enter the table.
    pub(super) fn put_string_raw(&mut self, s: &str) -> Result<(), EncodingError> {
        if s.is_empty() {
            return self.put_u29(0b1);
        }
        if let Some(idx) = self.refs.strings.get(s) {
            return self.put_u29(reference_descriptor(idx, 1, 0b0)?);
        }
        ensure_len(s.len(), Length::String)?;

        self.refs.strings.insert(s.to_string());
        self.put_inline_len(s.len())?;
        self.session.buf.put_slice(s.as_bytes());
        Ok(())
    }

    /// Writes a back-reference if this instance was written before. Otherwise the
    /// instance takes the next object index and the caller writes it inline.
    fn put_reference(&mut self, value: &Value) -> Result<bool, EncodingError> {
        if let Some(idx) = self.refs.objects.get(value) {
            self.put_u29(reference_descriptor(idx, 1, 0b0)?)?;
            return Ok(true);
        }
        self.refs.objects.insert(value);
        Ok(false)
    }

    fn put_date(&mut self, value: &Value, date: &Date) -> Result<(), EncodingError> {
        self.put_marker(DATE);
        if self.put_reference(value)? {
            return Ok(());
        }
        // Only the inline flag is significant, remaining bits are zero.
        self.put_u29(0b1)?;
        self.session.buf.put_f64(date.millis);
        Ok(())
    }

    fn put_array(
        &mut self,
        value: &Value,
        associative: &[(String, Value)],
        dense: &[Value],
    ) -> Result<(), EncodingError> {
        self.put_marker(ARRAY);
        if self.put_reference(value)? {
            return Ok(());
        }
        ensure_len(dense.len(), Length::Array)?;

        self.put_inline_len(dense.len())?;
        for (key, value) in associative {
            if key.is_empty() {
                return Err(ValueError::EmptyMemberName.into());
            }
            self.put_string_raw(key)?;
            self.put_value(value)?;
        }
        self.put_string_raw("")?;
        for value in dense {
            self.put_value(value)?;
        }
        Ok(())
    }

    fn put_associative_array(
        &mut self,
        value: &Value,
        array: &AssociativeArray,
    ) -> Result<(), EncodingError> {
        self.put_array(value, array.entries(), array.dense())
    }

    fn put_object(&mut self, value: &Value, object: &Object) -> Result<(), EncodingError> {
        self.put_marker(OBJECT);
        if self.put_reference(value)? {
            return Ok(());
        }

        let traits = object.traits();
        let registry = self.session.registry;
        if self.session.config.strict_types && !registry.is_known(&traits.class_name) {
            return Err(EncodingError::UnknownType(traits.class_name.clone()));
        }
        let codec = match traits.externalizable {
            true => Some(
                registry
                    .externalizable_codec(&traits.class_name)
                    .ok_or_else(|| {
                        EncodingError::UnregisteredExternalizable(traits.class_name.clone())
                    })?,
            ),
            false => None,
        };

        if let Some(idx) = self.refs.traits.get::<Traits>(traits) {
            self.put_u29(reference_descriptor(idx, 2, 0b01)?)?;
        } else {
            let sealed_count = traits.members.len();
            if sealed_count > MAX_SEALED_COUNT as usize {
                return Err(EncodingError::ArrayTooLong {
                    len: sealed_count,
                    max: MAX_SEALED_COUNT as usize,
                });
            }
            self.refs.traits.insert(traits.clone());

            let u29o = match traits.externalizable {
                true => 0b0111,
                false => ((sealed_count as u32) << 4) | (u32::from(traits.dynamic) << 3) | 0b0011,
            };
            self.put_u29(u29o)?;
            self.put_string_raw(&traits.class_name)?;
            for member in &traits.members {
                self.put_string_raw(member)?;
            }
        }

        if let Some(codec) = codec {
            trace!(class_name = %traits.class_name, "Writing externalizable object.");
            let mut output = DataOutput::new(self.reborrow());
            return codec.write_external(object, &mut output);
        }

        for (_, value) in object.sealed_members() {
            self.put_value(value)?;
        }
        if traits.dynamic {
            for (name, value) in object.dynamic_members() {
                self.put_string_raw(name)?;
                self.put_value(value)?;
            }
            self.put_string_raw("")?;
        }
        Ok(())
    }

    fn put_utf8_complex(&mut self, marker: u8, value: &Value, s: &str) -> Result<(), EncodingError> {
        self.put_marker(marker);
        if self.put_reference(value)? {
            return Ok(());
        }
        ensure_len(s.len(), Length::String)?;

        self.put_inline_len(s.len())?;
        self.session.buf.put_slice(s.as_bytes());
        Ok(())
    }

    fn put_byte_array(&mut self, value: &Value, bytes: &[u8]) -> Result<(), EncodingError> {
        self.put_marker(BYTE_ARRAY);
        if self.put_reference(value)? {
            return Ok(());
        }
        ensure_len(bytes.len(), Length::Array)?;

        self.put_inline_len(bytes.len())?;
        self.session.buf.put_slice(bytes);
        Ok(())
    }

    fn put_vector<T, F>(
        &mut self,
        marker: u8,
        value: &Value,
        vector: &Vector<T>,
        put_item: F,
    ) -> Result<(), EncodingError>
    where
        F: Fn(&mut bytes::BytesMut, &T),
    {
        self.put_marker(marker);
        if self.put_reference(value)? {
            return Ok(());
        }
        ensure_len(vector.items.len(), Length::Array)?;

        self.put_inline_len(vector.items.len())?;
        self.session.buf.put_u8(vector.fixed_length.into());
        for item in &vector.items {
            put_item(&mut self.session.buf, item);
        }
        Ok(())
    }

    fn put_object_vector(
        &mut self,
        value: &Value,
        vector: &ObjectVector,
    ) -> Result<(), EncodingError> {
        self.put_marker(VECTOR_OBJECT);
        if self.put_reference(value)? {
            return Ok(());
        }
        ensure_len(vector.items.len(), Length::Array)?;

        self.put_inline_len(vector.items.len())?;
        self.session.buf.put_u8(vector.fixed_length.into());
        self.put_string_raw(vector.type_name.as_deref().unwrap_or(ANY_TYPE_NAME))?;
        for item in &vector.items {
            self.put_value(item)?;
        }
        Ok(())
    }

    fn put_dictionary(
        &mut self,
        value: &Value,
        dictionary: &Dictionary,
    ) -> Result<(), EncodingError> {
        self.put_marker(DICTIONARY);
        if self.put_reference(value)? {
            return Ok(());
        }
        ensure_len(dictionary.entries.len(), Length::Array)?;

        self.put_inline_len(dictionary.entries.len())?;
        self.session.buf.put_u8(dictionary.weak_keys.into());
        for (key, value) in &dictionary.entries {
            self.put_value(key)?;
            self.put_value(value)?;
        }
        Ok(())
    }
}

enum Length {
    String,
    Array,
}

fn ensure_len(len: usize, kind: Length) -> Result<(), EncodingError> {
    if len <= U28_MAX as usize {
        return Ok(());
    }
    let max = U28_MAX as usize;
    Err(match kind {
        Length::String => EncodingError::StringTooLong { len, max },
        Length::Array => EncodingError::ArrayTooLong { len, max },
    })
}

/// Packs a table index above `flag_bits` low bits holding `flags`.
fn reference_descriptor(idx: usize, flag_bits: u32, flags: u32) -> Result<u32, EncodingError> {
    let max_idx = (U29_MAX >> flag_bits) as usize;
    if idx > max_idx {
        return Err(EncodingError::OutOfRangeU29(u32::try_from(idx).unwrap_or(u32::MAX)));
    }
    Ok(((idx as u32) << flag_bits) | flags)
}

/// Writes `u29` in the minimal variable-length form.
pub(crate) fn put_u29<B: BufMut>(buf: &mut B, mut u29: u32) -> Result<(), EncodingError> {
    const ONE_BYTE_MAX: u32 = 2u32.pow(7) - 1;
    const TWO_BYTE_MAX: u32 = 2u32.pow(14) - 1;
    const THREE_BYTE_MAX: u32 = 2u32.pow(21) - 1;

    match u29 {
        n if n <= ONE_BYTE_MAX => {
            buf.put_u8((u29 & 0x7F) as u8);
        }
        n if n <= TWO_BYTE_MAX => {
            let second = (u29 & 0x7F) as u8;
            u29 >>= 7;
            let first = 0x80 | (u29 & 0x7F) as u8;
            buf.put_slice(&[first, second]);
        }
        n if n <= THREE_BYTE_MAX => {
            let third = (u29 & 0x7F) as u8;
            u29 >>= 7;
            let second = 0x80 | (u29 & 0x7F) as u8;
            u29 >>= 7;
            let first = 0x80 | (u29 & 0x7F) as u8;
            buf.put_slice(&[first, second, third]);
        }
        n if n <= U29_MAX => {
            let fourth = (u29 & 0xFF) as u8;
            u29 >>= 8;
            let third = 0x80 | (u29 & 0x7F) as u8;
            u29 >>= 7;
            let second = 0x80 | (u29 & 0x7F) as u8;
            u29 >>= 7;
            let first = 0x80 | (u29 & 0x7F) as u8;
            buf.put_slice(&[first, second, third, fourth]);
        }
        _ => return Err(EncodingError::OutOfRangeU29(u29)),
    }
    Ok(())
}
