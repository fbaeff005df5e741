//! Byte-level access to the body of an externalizable object, mirroring the
//! `IDataInput` / `IDataOutput` interfaces the Flash runtime hands to
//! `readExternal` and `writeExternal`.

use bytes::{BufMut, Bytes};

use crate::{
    amf3::{Amf3DecoderState, Amf3EncoderState},
    error::{DecodingError, EncodingError},
    value::Value,
};

/// Reader over an externalizable body. Nested AMF3 values share the reference
/// tables of the enclosing object.
pub struct DataInput<'d, 'a> {
    decoder: Amf3DecoderState<'d, 'a>,
}

impl<'d, 'a> DataInput<'d, 'a> {
    pub(crate) fn new(decoder: Amf3DecoderState<'d, 'a>) -> Self {
        Self { decoder }
    }

    /// Reads a marker-prefixed AMF3 value.
    pub fn read_object(&mut self) -> Result<Value, DecodingError> {
        self.decoder.decode_value()
    }

    pub fn read_boolean(&mut self) -> Result<bool, DecodingError> {
        Ok(self.decoder.session.get_u8()? != 0)
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodingError> {
        self.decoder.session.get_u8()
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, DecodingError> {
        self.decoder.session.get_bytes(len)
    }

    pub fn read_double(&mut self) -> Result<f64, DecodingError> {
        self.decoder.session.get_f64()
    }

    pub fn read_float(&mut self) -> Result<f32, DecodingError> {
        self.decoder.session.get_f32()
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodingError> {
        self.decoder.session.get_i16()
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodingError> {
        self.decoder.session.get_u16()
    }

    pub fn read_u24(&mut self) -> Result<u32, DecodingError> {
        self.decoder.session.get_u24()
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodingError> {
        self.decoder.session.get_i32()
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodingError> {
        self.decoder.session.get_u32()
    }

    /// UTF-8 string with a u16 length prefix.
    pub fn read_utf(&mut self) -> Result<String, DecodingError> {
        let len = self.decoder.session.get_u16()?;
        self.decoder.session.get_utf8(len as usize)
    }

    pub fn read_utf_bytes(&mut self, len: usize) -> Result<String, DecodingError> {
        self.decoder.session.get_utf8(len)
    }

    /// AMF3 string in the referenced (U29) form used inside objects.
    pub fn read_string(&mut self) -> Result<String, DecodingError> {
        self.decoder.decode_string_raw()
    }

    pub fn remaining(&self) -> usize {
        self.decoder.session.remaining()
    }
}

/// Writer for an externalizable body.
pub struct DataOutput<'d, 'a> {
    encoder: Amf3EncoderState<'d, 'a>,
}

impl<'d, 'a> DataOutput<'d, 'a> {
    pub(crate) fn new(encoder: Amf3EncoderState<'d, 'a>) -> Self {
        Self { encoder }
    }

    /// Writes a marker-prefixed AMF3 value.
    pub fn write_object(&mut self, value: &Value) -> Result<(), EncodingError> {
        self.encoder.put_value(value)
    }

    pub fn write_boolean(&mut self, b: bool) {
        self.encoder.session.buf.put_u8(b.into());
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.encoder.session.buf.put_u8(byte);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.encoder.session.buf.put_slice(bytes);
    }

    pub fn write_double(&mut self, d: f64) {
        self.encoder.session.buf.put_f64(d);
    }

    pub fn write_float(&mut self, f: f32) {
        self.encoder.session.buf.put_f32(f);
    }

    pub fn write_i16(&mut self, i: i16) {
        self.encoder.session.buf.put_i16(i);
    }

    pub fn write_u16(&mut self, u: u16) {
        self.encoder.session.buf.put_u16(u);
    }

    pub fn write_i32(&mut self, i: i32) {
        self.encoder.session.buf.put_i32(i);
    }

    pub fn write_u32(&mut self, u: u32) {
        self.encoder.session.buf.put_u32(u);
    }

    /// UTF-8 string with a u16 length prefix.
    pub fn write_utf(&mut self, s: &str) -> Result<(), EncodingError> {
        let len = u16::try_from(s.len()).map_err(|_| EncodingError::StringTooLong {
            len: s.len(),
            max: u16::MAX as usize,
        })?;
        self.encoder.session.buf.put_u16(len);
        self.encoder.session.buf.put_slice(s.as_bytes());
        Ok(())
    }

    pub fn write_utf_bytes(&mut self, s: &str) {
        self.encoder.session.buf.put_slice(s.as_bytes());
    }

    /// AMF3 string in the referenced (U29) form used inside objects.
    pub fn write_string(&mut self, s: &str) -> Result<(), EncodingError> {
        self.encoder.put_string_raw(s)
    }
}
