//! State shared by the AMF0 and AMF3 codecs for the duration of one call: the byte
//! cursor or accumulator, the nesting depth guard, configuration and registry.

use bytes::{Buf, Bytes, BytesMut};

use crate::{
    config::CodecConfig,
    error::{DecodingError, EncodingError},
    registry::TypeRegistry,
};

pub(crate) struct DecodeSession<'a> {
    buf: &'a [u8],
    initial_len: usize,
    depth: usize,
    pub(crate) config: &'a CodecConfig,
    pub(crate) registry: &'a TypeRegistry,
}

impl<'a> DecodeSession<'a> {
    pub(crate) fn new(buf: &'a [u8], config: &'a CodecConfig, registry: &'a TypeRegistry) -> Self {
        Self {
            buf,
            initial_len: buf.len(),
            depth: 0,
            config,
            registry,
        }
    }

    pub(crate) fn consumed(&self) -> usize {
        self.initial_len - self.buf.len()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, size: usize) -> Result<(), DecodingError> {
        if self.buf.remaining() < size {
            return Err(DecodingError::UnexpectedEndOfInput);
        }
        Ok(())
    }

    pub(crate) fn get_u8(&mut self) -> Result<u8, DecodingError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn get_u16(&mut self) -> Result<u16, DecodingError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub(crate) fn get_i16(&mut self) -> Result<i16, DecodingError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    pub(crate) fn get_u24(&mut self) -> Result<u32, DecodingError> {
        self.ensure(3)?;
        Ok(self.buf.get_uint(3) as u32)
    }

    pub(crate) fn get_u32(&mut self) -> Result<u32, DecodingError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub(crate) fn get_i32(&mut self) -> Result<i32, DecodingError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub(crate) fn get_f32(&mut self) -> Result<f32, DecodingError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32())
    }

    pub(crate) fn get_f64(&mut self) -> Result<f64, DecodingError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    pub(crate) fn get_bytes(&mut self, size: usize) -> Result<Bytes, DecodingError> {
        self.ensure(size)?;
        Ok(self.buf.copy_to_bytes(size))
    }

    pub(crate) fn get_utf8(&mut self, size: usize) -> Result<String, DecodingError> {
        self.ensure(size)?;
        let (utf8, rest) = self.buf.split_at(size);
        let string = std::str::from_utf8(utf8)
            .map_err(|_| DecodingError::InvalidUtf8)?
            .to_string();
        self.buf = rest;
        Ok(string)
    }

    /// Caps a count read from the wire so it cannot drive allocations past the
    /// size of the remaining input.
    pub(crate) fn capacity_hint(&self, count: usize) -> usize {
        count.min(self.buf.remaining())
    }

    pub(crate) fn enter(&mut self) -> Result<(), DecodingError> {
        if self.depth >= self.config.max_depth {
            return Err(DecodingError::RecursionLimitExceeded(self.config.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }
}

pub(crate) struct EncodeSession<'a> {
    pub(crate) buf: BytesMut,
    depth: usize,
    pub(crate) config: &'a CodecConfig,
    pub(crate) registry: &'a TypeRegistry,
}

impl<'a> EncodeSession<'a> {
    pub(crate) fn new(config: &'a CodecConfig, registry: &'a TypeRegistry) -> Self {
        Self {
            buf: BytesMut::new(),
            depth: 0,
            config,
            registry,
        }
    }

    pub(crate) fn enter(&mut self) -> Result<(), EncodingError> {
        if self.depth >= self.config.max_depth {
            return Err(EncodingError::RecursionLimitExceeded(self.config.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    pub(crate) fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod session_test {
    use super::*;

    #[test]
    fn truncated_reads_fail() {
        let config = CodecConfig::default();
        let registry = TypeRegistry::default();
        let mut session = DecodeSession::new(&[0x00, 0x01, 0x02], &config, &registry);

        assert_eq!(session.get_u16().unwrap(), 1);
        assert_eq!(session.consumed(), 2);
        assert_eq!(session.get_u16(), Err(DecodingError::UnexpectedEndOfInput));
        assert_eq!(session.get_u8().unwrap(), 2);
        assert_eq!(session.remaining(), 0);
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let config = CodecConfig::default();
        let registry = TypeRegistry::default();
        let mut session = DecodeSession::new(&[0xFF, 0xFE], &config, &registry);
        assert_eq!(session.get_utf8(2), Err(DecodingError::InvalidUtf8));
    }

    #[test]
    fn depth_guard_test() {
        let config = CodecConfig {
            max_depth: 2,
            ..Default::default()
        };
        let registry = TypeRegistry::default();
        let mut session = EncodeSession::new(&config, &registry);

        session.enter().unwrap();
        session.enter().unwrap();
        assert_eq!(
            session.enter(),
            Err(EncodingError::RecursionLimitExceeded(2))
        );
        session.leave();
        session.enter().unwrap();
    }
}
