use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::{
    amf0::{Amf0DecoderState, Amf0EncoderState},
    amf3::{Amf3DecoderState, Amf3EncoderState},
    config::CodecConfig,
    error::{DecodingError, EncodingError},
    reference::{Amf3DecodeReferences, Amf3EncodeReferences},
    registry::{ClassDefinition, TypeRegistry},
    session::{DecodeSession, EncodeSession},
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmfVersion {
    Amf0,
    Amf3,
}

/// Encoder and decoder for both AMF versions with an explicit configuration and
/// type registry.
///
/// Every call starts with empty reference tables, so a codec holds no per-call state
/// and can be shared between threads. Registering a class on a clone does not affect
/// the original.
#[derive(Debug, Clone, Default)]
pub struct AmfCodec {
    config: CodecConfig,
    registry: Arc<TypeRegistry>,
}

impl AmfCodec {
    pub fn new(config: CodecConfig, registry: TypeRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
        }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn register_class(
        &mut self,
        class_name: impl Into<String>,
        definition: ClassDefinition,
    ) -> Option<ClassDefinition> {
        Arc::make_mut(&mut self.registry).register_class(class_name, definition)
    }

    pub fn unregister_class(&mut self, class_name: &str) -> Option<ClassDefinition> {
        Arc::make_mut(&mut self.registry).unregister_class(class_name)
    }

    pub fn encode(&self, value: &Value, version: AmfVersion) -> Result<Bytes, EncodingError> {
        self.encode_values(std::slice::from_ref(value), version)
    }

    /// Encodes values back to back, each with its own reference tables.
    pub fn encode_values(
        &self,
        values: &[Value],
        version: AmfVersion,
    ) -> Result<Bytes, EncodingError> {
        match version {
            AmfVersion::Amf0 => {
                let mut buf = BytesMut::new();
                for value in values {
                    let mut encoder = Amf0EncoderState::new(&self.config, &self.registry);
                    encoder.put_value(value)?;
                    buf.extend_from_slice(&encoder.finish());
                }
                Ok(buf.freeze())
            }
            AmfVersion::Amf3 => {
                let mut session = EncodeSession::new(&self.config, &self.registry);
                for value in values {
                    let mut refs = Amf3EncodeReferences::default();
                    Amf3EncoderState::new(&mut session, &mut refs).put_value(value)?;
                }
                Ok(session.finish())
            }
        }
    }

    /// Decodes the first value. Bytes after it are ignored.
    pub fn decode(&self, buf: &[u8], version: AmfVersion) -> Result<Value, DecodingError> {
        let (value, consumed) = self.decode_prefix(buf, version)?;
        if consumed < buf.len() {
            trace!(trailing = buf.len() - consumed, "Ignoring bytes after the first value.");
        }
        Ok(value)
    }

    /// Decodes the first value and reports how many bytes it took.
    pub fn decode_prefix(
        &self,
        buf: &[u8],
        version: AmfVersion,
    ) -> Result<(Value, usize), DecodingError> {
        match version {
            AmfVersion::Amf0 => {
                let mut decoder = Amf0DecoderState::new(buf, &self.config, &self.registry);
                let value = decoder.decode_value()?;
                Ok((value, decoder.consumed()))
            }
            AmfVersion::Amf3 => {
                let mut session = DecodeSession::new(buf, &self.config, &self.registry);
                let mut refs = Amf3DecodeReferences::default();
                let value = Amf3DecoderState::new(&mut session, &mut refs).decode_value()?;
                Ok((value, session.consumed()))
            }
        }
    }

    /// Decodes values until the buffer is exhausted, each with its own reference
    /// tables. This is the layout of RTMP command and data message payloads.
    pub fn decode_values(
        &self,
        buf: &[u8],
        version: AmfVersion,
    ) -> Result<Vec<Value>, DecodingError> {
        let mut values = vec![];
        let mut offset = 0;
        while offset < buf.len() {
            let (value, consumed) = self.decode_prefix(&buf[offset..], version)?;
            values.push(value);
            offset += consumed;
        }
        Ok(values)
    }
}
