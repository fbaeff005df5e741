mod decoding;
mod encoding;
mod external;


pub(crate) use decoding::Amf3DecoderState;
pub(crate) use encoding::Amf3EncoderState;
pub use external::{DataInput, DataOutput};

const UNDEFINED: u8 = 0x00;
const NULL: u8 = 0x01;
const FALSE: u8 = 0x02;
const TRUE: u8 = 0x03;
const INTEGER: u8 = 0x04;
const DOUBLE: u8 = 0x05;
const STRING: u8 = 0x06;
const XML_DOC: u8 = 0x07;
const DATE: u8 = 0x08;
const ARRAY: u8 = 0x09;
const OBJECT: u8 = 0x0A;
const XML: u8 = 0x0B;
const BYTE_ARRAY: u8 = 0x0C;
const VECTOR_INT: u8 = 0x0D;
const VECTOR_UINT: u8 = 0x0E;
const VECTOR_DOUBLE: u8 = 0x0F;
const VECTOR_OBJECT: u8 = 0x10;
const DICTIONARY: u8 = 0x11;

/// Largest length or count an inline U29 descriptor can carry.
const U28_MAX: u32 = (1 << 28) - 1;
const U29_MAX: u32 = (1 << 29) - 1;

const I29_MAX: i32 = (1 << 28) - 1;
const I29_MIN: i32 = -(1 << 28);

/// Sealed member count has to fit above the four trait flag bits.
const MAX_SEALED_COUNT: u32 = (1 << 25) - 1;

/// Type name written for object vectors without an element class.
const ANY_TYPE_NAME: &str = "*";
