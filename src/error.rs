use std::fmt;

use thiserror::Error;

/// Reference table a back-reference index points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTable {
    /// AMF0 complex values (objects, ECMA arrays, strict arrays, typed objects).
    Amf0Objects,
    /// AMF3 strings.
    Strings,
    /// AMF3 complex values.
    Objects,
    /// AMF3 trait (class definition) table.
    Traits,
}

impl fmt::Display for ReferenceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReferenceTable::Amf0Objects => "amf0 object",
            ReferenceTable::Strings => "string",
            ReferenceTable::Objects => "object",
            ReferenceTable::Traits => "trait",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodingError {
    #[error("Unsupported data type: {0:#04x}")]
    UnsupportedType(u8),

    #[error("Invalid marker: {0:#04x}")]
    InvalidMarker(u8),

    #[error("Unexpected end of input")]
    UnexpectedEndOfInput,

    #[error("Invalid {table} reference {index} (table holds {len} entries)")]
    InvalidReference {
        table: ReferenceTable,
        index: usize,
        len: usize,
    },

    #[error("Nesting deeper than {0} levels")]
    RecursionLimitExceeded(usize),

    #[error("Unknown class: {0:?}")]
    UnknownType(String),

    #[error("Invalid UTF-8 string")]
    InvalidUtf8,

    #[error("No codec registered for externalizable class {0:?}")]
    UnregisteredExternalizable(String),

    #[error("Externalizable codec failed: {0}")]
    External(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("Invalid value: {0}")]
    InvalidValue(#[from] ValueError),

    #[error("String too long: {len} bytes (max {max})")]
    StringTooLong { len: usize, max: usize },

    #[error("Array too long: {len} elements (max {max})")]
    ArrayTooLong { len: usize, max: usize },

    #[error("Value {0} does not fit in U29")]
    OutOfRangeU29(u32),

    #[error("Nesting deeper than {0} levels")]
    RecursionLimitExceeded(usize),

    #[error("Unknown class: {0:?}")]
    UnknownType(String),

    #[error("No codec registered for externalizable class {0:?}")]
    UnregisteredExternalizable(String),
}

/// Shape violations of in-memory values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("Duplicate member name: {0:?}")]
    DuplicateMember(String),

    #[error("Sealed member {index} should be named {expected:?}, found {found:?}")]
    SealedMemberMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("Object has {actual} members but its traits declare {expected} sealed members")]
    MissingSealedMembers { expected: usize, actual: usize },

    #[error("Dynamic member {0:?} on an object with sealed traits")]
    UnexpectedDynamicMember(String),

    #[error("Externalizable traits cannot declare sealed members")]
    ExternalizableWithSealedMembers,

    #[error("Key {0:?} collides with the dense part of the array")]
    KeyCollidesWithDenseIndex(String),

    #[error("Member names and array keys cannot be empty")]
    EmptyMemberName,

    #[error("Expected an object of class {expected:?}, found {found:?}")]
    ClassMismatch { expected: String, found: String },

    #[error("Member {0:?} is missing or has an unexpected type")]
    InvalidMember(String),
}
