use std::{collections::HashSet, sync::Arc};

use bytes::Bytes;

use crate::error::ValueError;

/// Every shape the codecs can put on the wire.
///
/// Compound variants live behind an [`Arc`]. Cloning a compound value shares the
/// allocation, and the encoders treat two occurrences of the same allocation as one
/// instance: the second occurrence is written as a back-reference. Decoders hand out
/// shared allocations for back-referenced values in the same way.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    /// AMF3 integer. AMF0 has a single number type and writes it as a double.
    Integer(i32),
    Double(f64),
    String(String),
    Date(Arc<Date>),
    Array(Arc<Vec<Value>>),
    AssociativeArray(Arc<AssociativeArray>),
    Object(Arc<Object>),
    XmlDocument(Arc<str>),
    /// E4X XML (AMF3 only, AMF0 writes it as an XML document).
    Xml(Arc<str>),
    ByteArray(Arc<Bytes>),
    VectorInt(Arc<Vector<i32>>),
    VectorUInt(Arc<Vector<u32>>),
    VectorDouble(Arc<Vector<f64>>),
    VectorObject(Arc<ObjectVector>),
    Dictionary(Arc<Dictionary>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Undefined,
    Null,
    Boolean,
    Integer,
    Double,
    String,
    Date,
    Array,
    AssociativeArray,
    Object,
    XmlDocument,
    Xml,
    ByteArray,
    VectorInt,
    VectorUInt,
    VectorDouble,
    VectorObject,
    Dictionary,
}

/// Identity of a shared compound value, valid while the value is borrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct InstanceId(usize);

impl InstanceId {
    fn of<T: ?Sized>(arc: &Arc<T>) -> Self {
        Self(Arc::as_ptr(arc).cast::<()>() as usize)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::Date(_) => ValueKind::Date,
            Value::Array(_) => ValueKind::Array,
            Value::AssociativeArray(_) => ValueKind::AssociativeArray,
            Value::Object(_) => ValueKind::Object,
            Value::XmlDocument(_) => ValueKind::XmlDocument,
            Value::Xml(_) => ValueKind::Xml,
            Value::ByteArray(_) => ValueKind::ByteArray,
            Value::VectorInt(_) => ValueKind::VectorInt,
            Value::VectorUInt(_) => ValueKind::VectorUInt,
            Value::VectorDouble(_) => ValueKind::VectorDouble,
            Value::VectorObject(_) => ValueKind::VectorObject,
            Value::Dictionary(_) => ValueKind::Dictionary,
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn date(millis: f64) -> Self {
        Value::Date(Arc::new(Date::new(millis)))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    pub fn associative_array(
        dense: Vec<Value>,
        entries: Vec<(String, Value)>,
    ) -> Result<Self, ValueError> {
        Ok(Value::AssociativeArray(Arc::new(AssociativeArray::new(
            dense, entries,
        )?)))
    }

    pub fn object(object: Object) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Anonymous dynamic object, the equivalent of an ActionScript `Object`.
    pub fn anonymous_object(members: Vec<(String, Value)>) -> Result<Self, ValueError> {
        Ok(Value::object(Object::anonymous(members)?))
    }

    pub fn xml_document(markup: &str) -> Self {
        Value::XmlDocument(Arc::from(markup))
    }

    pub fn xml(markup: &str) -> Self {
        Value::Xml(Arc::from(markup))
    }

    pub fn byte_array(bytes: impl Into<Bytes>) -> Self {
        Value::ByteArray(Arc::new(bytes.into()))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric value of either number variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(f64::from(*i)),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// Whether both values are the same shared instance (not merely equal).
    pub fn same_instance(a: &Value, b: &Value) -> bool {
        match (a.instance_id(), b.instance_id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub(crate) fn instance_id(&self) -> Option<InstanceId> {
        let id = match self {
            Value::Date(d) => InstanceId::of(d),
            Value::Array(a) => InstanceId::of(a),
            Value::AssociativeArray(a) => InstanceId::of(a),
            Value::Object(o) => InstanceId::of(o),
            Value::XmlDocument(x) => InstanceId::of(x),
            Value::Xml(x) => InstanceId::of(x),
            Value::ByteArray(b) => InstanceId::of(b),
            Value::VectorInt(v) => InstanceId::of(v),
            Value::VectorUInt(v) => InstanceId::of(v),
            Value::VectorDouble(v) => InstanceId::of(v),
            Value::VectorObject(v) => InstanceId::of(v),
            Value::Dictionary(d) => InstanceId::of(d),
            Value::Undefined
            | Value::Null
            | Value::Boolean(_)
            | Value::Integer(_)
            | Value::Double(_)
            | Value::String(_) => return None,
        };
        Some(id)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::object(object)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Date {
    /// Milliseconds since the Unix epoch.
    pub millis: f64,
    /// Offset in minutes. The wire always carries zero, so decoded dates have `None`.
    pub timezone_offset: Option<i16>,
}

impl Date {
    pub fn new(millis: f64) -> Self {
        Self {
            millis,
            timezone_offset: None,
        }
    }
}

/// Array with a dense part and ordered string-keyed entries (AMF0 ECMA array, AMF3
/// array with associative part).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssociativeArray {
    dense: Vec<Value>,
    entries: Vec<(String, Value)>,
}

impl AssociativeArray {
    /// Leading entries keyed by the next dense index (`"2"` after two dense elements)
    /// are moved into the dense part, matching how the AMF0 wire form reads back.
    pub fn new(
        mut dense: Vec<Value>,
        entries: Vec<(String, Value)>,
    ) -> Result<Self, ValueError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for (key, _) in &entries {
            if key.is_empty() {
                return Err(ValueError::EmptyMemberName);
            }
            if !seen.insert(key.as_str()) {
                return Err(ValueError::DuplicateMember(key.clone()));
            }
            if dense_index(key).is_some_and(|idx| idx < dense.len()) {
                return Err(ValueError::KeyCollidesWithDenseIndex(key.clone()));
            }
        }

        let mut entries = entries.into_iter().peekable();
        while let Some((_, value)) =
            entries.next_if(|(key, _)| dense_index(key) == Some(dense.len()))
        {
            dense.push(value);
        }
        Ok(Self {
            dense,
            entries: entries.collect(),
        })
    }

    pub fn from_entries(entries: Vec<(String, Value)>) -> Result<Self, ValueError> {
        Self::new(Vec::new(), entries)
    }

    pub fn dense(&self) -> &[Value] {
        &self.dense
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.dense.len() + self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds an array from wire pairs. Leading pairs keyed `"0"`, `"1"`, ... form
    /// the dense part, duplicated keys keep the last value.
    pub(crate) fn from_wire_pairs(pairs: Vec<(String, Value)>) -> Self {
        let mut dense = Vec::new();
        let mut entries: Vec<(String, Value)> = Vec::new();
        for (key, value) in pairs {
            if entries.is_empty() && dense_index(&key) == Some(dense.len()) {
                dense.push(value);
                continue;
            }
            if let Some(idx) = dense_index(&key).filter(|idx| *idx < dense.len()) {
                dense[idx] = value;
                continue;
            }
            upsert(&mut entries, key, value);
        }
        Self { dense, entries }
    }

    pub(crate) fn from_wire_parts(dense: Vec<Value>, pairs: Vec<(String, Value)>) -> Self {
        let mut entries: Vec<(String, Value)> = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            upsert(&mut entries, key, value);
        }
        Self { dense, entries }
    }
}

/// Parses a canonical decimal array index ("0", "17", but not "017" or "+1").
fn dense_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

fn upsert(entries: &mut Vec<(String, Value)>, key: String, value: Value) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some((_, existing)) => *existing = value,
        None => entries.push((key, value)),
    }
}

/// Class shape attached to an object on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Traits {
    /// Empty for anonymous objects.
    pub class_name: String,
    /// Sealed member names in declared order.
    pub members: Vec<String>,
    pub dynamic: bool,
    pub externalizable: bool,
}

impl Traits {
    pub fn anonymous() -> Self {
        Self {
            dynamic: true,
            ..Default::default()
        }
    }

    pub fn sealed(class_name: impl Into<String>, members: &[&str]) -> Self {
        Self {
            class_name: class_name.into(),
            members: members.iter().map(|m| m.to_string()).collect(),
            dynamic: false,
            externalizable: false,
        }
    }

    pub fn dynamic(class_name: impl Into<String>, members: &[&str]) -> Self {
        Self {
            dynamic: true,
            ..Self::sealed(class_name, members)
        }
    }

    pub fn externalizable(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            externalizable: true,
            ..Default::default()
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.class_name.is_empty()
    }
}

/// Object instance: traits plus members, sealed members first and in the order the
/// traits declare them.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    traits: Arc<Traits>,
    members: Vec<(String, Value)>,
}

impl Object {
    pub fn new(
        traits: impl Into<Arc<Traits>>,
        members: Vec<(String, Value)>,
    ) -> Result<Self, ValueError> {
        let traits = traits.into();
        if traits.externalizable && !traits.members.is_empty() {
            return Err(ValueError::ExternalizableWithSealedMembers);
        }
        if members.len() < traits.members.len() {
            return Err(ValueError::MissingSealedMembers {
                expected: traits.members.len(),
                actual: members.len(),
            });
        }
        for (index, (expected, (found, _))) in traits.members.iter().zip(&members).enumerate() {
            if expected != found {
                return Err(ValueError::SealedMemberMismatch {
                    index,
                    expected: expected.clone(),
                    found: found.clone(),
                });
            }
        }
        if !traits.dynamic && !traits.externalizable {
            if let Some((name, _)) = members.get(traits.members.len()) {
                return Err(ValueError::UnexpectedDynamicMember(name.clone()));
            }
        }

        let mut seen = HashSet::with_capacity(members.len());
        for (name, _) in &members {
            if name.is_empty() {
                return Err(ValueError::EmptyMemberName);
            }
            if !seen.insert(name.as_str()) {
                return Err(ValueError::DuplicateMember(name.clone()));
            }
        }

        Ok(Self { traits, members })
    }

    pub fn anonymous(members: Vec<(String, Value)>) -> Result<Self, ValueError> {
        Self::new(Traits::anonymous(), members)
    }

    pub fn traits(&self) -> &Arc<Traits> {
        &self.traits
    }

    pub fn class_name(&self) -> &str {
        &self.traits.class_name
    }

    pub fn members(&self) -> &[(String, Value)] {
        &self.members
    }

    pub fn sealed_members(&self) -> &[(String, Value)] {
        &self.members[..self.sealed_len()]
    }

    pub fn dynamic_members(&self) -> &[(String, Value)] {
        &self.members[self.sealed_len()..]
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn sealed_len(&self) -> usize {
        self.traits.members.len().min(self.members.len())
    }

    /// Builds an object from decoded parts. Dynamic members repeating an earlier
    /// name replace its value.
    pub(crate) fn from_wire(
        traits: Arc<Traits>,
        sealed: Vec<Value>,
        dynamic: Vec<(String, Value)>,
    ) -> Self {
        let mut members: Vec<(String, Value)> =
            traits.members.iter().cloned().zip(sealed).collect();
        for (name, value) in dynamic {
            upsert(&mut members, name, value);
        }
        Self { traits, members }
    }
}

/// Typed AMF3 vector of numbers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vector<T> {
    pub fixed_length: bool,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectVector {
    pub fixed_length: bool,
    /// Element class name, `None` for the untyped `*` vector.
    pub type_name: Option<String>,
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    pub weak_keys: bool,
    pub entries: Vec<(Value, Value)>,
}
