use std::{collections::HashMap, fmt, sync::Arc};

use tracing::warn;

use crate::{
    amf3::{DataInput, DataOutput},
    error::{DecodingError, EncodingError, ValueError},
    value::{Object, Traits, Value},
};

pub const ARRAY_COLLECTION: &str = "flex.messaging.io.ArrayCollection";
pub const OBJECT_PROXY: &str = "flex.messaging.io.ObjectProxy";

/// Reads and writes the opaque body of an externalizable AMF3 object.
///
/// The body has no length prefix, so a codec must consume exactly what its
/// counterpart wrote. Members returned by `read_external` become the members of the
/// decoded [`Object`], and `write_external` receives that same object back.
pub trait ExternalizableCodec: Send + Sync {
    fn read_external(
        &self,
        input: &mut DataInput<'_, '_>,
    ) -> Result<Vec<(String, Value)>, DecodingError>;

    fn write_external(
        &self,
        object: &Object,
        output: &mut DataOutput<'_, '_>,
    ) -> Result<(), EncodingError>;
}

/// How objects of a registered class are shaped on the wire.
#[derive(Clone)]
pub enum ClassDefinition {
    Sealed(Arc<Traits>),
    Externalizable(Arc<dyn ExternalizableCodec>),
}

impl fmt::Debug for ClassDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassDefinition::Sealed(traits) => f.debug_tuple("Sealed").field(traits).finish(),
            ClassDefinition::Externalizable(_) => f.write_str("Externalizable"),
        }
    }
}

/// Rust type mapped to an AMF class.
pub trait AmfClass: Sized {
    const CLASS_NAME: &'static str;

    /// Sealed member names in wire order.
    const MEMBERS: &'static [&'static str];

    /// Whether instances may carry members beyond `MEMBERS`.
    const DYNAMIC: bool = false;

    fn to_object(&self) -> Result<Object, ValueError>;

    fn from_object(object: &Object) -> Result<Self, ValueError>;

    fn traits() -> Traits {
        Traits {
            class_name: Self::CLASS_NAME.to_string(),
            members: Self::MEMBERS.iter().map(|m| m.to_string()).collect(),
            dynamic: Self::DYNAMIC,
            externalizable: false,
        }
    }

    fn from_value(value: &Value) -> Result<Self, ValueError> {
        let Some(object) = value.as_object() else {
            return Err(ValueError::ClassMismatch {
                expected: Self::CLASS_NAME.to_string(),
                found: format!("{:?}", value.kind()),
            });
        };
        if object.class_name() != Self::CLASS_NAME {
            return Err(ValueError::ClassMismatch {
                expected: Self::CLASS_NAME.to_string(),
                found: object.class_name().to_string(),
            });
        }
        Self::from_object(object)
    }
}

/// Class name to definition mapping consulted by both codecs.
///
/// Unregistered classes decode into generic objects carrying the wire traits, unless
/// strict mode is enabled in [`crate::CodecConfig`].
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    classes: HashMap<String, ClassDefinition>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Flex collection wrappers most remoting peers send.
    pub fn with_flex_classes() -> Self {
        let mut registry = Self::new();
        registry.register_externalizable(ARRAY_COLLECTION, ArrayCollectionCodec);
        registry.register_externalizable(OBJECT_PROXY, ObjectProxyCodec);
        registry
    }

    pub fn register_class(
        &mut self,
        class_name: impl Into<String>,
        definition: ClassDefinition,
    ) -> Option<ClassDefinition> {
        let class_name = class_name.into();
        if let ClassDefinition::Sealed(traits) = &definition {
            if traits.class_name != class_name {
                warn!(
                    "Class {class_name:?} registered with traits named {:?}.",
                    traits.class_name
                );
            }
        }
        self.classes.insert(class_name, definition)
    }

    pub fn register<T: AmfClass>(&mut self) -> Option<ClassDefinition> {
        self.register_class(
            T::CLASS_NAME,
            ClassDefinition::Sealed(Arc::new(T::traits())),
        )
    }

    pub fn register_externalizable(
        &mut self,
        class_name: impl Into<String>,
        codec: impl ExternalizableCodec + 'static,
    ) -> Option<ClassDefinition> {
        self.register_class(class_name, ClassDefinition::Externalizable(Arc::new(codec)))
    }

    pub fn unregister_class(&mut self, class_name: &str) -> Option<ClassDefinition> {
        self.classes.remove(class_name)
    }

    pub fn get(&self, class_name: &str) -> Option<&ClassDefinition> {
        self.classes.get(class_name)
    }

    /// Anonymous objects are always known.
    pub fn is_known(&self, class_name: &str) -> bool {
        class_name.is_empty() || self.classes.contains_key(class_name)
    }

    pub(crate) fn externalizable_codec(
        &self,
        class_name: &str,
    ) -> Option<&Arc<dyn ExternalizableCodec>> {
        match self.classes.get(class_name) {
            Some(ClassDefinition::Externalizable(codec)) => Some(codec),
            _ => None,
        }
    }

    pub(crate) fn sealed_traits(&self, class_name: &str) -> Option<&Arc<Traits>> {
        match self.classes.get(class_name) {
            Some(ClassDefinition::Sealed(traits)) => Some(traits),
            _ => None,
        }
    }
}

/// `flex.messaging.io.ArrayCollection`: the body is the wrapped array, exposed as the
/// `source` member.
struct ArrayCollectionCodec;

impl ExternalizableCodec for ArrayCollectionCodec {
    fn read_external(
        &self,
        input: &mut DataInput<'_, '_>,
    ) -> Result<Vec<(String, Value)>, DecodingError> {
        let source = input.read_object()?;
        Ok(vec![("source".to_string(), source)])
    }

    fn write_external(
        &self,
        object: &Object,
        output: &mut DataOutput<'_, '_>,
    ) -> Result<(), EncodingError> {
        match object.get("source") {
            Some(source) => output.write_object(source),
            None => output.write_object(&Value::Null),
        }
    }
}

/// `flex.messaging.io.ObjectProxy`: the body is an anonymous object whose members
/// become the proxy members.
struct ObjectProxyCodec;

impl ExternalizableCodec for ObjectProxyCodec {
    fn read_external(
        &self,
        input: &mut DataInput<'_, '_>,
    ) -> Result<Vec<(String, Value)>, DecodingError> {
        match input.read_object()? {
            Value::Object(object) => Ok(object.members().to_vec()),
            Value::Null | Value::Undefined => Ok(Vec::new()),
            other => Err(DecodingError::External(format!(
                "ObjectProxy wraps {:?} instead of an object",
                other.kind()
            ))),
        }
    }

    fn write_external(
        &self,
        object: &Object,
        output: &mut DataOutput<'_, '_>,
    ) -> Result<(), EncodingError> {
        let proxied = Value::anonymous_object(object.members().to_vec())?;
        output.write_object(&proxied)
    }
}

#[cfg(test)]
mod registry_test {
    use super::*;

    struct Point {
        x: f64,
        y: f64,
    }

    impl AmfClass for Point {
        const CLASS_NAME: &'static str = "geometry.Point";
        const MEMBERS: &'static [&'static str] = &["x", "y"];

        fn to_object(&self) -> Result<Object, ValueError> {
            Object::new(
                Self::traits(),
                vec![
                    ("x".to_string(), Value::Double(self.x)),
                    ("y".to_string(), Value::Double(self.y)),
                ],
            )
        }

        fn from_object(object: &Object) -> Result<Self, ValueError> {
            let member = |name: &str| {
                object
                    .get(name)
                    .and_then(Value::as_f64)
                    .ok_or_else(|| ValueError::InvalidMember(name.to_string()))
            };
            Ok(Self {
                x: member("x")?,
                y: member("y")?,
            })
        }
    }

    #[test]
    fn register_and_unregister() {
        let mut registry = TypeRegistry::new();
        assert!(!registry.is_known("geometry.Point"));
        assert!(registry.is_known(""));

        assert!(registry.register::<Point>().is_none());
        assert!(registry.is_known("geometry.Point"));
        let traits = registry.sealed_traits("geometry.Point").unwrap();
        assert_eq!(traits.members, vec!["x".to_string(), "y".to_string()]);
        assert!(registry.externalizable_codec("geometry.Point").is_none());

        assert!(registry.unregister_class("geometry.Point").is_some());
        assert!(registry.get("geometry.Point").is_none());
    }

    #[test]
    fn flex_classes_are_externalizable() {
        let registry = TypeRegistry::with_flex_classes();
        assert!(registry.externalizable_codec(ARRAY_COLLECTION).is_some());
        assert!(registry.externalizable_codec(OBJECT_PROXY).is_some());
    }

    #[test]
    fn class_conversion() {
        let point = Point { x: 1.5, y: -2.0 };
        let value = Value::object(point.to_object().unwrap());

        let decoded = Point::from_value(&value).unwrap();
        assert_eq!(decoded.x, 1.5);
        assert_eq!(decoded.y, -2.0);

        let other = Value::anonymous_object(vec![("x".to_string(), 1.0.into())]).unwrap();
        assert!(matches!(
            Point::from_value(&other),
            Err(ValueError::ClassMismatch { .. })
        ));
        assert!(matches!(
            Point::from_value(&Value::Null),
            Err(ValueError::ClassMismatch { .. })
        ));
    }
}
