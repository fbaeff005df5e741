//! Back-reference tables. Both sides live for exactly one encode or decode call.

use std::{borrow::Borrow, collections::HashMap, hash::Hash, sync::Arc};

use crate::{
    error::{DecodingError, ReferenceTable},
    value::{InstanceId, Traits, Value},
};

/// Encode side: maps an already written key to its zero-based index.
pub(crate) struct EncodeTable<K> {
    indices: HashMap<K, usize>,
    next: usize,
}

impl<K: Hash + Eq> EncodeTable<K> {
    pub(crate) fn new() -> Self {
        Self {
            indices: HashMap::new(),
            next: 0,
        }
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.indices.get(key).copied()
    }

    /// Records `key` as the next entry and returns its index. A key written inline
    /// again (AMF0 cannot reference past index 65535) moves to the new index.
    pub(crate) fn insert(&mut self, key: K) -> usize {
        let index = self.next;
        self.indices.insert(key, index);
        self.next += 1;
        index
    }
}

/// Encode side table of complex values keyed by allocation. Written values are kept
/// alive until the call ends so a dropped temporary cannot pass its address on to a
/// later value.
pub(crate) struct InstanceTable {
    indices: EncodeTable<InstanceId>,
    retained: Vec<Value>,
}

impl InstanceTable {
    pub(crate) fn new() -> Self {
        Self {
            indices: EncodeTable::new(),
            retained: Vec::new(),
        }
    }

    pub(crate) fn get(&self, value: &Value) -> Option<usize> {
        self.indices.get(&value.instance_id()?)
    }

    /// Returns `None` for values without identity.
    pub(crate) fn insert(&mut self, value: &Value) -> Option<usize> {
        let id = value.instance_id()?;
        self.retained.push(value.clone());
        Some(self.indices.insert(id))
    }
}

/// Decode side: entries in the order they were first seen in the byte stream.
pub(crate) struct DecodeTable<V> {
    table: ReferenceTable,
    entries: Vec<V>,
}

impl<V: Clone> DecodeTable<V> {
    pub(crate) fn new(table: ReferenceTable) -> Self {
        Self {
            table,
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, value: V) -> usize {
        self.entries.push(value);
        self.entries.len() - 1
    }

    pub(crate) fn get(&self, index: usize) -> Result<V, DecodingError> {
        self.entries
            .get(index)
            .cloned()
            .ok_or(DecodingError::InvalidReference {
                table: self.table,
                index,
                len: self.entries.len(),
            })
    }
}

/// Decode side table of complex values.
///
/// A slot is reserved when a value starts, before its children are read, so indices
/// match the order in which encoders register instances. A reference to a slot that
/// is still being filled would describe a cycle, which shared values cannot express.
pub(crate) struct ObjectSlots {
    table: ReferenceTable,
    slots: Vec<Option<Value>>,
}

impl ObjectSlots {
    pub(crate) fn new(table: ReferenceTable) -> Self {
        Self {
            table,
            slots: Vec::new(),
        }
    }

    pub(crate) fn reserve(&mut self) -> usize {
        self.slots.push(None);
        self.slots.len() - 1
    }

    pub(crate) fn fill(&mut self, index: usize, value: &Value) {
        self.slots[index] = Some(value.clone());
    }

    pub(crate) fn get(&self, index: usize) -> Result<Value, DecodingError> {
        self.slots
            .get(index)
            .and_then(Option::clone)
            .ok_or(DecodingError::InvalidReference {
                table: self.table,
                index,
                len: self.slots.len(),
            })
    }
}

pub(crate) struct Amf3EncodeReferences {
    pub(crate) strings: EncodeTable<String>,
    pub(crate) objects: InstanceTable,
    pub(crate) traits: EncodeTable<Arc<Traits>>,
}

impl Default for Amf3EncodeReferences {
    fn default() -> Self {
        Self {
            strings: EncodeTable::new(),
            objects: InstanceTable::new(),
            traits: EncodeTable::new(),
        }
    }
}

pub(crate) struct Amf3DecodeReferences {
    pub(crate) strings: DecodeTable<String>,
    pub(crate) objects: ObjectSlots,
    pub(crate) traits: DecodeTable<Arc<Traits>>,
}

impl Default for Amf3DecodeReferences {
    fn default() -> Self {
        Self {
            strings: DecodeTable::new(ReferenceTable::Strings),
            objects: ObjectSlots::new(ReferenceTable::Objects),
            traits: DecodeTable::new(ReferenceTable::Traits),
        }
    }
}

#[cfg(test)]
mod reference_test {
    use super::*;

    #[test]
    fn encode_table_assigns_sequential_indices() {
        let mut table = EncodeTable::new();
        assert_eq!(table.insert("a".to_string()), 0);
        assert_eq!(table.insert("b".to_string()), 1);
        assert_eq!(table.get("a"), Some(0));
        assert_eq!(table.get("b"), Some(1));
        assert_eq!(table.insert("a".to_string()), 2);
        assert_eq!(table.get("a"), Some(2));
        assert_eq!(table.get("c"), None);
    }

    #[test]
    fn instance_table_tracks_allocations() {
        let mut table = InstanceTable::new();
        let array = Value::array(vec![]);
        assert_eq!(table.insert(&Value::Null), None);
        assert_eq!(table.insert(&array), Some(0));
        assert_eq!(table.get(&array.clone()), Some(0));
        assert_eq!(table.get(&Value::array(vec![])), None);
    }

    #[test]
    fn decode_table_out_of_bounds() {
        let mut table = DecodeTable::new(ReferenceTable::Strings);
        table.push("a".to_string());
        assert_eq!(table.get(0).unwrap(), "a");
        assert_eq!(
            table.get(1),
            Err(DecodingError::InvalidReference {
                table: ReferenceTable::Strings,
                index: 1,
                len: 1
            })
        );
    }

    #[test]
    fn reserved_slot_is_not_resolvable_until_filled() {
        let mut slots = ObjectSlots::new(ReferenceTable::Objects);
        let idx = slots.reserve();
        assert!(slots.get(idx).is_err());

        let value = Value::array(vec![]);
        slots.fill(idx, &value);
        assert!(Value::same_instance(&slots.get(idx).unwrap(), &value));
    }
}
