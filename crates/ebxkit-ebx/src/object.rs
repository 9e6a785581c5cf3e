//! Instance objects and their per-asset identity.

use ebxkit_common::{hash, EbxGuid};

use crate::value::Value;

/// Per-asset identity of an instance: an optional stable GUID plus the dense
/// index into the asset's instance vector.
///
/// Exported instances carry a non-empty GUID; non-exported instances are
/// identified by index alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssetClassGuid {
    pub guid: EbxGuid,
    pub index: usize,
}

impl AssetClassGuid {
    /// Create a new identity.
    #[inline]
    pub fn new(guid: EbxGuid, index: usize) -> Self {
        Self { guid, index }
    }

    /// Whether this identity is externally referable.
    #[inline]
    pub fn is_exported(&self) -> bool {
        !self.guid.is_empty()
    }
}

/// One named property slot of an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectField {
    /// Hash of the property name.
    pub name_hash: u32,
    /// Current value.
    pub value: Value,
}

/// A schema-typed instance in the object graph.
///
/// Fields are stored flattened in declaration order, base-class properties
/// first, and addressed by name hash. The field list is small, so lookups
/// are linear scans.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    /// Hash of the schema type name.
    pub type_hash: u32,
    /// Per-asset identity, assigned when the instance joins an asset.
    pub class_guid: AssetClassGuid,
    /// Flattened property slots.
    pub fields: Vec<ObjectField>,
}

impl Object {
    /// Create an object of the given type with no fields.
    pub fn new(type_hash: u32) -> Self {
        Self {
            type_hash,
            class_guid: AssetClassGuid::default(),
            fields: Vec::new(),
        }
    }

    /// Get a property value by name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.get_hash(hash::hash_str(name))
    }

    /// Get a property value by name hash.
    pub fn get_hash(&self, name_hash: u32) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name_hash == name_hash)
            .map(|f| &f.value)
    }

    /// Set a property value by name. Returns false if the object carries no
    /// such property.
    #[inline]
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        self.set_hash(hash::hash_str(name), value)
    }

    /// Set a property value by name hash. Returns false if the object
    /// carries no such property.
    pub fn set_hash(&mut self, name_hash: u32, value: Value) -> bool {
        match self.fields.iter_mut().find(|f| f.name_hash == name_hash) {
            Some(field) => {
                field.value = value;
                true
            }
            None => false,
        }
    }

    /// Whether the object carries a property with this name hash.
    #[inline]
    pub fn has_hash(&self, name_hash: u32) -> bool {
        self.fields.iter().any(|f| f.name_hash == name_hash)
    }

    /// Iterate over the property slots.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &ObjectField> {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_by_name() {
        let mut obj = Object::new(1);
        obj.fields.push(ObjectField {
            name_hash: hash::hash_str("damage"),
            value: Value::Float32(0.0),
        });

        assert!(obj.set("damage", Value::Float32(1.5)));
        assert_eq!(obj.get("damage"), Some(&Value::Float32(1.5)));
        assert_eq!(obj.get("missing"), None);
    }

    #[test]
    fn test_set_unknown_hash_is_rejected() {
        let mut obj = Object::new(1);
        assert!(!obj.set_hash(0xDEAD_BEEF, Value::Int32(1)));
    }

    #[test]
    fn test_exported_identity() {
        let id = AssetClassGuid::default();
        assert!(!id.is_exported());

        let guid: EbxGuid = "12345678-abcd-ef01-2345-6789abcdef01".parse().unwrap();
        assert!(AssetClassGuid::new(guid, 0).is_exported());
    }
}
