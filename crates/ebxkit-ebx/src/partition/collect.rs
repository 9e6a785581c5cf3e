//! Writer pre-pass: traversal of the reachable object graph.
//!
//! Before any emission the writer needs the ordered set of concrete types,
//! the import set with dense indices, the interned-string set, and the array
//! and boxed-value row counts. One identity-keyed walk over the graph
//! produces all of them; already-visited instances are not re-traversed, so
//! cyclic graphs terminate.

use hashbrown::{HashMap as FastHashMap, HashSet as FastHashSet};
use rustc_hash::FxHasher;

use crate::asset::EbxAsset;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::schema::SchemaRegistry;
use crate::structs::EbxImportReference;
use crate::value::{PointerRef, Value};

type FxHashMap<K, V> = FastHashMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;
type FxHashSet<T> = FastHashSet<T, std::hash::BuildHasherDefault<FxHasher>>;

/// Everything the emitter needs to size and fill the descriptor tables.
#[derive(Debug, Default)]
pub(crate) struct Collected {
    /// Schema type hashes in first-appearance order, inheritance chains
    /// included.
    pub type_order: Vec<u32>,
    /// Boxed payload type hashes (schema or array hashes) in first-seen
    /// order.
    pub boxed_types: Vec<u32>,
    /// Import references with dense indices in iteration order.
    pub imports: Vec<EbxImportReference>,
    /// Reverse lookup for emitted pointer refs.
    pub import_indices: FxHashMap<EbxImportReference, usize>,
    /// Interned strings in first-encounter order (empties excluded).
    pub strings: Vec<String>,
    /// Number of array rows the emission will produce.
    pub array_count: usize,
    /// Number of boxed-value rows the emission will produce.
    pub boxed_count: usize,
}

pub(crate) fn collect(schema: &SchemaRegistry, asset: &EbxAsset) -> Result<Collected> {
    let mut walker = GraphWalker {
        schema,
        asset,
        collected: Collected::default(),
        seen_types: FxHashSet::default(),
        seen_boxed: FxHashSet::default(),
        seen_strings: FxHashSet::default(),
        visited: FxHashSet::default(),
    };

    for index in 0..asset.objects().len() {
        walker.visit_instance(index)?;
    }

    Ok(walker.collected)
}

struct GraphWalker<'a> {
    schema: &'a SchemaRegistry,
    asset: &'a EbxAsset,
    collected: Collected,
    seen_types: FxHashSet<u32>,
    seen_boxed: FxHashSet<u32>,
    seen_strings: FxHashSet<String>,
    visited: FxHashSet<usize>,
}

impl<'a> GraphWalker<'a> {
    fn visit_instance(&mut self, index: usize) -> Result<()> {
        if !self.visited.insert(index) {
            return Ok(());
        }

        let object = self
            .asset
            .objects()
            .get(index)
            .ok_or(Error::IndexOutOfRange {
                what: "instance",
                index: index as i64,
                len: self.asset.objects().len(),
            })?;

        self.visit_object(object)
    }

    fn visit_object(&mut self, object: &Object) -> Result<()> {
        self.add_type_chain(object.type_hash)?;

        for field in self.schema.properties_of(object.type_hash) {
            if field.transient {
                continue;
            }
            let value = object
                .get_hash(field.name_hash)
                .ok_or_else(|| Error::PropertyExtraction {
                    property: field.name.clone(),
                    expected: "declared property",
                })?;
            self.visit_value(value)?;
        }
        Ok(())
    }

    fn visit_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Pointer(PointerRef::Internal(target)) => self.visit_instance(*target),
            Value::Pointer(PointerRef::External(import)) => {
                self.add_import(*import);
                Ok(())
            }
            Value::Struct(object) => self.visit_object(object),
            Value::Array(values) => {
                self.collected.array_count += 1;
                for element in values {
                    self.visit_value(element)?;
                }
                Ok(())
            }
            Value::BoxedValue(Some(boxed)) => {
                self.collected.boxed_count += 1;
                if boxed.type_hash != 0 && self.seen_boxed.insert(boxed.type_hash) {
                    self.collected.boxed_types.push(boxed.type_hash);
                }
                self.visit_value(&boxed.value)
            }
            Value::CString(s) | Value::FileRef(s) => {
                self.add_string(s);
                Ok(())
            }
            Value::TypeRef(r) | Value::Delegate(r) => {
                self.add_string(&r.to_wire_string());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Record a concrete type and every base above it.
    fn add_type_chain(&mut self, type_hash: u32) -> Result<()> {
        let mut current = Some(
            self.schema
                .type_by_hash(type_hash)
                .ok_or(Error::SchemaMismatch(type_hash))?,
        );

        while let Some(ts) = current {
            if self.seen_types.insert(ts.name_hash) {
                self.collected.type_order.push(ts.name_hash);
            }
            current = self.schema.base_of(ts);
        }
        Ok(())
    }

    fn add_import(&mut self, import: EbxImportReference) {
        if !self.collected.import_indices.contains_key(&import) {
            let index = self.collected.imports.len();
            self.collected.imports.push(import);
            self.collected.import_indices.insert(import, index);
        }
    }

    fn add_string(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if self.seen_strings.insert(s.to_string()) {
            self.collected.strings.push(s.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;
    use crate::types::TypeKind;
    use ebxkit_common::EbxGuid;

    fn guid(n: u8) -> EbxGuid {
        EbxGuid::from_bytes([n; 16])
    }

    fn linked_schema() -> SchemaRegistry {
        let mut sb = SchemaBuilder::new();
        let node = sb.class("Node");
        sb.pointer_field(node, "next", Some("Node"));
        sb.field(node, "label", TypeKind::CString);
        sb.build()
    }

    #[test]
    fn test_cycle_terminates() {
        let schema = linked_schema();
        let hash = schema.type_by_name("Node").unwrap().name_hash;

        let mut asset = EbxAsset::new(guid(1));
        let mut x = schema.new_instance(hash).unwrap();
        let mut y = schema.new_instance(hash).unwrap();
        x.set("next", Value::Pointer(PointerRef::Internal(1)));
        y.set("next", Value::Pointer(PointerRef::Internal(0)));
        x.set("label", Value::CString("x".into()));
        y.set("label", Value::CString("y".into()));
        asset.add_exported_object(guid(2), x);
        asset.add_exported_object(guid(3), y);

        let collected = collect(&schema, &asset).unwrap();
        assert_eq!(collected.type_order, vec![hash]);
        assert_eq!(collected.strings, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_imports_get_dense_indices() {
        let schema = linked_schema();
        let hash = schema.type_by_name("Node").unwrap().name_hash;

        let import_a = EbxImportReference { file_guid: guid(7), class_guid: guid(8) };
        let import_b = EbxImportReference { file_guid: guid(7), class_guid: guid(9) };

        let mut asset = EbxAsset::new(guid(1));
        let mut x = schema.new_instance(hash).unwrap();
        x.set("next", Value::Pointer(PointerRef::External(import_a)));
        let mut y = schema.new_instance(hash).unwrap();
        y.set("next", Value::Pointer(PointerRef::External(import_b)));
        asset.add_exported_object(guid(2), x);
        asset.add_exported_object(guid(3), y);

        let collected = collect(&schema, &asset).unwrap();
        assert_eq!(collected.imports, vec![import_a, import_b]);
        assert_eq!(collected.import_indices[&import_b], 1);
    }

    #[test]
    fn test_base_chain_collected() {
        let mut sb = SchemaBuilder::new();
        let base = sb.class("Base");
        sb.field(base, "a", TypeKind::UInt32);
        let child = sb.class_with_base("Child", base);
        sb.field(child, "b", TypeKind::Float32);
        let schema = sb.build();

        let child_hash = schema.type_by_name("Child").unwrap().name_hash;
        let base_hash = schema.type_by_name("Base").unwrap().name_hash;

        let mut asset = EbxAsset::new(guid(1));
        asset.add_exported_object(guid(2), schema.new_instance(child_hash).unwrap());

        let collected = collect(&schema, &asset).unwrap();
        assert_eq!(collected.type_order, vec![child_hash, base_hash]);
    }
}
