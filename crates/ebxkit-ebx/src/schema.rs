//! Schema registry: the type oracle the codec consults.
//!
//! The registry is a precomputed table keyed by name hash — type lookup,
//! property enumeration and blank-instance construction are direct table
//! walks, never reflection. [`SchemaBuilder`] constructs a registry with
//! automatic field layout (offsets, sizes, alignments) so tests and tooling
//! can declare types the way the engine's type system would.

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;

use ebxkit_common::hash;

use crate::object::{Object, ObjectField};
use crate::types::{flags, TypeKind};
use crate::value::Value;

type FxHashMap<K, V> = FastHashMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

/// Canonical element type for pointer-element arrays.
pub const DATA_CONTAINER: &str = "DataContainer";

/// Name of the synthetic field splicing a base class into a derived one.
pub const INHERITED_FIELD: &str = "$";

/// One declared field of a schema type.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    /// Field name.
    pub name: String,
    /// Hash of the field name.
    pub name_hash: u32,
    /// Wire kind.
    pub kind: TypeKind,
    /// Wire flags (kind plus category bits).
    pub flags: u16,
    /// Referenced type: base for `Inherited`, inner type for `Struct`,
    /// target for `Class`, the enumeration for `Enum`, and the *element*
    /// type for `Array` fields with struct/enum elements.
    pub type_name: Option<String>,
    /// Element kind for `Array` fields.
    pub element_kind: Option<TypeKind>,
    /// Byte offset within the containing type's footprint.
    pub offset: u32,
    /// Secondary offset, preserved verbatim.
    pub second_offset: u32,
    /// Transient fields are never serialized.
    pub transient: bool,
}

/// A schema type: a class, value type, enumeration, or ordered-collection
/// type.
#[derive(Debug, Clone)]
pub struct TypeSchema {
    /// Type name.
    pub name: String,
    /// Hash of the type name (for array types, the array hash).
    pub name_hash: u32,
    /// What species of type this is.
    pub kind: TypeKind,
    /// Wire flags for descriptor synthesis.
    pub flags: u16,
    /// Power-of-two footprint alignment.
    pub alignment: u8,
    /// Byte size of the aligned footprint. Class footprints are measured
    /// from the 8-byte object header.
    pub size: u16,
    /// Stable hash identifying the ordered-collection type (zero otherwise).
    pub array_hash: u32,
    /// Declared fields, the synthetic inherited splice first when present.
    pub fields: Vec<FieldSchema>,
    /// Option names for enumerations, in value order.
    pub enum_options: Vec<String>,
}

impl TypeSchema {
    /// The base type name, when this type inherits one.
    pub fn base_name(&self) -> Option<&str> {
        self.fields
            .first()
            .filter(|f| f.kind == TypeKind::Inherited)
            .and_then(|f| f.type_name.as_deref())
    }
}

/// Compute the stable hash of the ordered-collection type for an element.
///
/// Pointer-element arrays canonicalize to the [`DATA_CONTAINER`] element
/// type, so every pointer array shares one collection type.
pub fn array_hash_for(element_kind: TypeKind, element_type: Option<&str>) -> u32 {
    let canonical = match element_kind {
        TypeKind::Class => DATA_CONTAINER,
        _ => element_type.unwrap_or(element_kind.as_str()),
    };
    hash::hash_str(&format!("{}[]", canonical))
}

/// The precomputed schema table.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: Vec<TypeSchema>,
    by_hash: FxHashMap<u32, usize>,
    by_array_hash: FxHashMap<u32, usize>,
}

impl SchemaRegistry {
    /// All registered types.
    #[inline]
    pub fn types(&self) -> &[TypeSchema] {
        &self.types
    }

    /// Resolve a type by its name hash.
    #[inline]
    pub fn type_by_hash(&self, name_hash: u32) -> Option<&TypeSchema> {
        self.by_hash.get(&name_hash).map(|&i| &self.types[i])
    }

    /// Resolve a type by name.
    #[inline]
    pub fn type_by_name(&self, name: &str) -> Option<&TypeSchema> {
        self.type_by_hash(hash::hash_str(name))
    }

    /// Resolve an ordered-collection type by its array hash.
    #[inline]
    pub fn array_type_by_hash(&self, array_hash: u32) -> Option<&TypeSchema> {
        self.by_array_hash.get(&array_hash).map(|&i| &self.types[i])
    }

    /// The ordered-collection type matching an array field's element.
    pub fn array_type_for(&self, field: &FieldSchema) -> Option<&TypeSchema> {
        let element_kind = field.element_kind?;
        self.array_type_by_hash(array_hash_for(element_kind, field.type_name.as_deref()))
    }

    /// The base type of a class, if any.
    pub fn base_of(&self, ts: &TypeSchema) -> Option<&TypeSchema> {
        ts.base_name().and_then(|name| self.type_by_name(name))
    }

    /// Declared properties of a type, base-class properties first, the
    /// synthetic inherited splice excluded.
    pub fn properties_of(&self, name_hash: u32) -> Vec<&FieldSchema> {
        let mut properties = Vec::new();
        let mut current = self.type_by_hash(name_hash);

        while let Some(ts) = current {
            let own: Vec<_> = ts
                .fields
                .iter()
                .filter(|f| f.kind != TypeKind::Inherited)
                .collect();
            properties.splice(0..0, own);
            current = self.base_of(ts);
        }

        properties
    }

    /// Construct a blank instance of the type with the given name hash.
    ///
    /// Every declared property (inherited ones included) is pre-initialized
    /// to its kind's default; array properties start as empty collections.
    /// Returns `None` when the hash is unknown or the type is not
    /// instantiable.
    pub fn new_instance(&self, name_hash: u32) -> Option<Object> {
        let ts = self.type_by_hash(name_hash)?;
        if !matches!(ts.kind, TypeKind::Class | TypeKind::Struct) {
            return None;
        }

        let mut object = Object::new(name_hash);
        for field in self.properties_of(name_hash) {
            object.fields.push(ObjectField {
                name_hash: field.name_hash,
                value: self.default_value(field)?,
            });
        }
        Some(object)
    }

    fn default_value(&self, field: &FieldSchema) -> Option<Value> {
        match field.kind {
            TypeKind::Struct => {
                let inner = self.type_by_name(field.type_name.as_deref()?)?;
                Some(Value::Struct(self.new_instance(inner.name_hash)?))
            }
            kind => Some(Value::default_for(kind)),
        }
    }
}

/// Builder for constructing a [`SchemaRegistry`].
///
/// # Example
///
/// ```
/// use ebxkit_ebx::schema::SchemaBuilder;
/// use ebxkit_ebx::types::TypeKind;
///
/// let mut sb = SchemaBuilder::new();
/// let weapon = sb.class("Weapon");
/// sb.field(weapon, "damage", TypeKind::Float32);
/// sb.field(weapon, "ammoCount", TypeKind::Int32);
///
/// let schema = sb.build();
/// let blank = schema.new_instance(schema.type_by_name("Weapon").unwrap().name_hash);
/// assert!(blank.is_some());
/// ```
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: Vec<PendingType>,
}

#[derive(Debug)]
struct PendingType {
    name: String,
    kind: TypeKind,
    base: Option<usize>,
    fields: Vec<PendingField>,
    enum_options: Vec<String>,
}

#[derive(Debug)]
struct PendingField {
    name: String,
    kind: TypeKind,
    type_name: Option<String>,
    element_kind: Option<TypeKind>,
    transient: bool,
}

/// Handle to a type being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle(usize);

impl SchemaBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root class (an instantiable reference type).
    pub fn class(&mut self, name: &str) -> TypeHandle {
        self.push(name, TypeKind::Class, None)
    }

    /// Add a class deriving from `base`.
    pub fn class_with_base(&mut self, name: &str, base: TypeHandle) -> TypeHandle {
        assert_eq!(
            self.types[base.0].kind,
            TypeKind::Class,
            "base must be a class"
        );
        self.push(name, TypeKind::Class, Some(base.0))
    }

    /// Add a value type (an inline struct).
    pub fn value_type(&mut self, name: &str) -> TypeHandle {
        self.push(name, TypeKind::Struct, None)
    }

    /// Add an enumeration with its options in value order.
    pub fn enumeration(&mut self, name: &str, options: &[&str]) -> TypeHandle {
        let handle = self.push(name, TypeKind::Enum, None);
        self.types[handle.0].enum_options = options.iter().map(|s| s.to_string()).collect();
        handle
    }

    /// Add a plain field (primitive, string, ref, or boxed kind).
    pub fn field(&mut self, handle: TypeHandle, name: &str, kind: TypeKind) {
        assert!(
            !matches!(
                kind,
                TypeKind::Struct | TypeKind::Class | TypeKind::Enum | TypeKind::Array
            ),
            "use the dedicated adder for {} fields",
            kind
        );
        self.push_field(handle, name, kind, None, None, false);
    }

    /// Add a transient field, present on instances but never serialized.
    pub fn transient_field(&mut self, handle: TypeHandle, name: &str, kind: TypeKind) {
        self.push_field(handle, name, kind, None, None, true);
    }

    /// Add an inline value-type field.
    pub fn struct_field(&mut self, handle: TypeHandle, name: &str, type_name: &str) {
        self.push_field(
            handle,
            name,
            TypeKind::Struct,
            Some(type_name.to_string()),
            None,
            false,
        );
    }

    /// Add a pointer field. `target` names the pointed-to class when known.
    pub fn pointer_field(&mut self, handle: TypeHandle, name: &str, target: Option<&str>) {
        self.push_field(
            handle,
            name,
            TypeKind::Class,
            target.map(|s| s.to_string()),
            None,
            false,
        );
    }

    /// Add an enumeration field.
    pub fn enum_field(&mut self, handle: TypeHandle, name: &str, enum_name: &str) {
        self.push_field(
            handle,
            name,
            TypeKind::Enum,
            Some(enum_name.to_string()),
            None,
            false,
        );
    }

    /// Add an ordered-collection field. `element_type` names the element
    /// type for struct, enum and pointer elements.
    pub fn array_field(
        &mut self,
        handle: TypeHandle,
        name: &str,
        element_kind: TypeKind,
        element_type: Option<&str>,
    ) {
        self.push_field(
            handle,
            name,
            TypeKind::Array,
            element_type.map(|s| s.to_string()),
            Some(element_kind),
            false,
        );
    }

    fn push(&mut self, name: &str, kind: TypeKind, base: Option<usize>) -> TypeHandle {
        let index = self.types.len();
        self.types.push(PendingType {
            name: name.to_string(),
            kind,
            base,
            fields: Vec::new(),
            enum_options: Vec::new(),
        });
        TypeHandle(index)
    }

    fn push_field(
        &mut self,
        handle: TypeHandle,
        name: &str,
        kind: TypeKind,
        type_name: Option<String>,
        element_kind: Option<TypeKind>,
        transient: bool,
    ) {
        self.types[handle.0].fields.push(PendingField {
            name: name.to_string(),
            kind,
            type_name,
            element_kind,
            transient,
        });
    }

    /// Compute layouts, register ordered-collection types, and produce the
    /// registry.
    pub fn build(self) -> SchemaRegistry {
        let by_name: FxHashMap<&str, usize> = self
            .types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), i))
            .collect();

        let mut layouts: Vec<Option<(u16, u8)>> = vec![None; self.types.len()];
        for i in 0..self.types.len() {
            Self::layout_of(&self.types, &by_name, &mut layouts, i);
        }

        let mut registry = SchemaRegistry::default();

        for (i, pending) in self.types.iter().enumerate() {
            let (size, alignment) = layouts[i].expect("layout computed");
            let name_hash = hash::hash_str(&pending.name);

            let mut fields = Vec::new();
            if let Some(base) = pending.base {
                fields.push(FieldSchema {
                    name: INHERITED_FIELD.to_string(),
                    name_hash: hash::hash_str(INHERITED_FIELD),
                    kind: TypeKind::Inherited,
                    flags: flags::with_kind(TypeKind::Inherited),
                    type_name: Some(self.types[base].name.clone()),
                    element_kind: None,
                    offset: 8,
                    second_offset: 0,
                    transient: false,
                });
            }

            let mut cursor = match (pending.kind, pending.base) {
                (TypeKind::Class, Some(base)) => layouts[base].expect("layout computed").0 as u32,
                (TypeKind::Class, None) => 8,
                _ => 0,
            };

            for field in &pending.fields {
                let (fsize, falign) = Self::field_layout(&self.types, &by_name, &layouts, field);
                cursor = align_up(cursor, falign as u32);
                fields.push(FieldSchema {
                    name: field.name.clone(),
                    name_hash: hash::hash_str(&field.name),
                    kind: field.kind,
                    flags: flags::with_kind(field.kind),
                    type_name: field.type_name.clone(),
                    element_kind: field.element_kind,
                    offset: cursor,
                    second_offset: 0,
                    transient: field.transient,
                });
                cursor += fsize as u32;
            }

            let index = registry.types.len();
            registry.types.push(TypeSchema {
                name: pending.name.clone(),
                name_hash,
                kind: pending.kind,
                flags: flags::with_kind(pending.kind),
                alignment,
                size,
                array_hash: 0,
                fields,
                enum_options: pending.enum_options.clone(),
            });
            registry.by_hash.insert(name_hash, index);
        }

        // Register one ordered-collection type per distinct element.
        let array_fields: Vec<(TypeKind, Option<String>)> = registry
            .types
            .iter()
            .flat_map(|t| t.fields.iter())
            .filter(|f| f.kind == TypeKind::Array)
            .filter_map(|f| f.element_kind.map(|k| (k, f.type_name.clone())))
            .collect();

        for (element_kind, element_type) in array_fields {
            let array_hash = array_hash_for(element_kind, element_type.as_deref());
            if registry.by_array_hash.contains_key(&array_hash) {
                continue;
            }

            let member_type = match element_kind {
                TypeKind::Class => None,
                _ => element_type,
            };
            let canonical = match element_kind {
                TypeKind::Class => DATA_CONTAINER,
                _ => member_type.as_deref().unwrap_or(element_kind.as_str()),
            };

            let index = registry.types.len();
            registry.types.push(TypeSchema {
                name: format!("{}[]", canonical),
                name_hash: array_hash,
                kind: TypeKind::Array,
                flags: flags::with_kind(TypeKind::Array),
                alignment: 4,
                size: 4,
                array_hash,
                fields: vec![FieldSchema {
                    name: "member".to_string(),
                    name_hash: hash::hash_str("member"),
                    kind: element_kind,
                    flags: flags::with_kind(element_kind),
                    type_name: member_type,
                    element_kind: None,
                    offset: 0,
                    second_offset: 0,
                    transient: false,
                }],
                enum_options: Vec::new(),
            });
            registry.by_array_hash.insert(array_hash, index);
        }

        registry
    }

    fn layout_of(
        types: &[PendingType],
        by_name: &FxHashMap<&str, usize>,
        layouts: &mut Vec<Option<(u16, u8)>>,
        index: usize,
    ) -> (u16, u8) {
        if let Some(layout) = layouts[index] {
            return layout;
        }

        let pending = &types[index];
        let layout = match pending.kind {
            TypeKind::Enum => (4, 4),
            _ => {
                let (mut cursor, mut alignment) = match (pending.kind, pending.base) {
                    (TypeKind::Class, Some(base)) => {
                        let (bsize, balign) = Self::layout_of(types, by_name, layouts, base);
                        (bsize as u32, balign.max(4))
                    }
                    (TypeKind::Class, None) => (8, 4),
                    _ => (0, 1),
                };

                for field in &pending.fields {
                    let (fsize, falign) = Self::field_layout_pending(types, by_name, layouts, field);
                    alignment = alignment.max(falign);
                    cursor = align_up(cursor, falign as u32);
                    cursor += fsize as u32;
                }

                let size = align_up(cursor, alignment as u32);
                (size as u16, alignment)
            }
        };

        layouts[index] = Some(layout);
        layout
    }

    fn field_layout_pending(
        types: &[PendingType],
        by_name: &FxHashMap<&str, usize>,
        layouts: &mut Vec<Option<(u16, u8)>>,
        field: &PendingField,
    ) -> (u16, u8) {
        match field.kind {
            TypeKind::Struct => {
                let name = field.type_name.as_deref().expect("struct field needs a type");
                let inner = *by_name
                    .get(name)
                    .unwrap_or_else(|| panic!("unknown value type '{}'", name));
                Self::layout_of(types, by_name, layouts, inner)
            }
            kind => (kind.wire_size() as u16, kind.alignment() as u8),
        }
    }

    fn field_layout(
        types: &[PendingType],
        by_name: &FxHashMap<&str, usize>,
        layouts: &[Option<(u16, u8)>],
        field: &PendingField,
    ) -> (u16, u8) {
        match field.kind {
            TypeKind::Struct => {
                let name = field.type_name.as_deref().expect("struct field needs a type");
                let inner = *by_name
                    .get(name)
                    .unwrap_or_else(|| panic!("unknown value type '{}'", name));
                layouts[inner].expect("layout computed")
            }
            kind => (kind.wire_size() as u16, kind.alignment() as u8),
        }
    }
}

#[inline]
fn align_up(value: u32, alignment: u32) -> u32 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_layout_starts_after_header() {
        let mut sb = SchemaBuilder::new();
        let base = sb.class("Base");
        sb.field(base, "a", TypeKind::UInt32);

        let schema = sb.build();
        let ts = schema.type_by_name("Base").unwrap();
        assert_eq!(ts.fields[0].offset, 8);
        assert_eq!(ts.size, 12);
        assert_eq!(ts.alignment, 4);
    }

    #[test]
    fn test_derived_fields_follow_base_size() {
        let mut sb = SchemaBuilder::new();
        let base = sb.class("Base");
        sb.field(base, "a", TypeKind::UInt32);
        let child = sb.class_with_base("Child", base);
        sb.field(child, "b", TypeKind::Float32);

        let schema = sb.build();
        let base_ts = schema.type_by_name("Base").unwrap();
        let child_ts = schema.type_by_name("Child").unwrap();

        assert_eq!(child_ts.base_name(), Some("Base"));
        assert_eq!(child_ts.fields[0].kind, TypeKind::Inherited);
        // The derived type's own field lands right after the base footprint.
        let b = &child_ts.fields[1];
        assert_eq!(b.offset, base_ts.size as u32);
    }

    #[test]
    fn test_value_type_layout_from_zero() {
        let mut sb = SchemaBuilder::new();
        let pair = sb.value_type("Pair");
        sb.field(pair, "lo", TypeKind::UInt16);
        sb.field(pair, "hi", TypeKind::UInt16);

        let schema = sb.build();
        let ts = schema.type_by_name("Pair").unwrap();
        assert_eq!(ts.fields[0].offset, 0);
        assert_eq!(ts.fields[1].offset, 2);
        assert_eq!(ts.size, 4);
        assert_eq!(ts.alignment, 2);
    }

    #[test]
    fn test_properties_flatten_base_first() {
        let mut sb = SchemaBuilder::new();
        let base = sb.class("Base");
        sb.field(base, "a", TypeKind::UInt32);
        let child = sb.class_with_base("Child", base);
        sb.field(child, "b", TypeKind::Float32);

        let schema = sb.build();
        let hash = schema.type_by_name("Child").unwrap().name_hash;
        let props: Vec<_> = schema.properties_of(hash).iter().map(|f| f.name.clone()).collect();
        assert_eq!(props, ["a", "b"]);
    }

    #[test]
    fn test_new_instance_defaults() {
        let mut sb = SchemaBuilder::new();
        let vec2 = sb.value_type("Vec2");
        sb.field(vec2, "x", TypeKind::Float32);
        sb.field(vec2, "y", TypeKind::Float32);
        let entity = sb.class("Entity");
        sb.struct_field(entity, "pos", "Vec2");
        sb.array_field(entity, "tags", TypeKind::CString, None);
        sb.pointer_field(entity, "next", Some("Entity"));

        let schema = sb.build();
        let hash = schema.type_by_name("Entity").unwrap().name_hash;
        let obj = schema.new_instance(hash).unwrap();

        assert!(matches!(obj.get("pos"), Some(Value::Struct(_))));
        assert_eq!(obj.get("tags"), Some(&Value::Array(vec![])));
        assert_eq!(
            obj.get("next"),
            Some(&Value::Pointer(crate::value::PointerRef::Null))
        );
        assert_eq!(schema.new_instance(0xDEAD_BEEF), None);
    }

    #[test]
    fn test_pointer_arrays_canonicalize() {
        assert_eq!(
            array_hash_for(TypeKind::Class, Some("Entity")),
            array_hash_for(TypeKind::Class, Some("Widget")),
        );
        assert_ne!(
            array_hash_for(TypeKind::Int32, None),
            array_hash_for(TypeKind::UInt32, None),
        );
    }

    #[test]
    fn test_array_type_registration() {
        let mut sb = SchemaBuilder::new();
        let entity = sb.class("Entity");
        sb.array_field(entity, "values", TypeKind::Int32, None);

        let schema = sb.build();
        let field = &schema.type_by_name("Entity").unwrap().fields[0];
        let array_type = schema.array_type_for(field).unwrap();
        assert_eq!(array_type.kind, TypeKind::Array);
        assert_eq!(array_type.fields.len(), 1);
        assert_eq!(array_type.fields[0].kind, TypeKind::Int32);
    }
}
