//! Partition-dialect writer.
//!
//! Emission happens in three stages: the pre-pass walk
//! ([`collect`](super::collect::collect)) gathers types, imports, strings
//! and row counts; the descriptor tables are synthesized from the schema;
//! then instances are laid out positionally with arrays and boxed values
//! streamed into side buffers. Region lengths are known only at the end, so
//! the header and the array/boxed tables are reserved up front and patched
//! in place.

use hashbrown::{HashMap as FastHashMap, HashSet as FastHashSet};
use rustc_hash::FxHasher;

use ebxkit_common::{hash, BinaryWriter};

use crate::asset::EbxAsset;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::schema::{array_hash_for, FieldSchema, SchemaRegistry, TypeSchema};
use crate::structs::{EbxArray, EbxBoxedValue, EbxFieldDescriptor, EbxInstanceEntry, EbxTypeDescriptor};
use crate::types::{flags, TypeKind};
use crate::value::{BoxedValue, PointerRef, Value};

use super::collect::{collect, Collected};

type FxHashMap<K, V> = FastHashMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;
type FxHashSet<T> = FastHashSet<T, std::hash::BuildHasherDefault<FxHasher>>;

/// Sentinel string-pool offset meaning "no string".
const NO_STRING: u32 = 0xFFFF_FFFF;

/// Writer for Partition payloads.
pub struct PartitionWriter<'a> {
    schema: &'a SchemaRegistry,
    version: u32,
}

impl<'a> PartitionWriter<'a> {
    /// Create a writer for the given partition version (2 or 4).
    pub fn new(schema: &'a SchemaRegistry, version: u32) -> Result<Self> {
        if version != 2 && version != 4 {
            return Err(Error::UnsupportedVersion(version));
        }
        Ok(Self { schema, version })
    }

    /// Emit the asset as a complete payload.
    ///
    /// Identical inputs produce byte-identical output.
    pub fn write_asset(&self, asset: &EbxAsset) -> Result<Vec<u8>> {
        let collected = collect(self.schema, asset)?;

        if self.version == 2 && collected.boxed_count > 0 {
            return Err(Error::InvalidAsset("boxed values require version 4"));
        }
        if asset.objects().len() > u16::MAX as usize {
            return Err(Error::InvalidAsset("too many instances"));
        }

        let mut tables = Tables::new(self.schema);
        for &type_hash in &collected.type_order {
            tables.ensure_hash(type_hash)?;
        }
        for &type_hash in &collected.boxed_types {
            tables.ensure_hash(type_hash)?;
        }
        let rows = tables.rows()?;

        let entries = self.instance_entries(asset, &tables)?;
        let unique_type_count = {
            let mut seen: FxHashSet<u16> = FxHashSet::default();
            entries.iter().filter(|e| seen.insert(e.type_ref)).count()
        };

        // String pool content is final before layout; the instance region
        // starts right after it.
        let mut pool = StringPool::default();
        for s in &collected.strings {
            pool.add(s);
        }
        let strings_len = align_up(pool.data.len(), 16);

        let header_len = if self.version == 4 { 64 } else { 72 };
        let imports_offset = header_len;
        let names_offset = imports_offset + collected.imports.len() * 32;
        let fields_offset = names_offset + rows.names_len;
        let types_offset = fields_offset + rows.fields.len() * 16;
        let entries_offset = types_offset + rows.types.len() * 16;
        let arrays_table_offset = align_up(entries_offset + entries.len() * 4, 16);
        let boxed_table_offset =
            align_up(arrays_table_offset + collected.array_count * 12, 16);
        let strings_offset = align_up(boxed_table_offset + collected.boxed_count * 8, 16);
        let instance_start = strings_offset + strings_len;

        let mut w = BinaryWriter::with_capacity(instance_start + 256);

        // Tables land first; the header is patched at the very end.
        w.seek(imports_offset);
        for import in &collected.imports {
            w.write_struct(import);
        }
        w.write_bytes(&rows.names_bytes);
        for fd in &rows.fields {
            w.write_struct(fd);
        }
        for td in &rows.types {
            w.write_struct(td);
        }
        for entry in &entries {
            w.write_struct(entry);
        }

        w.seek(strings_offset);
        w.write_bytes(&pool.data);

        // Instance region.
        let mut emitter = Emitter {
            schema: self.schema,
            tables: &tables,
            pool: &pool,
            collected: &collected,
            instance_count: asset.objects().len(),
            array_rows: Vec::with_capacity(collected.array_count),
            arrays_data: BinaryWriter::new(),
            boxed_rows: Vec::with_capacity(collected.boxed_count),
            boxed_data: BinaryWriter::new(),
        };

        w.seek(instance_start);
        for (index, object) in asset.objects().iter().enumerate() {
            let ts = self
                .schema
                .type_by_hash(object.type_hash)
                .ok_or(Error::SchemaMismatch(object.type_hash))?;

            w.align(ts.alignment as usize);
            if asset.is_exported(index) {
                w.write_guid(object.class_guid.guid);
            }
            if ts.alignment != 4 {
                w.write_bytes(&[0u8; 8]);
            }
            let start = w.position() - 8;
            emitter.write_class(&mut w, ts, object, start)?;
            w.seek(start + ts.size as usize);
        }
        w.align(16);
        let data_len = w.position() - instance_start;

        // Array and boxed-value regions follow the instance data.
        w.write_bytes(emitter.arrays_data.as_slice());
        w.align(16);
        let boxed_region = w.position();
        w.write_bytes(emitter.boxed_data.as_slice());
        let file_end = w.position();

        if emitter.array_rows.len() != collected.array_count
            || emitter.boxed_rows.len() != collected.boxed_count
        {
            return Err(Error::InvalidAsset("pre-pass row counts diverged"));
        }

        // Backpatch the reserved tables.
        w.seek(arrays_table_offset);
        for row in &emitter.array_rows {
            w.write_struct(row);
        }
        w.seek(boxed_table_offset);
        for row in &emitter.boxed_rows {
            w.write_struct(row);
        }

        // Header.
        w.seek(0);
        w.write_u32(self.version);
        w.write_u32(strings_offset as u32);
        w.write_u32((file_end - strings_offset) as u32);
        w.write_u32(collected.imports.len() as u32);
        w.write_u16(asset.objects().len() as u16);
        w.write_u16(asset.exported_count() as u16);
        w.write_u16(unique_type_count as u16);
        w.write_u16(rows.types.len() as u16);
        w.write_u16(rows.fields.len() as u16);
        w.write_u16(rows.names_len as u16);
        w.write_u32(strings_len as u32);
        w.write_u32(collected.array_count as u32);
        w.write_u32(data_len as u32);
        w.write_guid(asset.file_guid());
        if self.version == 4 {
            w.write_u32(collected.boxed_count as u32);
            w.write_u32((boxed_region - instance_start) as u32);
        } else {
            w.write_bytes(&[0u8; 16]);
        }

        Ok(w.into_inner())
    }

    fn instance_entries(
        &self,
        asset: &EbxAsset,
        tables: &Tables<'_>,
    ) -> Result<Vec<EbxInstanceEntry>> {
        let mut entries: Vec<EbxInstanceEntry> = Vec::new();
        for object in asset.objects() {
            let type_ref = tables.index_of(object.type_hash)?;
            match entries.last_mut() {
                Some(last) if last.type_ref == type_ref && last.count < u16::MAX => {
                    last.count += 1;
                }
                _ => entries.push(EbxInstanceEntry { type_ref, count: 1 }),
            }
        }
        Ok(entries)
    }
}

/// The descriptor tables under construction: schema types in emission order
/// plus the hash-to-index lookup.
struct Tables<'s> {
    schema: &'s SchemaRegistry,
    order: Vec<&'s TypeSchema>,
    indices: FxHashMap<u32, u16>,
}

struct Rows {
    types: Vec<EbxTypeDescriptor>,
    fields: Vec<EbxFieldDescriptor>,
    names_bytes: Vec<u8>,
    names_len: usize,
}

impl<'s> Tables<'s> {
    fn new(schema: &'s SchemaRegistry) -> Self {
        Self {
            schema,
            order: Vec::new(),
            indices: FxHashMap::default(),
        }
    }

    fn index_of(&self, type_hash: u32) -> Result<u16> {
        self.indices
            .get(&type_hash)
            .copied()
            .ok_or(Error::SchemaMismatch(type_hash))
    }

    /// Find the descriptor index for a type hash (name hash, or array hash
    /// for ordered-collection types), registering it and its referenced
    /// types on first use.
    fn ensure_hash(&mut self, type_hash: u32) -> Result<u16> {
        if let Some(&index) = self.indices.get(&type_hash) {
            return Ok(index);
        }
        let ts = self
            .schema
            .type_by_hash(type_hash)
            .or_else(|| self.schema.array_type_by_hash(type_hash))
            .ok_or(Error::SchemaMismatch(type_hash))?;
        self.ensure(ts)
    }

    fn ensure(&mut self, ts: &'s TypeSchema) -> Result<u16> {
        if let Some(&index) = self.indices.get(&ts.name_hash) {
            return Ok(index);
        }
        if self.order.len() >= u16::MAX as usize {
            return Err(Error::InvalidAsset("too many type descriptors"));
        }

        let index = self.order.len() as u16;
        self.indices.insert(ts.name_hash, index);
        self.order.push(ts);

        for field in &ts.fields {
            if field.transient {
                continue;
            }
            match field.kind {
                TypeKind::Inherited | TypeKind::Struct | TypeKind::Enum => {
                    let name = field
                        .type_name
                        .as_deref()
                        .ok_or(Error::InvalidAsset("field is missing its target type"))?;
                    let inner = self
                        .schema
                        .type_by_name(name)
                        .ok_or_else(|| Error::SchemaMismatch(hash::hash_str(name)))?;
                    self.ensure(inner)?;
                }
                TypeKind::Array => {
                    let element_kind = field
                        .element_kind
                        .ok_or(Error::InvalidAsset("array field without element kind"))?;
                    self.ensure_hash(array_hash_for(element_kind, field.type_name.as_deref()))?;
                }
                _ => {}
            }
        }
        Ok(index)
    }

    /// Synthesize the descriptor rows and the type-names region.
    fn rows(&self) -> Result<Rows> {
        let mut types = Vec::with_capacity(self.order.len());
        let mut fields = Vec::new();
        let mut names_bytes = Vec::new();
        let mut seen_names: FxHashSet<&str> = FxHashSet::default();
        let mut add_name = |name: &'s str, bytes: &mut Vec<u8>| {
            if !name.is_empty() && seen_names.insert(name) {
                bytes.extend_from_slice(name.as_bytes());
                bytes.push(0);
            }
        };

        for ts in &self.order {
            // Array types are addressed by array hash, which is not the
            // hash of any printable name; they stay out of the names region.
            if ts.kind != TypeKind::Array {
                add_name(&ts.name, &mut names_bytes);
            }

            let field_index = fields.len() as i32;
            let mut field_count: u8 = 0;
            for field in &ts.fields {
                if field.transient {
                    continue;
                }
                add_name(&field.name, &mut names_bytes);
                fields.push(EbxFieldDescriptor {
                    name_hash: field.name_hash,
                    flags: field.flags,
                    type_ref: self.field_type_ref(field)?,
                    data_offset: field.offset,
                    second_offset: field.second_offset,
                });
                field_count += 1;
            }

            types.push(EbxTypeDescriptor {
                name_hash: ts.name_hash,
                field_index,
                field_count,
                alignment: ts.alignment,
                flags: ts.flags,
                size: ts.size,
                second_size: ts.size,
            });
        }

        if fields.len() > u16::MAX as usize {
            return Err(Error::InvalidAsset("too many field descriptors"));
        }
        let names_len = names_bytes.len();
        if names_len > u16::MAX as usize {
            return Err(Error::InvalidAsset("type-names region too large"));
        }

        Ok(Rows { types, fields, names_bytes, names_len })
    }

    /// The emitted `type_ref` for a field. Refs are always absolute; the
    /// relative bit stays clear.
    fn field_type_ref(&self, field: &FieldSchema) -> Result<u16> {
        match field.kind {
            TypeKind::Inherited | TypeKind::Struct | TypeKind::Enum => {
                let name = field
                    .type_name
                    .as_deref()
                    .ok_or(Error::InvalidAsset("field is missing its target type"))?;
                self.index_of(hash::hash_str(name))
            }
            TypeKind::Array => {
                let element_kind = field
                    .element_kind
                    .ok_or(Error::InvalidAsset("array field without element kind"))?;
                self.index_of(array_hash_for(element_kind, field.type_name.as_deref()))
            }
            _ => Ok(0),
        }
    }
}

/// Interned string pool with an eager offset map.
#[derive(Debug, Default)]
struct StringPool {
    data: Vec<u8>,
    offsets: FxHashMap<String, u32>,
}

impl StringPool {
    /// Add a string, returning its pool offset. Empty strings intern to the
    /// no-string sentinel.
    fn add(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return NO_STRING;
        }
        if let Some(&offset) = self.offsets.get(s) {
            return offset;
        }
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        self.offsets.insert(s.to_string(), offset);
        offset
    }

    fn offset_of(&self, s: &str) -> Option<u32> {
        if s.is_empty() {
            return Some(NO_STRING);
        }
        self.offsets.get(s).copied()
    }
}

/// Instance-region emitter. Arrays and boxed values stream into side
/// buffers whose contents are appended after the instance data.
struct Emitter<'w> {
    schema: &'w SchemaRegistry,
    tables: &'w Tables<'w>,
    pool: &'w StringPool,
    collected: &'w Collected,
    instance_count: usize,
    array_rows: Vec<EbxArray>,
    arrays_data: BinaryWriter,
    boxed_rows: Vec<EbxBoxedValue>,
    boxed_data: BinaryWriter,
}

impl<'w> Emitter<'w> {
    fn write_class(
        &mut self,
        dst: &mut BinaryWriter,
        ts: &TypeSchema,
        object: &Object,
        start: usize,
    ) -> Result<()> {
        for field in &ts.fields {
            if field.transient {
                continue;
            }

            if field.kind == TypeKind::Inherited {
                let base = self
                    .schema
                    .base_of(ts)
                    .ok_or(Error::InvalidAsset("inherited field without a base type"))?;
                self.write_class(dst, base, object, start)?;
                continue;
            }

            dst.seek(start + field.offset as usize);
            let value = object
                .get_hash(field.name_hash)
                .ok_or_else(|| Error::PropertyExtraction {
                    property: field.name.clone(),
                    expected: "declared property",
                })?;
            self.write_field(dst, field, value)?;
        }
        Ok(())
    }

    fn write_field(
        &mut self,
        dst: &mut BinaryWriter,
        field: &FieldSchema,
        value: &Value,
    ) -> Result<()> {
        match (field.kind, value) {
            (TypeKind::Boolean, Value::Bool(v)) => dst.write_bool(*v),
            (TypeKind::Int8, Value::Int8(v)) => dst.write_i8(*v),
            (TypeKind::UInt8, Value::UInt8(v)) => dst.write_u8(*v),
            (TypeKind::Int16, Value::Int16(v)) => dst.write_i16(*v),
            (TypeKind::UInt16, Value::UInt16(v)) => dst.write_u16(*v),
            (TypeKind::Int32, Value::Int32(v)) => dst.write_i32(*v),
            (TypeKind::UInt32, Value::UInt32(v)) => dst.write_u32(*v),
            (TypeKind::Int64, Value::Int64(v)) => dst.write_i64(*v),
            (TypeKind::UInt64, Value::UInt64(v)) => dst.write_u64(*v),
            (TypeKind::Float32, Value::Float32(v)) => dst.write_f32(*v),
            (TypeKind::Float64, Value::Float64(v)) => dst.write_f64(*v),
            (TypeKind::Guid, Value::Guid(g)) => dst.write_guid(*g),
            (TypeKind::Sha1, Value::Sha1(digest)) => dst.write_bytes(digest),
            (TypeKind::String, Value::String(s)) => dst.write_fixed_string(s, 32),
            (TypeKind::CString, Value::CString(s)) => {
                let offset = self.pool_offset(field, s)?;
                dst.write_u32(offset);
            }
            (TypeKind::ResourceRef, Value::ResourceRef(v)) => dst.write_u64(*v),
            (TypeKind::FileRef, Value::FileRef(s)) => {
                let offset = self.pool_offset(field, s)?;
                dst.write_u32(offset);
                dst.write_u32(0);
            }
            (TypeKind::TypeRef, Value::TypeRef(r)) | (TypeKind::Delegate, Value::Delegate(r)) => {
                let offset = self.pool_offset(field, &r.to_wire_string())?;
                dst.write_u32(offset);
                dst.write_u32(0);
            }
            (TypeKind::Enum, Value::Enum(v)) => dst.write_i32(*v),
            (TypeKind::Struct, Value::Struct(object)) => {
                let inner = self.inner_type(field)?;
                dst.align(inner.alignment as usize);
                let start = dst.position();
                self.write_class(dst, inner, object, start)?;
                dst.seek(start + inner.size as usize);
            }
            (TypeKind::Class, Value::Pointer(pointer)) => {
                let raw = self.pointer_word(field, pointer)?;
                dst.write_u32(raw);
            }
            (TypeKind::Array, Value::Array(values)) => {
                let element_kind = field
                    .element_kind
                    .ok_or(Error::InvalidAsset("array field without element kind"))?;
                let row = self.write_array(element_kind, field.type_name.as_deref(), values)?;
                dst.write_i32(row);
            }
            (TypeKind::BoxedValueRef, Value::BoxedValue(None)) => {
                dst.write_i32(-1);
                dst.write_bytes(&[0u8; 12]);
            }
            (TypeKind::BoxedValueRef, Value::BoxedValue(Some(boxed))) => {
                let row = self.write_boxed(boxed)?;
                dst.write_i32(row);
                dst.write_bytes(&[0u8; 12]);
            }
            (kind, _) => {
                return Err(Error::PropertyExtraction {
                    property: field.name.clone(),
                    expected: kind.as_str(),
                });
            }
        }
        Ok(())
    }

    /// Emit one array's elements into the array region and return its row
    /// index.
    fn write_array(
        &mut self,
        element_kind: TypeKind,
        element_type: Option<&str>,
        values: &[Value],
    ) -> Result<i32> {
        let array_hash = array_hash_for(element_kind, element_type);
        let type_ref = self.tables.index_of(array_hash)?;

        let element_field = FieldSchema {
            name: "member".to_string(),
            name_hash: hash::hash_str("member"),
            kind: element_kind,
            flags: flags::with_kind(element_kind),
            type_name: element_type.map(|s| s.to_string()),
            element_kind: None,
            offset: 0,
            second_offset: 0,
            transient: false,
        };

        // Elements build in their own buffer; the append below settles this
        // array's region offset after any nested arrays have landed.
        let mut elements = BinaryWriter::new();
        for value in values {
            self.write_field(&mut elements, &element_field, value)?;
        }

        self.arrays_data.align(16);
        let offset = self.arrays_data.position() as u32;
        self.arrays_data.write_bytes(elements.as_slice());

        let row_index = self.array_rows.len() as i32;
        self.array_rows.push(EbxArray {
            offset,
            count: values.len() as u32,
            type_ref: type_ref as i32,
        });
        Ok(row_index)
    }

    /// Emit one boxed payload into the boxed-value region and return its row
    /// index.
    fn write_boxed(&mut self, boxed: &BoxedValue) -> Result<i32> {
        let mut payload = BinaryWriter::new();

        let type_ref = match boxed.kind {
            TypeKind::Array => {
                let array_ts = self
                    .schema
                    .array_type_by_hash(boxed.type_hash)
                    .ok_or(Error::SchemaMismatch(boxed.type_hash))?;
                let member = &array_ts.fields[0];
                let values = boxed.value.as_array().ok_or(Error::PropertyExtraction {
                    property: "boxed".to_string(),
                    expected: "Array",
                })?;
                let row = self.write_array(member.kind, member.type_name.as_deref(), values)?;
                payload.write_i32(row);
                self.tables.index_of(boxed.type_hash)?
            }
            TypeKind::Struct | TypeKind::Enum => {
                let ts = self
                    .schema
                    .type_by_hash(boxed.type_hash)
                    .ok_or(Error::SchemaMismatch(boxed.type_hash))?;
                let field = FieldSchema {
                    name: "boxed".to_string(),
                    name_hash: 0,
                    kind: boxed.kind,
                    flags: flags::with_kind(boxed.kind),
                    type_name: Some(ts.name.clone()),
                    element_kind: None,
                    offset: 0,
                    second_offset: 0,
                    transient: false,
                };
                self.write_field(&mut payload, &field, &boxed.value)?;
                self.tables.index_of(boxed.type_hash)?
            }
            kind => {
                let field = FieldSchema {
                    name: "boxed".to_string(),
                    name_hash: 0,
                    kind,
                    flags: flags::with_kind(kind),
                    type_name: None,
                    element_kind: None,
                    offset: 0,
                    second_offset: 0,
                    transient: false,
                };
                self.write_field(&mut payload, &field, &boxed.value)?;
                0
            }
        };

        self.boxed_data.align(16);
        let offset = self.boxed_data.position() as u32;
        self.boxed_data.write_bytes(payload.as_slice());

        let row_index = self.boxed_rows.len() as i32;
        self.boxed_rows.push(EbxBoxedValue {
            offset,
            type_ref,
            kind: boxed.kind as u16,
        });
        Ok(row_index)
    }

    fn pointer_word(&self, field: &FieldSchema, pointer: &PointerRef) -> Result<u32> {
        match pointer {
            PointerRef::Null => Ok(0),
            PointerRef::Internal(index) => {
                if *index >= self.instance_count {
                    return Err(Error::IndexOutOfRange {
                        what: "instance",
                        index: *index as i64,
                        len: self.instance_count,
                    });
                }
                Ok(*index as u32 + 1)
            }
            PointerRef::External(import) => {
                let index = self
                    .collected
                    .import_indices
                    .get(import)
                    .copied()
                    .ok_or_else(|| Error::PropertyExtraction {
                        property: field.name.clone(),
                        expected: "collected import",
                    })?;
                Ok(0x8000_0000 | index as u32)
            }
        }
    }

    fn inner_type(&self, field: &FieldSchema) -> Result<&'w TypeSchema> {
        let name = field
            .type_name
            .as_deref()
            .ok_or(Error::InvalidAsset("field is missing its target type"))?;
        self.schema
            .type_by_name(name)
            .ok_or_else(|| Error::SchemaMismatch(hash::hash_str(name)))
    }

    fn pool_offset(&self, field: &FieldSchema, s: &str) -> Result<u32> {
        self.pool
            .offset_of(s)
            .ok_or_else(|| Error::PropertyExtraction {
                property: field.name.clone(),
                expected: "interned string",
            })
    }
}

#[inline]
fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_pool_interns() {
        let mut pool = StringPool::default();
        let a = pool.add("hello");
        let b = pool.add("world");
        let c = pool.add("hello");

        assert_eq!(a, 0);
        assert_eq!(b, 6);
        assert_eq!(c, a);
        assert_eq!(pool.add(""), NO_STRING);
        assert_eq!(pool.data, b"hello\0world\0");
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 4), 20);
    }
}
