//! Partition-dialect reader.
//!
//! Parses the fixed header and descriptor tables, pre-allocates blank
//! instances through the schema, then decodes every instance field-by-field
//! under the direction of the wire descriptors.

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;

use ebxkit_common::{hash, BinaryReader, EbxGuid};

use crate::asset::EbxAsset;
use crate::error::{Error, Result};
use crate::object::{AssetClassGuid, Object};
use crate::resolver::{TypeIx, TypeResolver};
use crate::schema::SchemaRegistry;
use crate::structs::{
    EbxArray, EbxBoxedValue, EbxFieldDescriptor, EbxImportReference, EbxInstanceEntry,
};
use crate::types::TypeKind;
use crate::value::{BoxedValue, PointerRef, TypeRefValue, Value};

type FxHashMap<K, V> = FastHashMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

/// Sentinel string-pool offset meaning "no string".
const NO_STRING: u32 = 0xFFFF_FFFF;

/// Reader for Partition payloads (magic 2 or 4).
pub struct PartitionReader<'a> {
    r: BinaryReader<'a>,
    schema: &'a SchemaRegistry,
    resolver: TypeResolver,

    version: u32,
    file_guid: EbxGuid,
    strings_offset: usize,
    strings_len: usize,
    arrays_offset: usize,
    boxed_offset: usize,
    exported_count: usize,

    imports: Vec<EbxImportReference>,
    instance_entries: Vec<EbxInstanceEntry>,
    arrays: Vec<EbxArray>,
    boxed_values: Vec<EbxBoxedValue>,

    objects: Vec<Object>,
    ref_counts: Vec<u32>,
}

impl<'a> PartitionReader<'a> {
    /// Parse the header and descriptor tables, leaving the reader positioned
    /// at the start of the instance region.
    pub fn new(data: &'a [u8], schema: &'a SchemaRegistry) -> Result<Self> {
        let mut r = BinaryReader::new(data);

        let magic = r.read_u32()?;
        if magic != 2 && magic != 4 {
            return Err(Error::UnsupportedVersion(magic));
        }

        let strings_offset = r.read_u32()? as usize;
        let _strings_and_data_len = r.read_u32()?;
        let import_count = r.read_u32()? as usize;
        let instance_count = r.read_u16()? as usize;
        let exported_count = r.read_u16()? as usize;
        let _unique_type_count = r.read_u16()?;
        let type_desc_count = r.read_u16()? as usize;
        let field_desc_count = r.read_u16()? as usize;
        let type_names_len = r.read_u16()? as usize;
        let strings_len = r.read_u32()? as usize;
        let array_count = r.read_u32()? as usize;
        let data_len = r.read_u32()? as usize;
        let file_guid = r.read_guid()?;

        let arrays_offset = strings_offset + strings_len + data_len;

        let (boxed_count, boxed_offset) = if magic == 4 {
            let count = r.read_u32()? as usize;
            let offset = r.read_u32()? as usize + strings_offset + strings_len;
            (count, offset)
        } else {
            r.advance(16);
            (0, 0)
        };

        let mut imports = Vec::with_capacity(import_count);
        for _ in 0..import_count {
            imports.push(r.read_struct::<EbxImportReference>()?);
        }

        let names = Self::read_type_names(&mut r, type_names_len)?;

        let mut fields = Vec::with_capacity(field_desc_count);
        for _ in 0..field_desc_count {
            fields.push(r.read_struct::<EbxFieldDescriptor>()?);
        }

        let mut types = Vec::with_capacity(type_desc_count);
        for _ in 0..type_desc_count {
            types.push(r.read_struct::<crate::structs::EbxTypeDescriptor>()?);
        }

        let mut instance_entries = Vec::with_capacity(instance_count);
        let mut remaining = instance_count;
        while remaining > 0 {
            let entry = r.read_struct::<EbxInstanceEntry>()?;
            if entry.count == 0 || entry.count as usize > remaining {
                return Err(Error::IndexOutOfRange {
                    what: "instance entry",
                    index: entry.count as i64,
                    len: remaining,
                });
            }
            remaining -= entry.count as usize;
            instance_entries.push(entry);
        }

        r.align(16);
        let mut arrays = Vec::with_capacity(array_count);
        for _ in 0..array_count {
            arrays.push(r.read_struct::<EbxArray>()?);
        }

        r.align(16);
        let mut boxed_values = Vec::with_capacity(boxed_count);
        for _ in 0..boxed_count {
            boxed_values.push(r.read_struct::<EbxBoxedValue>()?);
        }

        r.seek(strings_offset + strings_len);

        let resolver = TypeResolver::new(types, fields, names)?;

        Ok(Self {
            r,
            schema,
            resolver,
            version: magic,
            file_guid,
            strings_offset,
            strings_len,
            arrays_offset,
            boxed_offset,
            exported_count,
            imports,
            instance_entries,
            arrays,
            boxed_values,
            objects: Vec::new(),
            ref_counts: Vec::new(),
        })
    }

    /// The partition version this payload was written with.
    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The partition GUID.
    #[inline]
    pub fn file_guid(&self) -> EbxGuid {
        self.file_guid
    }

    /// The resolver over this payload's descriptor tables.
    #[inline]
    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    /// The import table.
    #[inline]
    pub fn imports(&self) -> &[EbxImportReference] {
        &self.imports
    }

    /// Total number of instances in the payload.
    #[inline]
    pub fn instance_total(&self) -> usize {
        self.instance_entries.iter().map(|e| e.count as usize).sum()
    }

    /// Number of exported instances.
    #[inline]
    pub fn exported_count(&self) -> usize {
        self.exported_count
    }

    /// Number of array rows.
    #[inline]
    pub fn array_count(&self) -> usize {
        self.arrays.len()
    }

    /// Number of boxed-value rows.
    #[inline]
    pub fn boxed_value_count(&self) -> usize {
        self.boxed_values.len()
    }

    /// Decode the payload into a loaded asset.
    pub fn read_asset(mut self) -> Result<EbxAsset> {
        self.read_instances()?;
        let mut asset = EbxAsset::from_parts(
            self.file_guid,
            self.objects,
            self.ref_counts,
            self.imports,
            self.exported_count,
        );
        asset.on_load_complete();
        Ok(asset)
    }

    /// Decode the payload and return only the instance list.
    pub fn read_objects(mut self) -> Result<Vec<Object>> {
        self.read_instances()?;
        Ok(self.objects)
    }

    /// Decode the payload and return the first instance.
    pub fn read_object(mut self) -> Result<Object> {
        self.read_instances()?;
        self.objects
            .into_iter()
            .next()
            .ok_or(Error::InvalidAsset("no instances"))
    }

    fn read_type_names(
        r: &mut BinaryReader<'_>,
        type_names_len: usize,
    ) -> Result<FxHashMap<u32, String>> {
        let region = r.read_bytes(type_names_len)?;
        let mut names = FxHashMap::default();
        let mut offset = 0;

        while offset < region.len() {
            let null_pos = memchr::memchr(0, &region[offset..])
                .ok_or(Error::CorruptString(offset as u32))?;
            let name = std::str::from_utf8(&region[offset..offset + null_pos])
                .map_err(ebxkit_common::Error::Utf8)?;
            names.insert(hash::hash_str(name), name.to_string());
            offset += null_pos + 1;
        }

        Ok(names)
    }

    fn read_instances(&mut self) -> Result<()> {
        if !self.objects.is_empty() {
            return Ok(());
        }

        // Pre-allocate one blank object per (type, repetition) pair.
        let mut instance_types: Vec<TypeIx> = Vec::new();
        for entry in &self.instance_entries {
            let type_ix = self.resolver.resolve_type(entry.type_ref)?;
            let td = self.resolver.type_at(type_ix)?;
            for _ in 0..entry.count {
                let object = self
                    .schema
                    .new_instance(td.name_hash)
                    .ok_or(Error::SchemaMismatch(td.name_hash))?;
                self.objects.push(object);
                self.ref_counts.push(0);
                instance_types.push(type_ix);
            }
        }

        for index in 0..instance_types.len() {
            let type_ix = instance_types[index];
            let td = self.resolver.type_at(type_ix)?;

            self.r.align(td.alignment());

            let guid = if index < self.exported_count {
                self.r.read_guid()?
            } else {
                EbxGuid::EMPTY
            };

            // Types whose alignment is not 4 carry an 8-byte object header
            // on the wire before the body.
            if td.header_alignment() != 4 {
                self.r.advance(8);
            }

            // Field offsets are measured from the object header, eight bytes
            // before the body.
            let start = self.r.position() - 8;

            let mut object = std::mem::take(&mut self.objects[index]);
            object.class_guid = AssetClassGuid::new(guid, index);
            self.read_class(type_ix, &mut object, start)?;
            self.objects[index] = object;
        }

        Ok(())
    }

    fn read_class(&mut self, type_ix: TypeIx, object: &mut Object, start: usize) -> Result<()> {
        let td = self.resolver.type_at(type_ix)?;

        for j in 0..td.field_count as usize {
            let fd = self.resolver.field_at(td.field_index as usize + j)?;
            let raw_kind = crate::types::flags::raw_kind(fd.flags);
            let kind = fd.kind().ok_or(Error::UnknownTypeKind(raw_kind))?;

            self.r.seek(start + fd.data_offset as usize);

            match kind {
                TypeKind::Inherited => {
                    let base_ix = self.resolver.resolve_type_in(type_ix, &fd)?;
                    self.read_class(base_ix, object, start)?;
                }
                TypeKind::Array => {
                    let row_index = self.r.read_i32()?;
                    let end = self.r.position();
                    let value = self.read_array(row_index)?;
                    self.r.seek(end);
                    self.assign(object, &fd, value);
                }
                _ => {
                    let value = self.read_field(type_ix, &fd, kind)?;
                    self.assign(object, &fd, value);
                }
            }
        }

        self.r.align(td.alignment());
        Ok(())
    }

    /// Assign a decoded value; unknown properties are tolerated schema
    /// drift and skipped.
    fn assign(&self, object: &mut Object, fd: &EbxFieldDescriptor, value: Value) {
        let name_hash = fd.name_hash;
        if !object.set_hash(name_hash, value) {
            log::debug!(
                "skipping field '{}' ({:#010x}): not declared by {:#010x}",
                self.resolver.name_of(name_hash),
                name_hash,
                object.type_hash,
            );
        }
    }

    fn read_field(
        &mut self,
        parent_ix: TypeIx,
        fd: &EbxFieldDescriptor,
        kind: TypeKind,
    ) -> Result<Value> {
        match kind {
            TypeKind::Boolean => Ok(Value::Bool(self.r.read_bool()?)),
            TypeKind::Int8 => Ok(Value::Int8(self.r.read_i8()?)),
            TypeKind::UInt8 => Ok(Value::UInt8(self.r.read_u8()?)),
            TypeKind::Int16 => Ok(Value::Int16(self.r.read_i16()?)),
            TypeKind::UInt16 => Ok(Value::UInt16(self.r.read_u16()?)),
            TypeKind::Int32 => Ok(Value::Int32(self.r.read_i32()?)),
            TypeKind::UInt32 => Ok(Value::UInt32(self.r.read_u32()?)),
            TypeKind::Int64 => Ok(Value::Int64(self.r.read_i64()?)),
            TypeKind::UInt64 => Ok(Value::UInt64(self.r.read_u64()?)),
            TypeKind::Float32 => Ok(Value::Float32(self.r.read_f32()?)),
            TypeKind::Float64 => Ok(Value::Float64(self.r.read_f64()?)),
            TypeKind::Guid => Ok(Value::Guid(self.r.read_guid()?)),
            TypeKind::Sha1 => {
                let bytes = self.r.read_bytes(20)?;
                let mut digest = [0u8; 20];
                digest.copy_from_slice(bytes);
                Ok(Value::Sha1(digest))
            }
            TypeKind::String => {
                let s = self.r.read_string_in_buffer(32)?;
                Ok(Value::String(s.to_string()))
            }
            TypeKind::CString => {
                let offset = self.r.read_u32()?;
                Ok(Value::CString(self.read_pool_string(offset)?))
            }
            TypeKind::ResourceRef => Ok(Value::ResourceRef(self.r.read_u64()?)),
            TypeKind::FileRef => {
                let offset = self.r.read_u32()?;
                let _pad = self.r.read_u32()?;
                Ok(Value::FileRef(self.read_pool_string(offset)?))
            }
            TypeKind::TypeRef => {
                let offset = self.r.read_u32()?;
                let _pad = self.r.read_u32()?;
                let s = self.read_pool_string(offset)?;
                Ok(Value::TypeRef(TypeRefValue::parse(&s)))
            }
            TypeKind::Delegate => {
                let offset = self.r.read_u32()?;
                let _pad = self.r.read_u32()?;
                let s = self.read_pool_string(offset)?;
                Ok(Value::Delegate(TypeRefValue::parse(&s)))
            }
            TypeKind::Enum => Ok(Value::Enum(self.r.read_i32()?)),
            TypeKind::Struct => {
                let inner_ix = self.resolver.resolve_type_in(parent_ix, fd)?;
                let inner = self.resolver.type_at(inner_ix)?;
                self.r.align(inner.alignment());
                let mut object = self
                    .schema
                    .new_instance(inner.name_hash)
                    .ok_or(Error::SchemaMismatch(inner.name_hash))?;
                // A struct body starts where it sits; its offsets are not
                // rebased to the outer object's header.
                let start = self.r.position();
                self.read_class(inner_ix, &mut object, start)?;
                Ok(Value::Struct(object))
            }
            TypeKind::Class => self.read_pointer_ref(),
            TypeKind::BoxedValueRef => {
                let row_index = self.r.read_i32()?;
                self.r.advance(12);
                let end = self.r.position();
                let value = self.read_boxed(row_index)?;
                self.r.seek(end);
                Ok(value)
            }
            TypeKind::DbObject => Err(Error::Unsupported("DbObject fields")),
            TypeKind::Void | TypeKind::Inherited | TypeKind::Array => {
                Err(Error::Unsupported("kind has no inline field form"))
            }
        }
    }

    fn read_pointer_ref(&mut self) -> Result<Value> {
        let raw = self.r.read_u32()?;

        if raw == 0 {
            return Ok(Value::Pointer(PointerRef::Null));
        }

        if raw & 0x8000_0000 != 0 {
            let import_index = (raw & 0x7FFF_FFFF) as usize;
            let import = self
                .imports
                .get(import_index)
                .copied()
                .ok_or(Error::IndexOutOfRange {
                    what: "import",
                    index: import_index as i64,
                    len: self.imports.len(),
                })?;
            return Ok(Value::Pointer(PointerRef::External(import)));
        }

        let instance_index = raw as usize - 1;
        if instance_index >= self.objects.len() {
            return Err(Error::IndexOutOfRange {
                what: "instance",
                index: instance_index as i64,
                len: self.objects.len(),
            });
        }
        self.ref_counts[instance_index] += 1;
        Ok(Value::Pointer(PointerRef::Internal(instance_index)))
    }

    fn read_array(&mut self, row_index: i32) -> Result<Value> {
        let row = self
            .arrays
            .get(row_index as usize)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                what: "array",
                index: row_index as i64,
                len: self.arrays.len(),
            })?;

        let array_ix = self.resolve_row_type(row.type_ref)?;
        let array_td = self.resolver.type_at(array_ix)?;
        let element_fd = self.resolver.field_at(array_td.field_index as usize)?;
        let raw_kind = crate::types::flags::raw_kind(element_fd.flags);
        let element_kind = element_fd.kind().ok_or(Error::UnknownTypeKind(raw_kind))?;

        self.r.seek(self.arrays_offset + row.offset as usize);

        let mut values = Vec::with_capacity(row.count as usize);
        for _ in 0..row.count {
            values.push(self.read_field(array_ix, &element_fd, element_kind)?);
        }
        Ok(Value::Array(values))
    }

    fn read_boxed(&mut self, row_index: i32) -> Result<Value> {
        if row_index == -1 {
            return Ok(Value::BoxedValue(None));
        }

        let row = self
            .boxed_values
            .get(row_index as usize)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                what: "boxed value",
                index: row_index as i64,
                len: self.boxed_values.len(),
            })?;

        let kind = TypeKind::from_u8(row.kind as u8)
            .ok_or(Error::UnknownTypeKind(row.kind as u8))?;

        self.r.seek(self.boxed_offset + row.offset as usize);

        let (type_hash, value) = match kind {
            TypeKind::Array => {
                let array_ix = self.resolver.resolve_type(row.type_ref)?;
                let hash = self.resolver.type_at(array_ix)?.name_hash;
                let inner_row = self.r.read_i32()?;
                (hash, self.read_array(inner_row)?)
            }
            TypeKind::Struct | TypeKind::Enum => {
                let type_ix = self.resolver.resolve_type(row.type_ref)?;
                let hash = self.resolver.type_at(type_ix)?.name_hash;
                let fd = synthetic_field(kind, row.type_ref);
                (hash, self.read_field(type_ix, &fd, kind)?)
            }
            _ => {
                let fd = synthetic_field(kind, 0);
                (0, self.read_field(0, &fd, kind)?)
            }
        };

        Ok(Value::BoxedValue(Some(Box::new(BoxedValue {
            kind,
            type_hash,
            value,
        }))))
    }

    fn resolve_row_type(&self, type_ref: i32) -> Result<TypeIx> {
        if type_ref < 0 || type_ref as usize >= self.resolver.type_count() {
            return Err(Error::IndexOutOfRange {
                what: "type descriptor",
                index: type_ref as i64,
                len: self.resolver.type_count(),
            });
        }
        Ok(type_ref as usize)
    }

    fn read_pool_string(&mut self, offset: u32) -> Result<String> {
        if offset == NO_STRING {
            return Ok(String::new());
        }

        let offset = offset as usize;
        if offset >= self.strings_len {
            return Err(Error::CorruptString(offset as u32));
        }

        let saved = self.r.position();
        self.r.seek(self.strings_offset + offset);
        let result = self.r.read_cstring();
        let value = match result {
            Ok(s) => {
                // The terminator must sit inside the pool.
                if self.r.position() > self.strings_offset + self.strings_len {
                    return Err(Error::CorruptString(offset as u32));
                }
                s.to_string()
            }
            Err(ebxkit_common::Error::MissingNullTerminator) => {
                return Err(Error::CorruptString(offset as u32));
            }
            Err(e) => return Err(e.into()),
        };
        self.r.seek(saved);
        Ok(value)
    }
}

fn synthetic_field(kind: TypeKind, type_ref: u16) -> EbxFieldDescriptor {
    EbxFieldDescriptor {
        name_hash: 0,
        flags: crate::types::flags::with_kind(kind),
        type_ref,
        data_offset: 0,
        second_offset: 0,
    }
}
