//! Resolution of on-wire type refs through the descriptor tables.

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;

use crate::error::{Error, Result};
use crate::structs::{EbxFieldDescriptor, EbxTypeDescriptor};
use crate::types::TypeKind;

type FxHashMap<K, V> = FastHashMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

/// Index of a row in the type-descriptor table.
pub type TypeIx = usize;

/// Owns the immutable descriptor tables plus the hash-to-name index built
/// from the type-names region.
#[derive(Debug, Default)]
pub struct TypeResolver {
    types: Vec<EbxTypeDescriptor>,
    fields: Vec<EbxFieldDescriptor>,
    names: FxHashMap<u32, String>,
}

impl TypeResolver {
    /// Build a resolver and verify the table invariants.
    pub fn new(
        types: Vec<EbxTypeDescriptor>,
        fields: Vec<EbxFieldDescriptor>,
        names: FxHashMap<u32, String>,
    ) -> Result<Self> {
        let resolver = Self { types, fields, names };
        resolver.validate()?;
        Ok(resolver)
    }

    fn validate(&self) -> Result<()> {
        for td in &self.types {
            let first = td.field_index as i64;
            let last = first + td.field_count as i64;
            if first < 0 || last as usize > self.fields.len() {
                return Err(Error::IndexOutOfRange {
                    what: "field descriptor",
                    index: last,
                    len: self.fields.len(),
                });
            }
        }

        // Spliced base-class layouts must fit inside the derived footprint.
        for (parent_ix, td) in self.types.iter().enumerate() {
            let (size, field_index, field_count) = (td.size, td.field_index, td.field_count);
            for j in 0..field_count as usize {
                let fd = self.fields[field_index as usize + j];
                if fd.kind() != Some(TypeKind::Inherited) {
                    continue;
                }
                let base = self.types[self.resolve_type_in(parent_ix, &fd)?];
                if base.size > size {
                    return Err(Error::IndexOutOfRange {
                        what: "inherited layout byte",
                        index: base.size as i64,
                        len: size as usize,
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of type descriptors.
    #[inline]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// All type descriptors in table order.
    #[inline]
    pub fn types(&self) -> &[EbxTypeDescriptor] {
        &self.types
    }

    /// All field descriptors in table order.
    #[inline]
    pub fn fields(&self) -> &[EbxFieldDescriptor] {
        &self.fields
    }

    /// Number of field descriptors.
    #[inline]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// The type descriptor at a table index.
    pub fn type_at(&self, index: TypeIx) -> Result<EbxTypeDescriptor> {
        self.types
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                what: "type descriptor",
                index: index as i64,
                len: self.types.len(),
            })
    }

    /// The field descriptor at an absolute table index.
    pub fn field_at(&self, index: usize) -> Result<EbxFieldDescriptor> {
        self.fields
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                what: "field descriptor",
                index: index as i64,
                len: self.fields.len(),
            })
    }

    /// Plain resolution: a direct index into the type table.
    pub fn resolve_type(&self, type_ref: u16) -> Result<TypeIx> {
        let index = type_ref as usize;
        if index >= self.types.len() {
            return Err(Error::IndexOutOfRange {
                what: "type descriptor",
                index: index as i64,
                len: self.types.len(),
            });
        }
        Ok(index)
    }

    /// Resolution in the context of a parent descriptor: when the field's
    /// relative bit is set, the ref is a delta added to the parent's table
    /// index; otherwise it is a direct index.
    pub fn resolve_type_in(&self, parent: TypeIx, field: &EbxFieldDescriptor) -> Result<TypeIx> {
        let index = if field.has_relative_ref() {
            parent + field.type_ref as usize
        } else {
            field.type_ref as usize
        };
        if index >= self.types.len() {
            return Err(Error::IndexOutOfRange {
                what: "type descriptor",
                index: index as i64,
                len: self.types.len(),
            });
        }
        Ok(index)
    }

    /// Look up a name from the type-names region by hash.
    #[inline]
    pub fn name_of(&self, name_hash: u32) -> &str {
        self.names.get(&name_hash).map(String::as_str).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{flags, TypeKind};

    fn td(field_index: i32, field_count: u8) -> EbxTypeDescriptor {
        EbxTypeDescriptor {
            name_hash: 0,
            field_index,
            field_count,
            alignment: 4,
            flags: flags::with_kind(TypeKind::Class),
            size: 8,
            second_size: 0,
        }
    }

    fn fd(type_ref: u16, relative: bool) -> EbxFieldDescriptor {
        let mut f = flags::with_kind(TypeKind::Struct);
        if relative {
            f |= flags::RELATIVE_REF;
        }
        EbxFieldDescriptor {
            name_hash: 0,
            flags: f,
            type_ref,
            data_offset: 8,
            second_offset: 0,
        }
    }

    #[test]
    fn test_plain_and_relative_resolution() {
        let resolver =
            TypeResolver::new(vec![td(0, 1), td(0, 1), td(0, 1)], vec![fd(1, false)], Default::default())
                .unwrap();

        assert_eq!(resolver.resolve_type(2).unwrap(), 2);
        // Direct ref: parent is ignored.
        assert_eq!(resolver.resolve_type_in(1, &fd(2, false)).unwrap(), 2);
        // Relative ref: delta from the parent's index.
        assert_eq!(resolver.resolve_type_in(1, &fd(1, true)).unwrap(), 2);
    }

    #[test]
    fn test_out_of_range_is_bad_layout() {
        let resolver = TypeResolver::new(vec![td(0, 0)], vec![], Default::default()).unwrap();
        assert!(resolver.resolve_type(5).is_err());
        assert!(resolver.type_at(1).is_err());
        assert!(resolver.field_at(0).is_err());
    }

    #[test]
    fn test_field_range_validated() {
        // field_index + field_count exceeds the field table.
        assert!(TypeResolver::new(vec![td(0, 2)], vec![fd(0, false)], Default::default()).is_err());
    }

    #[test]
    fn test_name_index() {
        let mut names: super::FxHashMap<u32, String> = Default::default();
        names.insert(7, "Entity".to_string());
        let resolver = TypeResolver::new(vec![], vec![], names).unwrap();
        assert_eq!(resolver.name_of(7), "Entity");
        assert_eq!(resolver.name_of(8), "");
    }
}
