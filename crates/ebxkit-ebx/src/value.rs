//! Owned, tagged value representation for every EBX wire kind.
//!
//! The `Value` enum is the single in-memory form of a decoded field. Wire
//! kinds that the engine wraps in typed shells (primitives, refs) collapse
//! into plain variants here; normalization is `default_for`, not a runtime
//! capability probe.

use ebxkit_common::EbxGuid;

use crate::object::Object;
use crate::structs::EbxImportReference;
use crate::types::TypeKind;

/// A decoded property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// Signed 8-bit integer.
    Int8(i8),
    /// Unsigned 8-bit integer.
    UInt8(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 32-bit floating point.
    Float32(f32),
    /// 64-bit floating point.
    Float64(f64),
    /// 16-byte GUID.
    Guid(EbxGuid),
    /// 20-byte SHA-1 digest.
    Sha1([u8; 20]),
    /// Fixed 32-byte string.
    String(String),
    /// Interned string.
    CString(String),
    /// File reference path.
    FileRef(String),
    /// 64-bit resource handle.
    ResourceRef(u64),
    /// Type reference.
    TypeRef(TypeRefValue),
    /// Delegate reference.
    Delegate(TypeRefValue),
    /// Enumeration value.
    Enum(i32),
    /// Inline value-type instance.
    Struct(Object),
    /// Ordered collection.
    Array(Vec<Value>),
    /// Object pointer.
    Pointer(PointerRef),
    /// Dynamically-typed boxed value.
    BoxedValue(Option<Box<BoxedValue>>),
}

/// A type or delegate reference: a GUID when the on-wire string parses as
/// one, otherwise the plain type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRefValue {
    Guid(EbxGuid),
    Name(String),
}

impl TypeRefValue {
    /// Parse an on-wire string, preferring the GUID form.
    pub fn parse(s: &str) -> Self {
        match s.parse::<EbxGuid>() {
            Ok(guid) => Self::Guid(guid),
            Err(_) => Self::Name(s.to_string()),
        }
    }

    /// The on-wire string form.
    pub fn to_wire_string(&self) -> String {
        match self {
            Self::Guid(g) => g.to_string(),
            Self::Name(n) => n.clone(),
        }
    }
}

/// An in-band object reference.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerRef {
    /// No target.
    Null,
    /// Index into the owning asset's instance vector.
    Internal(usize),
    /// Target in another asset.
    External(EbxImportReference),
}

impl PointerRef {
    /// Check if this is the null pointer.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// A boxed value: the payload kind, the payload type's name hash (zero for
/// plain primitives), and the payload itself.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxedValue {
    pub kind: TypeKind,
    pub type_hash: u32,
    pub value: Value,
}

impl Value {
    /// The blank-instance default for a field of the given kind.
    pub fn default_for(kind: TypeKind) -> Value {
        match kind {
            TypeKind::Boolean => Value::Bool(false),
            TypeKind::Int8 => Value::Int8(0),
            TypeKind::UInt8 => Value::UInt8(0),
            TypeKind::Int16 => Value::Int16(0),
            TypeKind::UInt16 => Value::UInt16(0),
            TypeKind::Int32 => Value::Int32(0),
            TypeKind::UInt32 => Value::UInt32(0),
            TypeKind::Int64 => Value::Int64(0),
            TypeKind::UInt64 => Value::UInt64(0),
            TypeKind::Float32 => Value::Float32(0.0),
            TypeKind::Float64 => Value::Float64(0.0),
            TypeKind::Guid => Value::Guid(EbxGuid::EMPTY),
            TypeKind::Sha1 => Value::Sha1([0; 20]),
            TypeKind::String => Value::String(String::new()),
            TypeKind::CString => Value::CString(String::new()),
            TypeKind::FileRef => Value::FileRef(String::new()),
            TypeKind::ResourceRef => Value::ResourceRef(0),
            TypeKind::TypeRef => Value::TypeRef(TypeRefValue::Name(String::new())),
            TypeKind::Delegate => Value::Delegate(TypeRefValue::Name(String::new())),
            TypeKind::Enum => Value::Enum(0),
            TypeKind::Array => Value::Array(Vec::new()),
            TypeKind::Class => Value::Pointer(PointerRef::Null),
            TypeKind::BoxedValueRef => Value::BoxedValue(None),
            // Struct defaults are built from the schema; everything else has
            // no value form.
            _ => Value::Pointer(PointerRef::Null),
        }
    }

    /// Try to get this value as a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as an i32.
    #[inline]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int8(v) => Some(*v as i32),
            Value::Int16(v) => Some(*v as i32),
            Value::Int32(v) | Value::Enum(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a u32.
    #[inline]
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::UInt8(v) => Some(*v as u32),
            Value::UInt16(v) => Some(*v as u32),
            Value::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a u64.
    #[inline]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt8(v) => Some(*v as u64),
            Value::UInt16(v) => Some(*v as u64),
            Value::UInt32(v) => Some(*v as u64),
            Value::UInt64(v) | Value::ResourceRef(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as an f32.
    #[inline]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as an f64.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::CString(s) | Value::FileRef(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a GUID.
    #[inline]
    pub fn as_guid(&self) -> Option<EbxGuid> {
        match self {
            Value::Guid(g) => Some(*g),
            _ => None,
        }
    }

    /// Try to get this value as a nested struct instance.
    #[inline]
    pub fn as_struct(&self) -> Option<&Object> {
        match self {
            Value::Struct(o) => Some(o),
            _ => None,
        }
    }

    /// Try to get this value as an array slice.
    #[inline]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get this value as a pointer reference.
    #[inline]
    pub fn as_pointer(&self) -> Option<&PointerRef> {
        match self {
            Value::Pointer(p) => Some(p),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int8(v) => write!(f, "{}", v),
            Value::UInt8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Guid(g) => write!(f, "{}", g),
            Value::Sha1(d) => {
                for b in d {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Value::String(s) | Value::CString(s) | Value::FileRef(s) => write!(f, "{}", s),
            Value::ResourceRef(v) => write!(f, "{:#018x}", v),
            Value::TypeRef(TypeRefValue::Guid(g)) | Value::Delegate(TypeRefValue::Guid(g)) => {
                write!(f, "{}", g)
            }
            Value::TypeRef(TypeRefValue::Name(n)) | Value::Delegate(TypeRefValue::Name(n)) => {
                write!(f, "{}", n)
            }
            Value::Enum(v) => write!(f, "{}", v),
            Value::Struct(o) => write!(f, "Struct({:#010x})", o.type_hash),
            Value::Array(v) => write!(f, "Array[{}]", v.len()),
            Value::Pointer(PointerRef::Null) => write!(f, "Ptr(null)"),
            Value::Pointer(PointerRef::Internal(i)) => write!(f, "Ptr({})", i),
            Value::Pointer(PointerRef::External(r)) => write!(f, "Ptr({}:{})", r.file_guid, r.class_guid),
            Value::BoxedValue(None) => write!(f, "Boxed(null)"),
            Value::BoxedValue(Some(b)) => write!(f, "Boxed({})", b.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::Bool(true)), "true");
        assert_eq!(format!("{}", Value::Int32(42)), "42");
        assert_eq!(format!("{}", Value::CString("hello".into())), "hello");
        assert_eq!(format!("{}", Value::Pointer(PointerRef::Null)), "Ptr(null)");
    }

    #[test]
    fn test_value_accessors() {
        let v = Value::Int32(42);
        assert_eq!(v.as_i32(), Some(42));
        assert_eq!(v.as_str(), None);

        let v = Value::CString("test".into());
        assert_eq!(v.as_str(), Some("test"));
        assert_eq!(v.as_i32(), None);
    }

    #[test]
    fn test_typeref_parse_prefers_guid() {
        let r = TypeRefValue::parse("12345678-abcd-ef01-2345-6789abcdef01");
        assert!(matches!(r, TypeRefValue::Guid(_)));
        assert_eq!(r.to_wire_string(), "12345678-abcd-ef01-2345-6789abcdef01");

        let r = TypeRefValue::parse("RenderComponent");
        assert_eq!(r, TypeRefValue::Name("RenderComponent".into()));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Value::default_for(TypeKind::Array), Value::Array(vec![]));
        assert_eq!(
            Value::default_for(TypeKind::Class),
            Value::Pointer(PointerRef::Null)
        );
        assert_eq!(Value::default_for(TypeKind::BoxedValueRef), Value::BoxedValue(None));
    }
}
