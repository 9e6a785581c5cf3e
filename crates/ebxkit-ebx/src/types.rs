//! EBX wire type kinds and field-flag helpers.

/// Type kinds carried in the 5-bit kind field of descriptor flags.
///
/// The values are the on-wire encodings used by Partition payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeKind {
    /// No payload.
    Void = 0,
    /// Legacy database object. Unsupported by this codec.
    DbObject = 1,
    /// Synthetic field splicing a base type's fields into a derived type.
    Inherited = 2,
    /// Fixed 32-byte NUL-trimmed string.
    String = 3,
    /// Interned string referenced by pool offset.
    CString = 4,
    /// File reference (interned string).
    FileRef = 5,
    /// 64-bit resource handle.
    ResourceRef = 6,
    /// Type reference (GUID or type name, interned).
    TypeRef = 7,
    /// Delegate reference (GUID or name, interned).
    Delegate = 8,
    /// Dynamically-typed boxed value.
    BoxedValueRef = 9,
    /// 16-byte GUID.
    Guid = 10,
    /// 20-byte SHA-1 digest.
    Sha1 = 11,
    /// Inline value type; fields recurse in place.
    Struct = 12,
    /// Pointer to an instance (internal or imported).
    Class = 13,
    /// Ordered collection stored in the array region.
    Array = 14,
    /// Enumeration, stored as i32.
    Enum = 15,
    Boolean = 16,
    Int8 = 17,
    UInt8 = 18,
    Int16 = 19,
    UInt16 = 20,
    Int32 = 21,
    UInt32 = 22,
    Int64 = 23,
    UInt64 = 24,
    Float32 = 25,
    Float64 = 26,
}

impl TypeKind {
    /// Parse from the raw 5-bit wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Void),
            1 => Some(Self::DbObject),
            2 => Some(Self::Inherited),
            3 => Some(Self::String),
            4 => Some(Self::CString),
            5 => Some(Self::FileRef),
            6 => Some(Self::ResourceRef),
            7 => Some(Self::TypeRef),
            8 => Some(Self::Delegate),
            9 => Some(Self::BoxedValueRef),
            10 => Some(Self::Guid),
            11 => Some(Self::Sha1),
            12 => Some(Self::Struct),
            13 => Some(Self::Class),
            14 => Some(Self::Array),
            15 => Some(Self::Enum),
            16 => Some(Self::Boolean),
            17 => Some(Self::Int8),
            18 => Some(Self::UInt8),
            19 => Some(Self::Int16),
            20 => Some(Self::UInt16),
            21 => Some(Self::Int32),
            22 => Some(Self::UInt32),
            23 => Some(Self::Int64),
            24 => Some(Self::UInt64),
            25 => Some(Self::Float32),
            26 => Some(Self::Float64),
            _ => None,
        }
    }

    /// Size in bytes of this kind's inline wire encoding.
    ///
    /// `Struct` has no intrinsic size (it depends on the type descriptor);
    /// indirect kinds report the size of their inline slot.
    pub fn wire_size(&self) -> usize {
        match self {
            Self::Void | Self::DbObject | Self::Inherited => 0,
            Self::Boolean | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 | Self::Enum => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::ResourceRef => 8,
            Self::String => 32,
            Self::CString => 4,
            Self::FileRef => 8,
            Self::TypeRef | Self::Delegate => 8,
            Self::BoxedValueRef => 16,
            Self::Guid => 16,
            Self::Sha1 => 20,
            Self::Class => 4,
            Self::Array => 4,
            Self::Struct => 0,
        }
    }

    /// Natural alignment of this kind's inline encoding.
    pub fn alignment(&self) -> usize {
        match self {
            Self::Void | Self::DbObject | Self::Inherited => 1,
            Self::Boolean | Self::Int8 | Self::UInt8 | Self::String => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::ResourceRef => 8,
            Self::Struct => 1,
            _ => 4,
        }
    }

    /// Get the string name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Void => "Void",
            Self::DbObject => "DbObject",
            Self::Inherited => "Inherited",
            Self::String => "String",
            Self::CString => "CString",
            Self::FileRef => "FileRef",
            Self::ResourceRef => "ResourceRef",
            Self::TypeRef => "TypeRef",
            Self::Delegate => "Delegate",
            Self::BoxedValueRef => "BoxedValueRef",
            Self::Guid => "Guid",
            Self::Sha1 => "Sha1",
            Self::Struct => "Struct",
            Self::Class => "Class",
            Self::Array => "Array",
            Self::Enum => "Enum",
            Self::Boolean => "Boolean",
            Self::Int8 => "Int8",
            Self::UInt8 => "UInt8",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float32 => "Float32",
            Self::Float64 => "Float64",
        }
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Descriptor `flags` layout helpers.
///
/// Bits 4..=8 carry the [`TypeKind`]; the low nibble is a category field
/// preserved verbatim; bit 12 marks a type ref resolved relative to the
/// parent descriptor's index.
pub mod flags {
    use super::TypeKind;

    /// Shift of the 5-bit kind field.
    pub const KIND_SHIFT: u16 = 4;
    /// Mask of the 5-bit kind field (after shifting).
    pub const KIND_MASK: u16 = 0x1F;
    /// Type ref is a delta relative to the parent descriptor's index.
    pub const RELATIVE_REF: u16 = 1 << 12;

    /// Extract the raw 5-bit kind value.
    #[inline]
    pub fn raw_kind(flags: u16) -> u8 {
        ((flags >> KIND_SHIFT) & KIND_MASK) as u8
    }

    /// Extract the kind, if known.
    #[inline]
    pub fn kind(flags: u16) -> Option<TypeKind> {
        TypeKind::from_u8(raw_kind(flags))
    }

    /// Build a flags value carrying the given kind (category nibble zero).
    #[inline]
    pub fn with_kind(kind: TypeKind) -> u16 {
        (kind as u16) << KIND_SHIFT
    }

    /// Check the relative-ref bit.
    #[inline]
    pub fn is_relative_ref(flags: u16) -> bool {
        flags & RELATIVE_REF != 0
    }
}
