//! Type tags for the LSO value model.
//!
//! The byte values match the variable type codes used by compiled LSO
//! images, so they are stable across the wire.

use crate::error::DecodeError;

/// Identifies the runtime type of a value, slot, parameter or local.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TypeTag {
    /// No value (function return type only).
    #[default]
    Void = 0,
    /// Signed 32-bit integer.
    Integer = 1,
    /// 32-bit float.
    Float = 2,
    /// Heap string.
    String = 3,
    /// 128-bit UUID key.
    Key = 4,
    /// Three-component float vector.
    Vector = 5,
    /// Four-component float quaternion.
    Rotation = 6,
    /// Heap list of non-list values.
    List = 7,
    /// Null marker.
    Null = 8,
}

/// All valid type tags, in definition order.
pub const ALL_TYPE_TAGS: [TypeTag; 9] = [
    TypeTag::Void,
    TypeTag::Integer,
    TypeTag::Float,
    TypeTag::String,
    TypeTag::Key,
    TypeTag::Vector,
    TypeTag::Rotation,
    TypeTag::List,
    TypeTag::Null,
];

impl TryFrom<u8> for TypeTag {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TypeTag::Void),
            1 => Ok(TypeTag::Integer),
            2 => Ok(TypeTag::Float),
            3 => Ok(TypeTag::String),
            4 => Ok(TypeTag::Key),
            5 => Ok(TypeTag::Vector),
            6 => Ok(TypeTag::Rotation),
            7 => Ok(TypeTag::List),
            8 => Ok(TypeTag::Null),
            _ => Err(DecodeError::InvalidTypeTag(value)),
        }
    }
}

impl TypeTag {
    /// Returns the assembly name for this type tag.
    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::Void => "void",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Key => "key",
            TypeTag::Vector => "vector",
            TypeTag::Rotation => "rotation",
            TypeTag::List => "list",
            TypeTag::Null => "null",
        }
    }

    /// Look up a tag by its assembly name.
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_TYPE_TAGS.iter().copied().find(|t| t.name() == name)
    }

    /// Returns true for integer and float.
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeTag::Integer | TypeTag::Float)
    }

    /// Pack a (left, right) pair into the operand byte used by binary
    /// operators and CAST: high nibble left, low nibble right.
    pub fn pair(left: TypeTag, right: TypeTag) -> u8 {
        ((left as u8) << 4) | right as u8
    }

    /// Inverse of [`TypeTag::pair`].
    pub fn unpair(byte: u8) -> Result<(TypeTag, TypeTag), DecodeError> {
        let left = TypeTag::try_from(byte >> 4).map_err(|_| DecodeError::InvalidTypeTag(byte))?;
        let right =
            TypeTag::try_from(byte & 0x0f).map_err(|_| DecodeError::InvalidTypeTag(byte))?;
        Ok((left, right))
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
