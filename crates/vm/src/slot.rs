//! Tagged stack, local and global cells.

use lso_common::{Key, Rotation, TypeTag, Vector};

use crate::heap::HeapRef;

/// One cell of the value stack or the globals table. Strings, lists and
/// the text of non-UUID keys live in the instance heap.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Void,
    Integer(i32),
    Float(f32),
    /// A key holding a UUID.
    Key(Key),
    /// A key holding arbitrary text, stored as a heap string.
    TextKey(HeapRef),
    Vector(Vector),
    Rotation(Rotation),
    Str(HeapRef),
    List(HeapRef),
    Null,
}

impl Slot {
    pub fn tag(&self) -> TypeTag {
        match self {
            Slot::Void => TypeTag::Void,
            Slot::Integer(_) => TypeTag::Integer,
            Slot::Float(_) => TypeTag::Float,
            Slot::Key(_) | Slot::TextKey(_) => TypeTag::Key,
            Slot::Vector(_) => TypeTag::Vector,
            Slot::Rotation(_) => TypeTag::Rotation,
            Slot::Str(_) => TypeTag::String,
            Slot::List(_) => TypeTag::List,
            Slot::Null => TypeTag::Null,
        }
    }

    /// The heap object this slot keeps alive, if any.
    pub fn heap_ref(&self) -> Option<HeapRef> {
        match self {
            Slot::Str(r) | Slot::List(r) | Slot::TextKey(r) => Some(*r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags() {
        assert_eq!(Slot::Integer(1).tag(), TypeTag::Integer);
        assert_eq!(Slot::Key(Key::NULL).tag(), TypeTag::Key);
        assert_eq!(Slot::Rotation(Rotation::IDENTITY).tag(), TypeTag::Rotation);
        assert_eq!(Slot::Null.heap_ref(), None);
        let text_key = Slot::TextKey(crate::heap::Heap::new(64).insert(
            crate::heap::HeapObject::Str("name".into()),
        ));
        assert_eq!(text_key.tag(), TypeTag::Key);
        assert!(text_key.heap_ref().is_some());
    }
}
