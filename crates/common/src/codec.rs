//! Big-endian byte reader and writer helpers shared by the instruction and
//! image codecs.

use crate::error::DecodeError;
use crate::math::{Rotation, Vector};
use crate::type_tag::TypeTag;
use crate::value::{Key, Value};

/// Cursor over a byte slice. Positions in errors are absolute offsets
/// into the slice.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                at: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub(crate) fn i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    pub(crate) fn f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_be_bytes(self.array()?))
    }

    pub(crate) fn type_tag(&mut self) -> Result<TypeTag, DecodeError> {
        TypeTag::try_from(self.u8()?)
    }

    pub(crate) fn vector(&mut self) -> Result<Vector, DecodeError> {
        Ok(Vector::new(self.f32()?, self.f32()?, self.f32()?))
    }

    pub(crate) fn rotation(&mut self) -> Result<Rotation, DecodeError> {
        Ok(Rotation::new(self.f32()?, self.f32()?, self.f32()?, self.f32()?))
    }

    /// `u16` length followed by UTF-8.
    pub(crate) fn string(&mut self) -> Result<String, DecodeError> {
        let len = self.u16()? as usize;
        let at = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { at })
    }

    /// Type tags prefixed by a `u16` count.
    pub(crate) fn type_list(&mut self) -> Result<Vec<TypeTag>, DecodeError> {
        let count = self.u16()? as usize;
        (0..count).map(|_| self.type_tag()).collect()
    }

    /// Tag byte followed by the payload.
    pub(crate) fn value(&mut self) -> Result<Value, DecodeError> {
        let tag = self.type_tag()?;
        self.value_payload(tag, true)
    }

    fn value_payload(&mut self, tag: TypeTag, allow_list: bool) -> Result<Value, DecodeError> {
        Ok(match tag {
            TypeTag::Void => Value::Void,
            TypeTag::Null => Value::Null,
            TypeTag::Integer => Value::Integer(self.i32()?),
            TypeTag::Float => Value::Float(self.f32()?),
            TypeTag::String => Value::String(self.string()?),
            TypeTag::Key => Value::Key(Key::parse(&self.string()?)),
            TypeTag::Vector => Value::Vector(self.vector()?),
            TypeTag::Rotation => Value::Rotation(self.rotation()?),
            TypeTag::List => {
                if !allow_list {
                    return Err(DecodeError::NestedList { at: self.pos - 1 });
                }
                let count = self.u16()? as usize;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    let tag = self.type_tag()?;
                    items.push(self.value_payload(tag, false)?);
                }
                Value::List(items)
            }
        })
    }
}

pub(crate) fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub(crate) fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub(crate) fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub(crate) fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub(crate) fn put_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub(crate) fn put_vector(out: &mut Vec<u8>, v: Vector) {
    put_f32(out, v.x);
    put_f32(out, v.y);
    put_f32(out, v.z);
}

pub(crate) fn put_rotation(out: &mut Vec<u8>, r: Rotation) {
    put_f32(out, r.x);
    put_f32(out, r.y);
    put_f32(out, r.z);
    put_f32(out, r.s);
}

/// Strings longer than `u16::MAX` bytes are truncated at a char boundary.
pub(crate) fn put_string(out: &mut Vec<u8>, s: &str) {
    let mut end = s.len().min(u16::MAX as usize);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    put_u16(out, end as u16);
    out.extend_from_slice(&s.as_bytes()[..end]);
}

/// Write a `u16` element count capped at `u16::MAX`. Returns how many
/// elements the caller writes after it.
pub(crate) fn put_count(out: &mut Vec<u8>, len: usize) -> usize {
    let count = len.min(u16::MAX as usize);
    put_u16(out, count as u16);
    count
}

/// Lists longer than `u16::MAX` are truncated, like strings.
pub(crate) fn put_type_list(out: &mut Vec<u8>, tags: &[TypeTag]) {
    let count = put_count(out, tags.len());
    out.extend(tags[..count].iter().map(|t| *t as u8));
}

pub(crate) fn put_value(out: &mut Vec<u8>, value: &Value) {
    out.push(value.type_tag() as u8);
    match value {
        Value::Void | Value::Null => {}
        Value::Integer(i) => put_i32(out, *i),
        Value::Float(f) => put_f32(out, *f),
        Value::String(s) => put_string(out, s),
        Value::Key(k) => put_string(out, &k.to_string()),
        Value::Vector(v) => put_vector(out, *v),
        Value::Rotation(r) => put_rotation(out, *r),
        Value::List(items) => {
            // Nested lists cannot be represented; flatten on the way out.
            let flat = match Value::list(items.iter().cloned()) {
                Value::List(flat) => flat,
                _ => Vec::new(),
            };
            let count = put_count(out, flat.len());
            for item in &flat[..count] {
                put_value(out, item);
            }
        }
    }
}
