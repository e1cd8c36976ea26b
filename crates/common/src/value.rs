//! Owned, host-facing values.
//!
//! [`Value`] is what built-ins receive and return, what events carry and
//! what the constant pool and global initializers hold. Inside the VM,
//! strings and lists live in the instance heap instead.
//!
//! The cast and formatting rules here are the script language's: floats
//! print with six decimals, vector and rotation components with five,
//! lists never nest.

use std::fmt;

use uuid::Uuid;

use crate::math::{Rotation, Vector};
use crate::type_tag::TypeTag;

/// A key: a UUID in canonical lowercase hyphenated form, or any other
/// text kept verbatim.
///
/// Text is never rewritten, so casting back to a string is lossless and
/// string/key comparison is exact. Text that spells a UUID some other way
/// (uppercase, braces) is still a valid key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Uuid(Uuid),
    Text(String),
}

impl Key {
    /// The all-zero key.
    pub const NULL: Key = Key::Uuid(Uuid::nil());

    /// Parse a key from its text form. Never fails.
    pub fn parse(text: &str) -> Key {
        match Uuid::parse_str(text) {
            Ok(uuid) if uuid.hyphenated().to_string() == text => Key::Uuid(uuid),
            _ => Key::Text(text.to_string()),
        }
    }

    /// The UUID this key names, if any.
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Key::Uuid(uuid) => Some(*uuid),
            Key::Text(text) => Uuid::parse_str(text).ok(),
        }
    }

    /// A key is valid when it names a UUID other than nil.
    pub fn is_valid(&self) -> bool {
        self.as_uuid().is_some_and(|uuid| !uuid.is_nil())
    }
}

impl Default for Key {
    fn default() -> Self {
        Key::NULL
    }
}

impl From<Uuid> for Key {
    fn from(uuid: Uuid) -> Self {
        Key::Uuid(uuid)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Uuid(uuid) => write!(f, "{}", uuid.hyphenated()),
            Key::Text(text) => f.write_str(text),
        }
    }
}

/// A script value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Integer(i32),
    Float(f32),
    String(String),
    Key(Key),
    Vector(Vector),
    Rotation(Rotation),
    /// Never contains another list.
    List(Vec<Value>),
    Null,
}

impl Value {
    /// The runtime type of this value.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Void => TypeTag::Void,
            Value::Integer(_) => TypeTag::Integer,
            Value::Float(_) => TypeTag::Float,
            Value::String(_) => TypeTag::String,
            Value::Key(_) => TypeTag::Key,
            Value::Vector(_) => TypeTag::Vector,
            Value::Rotation(_) => TypeTag::Rotation,
            Value::List(_) => TypeTag::List,
            Value::Null => TypeTag::Null,
        }
    }

    /// The zero value a fresh variable of `tag` holds.
    pub fn default_for(tag: TypeTag) -> Value {
        match tag {
            TypeTag::Void => Value::Void,
            TypeTag::Integer => Value::Integer(0),
            TypeTag::Float => Value::Float(0.0),
            TypeTag::String => Value::String(String::new()),
            TypeTag::Key => Value::Key(Key::NULL),
            TypeTag::Vector => Value::Vector(Vector::ZERO),
            TypeTag::Rotation => Value::Rotation(Rotation::IDENTITY),
            TypeTag::List => Value::List(Vec::new()),
            TypeTag::Null => Value::Null,
        }
    }

    /// Build a list, flattening any nested lists into it.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
        let mut out = Vec::new();
        for item in items {
            match item {
                Value::List(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        Value::List(out)
    }

    /// Truthiness as used by conditional jumps.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Key(k) => k.is_valid(),
            Value::Vector(v) => !v.is_zero(),
            Value::Rotation(r) => !r.is_identity(),
            Value::List(items) => !items.is_empty(),
            Value::Void | Value::Null => false,
        }
    }

    /// The string cast of this value.
    pub fn to_lsl_string(&self) -> String {
        match self {
            Value::Void | Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => s.clone(),
            Value::Key(k) => k.to_string(),
            Value::Vector(v) => format_vector(*v),
            Value::Rotation(r) => format_rotation(*r),
            Value::List(items) => items.iter().map(Value::to_lsl_string).collect(),
        }
    }

    /// Explicit conversion to `to`. Returns `None` for conversions the
    /// language does not define.
    pub fn cast(&self, to: TypeTag) -> Option<Value> {
        if self.type_tag() == to && to != TypeTag::Void && to != TypeTag::Null {
            return Some(self.clone());
        }
        let out = match (self, to) {
            (Value::Void | Value::Null, _) => return None,
            (_, TypeTag::String) => Value::String(self.to_lsl_string()),
            (_, TypeTag::List) => Value::List(vec![self.clone()]),

            (Value::Integer(i), TypeTag::Float) => Value::Float(*i as f32),
            (Value::Float(f), TypeTag::Integer) => Value::Integer(truncate(*f)),

            (Value::String(s), TypeTag::Integer) => Value::Integer(parse_integer_prefix(s)),
            (Value::String(s), TypeTag::Float) => Value::Float(parse_float_prefix(s)),
            (Value::String(s), TypeTag::Key) => Value::Key(Key::parse(s)),
            (Value::String(s), TypeTag::Vector) => {
                Value::Vector(parse_components::<3>(s).map_or(Vector::ZERO, |c| {
                    Vector::new(c[0], c[1], c[2])
                }))
            }
            (Value::String(s), TypeTag::Rotation) => {
                Value::Rotation(parse_components::<4>(s).map_or(Rotation::IDENTITY, |c| {
                    Rotation::new(c[0], c[1], c[2], c[3])
                }))
            }
            _ => return None,
        };
        Some(out)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_lsl_string())
    }
}

/// Float to integer conversion: truncate toward zero, saturating.
fn truncate(f: f32) -> i32 {
    if f.is_nan() {
        0
    } else {
        f as i32
    }
}

/// Six-decimal float form, e.g. `1.000000`.
pub fn format_float(f: f32) -> String {
    format!("{f:.6}")
}

/// `<x, y, z>` with five decimals.
pub fn format_vector(v: Vector) -> String {
    format!("<{:.5}, {:.5}, {:.5}>", v.x, v.y, v.z)
}

/// `<x, y, z, s>` with five decimals.
pub fn format_rotation(r: Rotation) -> String {
    format!("<{:.5}, {:.5}, {:.5}, {:.5}>", r.x, r.y, r.z, r.s)
}

/// Parse the leading decimal or `0x` hex integer of `text`; 0 when there
/// is none. Values wrap on overflow.
pub fn parse_integer_prefix(text: &str) -> i32 {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let (radix, digits) = match rest.get(..2) {
        Some("0x") | Some("0X") => (16, &rest[2..]),
        _ => (10, rest),
    };
    let mut value: i32 = 0;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => value = value.wrapping_mul(radix as i32).wrapping_add(d as i32),
            None => break,
        }
    }
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

/// Parse the leading float of `text`; 0.0 when there is none.
pub fn parse_float_prefix(text: &str) -> f32 {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        let frac_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        digits += end - frac_start;
    }
    if digits == 0 {
        return 0.0;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'-') | Some(b'+')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    trimmed[..end].parse().unwrap_or(0.0)
}

/// Parse `<a, b, ...>` with exactly `N` float components.
fn parse_components<const N: usize>(text: &str) -> Option<[f32; N]> {
    let inner = text.trim().strip_prefix('<')?;
    let close = inner.find('>')?;
    let parts: Vec<&str> = inner[..close].split(',').collect();
    if parts.len() != N {
        return None;
    }
    let mut out = [0.0f32; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part.trim().parse().ok()?;
    }
    Some(out)
}
