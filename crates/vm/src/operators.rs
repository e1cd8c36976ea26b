//! Operator semantics over owned values.
//!
//! The interpreter has already checked runtime tags against the
//! instruction's declared type pair; these functions decide what each
//! pair means.

use lso_common::{Opcode, Value};

use crate::error::Fault;

fn truth(b: bool) -> Value {
    Value::Integer(b as i32)
}

/// Both operands as floats, if both are numeric and at least one is a float.
fn promoted(left: &Value, right: &Value) -> Option<(f32, f32)> {
    match (left, right) {
        (Value::Float(a), Value::Float(b)) => Some((*a, *b)),
        (Value::Integer(a), Value::Float(b)) => Some((*a as f32, *b)),
        (Value::Float(a), Value::Integer(b)) => Some((*a, *b as f32)),
        _ => None,
    }
}

fn scalar(value: &Value) -> Option<f32> {
    match value {
        Value::Integer(i) => Some(*i as f32),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Apply a binary operator. `left` was pushed first.
pub fn binary(opcode: Opcode, left: Value, right: Value) -> Result<Value, Fault> {
    let invalid = Fault::InvalidOperands {
        opcode,
        left: left.type_tag(),
        right: right.type_tag(),
    };
    let out = match opcode {
        Opcode::Add => add(left, right),
        Opcode::Sub => sub(&left, &right),
        Opcode::Mul => mul(&left, &right),
        Opcode::Div => return div(&left, &right).unwrap_or(Err(invalid)),
        Opcode::Mod => return modulo(&left, &right).unwrap_or(Err(invalid)),
        Opcode::Eq => equal(&left, &right),
        Opcode::Neq => not_equal(&left, &right),
        Opcode::Less | Opcode::Greater | Opcode::Leq | Opcode::Geq => {
            compare(opcode, &left, &right)
        }
        Opcode::BitAnd | Opcode::BitOr | Opcode::BitXor | Opcode::Shl | Opcode::Shr => {
            match (&left, &right) {
                (Value::Integer(a), Value::Integer(b)) => Some(Value::Integer(match opcode {
                    Opcode::BitAnd => a & b,
                    Opcode::BitOr => a | b,
                    Opcode::BitXor => a ^ b,
                    Opcode::Shl => a.wrapping_shl(*b as u32),
                    _ => a.wrapping_shr(*b as u32),
                })),
                _ => None,
            }
        }
        Opcode::BoolAnd | Opcode::BoolOr => match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) => Some(truth(if opcode == Opcode::BoolAnd {
                *a != 0 && *b != 0
            } else {
                *a != 0 || *b != 0
            })),
            _ => None,
        },
        _ => None,
    };
    out.ok_or(invalid)
}

fn add(left: Value, right: Value) -> Option<Value> {
    Some(match (left, right) {
        (Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Value::List(a)
        }
        (Value::List(mut a), x) => {
            a.push(x);
            Value::List(a)
        }
        (x, Value::List(b)) => Value::list(std::iter::once(x).chain(b)),
        (Value::String(a), x) => Value::String(a + &x.to_lsl_string()),
        (x, Value::String(b)) => Value::String(x.to_lsl_string() + &b),
        (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_add(b)),
        (Value::Vector(a), Value::Vector(b)) => Value::Vector(a + b),
        (Value::Rotation(a), Value::Rotation(b)) => Value::Rotation(a + b),
        (a, b) => {
            let (a, b) = promoted(&a, &b)?;
            Value::Float(a + b)
        }
    })
}

fn sub(left: &Value, right: &Value) -> Option<Value> {
    Some(match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_sub(*b)),
        (Value::Vector(a), Value::Vector(b)) => Value::Vector(*a - *b),
        (Value::Rotation(a), Value::Rotation(b)) => Value::Rotation(*a - *b),
        _ => {
            let (a, b) = promoted(left, right)?;
            Value::Float(a - b)
        }
    })
}

fn mul(left: &Value, right: &Value) -> Option<Value> {
    Some(match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_mul(*b)),
        (Value::Vector(a), Value::Vector(b)) => Value::Float(a.dot(*b)),
        (Value::Vector(v), Value::Rotation(r)) => Value::Vector(v.rotate(*r)),
        (Value::Rotation(a), Value::Rotation(b)) => Value::Rotation(a.compose(*b)),
        (Value::Vector(v), s) | (s, Value::Vector(v)) => Value::Vector(*v * scalar(s)?),
        _ => {
            let (a, b) = promoted(left, right)?;
            Value::Float(a * b)
        }
    })
}

/// `None` when the pair is undefined.
fn div(left: &Value, right: &Value) -> Option<Result<Value, Fault>> {
    let out = match (left, right) {
        (Value::Integer(_), Value::Integer(0)) => Err(Fault::DivisionByZero),
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_div(*b))),
        (Value::Vector(v), Value::Rotation(r)) => Ok(Value::Vector(v.rotate(r.conjugate()))),
        (Value::Rotation(a), Value::Rotation(b)) => Ok(Value::Rotation(a.compose(b.conjugate()))),
        (Value::Vector(v), s) => match scalar(s)? {
            d if d == 0.0 => Err(Fault::DivisionByZero),
            d => Ok(Value::Vector(*v / d)),
        },
        _ => match promoted(left, right)? {
            (_, b) if b == 0.0 => Err(Fault::DivisionByZero),
            (a, b) => Ok(Value::Float(a / b)),
        },
    };
    Some(out)
}

fn modulo(left: &Value, right: &Value) -> Option<Result<Value, Fault>> {
    let out = match (left, right) {
        (Value::Integer(_), Value::Integer(0)) => Err(Fault::DivisionByZero),
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_rem(*b))),
        (Value::Vector(a), Value::Vector(b)) => Ok(Value::Vector(a.cross(*b))),
        _ => return None,
    };
    Some(out)
}

fn equal(left: &Value, right: &Value) -> Option<Value> {
    Some(match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => truth(a == b),
        (Value::String(a), Value::String(b)) => truth(a == b),
        (Value::Key(a), Value::Key(b)) => truth(a == b),
        (Value::String(s), Value::Key(k)) | (Value::Key(k), Value::String(s)) => {
            truth(*s == k.to_string())
        }
        (Value::Vector(a), Value::Vector(b)) => truth(a == b),
        (Value::Rotation(a), Value::Rotation(b)) => truth(a == b),
        (Value::List(a), Value::List(b)) => truth(a.len() == b.len()),
        _ => {
            let (a, b) = promoted(left, right)?;
            truth(a == b)
        }
    })
}

fn not_equal(left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::List(a), Value::List(b)) => {
            Some(Value::Integer((a.len() as i32).wrapping_sub(b.len() as i32)))
        }
        _ => match equal(left, right)? {
            Value::Integer(eq) => Some(truth(eq == 0)),
            _ => None,
        },
    }
}

fn compare(opcode: Opcode, left: &Value, right: &Value) -> Option<Value> {
    let ordering = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
        _ => {
            let (a, b) = promoted(left, right)?;
            a.partial_cmp(&b)
        }
    };
    // Comparisons involving NaN are false.
    let Some(ordering) = ordering else {
        return Some(truth(false));
    };
    Some(truth(match opcode {
        Opcode::Less => ordering.is_lt(),
        Opcode::Greater => ordering.is_gt(),
        Opcode::Leq => ordering.is_le(),
        _ => ordering.is_ge(),
    }))
}

/// Apply a unary operator.
pub fn unary(opcode: Opcode, value: Value) -> Result<Value, Fault> {
    let out = match (opcode, &value) {
        (Opcode::Neg, Value::Integer(i)) => Value::Integer(i.wrapping_neg()),
        (Opcode::Neg, Value::Float(f)) => Value::Float(-f),
        (Opcode::Neg, Value::Vector(v)) => Value::Vector(-*v),
        (Opcode::Neg, Value::Rotation(r)) => Value::Rotation(-*r),
        (Opcode::BitNot, Value::Integer(i)) => Value::Integer(!i),
        (Opcode::BoolNot, Value::Integer(i)) => truth(*i == 0),
        _ => {
            let tag = value.type_tag();
            return Err(Fault::InvalidOperands {
                opcode,
                left: tag,
                right: tag,
            });
        }
    };
    Ok(out)
}
