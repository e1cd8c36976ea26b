//! Reference implementations of the pure math and string built-ins.
//!
//! These are synchronous and side-effect free. Hosts register them with
//! their own dispatch table; arguments are assumed to have been checked
//! against the built-in's signature already.

use thiserror::Error;

use crate::math::{Rotation, Vector};
use crate::value::Value;

/// Failure of a reference built-in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    /// Arguments did not match the expected signature.
    #[error("{0}: bad arguments")]
    BadArguments(&'static str),

    /// Input outside the function's domain.
    #[error("{0}: math error")]
    Domain(&'static str),
}

/// A reference built-in.
pub type MathFn = fn(&[Value]) -> Result<Value, MathError>;

/// Reference implementations, by built-in name.
pub static FUNCTIONS: [(&str, MathFn); 21] = [
    ("llSin", ll_sin),
    ("llCos", ll_cos),
    ("llTan", ll_tan),
    ("llAtan2", ll_atan2),
    ("llSqrt", ll_sqrt),
    ("llPow", ll_pow),
    ("llAbs", ll_abs),
    ("llFabs", ll_fabs),
    ("llFloor", ll_floor),
    ("llCeil", ll_ceil),
    ("llRound", ll_round),
    ("llVecMag", ll_vec_mag),
    ("llVecNorm", ll_vec_norm),
    ("llVecDist", ll_vec_dist),
    ("llRot2Euler", ll_rot2euler),
    ("llEuler2Rot", ll_euler2rot),
    ("llAngleBetween", ll_angle_between),
    ("llStringLength", ll_string_length),
    ("llToUpper", ll_to_upper),
    ("llToLower", ll_to_lower),
    ("llGetListLength", ll_get_list_length),
];

/// Implementation for a built-in name, if there is a reference one.
pub fn lookup(name: &str) -> Option<MathFn> {
    FUNCTIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, f)| *f)
}

fn float(args: &[Value], i: usize, name: &'static str) -> Result<f32, MathError> {
    match args.get(i) {
        Some(Value::Float(f)) => Ok(*f),
        Some(Value::Integer(n)) => Ok(*n as f32),
        _ => Err(MathError::BadArguments(name)),
    }
}

fn vector(args: &[Value], i: usize, name: &'static str) -> Result<Vector, MathError> {
    match args.get(i) {
        Some(Value::Vector(v)) => Ok(*v),
        _ => Err(MathError::BadArguments(name)),
    }
}

fn rotation(args: &[Value], i: usize, name: &'static str) -> Result<Rotation, MathError> {
    match args.get(i) {
        Some(Value::Rotation(r)) => Ok(*r),
        _ => Err(MathError::BadArguments(name)),
    }
}

fn string<'a>(args: &'a [Value], i: usize, name: &'static str) -> Result<&'a str, MathError> {
    match args.get(i) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(MathError::BadArguments(name)),
    }
}

fn ll_sin(args: &[Value]) -> Result<Value, MathError> {
    Ok(Value::Float(float(args, 0, "llSin")?.sin()))
}

fn ll_cos(args: &[Value]) -> Result<Value, MathError> {
    Ok(Value::Float(float(args, 0, "llCos")?.cos()))
}

fn ll_tan(args: &[Value]) -> Result<Value, MathError> {
    Ok(Value::Float(float(args, 0, "llTan")?.tan()))
}

fn ll_atan2(args: &[Value]) -> Result<Value, MathError> {
    let y = float(args, 0, "llAtan2")?;
    let x = float(args, 1, "llAtan2")?;
    Ok(Value::Float(y.atan2(x)))
}

fn ll_sqrt(args: &[Value]) -> Result<Value, MathError> {
    let x = float(args, 0, "llSqrt")?;
    if x < 0.0 {
        return Err(MathError::Domain("llSqrt"));
    }
    Ok(Value::Float(x.sqrt()))
}

fn ll_pow(args: &[Value]) -> Result<Value, MathError> {
    let base = float(args, 0, "llPow")?;
    let exp = float(args, 1, "llPow")?;
    Ok(Value::Float(base.powf(exp)))
}

fn ll_abs(args: &[Value]) -> Result<Value, MathError> {
    match args.first() {
        Some(Value::Integer(n)) => Ok(Value::Integer(n.wrapping_abs())),
        _ => Err(MathError::BadArguments("llAbs")),
    }
}

fn ll_fabs(args: &[Value]) -> Result<Value, MathError> {
    Ok(Value::Float(float(args, 0, "llFabs")?.abs()))
}

fn ll_floor(args: &[Value]) -> Result<Value, MathError> {
    Ok(Value::Integer(float(args, 0, "llFloor")?.floor() as i32))
}

fn ll_ceil(args: &[Value]) -> Result<Value, MathError> {
    Ok(Value::Integer(float(args, 0, "llCeil")?.ceil() as i32))
}

/// Halves round up: `llRound(-2.5) == -2`.
fn ll_round(args: &[Value]) -> Result<Value, MathError> {
    Ok(Value::Integer((float(args, 0, "llRound")? + 0.5).floor() as i32))
}

fn ll_vec_mag(args: &[Value]) -> Result<Value, MathError> {
    Ok(Value::Float(vector(args, 0, "llVecMag")?.mag()))
}

fn ll_vec_norm(args: &[Value]) -> Result<Value, MathError> {
    Ok(Value::Vector(vector(args, 0, "llVecNorm")?.norm()))
}

fn ll_vec_dist(args: &[Value]) -> Result<Value, MathError> {
    let a = vector(args, 0, "llVecDist")?;
    let b = vector(args, 1, "llVecDist")?;
    Ok(Value::Float(a.dist(b)))
}

fn ll_rot2euler(args: &[Value]) -> Result<Value, MathError> {
    Ok(Value::Vector(rotation(args, 0, "llRot2Euler")?.to_euler()))
}

fn ll_euler2rot(args: &[Value]) -> Result<Value, MathError> {
    Ok(Value::Rotation(Rotation::from_euler(vector(
        args,
        0,
        "llEuler2Rot",
    )?)))
}

fn ll_angle_between(args: &[Value]) -> Result<Value, MathError> {
    let a = rotation(args, 0, "llAngleBetween")?;
    let b = rotation(args, 1, "llAngleBetween")?;
    Ok(Value::Float(a.angle_between(b)))
}

fn ll_string_length(args: &[Value]) -> Result<Value, MathError> {
    let s = string(args, 0, "llStringLength")?;
    Ok(Value::Integer(s.chars().count() as i32))
}

fn ll_to_upper(args: &[Value]) -> Result<Value, MathError> {
    Ok(Value::String(string(args, 0, "llToUpper")?.to_uppercase()))
}

fn ll_to_lower(args: &[Value]) -> Result<Value, MathError> {
    Ok(Value::String(string(args, 0, "llToLower")?.to_lowercase()))
}

fn ll_get_list_length(args: &[Value]) -> Result<Value, MathError> {
    match args.first() {
        Some(Value::List(items)) => Ok(Value::Integer(items.len() as i32)),
        _ => Err(MathError::BadArguments("llGetListLength")),
    }
}
