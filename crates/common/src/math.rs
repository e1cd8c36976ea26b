//! Vector and rotation types.
//!
//! Rotations are unit quaternions stored as `(x, y, z, s)`. Composition
//! follows script semantics: `a.compose(b)` is "rotate by `a`, then by
//! `b`", and `v.rotate(r)` applies `r` to `v`, so
//! `v.rotate(a).rotate(b) == v.rotate(a.compose(b))`.

use std::ops::{Add, Div, Mul, Neg, Sub};

/// Three-component float vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Quaternion rotation `(x, y, z, s)`; `s` is the scalar part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub s: f32,
}

impl Vector {
    /// `<0, 0, 0>`.
    pub const ZERO: Vector = Vector {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    pub fn dot(self, other: Vector) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    pub fn cross(self, other: Vector) -> Vector {
        Vector::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Euclidean length.
    pub fn mag(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction. The zero vector normalizes to
    /// itself.
    pub fn norm(self) -> Vector {
        let mag = self.mag();
        if mag == 0.0 {
            return Vector::ZERO;
        }
        self / mag
    }

    /// Distance between two points.
    pub fn dist(self, other: Vector) -> f32 {
        (self - other).mag()
    }

    pub fn is_zero(self) -> bool {
        self == Vector::ZERO
    }

    /// Apply `rot` to this vector.
    pub fn rotate(self, rot: Rotation) -> Vector {
        let v = Rotation::new(self.x, self.y, self.z, 0.0);
        let r = hamilton(hamilton(rot, v), rot.conjugate());
        Vector::new(r.x, r.y, r.z)
    }
}

impl Add for Vector {
    type Output = Vector;
    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector {
    type Output = Vector;
    fn sub(self, rhs: Vector) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vector {
    type Output = Vector;
    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f32> for Vector {
    type Output = Vector;
    fn mul(self, rhs: f32) -> Vector {
        Vector::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Vector {
    type Output = Vector;
    fn div(self, rhs: f32) -> Vector {
        Vector::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

/// Hamilton product `p ⊗ q`.
fn hamilton(p: Rotation, q: Rotation) -> Rotation {
    Rotation::new(
        p.s * q.x + p.x * q.s + p.y * q.z - p.z * q.y,
        p.s * q.y - p.x * q.z + p.y * q.s + p.z * q.x,
        p.s * q.z + p.x * q.y - p.y * q.x + p.z * q.s,
        p.s * q.s - p.x * q.x - p.y * q.y - p.z * q.z,
    )
}

impl Rotation {
    /// `<0, 0, 0, 1>`.
    pub const IDENTITY: Rotation = Rotation {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        s: 1.0,
    };

    pub const fn new(x: f32, y: f32, z: f32, s: f32) -> Self {
        Self { x, y, z, s }
    }

    pub fn conjugate(self) -> Rotation {
        Rotation::new(-self.x, -self.y, -self.z, self.s)
    }

    /// Rotate by `self`, then by `then`.
    pub fn compose(self, then: Rotation) -> Rotation {
        hamilton(then, self)
    }

    pub fn dot(self, other: Rotation) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.s * other.s
    }

    pub fn mag(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Scale to unit length. A zero quaternion becomes the identity.
    pub fn normalize(self) -> Rotation {
        let mag = self.mag();
        if mag == 0.0 {
            return Rotation::IDENTITY;
        }
        Rotation::new(self.x / mag, self.y / mag, self.z / mag, self.s / mag)
    }

    pub fn is_identity(self) -> bool {
        self == Rotation::IDENTITY
    }

    /// Rotation from Euler angles in radians, applied about the fixed
    /// X, then Y, then Z axes.
    pub fn from_euler(v: Vector) -> Rotation {
        let (s1, c1) = ((v.x as f64) * 0.5).sin_cos();
        let (s2, c2) = ((v.y as f64) * 0.5).sin_cos();
        let (s3, c3) = ((v.z as f64) * 0.5).sin_cos();
        Rotation::new(
            (s1 * c2 * c3 - c1 * s2 * s3) as f32,
            (c1 * s2 * c3 + s1 * c2 * s3) as f32,
            (c1 * c2 * s3 - s1 * s2 * c3) as f32,
            (c1 * c2 * c3 + s1 * s2 * s3) as f32,
        )
    }

    /// Inverse of [`Rotation::from_euler`].
    pub fn to_euler(self) -> Vector {
        let q = self.normalize();
        let (x, y, z, w) = (q.x as f64, q.y as f64, q.z as f64, q.s as f64);

        let r00 = 1.0 - 2.0 * (y * y + z * z);
        let r10 = 2.0 * (x * y + z * w);
        let r20 = 2.0 * (x * z - y * w);
        let r21 = 2.0 * (y * z + x * w);
        let r22 = 1.0 - 2.0 * (x * x + y * y);
        let r11 = 1.0 - 2.0 * (x * x + z * z);
        let r12 = 2.0 * (y * z - x * w);

        let sin_pitch = (-r20).clamp(-1.0, 1.0);
        let pitch = sin_pitch.asin();
        if sin_pitch.abs() > 0.999_999 {
            // Gimbal lock: fold yaw into roll.
            let roll = (-r12).atan2(r11);
            return Vector::new(roll as f32, pitch as f32, 0.0);
        }
        let roll = r21.atan2(r22);
        let yaw = r10.atan2(r00);
        Vector::new(roll as f32, pitch as f32, yaw as f32)
    }

    /// Angle in radians between two orientations.
    pub fn angle_between(self, other: Rotation) -> f32 {
        let denom = self.mag() * other.mag();
        if denom == 0.0 {
            return 0.0;
        }
        let cos_half = ((self.dot(other) / denom).abs() as f64).min(1.0);
        (2.0 * cos_half.acos()) as f32
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::IDENTITY
    }
}

impl Add for Rotation {
    type Output = Rotation;
    fn add(self, rhs: Rotation) -> Rotation {
        Rotation::new(
            self.x + rhs.x,
            self.y + rhs.y,
            self.z + rhs.z,
            self.s + rhs.s,
        )
    }
}

impl Sub for Rotation {
    type Output = Rotation;
    fn sub(self, rhs: Rotation) -> Rotation {
        Rotation::new(
            self.x - rhs.x,
            self.y - rhs.y,
            self.z - rhs.z,
            self.s - rhs.s,
        )
    }
}

impl Neg for Rotation {
    type Output = Rotation;
    fn neg(self) -> Rotation {
        Rotation::new(-self.x, -self.y, -self.z, -self.s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn close(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    fn vclose(a: Vector, b: Vector) -> bool {
        close(a.x, b.x, 1e-5) && close(a.y, b.y, 1e-5) && close(a.z, b.z, 1e-5)
    }

    #[test]
    fn norm_of_zero_is_zero() {
        assert_eq!(Vector::ZERO.norm(), Vector::ZERO);
    }

    #[test]
    fn norm_scales_to_unit() {
        let n = Vector::new(10.0, 25.0, 0.0).norm();
        assert!(close(n.x, 0.371391, 1e-6));
        assert!(close(n.y, 0.928477, 1e-6));
        assert_eq!(n.z, 0.0);
    }

    #[test]
    fn dot_and_cross() {
        let x = Vector::new(1.0, 0.0, 0.0);
        let y = Vector::new(0.0, 1.0, 0.0);
        assert_eq!(x.dot(y), 0.0);
        assert_eq!(x.cross(y), Vector::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn quarter_turn_about_z() {
        let r = Rotation::from_euler(Vector::new(0.0, 0.0, FRAC_PI_2));
        let v = Vector::new(1.0, 0.0, 0.0).rotate(r);
        assert!(vclose(v, Vector::new(0.0, 1.0, 0.0)), "got {v:?}");
    }

    #[test]
    fn compose_matches_sequential_rotation() {
        let a = Rotation::from_euler(Vector::new(0.3, 0.0, 0.0));
        let b = Rotation::from_euler(Vector::new(0.0, 0.0, 1.1));
        let v = Vector::new(0.2, 1.0, -0.5);
        assert!(vclose(v.rotate(a).rotate(b), v.rotate(a.compose(b))));
    }

    #[test]
    fn euler_roundtrip_preserves_rotation() {
        let samples = [
            Rotation::new(0.0, 0.0, 0.0, 1.0),
            Rotation::new(0.0, 0.0, 0.707107, 0.707107),
            Rotation::new(0.0, 0.0, 1.0, 0.0),
            Rotation::new(0.5, -0.5, 0.5, 0.5),
            Rotation::new(0.707107, -0.707107, 0.0, 0.0),
            Rotation::new(-0.5, -0.5, -0.5, 0.5),
            Rotation::new(0.719188, -0.408934, -0.363998, -0.427841),
            Rotation::new(0.50001, 0.50001, 0.50001, 0.50001),
            Rotation::new(-0.701055, 0.092296, 0.701055, -0.092296),
        ];
        for rot in samples {
            let rot = rot.normalize();
            let back = Rotation::from_euler(rot.to_euler());
            // Same orientation: rot composed with the inverse of back is identity.
            let check = rot.compose(back.conjugate());
            assert!(
                close(check.x, 0.0, 1e-3) && close(check.y, 0.0, 1e-3) && close(check.z, 0.0, 1e-3),
                "roundtrip failed for {rot:?}: {check:?}"
            );
        }
    }

    #[test]
    fn angle_between_ignores_scale() {
        let axis = Vector::new(0.0, 0.0, 1.0);
        for degrees in [0.0f32, 90.0, 180.0] {
            let angle = degrees * PI / 180.0;
            let (s, c) = (angle * 0.5).sin_cos();
            let a = Rotation::new(0.0, 0.0, 0.0, 1.6);
            let b = Rotation::new(axis.x * s * 1.8, axis.y * s * 1.8, axis.z * s * 1.8, c * 1.8);
            assert!(close(b.angle_between(a), angle, 1e-4), "angle {degrees}");
        }
    }
}
