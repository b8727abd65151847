//! Geometric and color aggregates carried inline by Variants.
//!
//! All types are `#[repr(C)]` with single-precision components, matching the
//! host's in-memory layout so a Variant payload can be copied bit-for-bit.

use std::ops::{Add, Mul, Neg, Sub};

macro_rules! vector_ops {
    ($ty:ident, $scalar:ty, $($field:ident),+) => {
        impl $ty {
            pub const ZERO: $ty = $ty { $($field: 0 as $scalar),+ };
            pub const ONE: $ty = $ty { $($field: 1 as $scalar),+ };

            #[inline]
            pub const fn new($($field: $scalar),+) -> Self {
                Self { $($field),+ }
            }

            #[inline]
            pub fn dot(self, other: Self) -> $scalar {
                let mut sum = 0 as $scalar;
                $(sum += self.$field * other.$field;)+
                sum
            }
        }

        impl Add for $ty {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self { $($field: self.$field + rhs.$field),+ }
            }
        }

        impl Sub for $ty {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self { $($field: self.$field - rhs.$field),+ }
            }
        }

        impl Mul<$scalar> for $ty {
            type Output = Self;
            fn mul(self, rhs: $scalar) -> Self {
                Self { $($field: self.$field * rhs),+ }
            }
        }

        impl Neg for $ty {
            type Output = Self;
            fn neg(self) -> Self {
                Self { $($field: -self.$field),+ }
            }
        }
    };
}

/// 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}
vector_ops!(Vector2, f32, x, y);

impl Vector2 {
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }
}

/// 2D integer vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct Vector2i {
    pub x: i32,
    pub y: i32,
}
vector_ops!(Vector2i, i32, x, y);

/// 3D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}
vector_ops!(Vector3, f32, x, y, z);

impl Vector3 {
    pub const UP: Vector3 = Vector3::new(0.0, 1.0, 0.0);

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Native-endian bytes in field order, as the host stores the payload.
    pub fn to_ne_bytes(self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&self.x.to_ne_bytes());
        out[4..8].copy_from_slice(&self.y.to_ne_bytes());
        out[8..12].copy_from_slice(&self.z.to_ne_bytes());
        out
    }

    pub fn from_ne_bytes(bytes: [u8; 12]) -> Self {
        let f = |i: usize| f32::from_ne_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self::new(f(0), f(4), f(8))
    }
}

/// 3D integer vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct Vector3i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}
vector_ops!(Vector3i, i32, x, y, z);

/// 4D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Vector4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}
vector_ops!(Vector4, f32, x, y, z, w);

/// 4D integer vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct Vector4i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub w: i32,
}
vector_ops!(Vector4i, i32, x, y, z, w);

/// Axis-aligned 2D rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Rect2 {
    pub position: Vector2,
    pub size: Vector2,
}

impl Rect2 {
    pub const fn new(position: Vector2, size: Vector2) -> Self {
        Self { position, size }
    }

    pub fn has_point(&self, p: Vector2) -> bool {
        p.x >= self.position.x
            && p.y >= self.position.y
            && p.x < self.position.x + self.size.x
            && p.y < self.position.y + self.size.y
    }
}

/// Axis-aligned 2D integer rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct Rect2i {
    pub position: Vector2i,
    pub size: Vector2i,
}

/// 2D affine transform: two basis columns plus origin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Transform2D {
    pub x: Vector2,
    pub y: Vector2,
    pub origin: Vector2,
}

impl Transform2D {
    pub const IDENTITY: Transform2D = Transform2D {
        x: Vector2::new(1.0, 0.0),
        y: Vector2::new(0.0, 1.0),
        origin: Vector2::ZERO,
    };

    pub fn xform(&self, v: Vector2) -> Vector2 {
        self.x * v.x + self.y * v.y + self.origin
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Plane in Hessian normal form.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Plane {
    pub normal: Vector3,
    pub d: f32,
}

impl Plane {
    pub fn distance_to(&self, p: Vector3) -> f32 {
        self.normal.dot(p) - self.d
    }
}

/// Rotation quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Aabb {
    pub position: Vector3,
    pub size: Vector3,
}

/// 3x3 matrix, stored as rows.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Basis {
    pub rows: [Vector3; 3],
}

impl Basis {
    pub const IDENTITY: Basis = Basis {
        rows: [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        ],
    };

    pub fn xform(&self, v: Vector3) -> Vector3 {
        Vector3::new(self.rows[0].dot(v), self.rows[1].dot(v), self.rows[2].dot(v))
    }
}

impl Default for Basis {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 3D affine transform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Transform3D {
    pub basis: Basis,
    pub origin: Vector3,
}

impl Transform3D {
    pub fn xform(&self, v: Vector3) -> Vector3 {
        self.basis.xform(v) + self.origin
    }
}

/// 4x4 projection matrix, stored as columns.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Projection {
    pub columns: [Vector4; 4],
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            columns: [
                Vector4::new(1.0, 0.0, 0.0, 0.0),
                Vector4::new(0.0, 1.0, 0.0, 0.0),
                Vector4::new(0.0, 0.0, 1.0, 0.0),
                Vector4::new(0.0, 0.0, 0.0, 1.0),
            ],
        }
    }
}

/// Linear RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_html(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 && hex.len() != 8 {
            return None;
        }
        let channel = |i: usize| -> Option<f32> {
            let byte = u8::from_str_radix(hex.get(i..i + 2)?, 16).ok()?;
            Some(byte as f32 / 255.0)
        };
        let alpha = if hex.len() == 8 { channel(6)? } else { 1.0 };
        Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, alpha))
    }
}
