//! Conversion traits between Rust values and [`Variant`].
//!
//! ## Supported Types
//!
//! - Integers: `i8`, `i16`, `i32`, `i64`, `u8`, `u16`, `u32`, `u64`, `isize`, `usize`
//! - Floats: `f32`, `f64`
//! - `bool`, `()`, `String`, `str`
//! - Every math aggregate, string-like value and packed array
//! - `Option<T>` (nil-aware)

use crate::error::VariantError;
use crate::math::*;
use crate::variant::{Variant, VariantType};
use crate::{Callable, Dictionary, ElementType, GString, NodePath, Rid, Signal, StringName, VariantArray};

/// Encode a Rust value as a Variant. Encoding is total.
pub trait ToVariant {
    fn to_variant(&self) -> Variant;
}

/// Decode a Rust value from a Variant.
pub trait FromVariant: Sized {
    /// Returns [`VariantError::TypeMismatch`] when the tag does not match.
    fn from_variant(variant: &Variant) -> Result<Self, VariantError>;
}

/// Static tag metadata for a Rust type.
///
/// Typed collections record this as their element type; the trampoline uses it
/// to describe parameter types to the host.
pub trait VariantTyped {
    const VARIANT_TYPE: VariantType;

    /// Class-name constraint for object types.
    fn class_name() -> Option<StringName> {
        None
    }

    /// Element types of typed containers: one for arrays, key then value for
    /// dictionaries. Empty for everything else.
    fn element_types() -> Vec<ElementType> {
        Vec::new()
    }
}

impl ToVariant for Variant {
    fn to_variant(&self) -> Variant {
        self.clone()
    }
}

impl FromVariant for Variant {
    fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
        Ok(variant.clone())
    }
}

impl VariantTyped for Variant {
    const VARIANT_TYPE: VariantType = VariantType::Nil;
}

impl ToVariant for () {
    fn to_variant(&self) -> Variant {
        Variant::Nil
    }
}

impl FromVariant for () {
    fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
        match variant {
            Variant::Nil => Ok(()),
            other => Err(VariantError::mismatch(VariantType::Nil, other.get_type())),
        }
    }
}

impl VariantTyped for () {
    const VARIANT_TYPE: VariantType = VariantType::Nil;
}

// ============================================================================
// Integer implementations
// ============================================================================

macro_rules! impl_variant_int {
    ($($ty:ty),*) => {
        $(
            impl ToVariant for $ty {
                fn to_variant(&self) -> Variant {
                    Variant::Int(*self as i64)
                }
            }

            impl FromVariant for $ty {
                fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
                    match variant {
                        Variant::Int(v) => <$ty>::try_from(*v).map_err(|_| VariantError::IntegerOverflow {
                            value: *v,
                            target_type: stringify!($ty),
                        }),
                        other => Err(VariantError::mismatch(VariantType::Int, other.get_type())),
                    }
                }
            }

            impl VariantTyped for $ty {
                const VARIANT_TYPE: VariantType = VariantType::Int;
            }
        )*
    };
}

impl_variant_int!(i8, i16, i32, i64, u8, u16, u32, isize);

// Unsigned 64-bit wide types share the host's 64-bit slot by bit
// reinterpretation, so every value round-trips.
macro_rules! impl_variant_unsigned_wide {
    ($($ty:ty),*) => {
        $(
            impl ToVariant for $ty {
                fn to_variant(&self) -> Variant {
                    Variant::Int(*self as u64 as i64)
                }
            }

            impl FromVariant for $ty {
                fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
                    match variant {
                        Variant::Int(v) => <$ty>::try_from(*v as u64).map_err(|_| VariantError::IntegerOverflow {
                            value: *v,
                            target_type: stringify!($ty),
                        }),
                        other => Err(VariantError::mismatch(VariantType::Int, other.get_type())),
                    }
                }
            }

            impl VariantTyped for $ty {
                const VARIANT_TYPE: VariantType = VariantType::Int;
            }
        )*
    };
}

impl_variant_unsigned_wide!(u64, usize);

// ============================================================================
// Float implementations
// ============================================================================

impl ToVariant for f64 {
    fn to_variant(&self) -> Variant {
        Variant::Float(*self)
    }
}

impl FromVariant for f64 {
    fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
        match variant {
            Variant::Float(v) => Ok(*v),
            other => Err(VariantError::mismatch(VariantType::Float, other.get_type())),
        }
    }
}

impl VariantTyped for f64 {
    const VARIANT_TYPE: VariantType = VariantType::Float;
}

impl ToVariant for f32 {
    fn to_variant(&self) -> Variant {
        Variant::Float(*self as f64)
    }
}

impl FromVariant for f32 {
    fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
        match variant {
            Variant::Float(v) => Ok(*v as f32),
            other => Err(VariantError::mismatch(VariantType::Float, other.get_type())),
        }
    }
}

impl VariantTyped for f32 {
    const VARIANT_TYPE: VariantType = VariantType::Float;
}

// ============================================================================
// Value types carried by clone
// ============================================================================

macro_rules! impl_variant_value {
    ($($ty:ty => $arm:ident),* $(,)?) => {
        $(
            impl ToVariant for $ty {
                fn to_variant(&self) -> Variant {
                    Variant::$arm(self.clone())
                }
            }

            impl FromVariant for $ty {
                fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
                    match variant {
                        Variant::$arm(v) => Ok(v.clone()),
                        other => Err(VariantError::mismatch(VariantType::$arm, other.get_type())),
                    }
                }
            }

            impl VariantTyped for $ty {
                const VARIANT_TYPE: VariantType = VariantType::$arm;
            }
        )*
    };
}

impl_variant_value!(
    bool => Bool,
    GString => String,
    Vector2 => Vector2,
    Vector2i => Vector2i,
    Rect2 => Rect2,
    Rect2i => Rect2i,
    Vector3 => Vector3,
    Vector3i => Vector3i,
    Transform2D => Transform2D,
    Vector4 => Vector4,
    Vector4i => Vector4i,
    Plane => Plane,
    Quaternion => Quaternion,
    Aabb => Aabb,
    Basis => Basis,
    Transform3D => Transform3D,
    Projection => Projection,
    Color => Color,
    StringName => StringName,
    NodePath => NodePath,
    Rid => Rid,
    Callable => Callable,
    Signal => Signal,
    Dictionary => Dictionary,
    VariantArray => Array,
    Vec<u8> => PackedByteArray,
    Vec<i32> => PackedInt32Array,
    Vec<i64> => PackedInt64Array,
    Vec<f32> => PackedFloat32Array,
    Vec<f64> => PackedFloat64Array,
    Vec<GString> => PackedStringArray,
    Vec<Vector2> => PackedVector2Array,
    Vec<Vector3> => PackedVector3Array,
    Vec<Color> => PackedColorArray,
    Vec<Vector4> => PackedVector4Array,
);

impl ToVariant for String {
    fn to_variant(&self) -> Variant {
        Variant::String(GString::from(self.as_str()))
    }
}

impl FromVariant for String {
    fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
        match variant {
            Variant::String(s) => Ok(s.as_str().to_string()),
            other => Err(VariantError::mismatch(VariantType::String, other.get_type())),
        }
    }
}

impl VariantTyped for String {
    const VARIANT_TYPE: VariantType = VariantType::String;
}

impl ToVariant for str {
    fn to_variant(&self) -> Variant {
        Variant::String(GString::from(self))
    }
}

impl ToVariant for Vec<String> {
    fn to_variant(&self) -> Variant {
        Variant::PackedStringArray(self.iter().map(|s| GString::from(s.as_str())).collect())
    }
}

// ============================================================================
// Option
// ============================================================================

impl<T: ToVariant> ToVariant for Option<T> {
    fn to_variant(&self) -> Variant {
        match self {
            Some(value) => value.to_variant(),
            None => Variant::Nil,
        }
    }
}

impl<T: FromVariant> FromVariant for Option<T> {
    fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
        match variant {
            Variant::Nil => Ok(None),
            other => T::from_variant(other).map(Some),
        }
    }
}

impl<T: ToVariant + ?Sized> ToVariant for &T {
    fn to_variant(&self) -> Variant {
        (**self).to_variant()
    }
}
