//! The host's universal dynamic value.
//!
//! [`Variant`] is a closed tagged union whose tag set ([`VariantType`]) is fixed
//! by the host ABI. Every cross-boundary call passes its arguments and return
//! value as Variants; [`ToVariant`] and [`FromVariant`] convert between them and
//! statically-typed Rust values.
//!
//! ## Key Types
//!
//! - [`VariantType`] - the stable numeric tag set
//! - [`Variant`] - the value itself
//! - [`ToVariant`] / [`FromVariant`] - encode / decode
//! - [`VariantTyped`] - static tag metadata used by typed collections
//!
//! ## Conversion rules
//!
//! - Every integer width encodes as [`Variant::Int`]; decoding is bounds-checked.
//! - `f32` encodes as [`Variant::Float`] and decodes by narrowing.
//! - Integers never decode as floats and floats never decode as integers.
//! - `None` encodes as [`Variant::Nil`]. The null object is
//!   `Variant::Object(None)` and is a different value.

mod convert;

pub use convert::{FromVariant, ToVariant, VariantTyped};

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::VariantError;
use crate::math::*;
use crate::{
    Callable, Dictionary, GString, NativeHandle, NodePath, Rid, Signal, StringName, VariantArray,
};

/// Host Variant tag. The numeric values are part of the ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum VariantType {
    Nil = 0,
    Bool = 1,
    Int = 2,
    Float = 3,
    String = 4,
    Vector2 = 5,
    Vector2i = 6,
    Rect2 = 7,
    Rect2i = 8,
    Vector3 = 9,
    Vector3i = 10,
    Transform2D = 11,
    Vector4 = 12,
    Vector4i = 13,
    Plane = 14,
    Quaternion = 15,
    Aabb = 16,
    Basis = 17,
    Transform3D = 18,
    Projection = 19,
    Color = 20,
    StringName = 21,
    NodePath = 22,
    Rid = 23,
    Object = 24,
    Callable = 25,
    Signal = 26,
    Dictionary = 27,
    Array = 28,
    PackedByteArray = 29,
    PackedInt32Array = 30,
    PackedInt64Array = 31,
    PackedFloat32Array = 32,
    PackedFloat64Array = 33,
    PackedStringArray = 34,
    PackedVector2Array = 35,
    PackedVector3Array = 36,
    PackedColorArray = 37,
    PackedVector4Array = 38,
}

impl VariantType {
    /// Number of tags in the set.
    pub const COUNT: u32 = 39;

    /// Decode a raw ABI tag.
    pub fn from_raw(raw: u32) -> Result<Self, VariantError> {
        Self::try_from(raw).map_err(|_| VariantError::UnknownVariantType(raw))
    }

    /// The raw ABI tag.
    pub fn raw(self) -> u32 {
        self.into()
    }

    /// Host-facing type name, as shown in the editor.
    pub fn name(self) -> &'static str {
        match self {
            VariantType::Nil => "Nil",
            VariantType::Bool => "bool",
            VariantType::Int => "int",
            VariantType::Float => "float",
            VariantType::String => "String",
            VariantType::Vector2 => "Vector2",
            VariantType::Vector2i => "Vector2i",
            VariantType::Rect2 => "Rect2",
            VariantType::Rect2i => "Rect2i",
            VariantType::Vector3 => "Vector3",
            VariantType::Vector3i => "Vector3i",
            VariantType::Transform2D => "Transform2D",
            VariantType::Vector4 => "Vector4",
            VariantType::Vector4i => "Vector4i",
            VariantType::Plane => "Plane",
            VariantType::Quaternion => "Quaternion",
            VariantType::Aabb => "AABB",
            VariantType::Basis => "Basis",
            VariantType::Transform3D => "Transform3D",
            VariantType::Projection => "Projection",
            VariantType::Color => "Color",
            VariantType::StringName => "StringName",
            VariantType::NodePath => "NodePath",
            VariantType::Rid => "RID",
            VariantType::Object => "Object",
            VariantType::Callable => "Callable",
            VariantType::Signal => "Signal",
            VariantType::Dictionary => "Dictionary",
            VariantType::Array => "Array",
            VariantType::PackedByteArray => "PackedByteArray",
            VariantType::PackedInt32Array => "PackedInt32Array",
            VariantType::PackedInt64Array => "PackedInt64Array",
            VariantType::PackedFloat32Array => "PackedFloat32Array",
            VariantType::PackedFloat64Array => "PackedFloat64Array",
            VariantType::PackedStringArray => "PackedStringArray",
            VariantType::PackedVector2Array => "PackedVector2Array",
            VariantType::PackedVector3Array => "PackedVector3Array",
            VariantType::PackedColorArray => "PackedColorArray",
            VariantType::PackedVector4Array => "PackedVector4Array",
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A host dynamic value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(GString),
    Vector2(Vector2),
    Vector2i(Vector2i),
    Rect2(Rect2),
    Rect2i(Rect2i),
    Vector3(Vector3),
    Vector3i(Vector3i),
    Transform2D(Transform2D),
    Vector4(Vector4),
    Vector4i(Vector4i),
    Plane(Plane),
    Quaternion(Quaternion),
    Aabb(Aabb),
    Basis(Basis),
    Transform3D(Transform3D),
    Projection(Projection),
    Color(Color),
    StringName(StringName),
    NodePath(NodePath),
    Rid(Rid),
    /// An object reference; `None` is the null object.
    Object(Option<NativeHandle>),
    Callable(Callable),
    Signal(Signal),
    Dictionary(Dictionary),
    Array(VariantArray),
    PackedByteArray(Vec<u8>),
    PackedInt32Array(Vec<i32>),
    PackedInt64Array(Vec<i64>),
    PackedFloat32Array(Vec<f32>),
    PackedFloat64Array(Vec<f64>),
    PackedStringArray(Vec<GString>),
    PackedVector2Array(Vec<Vector2>),
    PackedVector3Array(Vec<Vector3>),
    PackedColorArray(Vec<Color>),
    PackedVector4Array(Vec<Vector4>),
}

impl Variant {
    /// The value's tag.
    pub fn get_type(&self) -> VariantType {
        match self {
            Variant::Nil => VariantType::Nil,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Int(_) => VariantType::Int,
            Variant::Float(_) => VariantType::Float,
            Variant::String(_) => VariantType::String,
            Variant::Vector2(_) => VariantType::Vector2,
            Variant::Vector2i(_) => VariantType::Vector2i,
            Variant::Rect2(_) => VariantType::Rect2,
            Variant::Rect2i(_) => VariantType::Rect2i,
            Variant::Vector3(_) => VariantType::Vector3,
            Variant::Vector3i(_) => VariantType::Vector3i,
            Variant::Transform2D(_) => VariantType::Transform2D,
            Variant::Vector4(_) => VariantType::Vector4,
            Variant::Vector4i(_) => VariantType::Vector4i,
            Variant::Plane(_) => VariantType::Plane,
            Variant::Quaternion(_) => VariantType::Quaternion,
            Variant::Aabb(_) => VariantType::Aabb,
            Variant::Basis(_) => VariantType::Basis,
            Variant::Transform3D(_) => VariantType::Transform3D,
            Variant::Projection(_) => VariantType::Projection,
            Variant::Color(_) => VariantType::Color,
            Variant::StringName(_) => VariantType::StringName,
            Variant::NodePath(_) => VariantType::NodePath,
            Variant::Rid(_) => VariantType::Rid,
            Variant::Object(_) => VariantType::Object,
            Variant::Callable(_) => VariantType::Callable,
            Variant::Signal(_) => VariantType::Signal,
            Variant::Dictionary(_) => VariantType::Dictionary,
            Variant::Array(_) => VariantType::Array,
            Variant::PackedByteArray(_) => VariantType::PackedByteArray,
            Variant::PackedInt32Array(_) => VariantType::PackedInt32Array,
            Variant::PackedInt64Array(_) => VariantType::PackedInt64Array,
            Variant::PackedFloat32Array(_) => VariantType::PackedFloat32Array,
            Variant::PackedFloat64Array(_) => VariantType::PackedFloat64Array,
            Variant::PackedStringArray(_) => VariantType::PackedStringArray,
            Variant::PackedVector2Array(_) => VariantType::PackedVector2Array,
            Variant::PackedVector3Array(_) => VariantType::PackedVector3Array,
            Variant::PackedColorArray(_) => VariantType::PackedColorArray,
            Variant::PackedVector4Array(_) => VariantType::PackedVector4Array,
        }
    }

    pub fn nil() -> Self {
        Variant::Nil
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Variant::Nil)
    }

    /// The object handle, if this is a non-null object reference.
    pub fn object_handle(&self) -> Option<NativeHandle> {
        match self {
            Variant::Object(handle) => *handle,
            _ => None,
        }
    }

    /// Decode into `T`.
    #[inline]
    pub fn try_to<T: FromVariant>(&self) -> Result<T, VariantError> {
        T::from_variant(self)
    }

    /// Host truthiness: false for nil, zero, empty and null values.
    pub fn booleanize(&self) -> bool {
        match self {
            Variant::Nil => false,
            Variant::Bool(b) => *b,
            Variant::Int(i) => *i != 0,
            Variant::Float(f) => *f != 0.0,
            Variant::String(s) => !s.is_empty(),
            Variant::StringName(s) => !s.is_empty(),
            Variant::NodePath(p) => !p.is_empty(),
            Variant::Rid(rid) => rid.is_valid(),
            Variant::Object(handle) => handle.is_some(),
            Variant::Callable(c) => c.is_valid(),
            Variant::Signal(s) => s.object.is_some(),
            Variant::Dictionary(d) => !d.is_empty(),
            Variant::Array(a) => !a.is_empty(),
            Variant::PackedByteArray(v) => !v.is_empty(),
            Variant::PackedInt32Array(v) => !v.is_empty(),
            Variant::PackedInt64Array(v) => !v.is_empty(),
            Variant::PackedFloat32Array(v) => !v.is_empty(),
            Variant::PackedFloat64Array(v) => !v.is_empty(),
            Variant::PackedStringArray(v) => !v.is_empty(),
            Variant::PackedVector2Array(v) => !v.is_empty(),
            Variant::PackedVector3Array(v) => !v.is_empty(),
            Variant::PackedColorArray(v) => !v.is_empty(),
            Variant::PackedVector4Array(v) => !v.is_empty(),
            other => *other != Variant::default_for(other.get_type()),
        }
    }

    /// The value a freshly-declared property of this type holds.
    pub fn default_for(ty: VariantType) -> Variant {
        match ty {
            VariantType::Nil => Variant::Nil,
            VariantType::Bool => Variant::Bool(false),
            VariantType::Int => Variant::Int(0),
            VariantType::Float => Variant::Float(0.0),
            VariantType::String => Variant::String(GString::new()),
            VariantType::Vector2 => Variant::Vector2(Vector2::ZERO),
            VariantType::Vector2i => Variant::Vector2i(Vector2i::ZERO),
            VariantType::Rect2 => Variant::Rect2(Rect2::default()),
            VariantType::Rect2i => Variant::Rect2i(Rect2i::default()),
            VariantType::Vector3 => Variant::Vector3(Vector3::ZERO),
            VariantType::Vector3i => Variant::Vector3i(Vector3i::ZERO),
            VariantType::Transform2D => Variant::Transform2D(Transform2D::IDENTITY),
            VariantType::Vector4 => Variant::Vector4(Vector4::ZERO),
            VariantType::Vector4i => Variant::Vector4i(Vector4i::ZERO),
            VariantType::Plane => Variant::Plane(Plane::default()),
            VariantType::Quaternion => Variant::Quaternion(Quaternion::IDENTITY),
            VariantType::Aabb => Variant::Aabb(Aabb::default()),
            VariantType::Basis => Variant::Basis(Basis::IDENTITY),
            VariantType::Transform3D => Variant::Transform3D(Transform3D::default()),
            VariantType::Projection => Variant::Projection(Projection::default()),
            VariantType::Color => Variant::Color(Color::default()),
            VariantType::StringName => Variant::StringName(StringName::default()),
            VariantType::NodePath => Variant::NodePath(NodePath::default()),
            VariantType::Rid => Variant::Rid(Rid::INVALID),
            VariantType::Object => Variant::Object(None),
            VariantType::Callable => Variant::Callable(Callable::invalid()),
            VariantType::Signal => Variant::Signal(Signal {
                object: None,
                name: StringName::default(),
            }),
            VariantType::Dictionary => Variant::Dictionary(Dictionary::new()),
            VariantType::Array => Variant::Array(VariantArray::new()),
            VariantType::PackedByteArray => Variant::PackedByteArray(Vec::new()),
            VariantType::PackedInt32Array => Variant::PackedInt32Array(Vec::new()),
            VariantType::PackedInt64Array => Variant::PackedInt64Array(Vec::new()),
            VariantType::PackedFloat32Array => Variant::PackedFloat32Array(Vec::new()),
            VariantType::PackedFloat64Array => Variant::PackedFloat64Array(Vec::new()),
            VariantType::PackedStringArray => Variant::PackedStringArray(Vec::new()),
            VariantType::PackedVector2Array => Variant::PackedVector2Array(Vec::new()),
            VariantType::PackedVector3Array => Variant::PackedVector3Array(Vec::new()),
            VariantType::PackedColorArray => Variant::PackedColorArray(Vec::new()),
            VariantType::PackedVector4Array => Variant::PackedVector4Array(Vec::new()),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Nil => f.write_str("<null>"),
            Variant::Bool(b) => write!(f, "{b}"),
            Variant::Int(i) => write!(f, "{i}"),
            Variant::Float(v) => write!(f, "{v}"),
            Variant::String(s) => write!(f, "{s}"),
            Variant::StringName(s) => write!(f, "{s}"),
            Variant::NodePath(p) => write!(f, "{p}"),
            Variant::Vector2(v) => write!(f, "({}, {})", v.x, v.y),
            Variant::Vector2i(v) => write!(f, "({}, {})", v.x, v.y),
            Variant::Vector3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Variant::Vector3i(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Variant::Vector4(v) => write!(f, "({}, {}, {}, {})", v.x, v.y, v.z, v.w),
            Variant::Vector4i(v) => write!(f, "({}, {}, {}, {})", v.x, v.y, v.z, v.w),
            Variant::Color(c) => write!(f, "({}, {}, {}, {})", c.r, c.g, c.b, c.a),
            Variant::Rid(rid) => write!(f, "RID({})", rid.0),
            Variant::Object(None) => f.write_str("<Object#null>"),
            Variant::Object(Some(handle)) => write!(f, "<Object#{handle}>"),
            Variant::Array(array) => {
                f.write_str("[")?;
                for (i, item) in array.to_vec().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Variant::Dictionary(dict) => {
                f.write_str("{")?;
                for (i, (key, value)) in dict.entries().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            other => write!(f, "{other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_tags_are_stable() {
        assert_eq!(VariantType::Nil.raw(), 0);
        assert_eq!(VariantType::Vector3.raw(), 9);
        assert_eq!(VariantType::Object.raw(), 24);
        assert_eq!(VariantType::Array.raw(), 28);
        assert_eq!(VariantType::PackedVector4Array.raw(), VariantType::COUNT - 1);
    }

    #[test]
    fn unknown_raw_tag() {
        assert_eq!(
            VariantType::from_raw(VariantType::COUNT),
            Err(VariantError::UnknownVariantType(39))
        );
        assert_eq!(VariantType::from_raw(20), Ok(VariantType::Color));
    }

    #[test]
    fn every_default_carries_its_tag() {
        for raw in 0..VariantType::COUNT {
            let ty = VariantType::from_raw(raw).unwrap();
            assert_eq!(Variant::default_for(ty).get_type(), ty);
        }
    }

    #[test]
    fn null_object_is_not_nil() {
        let null = Variant::Object(None);
        assert!(!null.is_nil());
        assert_ne!(null, Variant::Nil);
        assert!(!null.booleanize());
    }

    #[test]
    fn truthiness() {
        assert!(Variant::Int(3).booleanize());
        assert!(!Variant::Float(0.0).booleanize());
        assert!(!Variant::Vector3(Vector3::ZERO).booleanize());
        assert!(Variant::Vector3(Vector3::UP).booleanize());
    }

    #[test]
    fn display() {
        assert_eq!(Variant::Nil.to_string(), "<null>");
        assert_eq!(Variant::Vector2(Vector2::new(1.0, 2.5)).to_string(), "(1, 2.5)");
        let array = VariantArray::new();
        array.push(Variant::Int(1)).unwrap();
        array.push(Variant::String("a".into())).unwrap();
        assert_eq!(Variant::Array(array).to_string(), "[1, a]");
    }
}
