//! Argument decoding and return encoding for trampolines.
//!
//! [`FromArg`] is [`FromVariant`] plus access to the bridge, so object
//! parameters resolve through the identity registry. [`IntoReturn`] is
//! [`ToVariant`] plus a failure channel, so managed bodies can return
//! `Result` without errors crossing the ABI.

use std::fmt::Display;

use hostbind_core::{
    Aabb, Basis, Callable, Color, Dictionary, ElementType, FromVariant, GString, NodePath, Plane, Projection, Quaternion,
    Rect2, Rect2i, Rid, Signal, StringName, ToVariant, Transform2D, Transform3D, TypedArray, TypedDictionary,
    Variant, VariantArray, VariantType, VariantTyped, Vector2, Vector2i, Vector3, Vector3i, Vector4, Vector4i,
};

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::object::{Obj, ObjectRef, Proxy};
use crate::registration::{Subclass, class_name_of};

/// A parameter type of an override or exported method.
pub trait FromArg: Sized {
    /// Declared Variant tag. `Nil` means "any Variant".
    fn param_type() -> VariantType;

    /// Class constraint for object parameters.
    fn param_class() -> Option<StringName> {
        None
    }

    /// Element types of typed container parameters.
    fn param_elements() -> Vec<ElementType> {
        Vec::new()
    }

    fn from_arg(value: &Variant, bridge: &Bridge) -> Result<Self, BridgeError>;
}

/// A return type of an override or exported method.
pub trait IntoReturn {
    /// Declared Variant tag. `Nil` for no return value.
    fn return_type() -> VariantType;

    fn return_class() -> Option<StringName> {
        None
    }

    fn return_elements() -> Vec<ElementType> {
        Vec::new()
    }

    /// Encode the result. `Err` carries a managed-side failure message; the
    /// trampoline logs it and hands the host nil.
    fn into_return(self) -> Result<Variant, String>;
}

macro_rules! impl_args_for_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromArg for $ty {
                fn param_type() -> VariantType {
                    <$ty as VariantTyped>::VARIANT_TYPE
                }

                fn from_arg(value: &Variant, _bridge: &Bridge) -> Result<Self, BridgeError> {
                    Ok(<$ty as FromVariant>::from_variant(value)?)
                }
            }

            impl IntoReturn for $ty {
                fn return_type() -> VariantType {
                    <$ty as VariantTyped>::VARIANT_TYPE
                }

                fn into_return(self) -> Result<Variant, String> {
                    Ok(self.to_variant())
                }
            }
        )*
    };
}

impl_args_for_values!(
    bool, i8, i16, i32, i64, u8, u16, u32, u64, isize, usize, f32, f64,
    String, GString, StringName, NodePath, Rid, Callable, Signal,
    Vector2, Vector2i, Rect2, Rect2i, Vector3, Vector3i, Transform2D, Vector4, Vector4i,
    Plane, Quaternion, Aabb, Basis, Transform3D, Projection, Color,
    Dictionary, VariantArray,
    Vec<u8>, Vec<i32>, Vec<i64>, Vec<f32>, Vec<f64>, Vec<GString>,
    Vec<Vector2>, Vec<Vector3>, Vec<Color>, Vec<Vector4>,
);

impl FromArg for Variant {
    fn param_type() -> VariantType {
        VariantType::Nil
    }

    fn from_arg(value: &Variant, _bridge: &Bridge) -> Result<Self, BridgeError> {
        Ok(value.clone())
    }
}

impl IntoReturn for Variant {
    fn return_type() -> VariantType {
        VariantType::Nil
    }

    fn into_return(self) -> Result<Variant, String> {
        Ok(self)
    }
}

impl IntoReturn for () {
    fn return_type() -> VariantType {
        VariantType::Nil
    }

    fn into_return(self) -> Result<Variant, String> {
        Ok(Variant::Nil)
    }
}

// ============================================================================
// Containers
// ============================================================================

impl<T: VariantTyped + ToVariant + FromVariant> FromArg for TypedArray<T> {
    fn param_type() -> VariantType {
        VariantType::Array
    }

    fn param_elements() -> Vec<ElementType> {
        Self::element_types()
    }

    fn from_arg(value: &Variant, _bridge: &Bridge) -> Result<Self, BridgeError> {
        Ok(TypedArray::from_variant(value)?)
    }
}

impl<T: VariantTyped> IntoReturn for TypedArray<T> {
    fn return_type() -> VariantType {
        VariantType::Array
    }

    fn return_elements() -> Vec<ElementType> {
        Self::element_types()
    }

    fn into_return(self) -> Result<Variant, String> {
        Ok(self.to_variant())
    }
}

impl<K, V> FromArg for TypedDictionary<K, V>
where
    K: VariantTyped + ToVariant + FromVariant,
    V: VariantTyped + ToVariant + FromVariant,
{
    fn param_type() -> VariantType {
        VariantType::Dictionary
    }

    fn param_elements() -> Vec<ElementType> {
        Self::element_types()
    }

    fn from_arg(value: &Variant, _bridge: &Bridge) -> Result<Self, BridgeError> {
        Ok(TypedDictionary::from_variant(value)?)
    }
}

impl<K: VariantTyped, V: VariantTyped> IntoReturn for TypedDictionary<K, V> {
    fn return_type() -> VariantType {
        VariantType::Dictionary
    }

    fn return_elements() -> Vec<ElementType> {
        Self::element_types()
    }

    fn into_return(self) -> Result<Variant, String> {
        Ok(self.to_variant())
    }
}

// ============================================================================
// Objects
// ============================================================================

impl FromArg for ObjectRef {
    fn param_type() -> VariantType {
        VariantType::Object
    }

    fn from_arg(value: &Variant, bridge: &Bridge) -> Result<Self, BridgeError> {
        bridge.object_from_variant(value)?.ok_or(BridgeError::NullObject)
    }
}

impl IntoReturn for ObjectRef {
    fn return_type() -> VariantType {
        VariantType::Object
    }

    fn into_return(self) -> Result<Variant, String> {
        Ok(self.to_variant())
    }
}

impl FromArg for Proxy {
    fn param_type() -> VariantType {
        VariantType::Object
    }

    /// Any non-null object as a proxy, including subclassed ones.
    fn from_arg(value: &Variant, bridge: &Bridge) -> Result<Self, BridgeError> {
        let object = ObjectRef::from_arg(value, bridge)?;
        Ok(Proxy::new(object.handle(), object.class_name().clone()))
    }
}

impl IntoReturn for Proxy {
    fn return_type() -> VariantType {
        VariantType::Object
    }

    fn into_return(self) -> Result<Variant, String> {
        Ok(self.to_variant())
    }
}

impl<T: Subclass> FromArg for Obj<T> {
    fn param_type() -> VariantType {
        VariantType::Object
    }

    fn param_class() -> Option<StringName> {
        class_name_of::<T>().ok()
    }

    fn from_arg(value: &Variant, bridge: &Bridge) -> Result<Self, BridgeError> {
        let object = ObjectRef::from_arg(value, bridge)?;
        object.cast::<T>().ok_or_else(|| BridgeError::WrongType {
            expected: Self::param_class().unwrap_or_else(|| StringName::from(std::any::type_name::<T>())),
            actual: object.class_name().clone(),
        })
    }
}

impl<T: Subclass> IntoReturn for Obj<T> {
    fn return_type() -> VariantType {
        VariantType::Object
    }

    fn return_class() -> Option<StringName> {
        class_name_of::<T>().ok()
    }

    fn into_return(self) -> Result<Variant, String> {
        Ok(self.to_variant())
    }
}

// ============================================================================
// Wrappers
// ============================================================================

/// `Nil` and the null object decode as `None`.
impl<T: FromArg> FromArg for Option<T> {
    fn param_type() -> VariantType {
        T::param_type()
    }

    fn param_class() -> Option<StringName> {
        T::param_class()
    }

    fn param_elements() -> Vec<ElementType> {
        T::param_elements()
    }

    fn from_arg(value: &Variant, bridge: &Bridge) -> Result<Self, BridgeError> {
        match value {
            Variant::Nil | Variant::Object(None) => Ok(None),
            other => T::from_arg(other, bridge).map(Some),
        }
    }
}

impl<T: IntoReturn> IntoReturn for Option<T> {
    fn return_type() -> VariantType {
        T::return_type()
    }

    fn return_class() -> Option<StringName> {
        T::return_class()
    }

    fn return_elements() -> Vec<ElementType> {
        T::return_elements()
    }

    fn into_return(self) -> Result<Variant, String> {
        match self {
            Some(value) => value.into_return(),
            None if T::return_type() == VariantType::Object => Ok(Variant::Object(None)),
            None => Ok(Variant::Nil),
        }
    }
}

impl<T: IntoReturn, E: Display> IntoReturn for Result<T, E> {
    fn return_type() -> VariantType {
        T::return_type()
    }

    fn return_class() -> Option<StringName> {
        T::return_class()
    }

    fn return_elements() -> Vec<ElementType> {
        T::return_elements()
    }

    fn into_return(self) -> Result<Variant, String> {
        match self {
            Ok(value) => value.into_return(),
            Err(err) => Err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_types_follow_variant_tags() {
        assert_eq!(<i32 as FromArg>::param_type(), VariantType::Int);
        assert_eq!(<String as FromArg>::param_type(), VariantType::String);
        assert_eq!(<Option<Vector3> as FromArg>::param_type(), VariantType::Vector3);
        assert_eq!(<ObjectRef as FromArg>::param_type(), VariantType::Object);
        assert_eq!(<() as IntoReturn>::return_type(), VariantType::Nil);
        assert_eq!(<Result<f64, String> as IntoReturn>::return_type(), VariantType::Float);
    }

    #[test]
    fn failures_are_carried_as_messages() {
        let ok: Result<i64, String> = Ok(3);
        assert_eq!(ok.into_return(), Ok(Variant::Int(3)));

        let err: Result<i64, String> = Err("no target".into());
        assert_eq!(err.into_return(), Err("no target".to_string()));
    }

    #[test]
    fn absent_object_returns_null_object() {
        let none: Option<ObjectRef> = None;
        assert_eq!(none.into_return(), Ok(Variant::Object(None)));

        let none: Option<i64> = None;
        assert_eq!(none.into_return(), Ok(Variant::Nil));
    }
}
