//! Host arrays, untyped and element-typed.
//!
//! [`VariantArray`] has reference semantics like the host's arrays: clones share
//! storage. Its [`ElementType`] is fixed at construction and every insertion is
//! checked against it. [`TypedArray`] is a statically-typed view that decodes
//! each element through the Variant codec on every access.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::VariantError;
use crate::variant::{FromVariant, ToVariant, Variant, VariantType, VariantTyped};
use crate::{NativeHandle, StringName};

/// Element-type constraint of a typed collection.
///
/// `variant_type == Nil` means untyped. Object collections may additionally
/// carry a class-name constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementType {
    pub variant_type: VariantType,
    pub class_name: Option<StringName>,
}

impl ElementType {
    /// Accepts any element.
    pub const UNTYPED: ElementType = ElementType {
        variant_type: VariantType::Nil,
        class_name: None,
    };

    pub fn new(variant_type: VariantType) -> Self {
        Self {
            variant_type,
            class_name: None,
        }
    }

    /// Object elements constrained to `class_name` or its subclasses.
    pub fn object(class_name: impl Into<StringName>) -> Self {
        Self {
            variant_type: VariantType::Object,
            class_name: Some(class_name.into()),
        }
    }

    /// Element type recorded for a collection of `T`.
    pub fn of<T: VariantTyped>() -> Self {
        Self {
            variant_type: T::VARIANT_TYPE,
            class_name: T::class_name(),
        }
    }

    pub fn is_typed(&self) -> bool {
        self.variant_type != VariantType::Nil
    }

    /// Tag-level admission check. Object collections accept the null object.
    pub fn accepts(&self, value: &Variant) -> bool {
        !self.is_typed() || value.get_type() == self.variant_type
    }

    /// Admission check without class information. A class-constrained element
    /// type rejects every non-null object, since its class cannot be verified.
    pub(crate) fn check(&self, value: &Variant) -> Result<(), VariantError> {
        self.check_with(value, None)
    }

    /// Admission check, resolving class constraints through `classes`.
    pub(crate) fn check_with(&self, value: &Variant, classes: Option<&dyn ClassCheck>) -> Result<(), VariantError> {
        if !self.accepts(value) {
            return Err(VariantError::ElementTypeMismatch {
                expected: self.to_string(),
                actual: value.get_type().to_string(),
            });
        }
        let (Some(class_name), Variant::Object(Some(handle))) = (&self.class_name, value) else {
            return Ok(());
        };
        let Some(classes) = classes else {
            return Err(VariantError::ElementTypeMismatch {
                expected: class_name.to_string(),
                actual: "Object of unverified class".to_string(),
            });
        };
        if classes.is_instance_of(*handle, class_name) {
            return Ok(());
        }
        let actual = classes
            .class_of(*handle)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "Object".to_string());
        Err(VariantError::ElementTypeMismatch {
            expected: class_name.to_string(),
            actual,
        })
    }
}

impl Default for ElementType {
    fn default() -> Self {
        Self::UNTYPED
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.variant_type, &self.class_name) {
            (VariantType::Nil, _) => f.write_str("Variant"),
            (_, Some(class)) => write!(f, "{class}"),
            (ty, None) => write!(f, "{ty}"),
        }
    }
}

/// Resolves object class relationships for class-constrained collections.
///
/// Implemented by the bridge on top of the host's class database.
pub trait ClassCheck {
    /// Whether the object behind `handle` is `class_name` or a subclass of it.
    fn is_instance_of(&self, handle: NativeHandle, class_name: &StringName) -> bool;

    /// Runtime class of the object, for error messages.
    fn class_of(&self, handle: NativeHandle) -> Option<StringName>;
}

struct ArrayInner {
    element_type: ElementType,
    items: RwLock<Vec<Variant>>,
    read_only: AtomicBool,
}

/// A host array. Clones share storage.
#[derive(Clone)]
pub struct VariantArray {
    inner: Arc<ArrayInner>,
}

impl VariantArray {
    /// An untyped, empty array.
    pub fn new() -> Self {
        Self::typed(ElementType::UNTYPED)
    }

    /// An empty array whose elements must match `element_type`.
    pub fn typed(element_type: ElementType) -> Self {
        Self {
            inner: Arc::new(ArrayInner {
                element_type,
                items: RwLock::new(Vec::new()),
                read_only: AtomicBool::new(false),
            }),
        }
    }

    /// Build a typed array from existing elements, checking each one.
    pub fn from_elements(
        element_type: ElementType,
        items: impl IntoIterator<Item = Variant>,
    ) -> Result<Self, VariantError> {
        Self::build(element_type, items, None)
    }

    /// [`from_elements`](Self::from_elements) for object arrays with a class
    /// constraint.
    pub fn from_elements_checked(
        element_type: ElementType,
        items: impl IntoIterator<Item = Variant>,
        classes: &dyn ClassCheck,
    ) -> Result<Self, VariantError> {
        Self::build(element_type, items, Some(classes))
    }

    fn build(
        element_type: ElementType,
        items: impl IntoIterator<Item = Variant>,
        classes: Option<&dyn ClassCheck>,
    ) -> Result<Self, VariantError> {
        let items: Vec<Variant> = items.into_iter().collect();
        for item in &items {
            element_type.check_with(item, classes)?;
        }
        let array = Self::typed(element_type);
        *array.inner.items.write() = items;
        Ok(array)
    }

    pub fn element_type(&self) -> &ElementType {
        &self.inner.element_type
    }

    pub fn is_typed(&self) -> bool {
        self.inner.element_type.is_typed()
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Result<Variant, VariantError> {
        let items = self.inner.items.read();
        items.get(index).cloned().ok_or(VariantError::IndexOutOfBounds {
            index,
            len: items.len(),
        })
    }

    /// Replace an element. Class-constrained object arrays need
    /// [`set_checked`](Self::set_checked) for non-null objects.
    pub fn set(&self, index: usize, value: Variant) -> Result<(), VariantError> {
        self.set_with(index, value, None)
    }

    pub fn set_checked(&self, index: usize, value: Variant, classes: &dyn ClassCheck) -> Result<(), VariantError> {
        self.set_with(index, value, Some(classes))
    }

    fn set_with(&self, index: usize, value: Variant, classes: Option<&dyn ClassCheck>) -> Result<(), VariantError> {
        self.check_writable()?;
        self.inner.element_type.check_with(&value, classes)?;
        let mut items = self.inner.items.write();
        let len = items.len();
        let slot = items
            .get_mut(index)
            .ok_or(VariantError::IndexOutOfBounds { index, len })?;
        *slot = value;
        Ok(())
    }

    /// Append an element. Fails with [`VariantError::ElementTypeMismatch`] on a
    /// tag the array does not accept, and on any non-null object when the array
    /// carries a class constraint.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn push(&self, value: Variant) -> Result<(), VariantError> {
        self.push_with(value, None)
    }

    /// Append an element, also enforcing the class-name constraint of an object
    /// array through `classes`.
    pub fn push_checked(&self, value: Variant, classes: &dyn ClassCheck) -> Result<(), VariantError> {
        self.push_with(value, Some(classes))
    }

    fn push_with(&self, value: Variant, classes: Option<&dyn ClassCheck>) -> Result<(), VariantError> {
        self.check_writable()?;
        self.inner.element_type.check_with(&value, classes)?;
        self.inner.items.write().push(value);
        Ok(())
    }

    pub fn insert(&self, index: usize, value: Variant) -> Result<(), VariantError> {
        self.insert_with(index, value, None)
    }

    pub fn insert_checked(&self, index: usize, value: Variant, classes: &dyn ClassCheck) -> Result<(), VariantError> {
        self.insert_with(index, value, Some(classes))
    }

    fn insert_with(&self, index: usize, value: Variant, classes: Option<&dyn ClassCheck>) -> Result<(), VariantError> {
        self.check_writable()?;
        self.inner.element_type.check_with(&value, classes)?;
        let mut items = self.inner.items.write();
        if index > items.len() {
            return Err(VariantError::IndexOutOfBounds {
                index,
                len: items.len(),
            });
        }
        items.insert(index, value);
        Ok(())
    }

    pub fn remove(&self, index: usize) -> Result<Variant, VariantError> {
        self.check_writable()?;
        let mut items = self.inner.items.write();
        if index >= items.len() {
            return Err(VariantError::IndexOutOfBounds {
                index,
                len: items.len(),
            });
        }
        Ok(items.remove(index))
    }

    pub fn pop(&self) -> Result<Option<Variant>, VariantError> {
        self.check_writable()?;
        Ok(self.inner.items.write().pop())
    }

    pub fn clear(&self) -> Result<(), VariantError> {
        self.check_writable()?;
        self.inner.items.write().clear();
        Ok(())
    }

    pub fn contains(&self, value: &Variant) -> bool {
        self.inner.items.read().contains(value)
    }

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Variant> {
        self.inner.items.read().clone()
    }

    /// Copy into new storage with the same element type.
    pub fn duplicate(&self) -> Self {
        let copy = Self::typed(self.inner.element_type.clone());
        *copy.inner.items.write() = self.to_vec();
        copy
    }

    pub fn make_read_only(&self) {
        self.inner.read_only.store(true, Ordering::Release);
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.read_only.load(Ordering::Acquire)
    }

    /// Whether both values share storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn check_writable(&self) -> Result<(), VariantError> {
        if self.is_read_only() {
            Err(VariantError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl Default for VariantArray {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for VariantArray {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.inner.element_type == other.inner.element_type
            && *self.inner.items.read() == *other.inner.items.read()
    }
}

impl fmt::Debug for VariantArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantArray")
            .field("element_type", &self.inner.element_type)
            .field("items", &*self.inner.items.read())
            .finish()
    }
}

/// Statically-typed view over a [`VariantArray`].
pub struct TypedArray<T> {
    array: VariantArray,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedArray<T> {
    fn clone(&self) -> Self {
        Self {
            array: self.array.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: VariantTyped + ToVariant + FromVariant> TypedArray<T> {
    pub fn new() -> Self {
        Self {
            array: VariantArray::typed(ElementType::of::<T>()),
            _marker: PhantomData,
        }
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        let array = Self::new();
        *array.array.inner.items.write() = items.iter().map(ToVariant::to_variant).collect();
        array
    }

    /// View an existing array as `TypedArray<T>`.
    ///
    /// An array with exactly this element type is shared. An untyped array is
    /// converted element by element into new storage, failing on the first
    /// element that does not decode. Any other element type is rejected.
    pub fn from_array(array: VariantArray) -> Result<Self, VariantError> {
        let expected = ElementType::of::<T>();
        if *array.element_type() == expected {
            return Ok(Self {
                array,
                _marker: PhantomData,
            });
        }
        if array.is_typed() {
            return Err(VariantError::ElementTypeMismatch {
                expected: expected.to_string(),
                actual: array.element_type().to_string(),
            });
        }
        let items = array
            .to_vec()
            .iter()
            .map(|item| T::from_variant(item).map(|value| value.to_variant()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            array: VariantArray::from_elements(expected, items)?,
            _marker: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<T, VariantError> {
        T::from_variant(&self.array.get(index)?)
    }

    pub fn set(&self, index: usize, value: &T) -> Result<(), VariantError> {
        self.array.set(index, value.to_variant())
    }

    pub fn push(&self, value: &T) -> Result<(), VariantError> {
        self.array.push(value.to_variant())
    }

    pub fn pop(&self) -> Result<Option<T>, VariantError> {
        self.array.pop()?.map(|v| T::from_variant(&v)).transpose()
    }

    pub fn to_vec(&self) -> Result<Vec<T>, VariantError> {
        self.array.to_vec().iter().map(T::from_variant).collect()
    }

    pub fn element_type(&self) -> &ElementType {
        self.array.element_type()
    }

    pub fn as_array(&self) -> &VariantArray {
        &self.array
    }

    pub fn into_inner(self) -> VariantArray {
        self.array
    }
}

impl<T: VariantTyped + ToVariant + FromVariant> Default for TypedArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PartialEq for TypedArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.array == other.array
    }
}

impl<T> fmt::Debug for TypedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypedArray").field(&self.array).finish()
    }
}

impl<T> ToVariant for TypedArray<T> {
    fn to_variant(&self) -> Variant {
        Variant::Array(self.array.clone())
    }
}

impl<T: VariantTyped + ToVariant + FromVariant> FromVariant for TypedArray<T> {
    fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
        match variant {
            Variant::Array(array) => Self::from_array(array.clone()),
            other => Err(VariantError::mismatch(VariantType::Array, other.get_type())),
        }
    }
}

impl<T: VariantTyped> VariantTyped for TypedArray<T> {
    const VARIANT_TYPE: VariantType = VariantType::Array;

    fn element_types() -> Vec<ElementType> {
        vec![ElementType::of::<T>()]
    }
}
