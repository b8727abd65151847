//! Host dictionaries.
//!
//! Insertion-ordered maps with reference semantics. Key and value element
//! types are fixed at construction, like [`VariantArray`](crate::VariantArray).

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::array::{ClassCheck, ElementType};
use crate::error::VariantError;
use crate::variant::{FromVariant, ToVariant, Variant, VariantType, VariantTyped};

struct DictionaryInner {
    key_type: ElementType,
    value_type: ElementType,
    entries: RwLock<Vec<(Variant, Variant)>>,
    read_only: AtomicBool,
}

/// A host dictionary. Clones share storage.
#[derive(Clone)]
pub struct Dictionary {
    inner: Arc<DictionaryInner>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::typed(ElementType::UNTYPED, ElementType::UNTYPED)
    }

    pub fn typed(key_type: ElementType, value_type: ElementType) -> Self {
        Self {
            inner: Arc::new(DictionaryInner {
                key_type,
                value_type,
                entries: RwLock::new(Vec::new()),
                read_only: AtomicBool::new(false),
            }),
        }
    }

    pub fn key_type(&self) -> &ElementType {
        &self.inner.key_type
    }

    pub fn value_type(&self) -> &ElementType {
        &self.inner.value_type
    }

    pub fn is_typed(&self) -> bool {
        self.inner.key_type.is_typed() || self.inner.value_type.is_typed()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    pub fn get(&self, key: &Variant) -> Option<Variant> {
        self.inner
            .entries
            .read()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// The value for `key`, or nil.
    pub fn get_or_nil(&self, key: &Variant) -> Variant {
        self.get(key).unwrap_or_default()
    }

    pub fn contains_key(&self, key: &Variant) -> bool {
        self.inner.entries.read().iter().any(|(k, _)| k == key)
    }

    /// Insert or replace. Existing keys keep their position. A class-constrained
    /// key or value type rejects non-null objects here; use
    /// [`insert_checked`](Self::insert_checked) for those.
    pub fn insert(&self, key: Variant, value: Variant) -> Result<Option<Variant>, VariantError> {
        self.insert_with(key, value, None)
    }

    /// Insert or replace, resolving class constraints through `classes`.
    pub fn insert_checked(
        &self,
        key: Variant,
        value: Variant,
        classes: &dyn ClassCheck,
    ) -> Result<Option<Variant>, VariantError> {
        self.insert_with(key, value, Some(classes))
    }

    fn insert_with(
        &self,
        key: Variant,
        value: Variant,
        classes: Option<&dyn ClassCheck>,
    ) -> Result<Option<Variant>, VariantError> {
        self.check_writable()?;
        self.inner.key_type.check_with(&key, classes)?;
        self.inner.value_type.check_with(&value, classes)?;
        let mut entries = self.inner.entries.write();
        if let Some((_, slot)) = entries.iter_mut().find(|(k, _)| *k == key) {
            return Ok(Some(std::mem::replace(slot, value)));
        }
        entries.push((key, value));
        Ok(None)
    }

    pub fn remove(&self, key: &Variant) -> Result<Option<Variant>, VariantError> {
        self.check_writable()?;
        let mut entries = self.inner.entries.write();
        Ok(entries
            .iter()
            .position(|(k, _)| k == key)
            .map(|index| entries.remove(index).1))
    }

    pub fn clear(&self) -> Result<(), VariantError> {
        self.check_writable()?;
        self.inner.entries.write().clear();
        Ok(())
    }

    pub fn keys(&self) -> Vec<Variant> {
        self.inner.entries.read().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Variant> {
        self.inner.entries.read().iter().map(|(_, v)| v.clone()).collect()
    }

    /// Snapshot of the entries in insertion order.
    pub fn entries(&self) -> Vec<(Variant, Variant)> {
        self.inner.entries.read().clone()
    }

    pub fn duplicate(&self) -> Self {
        let copy = Self::typed(self.inner.key_type.clone(), self.inner.value_type.clone());
        *copy.inner.entries.write() = self.entries();
        copy
    }

    pub fn make_read_only(&self) {
        self.inner.read_only.store(true, Ordering::Release);
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.read_only.load(Ordering::Acquire)
    }

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

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.inner.key_type == other.inner.key_type
            && self.inner.value_type == other.inner.value_type
            && *self.inner.entries.read() == *other.inner.entries.read()
    }
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("key_type", &self.inner.key_type)
            .field("value_type", &self.inner.value_type)
            .field("entries", &*self.inner.entries.read())
            .finish()
    }
}

/// Statically-typed view over a [`Dictionary`].
pub struct TypedDictionary<K, V> {
    dict: Dictionary,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for TypedDictionary<K, V> {
    fn clone(&self) -> Self {
        Self {
            dict: self.dict.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K, V> TypedDictionary<K, V>
where
    K: VariantTyped + ToVariant + FromVariant,
    V: VariantTyped + ToVariant + FromVariant,
{
    pub fn new() -> Self {
        Self {
            dict: Dictionary::typed(ElementType::of::<K>(), ElementType::of::<V>()),
            _marker: PhantomData,
        }
    }

    /// View an existing dictionary. Only an exact key/value type match is
    /// shared; untyped dictionaries are converted into new storage.
    pub fn from_dictionary(dict: Dictionary) -> Result<Self, VariantError> {
        let key_type = ElementType::of::<K>();
        let value_type = ElementType::of::<V>();
        if *dict.key_type() == key_type && *dict.value_type() == value_type {
            return Ok(Self {
                dict,
                _marker: PhantomData,
            });
        }
        if dict.is_typed() {
            return Err(VariantError::ElementTypeMismatch {
                expected: format!("Dictionary[{key_type}, {value_type}]"),
                actual: format!("Dictionary[{}, {}]", dict.key_type(), dict.value_type()),
            });
        }
        let typed = Self::new();
        for (key, value) in dict.entries() {
            typed.insert(&K::from_variant(&key)?, &V::from_variant(&value)?)?;
        }
        Ok(typed)
    }

    pub fn get(&self, key: &K) -> Result<Option<V>, VariantError> {
        self.dict
            .get(&key.to_variant())
            .map(|v| V::from_variant(&v))
            .transpose()
    }

    pub fn insert(&self, key: &K, value: &V) -> Result<Option<V>, VariantError> {
        self.dict
            .insert(key.to_variant(), value.to_variant())?
            .map(|v| V::from_variant(&v))
            .transpose()
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>, VariantError> {
        self.dict
            .remove(&key.to_variant())?
            .map(|v| V::from_variant(&v))
            .transpose()
    }

    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }

    pub fn as_dictionary(&self) -> &Dictionary {
        &self.dict
    }
}

impl<K, V> Default for TypedDictionary<K, V>
where
    K: VariantTyped + ToVariant + FromVariant,
    V: VariantTyped + ToVariant + FromVariant,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for TypedDictionary<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypedDictionary").field(&self.dict).finish()
    }
}

impl<K, V> ToVariant for TypedDictionary<K, V> {
    fn to_variant(&self) -> Variant {
        Variant::Dictionary(self.dict.clone())
    }
}

impl<K, V> FromVariant for TypedDictionary<K, V>
where
    K: VariantTyped + ToVariant + FromVariant,
    V: VariantTyped + ToVariant + FromVariant,
{
    fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
        match variant {
            Variant::Dictionary(dict) => Self::from_dictionary(dict.clone()),
            other => Err(VariantError::mismatch(VariantType::Dictionary, other.get_type())),
        }
    }
}

impl<K: VariantTyped, V: VariantTyped> VariantTyped for TypedDictionary<K, V> {
    const VARIANT_TYPE: VariantType = VariantType::Dictionary;

    fn element_types() -> Vec<ElementType> {
        vec![ElementType::of::<K>(), ElementType::of::<V>()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NativeHandle, StringName};

    struct OnlyNodes;

    impl ClassCheck for OnlyNodes {
        fn is_instance_of(&self, _handle: NativeHandle, class_name: &StringName) -> bool {
            class_name == "Node"
        }

        fn class_of(&self, _handle: NativeHandle) -> Option<StringName> {
            Some(StringName::from("Node"))
        }
    }

    #[test]
    fn insertion_order_is_kept() {
        let dict = Dictionary::new();
        dict.insert(Variant::Int(3), Variant::Nil).unwrap();
        dict.insert("a".to_variant(), Variant::Nil).unwrap();
        dict.insert(Variant::Int(1), Variant::Nil).unwrap();
        assert_eq!(dict.keys(), vec![Variant::Int(3), "a".to_variant(), Variant::Int(1)]);
    }

    #[test]
    fn replace_keeps_position() {
        let dict = Dictionary::new();
        dict.insert(Variant::Int(1), Variant::Int(10)).unwrap();
        dict.insert(Variant::Int(2), Variant::Int(20)).unwrap();
        let old = dict.insert(Variant::Int(1), Variant::Int(11)).unwrap();
        assert_eq!(old, Some(Variant::Int(10)));
        assert_eq!(dict.values(), vec![Variant::Int(11), Variant::Int(20)]);
    }

    #[test]
    fn typed_keys_and_values() {
        let dict = Dictionary::typed(
            ElementType::new(VariantType::StringName),
            ElementType::new(VariantType::Int),
        );
        dict.insert(StringName::from("hp").to_variant(), Variant::Int(3))
            .unwrap();
        assert!(dict.insert(Variant::Int(0), Variant::Int(3)).is_err());
        assert!(dict.insert(StringName::from("hp").to_variant(), Variant::Bool(true)).is_err());
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn class_constrained_values() {
        let dict = Dictionary::typed(ElementType::new(VariantType::Int), ElementType::object("Node"));
        let obj = Variant::Object(NativeHandle::from_addr(0x20));

        assert!(dict.insert(Variant::Int(1), obj.clone()).is_err());
        dict.insert(Variant::Int(1), Variant::Object(None)).unwrap();
        dict.insert_checked(Variant::Int(2), obj.clone(), &OnlyNodes).unwrap();

        let resources = Dictionary::typed(ElementType::UNTYPED, ElementType::object("Resource"));
        assert!(resources.insert_checked(Variant::Int(1), obj, &OnlyNodes).is_err());
        assert_eq!(dict.len(), 2);
        assert!(resources.is_empty());
    }

    #[test]
    fn typed_view() {
        let scores: TypedDictionary<String, i64> = TypedDictionary::new();
        scores.insert(&"ann".to_string(), &12).unwrap();
        assert_eq!(scores.get(&"ann".to_string()).unwrap(), Some(12));
        assert_eq!(scores.get(&"bob".to_string()).unwrap(), None);
        assert_eq!(scores.remove(&"ann".to_string()).unwrap(), Some(12));
        assert!(scores.is_empty());
    }

    #[test]
    fn typed_view_from_untyped_converts() {
        let raw = Dictionary::new();
        raw.insert("k".to_variant(), Variant::Int(1)).unwrap();
        let typed = TypedDictionary::<String, i32>::from_dictionary(raw.clone()).unwrap();
        assert_eq!(typed.as_dictionary().key_type().variant_type, VariantType::String);
        raw.insert(Variant::Int(5), Variant::Int(1)).unwrap();
        assert!(TypedDictionary::<String, i32>::from_dictionary(raw).is_err());
    }

    #[test]
    fn remove_and_read_only() {
        let dict = Dictionary::new();
        dict.insert(Variant::Int(1), Variant::Bool(true)).unwrap();
        assert_eq!(dict.remove(&Variant::Int(1)).unwrap(), Some(Variant::Bool(true)));
        dict.make_read_only();
        assert_eq!(dict.clear(), Err(VariantError::ReadOnly));
    }
}
