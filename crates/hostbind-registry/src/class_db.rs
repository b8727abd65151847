//! ClassDb - the set of extension classes registered by this library.
//!
//! # Storage Model
//!
//! - Descriptors are stored by class name and shared as `Arc<TypeDescriptor>`
//!   with the dispatch tables and creation callbacks built from them.
//! - Registration order is kept so classes can be unregistered in reverse at
//!   unload (children before parents).
//!
//! # Thread Safety
//!
//! `ClassDb` takes `&mut self` for mutation and is not synchronized itself.
//! Registration happens on the host's initialization thread; the bridge wraps
//! the database in a lock for lookups from callback threads.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use hostbind_core::{StringName, TypeHash};

use crate::descriptor::TypeDescriptor;
use crate::error::RegistrationError;

/// Registered extension classes.
#[derive(Debug, Default)]
pub struct ClassDb {
    classes: FxHashMap<StringName, Arc<TypeDescriptor>>,
    by_hash: FxHashMap<TypeHash, StringName>,
    order: Vec<StringName>,
}

impl ClassDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor. Re-registering a name is a caller error.
    pub fn insert(&mut self, descriptor: TypeDescriptor) -> Result<Arc<TypeDescriptor>, RegistrationError> {
        let name = descriptor.class_name().clone();
        if self.classes.contains_key(&name) {
            return Err(RegistrationError::DuplicateClass(name.to_string()));
        }
        let descriptor = Arc::new(descriptor);
        self.by_hash.insert(descriptor.type_hash(), name.clone());
        self.classes.insert(name.clone(), Arc::clone(&descriptor));
        self.order.push(name);
        Ok(descriptor)
    }

    pub fn remove(&mut self, name: &str) -> Result<Arc<TypeDescriptor>, RegistrationError> {
        let descriptor = self
            .classes
            .remove(name)
            .ok_or_else(|| RegistrationError::NotRegistered(name.to_string()))?;
        self.by_hash.remove(&descriptor.type_hash());
        self.order.retain(|n| n != name);
        Ok(descriptor)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.classes.get(name)
    }

    pub fn get_by_hash(&self, hash: TypeHash) -> Option<&Arc<TypeDescriptor>> {
        self.by_hash.get(&hash).and_then(|name| self.classes.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class names in registration order.
    pub fn names(&self) -> &[StringName] {
        &self.order
    }

    /// Walk `class` up through registered parents.
    ///
    /// Returns the chain starting with `class` itself and ending at the first
    /// ancestor that is not an extension class (a native framework class).
    pub fn ancestry(&self, class: &str) -> Vec<StringName> {
        let mut chain = Vec::new();
        let mut current = StringName::from(class);
        while let Some(descriptor) = self.classes.get(current.as_str()) {
            chain.push(current.clone());
            current = descriptor.parent_class_name().clone();
            if chain.contains(&current) {
                break;
            }
        }
        chain.push(current);
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, parent: &str) -> TypeDescriptor {
        TypeDescriptor::builder(name, parent).build()
    }

    #[test]
    fn new_db_is_empty() {
        let db = ClassDb::new();
        assert!(db.is_empty());
        assert!(db.get("Foo").is_none());
    }

    #[test]
    fn insert_and_lookup() {
        let mut db = ClassDb::new();
        db.insert(descriptor("Foo", "Node")).unwrap();
        assert!(db.contains("Foo"));
        assert_eq!(db.get("Foo").unwrap().parent_class_name(), "Node");
        assert!(db.get_by_hash(TypeHash::from_name("Foo")).is_some());
    }

    #[test]
    fn duplicate_is_rejected() {
        let mut db = ClassDb::new();
        db.insert(descriptor("Foo", "Node")).unwrap();
        assert_eq!(
            db.insert(descriptor("Foo", "Node2D")).unwrap_err(),
            RegistrationError::DuplicateClass("Foo".into())
        );
        assert_eq!(db.get("Foo").unwrap().parent_class_name(), "Node");
    }

    #[test]
    fn remove_keeps_order_of_others() {
        let mut db = ClassDb::new();
        db.insert(descriptor("A", "Node")).unwrap();
        db.insert(descriptor("B", "A")).unwrap();
        db.insert(descriptor("C", "Node")).unwrap();
        db.remove("B").unwrap();
        assert_eq!(db.names(), &[StringName::from("A"), StringName::from("C")]);
        assert!(db.get_by_hash(TypeHash::from_name("B")).is_none());
        assert_eq!(
            db.remove("B").unwrap_err(),
            RegistrationError::NotRegistered("B".into())
        );
    }

    #[test]
    fn ancestry_stops_at_native_class() {
        let mut db = ClassDb::new();
        db.insert(descriptor("Base", "Node2D")).unwrap();
        db.insert(descriptor("Derived", "Base")).unwrap();
        let chain: Vec<String> = db.ancestry("Derived").iter().map(|n| n.to_string()).collect();
        assert_eq!(chain, vec!["Derived", "Base", "Node2D"]);
    }
}
