//! Object identity registry.
//!
//! Two tables keyed by [`NativeHandle`]:
//!
//! - the **subtype table** holds the canonical [`InstanceCell`] of every live
//!   subclassed object. Entries are inserted exactly once (create) and removed
//!   exactly once (free); anything else is an [`IntegrityError`].
//! - the **framework table** optionally caches [`Proxy`] values. Removing a
//!   framework entry never runs managed destructors.
//!
//! A third map records the bridge's own host reference on reference-counted
//! objects and whether the host holds references besides it (see
//! [`ReferenceState`]).
//!
//! Both tables sit behind one lock so that "a handle is in at most one table"
//! is checked atomically. The lock is only held for the table operation itself,
//! never while managed code runs.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use hostbind_core::NativeHandle;

use crate::error::IntegrityError;
use crate::object::{InstanceCell, Proxy};

const FRAMEWORK_TABLE: &str = "framework";
const SUBTYPE_TABLE: &str = "subtype";

/// Who keeps a reference-counted object alive besides the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceState {
    /// The host holds references of its own; the object outlives any
    /// release by the bridge.
    Strong,
    /// Only the bridge's reference remains; releasing it frees the object.
    Weak,
}

#[derive(Debug, Default)]
struct Tables {
    framework: FxHashMap<NativeHandle, Proxy>,
    subtypes: FxHashMap<NativeHandle, Arc<InstanceCell>>,
    references: FxHashMap<NativeHandle, ReferenceState>,
}

/// Handle → wrapper instance mapping shared by all bridge callbacks.
///
/// Created with the bridge at plugin load and cleared at unload. Tests build
/// their own isolated registries.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    tables: RwLock<Tables>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Subtype table
    // ========================================================================

    /// The canonical instance for `handle`. Consults the subtype table only:
    /// a handle known only as a framework object is simply not found.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn lookup(&self, handle: NativeHandle) -> Option<Arc<InstanceCell>> {
        self.tables.read().subtypes.get(&handle).cloned()
    }

    /// Insert the canonical instance for a handle.
    ///
    /// Fails if the handle is already registered, leaving the first entry in
    /// place, or if it is currently cached as a framework proxy.
    pub fn register_subtype(&self, handle: NativeHandle, cell: Arc<InstanceCell>) -> Result<(), IntegrityError> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.subtypes.get(&handle) {
            return Err(IntegrityError::DoubleRegistration {
                handle,
                existing_class: existing.class_name().clone(),
            });
        }
        if tables.framework.contains_key(&handle) {
            return Err(IntegrityError::TableConflict {
                handle,
                existing: FRAMEWORK_TABLE,
            });
        }
        tables.subtypes.insert(handle, cell);
        Ok(())
    }

    /// Remove and return the canonical instance for a handle.
    ///
    /// An absent handle means the host freed an object the bridge never
    /// tracked, or freed it twice; the table is left untouched.
    pub fn unregister_subtype(&self, handle: NativeHandle) -> Result<Arc<InstanceCell>, IntegrityError> {
        self.tables
            .write()
            .subtypes
            .remove(&handle)
            .ok_or(IntegrityError::UnknownHandle { handle })
    }

    // ========================================================================
    // Framework table
    // ========================================================================

    /// Cache a framework proxy. Re-caching the same handle replaces the proxy.
    pub fn register_framework(&self, proxy: Proxy) -> Result<(), IntegrityError> {
        let mut tables = self.tables.write();
        let handle = proxy.handle();
        if tables.subtypes.contains_key(&handle) {
            return Err(IntegrityError::TableConflict {
                handle,
                existing: SUBTYPE_TABLE,
            });
        }
        tables.framework.insert(handle, proxy);
        Ok(())
    }

    pub fn framework_proxy(&self, handle: NativeHandle) -> Option<Proxy> {
        self.tables.read().framework.get(&handle).cloned()
    }

    /// Drop a cached proxy. Returns whether one was present.
    pub fn remove_framework(&self, handle: NativeHandle) -> bool {
        self.tables.write().framework.remove(&handle).is_some()
    }

    // ========================================================================
    // Host references
    // ========================================================================

    /// Record that the bridge holds a host reference on `handle`. Returns
    /// `false` if one was already recorded.
    pub fn insert_reference(&self, handle: NativeHandle) -> bool {
        let mut tables = self.tables.write();
        if tables.references.contains_key(&handle) {
            return false;
        }
        tables.references.insert(handle, ReferenceState::Weak);
        true
    }

    pub fn reference_state(&self, handle: NativeHandle) -> Option<ReferenceState> {
        self.tables.read().references.get(&handle).copied()
    }

    /// Update the state of a held reference. Untracked handles are ignored.
    pub fn set_reference_state(&self, handle: NativeHandle, state: ReferenceState) -> bool {
        match self.tables.write().references.get_mut(&handle) {
            Some(slot) => {
                *slot = state;
                true
            }
            None => false,
        }
    }

    /// Forget the bridge's reference on `handle`.
    pub fn take_reference(&self, handle: NativeHandle) -> Option<ReferenceState> {
        self.tables.write().references.remove(&handle)
    }

    /// Handles the bridge holds references on, sorted by address.
    pub fn held_references(&self) -> Vec<(NativeHandle, ReferenceState)> {
        let mut held: Vec<_> = self
            .tables
            .read()
            .references
            .iter()
            .map(|(handle, state)| (*handle, *state))
            .collect();
        held.sort_by_key(|(h, _)| h.addr());
        held
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Whether the handle is in either table.
    pub fn contains(&self, handle: NativeHandle) -> bool {
        let tables = self.tables.read();
        tables.subtypes.contains_key(&handle) || tables.framework.contains_key(&handle)
    }

    pub fn subtype_count(&self) -> usize {
        self.tables.read().subtypes.len()
    }

    pub fn framework_count(&self) -> usize {
        self.tables.read().framework.len()
    }

    /// Handles of all live subclassed instances, sorted by address.
    pub fn active_handles(&self) -> Vec<NativeHandle> {
        let mut handles: Vec<_> = self.tables.read().subtypes.keys().copied().collect();
        handles.sort_by_key(|h| h.addr());
        handles
    }

    /// Empty both tables, marking every subclassed instance dead. Used at
    /// plugin unload; returns the number of instances released.
    pub fn clear(&self) -> usize {
        let drained: Vec<Arc<InstanceCell>> = {
            let mut tables = self.tables.write();
            tables.framework.clear();
            tables.references.clear();
            tables.subtypes.drain().map(|(_, cell)| cell).collect()
        };
        for cell in &drained {
            cell.release();
        }
        drained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbind_core::StringName;

    use crate::object::tests_support::cell;

    fn handle(addr: usize) -> NativeHandle {
        NativeHandle::from_addr(addr).unwrap()
    }

    #[test]
    fn lookup_returns_registered_instance() {
        let registry = IdentityRegistry::new();
        let c = cell(handle(0x10), "Player");
        registry.register_subtype(handle(0x10), Arc::clone(&c)).unwrap();

        let found = registry.lookup(handle(0x10)).unwrap();
        assert!(Arc::ptr_eq(&found, &c));
        assert_eq!(registry.subtype_count(), 1);
    }

    #[test]
    fn reference_states() {
        let registry = IdentityRegistry::new();
        assert!(registry.insert_reference(handle(0x30)));
        assert!(!registry.insert_reference(handle(0x30)));
        assert_eq!(registry.reference_state(handle(0x30)), Some(ReferenceState::Weak));

        assert!(registry.set_reference_state(handle(0x30), ReferenceState::Strong));
        assert!(!registry.set_reference_state(handle(0x40), ReferenceState::Strong));
        assert_eq!(registry.held_references(), vec![(handle(0x30), ReferenceState::Strong)]);

        assert_eq!(registry.take_reference(handle(0x30)), Some(ReferenceState::Strong));
        assert_eq!(registry.reference_state(handle(0x30)), None);
    }

    #[test]
    fn double_registration_keeps_first_entry() {
        let registry = IdentityRegistry::new();
        let first = cell(handle(0x10), "Player");
        let second = cell(handle(0x10), "Enemy");
        registry.register_subtype(handle(0x10), Arc::clone(&first)).unwrap();

        let err = registry.register_subtype(handle(0x10), second).unwrap_err();
        assert_eq!(
            err,
            IntegrityError::DoubleRegistration {
                handle: handle(0x10),
                existing_class: StringName::from("Player"),
            }
        );
        assert!(Arc::ptr_eq(&registry.lookup(handle(0x10)).unwrap(), &first));
        assert_eq!(registry.subtype_count(), 1);
    }

    #[test]
    fn unregister_unknown_handle_leaves_table_usable() {
        let registry = IdentityRegistry::new();
        registry.register_subtype(handle(0x10), cell(handle(0x10), "Player")).unwrap();

        let err = registry.unregister_subtype(handle(0x20)).unwrap_err();
        assert_eq!(err, IntegrityError::UnknownHandle { handle: handle(0x20) });
        assert_eq!(registry.active_handles(), vec![handle(0x10)]);

        registry.register_subtype(handle(0x30), cell(handle(0x30), "Player")).unwrap();
        assert_eq!(registry.active_handles(), vec![handle(0x10), handle(0x30)]);
    }

    #[test]
    fn unregister_twice_is_reported() {
        let registry = IdentityRegistry::new();
        registry.register_subtype(handle(0x10), cell(handle(0x10), "Player")).unwrap();
        registry.unregister_subtype(handle(0x10)).unwrap();
        assert!(registry.unregister_subtype(handle(0x10)).is_err());
        assert_eq!(registry.subtype_count(), 0);
    }

    #[test]
    fn framework_entries_are_invisible_to_lookup() {
        let registry = IdentityRegistry::new();
        registry.register_framework(Proxy::new(handle(0x40), "Node")).unwrap();

        assert!(registry.lookup(handle(0x40)).is_none());
        assert!(registry.contains(handle(0x40)));
        assert_eq!(registry.framework_proxy(handle(0x40)).unwrap().class_name(), "Node");
    }

    #[test]
    fn handle_lives_in_at_most_one_table() {
        let registry = IdentityRegistry::new();
        registry.register_framework(Proxy::new(handle(0x40), "Node")).unwrap();
        let err = registry
            .register_subtype(handle(0x40), cell(handle(0x40), "Player"))
            .unwrap_err();
        assert!(matches!(err, IntegrityError::TableConflict { existing: "framework", .. }));

        registry.register_subtype(handle(0x50), cell(handle(0x50), "Player")).unwrap();
        let err = registry.register_framework(Proxy::new(handle(0x50), "Node")).unwrap_err();
        assert!(matches!(err, IntegrityError::TableConflict { existing: "subtype", .. }));
    }

    #[test]
    fn clear_releases_instances() {
        let registry = IdentityRegistry::new();
        let c = cell(handle(0x10), "Player");
        registry.register_subtype(handle(0x10), Arc::clone(&c)).unwrap();
        registry.register_framework(Proxy::new(handle(0x20), "Node")).unwrap();

        assert_eq!(registry.clear(), 1);
        assert!(!c.is_alive());
        assert_eq!(registry.framework_count(), 0);
        assert_eq!(registry.subtype_count(), 0);
    }
}
