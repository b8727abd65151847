//! Managed-side wrapper instances.
//!
//! ## Key Types
//!
//! - [`Proxy`] - stateless framework proxy, compared by handle
//! - [`InstanceCell`] - the single canonical managed state of a subclassed object
//! - [`Obj`] - typed reference to an [`InstanceCell`]
//! - [`ObjectRef`] - either of the above, as produced by decoding an object Variant
//! - [`Base`] - handed to [`Subclass::init`]; the instance's link back to its native object

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hostbind_core::{NativeHandle, StringName, ToVariant, Variant, VariantError, VariantType, VariantTyped};

use crate::bridge::{Bridge, BridgeInner};
use crate::error::BridgeError;
use crate::registration::Subclass;

// ============================================================================
// Framework proxies
// ============================================================================

/// A framework proxy: a native handle plus the class the host reported for it.
///
/// Proxies carry no managed state and may be recreated at any time. Two proxies
/// are the same object exactly when their handles are equal.
#[derive(Debug, Clone)]
pub struct Proxy {
    handle: NativeHandle,
    class_name: StringName,
}

impl Proxy {
    pub fn new(handle: NativeHandle, class_name: impl Into<StringName>) -> Self {
        Self {
            handle,
            class_name: class_name.into(),
        }
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    /// Concrete runtime class, as reported by the host when the proxy was made.
    pub fn class_name(&self) -> &StringName {
        &self.class_name
    }

    /// Call a host method on the object.
    pub fn call(&self, bridge: &Bridge, method: &str, args: &[Variant]) -> Result<Variant, BridgeError> {
        bridge.call_host_method(self.handle, method, args)
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Proxy {}

impl std::hash::Hash for Proxy {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

// ============================================================================
// Subclass instances
// ============================================================================

/// Object-safe view of a [`Subclass`] used by the callbacks.
pub(crate) trait ErasedInstance: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn notification(&mut self, what: i32, reversed: bool);
    fn get_property(&self, name: &str) -> Option<Variant>;
    fn set_property(&mut self, name: &str, value: &Variant) -> Option<Result<(), VariantError>>;
}

impl<T: Subclass> ErasedInstance for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn notification(&mut self, what: i32, reversed: bool) {
        self.on_notification(what, reversed);
    }

    fn get_property(&self, name: &str) -> Option<Variant> {
        self.get_exported(name)
    }

    fn set_property(&mut self, name: &str, value: &Variant) -> Option<Result<(), VariantError>> {
        self.set_exported(name, value)
    }
}

/// The canonical managed state of one subclassed native object.
///
/// Exactly one cell exists per live subclassed handle; it is what the subtype
/// table stores. The state is dropped when the host frees the object.
pub struct InstanceCell {
    handle: NativeHandle,
    class_name: StringName,
    type_id: TypeId,
    state: RwLock<Option<Box<dyn ErasedInstance>>>,
    alive: AtomicBool,
}

impl InstanceCell {
    pub(crate) fn new<T: Subclass>(handle: NativeHandle, class_name: StringName, state: T) -> Self {
        Self {
            handle,
            class_name,
            type_id: TypeId::of::<T>(),
            state: RwLock::new(Some(Box::new(state))),
            alive: AtomicBool::new(true),
        }
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub fn class_name(&self) -> &StringName {
        &self.class_name
    }

    /// False once the host has freed the object.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Whether the managed state is a `T`.
    pub fn is<T: Subclass>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Mark dead and drop the managed state. If the state is currently bound
    /// (the free came from inside one of its own methods) it is dropped when
    /// that borrow and the last reference go away.
    pub(crate) fn release(&self) {
        self.alive.store(false, Ordering::Release);
        if let Some(mut state) = self.state.try_write() {
            state.take();
        }
    }

    /// Run `f` with exclusive access to the managed state.
    ///
    /// Never blocks: a state already bound elsewhere yields
    /// [`BridgeError::InstanceBusy`].
    pub(crate) fn with_state_mut<R>(
        &self,
        f: impl FnOnce(&mut dyn ErasedInstance) -> R,
    ) -> Result<R, BridgeError> {
        if !self.is_alive() {
            return Err(BridgeError::NotAlive(self.handle));
        }
        let mut guard = self
            .state
            .try_write()
            .ok_or(BridgeError::InstanceBusy(self.handle))?;
        let state = guard.as_deref_mut().ok_or(BridgeError::NotAlive(self.handle))?;
        Ok(f(state))
    }

    /// Run `f` with shared access to the managed state.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&dyn ErasedInstance) -> R) -> Result<R, BridgeError> {
        if !self.is_alive() {
            return Err(BridgeError::NotAlive(self.handle));
        }
        let guard = self
            .state
            .try_read()
            .ok_or(BridgeError::InstanceBusy(self.handle))?;
        let state = guard.as_deref().ok_or(BridgeError::NotAlive(self.handle))?;
        Ok(f(state))
    }
}

impl fmt::Debug for InstanceCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceCell")
            .field("handle", &self.handle)
            .field("class_name", &self.class_name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Typed reference to a subclassed instance.
pub struct Obj<T: Subclass> {
    cell: Arc<InstanceCell>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Subclass> Obj<T> {
    /// Wrap a cell if it holds a `T`.
    pub fn from_cell(cell: Arc<InstanceCell>) -> Option<Self> {
        cell.is::<T>().then(|| Self {
            cell,
            _marker: PhantomData,
        })
    }

    pub fn handle(&self) -> NativeHandle {
        self.cell.handle
    }

    pub fn class_name(&self) -> &StringName {
        &self.cell.class_name
    }

    pub fn is_alive(&self) -> bool {
        self.cell.is_alive()
    }

    /// Shared access to the managed state.
    pub fn bind(&self) -> Result<MappedRwLockReadGuard<'_, T>, BridgeError> {
        let handle = self.cell.handle;
        if !self.cell.is_alive() {
            return Err(BridgeError::NotAlive(handle));
        }
        let guard = self.cell.state.try_read().ok_or(BridgeError::InstanceBusy(handle))?;
        RwLockReadGuard::try_map(guard, |state| {
            state.as_deref().and_then(|s| s.as_any().downcast_ref::<T>())
        })
        .map_err(|_| BridgeError::NotAlive(handle))
    }

    /// Exclusive access to the managed state.
    pub fn bind_mut(&self) -> Result<MappedRwLockWriteGuard<'_, T>, BridgeError> {
        let handle = self.cell.handle;
        if !self.cell.is_alive() {
            return Err(BridgeError::NotAlive(handle));
        }
        let guard = self.cell.state.try_write().ok_or(BridgeError::InstanceBusy(handle))?;
        RwLockWriteGuard::try_map(guard, |state| {
            state.as_deref_mut().and_then(|s| s.as_any_mut().downcast_mut::<T>())
        })
        .map_err(|_| BridgeError::NotAlive(handle))
    }

    pub fn cell(&self) -> &Arc<InstanceCell> {
        &self.cell
    }

    pub fn upcast(self) -> ObjectRef {
        ObjectRef::Instance(self.cell)
    }
}

impl<T: Subclass> Clone for Obj<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            _marker: PhantomData,
        }
    }
}

impl<T: Subclass> PartialEq for Obj<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cell.handle == other.cell.handle
    }
}

impl<T: Subclass> fmt::Debug for Obj<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Obj")
            .field("handle", &self.cell.handle)
            .field("class_name", &self.cell.class_name)
            .finish()
    }
}

impl<T: Subclass> ToVariant for Obj<T> {
    fn to_variant(&self) -> Variant {
        Variant::Object(Some(self.cell.handle))
    }
}

impl<T: Subclass> VariantTyped for Obj<T> {
    const VARIANT_TYPE: VariantType = VariantType::Object;

    fn class_name() -> Option<StringName> {
        crate::registration::class_name_of::<T>().ok()
    }
}

// ============================================================================
// Decoded object references
// ============================================================================

/// Result of decoding a non-null object Variant.
#[derive(Debug, Clone)]
pub enum ObjectRef {
    /// The handle has no managed state; a fresh proxy for its runtime class.
    Framework(Proxy),
    /// The canonical instance from the subtype table.
    Instance(Arc<InstanceCell>),
}

impl ObjectRef {
    pub fn handle(&self) -> NativeHandle {
        match self {
            ObjectRef::Framework(proxy) => proxy.handle,
            ObjectRef::Instance(cell) => cell.handle,
        }
    }

    pub fn class_name(&self) -> &StringName {
        match self {
            ObjectRef::Framework(proxy) => &proxy.class_name,
            ObjectRef::Instance(cell) => &cell.class_name,
        }
    }

    pub fn is_framework(&self) -> bool {
        matches!(self, ObjectRef::Framework(_))
    }

    /// The typed instance, if this is a subclassed `T`.
    pub fn cast<T: Subclass>(&self) -> Option<Obj<T>> {
        match self {
            ObjectRef::Instance(cell) => Obj::from_cell(Arc::clone(cell)),
            ObjectRef::Framework(_) => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            ObjectRef::Framework(proxy) => Some(proxy),
            ObjectRef::Instance(_) => None,
        }
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.handle() == other.handle()
    }
}

impl Eq for ObjectRef {}

impl ToVariant for ObjectRef {
    fn to_variant(&self) -> Variant {
        Variant::Object(Some(self.handle()))
    }
}

impl ToVariant for Proxy {
    fn to_variant(&self) -> Variant {
        Variant::Object(Some(self.handle))
    }
}

impl VariantTyped for ObjectRef {
    const VARIANT_TYPE: VariantType = VariantType::Object;
}

// ============================================================================
// Base
// ============================================================================

/// Link from a subclass instance to its native object.
///
/// Handed to [`Subclass::init`]. Holds the bridge weakly so an instance never
/// keeps a torn-down bridge alive.
#[derive(Clone)]
pub struct Base {
    handle: NativeHandle,
    class_name: StringName,
    bridge: Weak<BridgeInner>,
}

impl Base {
    pub(crate) fn new(handle: NativeHandle, class_name: StringName, bridge: Weak<BridgeInner>) -> Self {
        Self {
            handle,
            class_name,
            bridge,
        }
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub fn class_name(&self) -> &StringName {
        &self.class_name
    }

    /// The owning bridge, unless it has been shut down.
    pub fn bridge(&self) -> Option<Bridge> {
        self.bridge.upgrade().map(Bridge::from_inner)
    }

    /// Call a host method on this object.
    pub fn call(&self, method: &str, args: &[Variant]) -> Result<Variant, BridgeError> {
        self.bridge()
            .ok_or(BridgeError::BridgeGone)?
            .call_host_method(self.handle, method, args)
    }

    /// Emit one of this class's signals.
    pub fn emit_signal(&self, signal: &str, args: &[Variant]) -> Result<(), BridgeError> {
        self.bridge()
            .ok_or(BridgeError::BridgeGone)?
            .emit_signal(self.handle, signal, args)
    }

    /// Ask the host to destroy this object.
    pub fn request_free(&self) -> Result<(), BridgeError> {
        self.bridge().ok_or(BridgeError::BridgeGone)?.request_free(self.handle);
        Ok(())
    }
}

impl fmt::Debug for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Base")
            .field("handle", &self.handle)
            .field("class_name", &self.class_name)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use crate::classes::Node;
    use crate::registration::ClassMeta;

    /// Minimal subclass for table-level tests.
    #[derive(Debug)]
    pub(crate) struct Gadget {
        pub base: Base,
        pub hits: u32,
    }

    impl ClassMeta for Gadget {}

    impl Subclass for Gadget {
        type Parent = Node;

        fn init(base: Base) -> Self {
            Self { base, hits: 0 }
        }
    }

    pub(crate) fn cell(handle: NativeHandle, class_name: &str) -> Arc<InstanceCell> {
        let class_name = StringName::from(class_name);
        let base = Base::new(handle, class_name.clone(), Weak::new());
        Arc::new(InstanceCell::new(handle, class_name, Gadget::init(base)))
    }
}
