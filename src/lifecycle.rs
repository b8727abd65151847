//! Construction/destruction bridge.
//!
//! Per-handle state machine for subclassed objects:
//!
//! ```text
//!  Unborn ──create_instance──▶ Live ──free_instance──▶ Dead
//!                               │ ▲
//!                               └─┘ notification / get / set / dispatch
//! ```
//!
//! - `create_instance` constructs the native parent through the host, attaches
//!   the instance and binding, runs [`Subclass::init`](crate::Subclass::init)
//!   and inserts the subtype entry.
//! - `free_instance` removes exactly one subtype entry and drops the managed
//!   state. A second free of the same handle is an integrity error and leaves
//!   the registry as it was.
//! - The bridge never deallocates native objects; [`Bridge::request_free`]
//!   asks the host to.
//!
//! Framework objects constructed from Rust get a framework-table entry and a
//! language binding whose free callback removes that entry.
//!
//! Reference-counted objects created or tracked by the bridge carry one
//! reference owned by the bridge. The binding's reference callback records
//! whether anyone else holds the object ([`ReferenceState`]) and vetoes the
//! host's release while the bridge's reference is outstanding.
//! [`Bridge::release_reference`] and [`Bridge::release_unused`] give it back.

use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use hostbind_core::{NativeHandle, StringName, Variant};

use crate::bridge::{Bridge, BridgeInner};
use crate::classes::FrameworkClass;
use crate::error::{BridgeError, IntegrityError};
use crate::identity::ReferenceState;
use crate::object::{Base, InstanceCell, Obj, ObjectRef, Proxy};
use crate::registration::{ClassBinding, Subclass, class_name_of};
use crate::{dispatch, sys};

/// Creation-info record for a registered class.
pub(crate) fn creation_info(binding: &Arc<ClassBinding>) -> sys::ClassCreationInfo {
    sys::ClassCreationInfo {
        is_virtual: sys::FALSE,
        is_abstract: sys::FALSE,
        is_exposed: sys::TRUE,
        set_func: Some(set_property),
        get_func: Some(get_property),
        notification_func: Some(notification),
        create_instance_func: Some(create_instance),
        free_instance_func: Some(free_instance),
        recreate_instance_func: Some(recreate_instance),
        get_virtual_call_data_func: Some(dispatch::get_virtual_call_data),
        call_virtual_with_data_func: Some(dispatch::call_virtual_with_data),
        class_userdata: binding.userdata(),
    }
}

/// Binding callbacks attached to every object the bridge tracks.
pub(crate) const BINDING_CALLBACKS: sys::InstanceBindingCallbacks = sys::InstanceBindingCallbacks {
    create_callback: Some(binding_create),
    free_callback: Some(binding_free),
    reference_callback: Some(binding_reference),
};

/// Recover the bridge behind a binding token.
///
/// # Safety
///
/// `token` must be a token produced by [`Bridge::binding_token`].
unsafe fn bridge_from_token(token: *mut c_void) -> Option<Bridge> {
    if token.is_null() {
        return None;
    }
    let weak = unsafe { &*(token as *const Weak<BridgeInner>) };
    weak.upgrade().map(Bridge::from_inner)
}

/// # Safety
///
/// `class_userdata` must be null or the pointer installed at registration.
unsafe fn class_binding<'a>(class_userdata: sys::ClassUserData) -> Option<&'a ClassBinding> {
    if class_userdata.is_null() {
        return None;
    }
    Some(unsafe { &*(class_userdata as *const ClassBinding) })
}

// ============================================================================
// Host-initiated lifecycle
// ============================================================================

unsafe extern "C" fn create_instance(class_userdata: sys::ClassUserData) -> sys::ObjectPtr {
    let Some(binding) = (unsafe { class_binding(class_userdata) }) else {
        return std::ptr::null_mut();
    };
    let Some(bridge) = binding.bridge() else {
        tracing::warn!(class = %binding.class_name, "create_instance after bridge shutdown");
        return std::ptr::null_mut();
    };
    match bridge.create_subclass_instance(binding) {
        Ok(cell) => cell.handle().as_ptr(),
        Err(err) => {
            tracing::warn!(class = %binding.class_name, "create_instance failed: {err}");
            std::ptr::null_mut()
        }
    }
}

unsafe extern "C" fn free_instance(class_userdata: sys::ClassUserData, instance: sys::InstancePtr) {
    let Some(binding) = (unsafe { class_binding(class_userdata) }) else {
        return;
    };
    let (Some(bridge), Some(handle)) = (binding.bridge(), NativeHandle::from_ptr(instance)) else {
        return;
    };
    bridge.free_subclass_instance(handle);
}

unsafe extern "C" fn recreate_instance(
    class_userdata: sys::ClassUserData,
    object: sys::ObjectPtr,
) -> sys::InstancePtr {
    let Some(binding) = (unsafe { class_binding(class_userdata) }) else {
        return std::ptr::null_mut();
    };
    let (Some(bridge), Some(handle)) = (binding.bridge(), NativeHandle::from_ptr(object)) else {
        return std::ptr::null_mut();
    };
    match bridge.attach_subclass_instance(binding, handle) {
        Ok(cell) => cell.handle().as_ptr(),
        Err(err) => {
            tracing::warn!(class = %binding.class_name, %handle, "recreate_instance failed: {err}");
            std::ptr::null_mut()
        }
    }
}

unsafe extern "C" fn notification(
    class_userdata: sys::ClassUserData,
    instance: sys::InstancePtr,
    what: i32,
    reversed: sys::Bool,
) {
    let Some(binding) = (unsafe { class_binding(class_userdata) }) else {
        return;
    };
    let (Some(bridge), Some(handle)) = (binding.bridge(), NativeHandle::from_ptr(instance)) else {
        return;
    };
    bridge.notify_instance(handle, what, reversed != sys::FALSE);
}

unsafe extern "C" fn get_property(
    class_userdata: sys::ClassUserData,
    instance: sys::InstancePtr,
    name: sys::StringNamePtr,
    ret: sys::VariantPtr,
) -> sys::Bool {
    let Some(binding) = (unsafe { class_binding(class_userdata) }) else {
        return sys::FALSE;
    };
    let (Some(bridge), Some(handle)) = (binding.bridge(), NativeHandle::from_ptr(instance)) else {
        return sys::FALSE;
    };
    let name = unsafe { bridge.host().read_string_name(name) };
    match bridge.get_instance_property(handle, &name) {
        Some(value) => {
            unsafe { bridge.host().write_variant(ret, value) };
            sys::TRUE
        }
        None => sys::FALSE,
    }
}

unsafe extern "C" fn set_property(
    class_userdata: sys::ClassUserData,
    instance: sys::InstancePtr,
    name: sys::StringNamePtr,
    value: sys::ConstVariantPtr,
) -> sys::Bool {
    let Some(binding) = (unsafe { class_binding(class_userdata) }) else {
        return sys::FALSE;
    };
    let (Some(bridge), Some(handle)) = (binding.bridge(), NativeHandle::from_ptr(instance)) else {
        return sys::FALSE;
    };
    let name = unsafe { bridge.host().read_string_name(name) };
    let value = unsafe { bridge.host().read_variant(value) };
    if bridge.set_instance_property(handle, &name, &value) {
        sys::TRUE
    } else {
        sys::FALSE
    }
}

// ============================================================================
// Binding callbacks
// ============================================================================

unsafe extern "C" fn binding_create(_token: *mut c_void, instance: sys::ObjectPtr) -> *mut c_void {
    instance
}

unsafe extern "C" fn binding_free(token: *mut c_void, instance: sys::ObjectPtr, _binding: *mut c_void) {
    let (Some(bridge), Some(handle)) = (unsafe { bridge_from_token(token) }, NativeHandle::from_ptr(instance)) else {
        return;
    };
    bridge.inner.bound.lock().remove(&handle);
    bridge.identity().take_reference(handle);
    if bridge.identity().remove_framework(handle) {
        tracing::debug!(%handle, "framework object released");
    }
}

unsafe extern "C" fn binding_reference(token: *mut c_void, binding: *mut c_void, reference: sys::Bool) -> sys::Bool {
    let (Some(bridge), Some(handle)) = (unsafe { bridge_from_token(token) }, NativeHandle::from_ptr(binding)) else {
        return sys::TRUE;
    };
    if bridge.on_reference_change(handle, reference != sys::FALSE) {
        sys::TRUE
    } else {
        sys::FALSE
    }
}

// ============================================================================
// Bridge lifecycle operations
// ============================================================================

impl Bridge {
    /// Construct the native parent of `binding`'s class and attach fresh
    /// managed state to it.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub(crate) fn create_subclass_instance(&self, binding: &ClassBinding) -> Result<Arc<InstanceCell>, BridgeError> {
        let host = self.host();
        let parent = binding.parent_class_name();
        let handle = host
            .construct_object(parent)
            .ok_or_else(|| BridgeError::ConstructionFailed(parent.clone()))?;
        match self.attach_subclass_instance(binding, handle) {
            Ok(cell) => {
                host.set_instance(handle, &binding.class_name, handle.as_ptr());
                Ok(cell)
            }
            Err(err) => {
                // No instance is attached yet, so only the binding callbacks run.
                host.destroy_object(handle);
                Err(err)
            }
        }
    }

    /// Attach this bridge's language binding to `handle`.
    fn bind_instance(&self, handle: NativeHandle) {
        self.host()
            .set_instance_binding(handle, self.binding_token(), handle.as_ptr(), &BINDING_CALLBACKS);
        self.inner.bound.lock().insert(handle);
    }

    /// Run `init` for `handle` and insert the subtype entry.
    pub(crate) fn attach_subclass_instance(
        &self,
        binding: &ClassBinding,
        handle: NativeHandle,
    ) -> Result<Arc<InstanceCell>, BridgeError> {
        self.bind_instance(handle);
        let base = Base::new(handle, binding.class_name.clone(), self.downgrade());
        let cell = Arc::new(binding.construct(base));
        if let Err(err) = self.identity().register_subtype(handle, Arc::clone(&cell)) {
            self.diagnostics().report(err.clone());
            return Err(err.into());
        }
        self.hold_reference(handle);
        tracing::debug!(%handle, class = %binding.class_name, "instance created");
        Ok(cell)
    }

    /// Host destroyed a subclassed object.
    pub(crate) fn free_subclass_instance(&self, handle: NativeHandle) {
        self.identity().take_reference(handle);
        match self.identity().unregister_subtype(handle) {
            Ok(cell) => {
                cell.release();
                tracing::debug!(%handle, class = %cell.class_name(), "instance freed");
            }
            Err(err) => self.diagnostics().report(err),
        }
    }

    /// Forward a host notification to the instance.
    pub(crate) fn notify_instance(&self, handle: NativeHandle, what: i32, reversed: bool) {
        let Some(cell) = self.identity().lookup(handle) else {
            self.diagnostics().report(IntegrityError::UseAfterFree {
                handle,
                method: StringName::from("notification"),
            });
            return;
        };
        let outcome = cell.with_state_mut(|state| {
            catch_unwind(AssertUnwindSafe(|| state.notification(what, reversed)))
        });
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(_)) => tracing::warn!(%handle, what, "notification handler panicked"),
            Err(err) => tracing::warn!(%handle, what, "notification skipped: {err}"),
        }
    }

    pub(crate) fn get_instance_property(&self, handle: NativeHandle, name: &StringName) -> Option<Variant> {
        let cell = self.identity().lookup(handle)?;
        match cell.with_state(|state| state.get_property(name)) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(%handle, property = %name, "property read skipped: {err}");
                None
            }
        }
    }

    pub(crate) fn set_instance_property(&self, handle: NativeHandle, name: &StringName, value: &Variant) -> bool {
        let Some(cell) = self.identity().lookup(handle) else {
            return false;
        };
        match cell.with_state_mut(|state| state.set_property(name, value)) {
            Ok(Some(Ok(()))) => true,
            Ok(Some(Err(err))) => {
                tracing::warn!(%handle, property = %name, "rejected property value: {err}");
                false
            }
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(%handle, property = %name, "property write skipped: {err}");
                false
            }
        }
    }

    // ========================================================================
    // Managed-initiated construction
    // ========================================================================

    /// Create a new `T` from Rust. The host constructs the object through the
    /// class's create callback, exactly as for host-side instantiation.
    pub fn instantiate<T: Subclass>(&self) -> Result<Obj<T>, BridgeError> {
        let class_name = class_name_of::<T>()?;
        match self.construct(&class_name)? {
            ObjectRef::Instance(cell) => {
                let actual = cell.class_name().clone();
                Obj::from_cell(cell).ok_or(BridgeError::WrongType {
                    expected: class_name,
                    actual,
                })
            }
            ObjectRef::Framework(proxy) => Err(BridgeError::UnknownClass(proxy.class_name().clone())),
        }
    }

    /// Construct a framework object from Rust and track it in the framework
    /// table.
    pub fn construct_framework<C: FrameworkClass>(&self) -> Result<Proxy, BridgeError> {
        match self.construct(C::CLASS_NAME)? {
            ObjectRef::Framework(proxy) => Ok(proxy),
            ObjectRef::Instance(cell) => Err(BridgeError::WrongType {
                expected: StringName::from(C::CLASS_NAME),
                actual: cell.class_name().clone(),
            }),
        }
    }

    /// Construct any class by name. Classes registered through this bridge
    /// yield their canonical instance; everything else is a framework proxy.
    pub fn construct(&self, class_name: &str) -> Result<ObjectRef, BridgeError> {
        let class_name = StringName::from(class_name);
        let host = self.host();
        let registered = self.class_binding(&class_name).is_some();
        if !registered && !host.class_exists(&class_name) {
            return Err(BridgeError::UnknownClass(class_name));
        }
        let handle = host
            .construct_object(&class_name)
            .ok_or_else(|| BridgeError::ConstructionFailed(class_name.clone()))?;

        if registered {
            return match self.identity().lookup(handle) {
                Some(cell) => Ok(ObjectRef::Instance(cell)),
                None => {
                    let err = IntegrityError::MissingInstance {
                        handle,
                        class: class_name,
                    };
                    self.diagnostics().report(err.clone());
                    Err(err.into())
                }
            };
        }

        let runtime_class = host.object_class_name(handle).unwrap_or(class_name);
        let proxy = Proxy::new(handle, runtime_class);
        self.track_framework(&proxy)?;
        tracing::debug!(%handle, class = %proxy.class_name(), "framework object constructed");
        Ok(ObjectRef::Framework(proxy))
    }

    /// Put a proxy in the framework table and attach the binding that removes
    /// it when the host frees the object.
    pub(crate) fn track_framework(&self, proxy: &Proxy) -> Result<(), BridgeError> {
        if let Err(err) = self.identity().register_framework(proxy.clone()) {
            self.diagnostics().report(err.clone());
            return Err(err.into());
        }
        self.bind_instance(proxy.handle());
        self.hold_reference(proxy.handle());
        Ok(())
    }

    /// Ask the host to destroy an object. The bridge itself never frees native
    /// memory; for subclassed objects the host's free callback does the rest.
    pub fn request_free(&self, handle: NativeHandle) {
        tracing::debug!(%handle, "free requested");
        self.host().destroy_object(handle);
    }
}

// ============================================================================
// Reference handling
// ============================================================================

impl Bridge {
    /// Take the bridge's reference on a reference-counted object. Other
    /// objects, and objects already held, are left alone.
    fn hold_reference(&self, handle: NativeHandle) {
        let host = self.host();
        if host.reference_count(handle).is_some() && self.identity().insert_reference(handle) {
            host.reference(handle);
            tracing::trace!(%handle, "reference held");
        }
    }

    /// Reference callback body. Returns whether the host may destroy the
    /// object as far as this bridge is concerned.
    pub(crate) fn on_reference_change(&self, handle: NativeHandle, increment: bool) -> bool {
        let Some(count) = self.host().reference_count(handle) else {
            return true;
        };
        let identity = self.identity();
        if increment {
            if count >= 2 {
                identity.set_reference_state(handle, ReferenceState::Strong);
            }
            return true;
        }
        if count <= 1 {
            identity.set_reference_state(handle, ReferenceState::Weak);
        }
        count == 0 && identity.reference_state(handle).is_none()
    }

    /// Whether the bridge holds a reference to `handle` and whether anyone
    /// else does. `None` for objects that are not reference counted or not
    /// held.
    pub fn reference_state(&self, handle: NativeHandle) -> Option<ReferenceState> {
        self.identity().reference_state(handle)
    }

    /// Give the bridge's reference on `handle` back to the host. Returns
    /// whether the host destroyed the object as a result.
    pub fn release_reference(&self, handle: NativeHandle) -> bool {
        if self.identity().take_reference(handle).is_none() {
            return false;
        }
        let destroyed = self.host().unreference(handle);
        tracing::debug!(%handle, destroyed, "reference released");
        destroyed
    }

    /// Release the reference on every subclassed object that only the bridge
    /// still holds: no host reference and no live [`Obj`]. Returns the number
    /// of objects the host destroyed.
    pub fn release_unused(&self) -> usize {
        let identity = self.identity();
        let unused: Vec<NativeHandle> = identity
            .held_references()
            .into_iter()
            .filter(|(_, state)| *state == ReferenceState::Weak)
            .filter(|(handle, _)| {
                // The registry's entry plus the one just looked up.
                identity
                    .lookup(*handle)
                    .is_some_and(|cell| Arc::strong_count(&cell) == 2)
            })
            .map(|(handle, _)| handle)
            .collect();
        unused
            .into_iter()
            .filter(|handle| self.release_reference(*handle))
            .count()
    }

    /// Release every reference the bridge holds.
    pub(crate) fn release_all_references(&self) -> usize {
        self.identity()
            .held_references()
            .into_iter()
            .filter(|(handle, _)| self.release_reference(*handle))
            .count()
    }
}
