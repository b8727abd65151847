//! The host engine, as seen by the bridge.
//!
//! [`HostInterface`] is the set of host functions the bridge consumes. A real
//! embedding implements it on top of the function table obtained through the
//! entry point's `get_proc_address`; tests use
//! [`HeadlessHost`](crate::headless::HeadlessHost).

use std::ffi::c_void;

use hostbind_core::{NativeHandle, StringName, Variant};
use hostbind_registry::{MethodInfo, PropertyInfo, SignalInfo};

use crate::sys;

/// Host functions used by the bridge.
///
/// Implementations must be callable from any thread the host issues callbacks
/// on, and must not hold internal locks while invoking extension callbacks:
/// callbacks re-enter the host.
pub trait HostInterface: Send + Sync {
    // ========================================================================
    // Objects
    // ========================================================================

    /// Construct a native object of `class_name`. Returns `None` if the class
    /// is unknown or cannot be instantiated.
    fn construct_object(&self, class_name: &StringName) -> Option<NativeHandle>;

    /// Concrete runtime class of a live object.
    fn object_class_name(&self, handle: NativeHandle) -> Option<StringName>;

    /// Ask the host to destroy an object. The host runs the free callbacks.
    fn destroy_object(&self, handle: NativeHandle);

    /// Reference count of a reference-counted object, `None` for every other
    /// object.
    fn reference_count(&self, _handle: NativeHandle) -> Option<u32> {
        None
    }

    /// Take a host reference on a reference-counted object. The host reports
    /// the change to every binding's reference callback.
    fn reference(&self, _handle: NativeHandle) {}

    /// Drop a host reference. Returns `true` if the count reached zero, every
    /// binding agreed, and the object was destroyed.
    fn unreference(&self, _handle: NativeHandle) -> bool {
        false
    }

    /// Attach an extension instance to a freshly constructed object.
    fn set_instance(&self, handle: NativeHandle, class_name: &StringName, instance: sys::InstancePtr);

    /// Attach a language binding to an object.
    fn set_instance_binding(
        &self,
        handle: NativeHandle,
        token: *mut c_void,
        binding: *mut c_void,
        callbacks: &sys::InstanceBindingCallbacks,
    );

    /// Detach the binding for `token` without running its free callback.
    fn free_instance_binding(&self, _handle: NativeHandle, _token: *mut c_void) {}

    /// Fetch the binding for `token`, creating it through
    /// `callbacks.create_callback` if absent.
    fn get_instance_binding(
        &self,
        handle: NativeHandle,
        token: *mut c_void,
        callbacks: &sys::InstanceBindingCallbacks,
    ) -> *mut c_void;

    /// Call a method on an object through the host's method table.
    fn call_method(
        &self,
        handle: NativeHandle,
        method: &StringName,
        args: &[Variant],
    ) -> Result<Variant, sys::CallError>;

    /// Emit a signal on an object.
    fn emit_signal(&self, handle: NativeHandle, signal: &StringName, args: &[Variant]) -> bool;

    // ========================================================================
    // Class database
    // ========================================================================

    fn class_exists(&self, class_name: &StringName) -> bool;

    /// Direct parent of a class, `None` for the root class.
    fn parent_class(&self, class_name: &StringName) -> Option<StringName>;

    /// Whether `class_name` is `ancestor` or inherits from it.
    fn is_class_or_subclass(&self, class_name: &StringName, ancestor: &StringName) -> bool {
        let mut current = Some(class_name.clone());
        while let Some(class) = current {
            if class == *ancestor {
                return true;
            }
            current = self.parent_class(&class);
        }
        false
    }

    fn register_extension_class(
        &self,
        class_name: &StringName,
        parent_class_name: &StringName,
        info: &sys::ClassCreationInfo,
    ) -> bool;

    fn register_extension_class_method(
        &self,
        class_name: &StringName,
        method: &MethodInfo,
        binding: sys::MethodBinding,
    ) -> bool;

    fn register_extension_class_property(&self, class_name: &StringName, property: &PropertyInfo) -> bool;

    fn register_extension_class_signal(&self, class_name: &StringName, signal: &SignalInfo) -> bool;

    fn unregister_extension_class(&self, class_name: &StringName) -> bool;

    // ========================================================================
    // Value codec
    // ========================================================================

    /// Read a host StringName.
    ///
    /// # Safety
    ///
    /// `ptr` must point at a live StringName owned by the host.
    unsafe fn read_string_name(&self, ptr: sys::StringNamePtr) -> StringName;

    /// Read a host Variant.
    ///
    /// # Safety
    ///
    /// `ptr` must point at a live Variant owned by the host.
    unsafe fn read_variant(&self, ptr: sys::ConstVariantPtr) -> Variant;

    /// Overwrite a host Variant slot.
    ///
    /// # Safety
    ///
    /// `ptr` must point at a writable Variant slot owned by the host.
    unsafe fn write_variant(&self, ptr: sys::VariantPtr, value: Variant);
}
