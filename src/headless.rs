//! In-process host.
//!
//! [`HeadlessHost`] implements [`HostInterface`] without an engine behind it.
//! It keeps a class database seeded with the core framework classes, an object
//! table, and the creation-info records extensions install, and it drives the
//! extension strictly through the installed C callbacks, the way a real host
//! does. Variant and StringName pointers are plain `*const Variant` /
//! `*const StringName`.
//!
//! Its internal lock is never held while a callback runs: callbacks re-enter
//! the host.

use std::ffi::c_void;
use std::fmt;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use hostbind_core::{NativeHandle, StringName, Variant};
use hostbind_registry::{MethodInfo, PropertyInfo, SignalInfo};

use crate::classes::{CORE_CLASSES, notify};
use crate::dispatch::VirtualEntryPoint;
use crate::host::HostInterface;
use crate::sys;

const FIRST_HANDLE: usize = 0x1000;
const HANDLE_STRIDE: usize = 0x10;

/// Creation-info record as stored by the host.
#[derive(Clone, Copy)]
struct InstalledInfo(sys::ClassCreationInfo);

// The record only carries function pointers and the extension's opaque user
// data, which the extension guarantees is shareable across threads.
unsafe impl Send for InstalledInfo {}
unsafe impl Sync for InstalledInfo {}

#[derive(Clone, Copy)]
struct InstalledMethod(sys::MethodBinding);

unsafe impl Send for InstalledMethod {}
unsafe impl Sync for InstalledMethod {}

struct NativeClass {
    parent: Option<StringName>,
    refcounted: bool,
}

struct ExtensionClass {
    parent: StringName,
    info: InstalledInfo,
    methods: FxHashMap<StringName, (MethodInfo, InstalledMethod)>,
    properties: Vec<PropertyInfo>,
    signals: Vec<SignalInfo>,
}

#[derive(Clone, Copy)]
struct Binding {
    token: usize,
    binding: usize,
    callbacks: sys::InstanceBindingCallbacks,
}

struct HostObject {
    class_name: StringName,
    /// Instance pointer installed with `set_instance`.
    instance: Option<usize>,
    bindings: Vec<Binding>,
    /// Reference count, for reference-counted classes only.
    refcount: Option<u32>,
}

/// A signal emission observed by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedSignal {
    pub object: NativeHandle,
    pub signal: StringName,
    pub args: Vec<Variant>,
}

struct HostState {
    next_handle: usize,
    native_classes: FxHashMap<StringName, NativeClass>,
    extension_classes: FxHashMap<StringName, ExtensionClass>,
    objects: FxHashMap<NativeHandle, HostObject>,
    emitted: Vec<EmittedSignal>,
}

impl HostState {
    fn allocate(&mut self, class_name: StringName) -> Option<NativeHandle> {
        let handle = NativeHandle::from_addr(self.next_handle)?;
        self.next_handle += HANDLE_STRIDE;
        let refcount = self
            .native_classes
            .get(&class_name)
            .is_some_and(|native| native.refcounted)
            .then_some(0);
        self.objects.insert(
            handle,
            HostObject {
                class_name,
                instance: None,
                bindings: Vec::new(),
                refcount,
            },
        );
        Some(handle)
    }

    fn parent_of(&self, class_name: &str) -> Option<StringName> {
        if let Some(native) = self.native_classes.get(class_name) {
            return native.parent.clone();
        }
        self.extension_classes.get(class_name).map(|ext| ext.parent.clone())
    }

    /// Nearest extension class in the ancestry of `class_name`, inclusive.
    fn extension_info(&self, class_name: &str) -> Option<InstalledInfo> {
        let mut current = Some(StringName::from(class_name));
        while let Some(class) = current {
            if let Some(ext) = self.extension_classes.get(&class) {
                return Some(ext.info);
            }
            current = self.parent_of(&class);
        }
        None
    }

    fn find_method(&self, class_name: &str, method: &str) -> Option<InstalledMethod> {
        let mut current = Some(StringName::from(class_name));
        while let Some(class) = current {
            if let Some(ext) = self.extension_classes.get(&class)
                && let Some((_, binding)) = ext.methods.get(method)
            {
                return Some(*binding);
            }
            current = self.parent_of(&class);
        }
        None
    }
}

/// In-process [`HostInterface`] implementation.
pub struct HeadlessHost {
    state: Mutex<HostState>,
}

impl HeadlessHost {
    /// A host knowing the core framework classes.
    pub fn new() -> Self {
        let native_classes = CORE_CLASSES
            .iter()
            .map(|(name, parent, refcounted)| {
                (
                    StringName::from(*name),
                    NativeClass {
                        parent: parent.map(StringName::from),
                        refcounted: *refcounted,
                    },
                )
            })
            .collect();
        Self {
            state: Mutex::new(HostState {
                next_handle: FIRST_HANDLE,
                native_classes,
                extension_classes: FxHashMap::default(),
                objects: FxHashMap::default(),
                emitted: Vec::new(),
            }),
        }
    }

    /// Add a native class, e.g. one a generated wrapper targets. Reference
    /// counting is inherited from the parent.
    pub fn add_native_class(&self, class_name: &str, parent: Option<&str>) {
        let mut state = self.state.lock();
        let refcounted = parent
            .and_then(|p| state.native_classes.get(p))
            .is_some_and(|native| native.refcounted);
        state.native_classes.insert(
            StringName::from(class_name),
            NativeClass {
                parent: parent.map(StringName::from),
                refcounted,
            },
        );
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn object_exists(&self, handle: NativeHandle) -> bool {
        self.state.lock().objects.contains_key(&handle)
    }

    /// Handle the next construction will receive.
    pub fn next_handle(&self) -> Option<NativeHandle> {
        NativeHandle::from_addr(self.state.lock().next_handle)
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Number of bindings attached to an object.
    pub fn binding_count(&self, handle: NativeHandle) -> usize {
        self.state
            .lock()
            .objects
            .get(&handle)
            .map_or(0, |object| object.bindings.len())
    }

    pub fn is_extension_class(&self, class_name: &str) -> bool {
        self.state.lock().extension_classes.contains_key(class_name)
    }

    pub fn extension_methods(&self, class_name: &str) -> Vec<MethodInfo> {
        let state = self.state.lock();
        let mut methods: Vec<MethodInfo> = state
            .extension_classes
            .get(class_name)
            .map(|ext| ext.methods.values().map(|(info, _)| info.clone()).collect())
            .unwrap_or_default();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods
    }

    pub fn extension_properties(&self, class_name: &str) -> Vec<PropertyInfo> {
        self.state
            .lock()
            .extension_classes
            .get(class_name)
            .map(|ext| ext.properties.clone())
            .unwrap_or_default()
    }

    pub fn extension_signals(&self, class_name: &str) -> Vec<SignalInfo> {
        self.state
            .lock()
            .extension_classes
            .get(class_name)
            .map(|ext| ext.signals.clone())
            .unwrap_or_default()
    }

    /// Signals emitted so far, oldest first.
    pub fn emitted_signals(&self) -> Vec<EmittedSignal> {
        self.state.lock().emitted.clone()
    }

    // ========================================================================
    // Driving extension callbacks
    // ========================================================================

    /// Resolve an override the way the host does before calling it.
    pub fn get_virtual(&self, class_name: &str, method: &str) -> Option<VirtualEntryPoint> {
        let info = self.state.lock().extension_classes.get(class_name)?.info.0;
        let get = info.get_virtual_call_data_func?;
        let call = info.call_virtual_with_data_func?;
        let name = StringName::from(method);
        let call_data = unsafe { get(info.class_userdata, name_ptr(&name)) };
        (!call_data.is_null()).then_some(VirtualEntryPoint { call_data, call })
    }

    /// Call a virtual method on a live object. `None` if the object's class
    /// does not override it.
    pub fn call_virtual(&self, handle: NativeHandle, method: &str, args: &[Variant]) -> Option<Variant> {
        let class_name = self.state.lock().objects.get(&handle)?.class_name.clone();
        self.call_virtual_as(&class_name, handle, method, args)
    }

    /// Call a virtual method treating `handle` as an instance of `class_name`,
    /// without consulting the object table. This is how a host with a stale
    /// pointer would behave.
    pub fn call_virtual_as(
        &self,
        class_name: &str,
        handle: NativeHandle,
        method: &str,
        args: &[Variant],
    ) -> Option<Variant> {
        let entry = self.get_virtual(class_name, method)?;
        let name = StringName::from(method);
        let argv = arg_ptrs(args);
        let mut ret = Variant::Nil;
        unsafe {
            (entry.call)(
                handle.as_ptr(),
                name_ptr(&name),
                entry.call_data,
                argv.as_ptr(),
                &mut ret as *mut Variant as sys::VariantPtr,
            );
        }
        Some(ret)
    }

    /// Send a notification to an extension object.
    pub fn notify(&self, handle: NativeHandle, what: i32, reversed: bool) {
        let Some((info, instance)) = self.extension_target(handle) else {
            return;
        };
        if let Some(notification) = info.notification_func {
            let reversed = if reversed { sys::TRUE } else { sys::FALSE };
            unsafe { notification(info.class_userdata, instance, what, reversed) };
        }
    }

    /// Read an extension property through the class's get callback.
    pub fn get_property(&self, handle: NativeHandle, property: &str) -> Option<Variant> {
        let (info, instance) = self.extension_target(handle)?;
        let get = info.get_func?;
        let name = StringName::from(property);
        let mut ret = Variant::Nil;
        let found = unsafe {
            get(
                info.class_userdata,
                instance,
                name_ptr(&name),
                &mut ret as *mut Variant as sys::VariantPtr,
            )
        };
        (found != sys::FALSE).then_some(ret)
    }

    /// Write an extension property through the class's set callback.
    pub fn set_property(&self, handle: NativeHandle, property: &str, value: &Variant) -> bool {
        let Some((info, instance)) = self.extension_target(handle) else {
            return false;
        };
        let Some(set) = info.set_func else {
            return false;
        };
        let name = StringName::from(property);
        let accepted = unsafe {
            set(
                info.class_userdata,
                instance,
                name_ptr(&name),
                value as *const Variant as sys::ConstVariantPtr,
            )
        };
        accepted != sys::FALSE
    }

    /// Invoke a class's free callback directly, whether or not the object
    /// still exists. Models a host that frees twice.
    pub fn free_instance_as(&self, class_name: &str, handle: NativeHandle) {
        let Some(info) = self.state.lock().extension_info(class_name) else {
            return;
        };
        if let Some(free) = info.0.free_instance_func {
            unsafe { free(info.0.class_userdata, handle.as_ptr()) };
        }
    }

    /// Rebind fresh managed state to an existing object (hot reload).
    pub fn recreate_instance(&self, class_name: &str, handle: NativeHandle) -> Option<NativeHandle> {
        let info = self.state.lock().extension_info(class_name)?.0;
        let recreate = info.recreate_instance_func?;
        let instance = unsafe { recreate(info.class_userdata, handle.as_ptr()) };
        let instance = NativeHandle::from_ptr(instance)?;
        if let Some(object) = self.state.lock().objects.get_mut(&handle) {
            object.class_name = StringName::from(class_name);
            object.instance = Some(instance.addr());
        }
        Some(instance)
    }

    fn extension_target(&self, handle: NativeHandle) -> Option<(sys::ClassCreationInfo, sys::InstancePtr)> {
        let state = self.state.lock();
        let object = state.objects.get(&handle)?;
        let instance = object.instance? as sys::InstancePtr;
        let info = state.extension_info(&object.class_name)?;
        Some((info.0, instance))
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HeadlessHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HeadlessHost")
            .field("objects", &state.objects.len())
            .field("extension_classes", &state.extension_classes.len())
            .finish()
    }
}

fn name_ptr(name: &StringName) -> sys::StringNamePtr {
    name as *const StringName as sys::StringNamePtr
}

fn arg_ptrs(args: &[Variant]) -> Vec<sys::ConstVariantPtr> {
    args.iter().map(|arg| arg as *const Variant as sys::ConstVariantPtr).collect()
}

impl HostInterface for HeadlessHost {
    fn construct_object(&self, class_name: &StringName) -> Option<NativeHandle> {
        let info = {
            let mut state = self.state.lock();
            if state.native_classes.contains_key(class_name) {
                return state.allocate(class_name.clone());
            }
            state.extension_classes.get(class_name)?.info.0
        };
        let create = info.create_instance_func?;
        let object = unsafe { create(info.class_userdata) };
        let handle = NativeHandle::from_ptr(object)?;
        self.notify(handle, notify::POSTINITIALIZE, false);
        Some(handle)
    }

    fn object_class_name(&self, handle: NativeHandle) -> Option<StringName> {
        self.state.lock().objects.get(&handle).map(|o| o.class_name.clone())
    }

    fn destroy_object(&self, handle: NativeHandle) {
        let (class_name, instance, bindings) = {
            let state = self.state.lock();
            let Some(object) = state.objects.get(&handle) else {
                tracing::warn!(%handle, "destroy of unknown object");
                return;
            };
            (object.class_name.clone(), object.instance, object.bindings.clone())
        };

        if let Some(instance) = instance {
            self.notify(handle, notify::PREDELETE, true);
            let info = self.state.lock().extension_info(&class_name);
            if let Some(info) = info
                && let Some(free) = info.0.free_instance_func
            {
                unsafe { free(info.0.class_userdata, instance as sys::InstancePtr) };
            }
        }
        for binding in bindings {
            if let Some(free) = binding.callbacks.free_callback {
                unsafe {
                    free(
                        binding.token as *mut c_void,
                        handle.as_ptr(),
                        binding.binding as *mut c_void,
                    )
                };
            }
        }
        self.state.lock().objects.remove(&handle);
    }

    fn reference_count(&self, handle: NativeHandle) -> Option<u32> {
        self.state.lock().objects.get(&handle)?.refcount
    }

    fn reference(&self, handle: NativeHandle) {
        let bindings = {
            let mut state = self.state.lock();
            let Some(object) = state.objects.get_mut(&handle) else {
                return;
            };
            let Some(count) = object.refcount.as_mut() else {
                return;
            };
            *count += 1;
            object.bindings.clone()
        };
        for binding in bindings {
            if let Some(reference) = binding.callbacks.reference_callback {
                unsafe { reference(binding.token as *mut c_void, binding.binding as *mut c_void, sys::TRUE) };
            }
        }
    }

    fn unreference(&self, handle: NativeHandle) -> bool {
        let (count, bindings) = {
            let mut state = self.state.lock();
            let Some(object) = state.objects.get_mut(&handle) else {
                return false;
            };
            let Some(count) = object.refcount.as_mut() else {
                return false;
            };
            *count = count.saturating_sub(1);
            (*count, object.bindings.clone())
        };
        // Every binding hears about the release; any one of them can veto.
        let mut die = count == 0;
        for binding in bindings {
            if let Some(reference) = binding.callbacks.reference_callback {
                let may_die =
                    unsafe { reference(binding.token as *mut c_void, binding.binding as *mut c_void, sys::FALSE) };
                die &= may_die != sys::FALSE;
            }
        }
        if die {
            self.destroy_object(handle);
        }
        die
    }

    fn set_instance(&self, handle: NativeHandle, class_name: &StringName, instance: sys::InstancePtr) {
        if let Some(object) = self.state.lock().objects.get_mut(&handle) {
            object.class_name = class_name.clone();
            object.instance = Some(instance as usize);
        }
    }

    fn set_instance_binding(
        &self,
        handle: NativeHandle,
        token: *mut c_void,
        binding: *mut c_void,
        callbacks: &sys::InstanceBindingCallbacks,
    ) {
        if let Some(object) = self.state.lock().objects.get_mut(&handle) {
            let record = Binding {
                token: token as usize,
                binding: binding as usize,
                callbacks: *callbacks,
            };
            match object.bindings.iter_mut().find(|b| b.token == token as usize) {
                Some(existing) => *existing = record,
                None => object.bindings.push(record),
            }
        }
    }

    fn free_instance_binding(&self, handle: NativeHandle, token: *mut c_void) {
        if let Some(object) = self.state.lock().objects.get_mut(&handle) {
            object.bindings.retain(|b| b.token != token as usize);
        }
    }

    fn get_instance_binding(
        &self,
        handle: NativeHandle,
        token: *mut c_void,
        callbacks: &sys::InstanceBindingCallbacks,
    ) -> *mut c_void {
        {
            let state = self.state.lock();
            let Some(object) = state.objects.get(&handle) else {
                return std::ptr::null_mut();
            };
            if let Some(existing) = object.bindings.iter().find(|b| b.token == token as usize) {
                return existing.binding as *mut c_void;
            }
        }
        let Some(create) = callbacks.create_callback else {
            return std::ptr::null_mut();
        };
        let binding = unsafe { create(token, handle.as_ptr()) };
        self.set_instance_binding(handle, token, binding, callbacks);
        binding
    }

    fn call_method(
        &self,
        handle: NativeHandle,
        method: &StringName,
        args: &[Variant],
    ) -> Result<Variant, sys::CallError> {
        let invalid = |error| sys::CallError {
            error,
            argument: 0,
            expected: 0,
        };
        let (class_name, instance, extension_method) = {
            let state = self.state.lock();
            let object = state
                .objects
                .get(&handle)
                .ok_or(invalid(sys::CallErrorType::InstanceIsNull))?;
            (
                object.class_name.clone(),
                object.instance,
                state.find_method(&object.class_name, method),
            )
        };

        if let Some(InstalledMethod(binding)) = extension_method {
            let argv = arg_ptrs(args);
            let mut ret = Variant::Nil;
            let mut error = sys::CallError::OK;
            unsafe {
                (binding.call_func)(
                    binding.method_userdata,
                    instance.unwrap_or(0) as sys::InstancePtr,
                    argv.as_ptr(),
                    args.len() as sys::Int,
                    &mut ret as *mut Variant as sys::VariantPtr,
                    &mut error,
                )
            };
            return if error.is_ok() { Ok(ret) } else { Err(error) };
        }

        match (method.as_str(), args) {
            ("get_class", []) => Ok(Variant::String(class_name.as_str().into())),
            ("is_class", [Variant::String(ancestor)]) => Ok(Variant::Bool(
                self.is_class_or_subclass(&class_name, &StringName::from(ancestor.as_str())),
            )),
            ("get", [Variant::String(property)]) => Ok(self.get_property(handle, property.as_str()).unwrap_or_default()),
            ("set", [Variant::String(property), value]) => {
                self.set_property(handle, property.as_str(), value);
                Ok(Variant::Nil)
            }
            _ => Err(invalid(sys::CallErrorType::InvalidMethod)),
        }
    }

    fn emit_signal(&self, handle: NativeHandle, signal: &StringName, args: &[Variant]) -> bool {
        let mut state = self.state.lock();
        if !state.objects.contains_key(&handle) {
            return false;
        }
        state.emitted.push(EmittedSignal {
            object: handle,
            signal: signal.clone(),
            args: args.to_vec(),
        });
        true
    }

    fn class_exists(&self, class_name: &StringName) -> bool {
        let state = self.state.lock();
        state.native_classes.contains_key(class_name) || state.extension_classes.contains_key(class_name)
    }

    fn parent_class(&self, class_name: &StringName) -> Option<StringName> {
        self.state.lock().parent_of(class_name)
    }

    fn register_extension_class(
        &self,
        class_name: &StringName,
        parent_class_name: &StringName,
        info: &sys::ClassCreationInfo,
    ) -> bool {
        let mut state = self.state.lock();
        let exists = |name: &StringName| {
            state.native_classes.contains_key(name) || state.extension_classes.contains_key(name)
        };
        if exists(class_name) || !exists(parent_class_name) {
            return false;
        }
        state.extension_classes.insert(
            class_name.clone(),
            ExtensionClass {
                parent: parent_class_name.clone(),
                info: InstalledInfo(*info),
                methods: FxHashMap::default(),
                properties: Vec::new(),
                signals: Vec::new(),
            },
        );
        true
    }

    fn register_extension_class_method(
        &self,
        class_name: &StringName,
        method: &MethodInfo,
        binding: sys::MethodBinding,
    ) -> bool {
        let mut state = self.state.lock();
        let Some(ext) = state.extension_classes.get_mut(class_name) else {
            return false;
        };
        if ext.methods.contains_key(&method.name) {
            return false;
        }
        ext.methods
            .insert(method.name.clone(), (method.clone(), InstalledMethod(binding)));
        true
    }

    fn register_extension_class_property(&self, class_name: &StringName, property: &PropertyInfo) -> bool {
        let mut state = self.state.lock();
        match state.extension_classes.get_mut(class_name) {
            Some(ext) if !ext.properties.iter().any(|p| p.name == property.name) => {
                ext.properties.push(property.clone());
                true
            }
            _ => false,
        }
    }

    fn register_extension_class_signal(&self, class_name: &StringName, signal: &SignalInfo) -> bool {
        let mut state = self.state.lock();
        match state.extension_classes.get_mut(class_name) {
            Some(ext) if !ext.signals.iter().any(|s| s.name == signal.name) => {
                ext.signals.push(signal.clone());
                true
            }
            _ => false,
        }
    }

    fn unregister_extension_class(&self, class_name: &StringName) -> bool {
        self.state.lock().extension_classes.remove(class_name).is_some()
    }

    unsafe fn read_string_name(&self, ptr: sys::StringNamePtr) -> StringName {
        unsafe { (*(ptr as *const StringName)).clone() }
    }

    unsafe fn read_variant(&self, ptr: sys::ConstVariantPtr) -> Variant {
        unsafe { (*(ptr as *const Variant)).clone() }
    }

    unsafe fn write_variant(&self, ptr: sys::VariantPtr, value: Variant) {
        unsafe { *(ptr as *mut Variant) = value };
    }
}
