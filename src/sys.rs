//! C ABI of the host's extension interface.
//!
//! These are the raw types that cross the plugin boundary. Everything here is
//! `#[repr(C)]` and pointer-based; the safe layer in the rest of the crate is
//! built on top.
//!
//! Instance pointers handed to the host are the native handle itself. The
//! bridge never dereferences them: every callback resolves the handle through
//! the identity registry, so a stale pointer is detected instead of followed.

use std::ffi::{c_char, c_void};

/// Native object pointer (the host's side of a [`NativeHandle`](hostbind_core::NativeHandle)).
pub type ObjectPtr = *mut c_void;
/// Extension instance pointer registered with `set_instance`.
pub type InstancePtr = *mut c_void;
/// Opaque per-class user data installed with the class.
pub type ClassUserData = *mut c_void;
/// Pointer to a host StringName.
pub type StringNamePtr = *const c_void;
/// Pointer to a host Variant the callee may write.
pub type VariantPtr = *mut c_void;
/// Pointer to a host Variant the callee may only read.
pub type ConstVariantPtr = *const c_void;
/// Opaque library handle passed to the entry point.
pub type ClassLibraryPtr = *mut c_void;
/// Host boolean.
pub type Bool = u8;
/// Host integer.
pub type Int = i64;

pub const TRUE: Bool = 1;
pub const FALSE: Bool = 0;

/// Host-initiated construction of an extension instance. Returns the new object.
pub type CreateInstanceFn = unsafe extern "C" fn(class_userdata: ClassUserData) -> ObjectPtr;

/// Host-initiated destruction of an extension instance.
pub type FreeInstanceFn = unsafe extern "C" fn(class_userdata: ClassUserData, instance: InstancePtr);

/// Rebind fresh managed state to an existing object (hot reload).
pub type RecreateInstanceFn =
    unsafe extern "C" fn(class_userdata: ClassUserData, object: ObjectPtr) -> InstancePtr;

/// Virtual resolution: opaque call data if the class overrides `name`, else null.
pub type GetVirtualCallDataFn =
    unsafe extern "C" fn(class_userdata: ClassUserData, name: StringNamePtr) -> *mut c_void;

/// The single trampoline the host calls for every resolved override.
///
/// `args` points at `arity` Variant pointers, where `arity` is fixed by the
/// resolved override.
pub type CallVirtualWithDataFn = unsafe extern "C" fn(
    instance: InstancePtr,
    name: StringNamePtr,
    call_data: *mut c_void,
    args: *const ConstVariantPtr,
    ret: VariantPtr,
);

pub type NotificationFn =
    unsafe extern "C" fn(class_userdata: ClassUserData, instance: InstancePtr, what: i32, reversed: Bool);

pub type SetPropertyFn = unsafe extern "C" fn(
    class_userdata: ClassUserData,
    instance: InstancePtr,
    name: StringNamePtr,
    value: ConstVariantPtr,
) -> Bool;

pub type GetPropertyFn = unsafe extern "C" fn(
    class_userdata: ClassUserData,
    instance: InstancePtr,
    name: StringNamePtr,
    ret: VariantPtr,
) -> Bool;

/// Creation-info record installed for every extension class.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ClassCreationInfo {
    pub is_virtual: Bool,
    pub is_abstract: Bool,
    pub is_exposed: Bool,
    pub set_func: Option<SetPropertyFn>,
    pub get_func: Option<GetPropertyFn>,
    pub notification_func: Option<NotificationFn>,
    pub create_instance_func: Option<CreateInstanceFn>,
    pub free_instance_func: Option<FreeInstanceFn>,
    pub recreate_instance_func: Option<RecreateInstanceFn>,
    pub get_virtual_call_data_func: Option<GetVirtualCallDataFn>,
    pub call_virtual_with_data_func: Option<CallVirtualWithDataFn>,
    pub class_userdata: ClassUserData,
}

pub type BindingCreateFn = unsafe extern "C" fn(token: *mut c_void, instance: ObjectPtr) -> *mut c_void;
pub type BindingFreeFn = unsafe extern "C" fn(token: *mut c_void, instance: ObjectPtr, binding: *mut c_void);
pub type BindingReferenceFn =
    unsafe extern "C" fn(token: *mut c_void, binding: *mut c_void, reference: Bool) -> Bool;

/// Callbacks the host invokes for a language binding attached to an object.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InstanceBindingCallbacks {
    pub create_callback: Option<BindingCreateFn>,
    pub free_callback: Option<BindingFreeFn>,
    pub reference_callback: Option<BindingReferenceFn>,
}

/// Outcome code of a checked method call.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallErrorType {
    #[default]
    Ok = 0,
    InvalidMethod = 1,
    InvalidArgument = 2,
    TooManyArguments = 3,
    TooFewArguments = 4,
    InstanceIsNull = 5,
    MethodNotConst = 6,
}

/// Error slot filled by checked method calls.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallError {
    pub error: CallErrorType,
    /// Offending argument index, or expected count for arity errors.
    pub argument: i32,
    /// Expected Variant tag for `InvalidArgument`.
    pub expected: i32,
}

impl CallError {
    pub const OK: CallError = CallError {
        error: CallErrorType::Ok,
        argument: 0,
        expected: 0,
    };

    pub fn is_ok(&self) -> bool {
        self.error == CallErrorType::Ok
    }
}

/// Checked call of an exported method.
pub type MethodCallFn = unsafe extern "C" fn(
    method_userdata: *mut c_void,
    instance: InstancePtr,
    args: *const ConstVariantPtr,
    argc: Int,
    ret: VariantPtr,
    error: *mut CallError,
);

/// Exported-method record handed to the host at registration.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MethodBinding {
    pub call_func: MethodCallFn,
    pub method_userdata: *mut c_void,
}

/// Host function lookup passed to the entry point.
pub type GetProcAddress = Option<unsafe extern "C" fn(name: *const c_char) -> *const c_void>;

/// Initialization stages, in load order.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InitializationLevel {
    Core = 0,
    Servers = 1,
    Scene = 2,
    Editor = 3,
}

impl InitializationLevel {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Core),
            1 => Some(Self::Servers),
            2 => Some(Self::Scene),
            3 => Some(Self::Editor),
            _ => None,
        }
    }
}

pub type InitializeFn = unsafe extern "C" fn(userdata: *mut c_void, level: u32);
pub type DeinitializeFn = unsafe extern "C" fn(userdata: *mut c_void, level: u32);

/// Filled by the entry point; the host calls back per initialization level.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Initialization {
    pub minimum_initialization_level: u32,
    pub userdata: *mut c_void,
    pub initialize: Option<InitializeFn>,
    pub deinitialize: Option<DeinitializeFn>,
}

impl Default for Initialization {
    fn default() -> Self {
        Self {
            minimum_initialization_level: InitializationLevel::Core as u32,
            userdata: std::ptr::null_mut(),
            initialize: None,
            deinitialize: None,
        }
    }
}
