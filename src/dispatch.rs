//! Virtual dispatch trampoline and exported-method calls.
//!
//! Each registered class owns a [`DispatchTable`] built once at registration:
//! override name → [`VirtualEntry`]. The host resolves an override with
//! [`get_virtual_call_data`], which hands back a pointer to the entry (or null
//! when the class does not override the method), and then calls the single
//! [`call_virtual_with_data`] trampoline with that pointer for every call.
//!
//! The trampoline decodes the host's raw argument buffer with the declared
//! parameter types, finds the target instance through the identity registry,
//! runs the managed body, and writes the encoded result to the return slot.
//!
//! # Failure policy
//!
//! | Condition | Handling |
//! |-----------|----------|
//! | argument does not decode | `IntegrityError::SignatureMismatch`, return slot untouched |
//! | instance not in the registry | `IntegrityError::UseAfterFree`, return slot untouched |
//! | managed body returns `Err` | logged at `warn`, nil written |
//! | managed body panics | caught, logged at `warn`, return slot untouched |
//! | instance already bound | logged at `warn`, return slot untouched |
//!
//! Exported methods report through [`sys::CallError`] instead: a bound
//! instance fails with `MethodNotConst` (no exclusive access) and a panic with
//! `InvalidMethod`.

use std::any::Any;
use std::ffi::c_void;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Weak;

use rustc_hash::FxHashMap;

use hostbind_core::{ElementType, NativeHandle, StringName, Variant, VariantType};
use hostbind_registry::{MethodInfo, PropertyInfo};

use crate::args::{FromArg, IntoReturn};
use crate::bridge::{Bridge, BridgeInner};
use crate::error::{BridgeError, IntegrityError};
use crate::object::ErasedInstance;
use crate::registration::ClassBinding;
use crate::sys;

// ============================================================================
// Signatures
// ============================================================================

/// Declared type of one parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub variant_type: VariantType,
    pub class_name: Option<StringName>,
    /// Element types of typed arrays (one) and dictionaries (key, value).
    pub element_types: Vec<ElementType>,
}

impl ParamSpec {
    pub fn of_arg<A: FromArg>() -> Self {
        Self {
            variant_type: A::param_type(),
            class_name: A::param_class(),
            element_types: A::param_elements(),
        }
    }

    pub fn of_return<R: IntoReturn>() -> Self {
        Self {
            variant_type: R::return_type(),
            class_name: R::return_class(),
            element_types: R::return_elements(),
        }
    }

    /// As host property metadata, named `name`.
    pub fn to_property_info(&self, name: impl Into<StringName>) -> PropertyInfo {
        PropertyInfo {
            class_name: self.class_name.clone(),
            ..PropertyInfo::new(name, self.variant_type)
        }
        .with_element_types(&self.element_types)
    }
}

impl fmt::Display for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.class_name, self.element_types.as_slice()) {
            (Some(class), _) => write!(f, "{}({})", self.variant_type, class),
            (None, [element]) => write!(f, "{}[{}]", self.variant_type, element),
            (None, [key, value]) => write!(f, "{}[{}, {}]", self.variant_type, key, value),
            (None, _) => write!(f, "{}", self.variant_type),
        }
    }
}

/// Why a managed call did not produce a value.
#[derive(Debug, Clone, PartialEq)]
pub enum CallFailure {
    /// Argument `index` did not decode as its declared type.
    Argument { index: usize, error: BridgeError },
    /// Wrong number of arguments.
    Arity { expected: usize, actual: usize },
    /// The instance's state is not of the class the entry was built for.
    Instance,
    /// The managed body returned an error.
    Managed(String),
}

/// A Rust callable usable as an override or exported method of `T`.
///
/// Implemented for `Fn(&mut T, A1, .., An) -> R` with up to six arguments,
/// where every `Ai: FromArg` and `R: IntoReturn`. Closures need their
/// parameter types spelled out:
///
/// ```ignore
/// class.virtual_method("_process", |this: &mut Player, delta: f64| this.elapsed += delta);
/// ```
pub trait MethodFn<T, Args>: Send + Sync + 'static {
    fn params() -> Vec<ParamSpec>;
    fn returns() -> ParamSpec;
    fn invoke(&self, this: &mut T, args: &[Variant], bridge: &Bridge) -> Result<Variant, CallFailure>;
}

macro_rules! one {
    ($t:ident) => {
        1
    };
}

macro_rules! impl_method_fn {
    ($($arg:ident $value:ident),*) => {
        impl<T, F, R, $($arg,)*> MethodFn<T, ($($arg,)*)> for F
        where
            T: 'static,
            F: Fn(&mut T, $($arg),*) -> R + Send + Sync + 'static,
            R: IntoReturn,
            $($arg: FromArg,)*
        {
            fn params() -> Vec<ParamSpec> {
                vec![$(ParamSpec::of_arg::<$arg>()),*]
            }

            fn returns() -> ParamSpec {
                ParamSpec::of_return::<R>()
            }

            #[allow(unused_variables, unused_mut, unused_assignments)]
            fn invoke(&self, this: &mut T, args: &[Variant], bridge: &Bridge) -> Result<Variant, CallFailure> {
                let expected: usize = 0 $(+ one!($arg))*;
                if args.len() != expected {
                    return Err(CallFailure::Arity { expected, actual: args.len() });
                }
                let mut index = 0usize;
                $(
                    let $value = <$arg as FromArg>::from_arg(&args[index], bridge)
                        .map_err(|error| CallFailure::Argument { index, error })?;
                    index += 1;
                )*
                (self)(this, $($value),*).into_return().map_err(CallFailure::Managed)
            }
        }
    };
}

impl_method_fn!();
impl_method_fn!(A0 a0);
impl_method_fn!(A0 a0, A1 a1);
impl_method_fn!(A0 a0, A1 a1, A2 a2);
impl_method_fn!(A0 a0, A1 a1, A2 a2, A3 a3);
impl_method_fn!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4);
impl_method_fn!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);

type ErasedCall =
    Box<dyn Fn(&mut dyn ErasedInstance, &[Variant], &Bridge) -> Result<Variant, CallFailure> + Send + Sync>;

fn erase<T, Args, F>(method: F) -> ErasedCall
where
    T: 'static,
    Args: 'static,
    F: MethodFn<T, Args>,
{
    Box::new(move |state: &mut dyn ErasedInstance, args: &[Variant], bridge: &Bridge| {
        let this = state.as_any_mut().downcast_mut::<T>().ok_or(CallFailure::Instance)?;
        method.invoke(this, args, bridge)
    })
}

/// Signature and erased body of one managed method.
pub(crate) struct ManagedMethod {
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) returns: ParamSpec,
    call: ErasedCall,
}

impl ManagedMethod {
    pub(crate) fn new<T: 'static, Args: 'static, F: MethodFn<T, Args>>(method: F) -> Self {
        Self {
            params: F::params(),
            returns: F::returns(),
            call: erase::<T, Args, F>(method),
        }
    }

    /// Host method metadata for this signature.
    pub(crate) fn method_info(&self, owner: hostbind_core::TypeHash, name: &StringName) -> MethodInfo {
        let mut info = MethodInfo::new(owner, name.clone());
        info.arguments = self
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| p.to_property_info(format!("arg{i}")))
            .collect();
        if self.returns.variant_type != VariantType::Nil {
            info.return_value = Some(self.returns.to_property_info(""));
        }
        info
    }
}

impl fmt::Debug for ManagedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedMethod")
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run a managed body on the canonical instance for `handle`.
///
/// `Ok(Err(..))` is a managed or decode failure; `Err` means the body never
/// ran because the instance was missing, busy or panicked.
fn run_managed(
    bridge: &Bridge,
    handle: NativeHandle,
    class_name: &StringName,
    name: &StringName,
    method: &ManagedMethod,
    args: &[Variant],
) -> Result<Result<Variant, CallFailure>, RunError> {
    let Some(cell) = bridge.identity().lookup(handle) else {
        return Err(RunError::Missing);
    };
    let outcome = cell.with_state_mut(|state| {
        catch_unwind(AssertUnwindSafe(|| (method.call)(state, args, bridge)))
    });
    match outcome {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(payload)) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(%handle, class = %class_name, method = %name, "managed method panicked: {message}");
            Err(RunError::Panicked)
        }
        Err(BridgeError::NotAlive(_)) => Err(RunError::Missing),
        Err(err) => {
            tracing::warn!(%handle, class = %class_name, method = %name, "call skipped: {err}");
            Err(RunError::Busy)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunError {
    Missing,
    Busy,
    Panicked,
}

// ============================================================================
// Virtual overrides
// ============================================================================

/// One override in a class's dispatch table. Its address is the opaque call
/// data handed to the host.
pub struct VirtualEntry {
    bridge: Weak<BridgeInner>,
    class_name: StringName,
    name: StringName,
    method: ManagedMethod,
}

impl VirtualEntry {
    pub fn class_name(&self) -> &StringName {
        &self.class_name
    }

    pub fn name(&self) -> &StringName {
        &self.name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.method.params
    }

    pub fn returns(&self) -> &ParamSpec {
        &self.method.returns
    }

    fn as_call_data(&self) -> *mut c_void {
        self as *const VirtualEntry as *mut c_void
    }
}

impl fmt::Debug for VirtualEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualEntry")
            .field("class_name", &self.class_name)
            .field("name", &self.name)
            .field("method", &self.method)
            .finish()
    }
}

/// Override name → entry, built once per class.
#[derive(Debug, Default)]
pub struct DispatchTable {
    entries: FxHashMap<StringName, Box<VirtualEntry>>,
}

impl DispatchTable {
    pub(crate) fn insert(
        &mut self,
        bridge: Weak<BridgeInner>,
        class_name: StringName,
        name: StringName,
        method: ManagedMethod,
    ) {
        self.entries.insert(
            name.clone(),
            Box::new(VirtualEntry {
                bridge,
                class_name,
                name,
                method,
            }),
        );
    }

    pub fn get(&self, name: &str) -> Option<&VirtualEntry> {
        self.entries.get(name).map(Box::as_ref)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overridden method names, sorted.
    pub fn names(&self) -> Vec<&StringName> {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        names
    }
}

/// A resolved override: what the host stores per (class, method) and calls.
#[derive(Debug, Clone, Copy)]
pub struct VirtualEntryPoint {
    pub call_data: *mut c_void,
    pub call: sys::CallVirtualWithDataFn,
}

impl Bridge {
    /// Entry point for `method` on `class_name`, or `None` when the class does
    /// not override it and the host should use its native default.
    pub fn resolve_override(&self, class_name: &str, method: &str) -> Option<VirtualEntryPoint> {
        let binding = self.class_binding(class_name)?;
        let entry = binding.dispatch.get(method)?;
        Some(VirtualEntryPoint {
            call_data: entry.as_call_data(),
            call: call_virtual_with_data,
        })
    }

    /// Run an override against the instance for `handle`. `None` means the
    /// host's return slot must be left untouched.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub(crate) fn invoke_virtual(&self, handle: NativeHandle, entry: &VirtualEntry, args: &[Variant]) -> Option<Variant> {
        tracing::trace!(%handle, class = %entry.class_name, method = %entry.name, "virtual call");
        let result = run_managed(self, handle, &entry.class_name, &entry.name, &entry.method, args);
        match result {
            Ok(Ok(value)) => Some(value),
            Ok(Err(CallFailure::Argument { index, error })) => {
                self.diagnostics().report(IntegrityError::SignatureMismatch {
                    class: entry.class_name.clone(),
                    method: entry.name.clone(),
                    index,
                    detail: format!("expected {}: {error}", entry.method.params[index]),
                });
                None
            }
            Ok(Err(CallFailure::Arity { expected, actual })) => {
                self.diagnostics().report(IntegrityError::SignatureMismatch {
                    class: entry.class_name.clone(),
                    method: entry.name.clone(),
                    index: actual.min(expected),
                    detail: format!("expected {expected} arguments, got {actual}"),
                });
                None
            }
            Ok(Err(CallFailure::Instance)) => {
                self.diagnostics().report(IntegrityError::MissingInstance {
                    handle,
                    class: entry.class_name.clone(),
                });
                None
            }
            Ok(Err(CallFailure::Managed(message))) => {
                tracing::warn!(%handle, class = %entry.class_name, method = %entry.name, "override failed: {message}");
                Some(Variant::Nil)
            }
            Err(RunError::Missing) => {
                self.diagnostics().report(IntegrityError::UseAfterFree {
                    handle,
                    method: entry.name.clone(),
                });
                None
            }
            Err(RunError::Busy | RunError::Panicked) => None,
        }
    }
}

/// `get_virtual_call_data` callback: null unless the class overrides `name`.
///
/// # Safety
///
/// `class_userdata` must be the pointer installed at registration and `name`
/// a live host StringName.
pub(crate) unsafe extern "C" fn get_virtual_call_data(
    class_userdata: sys::ClassUserData,
    name: sys::StringNamePtr,
) -> *mut c_void {
    if class_userdata.is_null() {
        return std::ptr::null_mut();
    }
    let binding = unsafe { &*(class_userdata as *const ClassBinding) };
    let Some(bridge) = binding.bridge() else {
        return std::ptr::null_mut();
    };
    let name = unsafe { bridge.host().read_string_name(name) };
    match binding.dispatch.get(name.as_str()) {
        Some(entry) => {
            tracing::trace!(class = %binding.class_name, method = %name, "override resolved");
            entry.as_call_data()
        }
        None => std::ptr::null_mut(),
    }
}

/// The trampoline behind every resolved override.
///
/// # Safety
///
/// `call_data` must come from [`get_virtual_call_data`] for a class that is
/// still registered, `args` must point at as many Variant pointers as the
/// override declares parameters, and `ret` must be a writable Variant slot.
pub(crate) unsafe extern "C" fn call_virtual_with_data(
    instance: sys::InstancePtr,
    _name: sys::StringNamePtr,
    call_data: *mut c_void,
    args: *const sys::ConstVariantPtr,
    ret: sys::VariantPtr,
) {
    if call_data.is_null() {
        return;
    }
    let entry = unsafe { &*(call_data as *const VirtualEntry) };
    let Some(bridge) = entry.bridge.upgrade().map(Bridge::from_inner) else {
        tracing::warn!(method = %entry.name, "virtual call after bridge shutdown");
        return;
    };
    let Some(handle) = NativeHandle::from_ptr(instance) else {
        tracing::error!(class = %entry.class_name, method = %entry.name, "virtual call on null instance");
        return;
    };

    let arity = entry.method.params.len();
    let decoded: Vec<Variant> = (0..arity)
        .map(|i| unsafe { bridge.host().read_variant(*args.add(i)) })
        .collect();

    if let Some(value) = bridge.invoke_virtual(handle, entry, &decoded) {
        unsafe { bridge.host().write_variant(ret, value) };
    }
}

// ============================================================================
// Exported methods
// ============================================================================

/// An exported (script-callable) method. Its address is the method user data
/// handed to the host.
pub(crate) struct MethodEntry {
    bridge: Weak<BridgeInner>,
    class_name: StringName,
    name: StringName,
    defaults: Vec<Variant>,
    method: ManagedMethod,
}

impl MethodEntry {
    pub(crate) fn new(
        bridge: Weak<BridgeInner>,
        class_name: StringName,
        name: StringName,
        defaults: Vec<Variant>,
        method: ManagedMethod,
    ) -> Self {
        Self {
            bridge,
            class_name,
            name,
            defaults,
            method,
        }
    }

    pub(crate) fn method_info(&self, owner: hostbind_core::TypeHash) -> MethodInfo {
        let mut info = self.method.method_info(owner, &self.name);
        info.default_arguments = self.defaults.clone();
        info
    }

    pub(crate) fn binding(&self) -> sys::MethodBinding {
        sys::MethodBinding {
            call_func: method_call,
            method_userdata: self as *const MethodEntry as *mut c_void,
        }
    }

    /// Fewest arguments accepted once trailing defaults are applied.
    fn required(&self) -> usize {
        self.method.params.len().saturating_sub(self.defaults.len())
    }

    /// Complete `args` with trailing defaults or describe the arity error.
    fn complete_args(&self, mut args: Vec<Variant>) -> Result<Vec<Variant>, sys::CallError> {
        let arity = self.method.params.len();
        if args.len() > arity {
            return Err(sys::CallError {
                error: sys::CallErrorType::TooManyArguments,
                argument: arity as i32,
                expected: 0,
            });
        }
        if args.len() < self.required() {
            return Err(sys::CallError {
                error: sys::CallErrorType::TooFewArguments,
                argument: self.required() as i32,
                expected: 0,
            });
        }
        let missing = arity - args.len();
        let skip = self.defaults.len() - missing;
        args.extend(self.defaults.iter().skip(skip).cloned());
        Ok(args)
    }
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry")
            .field("class_name", &self.class_name)
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl Bridge {
    /// Checked call of an exported method, following the host's call-error
    /// convention.
    pub(crate) fn invoke_method(
        &self,
        handle: Option<NativeHandle>,
        entry: &MethodEntry,
        args: Vec<Variant>,
    ) -> Result<Variant, sys::CallError> {
        let instance_is_null = sys::CallError {
            error: sys::CallErrorType::InstanceIsNull,
            argument: 0,
            expected: 0,
        };
        let handle = handle.ok_or(instance_is_null)?;
        let args = entry.complete_args(args)?;
        tracing::trace!(%handle, class = %entry.class_name, method = %entry.name, "method call");

        match run_managed(self, handle, &entry.class_name, &entry.name, &entry.method, &args) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(CallFailure::Argument { index, error })) => {
                tracing::debug!(%handle, method = %entry.name, index, "invalid argument: {error}");
                Err(sys::CallError {
                    error: sys::CallErrorType::InvalidArgument,
                    argument: index as i32,
                    expected: entry.method.params[index].variant_type.raw() as i32,
                })
            }
            Ok(Err(CallFailure::Arity { expected, .. })) => Err(sys::CallError {
                error: sys::CallErrorType::TooManyArguments,
                argument: expected as i32,
                expected: 0,
            }),
            Ok(Err(CallFailure::Managed(message))) => {
                tracing::warn!(%handle, class = %entry.class_name, method = %entry.name, "method failed: {message}");
                Ok(Variant::Nil)
            }
            Ok(Err(CallFailure::Instance)) => {
                self.diagnostics().report(IntegrityError::MissingInstance {
                    handle,
                    class: entry.class_name.clone(),
                });
                Err(instance_is_null)
            }
            Err(RunError::Missing) => {
                self.diagnostics().report(IntegrityError::UseAfterFree {
                    handle,
                    method: entry.name.clone(),
                });
                Err(instance_is_null)
            }
            Err(RunError::Busy) => Err(sys::CallError {
                error: sys::CallErrorType::MethodNotConst,
                argument: 0,
                expected: 0,
            }),
            Err(RunError::Panicked) => Err(sys::CallError {
                error: sys::CallErrorType::InvalidMethod,
                argument: 0,
                expected: 0,
            }),
        }
    }
}

/// Host-facing exported-method callback.
///
/// # Safety
///
/// `method_userdata` must come from a registered [`MethodEntry`], `args` must
/// point at `argc` Variant pointers, `ret` must be writable and `error` must
/// point at a writable [`sys::CallError`].
unsafe extern "C" fn method_call(
    method_userdata: *mut c_void,
    instance: sys::InstancePtr,
    args: *const sys::ConstVariantPtr,
    argc: sys::Int,
    ret: sys::VariantPtr,
    error: *mut sys::CallError,
) {
    if method_userdata.is_null() {
        return;
    }
    let entry = unsafe { &*(method_userdata as *const MethodEntry) };
    let Some(bridge) = entry.bridge.upgrade().map(Bridge::from_inner) else {
        tracing::warn!(method = %entry.name, "method call after bridge shutdown");
        return;
    };
    let argc = usize::try_from(argc).unwrap_or(0);
    let decoded: Vec<Variant> = (0..argc)
        .map(|i| unsafe { bridge.host().read_variant(*args.add(i)) })
        .collect();

    let outcome = bridge.invoke_method(NativeHandle::from_ptr(instance), entry, decoded);
    let call_error = match outcome {
        Ok(value) => {
            unsafe { bridge.host().write_variant(ret, value) };
            sys::CallError::OK
        }
        Err(call_error) => call_error,
    };
    if !error.is_null() {
        unsafe { *error = call_error };
    }
}
