//! Registration API.
//!
//! A managed subclass implements [`Subclass`] (and [`ClassMeta`], usually via
//! `#[derive(Class)]`) and is installed with [`Bridge::register`]:
//!
//! ```ignore
//! #[derive(Class)]
//! struct Player {
//!     base: Base,
//!     #[hostbind(export, range = "0,100")]
//!     health: i64,
//! }
//!
//! impl Subclass for Player {
//!     type Parent = Node2D;
//!
//!     fn init(base: Base) -> Self {
//!         Self { base, health: 100 }
//!     }
//!
//!     fn register(class: &mut ClassBuilder<Self>) {
//!         class
//!             .virtual_method("_process", |this: &mut Player, delta: f64| this.tick(delta))
//!             .method("heal", |this: &mut Player, amount: i64| this.health += amount)
//!             .signal(SignalInfo::new("died"));
//!     }
//! }
//!
//! bridge.register::<Player>()?;
//! ```
//!
//! Registration builds the class's [`TypeDescriptor`] and [`DispatchTable`]
//! once, then installs a creation-info record with the host. Registration
//! failures are reported and leave no trace on either side.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use hostbind_core::{QualifiedName, StringName, Variant, VariantError};
use hostbind_registry::{DescriptorBuilder, PropertyInfo, RegistrationError, SignalInfo, TypeDescriptor};

use crate::bridge::{Bridge, BridgeInner};
use crate::classes::FrameworkClass;
use crate::dispatch::{DispatchTable, ManagedMethod, MethodEntry, MethodFn};
use crate::error::BridgeError;
use crate::lifecycle;
use crate::object::{Base, InstanceCell};

// ============================================================================
// Traits
// ============================================================================

/// Registration metadata of a class, normally generated by `#[derive(Class)]`.
pub trait ClassMeta {
    /// Host-visible class name, when it differs from the Rust type name.
    fn class_name_override() -> Option<&'static str> {
        None
    }

    /// Properties exported to the host.
    fn exported_properties() -> Vec<PropertyInfo> {
        Vec::new()
    }

    /// Read an exported property. `None` if `name` is not one.
    fn get_exported(&self, _name: &str) -> Option<Variant> {
        None
    }

    /// Write an exported property. `None` if `name` is not a writable one.
    fn set_exported(&mut self, _name: &str, _value: &Variant) -> Option<Result<(), VariantError>> {
        None
    }
}

/// A managed subclass of a host class.
pub trait Subclass: ClassMeta + Send + Sync + Sized + 'static {
    /// The native class this subclass extends.
    type Parent: FrameworkClass;

    /// Build the managed state for a freshly created native object.
    fn init(base: Base) -> Self;

    /// Declare overrides, exported methods and signals.
    fn register(_class: &mut ClassBuilder<Self>) {}

    /// Host notification (`classes::notify`).
    fn on_notification(&mut self, _what: i32, _reversed: bool) {}
}

/// The host-visible name of `T`.
///
/// The override from [`ClassMeta`] if present, otherwise the last path segment
/// of the Rust type name. The result must be a bare identifier.
pub fn class_name_of<T: ClassMeta>() -> Result<StringName, RegistrationError> {
    let name = match T::class_name_override() {
        Some(name) => name.to_string(),
        None => QualifiedName::from_qualified_string(std::any::type_name::<T>())
            .simple_name()
            .to_string(),
    };
    if !is_identifier(&name) {
        return Err(RegistrationError::InvalidClassName(name));
    }
    Ok(StringName::from(name))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// ClassBuilder
// ============================================================================

/// Collects a class's overrides and exported members during
/// [`Subclass::register`]. The first invalid declaration fails the whole
/// registration.
pub struct ClassBuilder<T: Subclass> {
    class_name: StringName,
    descriptor: DescriptorBuilder,
    bridge: Weak<BridgeInner>,
    dispatch: DispatchTable,
    methods: Vec<Box<MethodEntry>>,
    error: Option<RegistrationError>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Subclass> ClassBuilder<T> {
    fn new(class_name: StringName, parent: StringName, bridge: Weak<BridgeInner>) -> Self {
        Self {
            descriptor: TypeDescriptor::builder(class_name.clone(), parent),
            class_name,
            bridge,
            dispatch: DispatchTable::default(),
            methods: Vec::new(),
            error: None,
            _marker: PhantomData,
        }
    }

    pub fn class_name(&self) -> &StringName {
        &self.class_name
    }

    fn record(&mut self, result: Result<(), RegistrationError>) {
        if let Err(err) = result
            && self.error.is_none()
        {
            self.error = Some(err);
        }
    }

    /// Override a native virtual method. The host will dispatch `name` on
    /// instances of this class to `method`.
    pub fn virtual_method<Args: 'static, F: MethodFn<T, Args>>(&mut self, name: &str, method: F) -> &mut Self {
        let name = StringName::from(name);
        let result = self.descriptor.add_override(name.clone());
        if result.is_ok() {
            self.dispatch.insert(
                self.bridge.clone(),
                self.class_name.clone(),
                name,
                ManagedMethod::new::<T, Args, F>(method),
            );
        }
        self.record(result);
        self
    }

    /// Export a method the host (and scripts) can call.
    pub fn method<Args: 'static, F: MethodFn<T, Args>>(&mut self, name: &str, method: F) -> &mut Self {
        self.method_with_defaults(name, Vec::new(), method)
    }

    /// Export a method whose trailing parameters have default values.
    pub fn method_with_defaults<Args: 'static, F: MethodFn<T, Args>>(
        &mut self,
        name: &str,
        defaults: Vec<Variant>,
        method: F,
    ) -> &mut Self {
        let managed = ManagedMethod::new::<T, Args, F>(method);
        let arity = managed.params.len();
        if defaults.len() > arity {
            self.record(Err(RegistrationError::TooManyDefaults {
                class: self.class_name.to_string(),
                method: name.to_string(),
                defaults: defaults.len(),
                arity,
            }));
            return self;
        }
        let entry = MethodEntry::new(
            self.bridge.clone(),
            self.class_name.clone(),
            StringName::from(name),
            defaults,
            managed,
        );
        let result = self.descriptor.add_method(entry.method_info(self.descriptor.type_hash()));
        if result.is_ok() {
            self.methods.push(Box::new(entry));
        }
        self.record(result);
        self
    }

    /// Declare a signal.
    pub fn signal(&mut self, signal: SignalInfo) -> &mut Self {
        let result = self.descriptor.add_signal(signal);
        self.record(result);
        self
    }

    /// Export a property in addition to the derived ones.
    pub fn property(&mut self, property: PropertyInfo) -> &mut Self {
        let result = self.descriptor.add_property(property);
        self.record(result);
        self
    }
}

impl<T: Subclass> fmt::Debug for ClassBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("class_name", &self.class_name)
            .field("overrides", &self.dispatch.names())
            .field("methods", &self.methods.len())
            .finish()
    }
}

// ============================================================================
// ClassBinding
// ============================================================================

/// Everything the host callbacks need for one registered class. Its address is
/// the class user data installed with the host.
pub(crate) struct ClassBinding {
    pub(crate) class_name: StringName,
    pub(crate) descriptor: Arc<TypeDescriptor>,
    pub(crate) dispatch: DispatchTable,
    pub(crate) methods: Vec<Box<MethodEntry>>,
    constructor: fn(Base) -> InstanceCell,
    bridge: Weak<BridgeInner>,
}

impl ClassBinding {
    pub(crate) fn bridge(&self) -> Option<Bridge> {
        self.bridge.upgrade().map(Bridge::from_inner)
    }

    pub(crate) fn parent_class_name(&self) -> &StringName {
        self.descriptor.parent_class_name()
    }

    /// Build fresh managed state for `base`.
    pub(crate) fn construct(&self, base: Base) -> InstanceCell {
        (self.constructor)(base)
    }

    pub(crate) fn userdata(self: &Arc<Self>) -> *mut c_void {
        Arc::as_ptr(self) as *mut c_void
    }
}

impl fmt::Debug for ClassBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBinding")
            .field("class_name", &self.class_name)
            .field("parent", self.parent_class_name())
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

fn construct_cell<T: Subclass>(base: Base) -> InstanceCell {
    let handle = base.handle();
    let class_name = base.class_name().clone();
    InstanceCell::new(handle, class_name, T::init(base))
}

// ============================================================================
// Bridge registration
// ============================================================================

impl Bridge {
    /// Register `T` with the host.
    ///
    /// Fails without side effects if the name is not a bare identifier, the
    /// class is already registered (here or on the host), the parent is not a
    /// host class, a member is declared twice, or the host refuses.
    pub fn register<T: Subclass>(&self) -> Result<(), BridgeError> {
        let result = self.register_inner::<T>();
        if let Err(err) = &result {
            tracing::warn!(class = std::any::type_name::<T>(), "registration refused: {err}");
        }
        result
    }

    fn register_inner<T: Subclass>(&self) -> Result<(), BridgeError> {
        let class_name = class_name_of::<T>()?;
        let parent = StringName::from(T::Parent::CLASS_NAME);
        let host = self.host();

        if self.inner.classes.read().contains(&class_name) || host.class_exists(&class_name) {
            return Err(RegistrationError::DuplicateClass(class_name.to_string()).into());
        }
        if !host.class_exists(&parent) {
            return Err(RegistrationError::UnknownParent {
                class: class_name.to_string(),
                parent: parent.to_string(),
            }
            .into());
        }

        let mut builder = ClassBuilder::<T>::new(class_name.clone(), parent.clone(), self.downgrade());
        for property in T::exported_properties() {
            builder.property(property);
        }
        T::register(&mut builder);
        if let Some(err) = builder.error {
            return Err(err.into());
        }

        let descriptor = self.inner.classes.write().insert(builder.descriptor.build())?;
        let binding = Arc::new(ClassBinding {
            class_name: class_name.clone(),
            descriptor: Arc::clone(&descriptor),
            dispatch: builder.dispatch,
            methods: builder.methods,
            constructor: construct_cell::<T>,
            bridge: self.downgrade(),
        });
        self.inner
            .bindings
            .write()
            .insert(class_name.clone(), Arc::clone(&binding));

        if let Err(err) = self.install_class(&binding) {
            self.inner.bindings.write().remove(&class_name);
            let _ = self.inner.classes.write().remove(&class_name);
            return Err(err.into());
        }

        tracing::debug!(
            class = %class_name,
            parent = %parent,
            overrides = binding.dispatch.len(),
            methods = binding.methods.len(),
            "registered class"
        );
        Ok(())
    }

    /// Hand the class and its members to the host. On any refusal the class is
    /// removed from the host again.
    fn install_class(&self, binding: &Arc<ClassBinding>) -> Result<(), RegistrationError> {
        let host = self.host();
        let class_name = &binding.class_name;
        let info = lifecycle::creation_info(binding);
        if !host.register_extension_class(class_name, binding.parent_class_name(), &info) {
            return Err(RegistrationError::HostRejected(class_name.to_string()));
        }

        let owner = binding.descriptor.type_hash();
        let members_ok = binding
            .methods
            .iter()
            .all(|entry| host.register_extension_class_method(class_name, &entry.method_info(owner), entry.binding()))
            && binding
                .descriptor
                .properties()
                .iter()
                .all(|property| host.register_extension_class_property(class_name, property))
            && binding
                .descriptor
                .signals()
                .iter()
                .all(|signal| host.register_extension_class_signal(class_name, signal));

        if !members_ok {
            host.unregister_extension_class(class_name);
            return Err(RegistrationError::HostRejected(class_name.to_string()));
        }
        Ok(())
    }

    /// Unregister `T`. Refused while instances of it are alive.
    pub fn unregister<T: Subclass>(&self) -> Result<(), BridgeError> {
        let class_name = class_name_of::<T>()?;
        self.unregister_class(&class_name)
    }

    /// Unregister a class by name. Refused while instances of it are alive.
    pub fn unregister_class(&self, class_name: &str) -> Result<(), BridgeError> {
        let live = self.live_instances_of(class_name);
        if live > 0 {
            return Err(RegistrationError::InstancesAlive {
                class: class_name.to_string(),
                count: live,
            }
            .into());
        }
        self.remove_class(class_name)
    }

    fn remove_class(&self, class_name: &str) -> Result<(), BridgeError> {
        self.inner.classes.write().remove(class_name)?;
        let binding = self.inner.bindings.write().remove(class_name);
        if let Some(binding) = &binding
            && !self.host().unregister_extension_class(&binding.class_name)
        {
            tracing::warn!(class = class_name, "host refused to unregister class");
        }
        tracing::debug!(class = class_name, "unregistered class");
        Ok(())
    }

    /// Unregister every class in reverse registration order and release all
    /// remaining instances. Used at plugin unload.
    pub fn unregister_all(&self) {
        let names: Vec<StringName> = self.inner.classes.read().names().to_vec();
        for name in names.iter().rev() {
            let live = self.live_instances_of(name);
            if live > 0 {
                tracing::warn!(class = %name, live, "unregistering class with live instances");
            }
            if let Err(err) = self.remove_class(name) {
                tracing::warn!(class = %name, "unregister failed: {err}");
            }
        }
        let released = self.identity().clear();
        if released > 0 {
            tracing::debug!(released, "released instances at unload");
        }
    }

    fn live_instances_of(&self, class_name: &str) -> usize {
        let identity = self.identity();
        identity
            .active_handles()
            .into_iter()
            .filter_map(|handle| identity.lookup(handle))
            .filter(|cell| cell.class_name() == class_name)
            .count()
    }

    /// Names of the classes registered through this bridge, in order.
    pub fn registered_classes(&self) -> Vec<StringName> {
        self.inner.classes.read().names().to_vec()
    }

    /// The descriptor of a registered class.
    pub fn descriptor(&self, class_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.inner.classes.read().get(class_name).cloned()
    }

    pub(crate) fn class_binding(&self, class_name: &str) -> Option<Arc<ClassBinding>> {
        self.inner.bindings.read().get(class_name).cloned()
    }
}
