//! Object-aware decoding.
//!
//! Plain values decode through [`FromVariant`](hostbind_core::FromVariant)
//! alone. Object references need the bridge: a handle with a subtype entry
//! decodes to that exact instance, anything else to a framework proxy for
//! the runtime class the host reports. Decoding only looks up or creates
//! table entries, never removes them.

use hostbind_core::{ClassCheck, NativeHandle, StringName, Variant, VariantError, VariantType};

use crate::args::FromArg;
use crate::bridge::Bridge;
use crate::error::{BridgeError, IntegrityError};
use crate::object::{ObjectRef, Proxy};

impl Bridge {
    /// Decode an object Variant. The null object decodes to `None`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn object_from_variant(&self, variant: &Variant) -> Result<Option<ObjectRef>, BridgeError> {
        match variant {
            Variant::Object(Some(handle)) => self.object_from_handle(*handle).map(Some),
            Variant::Object(None) => Ok(None),
            other => Err(VariantError::mismatch(VariantType::Object, other.get_type()).into()),
        }
    }

    /// The wrapper for a handle: the canonical instance if one exists,
    /// otherwise a framework proxy for the host-reported runtime class.
    pub fn object_from_handle(&self, handle: NativeHandle) -> Result<ObjectRef, BridgeError> {
        if let Some(cell) = self.identity().lookup(handle) {
            return Ok(ObjectRef::Instance(cell));
        }

        let cache = self.config().cache_framework_proxies;
        if cache && let Some(proxy) = self.identity().framework_proxy(handle) {
            return Ok(ObjectRef::Framework(proxy));
        }

        let class_name = self
            .host()
            .object_class_name(handle)
            .ok_or(BridgeError::UnknownObject(handle))?;
        if self.class_binding(&class_name).is_some() {
            let err = IntegrityError::MissingInstance {
                handle,
                class: class_name,
            };
            self.diagnostics().report(err.clone());
            return Err(err.into());
        }

        let proxy = Proxy::new(handle, class_name);
        if cache {
            self.track_framework(&proxy)?;
        }
        Ok(ObjectRef::Framework(proxy))
    }

    /// Decode any argument type, objects included.
    pub fn decode<T: FromArg>(&self, variant: &Variant) -> Result<T, BridgeError> {
        T::from_arg(variant, self)
    }

    /// Runtime class of a live object.
    pub fn class_of(&self, handle: NativeHandle) -> Option<StringName> {
        match self.identity().lookup(handle) {
            Some(cell) => Some(cell.class_name().clone()),
            None => self.host().object_class_name(handle),
        }
    }
}

impl ClassCheck for Bridge {
    fn is_instance_of(&self, handle: NativeHandle, class_name: &StringName) -> bool {
        Bridge::class_of(self, handle)
            .is_some_and(|class| self.host().is_class_or_subclass(&class, class_name))
    }

    fn class_of(&self, handle: NativeHandle) -> Option<StringName> {
        Bridge::class_of(self, handle)
    }
}
