//! Per-class registration metadata.
//!
//! A [`TypeDescriptor`] is assembled once with a [`DescriptorBuilder`] when a
//! class is registered and is immutable afterwards. It records the native parent,
//! the virtual methods the class overrides, and its exported members.

use rustc_hash::FxHashSet;

use hostbind_core::{StringName, TypeHash};

use crate::error::RegistrationError;
use crate::method::{MethodInfo, SignalInfo};
use crate::property::PropertyInfo;

/// Static metadata for one registered extension class.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    class_name: StringName,
    parent_class_name: StringName,
    type_hash: TypeHash,
    overrides: FxHashSet<StringName>,
    methods: Vec<MethodInfo>,
    properties: Vec<PropertyInfo>,
    signals: Vec<SignalInfo>,
}

impl TypeDescriptor {
    pub fn builder(
        class_name: impl Into<StringName>,
        parent_class_name: impl Into<StringName>,
    ) -> DescriptorBuilder {
        let class_name = class_name.into();
        DescriptorBuilder {
            descriptor: TypeDescriptor {
                type_hash: TypeHash::from_name(class_name.as_str()),
                class_name,
                parent_class_name: parent_class_name.into(),
                overrides: FxHashSet::default(),
                methods: Vec::new(),
                properties: Vec::new(),
                signals: Vec::new(),
            },
        }
    }

    pub fn class_name(&self) -> &StringName {
        &self.class_name
    }

    pub fn parent_class_name(&self) -> &StringName {
        &self.parent_class_name
    }

    pub fn type_hash(&self) -> TypeHash {
        self.type_hash
    }

    /// Whether the class overrides the virtual method `name`.
    pub fn overrides(&self, name: &str) -> bool {
        self.overrides.contains(name)
    }

    /// Overridden virtual method names, sorted.
    pub fn override_names(&self) -> Vec<&StringName> {
        let mut names: Vec<_> = self.overrides.iter().collect();
        names.sort();
        names
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn signals(&self) -> &[SignalInfo] {
        &self.signals
    }
}

/// Assembles a [`TypeDescriptor`], rejecting duplicate members.
#[derive(Debug)]
pub struct DescriptorBuilder {
    descriptor: TypeDescriptor,
}

impl DescriptorBuilder {
    pub fn class_name(&self) -> &StringName {
        &self.descriptor.class_name
    }

    pub fn type_hash(&self) -> TypeHash {
        self.descriptor.type_hash
    }

    pub fn add_override(&mut self, name: impl Into<StringName>) -> Result<(), RegistrationError> {
        let name = name.into();
        if !self.descriptor.overrides.insert(name.clone()) {
            return Err(self.duplicate(name, "virtual override"));
        }
        Ok(())
    }

    pub fn add_method(&mut self, method: MethodInfo) -> Result<(), RegistrationError> {
        if self.descriptor.method(method.name.as_str()).is_some() {
            return Err(self.duplicate(method.name, "method"));
        }
        self.descriptor.methods.push(method);
        Ok(())
    }

    pub fn add_property(&mut self, property: PropertyInfo) -> Result<(), RegistrationError> {
        if self.descriptor.property(property.name.as_str()).is_some() {
            return Err(self.duplicate(property.name, "property"));
        }
        self.descriptor.properties.push(property);
        Ok(())
    }

    pub fn add_signal(&mut self, signal: SignalInfo) -> Result<(), RegistrationError> {
        if self.descriptor.signals.iter().any(|s| s.name == signal.name) {
            return Err(self.duplicate(signal.name, "signal"));
        }
        self.descriptor.signals.push(signal);
        Ok(())
    }

    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }

    fn duplicate(&self, name: StringName, kind: &'static str) -> RegistrationError {
        RegistrationError::DuplicateMember {
            class: self.descriptor.class_name.to_string(),
            name: name.to_string(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbind_core::VariantType;

    #[test]
    fn overrides_are_queried_by_name() {
        let mut builder = TypeDescriptor::builder("Foo", "Bar");
        builder.add_override("_process").unwrap();
        builder.add_override("_ready").unwrap();
        let desc = builder.build();
        assert!(desc.overrides("_process"));
        assert!(!desc.overrides("_physics_process"));
        assert_eq!(desc.override_names(), vec!["_process", "_ready"]);
        assert_eq!(desc.parent_class_name(), "Bar");
        assert_eq!(desc.type_hash(), TypeHash::from_name("Foo"));
    }

    #[test]
    fn duplicate_members_are_rejected() {
        let mut builder = TypeDescriptor::builder("Foo", "Node");
        builder
            .add_property(PropertyInfo::new("speed", VariantType::Float))
            .unwrap();
        let err = builder
            .add_property(PropertyInfo::new("speed", VariantType::Int))
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateMember {
                class: "Foo".into(),
                name: "speed".into(),
                kind: "property",
            }
        );
        assert!(builder.add_override("_ready").is_ok());
        assert!(builder.add_override("_ready").is_err());
    }
}
