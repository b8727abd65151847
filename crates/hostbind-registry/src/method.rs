//! Method and signal metadata.

use bitflags::bitflags;

use hostbind_core::{StringName, TypeHash, Variant};

use crate::property::PropertyInfo;

bitflags! {
    /// Method flags as the host understands them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodFlags: u32 {
        const NORMAL = 1;
        const EDITOR = 1 << 1;
        const CONST = 1 << 2;
        const VIRTUAL = 1 << 3;
        const VARARG = 1 << 4;
        const STATIC = 1 << 5;
        const DEFAULT = Self::NORMAL.bits();
    }
}

impl Default for MethodFlags {
    fn default() -> Self {
        MethodFlags::DEFAULT
    }
}

/// Signature of an exported method or virtual override.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub name: StringName,
    /// `TypeHash::from_method(class, name)`.
    pub hash: TypeHash,
    pub arguments: Vec<PropertyInfo>,
    pub return_value: Option<PropertyInfo>,
    pub flags: MethodFlags,
    /// Defaults for the trailing arguments.
    pub default_arguments: Vec<Variant>,
}

impl MethodInfo {
    pub fn new(owner: TypeHash, name: impl Into<StringName>) -> Self {
        let name = name.into();
        Self {
            hash: TypeHash::from_method(owner, name.as_str()),
            name,
            arguments: Vec::new(),
            return_value: None,
            flags: MethodFlags::DEFAULT,
            default_arguments: Vec::new(),
        }
    }

    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    /// Fewest arguments a caller may pass once defaults are applied.
    pub fn required_arguments(&self) -> usize {
        self.arguments.len().saturating_sub(self.default_arguments.len())
    }
}

/// A signal declared by a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalInfo {
    pub name: StringName,
    pub arguments: Vec<PropertyInfo>,
}

impl SignalInfo {
    pub fn new(name: impl Into<StringName>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, argument: PropertyInfo) -> Self {
        self.arguments.push(argument);
        self
    }
}
