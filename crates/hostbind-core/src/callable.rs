//! Bound method and signal references.

use crate::{NativeHandle, StringName};

/// A method bound to an object, as the host represents it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Callable {
    pub object: Option<NativeHandle>,
    pub method: StringName,
}

impl Callable {
    pub fn new(object: NativeHandle, method: impl Into<StringName>) -> Self {
        Self {
            object: Some(object),
            method: method.into(),
        }
    }

    /// A callable with no target. Calling it is a no-op on the host side.
    pub fn invalid() -> Self {
        Self {
            object: None,
            method: StringName::default(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.object.is_some() && !self.method.is_empty()
    }
}

/// A named signal on an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signal {
    pub object: Option<NativeHandle>,
    pub name: StringName,
}

impl Signal {
    pub fn new(object: NativeHandle, name: impl Into<StringName>) -> Self {
        Self {
            object: Some(object),
            name: name.into(),
        }
    }
}
