//! Bridge error types.
//!
//! ## Error Hierarchy
//!
//! ```text
//! BridgeError (top-level wrapper)
//! ├── VariantError       - tag and element-type mismatches (recoverable)
//! ├── RegistrationError  - class registration refused (non-fatal)
//! └── IntegrityError     - the two sides of the bridge disagree (fatal or reported)
//! ```
//!
//! Integrity errors never cross back into the host as values. They go through
//! [`Diagnostics`](crate::diagnostics::Diagnostics) and the ABI edge returns
//! the host's nil/empty convention.

use thiserror::Error;

use hostbind_core::{NativeHandle, StringName, VariantError};
use hostbind_registry::RegistrationError;

use crate::sys::CallError;

// ============================================================================
// Integrity Errors
// ============================================================================

/// Bridge state and host state have diverged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// A subtype entry already exists for this handle.
    #[error("handle {handle} registered twice (existing instance of '{existing_class}')")]
    DoubleRegistration {
        handle: NativeHandle,
        existing_class: StringName,
    },

    /// The host freed a handle the bridge does not track, or freed it twice.
    #[error("unregister of untracked handle {handle}")]
    UnknownHandle { handle: NativeHandle },

    /// A call targeted an instance that was already freed.
    #[error("call to '{method}' on freed instance {handle}")]
    UseAfterFree { handle: NativeHandle, method: StringName },

    /// An argument did not decode as the override's declared parameter type.
    #[error("signature mismatch calling '{class}::{method}': argument {index}: {detail}")]
    SignatureMismatch {
        class: StringName,
        method: StringName,
        index: usize,
        detail: String,
    },

    /// A handle was about to appear in both the framework and subtype tables.
    #[error("handle {handle} is already in the {existing} table")]
    TableConflict {
        handle: NativeHandle,
        existing: &'static str,
    },

    /// An extension-class object surfaced without a live managed instance.
    #[error("object {handle} of extension class '{class}' has no managed instance")]
    MissingInstance { handle: NativeHandle, class: StringName },
}

impl IntegrityError {
    /// The handle involved, if any.
    pub fn handle(&self) -> Option<NativeHandle> {
        match self {
            IntegrityError::DoubleRegistration { handle, .. }
            | IntegrityError::UnknownHandle { handle }
            | IntegrityError::UseAfterFree { handle, .. }
            | IntegrityError::TableConflict { handle, .. }
            | IntegrityError::MissingInstance { handle, .. } => Some(*handle),
            IntegrityError::SignatureMismatch { .. } => None,
        }
    }
}

// ============================================================================
// Bridge Errors
// ============================================================================

/// Errors returned by the bridge's safe API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Variant(#[from] VariantError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// The host could not construct an object of this class.
    #[error("host failed to construct '{0}'")]
    ConstructionFailed(StringName),

    /// The class is neither registered here nor known to the host.
    #[error("unknown class '{0}'")]
    UnknownClass(StringName),

    /// The host does not know this object.
    #[error("unknown object {0}")]
    UnknownObject(NativeHandle),

    /// The instance is bound elsewhere (reentrant or concurrent access).
    #[error("instance {0} is already bound")]
    InstanceBusy(NativeHandle),

    /// The instance was freed by the host.
    #[error("instance {0} has been freed")]
    NotAlive(NativeHandle),

    /// A null object where an object was required.
    #[error("null object")]
    NullObject,

    /// The object is not of the requested class.
    #[error("expected instance of '{expected}', got '{actual}'")]
    WrongType {
        expected: StringName,
        actual: StringName,
    },

    /// A host-side method call failed.
    #[error("call to '{method}' failed: {error:?}")]
    Call { method: StringName, error: CallError },

    /// The bridge was torn down.
    #[error("bridge has been shut down")]
    BridgeGone,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(addr: usize) -> NativeHandle {
        NativeHandle::from_addr(addr).unwrap()
    }

    #[test]
    fn integrity_display() {
        let err = IntegrityError::UnknownHandle { handle: handle(0x20) };
        assert_eq!(err.to_string(), "unregister of untracked handle 0x20");
        let err = IntegrityError::UseAfterFree {
            handle: handle(0x30),
            method: "_process".into(),
        };
        assert_eq!(err.to_string(), "call to '_process' on freed instance 0x30");
    }

    #[test]
    fn wrapping() {
        let err: BridgeError = RegistrationError::DuplicateClass("Foo".into()).into();
        assert_eq!(err.to_string(), "class 'Foo' is already registered");
        assert!(matches!(err, BridgeError::Registration(_)));
    }
}
