//! Registration errors.
//!
//! Registration failures are reported and non-fatal: the class simply does not
//! take effect.

use thiserror::Error;

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors that occur while registering or unregistering an extension class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The computed class name is not a bare identifier.
    #[error("invalid class name '{0}'")]
    InvalidClassName(String),

    /// A class with this name is already registered, here or on the host.
    #[error("class '{0}' is already registered")]
    DuplicateClass(String),

    /// The declared parent class is not known to the host.
    #[error("class '{class}' declares unknown parent '{parent}'")]
    UnknownParent {
        /// Class being registered.
        class: String,
        /// Parent the host could not resolve.
        parent: String,
    },

    /// A member was declared twice on the same class.
    #[error("duplicate {kind} '{name}' on class '{class}'")]
    DuplicateMember {
        /// Owning class.
        class: String,
        /// Member name.
        name: String,
        /// "method", "property" or "signal".
        kind: &'static str,
    },

    /// The host refused the registration call.
    #[error("host rejected registration of '{0}'")]
    HostRejected(String),

    /// More default arguments than parameters.
    #[error("method '{class}::{method}' has {defaults} defaults for {arity} parameters")]
    TooManyDefaults {
        class: String,
        method: String,
        defaults: usize,
        arity: usize,
    },

    /// Unregistering a class that still has live instances.
    #[error("class '{class}' still has {count} live instances")]
    InstancesAlive { class: String, count: usize },

    /// Unregistering a class that was never registered.
    #[error("class '{0}' is not registered")]
    NotRegistered(String),
}
