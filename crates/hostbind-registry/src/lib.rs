//! Registration metadata for hostbind extension classes.
//!
//! - [`TypeDescriptor`] - immutable per-class metadata (parent, overrides, members)
//! - [`ClassDb`] - the descriptors registered by this library
//! - [`PropertyInfo`], [`MethodInfo`], [`SignalInfo`] - member declarations

pub mod class_db;
pub mod descriptor;
pub mod error;
pub mod method;
pub mod property;

pub use class_db::ClassDb;
pub use descriptor::{DescriptorBuilder, TypeDescriptor};
pub use error::RegistrationError;
pub use method::{MethodFlags, MethodInfo, SignalInfo};
pub use property::{PropertyHint, PropertyInfo, PropertyUsage};
