//! Value layer of the hostbind bridge.
//!
//! Everything that crosses the host boundary as data lives here: the
//! [`Variant`] tagged union and its conversion traits, the math and string
//! aggregates it carries, typed arrays and dictionaries, and the identity
//! primitives ([`NativeHandle`], [`TypeHash`], [`QualifiedName`]) shared by
//! the registry and the bridge. Nothing in this crate talks to the host.
//!
//! ## Key Types
//!
//! - [`Variant`] / [`VariantType`] - the host's dynamic value and its tag set
//! - [`ToVariant`] / [`FromVariant`] / [`VariantTyped`] - the codec
//! - [`VariantArray`] / [`TypedArray`] - arrays with an immutable element type
//! - [`Dictionary`] / [`TypedDictionary`] - ordered maps with key/value types
//! - [`to_variant`] - serde-based encoding of arbitrary data

pub mod array;
pub mod callable;
pub mod dictionary;
pub mod encoder;
pub mod error;
pub mod handle;
pub mod math;
pub mod qualified_name;
pub mod string;
pub mod type_hash;
pub mod variant;

pub use array::{ClassCheck, ElementType, TypedArray, VariantArray};
pub use callable::{Callable, Signal};
pub use dictionary::{Dictionary, TypedDictionary};
pub use encoder::{VariantSerializer, to_variant};
pub use error::VariantError;
pub use handle::{NativeHandle, Rid};
pub use math::*;
pub use qualified_name::QualifiedName;
pub use string::{GString, NodePath, StringName};
pub use type_hash::TypeHash;
pub use variant::{FromVariant, ToVariant, Variant, VariantType, VariantTyped};
