//! Proc macros for hostbind.
//!
//! # Macros
//!
//! - `#[derive(Class)]` - Generate registration metadata for an extension class
//!
//! # Example
//!
//! ```ignore
//! use hostbind::prelude::*;
//!
//! #[derive(Class)]
//! #[hostbind(name = "Spinner")]
//! pub struct Spinner {
//!     base: Base,
//!     #[hostbind(export, range = "0,10,0.1")]
//!     speed: f64,
//! }
//! ```

use proc_macro::TokenStream;

mod attrs;
mod derive_class;

/// Derive `hostbind::ClassMeta` for a struct.
///
/// # Attributes
///
/// - `#[hostbind(name = "...")]` - Class name handed to the host (default: struct name)
///
/// # Field Attributes
///
/// - `#[hostbind(export)]` - Expose the field as a host property
/// - `#[hostbind(export, name = "...")]` - Override the property name
/// - `#[hostbind(export, range = "min,max,step")]` - Attach a range hint
/// - `#[hostbind(export, read_only)]` - Readable but not writable from the host
#[proc_macro_derive(Class, attributes(hostbind))]
pub fn derive_class(input: TokenStream) -> TokenStream {
    derive_class::derive_class_impl(input)
}
