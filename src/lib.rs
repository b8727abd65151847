//! hostbind: a bridge between Rust types and a host engine's extension ABI.
//!
//! The host owns native objects and frees them on its own schedule; Rust
//! subclasses carry managed state that must survive every round trip through
//! the host. The bridge keeps both sides consistent:
//!
//! - [`IdentityRegistry`] maps native handles to their canonical managed
//!   instance (subtype table) or to stateless proxies (framework table)
//! - the [`lifecycle`] callbacks create and free managed state when the host
//!   creates and frees objects
//! - the [`dispatch`] trampoline routes host virtual calls into Rust overrides
//! - [`Variant`] and the typed containers carry values across the boundary
//!
//! ## Example
//!
//! ```ignore
//! use hostbind::prelude::*;
//!
//! #[derive(Class)]
//! struct Player {
//!     base: Base,
//!     #[hostbind(export)]
//!     speed: f64,
//! }
//!
//! impl Subclass for Player {
//!     type Parent = Node2D;
//!
//!     fn init(base: Base) -> Self {
//!         Self { base, speed: 4.0 }
//!     }
//!
//!     fn register(class: &mut ClassBuilder<Self>) {
//!         class.virtual_method("_process", |this: &mut Player, delta: f64| {
//!             this.speed += delta;
//!         });
//!     }
//! }
//!
//! let bridge = Bridge::new(host, BridgeConfig::default());
//! bridge.register::<Player>()?;
//! let player = bridge.instantiate::<Player>()?;
//! ```

extern crate self as hostbind;

pub mod args;
pub mod bridge;
pub mod classes;
pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod entry;
pub mod error;
pub mod headless;
pub mod host;
pub mod identity;
pub mod lifecycle;
pub mod object;
pub mod registration;
pub mod sys;

pub use hostbind_core::*;
pub use hostbind_macros::Class;
pub use hostbind_registry as registry;

pub use args::{FromArg, IntoReturn};
pub use bridge::Bridge;
pub use classes::FrameworkClass;
pub use config::{BridgeConfig, IntegrityPolicy};
pub use diagnostics::Diagnostics;
pub use dispatch::{CallFailure, DispatchTable, MethodFn, ParamSpec, VirtualEntry, VirtualEntryPoint};
pub use entry::ExtensionLibrary;
pub use error::{BridgeError, IntegrityError};
pub use headless::HeadlessHost;
pub use host::HostInterface;
pub use identity::{IdentityRegistry, ReferenceState};
pub use object::{Base, InstanceCell, Obj, ObjectRef, Proxy};
pub use registration::{ClassBuilder, ClassMeta, Subclass, class_name_of};

pub mod prelude {
    pub use crate::classes::{CanvasItem, Node, Node2D, Node3D, Object, RefCounted, Resource};
    pub use crate::registry::{PropertyHint, PropertyInfo, PropertyUsage, SignalInfo};
    pub use crate::{
        Base, Bridge, BridgeConfig, BridgeError, Class, ClassBuilder, ClassMeta, FromVariant, GString,
        IntegrityPolicy, Obj, ObjectRef, Proxy, StringName, Subclass, ToVariant, TypedArray, TypedDictionary,
        Variant, VariantArray, VariantType, Vector2, Vector3,
    };
}
