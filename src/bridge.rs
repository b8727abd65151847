//! The bridge object.
//!
//! A [`Bridge`] owns everything with a lifecycle tied to the plugin: the host
//! interface, the identity registry, the registered classes and the
//! diagnostic channel. It is created at plugin load and shut down at unload.
//! Nothing here is a global: tests create as many isolated bridges as they
//! like.

use std::ffi::c_void;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};

use hostbind_core::{NativeHandle, StringName, Variant};
use hostbind_registry::ClassDb;

use crate::config::BridgeConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{BridgeError, IntegrityError};
use crate::host::HostInterface;
use crate::identity::IdentityRegistry;
use crate::registration::ClassBinding;

/// Shared state behind a [`Bridge`].
pub(crate) struct BridgeInner {
    pub(crate) host: Arc<dyn HostInterface>,
    pub(crate) identity: IdentityRegistry,
    pub(crate) classes: RwLock<ClassDb>,
    pub(crate) bindings: RwLock<FxHashMap<StringName, Arc<ClassBinding>>>,
    pub(crate) config: BridgeConfig,
    pub(crate) diagnostics: Diagnostics,
    /// `Box<Weak<BridgeInner>>` handed to the host as binding token. Freed on
    /// drop, after every binding still carrying it is detached.
    binding_token: usize,
    /// Objects carrying a binding with `binding_token`.
    pub(crate) bound: Mutex<FxHashSet<NativeHandle>>,
}

impl Drop for BridgeInner {
    fn drop(&mut self) {
        let token = self.binding_token as *mut Weak<BridgeInner>;
        for handle in self.bound.get_mut().drain() {
            self.host.free_instance_binding(handle, token.cast());
        }
        // SAFETY: the token came from `Box::into_raw` in `Bridge::new` and no
        // host object refers to it any more.
        drop(unsafe { Box::from_raw(token) });
    }
}

/// Handle to the bridge. Clones share state.
#[derive(Clone)]
pub struct Bridge {
    pub(crate) inner: Arc<BridgeInner>,
}

impl Bridge {
    pub fn new(host: Arc<dyn HostInterface>, config: BridgeConfig) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<BridgeInner>| {
            let token = Box::into_raw(Box::new(weak.clone()));
            BridgeInner {
                host,
                identity: IdentityRegistry::new(),
                classes: RwLock::new(ClassDb::new()),
                bindings: RwLock::new(FxHashMap::default()),
                diagnostics: Diagnostics::new(config.integrity_policy, config.diagnostics_capacity),
                config,
                binding_token: token as usize,
                bound: Mutex::new(FxHashSet::default()),
            }
        });
        tracing::debug!(policy = ?inner.config.integrity_policy, "bridge created");
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<BridgeInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<BridgeInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn binding_token(&self) -> *mut c_void {
        self.inner.binding_token as *mut c_void
    }

    pub fn host(&self) -> &dyn HostInterface {
        self.inner.host.as_ref()
    }

    pub fn identity(&self) -> &IdentityRegistry {
        &self.inner.identity
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.inner.diagnostics
    }

    /// Integrity errors recorded so far, oldest first.
    pub fn integrity_errors(&self) -> Vec<IntegrityError> {
        self.inner.diagnostics.recent()
    }

    /// Whether two handles refer to the same bridge.
    pub fn ptr_eq(&self, other: &Bridge) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ========================================================================
    // Calls into the host
    // ========================================================================

    /// Call a method on any object through the host.
    pub fn call_host_method(&self, handle: NativeHandle, method: &str, args: &[Variant]) -> Result<Variant, BridgeError> {
        let method = StringName::from(method);
        self.host()
            .call_method(handle, &method, args)
            .map_err(|error| BridgeError::Call { method, error })
    }

    /// Emit a signal on an object.
    pub fn emit_signal(&self, handle: NativeHandle, signal: &str, args: &[Variant]) -> Result<(), BridgeError> {
        let signal = StringName::from(signal);
        if self.host().emit_signal(handle, &signal, args) {
            Ok(())
        } else {
            Err(BridgeError::UnknownObject(handle))
        }
    }

    /// Release held references, unregister every class and clear the
    /// identity tables.
    pub fn shutdown(&self) {
        let released = self.release_all_references();
        if released > 0 {
            tracing::debug!(released, "released referenced objects at unload");
        }
        self.unregister_all();
        tracing::debug!("bridge shut down");
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("classes", &self.inner.classes.read().names())
            .field("instances", &self.inner.identity.subtype_count())
            .field("config", &self.inner.config)
            .finish()
    }
}
