//! Plugin entry point.
//!
//! The host loads the library and calls one exported C function with a
//! function-pointer getter, the library handle and an [`sys::Initialization`]
//! record to fill in. [`entry_point!`](crate::entry_point) generates that
//! function for an [`ExtensionLibrary`]:
//!
//! ```ignore
//! struct Game;
//!
//! impl ExtensionLibrary for Game {
//!     fn create_host(get_proc_address: sys::GetProcAddress, library: sys::ClassLibraryPtr)
//!         -> Option<Arc<dyn HostInterface>> { /* resolve the host function table */ }
//!
//!     fn register(bridge: &Bridge) -> Result<(), BridgeError> {
//!         bridge.register::<Player>()?;
//!         bridge.register::<Enemy>()
//!     }
//! }
//!
//! hostbind::entry_point!(game_library_init, Game);
//! ```
//!
//! At the library's initialization level the bridge is created and every
//! class registered; at the matching deinitialization level all classes are
//! unregistered in reverse order and the bridge is torn down.

use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::host::HostInterface;
use crate::sys::{self, InitializationLevel};

/// A loadable extension library.
pub trait ExtensionLibrary: 'static {
    /// Build the host interface from the entry point arguments.
    fn create_host(
        get_proc_address: sys::GetProcAddress,
        library: sys::ClassLibraryPtr,
    ) -> Option<Arc<dyn HostInterface>>;

    /// Bridge settings. Defaults to the environment.
    fn config() -> BridgeConfig {
        BridgeConfig::from_env()
    }

    /// Register every statically known class.
    fn register(bridge: &Bridge) -> Result<(), BridgeError>;

    /// Level at which classes are registered and unregistered.
    fn level() -> InitializationLevel {
        InitializationLevel::Scene
    }
}

/// Per-load state behind the initialization userdata.
struct LibraryState {
    host: Arc<dyn HostInterface>,
    bridge: Mutex<Option<Bridge>>,
}

/// Body of the exported entry symbol.
///
/// # Safety
///
/// `initialization` must be null or point at a writable [`sys::Initialization`].
pub unsafe fn library_init<L: ExtensionLibrary>(
    get_proc_address: sys::GetProcAddress,
    library: sys::ClassLibraryPtr,
    initialization: *mut sys::Initialization,
) -> sys::Bool {
    if initialization.is_null() {
        return sys::FALSE;
    }
    let Some(host) = L::create_host(get_proc_address, library) else {
        tracing::error!("extension entry point: host interface unavailable");
        return sys::FALSE;
    };
    let state = Box::new(LibraryState {
        host,
        bridge: Mutex::new(None),
    });
    let init = sys::Initialization {
        minimum_initialization_level: L::level() as u32,
        userdata: Box::into_raw(state) as *mut c_void,
        initialize: Some(initialize::<L>),
        deinitialize: Some(deinitialize::<L>),
    };
    unsafe { initialization.write(init) };
    sys::TRUE
}

unsafe extern "C" fn initialize<L: ExtensionLibrary>(userdata: *mut c_void, level: u32) {
    if userdata.is_null() || InitializationLevel::from_raw(level) != Some(L::level()) {
        return;
    }
    let state = unsafe { &*(userdata as *const LibraryState) };
    let bridge = Bridge::new(Arc::clone(&state.host), L::config());
    match catch_unwind(AssertUnwindSafe(|| L::register(&bridge))) {
        Ok(Ok(())) => {
            tracing::debug!(classes = bridge.registered_classes().len(), "extension initialized");
        }
        Ok(Err(err)) => tracing::warn!("extension registration incomplete: {err}"),
        Err(_) => tracing::error!("extension registration panicked"),
    }
    *state.bridge.lock() = Some(bridge);
}

unsafe extern "C" fn deinitialize<L: ExtensionLibrary>(userdata: *mut c_void, level: u32) {
    if userdata.is_null() {
        return;
    }
    let level = InitializationLevel::from_raw(level);
    if level == Some(L::level()) {
        let state = unsafe { &*(userdata as *const LibraryState) };
        if let Some(bridge) = state.bridge.lock().take() {
            bridge.shutdown();
        }
    }
    if level == Some(InitializationLevel::Core) {
        drop(unsafe { Box::from_raw(userdata as *mut LibraryState) });
    }
}

/// Export the extension entry symbol for an [`ExtensionLibrary`].
#[macro_export]
macro_rules! entry_point {
    ($symbol:ident, $library:ty) => {
        /// Extension entry point.
        ///
        /// # Safety
        ///
        /// Called by the host with a writable initialization record.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $symbol(
            get_proc_address: $crate::sys::GetProcAddress,
            library: $crate::sys::ClassLibraryPtr,
            initialization: *mut $crate::sys::Initialization,
        ) -> $crate::sys::Bool {
            unsafe { $crate::entry::library_init::<$library>(get_proc_address, library, initialization) }
        }
    };
}
