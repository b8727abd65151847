//! The exported entry symbol and the initialization level protocol.

mod harness;

use std::ptr;
use std::sync::{Arc, OnceLock};

use harness::{Foo, Plain};
use hostbind::prelude::*;
use hostbind::sys::{self, InitializationLevel};
use hostbind::{ExtensionLibrary, HeadlessHost, HostInterface};

fn shared_host() -> &'static Arc<HeadlessHost> {
    static HOST: OnceLock<Arc<HeadlessHost>> = OnceLock::new();
    HOST.get_or_init(|| {
        let host = Arc::new(HeadlessHost::new());
        host.add_native_class("Bar", Some("Node"));
        host
    })
}

struct Game;

impl ExtensionLibrary for Game {
    fn create_host(
        _get_proc_address: sys::GetProcAddress,
        _library: sys::ClassLibraryPtr,
    ) -> Option<Arc<dyn HostInterface>> {
        Some(Arc::clone(shared_host()) as Arc<dyn HostInterface>)
    }

    fn config() -> BridgeConfig {
        BridgeConfig::default().with_integrity_policy(IntegrityPolicy::Report)
    }

    fn register(bridge: &Bridge) -> Result<(), BridgeError> {
        bridge.register::<Foo>()?;
        bridge.register::<Plain>()
    }
}

hostbind::entry_point!(game_library_init, Game);

struct Unavailable;

impl ExtensionLibrary for Unavailable {
    fn create_host(
        _get_proc_address: sys::GetProcAddress,
        _library: sys::ClassLibraryPtr,
    ) -> Option<Arc<dyn HostInterface>> {
        None
    }

    fn register(_bridge: &Bridge) -> Result<(), BridgeError> {
        Ok(())
    }
}

hostbind::entry_point!(unavailable_library_init, Unavailable);

#[test]
fn null_initialization_record_is_rejected() {
    let ok = unsafe { game_library_init(None, ptr::null_mut(), ptr::null_mut()) };
    assert_eq!(ok, sys::FALSE);
}

#[test]
fn missing_host_interface_is_rejected() {
    let mut init = sys::Initialization::default();
    let ok = unsafe { unavailable_library_init(None, ptr::null_mut(), &mut init) };
    assert_eq!(ok, sys::FALSE);
    assert!(init.initialize.is_none());
}

#[test]
fn classes_follow_initialization_levels() {
    harness::init_tracing();
    let host = shared_host();
    let mut init = sys::Initialization::default();

    let ok = unsafe { game_library_init(None, ptr::null_mut(), &mut init) };
    assert_eq!(ok, sys::TRUE);
    assert_eq!(init.minimum_initialization_level, InitializationLevel::Scene as u32);
    let initialize = init.initialize.unwrap();
    let deinitialize = init.deinitialize.unwrap();

    unsafe { initialize(init.userdata, InitializationLevel::Core as u32) };
    unsafe { initialize(init.userdata, InitializationLevel::Servers as u32) };
    assert!(!host.is_extension_class("Foo"));

    unsafe { initialize(init.userdata, InitializationLevel::Scene as u32) };
    assert!(host.is_extension_class("Foo"));
    assert!(host.is_extension_class("Plain"));

    // The host can now create instances on its own.
    let handle = host.construct_object(&StringName::from("Foo")).unwrap();
    let ret = host.call_virtual(handle, "_process", &[Variant::Float(1.0)]);
    assert_eq!(ret, Some(Variant::Float(2.0)));
    host.destroy_object(handle);

    unsafe { deinitialize(init.userdata, InitializationLevel::Scene as u32) };
    assert!(!host.is_extension_class("Foo"));
    assert!(!host.is_extension_class("Plain"));

    unsafe { deinitialize(init.userdata, InitializationLevel::Servers as u32) };
    unsafe { deinitialize(init.userdata, InitializationLevel::Core as u32) };
}
