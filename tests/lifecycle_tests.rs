//! Construction, destruction, notifications and properties.

mod harness;

use harness::{Foo, Plain, bridge, bridge_with, integrity_errors};
use hostbind::classes::notify;
use hostbind::prelude::*;
use hostbind::registry::RegistrationError;
use hostbind::{HostInterface, IntegrityError, ReferenceState};

#[test]
fn instantiate_from_rust_goes_through_the_host() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();

    let foo = bridge.instantiate::<Foo>().unwrap();

    assert!(host.object_exists(foo.handle()));
    assert_eq!(host.object_class_name(foo.handle()), Some(StringName::from("Foo")));
    assert_eq!(foo.class_name(), "Foo");
    assert_eq!(foo.bind().unwrap().notifications, vec![notify::POSTINITIALIZE]);
    assert_eq!(bridge.identity().subtype_count(), 1);
}

#[test]
fn instantiate_unregistered_class_fails() {
    let (_host, bridge) = bridge();
    let err = bridge.instantiate::<Plain>().unwrap_err();
    assert_eq!(err, BridgeError::UnknownClass(StringName::from("Plain")));
}

#[test]
fn framework_construction_uses_framework_table() {
    let (host, bridge) = bridge();

    let proxy = bridge.construct_framework::<Node2D>().unwrap();

    assert_eq!(proxy.class_name(), "Node2D");
    assert!(bridge.identity().lookup(proxy.handle()).is_none());
    assert_eq!(bridge.identity().framework_proxy(proxy.handle()), Some(proxy.clone()));
    assert_eq!(host.binding_count(proxy.handle()), 1);

    bridge.request_free(proxy.handle());
    assert!(!host.object_exists(proxy.handle()));
    assert_eq!(bridge.identity().framework_count(), 0);
    assert!(integrity_errors(&bridge).is_empty());
}

#[test]
fn construct_by_name_picks_the_table() {
    let (_host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();

    let foo = bridge.construct("Foo").unwrap();
    let node = bridge.construct("Node").unwrap();

    assert!(foo.cast::<Foo>().is_some());
    assert!(node.is_framework());
    assert_eq!(
        bridge.construct("Spaceship").unwrap_err(),
        BridgeError::UnknownClass(StringName::from("Spaceship"))
    );
}

#[test]
fn free_drops_managed_state() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    host.destroy_object(foo.handle());

    assert!(!foo.is_alive());
    assert_eq!(foo.bind().unwrap_err(), BridgeError::NotAlive(foo.handle()));
    assert_eq!(bridge.identity().subtype_count(), 0);
}

#[test]
fn request_free_from_base() {
    let (host, bridge) = bridge();
    bridge.register::<Plain>().unwrap();
    let plain = bridge.instantiate::<Plain>().unwrap();

    let base = plain.bind().unwrap().base.clone();
    base.request_free().unwrap();

    assert!(!host.object_exists(plain.handle()));
    assert!(!plain.is_alive());
}

#[test]
fn notifications_reach_the_instance() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    host.notify(foo.handle(), notify::READY, false);
    host.notify(foo.handle(), notify::ENTER_TREE, false);

    assert_eq!(
        foo.bind().unwrap().notifications,
        vec![notify::POSTINITIALIZE, notify::READY, notify::ENTER_TREE]
    );
}

#[test]
fn exported_properties_through_host_callbacks() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    assert!(host.set_property(foo.handle(), "ticks", &Variant::Int(41)));
    assert_eq!(host.get_property(foo.handle(), "ticks"), Some(Variant::Int(41)));
    assert_eq!(foo.bind().unwrap().ticks, 41);

    assert!(!host.set_property(foo.handle(), "ticks", &Variant::String("many".into())));
    assert!(!host.set_property(foo.handle(), "missing", &Variant::Int(1)));
    assert_eq!(host.get_property(foo.handle(), "missing"), None);
    assert_eq!(foo.bind().unwrap().ticks, 41);
}

#[test]
fn recreate_binds_fresh_state() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let native = host.construct_object(&StringName::from("Bar")).unwrap();

    let instance = host.recreate_instance("Foo", native).unwrap();

    assert_eq!(instance, native);
    let foo = Obj::<Foo>::from_cell(bridge.identity().lookup(native).unwrap()).unwrap();
    assert_eq!(foo.bind().unwrap().ticks, 0);
}

#[test]
fn recreate_over_live_instance_keeps_the_first() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();
    foo.bind_mut().unwrap().ticks = 7;

    assert!(host.recreate_instance("Foo", foo.handle()).is_none());

    assert_eq!(
        integrity_errors(&bridge),
        vec![IntegrityError::DoubleRegistration {
            handle: foo.handle(),
            existing_class: StringName::from("Foo"),
        }]
    );
    let canonical = Obj::<Foo>::from_cell(bridge.identity().lookup(foo.handle()).unwrap()).unwrap();
    assert_eq!(canonical, foo);
    assert_eq!(canonical.bind().unwrap().ticks, 7);
}

#[test]
fn unregister_refused_while_instances_live() {
    let (host, bridge) = bridge();
    bridge.register::<Plain>().unwrap();
    let plain = bridge.instantiate::<Plain>().unwrap();

    let err = bridge.unregister::<Plain>().unwrap_err();
    assert_eq!(
        err,
        BridgeError::Registration(RegistrationError::InstancesAlive {
            class: "Plain".into(),
            count: 1,
        })
    );

    host.destroy_object(plain.handle());
    bridge.unregister::<Plain>().unwrap();
    assert!(!host.is_extension_class("Plain"));
}

#[test]
fn shutdown_releases_everything() {
    let (host, bridge) = bridge_with(BridgeConfig::default());
    bridge.register::<Foo>().unwrap();
    bridge.register::<Plain>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    bridge.shutdown();

    assert!(!foo.is_alive());
    assert!(bridge.registered_classes().is_empty());
    assert!(!host.is_extension_class("Foo"));
    assert!(!host.is_extension_class("Plain"));
    assert_eq!(bridge.identity().subtype_count(), 0);
}

#[test]
fn failed_attach_destroys_the_native_object() {
    let (host, bridge) = bridge();
    bridge.register::<Plain>().unwrap();
    let next = host.next_handle().unwrap();
    bridge.identity().register_framework(Proxy::new(next, "Bar")).unwrap();
    let before = host.object_count();

    let err = bridge.instantiate::<Plain>().unwrap_err();

    assert!(matches!(err, BridgeError::ConstructionFailed(ref class) if class == "Plain"));
    assert!(!host.object_exists(next));
    assert_eq!(host.object_count(), before);
    assert_eq!(bridge.identity().subtype_count(), 0);
    assert!(matches!(
        integrity_errors(&bridge).as_slice(),
        [IntegrityError::TableConflict { .. }]
    ));
}

/// Reference-counted subclass.
#[derive(Debug, Class)]
struct Counter {
    base: Base,
}

impl Subclass for Counter {
    type Parent = RefCounted;

    fn init(base: Base) -> Self {
        Self { base }
    }
}

#[test]
fn framework_reference_follows_host_references() {
    let (host, bridge) = bridge();

    let resource = bridge.construct_framework::<Resource>().unwrap();
    let handle = resource.handle();
    assert_eq!(host.reference_count(handle), Some(1));
    assert_eq!(bridge.reference_state(handle), Some(ReferenceState::Weak));

    host.reference(handle);
    assert_eq!(bridge.reference_state(handle), Some(ReferenceState::Strong));

    assert!(!host.unreference(handle));
    assert_eq!(bridge.reference_state(handle), Some(ReferenceState::Weak));
    assert!(host.object_exists(handle));

    assert!(bridge.release_reference(handle));
    assert!(!host.object_exists(handle));
    assert_eq!(bridge.reference_state(handle), None);
    assert_eq!(bridge.identity().framework_count(), 0);
    assert!(integrity_errors(&bridge).is_empty());
}

#[test]
fn held_reference_vetoes_host_release() {
    let (host, bridge) = bridge();
    let handle = bridge.construct_framework::<RefCounted>().unwrap().handle();

    host.reference(handle);
    assert!(!host.unreference(handle));
    assert!(!host.unreference(handle));

    assert!(host.object_exists(handle));
    assert_eq!(host.reference_count(handle), Some(0));
    assert!(bridge.release_reference(handle));
    assert!(!host.object_exists(handle));
}

#[test]
fn release_unused_waits_for_the_last_obj() {
    let (host, bridge) = bridge();
    bridge.register::<Counter>().unwrap();

    let counter = bridge.instantiate::<Counter>().unwrap();
    let handle = counter.handle();
    assert_eq!(bridge.reference_state(handle), Some(ReferenceState::Weak));
    assert_eq!(bridge.release_unused(), 0);
    assert!(host.object_exists(handle));

    drop(counter);
    assert_eq!(bridge.release_unused(), 1);
    assert!(!host.object_exists(handle));
    assert_eq!(bridge.identity().subtype_count(), 0);
    assert!(integrity_errors(&bridge).is_empty());
}

#[test]
fn host_held_subclass_survives_release_unused() {
    let (host, bridge) = bridge();
    bridge.register::<Counter>().unwrap();
    let handle = bridge.instantiate::<Counter>().unwrap().handle();

    host.reference(handle);
    assert_eq!(bridge.release_unused(), 0);
    assert!(host.object_exists(handle));

    assert!(!host.unreference(handle));
    assert_eq!(bridge.release_unused(), 1);
    assert!(!host.object_exists(handle));
}

#[test]
fn plain_objects_are_not_reference_tracked() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();

    let foo = bridge.instantiate::<Foo>().unwrap();

    assert_eq!(host.reference_count(foo.handle()), None);
    assert_eq!(bridge.reference_state(foo.handle()), None);
    assert!(!bridge.release_reference(foo.handle()));
    assert!(host.object_exists(foo.handle()));
}

#[test]
fn shutdown_releases_held_references() {
    let (host, bridge) = bridge();
    let handle = bridge.construct_framework::<Resource>().unwrap().handle();

    bridge.shutdown();

    assert!(!host.object_exists(handle));
    assert_eq!(bridge.reference_state(handle), None);
}

#[test]
fn dropping_the_bridge_detaches_its_bindings() {
    let (host, bridge) = bridge();
    let node = bridge.construct_framework::<Node>().unwrap().handle();
    let resource = bridge.construct_framework::<Resource>().unwrap().handle();
    assert_eq!(host.binding_count(node), 1);

    drop(bridge);

    assert_eq!(host.binding_count(node), 0);
    assert_eq!(host.binding_count(resource), 0);
    host.destroy_object(node);
    assert!(!host.object_exists(node));
}

#[test]
fn freed_objects_leave_no_binding_behind() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap().handle();
    let node = bridge.construct_framework::<Node>().unwrap().handle();

    bridge.request_free(foo);
    bridge.request_free(node);
    bridge.shutdown();
    drop(bridge);

    assert!(!host.object_exists(foo));
    assert!(!host.object_exists(node));
}
