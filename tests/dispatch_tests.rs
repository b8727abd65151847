//! Override dispatch, exported methods and failure handling at the ABI edge.

mod harness;

use harness::{Foo, bridge, integrity_errors};
use hostbind::prelude::*;
use hostbind::sys::CallErrorType;
use hostbind::{HostInterface, IntegrityError};

#[test]
fn override_mutates_canonical_state() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    for _ in 0..3 {
        let ret = host.call_virtual(foo.handle(), "_process", &[Variant::Float(0.25)]);
        assert_eq!(ret, Some(Variant::Float(0.5)));
    }

    assert_eq!(foo.bind().unwrap().ticks, 3);
}

#[test]
fn resolve_override_matches_host_view() {
    let (_host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();

    let entry = bridge.resolve_override("Foo", "_describe").unwrap();
    assert!(!entry.call_data.is_null());
    assert!(bridge.resolve_override("Foo", "_input").is_none());
    assert!(bridge.resolve_override("Node", "_process").is_none());

    let descriptor = bridge.descriptor("Foo").unwrap();
    assert!(descriptor.overrides("_process"));
    assert_eq!(descriptor.parent_class_name(), "Bar");
}

#[test]
fn argument_type_mismatch_is_an_integrity_error() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    host.call_virtual(foo.handle(), "_describe", &[Variant::Int(1), Variant::Int(2)]);

    let errors = integrity_errors(&bridge);
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        IntegrityError::SignatureMismatch { method, index: 0, .. } if method == "_describe"
    ));
    assert_eq!(foo.bind().unwrap().last_label, None);
}

#[test]
fn managed_error_becomes_nil() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    assert_eq!(host.call_virtual(foo.handle(), "_fail", &[]), Some(Variant::Nil));
    assert!(integrity_errors(&bridge).is_empty());
}

#[test]
fn panic_is_contained() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    assert_eq!(host.call_virtual(foo.handle(), "_explode", &[]), Some(Variant::Nil));

    // The instance is still usable afterwards.
    host.call_virtual(foo.handle(), "_process", &[Variant::Float(1.0)]);
    assert_eq!(foo.bind().unwrap().ticks, 1);
}

#[test]
fn exported_method_applies_defaults() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    let advance = StringName::from("advance");
    assert_eq!(host.call_method(foo.handle(), &advance, &[Variant::Int(4)]), Ok(Variant::Int(4)));
    assert_eq!(host.call_method(foo.handle(), &advance, &[]), Ok(Variant::Int(5)));
}

#[test]
fn exported_method_call_errors() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();
    let advance = StringName::from("advance");

    let err = host
        .call_method(foo.handle(), &advance, &[Variant::String("far".into())])
        .unwrap_err();
    assert_eq!(err.error, CallErrorType::InvalidArgument);
    assert_eq!(err.argument, 0);
    assert_eq!(err.expected, VariantType::Int as i32);

    let err = host
        .call_method(foo.handle(), &advance, &[Variant::Int(1), Variant::Int(2)])
        .unwrap_err();
    assert_eq!(err.error, CallErrorType::TooManyArguments);

    assert_eq!(foo.bind().unwrap().ticks, 0);
    assert!(integrity_errors(&bridge).is_empty());
}

#[test]
fn exported_methods_are_visible_to_the_host() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();

    let names: Vec<_> = host
        .extension_methods("Foo")
        .into_iter()
        .map(|m| m.name.to_string())
        .collect();
    assert_eq!(names, vec!["advance", "reenter", "shatter"]);

    let properties = host.extension_properties("Foo");
    assert_eq!(properties.len(), 1);
    assert_eq!(properties[0].name, "ticks");
    assert_eq!(properties[0].variant_type, VariantType::Int);

    let signals = host.extension_signals("Foo");
    assert_eq!(signals[0].name, "ticked");
}

#[test]
fn reentrant_call_on_bound_instance_fails_explicitly() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    // The inner `advance` cannot bind the instance and reports that as an error.
    let ret = host.call_method(foo.handle(), &StringName::from("reenter"), &[]);

    assert_eq!(ret, Ok(Variant::String("busy".into())));
    assert_eq!(foo.bind().unwrap().ticks, 0);
}

#[test]
fn host_call_on_bound_instance_is_a_call_error() {
    let (_host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    let guard = foo.bind_mut().unwrap();
    let err = bridge
        .call_host_method(foo.handle(), "advance", &[Variant::Int(5)])
        .unwrap_err();
    drop(guard);

    assert!(matches!(
        err,
        BridgeError::Call { ref method, error } if method == "advance" && error.error == CallErrorType::MethodNotConst
    ));
    assert_eq!(
        bridge.call_host_method(foo.handle(), "advance", &[Variant::Int(5)]).unwrap(),
        Variant::Int(5)
    );
}

#[test]
fn panicking_exported_method_is_a_call_error() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    let err = host
        .call_method(foo.handle(), &StringName::from("shatter"), &[])
        .unwrap_err();

    assert_eq!(err.error, CallErrorType::InvalidMethod);
    assert!(integrity_errors(&bridge).is_empty());
}

#[test]
fn override_can_use_other_objects() {
    #[derive(Debug, Class)]
    struct Spawner {
        base: Base,
        spawned: Vec<ObjectRef>,
    }

    impl Subclass for Spawner {
        type Parent = Node;

        fn init(base: Base) -> Self {
            Self {
                base,
                spawned: Vec::new(),
            }
        }

        fn register(class: &mut ClassBuilder<Self>) {
            class.virtual_method("_spawn", |this: &mut Spawner, class_name: String| -> Option<ObjectRef> {
                let bridge = this.base.bridge()?;
                let spawned = bridge.construct(&class_name).ok()?;
                this.spawned.push(spawned.clone());
                Some(spawned)
            });
        }
    }

    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    bridge.register::<Spawner>().unwrap();
    let spawner = bridge.instantiate::<Spawner>().unwrap();

    let ret = host
        .call_virtual(spawner.handle(), "_spawn", &[Variant::String("Foo".into())])
        .unwrap();

    let child = bridge.object_from_variant(&ret).unwrap().unwrap();
    assert!(child.cast::<Foo>().is_some());
    assert_eq!(spawner.bind().unwrap().spawned, vec![child]);
    assert_eq!(bridge.identity().subtype_count(), 2);
}

#[test]
fn signals_are_emitted_through_the_host() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    foo.bind().unwrap().base.emit_signal("ticked", &[Variant::Int(3)]).unwrap();

    let emitted = host.emitted_signals();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].object, foo.handle());
    assert_eq!(emitted[0].signal, "ticked");
    assert_eq!(emitted[0].args, vec![Variant::Int(3)]);
}
