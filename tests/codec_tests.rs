//! Decoding Variants that carry objects, and typed containers crossing the
//! boundary.

mod harness;

use harness::{Foo, Plain, bridge, bridge_with, integrity_errors};
use hostbind::array::ElementType;
use hostbind::prelude::*;
use hostbind::{Dictionary, HostInterface, IntegrityError};

#[test]
fn subtype_handle_decodes_to_canonical_instance() {
    let (_host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();

    let first = bridge.object_from_variant(&foo.to_variant()).unwrap().unwrap();
    let second = bridge.object_from_variant(&foo.to_variant()).unwrap().unwrap();

    let first = first.cast::<Foo>().unwrap();
    first.bind_mut().unwrap().ticks = 9;
    assert_eq!(second.cast::<Foo>().unwrap().bind().unwrap().ticks, 9);
    assert_eq!(first, foo);
}

#[test]
fn framework_handle_decodes_to_runtime_class() {
    let (host, bridge) = bridge();
    let handle = host.construct_object(&StringName::from("Node2D")).unwrap();

    let decoded = bridge.object_from_variant(&Variant::Object(Some(handle))).unwrap().unwrap();

    assert!(decoded.is_framework());
    assert_eq!(decoded.class_name(), "Node2D");
    assert!(decoded.cast::<Foo>().is_none());
    // Without caching, decoding leaves the tables alone.
    assert_eq!(bridge.identity().framework_count(), 0);
}

#[test]
fn framework_proxy_cache() {
    let (host, bridge) = bridge_with(BridgeConfig::default().with_framework_proxy_cache(true));
    let handle = host.construct_object(&StringName::from("Node")).unwrap();

    let first = bridge.object_from_handle(handle).unwrap();
    let second = bridge.object_from_handle(handle).unwrap();

    assert_eq!(first, second);
    assert_eq!(bridge.identity().framework_count(), 1);
    assert_eq!(host.binding_count(handle), 1);

    host.destroy_object(handle);
    assert_eq!(bridge.identity().framework_count(), 0);
}

#[test]
fn registered_class_without_instance_is_an_integrity_error() {
    let (host, bridge) = bridge();
    bridge.register::<Plain>().unwrap();
    let plain = bridge.instantiate::<Plain>().unwrap();
    bridge.identity().unregister_subtype(plain.handle()).unwrap();

    let err = bridge.object_from_handle(plain.handle()).unwrap_err();

    assert!(matches!(err, BridgeError::Integrity(IntegrityError::MissingInstance { .. })));
    assert_eq!(integrity_errors(&bridge).len(), 1);
    assert!(host.object_exists(plain.handle()));
}

#[test]
fn null_and_non_object_variants() {
    let (_host, bridge) = bridge();

    assert!(bridge.object_from_variant(&Variant::Object(None)).unwrap().is_none());
    assert!(bridge.object_from_variant(&Variant::Int(4)).is_err());

    let missing: Option<ObjectRef> = bridge.decode(&Variant::Nil).unwrap();
    assert!(missing.is_none());
    let missing: Option<ObjectRef> = bridge.decode(&Variant::Object(None)).unwrap();
    assert!(missing.is_none());
    assert!(bridge.decode::<ObjectRef>(&Variant::Object(None)).is_err());
}

#[test]
fn decode_typed_object() {
    let (_host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    bridge.register::<Plain>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();
    let plain = bridge.instantiate::<Plain>().unwrap();

    let decoded: Obj<Foo> = bridge.decode(&foo.to_variant()).unwrap();
    assert_eq!(decoded, foo);
    assert!(bridge.decode::<Obj<Foo>>(&plain.to_variant()).is_err());
}

#[test]
fn typed_array_keeps_element_type_and_order() {
    let (host, bridge) = bridge();

    #[derive(Debug, Class)]
    struct Collector {
        base: Base,
    }

    impl Subclass for Collector {
        type Parent = Node;

        fn init(base: Base) -> Self {
            Self { base }
        }

        fn register(class: &mut ClassBuilder<Self>) {
            class.virtual_method("_scale", |_: &mut Collector, values: TypedArray<i64>, by: i64| {
                let scaled = values.to_vec().unwrap_or_default().into_iter().map(|v| v * by).collect();
                TypedArray::<i64>::from_vec(scaled)
            });
        }
    }

    bridge.register::<Collector>().unwrap();
    let collector = bridge.instantiate::<Collector>().unwrap();
    let input = TypedArray::<i64>::from_vec(vec![3, 1, 2]);

    let ret = host
        .call_virtual(collector.handle(), "_scale", &[input.to_variant(), Variant::Int(10)])
        .unwrap();

    let Variant::Array(array) = &ret else {
        panic!("expected an array, got {ret:?}");
    };
    assert_eq!(array.element_type(), &ElementType::new(VariantType::Int));
    let output = TypedArray::<i64>::from_variant(&ret).unwrap();
    assert_eq!(output.to_vec().unwrap(), vec![30, 10, 20]);

    // An untyped array is converted element by element.
    let untyped = VariantArray::new();
    untyped.push(Variant::Int(4)).unwrap();
    let ret = host
        .call_virtual(collector.handle(), "_scale", &[Variant::Array(untyped), Variant::Int(2)])
        .unwrap();
    assert_eq!(TypedArray::<i64>::from_variant(&ret).unwrap().to_vec().unwrap(), vec![8]);

    // An array typed for another element type does not satisfy the parameter.
    let floats = TypedArray::<f64>::from_vec(vec![1.5]);
    host.call_virtual(collector.handle(), "_scale", &[floats.to_variant(), Variant::Int(1)]);
    assert!(matches!(
        integrity_errors(&bridge).as_slice(),
        [IntegrityError::SignatureMismatch { index: 0, .. }]
    ));
}

#[test]
fn object_array_checks_classes_through_bridge() {
    let (host, bridge) = bridge();
    bridge.register::<Foo>().unwrap();
    let foo = bridge.instantiate::<Foo>().unwrap();
    let node3d = host.construct_object(&StringName::from("Node3D")).unwrap();

    let bars = VariantArray::typed(ElementType::object("Bar"));
    bars.push_checked(foo.to_variant(), &bridge).unwrap();
    assert!(bars.push_checked(Variant::Object(Some(node3d)), &bridge).is_err());
    bars.push_checked(Variant::Object(None), &bridge).unwrap();

    assert_eq!(bars.len(), 2);
    assert_eq!(bridge.class_of(node3d).unwrap(), "Node3D");
}

#[test]
fn class_constrained_containers_need_a_class_check() {
    let (host, bridge) = bridge();
    let node3d = host.construct_object(&StringName::from("Node3D")).unwrap();

    let bars = VariantArray::typed(ElementType::object("Bar"));
    assert!(bars.push(Variant::Object(Some(node3d))).is_err());
    bars.push(Variant::Object(None)).unwrap();
    assert_eq!(bars.len(), 1);

    let by_name = Dictionary::typed(ElementType::new(VariantType::String), ElementType::object("Node"));
    let key = Variant::String("spatial".into());
    assert!(by_name.insert(key.clone(), Variant::Object(Some(node3d))).is_err());
    by_name.insert_checked(key.clone(), Variant::Object(Some(node3d)), &bridge).unwrap();
    assert_eq!(by_name.get(&key), Some(Variant::Object(Some(node3d))));
}

#[test]
fn exported_container_signatures_carry_element_types() {
    let (host, bridge) = bridge();

    #[derive(Debug, Class)]
    struct Ledger {
        base: Base,
    }

    impl Subclass for Ledger {
        type Parent = Node;

        fn init(base: Base) -> Self {
            Self { base }
        }

        fn register(class: &mut ClassBuilder<Self>) {
            class.method(
                "names_above",
                |_: &mut Ledger, scores: TypedDictionary<GString, i64>, floor: i64| -> TypedArray<GString> {
                    let top = GString::from("top");
                    let names = match scores.get(&top) {
                        Ok(Some(score)) if score > floor => vec![top],
                        _ => Vec::new(),
                    };
                    TypedArray::from_vec(names)
                },
            );
        }
    }

    bridge.register::<Ledger>().unwrap();
    let methods = host.extension_methods("Ledger");
    let [info] = methods.as_slice() else {
        panic!("expected one exported method, got {methods:?}");
    };

    let scores = &info.arguments[0];
    assert_eq!(scores.variant_type, VariantType::Dictionary);
    assert_eq!(scores.class_name.as_deref(), Some("Dictionary[String, int]"));
    assert_eq!(scores.hint, PropertyHint::DictionaryType);
    assert_eq!(scores.hint_string, "String;int");
    assert_eq!(info.arguments[1].hint, PropertyHint::None);

    let returned = info.return_value.as_ref().unwrap();
    assert_eq!(returned.variant_type, VariantType::Array);
    assert_eq!(returned.class_name.as_deref(), Some("Array[String]"));
    assert_eq!(returned.hint, PropertyHint::ArrayType);
    assert_eq!(returned.hint_string, "String");
}

#[test]
fn serde_values_cross_as_dictionaries() {
    #[derive(serde::Serialize)]
    struct Loadout {
        name: String,
        slots: Vec<i64>,
        sidearm: Option<String>,
    }

    let loadout = Loadout {
        name: "scout".into(),
        slots: vec![4, 2],
        sidearm: None,
    };
    let Variant::Dictionary(dict) = hostbind::to_variant(&loadout).unwrap() else {
        panic!("structs encode as dictionaries");
    };

    assert_eq!(dict.get(&Variant::String("name".into())), Some(Variant::String("scout".into())));
    assert_eq!(dict.get(&Variant::String("sidearm".into())), Some(Variant::Nil));
    let Some(Variant::Array(slots)) = dict.get(&Variant::String("slots".into())) else {
        panic!("sequences encode as arrays");
    };
    assert_eq!(slots.to_vec(), vec![Variant::Int(4), Variant::Int(2)]);
}
