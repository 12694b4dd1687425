//! Registry layering across crate boundaries: shared immutable base,
//! per-context additions, and chain-wide duplicate detection.

use std::sync::Arc;

use mirra_reflect::{basic_registry, AnyArg, Registry, ReflectError, TypeIdent};

#[derive(Clone)]
struct Widget {
    id: u64,
}

#[test]
fn test_two_contexts_share_one_base() {
    let base = Arc::new(basic_registry().unwrap());

    let mut ctx_a = Registry::with_base(base.clone());
    ctx_a
        .register_type::<Widget>("Widget", &[])
        .unwrap()
        .add_constructor(|id: u64| Widget { id })
        .add_method("id", |w: &mut Widget| w.id);

    let ctx_b = Registry::with_base(base.clone());

    // The widget exists only where it was registered.
    assert!(ctx_a.get_type("Widget").is_ok());
    assert!(matches!(
        ctx_b.get_type("Widget"),
        Err(ReflectError::NotRegistered { .. })
    ));

    // Both contexts resolve base primitives.
    assert!(ctx_a.get_type("string").is_ok());
    assert!(ctx_b.get_type("string").is_ok());

    // The base never gained the local registration.
    assert!(base.get_type("Widget").is_err());
}

#[test]
fn test_conversion_uses_full_chain() {
    let base = Arc::new(basic_registry().unwrap());
    let reg = Registry::with_base(base);

    // The widening constructor lives in the base layer; conversion initiated
    // in the local layer still finds it.
    let arg = AnyArg::new(7i32);
    assert_eq!(*arg.as_ref::<i64>(&reg).unwrap(), 7);
}

#[test]
fn test_parents_are_descriptive_only() {
    let mut reg = basic_registry().unwrap();

    #[derive(Clone)]
    struct Derived;
    reg.register_type::<Derived>("Derived", &["string"]).unwrap();

    let ty = reg.get_type("Derived").unwrap();
    assert_eq!(ty.parents(), ["string".to_owned()].as_slice());

    // Parent operations are not inherited.
    assert!(matches!(
        ty.function("len"),
        Err(ReflectError::NotRegistered { .. })
    ));
}

#[test]
fn test_type_name_of_resolves_through_chain() {
    let base = Arc::new(basic_registry().unwrap());
    let reg = Registry::with_base(base);

    assert_eq!(reg.type_name_of(TypeIdent::of::<String>()), Some("string"));
    assert_eq!(reg.type_name_of(TypeIdent::of::<Widget>()), None);
}

#[test]
fn test_registered_function_sees_local_types() {
    let base = Arc::new(basic_registry().unwrap());
    let mut reg = Registry::with_base(base);
    reg.register_type::<Widget>("Widget", &[])
        .unwrap()
        .add_constructor(|id: u64| Widget { id });
    reg.register_function("widget_id", |w: Widget| w.id);

    let widget = reg.construct("Widget", &[AnyArg::new(99u64)]).unwrap();
    let out = reg
        .call("widget_id", &[AnyArg::from_value(&widget)])
        .unwrap();
    assert_eq!(*out.as_ref::<u64>().unwrap(), 99);
}
