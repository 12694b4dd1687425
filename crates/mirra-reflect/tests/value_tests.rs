//! Erased value lifecycle across the public surface: ownership, copies,
//! moves, and one-level indirection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mirra_reflect::{ReflectError, Value};

#[derive(Clone)]
struct Tracked {
    payload: String,
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_clone_is_independent() {
    let drops = Arc::new(AtomicUsize::new(0));
    let a = Value::new(Tracked {
        payload: String::from("one"),
        drops: drops.clone(),
    });
    let mut b = a.try_clone().unwrap();

    b.as_mut::<Tracked>().unwrap().payload = String::from("two");
    assert_eq!(a.as_ref::<Tracked>().unwrap().payload, "one");

    drop(a);
    drop(b);
    // The instance handed to Value::new was moved in, so exactly the two
    // stored instances dropped.
    assert_eq!(drops.load(Ordering::SeqCst), 2);
}

#[test]
fn test_move_leaves_source_invalid() {
    let mut a = Value::new(String::from("payload"));
    let b = Value::move_from(&mut a).unwrap();

    assert!(!a.is_valid());
    assert!(b.is_valid());
    assert_eq!(b.as_ref::<String>().unwrap(), "payload");
    assert!(matches!(
        a.as_ref::<String>(),
        Err(ReflectError::InvalidValue)
    ));
    assert!(matches!(
        Value::move_from(&mut a),
        Err(ReflectError::InvalidValue)
    ));
}

#[test]
fn test_double_drop_never_happens_after_move() {
    let drops = Arc::new(AtomicUsize::new(0));
    let mut a = Value::new(Tracked {
        payload: String::new(),
        drops: drops.clone(),
    });
    let b = Value::move_from(&mut a).unwrap();
    drop(a);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(b);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_address_of_observes_later_mutation() {
    let mut v = Value::new(10i32);
    let addr = v.address_of().unwrap();

    *v.as_mut::<i32>().unwrap() = 20;

    let seen = unsafe { addr.deref() }.unwrap();
    assert_eq!(*seen.as_ref::<i32>().unwrap(), 20);
}

#[test]
fn test_opaque_value_moves_but_does_not_copy() {
    struct Token(#[allow(dead_code)] u32);

    let mut a = Value::new_opaque(Token(7));
    assert!(matches!(
        a.try_clone(),
        Err(ReflectError::UnsupportedOperation { .. })
    ));

    let b = Value::move_from(&mut a).unwrap();
    assert!(b.is_valid());
}

#[test]
fn test_void_sentinel() {
    let v = Value::void();
    assert!(v.is_void());
    assert!(!v.ident().is_indirect());
    assert!(v.try_clone().unwrap().is_void());
}
