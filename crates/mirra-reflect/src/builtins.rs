//! Stock registry of primitive types.
//!
//! [`basic_registry`] builds a registry pre-populated with the common
//! primitives and their widening conversions, meant to be wrapped in an
//! `Arc` and shared as the base layer of per-context registries. Only
//! conversions that never lose information are registered; anything lossy
//! stays an explicit call at the edge.

use crate::error::Result;
use crate::registry::Registry;

/// A registry pre-populated with primitive types.
///
/// Registered names: `int`, `long`, `ulong`, `float`, `double`, `bool`,
/// `string`. Widening conversions: `int` to `long`, `int` to `float`,
/// `int` to `double`, `float` to `double`.
pub fn basic_registry() -> Result<Registry> {
    let mut reg = Registry::new();

    reg.register_type::<i32>("int", &[])?
        .add_constructor(|| 0i32)
        .add_constructor(|v: i32| v);

    reg.register_type::<i64>("long", &[])?
        .add_constructor(|| 0i64)
        .add_constructor(|v: i64| v)
        .add_constructor(|v: i32| i64::from(v));

    reg.register_type::<u64>("ulong", &[])?
        .add_constructor(|| 0u64)
        .add_constructor(|v: u64| v);

    reg.register_type::<f32>("float", &[])?
        .add_constructor(|| 0f32)
        .add_constructor(|v: f32| v)
        .add_constructor(|v: i32| v as f32);

    reg.register_type::<f64>("double", &[])?
        .add_constructor(|| 0f64)
        .add_constructor(|v: f64| v)
        .add_constructor(|v: f32| f64::from(v))
        .add_constructor(|v: i32| f64::from(v));

    reg.register_type::<bool>("bool", &[])?
        .add_constructor(|| false)
        .add_constructor(|v: bool| v);

    reg.register_type::<String>("string", &[])?
        .add_constructor(String::new)
        .add_constructor(|s: String| s)
        .add_constructor(|n: usize, c: char| {
            std::iter::repeat(c).take(n).collect::<String>()
        })
        .add_method("len", |s: &mut String| s.len() as u64)
        .add_method("capacity", |s: &mut String| s.capacity() as u64)
        .add_method("is_empty", |s: &mut String| s.is_empty())
        .add_method("push", |s: &mut String, c: char| s.push(c))
        .add_method("clear", |s: &mut String| s.clear());

    Ok(reg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arg::AnyArg;

    #[test]
    fn test_all_primitives_resolve() {
        let reg = basic_registry().unwrap();
        for name in ["int", "long", "ulong", "float", "double", "bool", "string"] {
            assert!(reg.get_type(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn test_default_construction() {
        let reg = basic_registry().unwrap();
        let v = reg.construct("int", &[]).unwrap();
        assert_eq!(*v.as_ref::<i32>().unwrap(), 0);
        let s = reg.construct("string", &[]).unwrap();
        assert_eq!(s.as_ref::<String>().unwrap(), "");
    }

    #[test]
    fn test_widening_conversions() {
        let reg = basic_registry().unwrap();

        let arg = AnyArg::new(5i32);
        assert_eq!(*arg.as_ref::<i64>(&reg).unwrap(), 5);

        let arg = AnyArg::new(5i32);
        assert_eq!(*arg.as_ref::<f64>(&reg).unwrap(), 5.0);

        let arg = AnyArg::new(2.5f32);
        assert_eq!(*arg.as_ref::<f64>(&reg).unwrap(), 2.5);
    }

    #[test]
    fn test_no_narrowing_conversion() {
        let reg = basic_registry().unwrap();
        let arg = AnyArg::new(5i64);
        assert!(arg.as_ref::<i32>(&reg).is_err());
        let arg = AnyArg::new(2.5f64);
        assert!(arg.as_ref::<f32>(&reg).is_err());
    }

    #[test]
    fn test_repeated_char_constructor() {
        let reg = basic_registry().unwrap();
        let s = reg
            .construct("string", &[AnyArg::new(3usize), AnyArg::new('x')])
            .unwrap();
        assert_eq!(s.as_ref::<String>().unwrap(), "xxx");
    }

    #[test]
    fn test_string_methods() {
        let reg = basic_registry().unwrap();
        let ty = reg.get_type("string").unwrap();
        let mut s = String::from("ab");

        let out = ty
            .function("len")
            .unwrap()
            .call(&reg, &[AnyArg::from_mut(&mut s)])
            .unwrap();
        assert_eq!(*out.as_ref::<u64>().unwrap(), 2);

        let cap = ty
            .function("capacity")
            .unwrap()
            .call(&reg, &[AnyArg::from_mut(&mut s)])
            .unwrap();
        assert!(*cap.as_ref::<u64>().unwrap() >= 2);

        ty.function("push")
            .unwrap()
            .call(&reg, &[AnyArg::from_mut(&mut s), AnyArg::new('c')])
            .unwrap();
        assert_eq!(s, "abc");

        ty.function("clear")
            .unwrap()
            .call(&reg, &[AnyArg::from_mut(&mut s)])
            .unwrap();
        assert!(s.is_empty());
    }
}
