//! Named member access.
//!
//! A [`Field`] erases a projection from an owner to one of its members. It
//! is registered from a plain `fn(&mut Owner) -> &mut F` and offers typed
//! read and write through the same [`AnyArg`] surface functions use, so an
//! inspector can walk an object it has no static knowledge of.

use crate::arg::AnyArg;
use crate::error::Result;
use crate::ident::TypeIdent;
use crate::registry::Registry;
use crate::value::Value;

type GetFn = dyn for<'x> Fn(&AnyArg<'x>) -> Result<Value> + Send + Sync;
type SetFn = dyn for<'x> Fn(&Registry, &AnyArg<'x>, &AnyArg<'x>) -> Result<()> + Send + Sync;

/// Type-erased access to one member of a registered type.
pub struct Field {
    get: Box<GetFn>,
    set: Box<SetFn>,
    owner_ident: TypeIdent,
    field_ident: TypeIdent,
}

impl Field {
    /// Register a member through its projection.
    ///
    /// The projection must return a member of the owner itself, not a
    /// temporary; both accessors resolve it on every call.
    pub fn new<O, F>(project: fn(&mut O) -> &mut F) -> Self
    where
        O: 'static,
        F: Clone + 'static,
    {
        let get = Box::new(move |owner: &AnyArg<'_>| -> Result<Value> {
            let owner = owner.owner_addr::<O>()?;
            Ok(Value::new(project(unsafe { &mut *owner }).clone()))
        });
        let set = Box::new(
            move |registry: &Registry, owner: &AnyArg<'_>, value: &AnyArg<'_>| -> Result<()> {
                let owner = owner.owner_addr::<O>()?;
                let incoming = value.as_ref::<F>(registry)?.clone();
                *project(unsafe { &mut *owner }) = incoming;
                Ok(())
            },
        );
        Self {
            get,
            set,
            owner_ident: TypeIdent::of::<O>(),
            field_ident: TypeIdent::of::<F>(),
        }
    }

    /// Identity of the owning type.
    pub fn owner_ident(&self) -> TypeIdent {
        self.owner_ident
    }

    /// Identity of the member.
    pub fn field_ident(&self) -> TypeIdent {
        self.field_ident
    }

    /// Read the member out of `owner` as an owning copy.
    pub fn get_value(&self, owner: &AnyArg<'_>) -> Result<Value> {
        (self.get)(owner)
    }

    /// Write `value` into the member of `owner`.
    ///
    /// The incoming value goes through the usual typed-access rules,
    /// including the single-hop registry conversion.
    pub fn set_value(&self, registry: &Registry, owner: &AnyArg<'_>, value: &AnyArg<'_>) -> Result<()> {
        (self.set)(registry, owner, value)
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("owner", &self.owner_ident.to_string())
            .field("field", &self.field_ident.to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReflectError;
    use crate::registry::Registry;

    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_get_and_set() {
        let reg = Registry::new();
        let x = Field::new(|p: &mut Point| &mut p.x);
        assert_eq!(x.owner_ident(), TypeIdent::of::<Point>());
        assert_eq!(x.field_ident(), TypeIdent::of::<i32>());

        let mut p = Point { x: 1, y: 2 };
        let owner = AnyArg::from_mut(&mut p);
        let read = x.get_value(&owner).unwrap();
        assert_eq!(*read.as_ref::<i32>().unwrap(), 1);

        x.set_value(&reg, &owner, &AnyArg::new(10i32)).unwrap();
        drop(owner);
        assert_eq!(p.x, 10);
        assert_eq!(p.y, 2);
    }

    #[test]
    fn test_owner_must_match() {
        let reg = Registry::new();
        let x = Field::new(|p: &mut Point| &mut p.x);
        let mut wrong = 5i64;
        let owner = AnyArg::from_mut(&mut wrong);
        assert!(matches!(
            x.get_value(&owner),
            Err(ReflectError::TypeMismatch { .. })
        ));
        assert!(matches!(
            x.set_value(&reg, &owner, &AnyArg::new(1i32)),
            Err(ReflectError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_set_converts_through_registry() {
        let mut reg = Registry::new();
        reg.register_type::<i64>("i64", &[])
            .unwrap()
            .add_constructor(|v: i32| v as i64);

        struct Wide {
            n: i64,
        }
        let f = Field::new(|w: &mut Wide| &mut w.n);
        let mut w = Wide { n: 0 };
        let owner = AnyArg::from_mut(&mut w);
        f.set_value(&reg, &owner, &AnyArg::new(7i32)).unwrap();
        drop(owner);
        assert_eq!(w.n, 7);
    }

    #[test]
    fn test_readonly_owner_rejected() {
        let x = Field::new(|p: &mut Point| &mut p.x);
        let p = Point { x: 1, y: 2 };
        let owner = AnyArg::from_ref(&p);
        assert!(matches!(
            x.get_value(&owner),
            Err(ReflectError::TypeMismatch { .. })
        ));
    }
}
