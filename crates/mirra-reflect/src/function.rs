//! Type-erased, dynamically invocable operations.
//!
//! [`Function`] hides any concrete callable behind one contract: invoke with
//! a sequence of [`AnyArg`]s, get a [`Value`] back. Free functions and
//! closures come in through [`IntoFunction`]; instance operations, which
//! take the owner as an implicit leading argument, come in through
//! [`IntoMethod`]. Argument and result marshaling is resolved once at
//! registration time into monomorphized glue inside the stored closure;
//! nothing is re-derived from identities at call time.
//!
//! Parameter positions are described by [`FromArg`] and results by
//! [`IntoReturn`]. Both carry a marker type parameter so that the by-value
//! impl (any `Clone` type) and the by-pointer impl ([`Ptr<T>`]) stay
//! resolvable without overlap.

use crate::arg::AnyArg;
use crate::error::{ReflectError, Result};
use crate::ident::TypeIdent;
use crate::registry::Registry;
use crate::value::{Ptr, Value};

/// Marker for by-value parameters and results (any `Clone` type).
pub struct ByValue;

/// Marker for by-pointer parameters and results (`Ptr<T>`).
pub struct ByPtr;

// ============================================================================
// Marshaling traits
// ============================================================================

/// Extraction of one typed parameter from an [`AnyArg`].
///
/// `M` is a resolution marker ([`ByValue`] or [`ByPtr`]); callers never name
/// it explicitly.
pub trait FromArg<M>: Sized + 'static {
    /// Identity this parameter position is registered under.
    fn arg_ident() -> TypeIdent;

    /// Extract the parameter, converting through the registry if needed.
    fn from_arg(arg: &AnyArg<'_>, registry: &Registry) -> Result<Self>;
}

impl<T: Clone + 'static> FromArg<ByValue> for T {
    // By-value extraction only reads and clones, so the position is
    // registered read-only and accepts either mutability.
    fn arg_ident() -> TypeIdent {
        TypeIdent::of::<T>().as_readonly()
    }

    fn from_arg(arg: &AnyArg<'_>, registry: &Registry) -> Result<Self> {
        Ok(arg.as_ref::<T>(registry)?.clone())
    }
}

impl<T: 'static> FromArg<ByPtr> for Ptr<T> {
    fn arg_ident() -> TypeIdent {
        TypeIdent::of::<T>().as_indirect()
    }

    fn from_arg(arg: &AnyArg<'_>, _registry: &Registry) -> Result<Self> {
        arg.as_ptr::<T>()
    }
}

/// Conversion of a concrete result into an owning [`Value`].
pub trait IntoReturn<M>: 'static {
    /// Identity the result is registered under.
    fn result_ident() -> TypeIdent;

    /// Wrap the result. A `()` result becomes the void sentinel.
    fn into_return(self) -> Value;
}

impl<T: Clone + 'static> IntoReturn<ByValue> for T {
    fn result_ident() -> TypeIdent {
        TypeIdent::of::<T>()
    }

    fn into_return(self) -> Value {
        Value::new(self)
    }
}

impl<T: 'static> IntoReturn<ByPtr> for Ptr<T> {
    fn result_ident() -> TypeIdent {
        TypeIdent::of::<T>().as_indirect()
    }

    fn into_return(self) -> Value {
        // Ownership of the pointee stays with whoever the registered
        // operation says it does; the value owns only the address cell.
        unsafe { Value::from_ptr(self) }
    }
}

// ============================================================================
// Function
// ============================================================================

type InvokeFn = dyn for<'x> Fn(&Registry, &[AnyArg<'x>]) -> Result<Value> + Send + Sync;

/// A type-erased operation: concrete callable plus its identity signature.
pub struct Function {
    invoke: Box<InvokeFn>,
    arg_idents: Vec<TypeIdent>,
    owner_ident: Option<TypeIdent>,
    result_ident: TypeIdent,
}

impl Function {
    /// Wrap a free function or closure.
    pub fn new<M, F: IntoFunction<M>>(f: F) -> Self {
        f.into_function()
    }

    /// Wrap an instance operation `Fn(&mut Owner, Args...) -> R`.
    ///
    /// The owner becomes an implicit leading argument of the invocation.
    pub fn method<M, F: IntoMethod<M>>(f: F) -> Self {
        f.into_method()
    }

    pub(crate) fn from_parts(
        invoke: Box<InvokeFn>,
        arg_idents: Vec<TypeIdent>,
        owner_ident: Option<TypeIdent>,
        result_ident: TypeIdent,
    ) -> Self {
        Self {
            invoke,
            arg_idents,
            owner_ident,
            result_ident,
        }
    }

    /// Identities of the explicit parameters, owner excluded.
    pub fn arg_idents(&self) -> &[TypeIdent] {
        &self.arg_idents
    }

    /// Identity of the instance owner, present for instance operations only.
    pub fn owner_ident(&self) -> Option<TypeIdent> {
        self.owner_ident
    }

    /// Identity of the result.
    pub fn result_ident(&self) -> TypeIdent {
        self.result_ident
    }

    /// Total number of arguments an invocation must supply, owner included.
    pub fn arity(&self) -> usize {
        self.arg_idents.len() + usize::from(self.owner_ident.is_some())
    }

    /// Invoke the operation.
    ///
    /// The argument count must equal [`arity`](Self::arity) exactly; each
    /// argument is extracted per its registered identity, converting through
    /// `registry` when a single hop applies. Void operations return the void
    /// sentinel, so every call uniformly yields a [`Value`].
    pub fn call(&self, registry: &Registry, args: &[AnyArg<'_>]) -> Result<Value> {
        if args.len() != self.arity() {
            return Err(ReflectError::ArityMismatch {
                expected: self.arity(),
                got: args.len(),
            });
        }
        (self.invoke)(registry, args)
    }

    /// Non-throwing compatibility probe over the explicit parameters.
    ///
    /// True iff the count matches and every argument identity can assign to
    /// the identity registered for its position. Used for constructor
    /// overload selection; never converts, never commits to a call.
    pub fn fit_args(&self, args: &[AnyArg<'_>]) -> bool {
        args.len() == self.arg_idents.len()
            && args
                .iter()
                .zip(&self.arg_idents)
                .all(|(arg, want)| arg.ident().can_assign_to(*want))
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("owner", &self.owner_ident.map(|i| i.to_string()))
            .field(
                "args",
                &self
                    .arg_idents
                    .iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>(),
            )
            .field("result", &self.result_ident.to_string())
            .finish()
    }
}

// ============================================================================
// Registration traits
// ============================================================================

/// Conversion of a concrete free callable into a [`Function`].
///
/// Implemented for `Fn(A0..An) -> R` up to five parameters, where every
/// parameter is [`FromArg`] and the result is [`IntoReturn`]. `M` is a
/// resolution marker; inference picks it from the callable's signature.
pub trait IntoFunction<M> {
    /// Perform the wrapping.
    fn into_function(self) -> Function;
}

/// Conversion of a concrete instance operation into a [`Function`].
///
/// Implemented for `Fn(&mut Owner, A0..An) -> R` up to five explicit
/// parameters. The owner identity is recorded separately and supplied by
/// callers as the leading invocation argument.
pub trait IntoMethod<M> {
    /// Perform the wrapping.
    fn into_method(self) -> Function;
}

macro_rules! impl_callable {
    ($(($A:ident, $M:ident, $a:ident, $idx:tt)),*) => {
        impl<Fun, R, MR, $($A, $M),*> IntoFunction<(R, MR, $(($A, $M)),*)> for Fun
        where
            Fun: Fn($($A),*) -> R + Send + Sync + 'static,
            R: IntoReturn<MR>,
            $($A: FromArg<$M>,)*
        {
            fn into_function(self) -> Function {
                let arg_idents = vec![$(<$A as FromArg<$M>>::arg_ident()),*];
                let invoke = Box::new(move |_registry: &Registry, _args: &[AnyArg<'_>]| {
                    $(let $a = <$A as FromArg<$M>>::from_arg(&_args[$idx], _registry)?;)*
                    Ok((self)($($a),*).into_return())
                });
                Function::from_parts(
                    invoke,
                    arg_idents,
                    None,
                    <R as IntoReturn<MR>>::result_ident(),
                )
            }
        }

        impl<Fun, Own, R, MR, $($A, $M),*> IntoMethod<(Own, R, MR, $(($A, $M)),*)> for Fun
        where
            Fun: for<'o> Fn(&'o mut Own, $($A),*) -> R + Send + Sync + 'static,
            Own: 'static,
            R: IntoReturn<MR>,
            $($A: FromArg<$M>,)*
        {
            fn into_method(self) -> Function {
                let arg_idents = vec![$(<$A as FromArg<$M>>::arg_ident()),*];
                let invoke = Box::new(move |_registry: &Registry, _args: &[AnyArg<'_>]| {
                    let owner = _args[0].owner_addr::<Own>()?;
                    $(let $a = <$A as FromArg<$M>>::from_arg(&_args[$idx + 1], _registry)?;)*
                    // Exclusive access to the owner for the duration of the
                    // call is the invoker's contract.
                    let result = (self)(unsafe { &mut *owner }, $($a),*);
                    Ok(result.into_return())
                });
                Function::from_parts(
                    invoke,
                    arg_idents,
                    Some(TypeIdent::of::<Own>()),
                    <R as IntoReturn<MR>>::result_ident(),
                )
            }
        }
    };
}

impl_callable!();
impl_callable!((A0, M0, a0, 0));
impl_callable!((A0, M0, a0, 0), (A1, M1, a1, 1));
impl_callable!((A0, M0, a0, 0), (A1, M1, a1, 1), (A2, M2, a2, 2));
impl_callable!(
    (A0, M0, a0, 0),
    (A1, M1, a1, 1),
    (A2, M2, a2, 2),
    (A3, M3, a3, 3)
);
impl_callable!(
    (A0, M0, a0, 0),
    (A1, M1, a1, 1),
    (A2, M2, a2, 2),
    (A3, M3, a3, 3),
    (A4, M4, a4, 4)
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn double(v: i32) -> i32 {
        v * 2
    }

    #[test]
    fn test_free_function_roundtrip() {
        let reg = Registry::new();
        let f = Function::new(double);
        let out = f.call(&reg, &[AnyArg::new(21i32)]).unwrap();
        assert_eq!(*out.as_ref::<i32>().unwrap(), 42);
        assert_eq!(*out.as_ref::<i32>().unwrap(), double(21));
    }

    #[test]
    fn test_void_result_is_sentinel() {
        let reg = Registry::new();
        let f = Function::new(|_v: i32| {});
        let out = f.call(&reg, &[AnyArg::new(1i32)]).unwrap();
        assert!(out.is_void());
    }

    #[test]
    fn test_arity_mismatch() {
        let reg = Registry::new();
        let f = Function::new(double);
        assert!(matches!(
            f.call(&reg, &[]),
            Err(ReflectError::ArityMismatch {
                expected: 1,
                got: 0
            })
        ));
        assert!(matches!(
            f.call(&reg, &[AnyArg::new(1i32), AnyArg::new(2i32)]),
            Err(ReflectError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_method_mutates_owner() {
        struct Counter {
            count: i32,
        }
        let reg = Registry::new();
        let f = Function::method(|c: &mut Counter, n: i32| {
            c.count += n;
            c.count
        });
        assert_eq!(f.owner_ident(), Some(TypeIdent::of::<Counter>()));
        assert_eq!(f.arity(), 2);

        let mut counter = Counter { count: 5 };
        let out = f
            .call(&reg, &[AnyArg::from_mut(&mut counter), AnyArg::new(3i32)])
            .unwrap();
        assert_eq!(*out.as_ref::<i32>().unwrap(), 8);
        assert_eq!(counter.count, 8);
    }

    #[test]
    fn test_shared_owner_view_is_rejected() {
        #[derive(Clone)]
        struct Gauge {
            level: i32,
        }
        let reg = Registry::new();
        let f = Function::method(|g: &mut Gauge, n: i32| {
            g.level += n;
            g.level
        });

        let mut owned = Value::new(Gauge { level: 0 });
        // A shared borrow of the container yields a read-only owner view;
        // mutation must go through the exclusive borrow.
        assert!(matches!(
            f.call(&reg, &[AnyArg::from_value(&owned), AnyArg::new(1i32)]),
            Err(ReflectError::TypeMismatch { .. })
        ));

        let out = f
            .call(
                &reg,
                &[AnyArg::from_value_mut(&mut owned), AnyArg::new(1i32)],
            )
            .unwrap();
        assert_eq!(*out.as_ref::<i32>().unwrap(), 1);
        assert_eq!(owned.as_ref::<Gauge>().unwrap().level, 1);
    }

    #[test]
    fn test_fit_args_truth_table() {
        let f = Function::new(|_a: i32, _b: String| {});

        // Count mismatch is always false.
        assert!(!f.fit_args(&[]));
        assert!(!f.fit_args(&[AnyArg::new(1i32)]));

        // Exact identities fit.
        assert!(f.fit_args(&[AnyArg::new(1i32), AnyArg::new(String::new())]));

        // Wrong base does not.
        assert!(!f.fit_args(&[AnyArg::new(1i64), AnyArg::new(String::new())]));

        // By-value positions are read-only, so a borrowed argument fits too.
        let s = String::new();
        assert!(f.fit_args(&[AnyArg::new(1i32), AnyArg::from_ref(&s)]));
    }

    #[test]
    fn test_pointer_parameter_and_result() {
        let reg = Registry::new();
        let f = Function::new(|p: Ptr<i32>| -> i32 { (unsafe { *p.as_ref() }) * 10 });
        assert!(f.arg_idents()[0].is_indirect());

        let mut target = 4i32;
        let arg = unsafe { AnyArg::from_ptr(Ptr::from_mut(&mut target)) };
        let out = f.call(&reg, &[arg]).unwrap();
        assert_eq!(*out.as_ref::<i32>().unwrap(), 40);
    }

    #[test]
    fn test_pointer_result_identity() {
        let f = Function::new(|| -> Ptr<i32> { Ptr::from_raw(std::ptr::null_mut()) });
        assert!(f.result_ident().is_indirect());
    }
}
