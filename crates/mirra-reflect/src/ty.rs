//! Per-type metadata: constructors, operations, members.
//!
//! A [`Type`] is the registry-side record of one registered Rust type. It
//! owns the type's constructor overload set, its named operations and
//! members, the declared parent names, and the lifecycle hooks (layout and
//! heap destroy) needed to manage instances without static knowledge.
//!
//! A [`Constructor`] erases one concrete factory into three placement
//! strategies built from the same callable: owning result, caller-released
//! heap allocation, and write into caller-provided storage. Overload
//! selection is a strict compatibility probe over the argument identities;
//! constructor arguments are never themselves converted, which is what keeps
//! implicit conversion at exactly one hop.

use std::alloc::Layout;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::arg::AnyArg;
use crate::error::{ReflectError, Result};
use crate::field::Field;
use crate::function::{Function, IntoFunction, IntoMethod};
use crate::ident::TypeIdent;
use crate::registry::Registry;
use crate::value::Value;

// ============================================================================
// Constructor
// ============================================================================

type StackCtor = dyn for<'x> Fn(&Registry, &[AnyArg<'x>]) -> Result<Value> + Send + Sync;
type HeapCtor = dyn for<'x> Fn(&Registry, &[AnyArg<'x>]) -> Result<*mut u8> + Send + Sync;
type PlaceCtor = dyn for<'x> Fn(&Registry, *mut u8, &[AnyArg<'x>]) -> Result<()> + Send + Sync;

/// One erased constructor overload with its three placement strategies.
pub struct Constructor {
    arg_idents: Vec<TypeIdent>,
    result_ident: TypeIdent,
    on_stack: Box<StackCtor>,
    on_heap: Box<HeapCtor>,
    in_place: Box<PlaceCtor>,
}

impl Constructor {
    /// Wrap a concrete factory `Fn(Args...) -> T`.
    pub fn new<M, C: IntoConstructor<M>>(factory: C) -> Self {
        factory.into_constructor()
    }

    /// Identities of the factory parameters.
    pub fn arg_idents(&self) -> &[TypeIdent] {
        &self.arg_idents
    }

    /// Identity of the constructed type.
    pub fn result_ident(&self) -> TypeIdent {
        self.result_ident
    }

    /// Strict compatibility probe: count and per-position assignability.
    pub fn fit_args(&self, args: &[AnyArg<'_>]) -> bool {
        args.len() == self.arg_idents.len()
            && args
                .iter()
                .zip(&self.arg_idents)
                .all(|(arg, want)| arg.ident().can_assign_to(*want))
    }

    fn check_arity(&self, args: &[AnyArg<'_>]) -> Result<()> {
        if args.len() != self.arg_idents.len() {
            return Err(ReflectError::ArityMismatch {
                expected: self.arg_idents.len(),
                got: args.len(),
            });
        }
        Ok(())
    }

    /// Construct an owning value.
    ///
    /// The argument count must equal the factory's parameter count exactly.
    pub fn construct_on_stack(&self, registry: &Registry, args: &[AnyArg<'_>]) -> Result<Value> {
        self.check_arity(args)?;
        (self.on_stack)(registry, args)
    }

    /// Construct on the heap; the returned address is owned by the caller.
    ///
    /// Release it through [`Type::destroy_heap`] of the constructed type.
    pub fn construct_on_heap(&self, registry: &Registry, args: &[AnyArg<'_>]) -> Result<*mut u8> {
        self.check_arity(args)?;
        (self.on_heap)(registry, args)
    }

    /// Construct directly into caller-provided storage.
    ///
    /// # Safety
    /// `dst` must be valid for writes of the constructed type's layout and
    /// must not hold a live object of that type.
    pub unsafe fn construct_at(
        &self,
        registry: &Registry,
        dst: *mut u8,
        args: &[AnyArg<'_>],
    ) -> Result<()> {
        self.check_arity(args)?;
        (self.in_place)(registry, dst, args)
    }
}

impl std::fmt::Debug for Constructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constructor")
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

/// Conversion of a concrete factory into a [`Constructor`].
///
/// Implemented for `Fn(A0..An) -> T` up to five parameters; `T` must be
/// `Clone` so the owning strategy can produce a full-lifecycle value. `M` is
/// a resolution marker picked by inference.
pub trait IntoConstructor<M> {
    /// Perform the wrapping.
    fn into_constructor(self) -> Constructor;
}

macro_rules! impl_constructor {
    ($(($A:ident, $M:ident, $a:ident, $idx:tt)),*) => {
        impl<Fun, T, $($A, $M),*> IntoConstructor<(T, $(($A, $M)),*)> for Fun
        where
            Fun: Fn($($A),*) -> T + Send + Sync + 'static,
            T: Clone + 'static,
            $($A: crate::function::FromArg<$M>,)*
        {
            fn into_constructor(self) -> Constructor {
                let factory = Arc::new(self);
                let arg_idents = vec![$(<$A as crate::function::FromArg<$M>>::arg_ident()),*];

                let on_stack = {
                    let factory = factory.clone();
                    Box::new(move |_registry: &Registry, _args: &[AnyArg<'_>]| {
                        $(let $a = <$A as crate::function::FromArg<$M>>::from_arg(&_args[$idx], _registry)?;)*
                        Ok(Value::new((*factory)($($a),*)))
                    })
                };
                let on_heap = {
                    let factory = factory.clone();
                    Box::new(move |_registry: &Registry, _args: &[AnyArg<'_>]| {
                        $(let $a = <$A as crate::function::FromArg<$M>>::from_arg(&_args[$idx], _registry)?;)*
                        Ok(Box::into_raw(Box::new((*factory)($($a),*))).cast::<u8>())
                    })
                };
                let in_place = Box::new(move |_registry: &Registry, dst: *mut u8, _args: &[AnyArg<'_>]| {
                    $(let $a = <$A as crate::function::FromArg<$M>>::from_arg(&_args[$idx], _registry)?;)*
                    unsafe { std::ptr::write(dst.cast::<T>(), (*factory)($($a),*)) };
                    Ok(())
                });

                Constructor {
                    arg_idents,
                    result_ident: TypeIdent::of::<T>(),
                    on_stack,
                    on_heap,
                    in_place,
                }
            }
        }
    };
}

impl_constructor!();
impl_constructor!((A0, M0, a0, 0));
impl_constructor!((A0, M0, a0, 0), (A1, M1, a1, 1));
impl_constructor!((A0, M0, a0, 0), (A1, M1, a1, 1), (A2, M2, a2, 2));
impl_constructor!(
    (A0, M0, a0, 0),
    (A1, M1, a1, 1),
    (A2, M2, a2, 2),
    (A3, M3, a3, 3)
);
impl_constructor!(
    (A0, M0, a0, 0),
    (A1, M1, a1, 1),
    (A2, M2, a2, 2),
    (A3, M3, a3, 3),
    (A4, M4, a4, 4)
);

// ============================================================================
// Type
// ============================================================================

unsafe fn destroy_heap_impl<T>(addr: *mut u8) {
    drop(unsafe { Box::from_raw(addr.cast::<T>()) });
}

/// Registry record for one registered type.
pub struct Type {
    ident: TypeIdent,
    name: String,
    parents: Vec<String>,
    constructors: Vec<Constructor>,
    functions: FxHashMap<String, Function>,
    fields: FxHashMap<String, Field>,
    layout: Layout,
    drop_heap: unsafe fn(*mut u8),
}

impl Type {
    pub(crate) fn new<T: 'static>(name: &str, parents: &[&str]) -> Self {
        Self {
            ident: TypeIdent::of::<T>(),
            name: name.to_owned(),
            parents: parents.iter().map(|p| (*p).to_owned()).collect(),
            constructors: Vec::new(),
            functions: FxHashMap::default(),
            fields: FxHashMap::default(),
            layout: Layout::new::<T>(),
            drop_heap: destroy_heap_impl::<T>,
        }
    }

    /// Identity of the described type.
    pub fn ident(&self) -> TypeIdent {
        self.ident
    }

    /// Name the type was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parent names. Purely descriptive: parents contribute no
    /// operations, members or constructors to this record.
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Memory layout of the described type, for in-place construction.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Register a constructor overload. Overloads keep registration order,
    /// which is also overload-selection order.
    pub fn add_constructor<M, C: IntoConstructor<M>>(&mut self, factory: C) -> &mut Self {
        let ctor = factory.into_constructor();
        debug_assert!(
            ctor.result_ident().same_base(self.ident),
            "constructor result does not match the registered type"
        );
        self.constructors.push(ctor);
        self
    }

    /// Register a named instance operation `Fn(&mut T, Args...) -> R`.
    pub fn add_method<M, F: IntoMethod<M>>(&mut self, name: &str, f: F) -> &mut Self {
        self.functions.insert(name.to_owned(), Function::method(f));
        self
    }

    /// Register a named associated operation with no implicit owner.
    pub fn add_function<M, F: IntoFunction<M>>(&mut self, name: &str, f: F) -> &mut Self {
        self.functions.insert(name.to_owned(), Function::new(f));
        self
    }

    /// Register a named member through its projection.
    pub fn add_field<O, F>(&mut self, name: &str, project: fn(&mut O) -> &mut F) -> &mut Self
    where
        O: 'static,
        F: Clone + 'static,
    {
        debug_assert!(
            TypeIdent::of::<O>().same_base(self.ident),
            "field owner does not match the registered type"
        );
        self.fields.insert(name.to_owned(), Field::new(project));
        self
    }

    /// Look up a named operation.
    pub fn function(&self, name: &str) -> Result<&Function> {
        self.functions
            .get(name)
            .ok_or_else(|| ReflectError::NotRegistered {
                name: format!("{}::{name}", self.name),
            })
    }

    /// Look up a named member.
    pub fn field(&self, name: &str) -> Result<&Field> {
        self.fields
            .get(name)
            .ok_or_else(|| ReflectError::NotRegistered {
                name: format!("{}::{name}", self.name),
            })
    }

    /// Iterate the named operations, in no particular order.
    pub fn functions(&self) -> impl Iterator<Item = (&str, &Function)> {
        self.functions.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Iterate the named members, in no particular order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// The constructor overload set, in registration order.
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// First registered overload that fits the arguments, if any.
    pub fn find_constructor(&self, args: &[AnyArg<'_>]) -> Option<&Constructor> {
        self.constructors.iter().find(|c| c.fit_args(args))
    }

    fn matching_constructor(&self, args: &[AnyArg<'_>]) -> Result<&Constructor> {
        self.find_constructor(args)
            .ok_or_else(|| ReflectError::NoMatchingConstructor {
                type_name: self.name.clone(),
            })
    }

    /// Construct an owning instance with the first fitting overload.
    pub fn construct_on_stack(&self, registry: &Registry, args: &[AnyArg<'_>]) -> Result<Value> {
        self.matching_constructor(args)?
            .construct_on_stack(registry, args)
    }

    /// Construct on the heap with the first fitting overload.
    ///
    /// The result is an indirect value holding the instance address; the
    /// instance itself is owned by the caller and must be released through
    /// [`destroy_heap`](Self::destroy_heap).
    pub fn construct_on_heap(&self, registry: &Registry, args: &[AnyArg<'_>]) -> Result<Value> {
        let addr = self
            .matching_constructor(args)?
            .construct_on_heap(registry, args)?;
        Ok(unsafe { Value::from_addr(addr, self.ident) })
    }

    /// Construct into caller-provided storage with the first fitting
    /// overload.
    ///
    /// # Safety
    /// `dst` must be valid for writes of [`layout`](Self::layout) and must
    /// not hold a live object.
    pub unsafe fn construct_at(
        &self,
        registry: &Registry,
        dst: *mut u8,
        args: &[AnyArg<'_>],
    ) -> Result<()> {
        self.matching_constructor(args)?
            .construct_at(registry, dst, args)
    }

    /// Drop and free a heap instance produced by
    /// [`construct_on_heap`](Self::construct_on_heap).
    ///
    /// # Safety
    /// `addr` must come from `construct_on_heap` of this same type and must
    /// not be used afterwards.
    pub unsafe fn destroy_heap(&self, addr: *mut u8) {
        (self.drop_heap)(addr);
    }
}

impl std::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Type")
            .field("name", &self.name)
            .field("parents", &self.parents)
            .field("constructors", &self.constructors.len())
            .field("functions", &self.functions.len())
            .field("fields", &self.fields.len())
            .finish()
    }
}
