//! Call-site argument wrapper.
//!
//! [`AnyArg`] gives every invocation argument a uniform shape: a reference
//! view plus, when the argument was supplied by value, an owned temporary
//! backing it. Typed extraction first tries the identity directly and then
//! falls back to a single implicit-conversion hop through the registry,
//! invoking the target type's matching on-stack constructor and caching the
//! result for the wrapper's lifetime. Conversions never chain through an
//! intermediate type: the nested constructor match is a strict-fit probe.

use once_cell::unsync::OnceCell;

use crate::error::{ReflectError, Result};
use crate::ident::TypeIdent;
use crate::registry::Registry;
use crate::value::{Ptr, Value, ValueRef};

/// A single invocation argument: borrowed view or owned temporary.
pub struct AnyArg<'a> {
    /// Owned backing storage when the argument was supplied by value.
    temp: Option<Value>,
    /// The reference view every consumer goes through. Points into `temp`
    /// when that is set; heap storage keeps the address stable across moves
    /// of the wrapper.
    view: ValueRef<'a>,
    /// Cached single-hop conversion result.
    converted: OnceCell<Value>,
}

impl<'a> AnyArg<'a> {
    /// Wrap a by-value argument in an owned temporary.
    pub fn new<T: Clone + 'static>(value: T) -> Self {
        let temp = Value::new(value);
        let view = unsafe { ValueRef::from_raw_parts(temp.addr(), temp.ident()) };
        Self {
            temp: Some(temp),
            view,
            converted: OnceCell::new(),
        }
    }

    /// Borrow a shared reference; the view identity is read-only.
    pub fn from_ref<T: 'static>(value: &'a T) -> Self {
        Self::from(ValueRef::from_ref(value))
    }

    /// Borrow a mutable reference; the view identity is mutable.
    pub fn from_mut<T: 'static>(value: &'a mut T) -> Self {
        Self::from(ValueRef::from_mut(value))
    }

    /// Borrow an owning value; the view identity is read-only.
    ///
    /// Suitable for by-value and read positions. Owner positions of
    /// instance operations need [`from_value_mut`](Self::from_value_mut).
    pub fn from_value(value: &'a Value) -> Self {
        Self::from(value.as_value_ref())
    }

    /// Mutably borrow an owning value; the view identity is mutable.
    pub fn from_value_mut(value: &'a mut Value) -> Self {
        Self::from(value.as_value_ref_mut())
    }

    /// Wrap an address as an owned indirect temporary.
    ///
    /// # Safety
    /// The pointee must stay live for as long as the callee may dereference
    /// the address.
    pub unsafe fn from_ptr<T: 'static>(ptr: Ptr<T>) -> Self {
        let temp = unsafe { Value::from_ptr(ptr) };
        let view = unsafe { ValueRef::from_raw_parts(temp.addr(), temp.ident()) };
        Self {
            temp: Some(temp),
            view,
            converted: OnceCell::new(),
        }
    }

    /// The identity of the wrapped argument.
    pub fn ident(&self) -> TypeIdent {
        self.view.ident()
    }

    /// The underlying reference view.
    pub fn value_ref(&self) -> ValueRef<'a> {
        self.view
    }

    /// Whether this wrapper owns its backing storage.
    pub fn is_owned(&self) -> bool {
        self.temp.is_some()
    }

    /// Typed access, converting through the registry when identities differ.
    ///
    /// Direct path: the view identity assigns to read-only `T`. Fallback:
    /// look up `T`'s type metadata in `registry` and invoke its on-stack
    /// constructor that fits this argument, caching the constructed
    /// temporary. Exactly one hop; a miss anywhere reports `ConversionFailed`
    /// naming both identities.
    pub fn as_ref<T: 'static>(&self, registry: &Registry) -> Result<&T> {
        if self.view.ident().can_assign_to(TypeIdent::of::<T>().as_readonly()) {
            return self.view.as_ref::<T>();
        }
        let target = TypeIdent::of::<T>();
        let conversion_failed = || ReflectError::ConversionFailed {
            from: self.view.ident().to_string(),
            to: target.to_string(),
        };
        let constructed = self.converted.get_or_try_init(|| {
            let ty = registry
                .get_type_by_ident(target)
                .map_err(|_| conversion_failed())?;
            ty.construct_on_stack(registry, &[AnyArg::from(self.view)])
                .map_err(|_| conversion_failed())
        })?;
        constructed.as_ref::<T>()
    }

    /// Read the argument as a typed pointer. Indirect identities only; no
    /// conversion fallback.
    pub fn as_ptr<T: 'static>(&self) -> Result<Ptr<T>> {
        self.view.as_ptr::<T>()
    }

    /// Address of the implicit instance-owner argument.
    ///
    /// Exact mutable match only: owners are never converted.
    pub(crate) fn owner_addr<T: 'static>(&self) -> Result<*mut T> {
        if self.view.is_null() {
            return Err(ReflectError::InvalidValue);
        }
        let want = TypeIdent::of::<T>();
        if !self.view.ident().can_assign_to(want) {
            return Err(ReflectError::TypeMismatch {
                from: self.view.ident().to_string(),
                to: want.to_string(),
            });
        }
        Ok(self.view.addr().cast::<T>())
    }
}

impl<'a> From<ValueRef<'a>> for AnyArg<'a> {
    fn from(view: ValueRef<'a>) -> Self {
        Self {
            temp: None,
            view,
            converted: OnceCell::new(),
        }
    }
}

impl std::fmt::Debug for AnyArg<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyArg")
            .field("ident", &self.ident().to_string())
            .field("owned", &self.is_owned())
            .finish()
    }
}
