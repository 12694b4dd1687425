//! Type-erased value storage.
//!
//! [`ValueRef`] is a non-owning view: a raw address paired with its
//! [`TypeIdent`], offering identity-checked typed access and nothing else.
//! [`Value`] owns its storage and carries a table of lifecycle operations
//! (destroy, copy-construct, copy-assign, move-assign) captured for the
//! concrete type at construction time, so the value stays self-sufficient
//! after the static type is erased.
//!
//! The identity check guarantees that a successful `as_ref`/`as_mut` refers
//! to storage of the requested type. Exclusivity of mutable access across
//! simultaneous dynamic views of the same storage cannot be tracked here and
//! stays with the caller, which is why the mutable and dereferencing entry
//! points are `unsafe`.

use std::fmt;
use std::marker::PhantomData;
use std::ptr;

use crate::error::{ReflectError, Result};
use crate::ident::TypeIdent;

// ============================================================================
// Ptr
// ============================================================================

/// Explicit one-level indirection carrier for registered signatures.
///
/// A registered operation that accepts or returns an address declares it as
/// `Ptr<T>`; its identity is the indirect variant of `T`'s. Deliberately
/// neither `Clone` nor `Copy` so that argument-marshaling trait resolution
/// stays unambiguous between by-value and by-pointer parameters.
#[repr(transparent)]
pub struct Ptr<T>(*mut T);

impl<T> Ptr<T> {
    /// Wrap a raw address.
    pub fn from_raw(raw: *mut T) -> Self {
        Self(raw)
    }

    /// Take the address of a live object.
    pub fn from_mut(target: &mut T) -> Self {
        Self(target as *mut T)
    }

    /// Unwrap into the raw address.
    pub fn into_raw(self) -> *mut T {
        self.0
    }

    /// Whether the carried address is null.
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Borrow the pointee.
    ///
    /// # Safety
    /// The pointee must be live, properly initialized, and not mutated for
    /// the duration of the borrow.
    pub unsafe fn as_ref(&self) -> &T {
        &*self.0
    }

    /// Mutably borrow the pointee.
    ///
    /// # Safety
    /// The pointee must be live, properly initialized, and not otherwise
    /// aliased for the duration of the borrow.
    pub unsafe fn as_mut(&mut self) -> &mut T {
        &mut *self.0
    }
}

impl<T> fmt::Debug for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ptr({:p})", self.0)
    }
}

// ============================================================================
// Lifecycle operations
// ============================================================================

/// Monomorphized lifecycle table captured when a `Value` is created.
///
/// Each entry is a plain fn pointer instantiated for the concrete type, so
/// no operation is ever re-derived from the identity at call time. Absent
/// entries mean the concrete type did not support the operation at capture
/// time; invoking them through `Value` fails with `UnsupportedOperation`.
#[derive(Clone, Copy)]
struct LifecycleOps {
    destroy: Option<unsafe fn(*mut u8)>,
    copy_construct: Option<unsafe fn(*const u8) -> *mut u8>,
    copy_assign: Option<unsafe fn(*mut u8, *const u8)>,
    move_assign: Option<unsafe fn(*mut u8, *mut u8)>,
}

unsafe fn destroy_impl<T>(obj: *mut u8) {
    drop(unsafe { Box::from_raw(obj.cast::<T>()) });
}

unsafe fn copy_construct_impl<T: Clone>(obj: *const u8) -> *mut u8 {
    let copy = unsafe { (*obj.cast::<T>()).clone() };
    Box::into_raw(Box::new(copy)).cast()
}

unsafe fn copy_assign_impl<T: Clone>(dst: *mut u8, src: *const u8) {
    unsafe { (*dst.cast::<T>()).clone_from(&*src.cast::<T>()) };
}

unsafe fn move_assign_impl<T>(dst: *mut u8, src: *mut u8) {
    // Moves the source object out of its heap slot and frees the slot;
    // the old destination object is dropped by the assignment.
    let moved = unsafe { *Box::from_raw(src.cast::<T>()) };
    unsafe { *dst.cast::<T>() = moved };
}

impl LifecycleOps {
    /// Ops for a type that only supports destroy and (implicitly) move.
    fn opaque<T: 'static>() -> Self {
        Self {
            destroy: Some(destroy_impl::<T>),
            copy_construct: None,
            copy_assign: None,
            move_assign: Some(move_assign_impl::<T>),
        }
    }

    /// Full table for a cloneable type.
    fn cloneable<T: Clone + 'static>() -> Self {
        Self {
            destroy: Some(destroy_impl::<T>),
            copy_construct: Some(copy_construct_impl::<T>),
            copy_assign: Some(copy_assign_impl::<T>),
            move_assign: Some(move_assign_impl::<T>),
        }
    }

    /// Table for the single-address cell backing every indirect value.
    fn address_cell() -> Self {
        Self::cloneable::<*mut u8>()
    }
}

// ============================================================================
// ValueRef
// ============================================================================

/// Non-owning view of a value: an address plus its runtime identity.
///
/// Performs no lifetime management beyond carrying the borrow it was created
/// from; the owner must outlive every use of the view.
#[derive(Clone, Copy)]
pub struct ValueRef<'a> {
    ptr: *mut u8,
    ident: TypeIdent,
    _borrow: PhantomData<&'a ()>,
}

impl<'a> ValueRef<'a> {
    /// View a shared borrow. The resulting identity is read-only.
    pub fn from_ref<T: 'static>(value: &'a T) -> Self {
        Self {
            ptr: value as *const T as *mut u8,
            ident: TypeIdent::of::<T>().as_readonly(),
            _borrow: PhantomData,
        }
    }

    /// View a mutable borrow. The resulting identity is mutable.
    pub fn from_mut<T: 'static>(value: &'a mut T) -> Self {
        Self {
            ptr: (value as *mut T).cast(),
            ident: TypeIdent::of::<T>(),
            _borrow: PhantomData,
        }
    }

    /// View raw storage under a caller-supplied identity.
    ///
    /// # Safety
    /// `ptr` must point to live, initialized storage of the shape named by
    /// `ident`, and must stay valid for `'a`.
    pub unsafe fn from_raw_parts(ptr: *mut u8, ident: TypeIdent) -> Self {
        Self {
            ptr,
            ident,
            _borrow: PhantomData,
        }
    }

    /// The identity of the viewed storage.
    pub fn ident(&self) -> TypeIdent {
        self.ident
    }

    /// Whether the viewed address is null.
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    pub(crate) fn addr(&self) -> *mut u8 {
        self.ptr
    }

    fn check(&self, want: TypeIdent) -> Result<()> {
        if self.ptr.is_null() {
            return Err(ReflectError::InvalidValue);
        }
        if self.ident.can_assign_to(want) {
            Ok(())
        } else {
            Err(ReflectError::TypeMismatch {
                from: self.ident.to_string(),
                to: want.to_string(),
            })
        }
    }

    /// Typed shared access.
    ///
    /// Succeeds iff the stored identity can assign to the read-only identity
    /// of `T`: same base, direct, any mutability.
    pub fn as_ref<T: 'static>(&self) -> Result<&'a T> {
        self.check(TypeIdent::of::<T>().as_readonly())?;
        Ok(unsafe { &*self.ptr.cast::<T>() })
    }

    /// Typed mutable access.
    ///
    /// Rejects read-only views. Succeeds iff the stored identity can assign
    /// to the mutable identity of `T`.
    ///
    /// # Safety
    /// The caller must guarantee no other borrow of the same storage is live
    /// for the duration of the returned reference; the view itself cannot
    /// track exclusivity.
    pub unsafe fn as_mut<T: 'static>(&self) -> Result<&'a mut T> {
        self.check(TypeIdent::of::<T>())?;
        Ok(unsafe { &mut *self.ptr.cast::<T>() })
    }

    /// Read the address cell of an indirect value as a typed pointer.
    ///
    /// Any indirect identity is accepted regardless of its base: one pointer
    /// may be reinterpreted as another, mirroring the loose pointer interop
    /// of the typed-access rules.
    pub fn as_ptr<T: 'static>(&self) -> Result<Ptr<T>> {
        if self.ptr.is_null() {
            return Err(ReflectError::InvalidValue);
        }
        if !self.ident.is_indirect() {
            return Err(ReflectError::TypeMismatch {
                from: self.ident.to_string(),
                to: TypeIdent::of::<T>().as_indirect().to_string(),
            });
        }
        Ok(Ptr::from_raw(unsafe { *self.ptr.cast::<*mut T>() }))
    }
}

impl fmt::Debug for ValueRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueRef")
            .field("ident", &self.ident.to_string())
            .field("addr", &self.ptr)
            .finish()
    }
}

// ============================================================================
// Value
// ============================================================================

/// Owning, type-erased value container.
///
/// Owns exactly one heap slot and releases it exactly once, through the
/// destroy operation captured at construction. Copy and assignment go
/// through the captured lifecycle table; operations the concrete type did
/// not support fail with `UnsupportedOperation` instead of silently
/// no-op-ing.
pub struct Value {
    ptr: *mut u8,
    ident: TypeIdent,
    ops: LifecycleOps,
}

impl Value {
    /// Capture a cloneable value. The full lifecycle table is available.
    pub fn new<T: Clone + 'static>(value: T) -> Self {
        Self {
            ptr: Box::into_raw(Box::new(value)).cast(),
            ident: TypeIdent::of::<T>(),
            ops: LifecycleOps::cloneable::<T>(),
        }
    }

    /// Capture a value without copy support.
    ///
    /// `try_clone` and `copy_assign_from` on the result fail with
    /// `UnsupportedOperation`.
    pub fn new_opaque<T: 'static>(value: T) -> Self {
        Self {
            ptr: Box::into_raw(Box::new(value)).cast(),
            ident: TypeIdent::of::<T>(),
            ops: LifecycleOps::opaque::<T>(),
        }
    }

    /// Capture an address as an indirect value.
    ///
    /// The storage is a single address cell; dropping the value releases the
    /// cell only, never the pointee.
    ///
    /// # Safety
    /// The address must point to a live object of type `T` for as long as
    /// anything dereferences values derived from this one.
    pub unsafe fn from_ptr<T: 'static>(ptr: Ptr<T>) -> Self {
        let cell: *mut u8 = ptr.into_raw().cast();
        Self {
            ptr: Box::into_raw(Box::new(cell)).cast(),
            ident: TypeIdent::of::<T>().as_indirect(),
            ops: LifecycleOps::address_cell(),
        }
    }

    /// Capture an untyped address under the indirect variant of `ident`.
    ///
    /// # Safety
    /// `addr` must point to a live object whose shape is `ident`'s base, and
    /// must stay live for as long as anything dereferences this value.
    pub(crate) unsafe fn from_addr(addr: *mut u8, ident: TypeIdent) -> Self {
        Self {
            ptr: Box::into_raw(Box::new(addr)).cast(),
            ident: ident.as_indirect(),
            ops: LifecycleOps::address_cell(),
        }
    }

    /// The uniform sentinel returned by void operations.
    pub fn void() -> Self {
        Self::new(())
    }

    /// Whether this is the void sentinel.
    pub fn is_void(&self) -> bool {
        self.ident == TypeIdent::of::<()>()
    }

    /// Whether the value still owns live storage.
    ///
    /// False only after the storage was moved out.
    pub fn is_valid(&self) -> bool {
        !self.ptr.is_null()
    }

    /// The identity of the stored value.
    pub fn ident(&self) -> TypeIdent {
        self.ident
    }

    pub(crate) fn addr(&self) -> *mut u8 {
        self.ptr
    }

    /// A non-owning, read-only view of this value.
    ///
    /// The view identity carries the read-only flag: a shared borrow of the
    /// container must not open a mutation path into its storage.
    pub fn as_value_ref(&self) -> ValueRef<'_> {
        unsafe { ValueRef::from_raw_parts(self.ptr, self.ident.as_readonly()) }
    }

    /// A non-owning, mutable view of this value.
    pub fn as_value_ref_mut(&mut self) -> ValueRef<'_> {
        unsafe { ValueRef::from_raw_parts(self.ptr, self.ident) }
    }

    /// Typed shared access to the stored value.
    pub fn as_ref<T: 'static>(&self) -> Result<&T> {
        self.as_value_ref().as_ref::<T>()
    }

    /// Typed mutable access to the stored value.
    pub fn as_mut<T: 'static>(&mut self) -> Result<&mut T> {
        // Exclusivity holds: the receiver is a mutable borrow of the sole
        // owner of the storage.
        unsafe { self.as_value_ref_mut().as_mut::<T>() }
    }

    /// Read the address cell of an indirect value as a typed pointer.
    pub fn as_ptr<T: 'static>(&self) -> Result<Ptr<T>> {
        self.as_value_ref().as_ptr::<T>()
    }

    fn require(&self) -> Result<()> {
        if self.ptr.is_null() {
            Err(ReflectError::InvalidValue)
        } else {
            Ok(())
        }
    }

    fn unsupported(&self, op: &'static str) -> ReflectError {
        ReflectError::UnsupportedOperation {
            op,
            type_name: self.ident.to_string(),
        }
    }

    /// Copy-construct a new value from this one.
    pub fn try_clone(&self) -> Result<Value> {
        self.require()?;
        let op = self
            .ops
            .copy_construct
            .ok_or_else(|| self.unsupported("copy-construct"))?;
        Ok(Value {
            ptr: unsafe { op(self.ptr) },
            ident: self.ident,
            ops: self.ops,
        })
    }

    /// Copy-assign from another value of exactly the same identity.
    pub fn copy_assign_from(&mut self, other: &Value) -> Result<()> {
        other.require()?;
        self.require()?;
        if self.ident != other.ident {
            return Err(ReflectError::TypeMismatch {
                from: other.ident.to_string(),
                to: self.ident.to_string(),
            });
        }
        let op = self
            .ops
            .copy_assign
            .ok_or_else(|| self.unsupported("copy-assign"))?;
        unsafe { op(self.ptr, other.ptr) };
        Ok(())
    }

    /// Move-construct a new value by stealing another value's storage.
    ///
    /// The source is left without an address; any further operation on it
    /// fails with `InvalidValue`. Every capturable type is movable, so this
    /// never fails with `UnsupportedOperation`.
    pub fn move_from(other: &mut Value) -> Result<Value> {
        other.require()?;
        let taken = Value {
            ptr: other.ptr,
            ident: other.ident,
            ops: other.ops,
        };
        other.ptr = ptr::null_mut();
        Ok(taken)
    }

    /// Move-assign from another value of exactly the same identity.
    ///
    /// The source is left without an address.
    pub fn move_assign_from(&mut self, other: &mut Value) -> Result<()> {
        other.require()?;
        self.require()?;
        if self.ident != other.ident {
            return Err(ReflectError::TypeMismatch {
                from: other.ident.to_string(),
                to: self.ident.to_string(),
            });
        }
        let op = self
            .ops
            .move_assign
            .ok_or_else(|| self.unsupported("move-assign"))?;
        unsafe { op(self.ptr, other.ptr) };
        other.ptr = ptr::null_mut();
        Ok(())
    }

    /// A new indirect value holding the address of this one's storage.
    ///
    /// Fails on an already-indirect value: indirection depth is capped at
    /// one level. The result does not borrow this value; this value must
    /// outlive every dereference of the result.
    pub fn address_of(&self) -> Result<Value> {
        self.require()?;
        if self.ident.is_indirect() {
            return Err(self.unsupported("address-of on an indirect value"));
        }
        Ok(Value {
            ptr: Box::into_raw(Box::new(self.ptr)).cast(),
            ident: self.ident.as_indirect(),
            ops: LifecycleOps::address_cell(),
        })
    }

    /// View the pointee of an indirect value, one level down.
    ///
    /// The read-only flag carries over; the indirection flag is cleared.
    ///
    /// # Safety
    /// The pointee must still be live; the address cell records no lifetime.
    pub unsafe fn deref(&self) -> Result<ValueRef<'_>> {
        self.require()?;
        if !self.ident.is_indirect() {
            return Err(self.unsupported("deref on a direct value"));
        }
        let pointee = unsafe { *self.ptr.cast::<*mut u8>() };
        Ok(unsafe { ValueRef::from_raw_parts(pointee, self.ident.as_direct()) })
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            if let Some(destroy) = self.ops.destroy {
                unsafe { destroy(self.ptr) };
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("ident", &self.ident.to_string())
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts drops so destroy-exactly-once is observable.
    #[derive(Clone)]
    struct Guard(Arc<AtomicUsize>);

    impl Drop for Guard {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_roundtrip() {
        let v = Value::new(42i32);
        assert_eq!(*v.as_ref::<i32>().unwrap(), 42);
        assert!(v.as_ref::<u32>().is_err());
    }

    #[test]
    fn test_value_ref_readonly_rules() {
        let x = 7i32;
        let r = ValueRef::from_ref(&x);
        assert!(r.ident().is_readonly());
        assert_eq!(*r.as_ref::<i32>().unwrap(), 7);
        assert!(unsafe { r.as_mut::<i32>() }.is_err());

        let mut y = 9i32;
        let m = ValueRef::from_mut(&mut y);
        *unsafe { m.as_mut::<i32>() }.unwrap() = 10;
        assert_eq!(*m.as_ref::<i32>().unwrap(), 10);
    }

    #[test]
    fn test_destroy_runs_exactly_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let owned = Value::new(Guard(drops.clone()));
            assert!(owned.is_valid());
        }
        // One drop for the stored guard; the clone handed to Value::new was
        // moved, not dropped.
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_try_clone() {
        let a = Value::new(String::from("abc"));
        let b = a.try_clone().unwrap();
        assert_eq!(a.as_ref::<String>().unwrap(), b.as_ref::<String>().unwrap());
    }

    #[test]
    fn test_opaque_clone_unsupported() {
        struct NoClone(#[allow(dead_code)] i32);
        let v = Value::new_opaque(NoClone(1));
        assert!(matches!(
            v.try_clone(),
            Err(ReflectError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_copy_assign_requires_same_ident() {
        let mut a = Value::new(1i32);
        let b = Value::new(2i64);
        assert!(matches!(
            a.copy_assign_from(&b),
            Err(ReflectError::TypeMismatch { .. })
        ));

        let c = Value::new(5i32);
        a.copy_assign_from(&c).unwrap();
        assert_eq!(*a.as_ref::<i32>().unwrap(), 5);
    }

    #[test]
    fn test_move_from_invalidates_source() {
        let mut a = Value::new(String::from("moved"));
        let b = Value::move_from(&mut a).unwrap();
        assert!(!a.is_valid());
        assert_eq!(b.as_ref::<String>().unwrap(), "moved");
        assert!(matches!(a.try_clone(), Err(ReflectError::InvalidValue)));
    }

    #[test]
    fn test_move_assign() {
        let mut a = Value::new(String::from("old"));
        let mut b = Value::new(String::from("new"));
        a.move_assign_from(&mut b).unwrap();
        assert_eq!(a.as_ref::<String>().unwrap(), "new");
        assert!(!b.is_valid());
    }

    #[test]
    fn test_address_of_deref_roundtrip() {
        let v = Value::new(42i32);
        let p = v.address_of().unwrap();
        assert!(p.ident().is_indirect());
        let back = unsafe { p.deref() }.unwrap();
        assert_eq!(*back.as_ref::<i32>().unwrap(), 42);
    }

    #[test]
    fn test_indirection_depth_capped() {
        let v = Value::new(42i32);
        let p = v.address_of().unwrap();
        assert!(matches!(
            p.address_of(),
            Err(ReflectError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            unsafe { v.deref() },
            Err(ReflectError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_view_mutability_follows_borrow() {
        let mut v = Value::new(1i32);
        assert!(v.as_value_ref().ident().is_readonly());
        assert!(unsafe { v.as_value_ref().as_mut::<i32>() }.is_err());

        let m = v.as_value_ref_mut();
        assert!(!m.ident().is_readonly());
        *unsafe { m.as_mut::<i32>() }.unwrap() = 2;
        assert_eq!(*v.as_ref::<i32>().unwrap(), 2);
    }

    #[test]
    fn test_void() {
        let v = Value::void();
        assert!(v.is_void());
        assert!(v.is_valid());
    }

    #[test]
    fn test_mutate_through_address() {
        let mut target = 1i32;
        let p = unsafe { Value::from_ptr(Ptr::from_mut(&mut target)) };
        let view = unsafe { p.deref() }.unwrap();
        *unsafe { view.as_mut::<i32>() }.unwrap() = 99;
        drop(p);
        assert_eq!(target, 99);
    }
}
