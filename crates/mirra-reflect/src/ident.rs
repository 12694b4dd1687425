//! Process-lifetime type identities.
//!
//! A [`TypeIdent`] names the *shape* of a value at runtime: a base type plus
//! an indirection flag and a read-only flag. The base is `std::any::TypeId`,
//! which is unique per concrete type for the lifetime of the process but not
//! stable across runs. The flag variants of a shape share the same base and
//! differ only in the flags, so `i32`, `*i32` and `const i32` compare unequal
//! while still being recognizably the same base.
//!
//! Indirection depth is capped at one level: an identity is either direct or
//! one pointer away, never more.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime identity of a value shape: base type + indirection + read-only.
///
/// `TypeIdent` is a small `Copy` value used as a hash-map key throughout the
/// registry. Equality and hashing cover the base and both flags; the debug
/// name is carried along for diagnostics only.
#[derive(Clone, Copy, Debug)]
pub struct TypeIdent {
    base: TypeId,
    indirect: bool,
    readonly: bool,
    name: &'static str,
}

impl TypeIdent {
    /// The canonical identity of `T`: direct and mutable.
    ///
    /// Stable across repeated calls within one process run.
    pub fn of<T: 'static>() -> Self {
        Self {
            base: TypeId::of::<T>(),
            indirect: false,
            readonly: false,
            name: std::any::type_name::<T>(),
        }
    }

    /// Whether this identity is one level of indirection away from its base.
    pub fn is_indirect(&self) -> bool {
        self.indirect
    }

    /// Whether this identity is read-only.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// The same base shape, seen through one level of indirection.
    pub fn as_indirect(self) -> Self {
        Self {
            indirect: true,
            ..self
        }
    }

    /// The same shape with the read-only flag set.
    pub fn as_readonly(self) -> Self {
        Self {
            readonly: true,
            ..self
        }
    }

    /// The same shape with the indirection flag cleared.
    pub(crate) fn as_direct(self) -> Self {
        Self {
            indirect: false,
            ..self
        }
    }

    /// The base shape with both flags cleared.
    ///
    /// Registries key their identity-to-name table on this, so that every
    /// flag variant of a registered type resolves to the same entry.
    pub fn base_only(self) -> Self {
        Self {
            indirect: false,
            readonly: false,
            ..self
        }
    }

    /// Debug name of the base type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a value of this identity may be supplied where `target` is
    /// expected.
    ///
    /// The base must match, indirection must match exactly, and read-only
    /// may only go from a mutable source to a read-only target, never the
    /// reverse.
    pub fn can_assign_to(&self, target: TypeIdent) -> bool {
        self.base == target.base
            && self.indirect == target.indirect
            && (target.readonly || !self.readonly)
    }

    /// Whether two identities share the same base shape, ignoring flags.
    pub fn same_base(&self, other: TypeIdent) -> bool {
        self.base == other.base
    }
}

impl PartialEq for TypeIdent {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
            && self.indirect == other.indirect
            && self.readonly == other.readonly
    }
}

impl Eq for TypeIdent {}

impl Hash for TypeIdent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base.hash(state);
        self.indirect.hash(state);
        self.readonly.hash(state);
    }
}

impl fmt::Display for TypeIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.readonly {
            write!(f, "const ")?;
        }
        if self.indirect {
            write!(f, "*")?;
        }
        write!(f, "{}", self.name)
    }
}
