//! Layered type and function registry.
//!
//! A [`Registry`] owns its local registrations and optionally stacks on a
//! shared, immutable base registry. Lookups probe the local layer first and
//! then walk the base chain; registration always targets the local layer and
//! can never mutate a base. This lets a host process share one registry of
//! common types across many scripting or plugin contexts that each add their
//! own.
//!
//! Type registration is fail-fast: registering a name or a base identity
//! that is already present anywhere in the chain is an error. Free-function
//! registration is last-wins within the local layer, matching how named
//! overrides usually behave in embedding hosts.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::arg::AnyArg;
use crate::error::{ReflectError, Result};
use crate::function::{Function, IntoFunction};
use crate::ident::TypeIdent;
use crate::ty::Type;
use crate::value::Value;

/// Layered registry of types and free functions.
#[derive(Default)]
pub struct Registry {
    base: Option<Arc<Registry>>,
    types: FxHashMap<String, Type>,
    names_by_ident: FxHashMap<TypeIdent, String>,
    functions: FxHashMap<String, Function>,
}

impl Registry {
    /// An empty standalone registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty registry layered on a shared base.
    pub fn with_base(base: Arc<Registry>) -> Self {
        Self {
            base: Some(base),
            ..Self::default()
        }
    }

    /// The base registry this one is layered on, if any.
    pub fn base(&self) -> Option<&Arc<Registry>> {
        self.base.as_ref()
    }

    /// Register `T` under `name` with the given parent names.
    ///
    /// Returns the fresh record for follow-up `add_*` calls. Fails with
    /// `AlreadyRegistered` if the name or the identity of `T` is present
    /// anywhere in the chain.
    pub fn register_type<T: 'static>(&mut self, name: &str, parents: &[&str]) -> Result<&mut Type> {
        let ident = TypeIdent::of::<T>();
        if self.contains_type_name(name) {
            return Err(ReflectError::AlreadyRegistered {
                name: name.to_owned(),
            });
        }
        if self.contains_ident(ident) {
            return Err(ReflectError::AlreadyRegistered {
                name: ident.name().to_owned(),
            });
        }
        self.names_by_ident.insert(ident.base_only(), name.to_owned());
        Ok(self
            .types
            .entry(name.to_owned())
            .or_insert_with(|| Type::new::<T>(name, parents)))
    }

    /// Register a free function under `name`, replacing any local function
    /// previously registered under the same name.
    pub fn register_function<M, F: IntoFunction<M>>(&mut self, name: &str, f: F) {
        self.functions.insert(name.to_owned(), Function::new(f));
    }

    fn contains_type_name(&self, name: &str) -> bool {
        self.types.contains_key(name)
            || self
                .base
                .as_deref()
                .is_some_and(|b| b.contains_type_name(name))
    }

    fn contains_ident(&self, ident: TypeIdent) -> bool {
        self.names_by_ident.contains_key(&ident.base_only())
            || self.base.as_deref().is_some_and(|b| b.contains_ident(ident))
    }

    /// Look up a type record by registered name, local layer first.
    pub fn get_type(&self, name: &str) -> Result<&Type> {
        if let Some(ty) = self.types.get(name) {
            return Ok(ty);
        }
        match &self.base {
            Some(base) => base.get_type(name),
            None => Err(ReflectError::NotRegistered {
                name: name.to_owned(),
            }),
        }
    }

    /// Look up a type record by identity; any flag variant resolves to the
    /// same record.
    pub fn get_type_by_ident(&self, ident: TypeIdent) -> Result<&Type> {
        if let Some(name) = self.names_by_ident.get(&ident.base_only()) {
            return self.get_type(name);
        }
        match &self.base {
            Some(base) => base.get_type_by_ident(ident),
            None => Err(ReflectError::NotRegistered {
                name: ident.to_string(),
            }),
        }
    }

    /// The registered name of an identity, if it is registered in the chain.
    pub fn type_name_of(&self, ident: TypeIdent) -> Option<&str> {
        match self.names_by_ident.get(&ident.base_only()) {
            Some(name) => Some(name.as_str()),
            None => self.base.as_deref().and_then(|b| b.type_name_of(ident)),
        }
    }

    /// Look up a free function by name, local layer first.
    pub fn get_function(&self, name: &str) -> Result<&Function> {
        if let Some(f) = self.functions.get(name) {
            return Ok(f);
        }
        match &self.base {
            Some(base) => base.get_function(name),
            None => Err(ReflectError::NotRegistered {
                name: name.to_owned(),
            }),
        }
    }

    /// Invoke a registered free function by name.
    pub fn call(&self, name: &str, args: &[AnyArg<'_>]) -> Result<Value> {
        self.get_function(name)?.call(self, args)
    }

    /// Construct an owning instance of a registered type by name.
    pub fn construct(&self, name: &str, args: &[AnyArg<'_>]) -> Result<Value> {
        self.get_type(name)?.construct_on_stack(self, args)
    }

    /// Iterate the locally registered types, in no particular order.
    ///
    /// Base layers are reachable through [`base`](Self::base).
    pub fn types(&self) -> impl Iterator<Item = &Type> {
        self.types.values()
    }

    /// Iterate the locally registered free functions.
    pub fn functions(&self) -> impl Iterator<Item = (&str, &Function)> {
        self.functions.iter().map(|(n, f)| (n.as_str(), f))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.types.len())
            .field("functions", &self.functions.len())
            .field("layered", &self.base.is_some())
            .finish()
    }
}
