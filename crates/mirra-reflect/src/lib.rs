//! Runtime reflection for Rust types.
//!
//! `mirra-reflect` lets a host register concrete Rust types, functions,
//! members and constructors under runtime names, then construct instances
//! and invoke operations on values whose static types are erased. The
//! building blocks:
//!
//! - [`TypeIdent`] names a value shape at runtime: base type plus an
//!   indirection flag and a read-only flag.
//! - [`Value`] owns one type-erased instance with its lifecycle operations
//!   captured at construction; [`ValueRef`] is the non-owning view.
//! - [`AnyArg`] wraps an invocation argument and performs at most one
//!   implicit conversion hop through the registry.
//! - [`Function`], [`Field`] and [`Constructor`] erase concrete callables,
//!   member projections and factories.
//! - [`Registry`] maps names to all of the above and can layer on a shared
//!   base registry.
//!
//! ```
//! use mirra_reflect::{AnyArg, Registry};
//!
//! #[derive(Clone)]
//! struct Counter { count: i32 }
//!
//! fn main() -> mirra_reflect::Result<()> {
//!     let mut reg = Registry::new();
//!     reg.register_type::<Counter>("Counter", &[])?
//!         .add_constructor(|start: i32| Counter { count: start })
//!         .add_method("add", |c: &mut Counter, n: i32| { c.count += n; c.count });
//!
//!     let mut counter = reg.construct("Counter", &[AnyArg::new(5i32)])?;
//!     let ty = reg.get_type("Counter")?;
//!     let out = ty.function("add")?
//!         .call(&reg, &[AnyArg::from_value_mut(&mut counter), AnyArg::new(3i32)])?;
//!     assert_eq!(*out.as_ref::<i32>()?, 8);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod arg;
pub mod builtins;
pub mod error;
pub mod field;
pub mod function;
pub mod ident;
pub mod registry;
pub mod ty;
pub mod value;

pub use arg::AnyArg;
pub use builtins::basic_registry;
pub use error::{ReflectError, Result};
pub use field::Field;
pub use function::{Function, IntoFunction, IntoMethod};
pub use ident::TypeIdent;
pub use registry::Registry;
pub use ty::{Constructor, IntoConstructor, Type};
pub use value::{Ptr, Value, ValueRef};
