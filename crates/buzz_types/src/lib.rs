//! buzz_types: the buzz type system.
//!
//! Types are stored in a [`TypeRegistry`] arena and referenced by [`TypeId`].
//! Handles stay valid for the whole compilation; resolving a placeholder
//! overwrites its arena slot in place, so every annotation that held the
//! placeholder observes the resolved type without any fix-up.

pub mod placeholder;
pub mod registry;
pub mod types;

pub use placeholder::{assume_type, child_placeholder, is_coherent, link, record_use, resolve, Use};
pub use registry::TypeRegistry;
pub use types::{
    EnumDef, FunctionDef, FunctionKind, ObjectDef, PlaceholderDef, Relation, TypeDef, TypeId,
    TypeKind,
};
