//! buzz_core: shared infrastructure for the buzz compiler.
//!
//! Provides string interning (identifiers, type canonical strings and string
//! literals all share one table) and source text mapping for diagnostics.

pub mod intern;
pub mod text;

pub use intern::{InternedString, StringInterner};
pub use text::LineMap;
