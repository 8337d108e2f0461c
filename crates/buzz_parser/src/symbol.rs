//! Top-level bindings of a translation unit.

use buzz_core::intern::InternedString;
use buzz_scanner::Token;
use buzz_types::TypeId;

/// A global binding. One ordered list per parser; imports append merged
/// entries so indices stay stable for the byte-code layer.
#[derive(Debug, Clone)]
pub struct Global {
    /// Namespace prefix set by `import … as Prefix`.
    pub prefix: Option<InternedString>,
    pub name: InternedString,
    pub type_def: TypeId,
    /// False while the initializer is being parsed.
    pub initialized: bool,
    pub exported: bool,
    /// `export foo as bar` renames the importing unit's view.
    pub export_alias: Option<InternedString>,
    /// Imported but not visible; kept so indices stay stable.
    pub hidden: bool,
    pub constant: bool,
    /// The declaring token, for unresolved-symbol diagnostics.
    pub where_token: Token,
}

impl Global {
    /// The name this global is visible under from an importing unit.
    pub fn visible_name(&self) -> InternedString {
        self.export_alias.unwrap_or(self.name)
    }
}
