//! buzz_diagnostics: diagnostic messages and error reporting infrastructure.
//!
//! Diagnostics carry the file, line and column of the offending token and a
//! resolved message. Rendering cuts up to three source lines and places a
//! caret under the offending column:
//!
//! ```text
//! fun use(Unknown u) > void {
//!     u.field + 1;
//!             ^
//! test.buzz:2:13: Error: Expected `num`, got `str`.
//! ```

use buzz_core::text::LineMap;
use std::fmt;

/// How far back the snippet reaches above the offending line.
const SNIPPET_LINES: usize = 3;

/// A realized diagnostic, located at a token.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// The script this diagnostic was reported in.
    pub file: String,
    /// 0-based line of the offending token.
    pub line: u32,
    /// 0-based column of the offending token.
    pub column: u32,
    /// The resolved message text.
    pub message: String,
}

impl Diagnostic {
    pub fn new(file: impl Into<String>, line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Render with the source snippet and caret. `source` must be the text of
    /// the script named by `self.file`.
    pub fn render(&self, source: &str) -> String {
        let map = LineMap::new(source);
        let line = self.line as usize;
        let first = line.saturating_sub(SNIPPET_LINES - 1);

        let mut out = String::new();
        for l in first..=line {
            if let Some(text) = map.line_text(source, l) {
                out.push_str(text);
                out.push('\n');
            }
        }
        // Caret under the offending column, tabs preserved so it lines up.
        if let Some(text) = map.line_text(source, line) {
            for ch in text.chars().take(self.column as usize) {
                out.push(if ch == '\t' { '\t' } else { ' ' });
            }
            out.push('^');
        }
        out.push('\n');
        out.push_str(&format!(
            "{}:{}:{}: Error: {}\n",
            self.file,
            self.line + 1,
            self.column + 1,
            self.message
        ));
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: Error: {}",
            self.file,
            self.line + 1,
            self.column + 1,
            self.message
        )
    }
}

/// Diagnostics accumulated during a parse.
///
/// The parser never aborts on the first error; everything it reports before
/// reaching end of input lands here.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCollection {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn extend(&mut self, other: DiagnosticCollection) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// Sort by file, then position.
    pub fn sort(&mut self) {
        self.diagnostics
            .sort_by(|a, b| (&a.file, a.line, a.column).cmp(&(&b.file, b.line, b.column)));
    }
}

/// Replace `{0}`, `{1}`, … in a message template with arguments.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{}}}", i), arg);
    }
    result
}

/// Message templates used across the front end. Placeholders `{0}`, `{1}` are
/// substituted with [`format_message`].
pub mod messages {
    pub const EXPECTED_EXPRESSION: &str = "Expected expression.";
    pub const EXPECTED_TOKEN: &str = "Expected `{0}`.";
    pub const EXPECTED_IDENTIFIER: &str = "Expected identifier.";
    pub const EXPECTED_TYPE: &str = "Expected type.";
    pub const INVALID_ASSIGNMENT_TARGET: &str = "Invalid assignment target.";
    pub const EXPECTED_GOT: &str = "Expected `{0}`, got `{1}`.";
    pub const NOT_CALLABLE: &str = "Type `{0}` is not callable.";
    pub const NOT_SUBSCRIPTABLE: &str = "Type `{0}` is not subscriptable.";
    pub const NOT_ITERABLE: &str = "Type `{0}` is not iterable.";
    pub const MEMBER_NOT_FOUND: &str = "Type `{0}` has no member `{1}`.";
    pub const ENUM_CASE_NOT_FOUND: &str = "Enum `{0}` has no case `{1}`.";
    pub const ASSIGN_TO_CONSTANT: &str = "Can't assign to constant `{0}`.";
    pub const READ_OWN_INITIALIZER: &str = "Can't read variable `{0}` in its own initializer.";
    pub const ALREADY_DECLARED: &str = "A variable named `{0}` already exists in this scope.";
    pub const GLOBAL_ALREADY_DECLARED: &str = "A global named `{0}` already exists.";
    pub const UNKNOWN_VARIABLE: &str = "Unknown variable `{0}`.";
    pub const INCOHERENT_USE: &str = "Incoherent use of `{0}`.";
    pub const TOO_MANY_LOCALS: &str = "Can't have more than 255 local variables in one function.";
    pub const TOO_MANY_UPVALUES: &str = "Can't capture more than 255 variables in one function.";
    pub const TOO_MANY_PARAMETERS: &str = "Can't have more than 255 parameters.";
    pub const TOO_MANY_ARGUMENTS: &str = "Can't have more than 255 arguments.";
    pub const TOO_MANY_CATCH_CLAUSES: &str = "Can't have more than 255 catch clauses.";
    pub const OBJECT_NOT_TOP_LEVEL: &str = "Object and class declarations are only allowed at the top level.";
    pub const IMPORT_NOT_TOP_LEVEL: &str = "Import and export statements are only allowed at the top level.";
    pub const DUPLICATE_MEMBER: &str = "A member named `{0}` already exists.";
    pub const EMPTY_ENUM: &str = "Enum `{0}` has no cases.";
    pub const ENUM_CASE_VALUE_TYPE: &str = "Enum case value must be of type `{0}`.";
    pub const NOT_INHERITABLE: &str = "`{0}` is not inheritable.";
    pub const SUPER_OUTSIDE_CLASS: &str = "`super` is only allowed in a class method.";
    pub const THIS_OUTSIDE_METHOD: &str = "`this` is only allowed in object methods.";
    pub const IMPORT_NOT_FOUND: &str = "Could not find script `{0}`.";
    pub const CIRCULAR_IMPORT: &str = "Circular import of `{0}`.";
    pub const UNWRAP_NON_OPTIONAL: &str = "Can't unwrap non-optional type `{0}`.";
    pub const IMPORT_UNKNOWN_SYMBOL: &str = "Script `{0}` does not export `{1}`.";
    pub const IMPORT_NAME_COLLISION: &str = "Imported symbol `{0}` collides with an existing global.";
    pub const EXPORT_NEEDS_ALIAS: &str = "Exporting a prefixed global requires `as`.";
    pub const NATIVE_NOT_FOUND: &str = "Could not resolve native symbol `{0}` in `{1}`: {2}.";
    pub const ARGUMENT_COUNT: &str = "Expected {0} arguments, got {1}.";
    pub const UNKNOWN_ARGUMENT: &str = "Function `{0}` has no parameter named `{1}`.";
    pub const MISSING_ENUM_CASE: &str = "Unresolved member `{0}`.";
    pub const UNRESOLVED_GLOBAL: &str = "Unknown symbol `{0}`.";
}
