//! The buzz parser implementation.
//!
//! A single-pass parser: it builds the AST, resolves names across locals,
//! upvalues and globals, and types every expression as it goes. Forward
//! references to globals become placeholders (see `buzz_types::placeholder`);
//! the declarations that eventually arrive resolve them in place, so no
//! second pass ever revisits a function body.

use std::collections::VecDeque;

use bumpalo::Bump;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use buzz_ast::*;
use buzz_core::intern::{InternedString, StringInterner};
use buzz_diagnostics::{format_message, messages, Diagnostic, DiagnosticCollection};
use buzz_module::NativeResolver;
use buzz_scanner::{Scanner, Token, TokenKind};
use buzz_types::{
    assume_type, child_placeholder, link, record_use, resolve, FunctionDef, FunctionKind,
    ObjectDef, PlaceholderDef, Relation, TypeDef, TypeId, TypeKind, TypeRegistry, Use,
};

use crate::precedence::{infix_precedence, Precedence};
use crate::scope::{Frame, Local, UpValue, MAX_LOCALS, MAX_UPVALUES};
use crate::symbol::Global;

/// Caps shared with the byte-code layer's operand encoding.
pub const MAX_PARAMETERS: usize = 255;
pub const MAX_ARGUMENTS: usize = 255;
pub const MAX_CATCH_CLAUSES: usize = 255;

/// State shared between the top-level parser and the parsers it recursively
/// instantiates for imports: the interner, the type registry, the imports
/// cache and the native symbol resolver.
pub struct CompileContext<'a> {
    pub interner: StringInterner,
    pub registry: TypeRegistry,
    pub imports: FxHashMap<String, ScriptImport<'a>>,
    pub resolver: Box<dyn NativeResolver>,
    /// Source text per script name, for diagnostic rendering.
    pub sources: FxHashMap<String, String>,
    /// Scripts currently being parsed; breaks import cycles.
    parsing: FxHashSet<String>,
}

impl<'a> CompileContext<'a> {
    pub fn new(resolver: Box<dyn NativeResolver>) -> Self {
        let interner = StringInterner::new();
        let registry = TypeRegistry::new(interner.clone());
        Self {
            interner,
            registry,
            imports: FxHashMap::default(),
            resolver,
            sources: FxHashMap::default(),
            parsing: FxHashSet::default(),
        }
    }
}

/// A successfully parsed and cached imported unit.
pub struct ScriptImport<'a> {
    pub function: &'a FunctionNode<'a>,
    pub globals: Vec<Global>,
}

/// What a parse produced. `function` is `None` when any error was reported.
pub struct ParseResult<'a> {
    pub function: Option<&'a FunctionNode<'a>>,
    pub globals: Vec<Global>,
    pub diagnostics: DiagnosticCollection,
}

/// The object or class whose members are currently being parsed.
struct ObjectContext {
    def: TypeId,
    has_super: bool,
}

pub struct Parser<'a, 'ctx> {
    arena: &'a Bump,
    ctx: &'ctx mut CompileContext<'a>,
    scanner: Scanner,
    previous: Token,
    current: Token,
    /// Bounded look-ahead queue; the grammar needs at most 3 tokens.
    ahead: VecDeque<Token>,
    script_name: InternedString,
    imported: bool,
    globals: Vec<Global>,
    frames: Vec<Frame>,
    current_object: Option<ObjectContext>,
    panic_mode: bool,
    had_error: bool,
    diagnostics: DiagnosticCollection,
    /// Synthetic name counter for `test` blocks.
    test_count: u32,
    /// Index of the global declared by the most recent declaration; `export`
    /// in declaration position flips it.
    last_declared_global: Option<usize>,
}

impl<'a, 'ctx> Parser<'a, 'ctx> {
    /// Parse one compilation unit. `imported` selects library semantics for
    /// the root function kind.
    pub fn parse(
        arena: &'a Bump,
        ctx: &'ctx mut CompileContext<'a>,
        source: &str,
        file_name: &str,
        imported: bool,
    ) -> ParseResult<'a> {
        ctx.sources
            .insert(file_name.to_string(), source.to_string());
        let script_name = ctx.interner.intern(file_name);
        let scanner = Scanner::new(source, script_name, ctx.interner.clone());
        let empty = ctx.interner.intern("");
        let start = Token {
            kind: TokenKind::Eof,
            lexeme: empty,
            line: 0,
            column: 0,
            literal_number: None,
            literal_string: None,
            script: script_name,
        };
        let void_type = ctx.registry.void_type;

        let mut parser = Parser {
            arena,
            ctx,
            scanner,
            previous: start,
            current: start,
            ahead: VecDeque::new(),
            script_name,
            imported,
            globals: Vec::new(),
            frames: vec![Frame::new(None, void_type)],
            current_object: None,
            panic_mode: false,
            had_error: false,
            diagnostics: DiagnosticCollection::new(),
            test_count: 0,
            last_declared_global: None,
        };
        // Slot 0 of every frame is reserved for the runtime.
        parser.frames[0].locals.push(Local {
            name: empty,
            type_def: void_type,
            depth: 0,
            is_captured: false,
            constant: true,
        });

        parser.advance();
        let first = parser.current;

        let mut statements = Vec::new();
        while !parser.check(TokenKind::Eof) {
            let before = (
                parser.current.line,
                parser.current.column,
                parser.current.kind,
            );
            statements.push(parser.declaration());
            if parser.panic_mode {
                parser.synchronize();
            }
            // If nothing was consumed, skip a token to guarantee progress.
            let after = (
                parser.current.line,
                parser.current.column,
                parser.current.kind,
            );
            if before == after && !parser.check(TokenKind::Eof) {
                parser.advance();
            }
        }

        parser.report_unresolved_globals();

        let kind = if imported {
            FunctionKind::Script
        } else {
            FunctionKind::ScriptEntryPoint
        };
        let script_type =
            parser
                .ctx
                .registry
                .get_or_intern(TypeDef::new(TypeKind::Function(FunctionDef {
                    name: script_name,
                    return_type: void_type,
                    parameters: IndexMap::new(),
                    has_defaults: FxHashMap::default(),
                    kind,
                    lambda: false,
                })));
        let body = &*parser.arena.alloc(BlockNode {
            data: NodeData::new(first),
            statements: parser.arena.alloc_slice_fill_iter(statements),
        });
        let function = &*parser.arena.alloc(FunctionNode {
            data: NodeData::typed(first, script_type),
            name: script_name,
            body: Some(body),
            defaults: &[],
            upvalue_count: 0,
            native: None,
        });

        let had_error = parser.had_error || parser.diagnostics.has_errors();
        ParseResult {
            function: if had_error { None } else { Some(function) },
            globals: parser.globals,
            diagnostics: parser.diagnostics,
        }
    }

    // ========================================================================
    // Token management
    // ========================================================================

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            let next = self
                .ahead
                .pop_front()
                .unwrap_or_else(|| self.scanner.scan_token());
            if next.kind == TokenKind::Error {
                let message = self.ctx.interner.resolve(next.lexeme).to_string();
                self.error_at(next, message);
                continue;
            }
            self.current = next;
            break;
        }
    }

    /// Look `n` tokens past `current` without consuming anything.
    fn peek(&mut self, n: usize) -> Token {
        while self.ahead.len() <= n {
            let token = self.scanner.scan_token();
            self.ahead.push_back(token);
        }
        self.ahead[n]
    }

    #[inline]
    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind) -> Token {
        if self.check(kind) {
            self.advance();
            self.previous
        } else {
            self.error_at_current(format_message(messages::EXPECTED_TOKEN, &[kind.describe()]));
            self.current
        }
    }

    fn consume_identifier(&mut self) -> Token {
        if self.check(TokenKind::Identifier) {
            self.advance();
            self.previous
        } else {
            self.error_at_current(messages::EXPECTED_IDENTIFIER.to_string());
            self.current
        }
    }

    // ========================================================================
    // Error reporting and synchronization
    // ========================================================================

    fn error_at(&mut self, token: Token, message: String) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        let file = self.ctx.interner.resolve(token.script).to_string();
        self.diagnostics
            .add(Diagnostic::new(file, token.line, token.column, message));
    }

    fn error_at_current(&mut self, message: String) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error_at_previous(&mut self, message: String) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while !self.check(TokenKind::Eof) {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Fun
                | TokenKind::Extern
                | TokenKind::Object
                | TokenKind::Class
                | TokenKind::Enum
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::For
                | TokenKind::ForEach
                | TokenKind::Return
                | TokenKind::Throw
                | TokenKind::Import
                | TokenKind::Export
                | TokenKind::Test
                | TokenKind::Const => return,
                _ => self.advance(),
            }
        }
    }

    // ========================================================================
    // Registry helpers
    // ========================================================================

    fn type_name(&self, type_def: TypeId) -> String {
        self.ctx.registry.canonical(type_def)
    }

    fn resolve_str(&self, name: InternedString) -> String {
        self.ctx.interner.resolve(name).to_string()
    }

    fn type_of(&self, expression: &Expression<'a>) -> TypeId {
        expression.type_def().unwrap_or(self.ctx.registry.void_type)
    }

    fn is_placeholder(&self, type_def: TypeId) -> bool {
        self.ctx.registry.is_placeholder(type_def)
    }

    fn new_placeholder(&mut self, name: Option<InternedString>, at: Token) -> TypeId {
        self.ctx
            .registry
            .add(TypeDef::new(TypeKind::Placeholder(PlaceholderDef::new(
                name, at,
            ))))
    }

    fn resolve_placeholder(&mut self, placeholder: TypeId, resolved: TypeId, constant: bool) {
        resolve(
            &mut self.ctx.registry,
            placeholder,
            resolved,
            constant,
            &mut self.diagnostics,
        );
    }

    /// Check a value's type against what its context expects. Placeholders
    /// get the expectation recorded for resolution time; concrete mismatches
    /// are reported right away, at `at`.
    fn check_operand(&mut self, value_type: TypeId, expected: TypeId, at: Token) {
        if self.is_placeholder(value_type) {
            assume_type(&mut self.ctx.registry, value_type, expected, at);
            return;
        }
        if self.is_placeholder(expected) {
            assume_type(&mut self.ctx.registry, expected, value_type, at);
            return;
        }
        if !self.ctx.registry.assignable(value_type, expected) {
            let expected_name = self.type_name(expected);
            let actual_name = self.type_name(value_type);
            self.error_at(
                at,
                format_message(messages::EXPECTED_GOT, &[&expected_name, &actual_name]),
            );
        }
    }

    /// Record or check an assignment of `value_type` into `declared`.
    fn check_assignment(&mut self, declared: TypeId, value_type: TypeId, at: Token) {
        let declared_placeholder = self.is_placeholder(declared);
        let value_placeholder = self.is_placeholder(value_type);
        match (declared_placeholder, value_placeholder) {
            (true, true) => link(
                &mut self.ctx.registry,
                declared,
                value_type,
                Relation::Assignment,
            ),
            (true, false) => assume_type(&mut self.ctx.registry, declared, value_type, at),
            (false, true) => assume_type(&mut self.ctx.registry, value_type, declared, at),
            (false, false) => {
                // An empty literal's element types are placeholders; the
                // declared type decides them.
                if self.infer_literal_components(declared, value_type) {
                    return;
                }
                if !self.ctx.registry.assignable(value_type, declared) {
                    let expected = self.type_name(declared);
                    let actual = self.type_name(value_type);
                    self.error_at(
                        at,
                        format_message(messages::EXPECTED_GOT, &[&expected, &actual]),
                    );
                }
            }
        }
    }

    /// Resolve the placeholder components of a list or map literal against
    /// the declared type. Returns true when inference applied.
    fn infer_literal_components(&mut self, declared: TypeId, value_type: TypeId) -> bool {
        let pairs: Vec<(TypeId, TypeId)> = match (
            &self.ctx.registry.get(declared).kind,
            &self.ctx.registry.get(value_type).kind,
        ) {
            (TypeKind::List { item: declared_item }, TypeKind::List { item: value_item }) => {
                vec![(*value_item, *declared_item)]
            }
            (
                TypeKind::Map {
                    key: declared_key,
                    value: declared_value,
                },
                TypeKind::Map {
                    key: value_key,
                    value: value_value,
                },
            ) => vec![
                (*value_key, *declared_key),
                (*value_value, *declared_value),
            ],
            _ => return false,
        };
        let mut inferred = false;
        for (placeholder, concrete) in pairs {
            if self.is_placeholder(placeholder) {
                self.resolve_placeholder(placeholder, concrete, false);
                inferred = true;
            }
        }
        inferred
    }

    // ========================================================================
    // Scopes, locals, upvalues
    // ========================================================================

    fn is_global_scope(&self) -> bool {
        self.frames.len() == 1 && self.frames[0].scope_depth == 0
    }

    fn current_frame(&self) -> usize {
        self.frames.len() - 1
    }

    fn begin_scope(&mut self) {
        let frame = self.current_frame();
        self.frames[frame].scope_depth += 1;
    }

    fn end_scope(&mut self) {
        let frame = self.current_frame();
        self.frames[frame].scope_depth -= 1;
        let depth = self.frames[frame].scope_depth;
        while let Some(local) = self.frames[frame].locals.last() {
            if local.depth <= depth {
                break;
            }
            self.frames[frame].locals.pop();
        }
    }

    fn add_local(&mut self, name: InternedString, type_def: TypeId, constant: bool) -> u8 {
        let frame = self.current_frame();
        if self.frames[frame].locals.len() >= MAX_LOCALS {
            self.error_at_previous(messages::TOO_MANY_LOCALS.to_string());
            return 0;
        }
        self.frames[frame].locals.push(Local {
            name,
            type_def,
            depth: -1,
            is_captured: false,
            constant,
        });
        (self.frames[frame].locals.len() - 1) as u8
    }

    fn resolve_local(&self, frame: usize, name: InternedString) -> Option<(u8, TypeId, bool, i32)> {
        let locals = &self.frames[frame].locals;
        for (index, local) in locals.iter().enumerate().rev() {
            if local.name == name {
                return Some((index as u8, local.type_def, local.constant, local.depth));
            }
        }
        None
    }

    fn add_upvalue(&mut self, frame: usize, index: u8, is_local: bool) -> u8 {
        for (i, upvalue) in self.frames[frame].upvalues.iter().enumerate() {
            if upvalue.index == index && upvalue.is_local == is_local {
                return i as u8;
            }
        }
        if self.frames[frame].upvalues.len() >= MAX_UPVALUES {
            self.error_at_previous(messages::TOO_MANY_UPVALUES.to_string());
            return 0;
        }
        self.frames[frame].upvalues.push(UpValue { index, is_local });
        (self.frames[frame].upvalues.len() - 1) as u8
    }

    fn resolve_upvalue(&mut self, frame: usize, name: InternedString) -> Option<(u8, TypeId, bool)> {
        let enclosing = self.frames[frame].enclosing?;
        if let Some((index, type_def, constant, _)) = self.resolve_local(enclosing, name) {
            self.frames[enclosing].locals[index as usize].is_captured = true;
            let upvalue = self.add_upvalue(frame, index, true);
            return Some((upvalue, type_def, constant));
        }
        if let Some((index, type_def, constant)) = self.resolve_upvalue(enclosing, name) {
            let upvalue = self.add_upvalue(frame, index, false);
            return Some((upvalue, type_def, constant));
        }
        None
    }

    /// Set the just-declared local's depth to the live scope.
    fn mark_local_initialized(&mut self, index: u8) {
        let frame = self.current_frame();
        let depth = self.frames[frame].scope_depth;
        if let Some(local) = self.frames[frame].locals.get_mut(index as usize) {
            local.depth = depth;
        }
    }

    // ========================================================================
    // Globals
    // ========================================================================

    /// Find a visible global by name (and optional prefix). Latest wins.
    fn find_global(&self, prefix: Option<InternedString>, name: InternedString) -> Option<usize> {
        self.globals
            .iter()
            .rposition(|g| !g.hidden && g.prefix == prefix && g.name == name)
    }

    fn is_prefix(&self, name: InternedString) -> bool {
        self.globals
            .iter()
            .any(|g| !g.hidden && g.prefix == Some(name))
    }

    /// Create a placeholder global for a forward reference. It is marked
    /// initialized so later uses can link to it.
    fn declare_placeholder(&mut self, name: InternedString, at: Token) -> usize {
        let placeholder = self.new_placeholder(Some(name), at);
        self.globals.push(Global {
            prefix: None,
            name,
            type_def: placeholder,
            initialized: true,
            exported: false,
            export_alias: None,
            hidden: false,
            constant: false,
            where_token: at,
        });
        self.globals.len() - 1
    }

    /// Declare a variable in the current scope.
    ///
    /// At global scope, a same-name placeholder global is a forward
    /// reference being fulfilled: it is resolved with `type_def` and its
    /// slot is reused. Any other same-name visible global is an error.
    fn declare_variable(
        &mut self,
        type_def: TypeId,
        name_token: Token,
        constant: bool,
        initialized: bool,
    ) -> Slot {
        let name = name_token.lexeme;
        if self.is_global_scope() {
            if let Some(index) = self.find_global(None, name) {
                if self.is_placeholder(self.globals[index].type_def) {
                    let placeholder = self.globals[index].type_def;
                    self.resolve_placeholder(placeholder, type_def, constant);
                    let keep = if self.is_placeholder(type_def) {
                        placeholder
                    } else {
                        type_def
                    };
                    let global = &mut self.globals[index];
                    global.type_def = keep;
                    global.constant = constant;
                    global.initialized = initialized;
                    global.where_token = name_token;
                    self.last_declared_global = Some(index);
                    return Slot::Global(index as u32);
                }
                let text = self.resolve_str(name);
                self.error_at(
                    name_token,
                    format_message(messages::GLOBAL_ALREADY_DECLARED, &[&text]),
                );
            }
            self.globals.push(Global {
                prefix: None,
                name,
                type_def,
                initialized,
                exported: false,
                export_alias: None,
                hidden: false,
                constant,
                where_token: name_token,
            });
            let index = self.globals.len() - 1;
            self.last_declared_global = Some(index);
            Slot::Global(index as u32)
        } else {
            // No shadowing within the same scope.
            let frame = self.current_frame();
            let depth = self.frames[frame].scope_depth;
            let mut duplicate = false;
            for local in self.frames[frame].locals.iter().rev() {
                if local.depth != -1 && local.depth < depth {
                    break;
                }
                if local.name == name {
                    duplicate = true;
                    break;
                }
            }
            if duplicate {
                let text = self.resolve_str(name);
                self.error_at(
                    name_token,
                    format_message(messages::ALREADY_DECLARED, &[&text]),
                );
            }
            let index = self.add_local(name, type_def, constant);
            if initialized {
                self.mark_local_initialized(index);
            }
            Slot::Local(index)
        }
    }

    fn mark_initialized(&mut self, slot: Slot) {
        match slot {
            Slot::Local(index) => self.mark_local_initialized(index),
            Slot::Global(index) => {
                if let Some(global) = self.globals.get_mut(index as usize) {
                    global.initialized = true;
                }
            }
            Slot::UpValue(_) => {}
        }
    }

    /// Report every global whose type is still a placeholder once this unit
    /// is fully parsed: nothing can resolve it anymore.
    fn report_unresolved_globals(&mut self) {
        let unresolved: Vec<(InternedString, Token)> = self
            .globals
            .iter()
            .filter(|g| !g.hidden && self.ctx.registry.is_placeholder(g.type_def))
            .map(|g| (g.name, g.where_token))
            .collect();
        for (name, token) in unresolved {
            self.panic_mode = false;
            let text = self.resolve_str(name);
            self.error_at(token, format_message(messages::UNRESOLVED_GLOBAL, &[&text]));
        }
    }

    // ========================================================================
    // Type expressions
    // ========================================================================

    /// Parse a type expression and return its *instance* form: an object or
    /// enum name denotes an instance of it, `[T]` a list, `{K,V}` a map. An
    /// unknown name becomes a placeholder global, and the returned type is a
    /// placeholder child that resolves to the instance form.
    fn parse_type_instance(&mut self) -> TypeId {
        let base = match self.current.kind {
            TokenKind::Str => {
                self.advance();
                self.ctx.registry.string_type
            }
            TokenKind::Num => {
                self.advance();
                self.ctx.registry.number_type
            }
            TokenKind::Bool => {
                self.advance();
                self.ctx.registry.bool_type
            }
            TokenKind::Type => {
                self.advance();
                self.ctx.registry.type_type
            }
            TokenKind::Void => {
                self.advance();
                self.ctx.registry.void_type
            }
            TokenKind::LeftBracket => {
                self.advance();
                let item = self.parse_type_instance();
                self.consume(TokenKind::RightBracket);
                self.ctx
                    .registry
                    .get_or_intern(TypeDef::new(TypeKind::List { item }))
            }
            TokenKind::LeftBrace => {
                self.advance();
                let key = self.parse_type_instance();
                self.consume(TokenKind::Comma);
                let value = self.parse_type_instance();
                self.consume(TokenKind::RightBrace);
                self.ctx
                    .registry
                    .get_or_intern(TypeDef::new(TypeKind::Map { key, value }))
            }
            TokenKind::Identifier => {
                let name_token = self.consume_identifier();
                self.user_type_instance(name_token)
            }
            _ => {
                self.error_at_current(messages::EXPECTED_TYPE.to_string());
                self.ctx.registry.void_type
            }
        };
        if self.matches(TokenKind::Question) {
            self.ctx.registry.with_optional(base, true)
        } else {
            base
        }
    }

    /// A user-declared type reference: `Point`, `Prefix.Point`, or a forward
    /// reference that becomes a placeholder.
    fn user_type_instance(&mut self, name_token: Token) -> TypeId {
        let name = name_token.lexeme;

        // `Prefix.Type`
        if self.find_global(None, name).is_none()
            && self.is_prefix(name)
            && self.check(TokenKind::Dot)
        {
            self.advance();
            let member = self.consume_identifier();
            if let Some(index) = self.find_global(Some(name), member.lexeme) {
                let type_def = self.globals[index].type_def;
                return self.type_to_instance(type_def, member);
            }
            let text = format!(
                "{}.{}",
                self.resolve_str(name),
                self.resolve_str(member.lexeme)
            );
            self.error_at(member, format_message(messages::UNKNOWN_VARIABLE, &[&text]));
            return self.ctx.registry.void_type;
        }

        if let Some(index) = self.find_global(None, name) {
            if !self.globals[index].initialized {
                let text = self.resolve_str(name);
                self.error_at(
                    name_token,
                    format_message(messages::READ_OWN_INITIALIZER, &[&text]),
                );
            }
            let type_def = self.globals[index].type_def;
            return self.type_to_instance(type_def, name_token);
        }

        // Forward reference.
        let index = self.declare_placeholder(name, name_token);
        let placeholder = self.globals[index].type_def;
        self.type_to_instance(placeholder, name_token)
    }

    fn type_to_instance(&mut self, type_def: TypeId, at: Token) -> TypeId {
        if self.is_placeholder(type_def) {
            child_placeholder(&mut self.ctx.registry, type_def, at, Relation::Instance, None)
        } else {
            self.ctx.registry.instance_of(type_def)
        }
    }

    // ========================================================================
    // Declarations and statements
    // ========================================================================

    fn declaration(&mut self) -> Statement<'a> {
        self.last_declared_global = None;
        match self.current.kind {
            TokenKind::Fun => {
                self.advance();
                self.fun_declaration(FunctionKind::Function)
            }
            TokenKind::Extern => {
                self.advance();
                self.extern_fun_declaration()
            }
            TokenKind::Object => {
                self.advance();
                self.object_declaration(false)
            }
            TokenKind::Class => {
                self.advance();
                self.object_declaration(true)
            }
            TokenKind::Enum => {
                self.advance();
                self.enum_declaration()
            }
            TokenKind::Import => {
                self.advance();
                self.import_statement()
            }
            TokenKind::Export => {
                self.advance();
                self.export_statement()
            }
            TokenKind::Test => {
                self.advance();
                self.test_statement()
            }
            _ => self.statement(),
        }
    }

    fn statement(&mut self) -> Statement<'a> {
        let current_kind = self.current.kind;
        match current_kind {
            TokenKind::If => {
                self.advance();
                self.if_statement()
            }
            TokenKind::While => {
                self.advance();
                self.while_statement()
            }
            TokenKind::Do => {
                self.advance();
                self.do_until_statement()
            }
            TokenKind::For => {
                self.advance();
                self.for_statement()
            }
            TokenKind::ForEach => {
                self.advance();
                self.foreach_statement()
            }
            TokenKind::Return => {
                self.advance();
                self.return_statement()
            }
            TokenKind::Throw => {
                self.advance();
                self.throw_statement()
            }
            TokenKind::Break => {
                self.advance();
                let token = self.previous;
                self.consume(TokenKind::Semicolon);
                Statement::Break(BreakNode {
                    data: NodeData::new(token),
                })
            }
            TokenKind::Continue => {
                self.advance();
                let token = self.previous;
                self.consume(TokenKind::Semicolon);
                Statement::Continue(ContinueNode {
                    data: NodeData::new(token),
                })
            }
            TokenKind::Const => {
                self.advance();
                let declared = self.parse_type_instance();
                self.var_declaration(declared, true)
            }
            TokenKind::Str | TokenKind::Num | TokenKind::Bool | TokenKind::Type => {
                let declared = self.parse_type_instance();
                self.var_declaration(declared, false)
            }
            TokenKind::LeftBracket if self.is_list_declaration() => {
                let declared = self.parse_type_instance();
                self.var_declaration(declared, false)
            }
            TokenKind::LeftBrace if self.is_map_declaration() => {
                let declared = self.parse_type_instance();
                self.var_declaration(declared, false)
            }
            TokenKind::LeftBrace => {
                self.advance();
                self.begin_scope();
                let block = self.block();
                self.end_scope();
                Statement::Block(block)
            }
            TokenKind::Identifier if self.is_user_typed_declaration() => {
                let declared = self.parse_type_instance();
                self.var_declaration(declared, false)
            }
            _ => self.expression_statement(),
        }
    }

    fn is_primitive_type_keyword(kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Str | TokenKind::Num | TokenKind::Bool | TokenKind::Type
        )
    }

    /// `[num] xs …` is a declaration; `[1, 2]` is a list literal. Peeks past
    /// the bracket to decide.
    fn is_list_declaration(&mut self) -> bool {
        match self.peek(0).kind {
            kind if Self::is_primitive_type_keyword(kind) => {
                self.peek(1).kind == TokenKind::RightBracket
                    && matches!(self.peek(2).kind, TokenKind::Identifier | TokenKind::Question)
            }
            TokenKind::Identifier => {
                self.peek(1).kind == TokenKind::RightBracket
                    && self.peek(2).kind == TokenKind::Identifier
            }
            // Nested composites: a type keyword right after the inner opener
            // decides (`[[num]] xs`, `[{str,num}] rows`).
            TokenKind::LeftBracket | TokenKind::LeftBrace => {
                Self::is_primitive_type_keyword(self.peek(1).kind)
            }
            _ => false,
        }
    }

    /// `{str,num} m …` is a declaration; `{ … }` is a block.
    fn is_map_declaration(&mut self) -> bool {
        match self.peek(0).kind {
            kind if Self::is_primitive_type_keyword(kind) => {
                self.peek(1).kind == TokenKind::Comma
            }
            TokenKind::Identifier => self.peek(1).kind == TokenKind::Comma,
            TokenKind::LeftBracket => Self::is_primitive_type_keyword(self.peek(1).kind),
            _ => false,
        }
    }

    /// Distinguish `Point p = …` / `Prefix.Point p = …` from an expression
    /// statement. Uses up to 3 tokens of look-ahead past `current`.
    fn is_user_typed_declaration(&mut self) -> bool {
        match self.peek(0).kind {
            TokenKind::Identifier => true,
            TokenKind::Question => self.peek(1).kind == TokenKind::Identifier,
            TokenKind::Dot => {
                self.peek(1).kind == TokenKind::Identifier
                    && self.peek(2).kind == TokenKind::Identifier
            }
            _ => false,
        }
    }

    fn expression_statement(&mut self) -> Statement<'a> {
        let expression = self.expression();
        self.consume(TokenKind::Semicolon);
        Statement::Expression(self.arena.alloc(expression))
    }

    fn var_declaration(&mut self, declared: TypeId, constant: bool) -> Statement<'a> {
        let statement = self.var_declaration_body(declared, constant);
        self.consume(TokenKind::Semicolon);
        statement
    }

    /// Common tail of every variable declaration: name and optional
    /// initializer. The caller consumes the terminator.
    fn var_declaration_body(&mut self, declared: TypeId, constant: bool) -> Statement<'a> {
        let name_token = self.consume_identifier();
        let slot = self.declare_variable(declared, name_token, constant, false);

        let value = if self.matches(TokenKind::Equal) {
            let equal = self.previous;
            let value = self.expression();
            self.check_assignment(declared, self.type_of(&value), equal);
            Some(&*self.arena.alloc(value))
        } else {
            None
        };
        self.mark_initialized(slot);

        let declaration = VarDeclarationNode {
            data: NodeData::typed(name_token, declared),
            identifier: name_token.lexeme,
            constant,
            value,
            slot,
        };
        match self.ctx.registry.get(declared).kind {
            TypeKind::List { .. } => {
                Statement::ListDeclaration(ListDeclarationNode { declaration })
            }
            TypeKind::Map { .. } => Statement::MapDeclaration(MapDeclarationNode { declaration }),
            _ => Statement::VarDeclaration(declaration),
        }
    }

    // ========================================================================
    // Control flow statements
    // ========================================================================

    fn block(&mut self) -> BlockNode<'a> {
        let open = self.previous;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            let before = (self.current.line, self.current.column, self.current.kind);
            statements.push(self.declaration());
            if self.panic_mode {
                self.synchronize();
            }
            let after = (self.current.line, self.current.column, self.current.kind);
            if before == after && !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof)
            {
                self.advance();
            }
        }
        self.consume(TokenKind::RightBrace);
        BlockNode {
            data: NodeData::new(open),
            statements: self.arena.alloc_slice_fill_iter(statements),
        }
    }

    fn condition(&mut self) -> &'a Expression<'a> {
        self.consume(TokenKind::LeftParen);
        let condition = self.expression();
        let condition_type = self.type_of(&condition);
        let bool_type = self.ctx.registry.bool_type;
        self.check_operand(condition_type, bool_type, condition.data().location);
        self.consume(TokenKind::RightParen);
        self.arena.alloc(condition)
    }

    fn if_statement(&mut self) -> Statement<'a> {
        let token = self.previous;
        let condition = self.condition();
        let body = {
            let branch = self.if_branch();
            &*self.arena.alloc(branch)
        };

        let else_branch = if self.matches(TokenKind::Else) {
            if self.matches(TokenKind::If) {
                let nested = self.if_statement();
                Some(&*self.arena.alloc(nested))
            } else {
                let branch = self.if_branch();
                Some(&*self.arena.alloc(branch))
            }
        } else {
            None
        };

        Statement::If(IfNode {
            data: NodeData::new(token),
            condition,
            body,
            else_branch,
        })
    }

    /// An `if`/`else` branch: a braced block or a single statement.
    fn if_branch(&mut self) -> Statement<'a> {
        if self.matches(TokenKind::LeftBrace) {
            self.begin_scope();
            let block = self.block();
            self.end_scope();
            Statement::Block(block)
        } else {
            self.statement()
        }
    }

    fn while_statement(&mut self) -> Statement<'a> {
        let token = self.previous;
        let condition = self.condition();
        self.consume(TokenKind::LeftBrace);
        self.begin_scope();
        let block = self.block();
        self.end_scope();
        Statement::While(WhileNode {
            data: NodeData::new(token),
            condition,
            block: self.arena.alloc(block),
        })
    }

    fn do_until_statement(&mut self) -> Statement<'a> {
        let token = self.previous;
        self.consume(TokenKind::LeftBrace);
        self.begin_scope();
        let block = self.block();
        self.end_scope();
        self.consume(TokenKind::Until);
        let condition = self.condition();
        self.matches(TokenKind::Semicolon);
        Statement::DoUntil(DoUntilNode {
            data: NodeData::new(token),
            block: self.arena.alloc(block),
            condition,
        })
    }

    fn for_statement(&mut self) -> Statement<'a> {
        let token = self.previous;
        self.consume(TokenKind::LeftParen);
        self.begin_scope();

        let mut init = Vec::new();
        if !self.check(TokenKind::Semicolon) {
            loop {
                let declared = self.parse_type_instance();
                init.push(self.var_declaration_body(declared, false));
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::Semicolon);

        let condition = self.expression();
        let condition_type = self.type_of(&condition);
        let bool_type = self.ctx.registry.bool_type;
        self.check_operand(condition_type, bool_type, condition.data().location);
        let condition = &*self.arena.alloc(condition);
        self.consume(TokenKind::Semicolon);

        let mut post_loop = Vec::new();
        while !self.check(TokenKind::RightParen) && !self.check(TokenKind::Eof) {
            post_loop.push(self.expression());
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightParen);

        self.consume(TokenKind::LeftBrace);
        let block = self.block();
        self.end_scope();

        Statement::For(ForNode {
            data: NodeData::new(token),
            init_declarations: self.arena.alloc_slice_fill_iter(init),
            condition,
            post_loop: self.arena.alloc_slice_fill_iter(post_loop),
            body: self.arena.alloc(block),
        })
    }

    fn foreach_statement(&mut self) -> Statement<'a> {
        let token = self.previous;
        self.consume(TokenKind::LeftParen);
        self.begin_scope();

        let first_type = self.parse_type_instance();
        let first_name = self.consume_identifier();
        let first_slot = self.declare_variable(first_type, first_name, false, true);

        let (key, value_type, value_name, value_slot) = if self.matches(TokenKind::Comma) {
            let value_type = self.parse_type_instance();
            let value_name = self.consume_identifier();
            let value_slot = self.declare_variable(value_type, value_name, false, true);
            (
                Some(VarDeclarationNode {
                    data: NodeData::typed(first_name, first_type),
                    identifier: first_name.lexeme,
                    constant: false,
                    value: None,
                    slot: first_slot,
                }),
                value_type,
                value_name,
                value_slot,
            )
        } else {
            (None, first_type, first_name, first_slot)
        };

        self.consume(TokenKind::In);
        let iterable = self.expression();
        let iterable_type = self.type_of(&iterable);
        self.check_iterable(iterable_type, &key, value_type, iterable.data().location);
        let iterable = &*self.arena.alloc(iterable);
        self.consume(TokenKind::RightParen);

        self.consume(TokenKind::LeftBrace);
        let block = self.block();
        self.end_scope();

        Statement::ForEach(ForEachNode {
            data: NodeData::new(token),
            key,
            value: VarDeclarationNode {
                data: NodeData::typed(value_name, value_type),
                identifier: value_name.lexeme,
                constant: false,
                value: None,
                slot: value_slot,
            },
            iterable,
            block: self.arena.alloc(block),
        })
    }

    fn check_iterable(
        &mut self,
        iterable_type: TypeId,
        key: &Option<VarDeclarationNode<'a>>,
        value_type: TypeId,
        at: Token,
    ) {
        if self.is_placeholder(iterable_type) {
            return;
        }
        let number = self.ctx.registry.number_type;
        let string = self.ctx.registry.string_type;
        match self.ctx.registry.get(iterable_type).kind {
            TypeKind::List { item } => {
                self.check_operand(item, value_type, at);
                if let Some(key) = key {
                    let key_type = key.data.type_def.unwrap_or(number);
                    self.check_operand(number, key_type, at);
                }
            }
            TypeKind::Map { key: key_type, value } => {
                self.check_operand(value, value_type, at);
                if let Some(key) = key {
                    let declared = key.data.type_def.unwrap_or(key_type);
                    self.check_operand(key_type, declared, at);
                }
            }
            TypeKind::String => {
                self.check_operand(string, value_type, at);
            }
            _ => {
                let name = self.type_name(iterable_type);
                self.error_at(at, format_message(messages::NOT_ITERABLE, &[&name]));
            }
        }
    }

    fn return_statement(&mut self) -> Statement<'a> {
        let token = self.previous;
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            let value = self.expression();
            let value_type = self.type_of(&value);
            let return_type = self.frames[self.current_frame()].return_type;
            self.check_operand(value_type, return_type, token);
            Some(&*self.arena.alloc(value))
        };
        self.consume(TokenKind::Semicolon);
        Statement::Return(ReturnNode {
            data: NodeData::new(token),
            value,
        })
    }

    fn throw_statement(&mut self) -> Statement<'a> {
        let token = self.previous;
        let expression = self.expression();
        self.consume(TokenKind::Semicolon);
        Statement::Throw(ThrowNode {
            data: NodeData::new(token),
            expression: self.arena.alloc(expression),
        })
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Parse a function from its parameter list on. The name token is the
    /// declaration site; `default_return` supplies the inferred return type
    /// of `catch` closures when the annotation is omitted.
    fn function(
        &mut self,
        name_token: Token,
        name: InternedString,
        kind: FunctionKind,
        default_return: Option<TypeId>,
    ) -> FunctionNode<'a> {
        let void_type = self.ctx.registry.void_type;
        let enclosing = self.current_frame();
        self.frames.push(Frame::new(Some(enclosing), void_type));

        // Slot 0: `this` in methods, reserved otherwise.
        let this_name = if kind == FunctionKind::Method {
            self.ctx.interner.intern("this")
        } else {
            self.ctx.interner.intern("")
        };
        let this_type = match (kind, &self.current_object) {
            (FunctionKind::Method, Some(object)) => {
                let def = object.def;
                self.ctx.registry.instance_of(def)
            }
            _ => void_type,
        };
        let frame = self.current_frame();
        self.frames[frame].locals.push(Local {
            name: this_name,
            type_def: this_type,
            depth: 0,
            is_captured: false,
            constant: true,
        });

        // Parameters.
        let mut parameters: IndexMap<InternedString, TypeId> = IndexMap::new();
        let mut has_defaults: FxHashMap<InternedString, bool> = FxHashMap::default();
        let mut defaults: Vec<Argument<'a>> = Vec::new();
        self.consume(TokenKind::LeftParen);
        while !self.check(TokenKind::RightParen) && !self.check(TokenKind::Eof) {
            if parameters.len() >= MAX_PARAMETERS {
                self.error_at_current(messages::TOO_MANY_PARAMETERS.to_string());
            }
            let parameter_type = self.parse_type_instance();
            let parameter_name = self.consume_identifier();
            let slot = self.declare_variable(parameter_type, parameter_name, false, true);
            self.mark_initialized(slot);

            let mut defaulted = false;
            if self.matches(TokenKind::Equal) {
                let equal = self.previous;
                let default = self.expression();
                self.check_assignment(parameter_type, self.type_of(&default), equal);
                defaults.push(Argument {
                    name: Some(parameter_name.lexeme),
                    value: self.arena.alloc(default),
                });
                defaulted = true;
            }
            parameters.insert(parameter_name.lexeme, parameter_type);
            has_defaults.insert(parameter_name.lexeme, defaulted);

            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightParen);

        // Return type.
        let return_type = if self.matches(TokenKind::Greater) {
            self.parse_type_instance()
        } else {
            default_return.unwrap_or(void_type)
        };
        let frame = self.current_frame();
        self.frames[frame].return_type = return_type;

        let function_type = self
            .ctx
            .registry
            .get_or_intern(TypeDef::new(TypeKind::Function(FunctionDef {
                name,
                return_type,
                parameters,
                has_defaults,
                kind,
                lambda: kind == FunctionKind::Anonymous,
            })));

        // Body.
        let body = if kind == FunctionKind::Extern {
            None
        } else {
            self.consume(TokenKind::LeftBrace);
            let block = self.block();
            Some(&*self.arena.alloc(block))
        };

        let frame = self
            .frames
            .pop()
            .unwrap_or_else(|| Frame::new(None, void_type));
        FunctionNode {
            data: NodeData::typed(name_token, function_type),
            name,
            body,
            defaults: self.arena.alloc_slice_fill_iter(defaults),
            upvalue_count: frame.upvalues.len() as u8,
            native: None,
        }
    }

    /// `fun name(…) > T { … }`. The function's global is pre-registered as a
    /// placeholder before the body parses, so the body can reference the
    /// function by name.
    fn fun_declaration(&mut self, kind: FunctionKind) -> Statement<'a> {
        let name_token = self.consume_identifier();
        let name = name_token.lexeme;

        let kind = if kind == FunctionKind::Function
            && !self.imported
            && self.is_global_scope()
            && self.ctx.interner.resolve(name) == "main"
        {
            FunctionKind::EntryPoint
        } else {
            kind
        };

        let placeholder = self.new_placeholder(Some(name), name_token);
        let slot = self.declare_variable(placeholder, name_token, true, true);

        match slot {
            Slot::Global(index) => {
                let index = index as usize;
                // The slot keeps the forward placeholder when one existed.
                let registered = self.globals[index].type_def;

                let function = self.function(name_token, name, kind, None);
                let function_type = function
                    .data
                    .type_def
                    .unwrap_or(self.ctx.registry.void_type);
                self.resolve_placeholder(registered, function_type, true);
                self.globals[index].type_def = function_type;
                self.last_declared_global = Some(index);

                Statement::FunDeclaration(FunDeclarationNode {
                    data: NodeData::typed(name_token, function_type),
                    function,
                    slot: Slot::Global(index as u32),
                })
            }
            slot => {
                // Local function: initialized before the body parses so it
                // can recurse through its own slot.
                let function = self.function(name_token, name, kind, None);
                let function_type = function
                    .data
                    .type_def
                    .unwrap_or(self.ctx.registry.void_type);
                self.resolve_placeholder(placeholder, function_type, true);
                if let Slot::Local(index) = slot {
                    let frame = self.current_frame();
                    if let Some(local) = self.frames[frame].locals.get_mut(index as usize) {
                        local.type_def = function_type;
                    }
                }
                Statement::FunDeclaration(FunDeclarationNode {
                    data: NodeData::typed(name_token, function_type),
                    function,
                    slot,
                })
            }
        }
    }

    /// `extern fun name(…) > T;` has no body; the native symbol is resolved
    /// with the current script name as library name.
    fn extern_fun_declaration(&mut self) -> Statement<'a> {
        self.consume(TokenKind::Fun);
        let name_token = self.consume_identifier();
        let name = name_token.lexeme;

        let placeholder = self.new_placeholder(Some(name), name_token);
        let slot = self.declare_variable(placeholder, name_token, true, true);
        let (global_index, registered) = match slot {
            Slot::Global(index) => {
                let index = index as usize;
                (Some(index), self.globals[index].type_def)
            }
            _ => (None, placeholder),
        };

        let mut function = self.function(name_token, name, FunctionKind::Extern, None);
        self.consume(TokenKind::Semicolon);

        let lib_name = library_name(&self.resolve_str(self.script_name));
        let symbol = self.resolve_str(name);
        match self.ctx.resolver.resolve(&lib_name, &symbol) {
            Ok(handle) => function.native = Some(handle),
            Err(error) => {
                self.error_at(
                    name_token,
                    format_message(messages::NATIVE_NOT_FOUND, &[&symbol, &lib_name, &error]),
                );
            }
        }

        let function_type = function
            .data
            .type_def
            .unwrap_or(self.ctx.registry.void_type);
        self.resolve_placeholder(registered, function_type, true);
        if let Some(index) = global_index {
            self.globals[index].type_def = function_type;
            self.last_declared_global = Some(index);
        }

        Statement::FunDeclaration(FunDeclarationNode {
            data: NodeData::typed(name_token, function_type),
            function,
            slot,
        })
    }

    /// `test "description" { … }`: a function of kind `Test` with a unique
    /// synthetic name.
    fn test_statement(&mut self) -> Statement<'a> {
        let message_token = self.consume(TokenKind::String);
        let synthetic = format!("$test#{}", self.test_count);
        self.test_count += 1;
        let name = self.ctx.interner.intern(&synthetic);

        let void_type = self.ctx.registry.void_type;
        let enclosing = self.current_frame();
        self.frames.push(Frame::new(Some(enclosing), void_type));
        let empty = self.ctx.interner.intern("");
        let frame = self.current_frame();
        self.frames[frame].locals.push(Local {
            name: empty,
            type_def: void_type,
            depth: 0,
            is_captured: false,
            constant: true,
        });

        let function_type = self
            .ctx
            .registry
            .get_or_intern(TypeDef::new(TypeKind::Function(FunctionDef {
                name,
                return_type: void_type,
                parameters: IndexMap::new(),
                has_defaults: FxHashMap::default(),
                kind: FunctionKind::Test,
                lambda: false,
            })));

        self.consume(TokenKind::LeftBrace);
        let block = self.block();
        let frame = self.frames.pop();

        let function = FunctionNode {
            data: NodeData::typed(message_token, function_type),
            name,
            body: Some(self.arena.alloc(block)),
            defaults: &[],
            upvalue_count: frame.map(|f| f.upvalues.len() as u8).unwrap_or(0),
            native: None,
        };

        let slot = self.declare_variable(function_type, message_token, true, true);
        // The global is keyed by the synthetic name, not the message.
        if let Slot::Global(index) = slot {
            if let Some(global) = self.globals.get_mut(index as usize) {
                global.name = name;
            }
        }
        Statement::FunDeclaration(FunDeclarationNode {
            data: NodeData::typed(message_token, function_type),
            function,
            slot,
        })
    }

    // ========================================================================
    // Objects, classes, enums
    // ========================================================================

    fn object_declaration(&mut self, inheritable: bool) -> Statement<'a> {
        let keyword = self.previous;
        if !self.is_global_scope() {
            self.error_at(keyword, messages::OBJECT_NOT_TOP_LEVEL.to_string());
        }
        let name_token = self.consume_identifier();
        let name = name_token.lexeme;

        let object_def = self
            .ctx
            .registry
            .add(TypeDef::new(TypeKind::Object(ObjectDef::new(
                name,
                inheritable,
            ))));

        // Claim the global slot now; the forward placeholder (if any) is
        // resolved only after the members are parsed.
        let mut pending_placeholder = None;
        let index = match self.find_global(None, name) {
            Some(index) => {
                if self.is_placeholder(self.globals[index].type_def) {
                    pending_placeholder = Some(self.globals[index].type_def);
                } else {
                    let text = self.resolve_str(name);
                    self.error_at(
                        name_token,
                        format_message(messages::GLOBAL_ALREADY_DECLARED, &[&text]),
                    );
                }
                let global = &mut self.globals[index];
                global.type_def = object_def;
                global.constant = true;
                global.initialized = true;
                global.where_token = name_token;
                index
            }
            None => {
                self.globals.push(Global {
                    prefix: None,
                    name,
                    type_def: object_def,
                    initialized: true,
                    exported: false,
                    export_alias: None,
                    hidden: false,
                    constant: true,
                    where_token: name_token,
                });
                self.globals.len() - 1
            }
        };
        self.last_declared_global = Some(index);

        // `class Sub < Super`
        let mut has_super = false;
        if inheritable && self.matches(TokenKind::Less) {
            let super_token = self.consume_identifier();
            match self.find_global(None, super_token.lexeme) {
                Some(super_index) => {
                    let super_type = self.globals[super_index].type_def;
                    let is_inheritable = matches!(
                        &self.ctx.registry.get(super_type).kind,
                        TypeKind::Object(def) if def.inheritable
                    );
                    if is_inheritable {
                        if let TypeKind::Object(def) =
                            &mut self.ctx.registry.get_mut(object_def).kind
                        {
                            def.super_type = Some(super_type);
                        }
                        has_super = true;
                    } else {
                        let text = self.resolve_str(super_token.lexeme);
                        self.error_at(
                            super_token,
                            format_message(messages::NOT_INHERITABLE, &[&text]),
                        );
                    }
                }
                None => {
                    let text = self.resolve_str(super_token.lexeme);
                    self.error_at(
                        super_token,
                        format_message(messages::UNKNOWN_VARIABLE, &[&text]),
                    );
                }
            }
        }

        self.current_object = Some(ObjectContext {
            def: object_def,
            has_super,
        });

        let mut fields: Vec<ObjectField<'a>> = Vec::new();
        let mut methods: Vec<ObjectMethod<'a>> = Vec::new();

        self.consume(TokenKind::LeftBrace);
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            let is_static = self.matches(TokenKind::Static);

            if self.matches(TokenKind::Fun) {
                let method_token = self.consume_identifier();
                let method_name = method_token.lexeme;
                if self.object_has_member(object_def, method_name) {
                    let text = self.resolve_str(method_name);
                    self.error_at(
                        method_token,
                        format_message(messages::DUPLICATE_MEMBER, &[&text]),
                    );
                }
                let method = self.function(method_token, method_name, FunctionKind::Method, None);
                let method_type = method
                    .data
                    .type_def
                    .unwrap_or(self.ctx.registry.void_type);
                let resolved = if let TypeKind::Object(def) =
                    &mut self.ctx.registry.get_mut(object_def).kind
                {
                    def.methods.insert(method_name, method_type);
                    def.placeholders.remove(&method_name)
                } else {
                    None
                };
                if let Some(member_placeholder) = resolved {
                    self.resolve_placeholder(member_placeholder, method_type, true);
                }
                methods.push(ObjectMethod {
                    name: method_name,
                    method,
                });
                continue;
            }

            let field_type = self.parse_type_instance();
            let field_token = self.consume_identifier();
            let field_name = field_token.lexeme;
            if self.object_has_member(object_def, field_name) {
                let text = self.resolve_str(field_name);
                self.error_at(
                    field_token,
                    format_message(messages::DUPLICATE_MEMBER, &[&text]),
                );
            }
            let default = if self.matches(TokenKind::Equal) {
                let equal = self.previous;
                let default = self.expression();
                self.check_assignment(field_type, self.type_of(&default), equal);
                Some(&*self.arena.alloc(default))
            } else {
                None
            };
            // Static fields use `;`, instance fields `,`.
            if is_static {
                self.consume(TokenKind::Semicolon);
            } else {
                self.consume(TokenKind::Comma);
            }

            let resolved =
                if let TypeKind::Object(def) = &mut self.ctx.registry.get_mut(object_def).kind {
                    if is_static {
                        def.static_fields.insert(field_name, field_type);
                        def.static_placeholders.remove(&field_name)
                    } else {
                        def.fields.insert(field_name, field_type);
                        def.placeholders.remove(&field_name)
                    }
                } else {
                    None
                };
            if let Some(member_placeholder) = resolved {
                self.resolve_placeholder(member_placeholder, field_type, false);
            }
            fields.push(ObjectField {
                name: field_name,
                type_def: field_type,
                default,
                is_static,
            });
        }
        self.consume(TokenKind::RightBrace);

        // Members referenced through `this`/statics but never declared.
        let leftovers: Vec<(InternedString, TypeId)> =
            if let TypeKind::Object(def) = &self.ctx.registry.get(object_def).kind {
                def.placeholders
                    .iter()
                    .chain(def.static_placeholders.iter())
                    .map(|(k, v)| (*k, *v))
                    .collect()
            } else {
                Vec::new()
            };
        for (member, member_placeholder) in leftovers {
            let where_token = match &self.ctx.registry.get(member_placeholder).kind {
                TypeKind::Placeholder(def) => def.where_token,
                _ => name_token,
            };
            self.panic_mode = false;
            let type_text = self.resolve_str(name);
            let member_text = self.resolve_str(member);
            self.error_at(
                where_token,
                format_message(messages::MEMBER_NOT_FOUND, &[&type_text, &member_text]),
            );
        }

        self.current_object = None;

        if let Some(placeholder) = pending_placeholder {
            self.resolve_placeholder(placeholder, object_def, true);
        }

        Statement::ObjectDeclaration(ObjectDeclarationNode {
            data: NodeData::typed(name_token, object_def),
            name,
            fields: self.arena.alloc_slice_fill_iter(fields),
            methods: self.arena.alloc_slice_fill_iter(methods),
            slot: Slot::Global(index as u32),
        })
    }

    fn object_has_member(&self, object_def: TypeId, name: InternedString) -> bool {
        if let TypeKind::Object(def) = &self.ctx.registry.get(object_def).kind {
            def.fields.contains_key(&name)
                || def.methods.contains_key(&name)
                || def.static_fields.contains_key(&name)
        } else {
            false
        }
    }

    /// Instance member lookup walking the superclass chain.
    fn object_member(&self, object_def: TypeId, name: InternedString) -> Option<TypeId> {
        let mut cursor = Some(object_def);
        while let Some(def_id) = cursor {
            match &self.ctx.registry.get(def_id).kind {
                TypeKind::Object(def) => {
                    if let Some(member) = def.member(name) {
                        return Some(member);
                    }
                    cursor = def.super_type;
                }
                _ => break,
            }
        }
        None
    }

    fn enum_declaration(&mut self) -> Statement<'a> {
        let keyword = self.previous;
        if !self.is_global_scope() {
            self.error_at(keyword, messages::OBJECT_NOT_TOP_LEVEL.to_string());
        }

        // `enum(str) Name` picks the case value type; default is `num`.
        let case_type = if self.matches(TokenKind::LeftParen) {
            let case_type = self.parse_type_instance();
            self.consume(TokenKind::RightParen);
            case_type
        } else {
            self.ctx.registry.number_type
        };

        let name_token = self.consume_identifier();
        let name = name_token.lexeme;
        let number_type = self.ctx.registry.number_type;

        let mut cases: Vec<EnumCase<'a>> = Vec::new();
        let mut case_names: Vec<InternedString> = Vec::new();

        self.consume(TokenKind::LeftBrace);
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            let case_token = self.consume_identifier();
            let case_name = case_token.lexeme;
            if case_names.contains(&case_name) {
                let text = self.resolve_str(case_name);
                self.error_at(
                    case_token,
                    format_message(messages::DUPLICATE_MEMBER, &[&text]),
                );
            }
            let value = if self.matches(TokenKind::Equal) {
                let equal = self.previous;
                let value = self.expression();
                self.check_operand(self.type_of(&value), case_type, equal);
                Some(&*self.arena.alloc(value))
            } else {
                if case_type != number_type {
                    let expected = self.type_name(case_type);
                    self.error_at(
                        case_token,
                        format_message(messages::ENUM_CASE_VALUE_TYPE, &[&expected]),
                    );
                }
                None
            };
            case_names.push(case_name);
            cases.push(EnumCase {
                name: case_name,
                value,
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightBrace);

        if cases.is_empty() {
            let text = self.resolve_str(name);
            self.error_at(name_token, format_message(messages::EMPTY_ENUM, &[&text]));
        }

        let enum_def = self
            .ctx
            .registry
            .add(TypeDef::new(TypeKind::Enum(buzz_types::EnumDef {
                name,
                case_type,
                cases: case_names,
            })));

        let mut pending_placeholder = None;
        let index = match self.find_global(None, name) {
            Some(index) => {
                if self.is_placeholder(self.globals[index].type_def) {
                    pending_placeholder = Some(self.globals[index].type_def);
                } else {
                    let text = self.resolve_str(name);
                    self.error_at(
                        name_token,
                        format_message(messages::GLOBAL_ALREADY_DECLARED, &[&text]),
                    );
                }
                let global = &mut self.globals[index];
                global.type_def = enum_def;
                global.constant = true;
                global.initialized = true;
                global.where_token = name_token;
                index
            }
            None => {
                self.globals.push(Global {
                    prefix: None,
                    name,
                    type_def: enum_def,
                    initialized: true,
                    exported: false,
                    export_alias: None,
                    hidden: false,
                    constant: true,
                    where_token: name_token,
                });
                self.globals.len() - 1
            }
        };
        self.last_declared_global = Some(index);

        if let Some(placeholder) = pending_placeholder {
            self.resolve_placeholder(placeholder, enum_def, true);
        }

        Statement::Enum(EnumNode {
            data: NodeData::typed(name_token, enum_def),
            name,
            cases: self.arena.alloc_slice_fill_iter(cases),
            slot: Slot::Global(index as u32),
        })
    }

    // ========================================================================
    // Imports and exports
    // ========================================================================

    fn import_statement(&mut self) -> Statement<'a> {
        let keyword = self.previous;
        if !self.is_global_scope() {
            self.error_at(keyword, messages::IMPORT_NOT_TOP_LEVEL.to_string());
        }

        let mut symbols: Vec<InternedString> = Vec::new();
        if self.matches(TokenKind::LeftBrace) {
            while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
                let symbol = self.consume_identifier();
                symbols.push(symbol.lexeme);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
            self.consume(TokenKind::RightBrace);
            self.consume(TokenKind::From);
        }

        let path_token = self.consume(TokenKind::String);
        let path = path_token
            .literal_string
            .map(|s| self.resolve_str(s))
            .unwrap_or_default();

        let prefix = if self.matches(TokenKind::As) {
            Some(self.consume_identifier().lexeme)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon);

        let (function, imported_globals) = self.load_import(&path, path_token);
        if let Some(globals) = imported_globals {
            self.merge_imported_globals(&globals, &symbols, prefix, path_token);
        }

        Statement::Import(ImportNode {
            data: NodeData::new(keyword),
            imported_symbols: self.arena.alloc_slice_fill_iter(symbols),
            prefix,
            path: path_token.literal_string.unwrap_or(path_token.lexeme),
            function,
        })
    }

    /// Locate, read and recursively parse an imported unit, or fetch it from
    /// the imports cache.
    fn load_import(
        &mut self,
        path: &str,
        path_token: Token,
    ) -> (Option<&'a FunctionNode<'a>>, Option<Vec<Global>>) {
        if let Some(cached) = self.ctx.imports.get(path) {
            return (Some(cached.function), Some(cached.globals.clone()));
        }
        if self.ctx.parsing.contains(path) {
            self.error_at(
                path_token,
                format_message(messages::CIRCULAR_IMPORT, &[path]),
            );
            return (None, None);
        }

        let file = match buzz_module::resolve_script(path) {
            Some(file) => file,
            None => {
                self.error_at(
                    path_token,
                    format_message(messages::IMPORT_NOT_FOUND, &[path]),
                );
                return (None, None);
            }
        };
        let source = match std::fs::read_to_string(&file) {
            Ok(source) => source,
            Err(_) => {
                self.error_at(
                    path_token,
                    format_message(messages::IMPORT_NOT_FOUND, &[path]),
                );
                return (None, None);
            }
        };

        self.ctx.parsing.insert(path.to_string());
        let file_name = file.display().to_string();
        let result = Parser::parse(self.arena, &mut *self.ctx, &source, &file_name, true);
        self.ctx.parsing.remove(path);

        if result.diagnostics.has_errors() {
            self.had_error = true;
        }
        self.diagnostics.extend(result.diagnostics);

        match result.function {
            Some(function) => {
                self.ctx.imports.insert(
                    path.to_string(),
                    ScriptImport {
                        function,
                        globals: result.globals.clone(),
                    },
                );
                (Some(function), Some(result.globals))
            }
            None => (None, Some(result.globals)),
        }
    }

    /// Append the imported unit's globals to this unit's list. Exported and
    /// selected entries become visible (renamed to their export alias);
    /// everything else is appended hidden so indices stay stable.
    fn merge_imported_globals(
        &mut self,
        imported: &[Global],
        symbols: &[InternedString],
        prefix: Option<InternedString>,
        path_token: Token,
    ) {
        let mut matched: FxHashSet<InternedString> = FxHashSet::default();

        for global in imported {
            let visible_name = global.visible_name();
            let selected = symbols.is_empty() || symbols.contains(&visible_name);
            let visible = global.exported && !global.hidden && selected;
            if visible {
                matched.insert(visible_name);
            }

            let mut merged = global.clone();
            merged.name = visible_name;
            merged.export_alias = None;
            merged.exported = false;
            merged.hidden = !visible;
            if prefix.is_some() {
                merged.prefix = prefix;
            }

            if visible && self.find_global(merged.prefix, merged.name).is_some() {
                self.panic_mode = false;
                let text = self.resolve_str(merged.name);
                self.error_at(
                    path_token,
                    format_message(messages::IMPORT_NAME_COLLISION, &[&text]),
                );
                merged.hidden = true;
            }
            self.globals.push(merged);
        }

        for &symbol in symbols {
            if !matched.contains(&symbol) {
                self.panic_mode = false;
                let path =
                    self.resolve_str(path_token.literal_string.unwrap_or(path_token.lexeme));
                let text = self.resolve_str(symbol);
                self.error_at(
                    path_token,
                    format_message(messages::IMPORT_UNKNOWN_SYMBOL, &[&path, &text]),
                );
            }
        }
    }

    fn export_statement(&mut self) -> Statement<'a> {
        let keyword = self.previous;
        if !self.is_global_scope() {
            self.error_at(keyword, messages::IMPORT_NOT_TOP_LEVEL.to_string());
        }

        // `export <declaration>` flips the declared global.
        let is_reference = self.check(TokenKind::Identifier)
            && matches!(self.peek(0).kind, TokenKind::As | TokenKind::Semicolon);
        if !is_reference {
            let statement = self.declaration();
            if let Some(index) = self.last_declared_global {
                self.globals[index].exported = true;
            } else {
                self.error_at(keyword, messages::EXPECTED_IDENTIFIER.to_string());
            }
            return statement;
        }

        let name_token = self.consume_identifier();
        let name = name_token.lexeme;
        let alias = if self.matches(TokenKind::As) {
            Some(self.consume_identifier().lexeme)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon);

        // Export requires immediate resolution; no placeholder is created.
        match self.find_global(None, name) {
            Some(index) => {
                if self.globals[index].prefix.is_some() && alias.is_none() {
                    self.error_at(name_token, messages::EXPORT_NEEDS_ALIAS.to_string());
                }
                let global = &mut self.globals[index];
                global.exported = true;
                global.export_alias = alias;
            }
            None => {
                // The name may live under an import prefix.
                let prefixed = self
                    .globals
                    .iter()
                    .rposition(|g| !g.hidden && g.name == name && g.prefix.is_some());
                match prefixed {
                    Some(index) => {
                        if alias.is_none() {
                            self.error_at(name_token, messages::EXPORT_NEEDS_ALIAS.to_string());
                        }
                        let global = &mut self.globals[index];
                        global.exported = true;
                        global.export_alias = alias;
                    }
                    None => {
                        let text = self.resolve_str(name);
                        self.error_at(
                            name_token,
                            format_message(messages::UNRESOLVED_GLOBAL, &[&text]),
                        );
                    }
                }
            }
        }

        Statement::Export(ExportNode {
            data: NodeData::new(keyword),
            identifier: name,
            alias,
        })
    }

    // ========================================================================
    // Expressions: Pratt core
    // ========================================================================

    fn expression(&mut self) -> Expression<'a> {
        self.parse_precedence(Precedence::Assignment, false)
    }

    fn parse_precedence(&mut self, precedence: Precedence, hanging: bool) -> Expression<'a> {
        if !hanging {
            self.advance();
        }
        let can_assign = precedence <= Precedence::Assignment;

        let mut expression = match self.previous.kind {
            TokenKind::LeftParen => {
                let inner = self.expression();
                self.consume(TokenKind::RightParen);
                inner
            }
            TokenKind::Minus | TokenKind::Bang => self.unary(),
            TokenKind::Number => self.number(),
            TokenKind::String => self.string(),
            TokenKind::True | TokenKind::False => self.boolean(),
            TokenKind::Null => self.null(),
            TokenKind::Identifier => self.variable(can_assign),
            TokenKind::LeftBracket => self.list_literal(),
            TokenKind::LeftBrace => self.map_literal(),
            TokenKind::Fun => self.anonymous_function(),
            TokenKind::Super => self.super_expression(),
            TokenKind::This => self.this_expression(),
            _ => {
                self.error_at_previous(messages::EXPECTED_EXPRESSION.to_string());
                let token = self.previous;
                let void_type = self.ctx.registry.void_type;
                Expression::Null(NullNode {
                    data: NodeData::typed(token, void_type),
                })
            }
        };

        while infix_precedence(self.current.kind) != Precedence::None
            && infix_precedence(self.current.kind) >= precedence
        {
            self.advance();
            let left = &*self.arena.alloc(expression);
            expression = match self.previous.kind {
                TokenKind::LeftParen => self.call(left),
                TokenKind::Dot => self.dot(left, can_assign),
                TokenKind::LeftBracket => self.subscript(left, can_assign),
                TokenKind::Question => self.unwrap(left, false),
                TokenKind::Bang => self.unwrap(left, true),
                TokenKind::And => self.and(left),
                TokenKind::Or => self.or(left),
                TokenKind::Is => self.is_expression(left),
                TokenKind::QuestionQuestion => self.null_coalescing(left),
                _ => self.binary(left),
            };
        }

        if can_assign && self.matches(TokenKind::Equal) {
            self.error_at_previous(messages::INVALID_ASSIGNMENT_TARGET.to_string());
        }
        expression
    }

    // ========================================================================
    // Expressions: prefix rules
    // ========================================================================

    fn number(&mut self) -> Expression<'a> {
        let token = self.previous;
        let number_type = self.ctx.registry.number_type;
        Expression::Number(NumberNode {
            data: NodeData::typed(token, number_type),
            value: token.literal_number.unwrap_or(0.0),
        })
    }

    /// A string literal. `{…}` segments are interpolated expressions; a
    /// string without any becomes a plain `StringLiteral`.
    fn string(&mut self) -> Expression<'a> {
        let token = self.previous;
        let string_type = self.ctx.registry.string_type;

        let raw = {
            let full = self.resolve_str(token.lexeme);
            let trimmed = full.strip_prefix('"').unwrap_or(&full);
            trimmed.strip_suffix('"').unwrap_or(trimmed).to_string()
        };

        let mut parts: Vec<Expression<'a>> = Vec::new();
        let mut literal = String::new();
        let mut interpolated = false;
        let mut chars = raw.char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        literal.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            '0' => '\0',
                            other => other,
                        });
                    }
                }
                '{' => {
                    interpolated = true;
                    if !literal.is_empty() {
                        let value = self.ctx.interner.intern(&literal);
                        parts.push(Expression::StringLiteral(StringLiteralNode {
                            data: NodeData::typed(token, string_type),
                            value,
                        }));
                        literal.clear();
                    }
                    let mut inner = String::new();
                    let mut depth = 1;
                    for (_, inner_char) in chars.by_ref() {
                        match inner_char {
                            '{' => {
                                depth += 1;
                                inner.push(inner_char);
                            }
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                                inner.push(inner_char);
                            }
                            _ => inner.push(inner_char),
                        }
                    }
                    parts.push(self.interpolated_expression(&inner, token, offset + 1));
                }
                _ => literal.push(c),
            }
        }

        if !interpolated {
            return Expression::StringLiteral(StringLiteralNode {
                data: NodeData::typed(token, string_type),
                value: token.literal_string.unwrap_or(token.lexeme),
            });
        }
        if !literal.is_empty() {
            let value = self.ctx.interner.intern(&literal);
            parts.push(Expression::StringLiteral(StringLiteralNode {
                data: NodeData::typed(token, string_type),
                value,
            }));
        }
        Expression::String(StringNode {
            data: NodeData::typed(token, string_type),
            parts: self.arena.alloc_slice_fill_iter(parts),
        })
    }

    /// Parse one interpolated segment by swapping the scanner out; frames,
    /// globals and everything else stay, so the segment sees the enclosing
    /// scope.
    fn interpolated_expression(
        &mut self,
        source: &str,
        token: Token,
        offset: usize,
    ) -> Expression<'a> {
        let scanner = Scanner::with_position(
            source,
            token.script,
            self.ctx.interner.clone(),
            token.line,
            token.column + offset as u32 + 1,
        );
        let saved_scanner = std::mem::replace(&mut self.scanner, scanner);
        let saved_previous = self.previous;
        let saved_current = self.current;
        let saved_ahead = std::mem::take(&mut self.ahead);

        self.advance();
        let expression = self.expression();

        self.scanner = saved_scanner;
        self.previous = saved_previous;
        self.current = saved_current;
        self.ahead = saved_ahead;
        expression
    }

    fn boolean(&mut self) -> Expression<'a> {
        let token = self.previous;
        let bool_type = self.ctx.registry.bool_type;
        Expression::Boolean(BooleanNode {
            data: NodeData::typed(token, bool_type),
            value: token.kind == TokenKind::True,
        })
    }

    fn null(&mut self) -> Expression<'a> {
        let token = self.previous;
        let void_type = self.ctx.registry.void_type;
        let null_type = self.ctx.registry.with_optional(void_type, true);
        Expression::Null(NullNode {
            data: NodeData::typed(token, null_type),
        })
    }

    fn unary(&mut self) -> Expression<'a> {
        let operator_token = self.previous;
        let operator = operator_token.kind;
        let operand = self.parse_precedence(Precedence::Unary, false);
        let operand_type = self.type_of(&operand);

        let result_type = match operator {
            TokenKind::Bang => {
                let bool_type = self.ctx.registry.bool_type;
                self.check_operand(operand_type, bool_type, operator_token);
                bool_type
            }
            _ => {
                let number_type = self.ctx.registry.number_type;
                self.check_operand(operand_type, number_type, operator_token);
                number_type
            }
        };

        Expression::Unary(UnaryNode {
            data: NodeData::typed(operator_token, result_type),
            operator,
            operand: self.arena.alloc(operand),
        })
    }

    fn list_literal(&mut self) -> Expression<'a> {
        let open = self.previous;
        let mut items: Vec<Expression<'a>> = Vec::new();
        let mut item_type: Option<TypeId> = None;

        while !self.check(TokenKind::RightBracket) && !self.check(TokenKind::Eof) {
            let item = self.expression();
            let this_type = self.type_of(&item);
            match item_type {
                None => item_type = Some(this_type),
                Some(expected) => self.check_operand(this_type, expected, item.data().location),
            }
            items.push(item);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightBracket);

        let item = item_type.unwrap_or_else(|| {
            self.ctx
                .registry
                .add(TypeDef::new(TypeKind::Placeholder(PlaceholderDef::new(
                    None, open,
                ))))
        });
        // A list whose element type is still a placeholder must keep its own
        // identity; interning would merge all empty list literals.
        let list_def = TypeDef::new(TypeKind::List { item });
        let list_type = if self.is_placeholder(item) {
            self.ctx.registry.add(list_def)
        } else {
            self.ctx.registry.get_or_intern(list_def)
        };
        Expression::List(ListNode {
            data: NodeData::typed(open, list_type),
            items: self.arena.alloc_slice_fill_iter(items),
        })
    }

    fn map_literal(&mut self) -> Expression<'a> {
        let open = self.previous;
        let mut keys: Vec<Expression<'a>> = Vec::new();
        let mut values: Vec<Expression<'a>> = Vec::new();
        let mut key_type: Option<TypeId> = None;
        let mut value_type: Option<TypeId> = None;

        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            let key = self.expression();
            let this_key = self.type_of(&key);
            match key_type {
                None => key_type = Some(this_key),
                Some(expected) => self.check_operand(this_key, expected, key.data().location),
            }
            self.consume(TokenKind::Colon);
            let value = self.expression();
            let this_value = self.type_of(&value);
            match value_type {
                None => value_type = Some(this_value),
                Some(expected) => self.check_operand(this_value, expected, value.data().location),
            }
            keys.push(key);
            values.push(value);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightBrace);

        let key = key_type.unwrap_or_else(|| {
            self.ctx
                .registry
                .add(TypeDef::new(TypeKind::Placeholder(PlaceholderDef::new(
                    None, open,
                ))))
        });
        let value = value_type.unwrap_or_else(|| {
            self.ctx
                .registry
                .add(TypeDef::new(TypeKind::Placeholder(PlaceholderDef::new(
                    None, open,
                ))))
        });
        let map_def = TypeDef::new(TypeKind::Map { key, value });
        let map_type = if self.is_placeholder(key) || self.is_placeholder(value) {
            self.ctx.registry.add(map_def)
        } else {
            self.ctx.registry.get_or_intern(map_def)
        };
        Expression::Map(MapNode {
            data: NodeData::typed(open, map_type),
            keys: self.arena.alloc_slice_fill_iter(keys),
            values: self.arena.alloc_slice_fill_iter(values),
        })
    }

    fn anonymous_function(&mut self) -> Expression<'a> {
        let token = self.previous;
        let name = self.ctx.interner.intern("");
        let function = self.function(token, name, FunctionKind::Anonymous, None);
        Expression::Function(function)
    }

    fn variable(&mut self, can_assign: bool) -> Expression<'a> {
        let name_token = self.previous;
        self.named_variable(name_token, can_assign)
    }

    fn named_variable(&mut self, name_token: Token, can_assign: bool) -> Expression<'a> {
        let name = name_token.lexeme;
        let frame = self.current_frame();
        let mut identifier = name;

        let (slot, var_type, constant) = if let Some((index, type_def, constant, depth)) =
            self.resolve_local(frame, name)
        {
            if depth == -1 {
                let text = self.resolve_str(name);
                self.error_at(
                    name_token,
                    format_message(messages::READ_OWN_INITIALIZER, &[&text]),
                );
            }
            (Slot::Local(index), type_def, constant)
        } else if let Some((index, type_def, constant)) = self.resolve_upvalue(frame, name) {
            (Slot::UpValue(index), type_def, constant)
        } else if let Some(index) = self.find_global(None, name) {
            let global = &self.globals[index];
            let (type_def, constant, initialized) =
                (global.type_def, global.constant, global.initialized);
            if !initialized {
                let text = self.resolve_str(name);
                self.error_at(
                    name_token,
                    format_message(messages::READ_OWN_INITIALIZER, &[&text]),
                );
            }
            (Slot::Global(index as u32), type_def, constant)
        } else if self.is_prefix(name) && self.check(TokenKind::Dot) {
            // `Prefix.symbol`
            self.advance();
            let member = self.consume_identifier();
            identifier = member.lexeme;
            match self.find_global(Some(name), member.lexeme) {
                Some(index) => {
                    let global = &self.globals[index];
                    (Slot::Global(index as u32), global.type_def, global.constant)
                }
                None => {
                    let text = format!(
                        "{}.{}",
                        self.resolve_str(name),
                        self.resolve_str(member.lexeme)
                    );
                    self.error_at(member, format_message(messages::UNKNOWN_VARIABLE, &[&text]));
                    let placeholder = self.new_placeholder(Some(member.lexeme), member);
                    (Slot::Global(0), placeholder, false)
                }
            }
        } else {
            // Forward reference to an undeclared global.
            let index = self.declare_placeholder(name, name_token);
            (
                Slot::Global(index as u32),
                self.globals[index].type_def,
                false,
            )
        };

        // `Type{ … }` object initialization.
        let is_initializable = matches!(
            self.ctx.registry.get(var_type).kind,
            TypeKind::Object(_) | TypeKind::Placeholder(_)
        );
        if is_initializable && self.check(TokenKind::LeftBrace) {
            return self.object_init(var_type, name_token);
        }

        let value = if can_assign && self.matches(TokenKind::Equal) {
            let equal = self.previous;
            let value = self.expression();
            if constant {
                let text = self.resolve_str(identifier);
                self.error_at(
                    equal,
                    format_message(messages::ASSIGN_TO_CONSTANT, &[&text]),
                );
            }
            if self.is_placeholder(var_type) {
                record_use(&mut self.ctx.registry, var_type, Use::Assignable);
            }
            self.check_assignment(var_type, self.type_of(&value), equal);
            Some(&*self.arena.alloc(value))
        } else {
            None
        };

        Expression::NamedVariable(NamedVariableNode {
            data: NodeData::typed(name_token, var_type),
            identifier,
            value,
            slot,
        })
    }

    /// `Point{ x = 0, y = 0 }`
    fn object_init(&mut self, named_type: TypeId, name_token: Token) -> Expression<'a> {
        self.consume(TokenKind::LeftBrace);
        let mut members: Vec<ObjectInitMember<'a>> = Vec::new();

        // Snapshot the fields when the object is already known.
        let known_fields: Option<IndexMap<InternedString, TypeId>> =
            match &self.ctx.registry.get(named_type).kind {
                TypeKind::Object(def) => Some(def.fields.clone()),
                _ => None,
            };

        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            let member_token = self.consume_identifier();
            let member_name = member_token.lexeme;
            self.consume(TokenKind::Equal);
            let value = self.expression();

            if let Some(fields) = &known_fields {
                match fields.get(&member_name) {
                    Some(&field_type) => {
                        let value_type = self.type_of(&value);
                        self.check_operand(value_type, field_type, member_token);
                    }
                    None => {
                        let type_text = self.resolve_str(name_token.lexeme);
                        let member_text = self.resolve_str(member_name);
                        self.error_at(
                            member_token,
                            format_message(messages::MEMBER_NOT_FOUND, &[&type_text, &member_text]),
                        );
                    }
                }
            }

            members.push(ObjectInitMember {
                name: member_name,
                value: self.arena.alloc(value),
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightBrace);

        let result_type = if self.is_placeholder(named_type) {
            record_use(&mut self.ctx.registry, named_type, Use::Callable);
            child_placeholder(
                &mut self.ctx.registry,
                named_type,
                name_token,
                Relation::Call,
                None,
            )
        } else {
            self.ctx.registry.instance_of(named_type)
        };

        Expression::ObjectInit(ObjectInitNode {
            data: NodeData::typed(name_token, result_type),
            members: self.arena.alloc_slice_fill_iter(members),
        })
    }

    fn super_expression(&mut self) -> Expression<'a> {
        let super_token = self.previous;
        self.consume(TokenKind::Dot);
        let member_token = self.consume_identifier();
        let member = member_token.lexeme;

        let super_def = match &self.current_object {
            Some(object) if object.has_super => match &self.ctx.registry.get(object.def).kind {
                TypeKind::Object(def) => def.super_type,
                _ => None,
            },
            _ => None,
        };
        let super_def = match super_def {
            Some(super_def) => super_def,
            None => {
                self.error_at(super_token, messages::SUPER_OUTSIDE_CLASS.to_string());
                let void_type = self.ctx.registry.void_type;
                return Expression::Super(SuperNode {
                    data: NodeData::typed(super_token, void_type),
                    identifier: member,
                });
            }
        };

        let member_type = match self.object_member(super_def, member) {
            Some(member_type) => member_type,
            None => {
                let type_text = self.type_name(super_def);
                let member_text = self.resolve_str(member);
                self.error_at(
                    member_token,
                    format_message(messages::MEMBER_NOT_FOUND, &[&type_text, &member_text]),
                );
                self.ctx.registry.void_type
            }
        };

        if self.matches(TokenKind::LeftParen) {
            let (arguments, paren) = self.argument_list();
            let result_type = self.check_call(member_type, &arguments, paren);
            return Expression::SuperCall(SuperCallNode {
                data: NodeData::typed(super_token, result_type),
                identifier: member,
                arguments: self.arena.alloc_slice_fill_iter(arguments),
            });
        }

        Expression::Super(SuperNode {
            data: NodeData::typed(super_token, member_type),
            identifier: member,
        })
    }

    fn this_expression(&mut self) -> Expression<'a> {
        let token = self.previous;
        let this_type = match &self.current_object {
            Some(object) => {
                let def = object.def;
                self.ctx.registry.instance_of(def)
            }
            None => {
                self.error_at(token, messages::THIS_OUTSIDE_METHOD.to_string());
                self.ctx.registry.void_type
            }
        };
        Expression::NamedVariable(NamedVariableNode {
            data: NodeData::typed(token, this_type),
            identifier: token.lexeme,
            value: None,
            slot: Slot::Local(0),
        })
    }

    // ========================================================================
    // Expressions: infix rules
    // ========================================================================

    fn binary(&mut self, left: &'a Expression<'a>) -> Expression<'a> {
        let operator_token = self.previous;
        let operator = operator_token.kind;
        let precedence = infix_precedence(operator);
        let right = self.parse_precedence(precedence.next(), false);

        let left_type = self.type_of(left);
        let right_type = self.type_of(&right);
        let number_type = self.ctx.registry.number_type;
        let bool_type = self.ctx.registry.bool_type;

        let result_type = match operator {
            TokenKind::Plus => {
                // `+` concatenates strings, lists and maps, and adds numbers.
                let concatenable = !self.is_placeholder(left_type)
                    && matches!(
                        self.ctx.registry.get(left_type).kind,
                        TypeKind::String | TypeKind::List { .. } | TypeKind::Map { .. }
                    );
                if concatenable {
                    self.check_operand(right_type, left_type, operator_token);
                    left_type
                } else {
                    self.check_operand(left_type, number_type, operator_token);
                    self.check_operand(right_type, number_type, operator_token);
                    number_type
                }
            }
            TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::ShiftLeft
            | TokenKind::ShiftRight
            | TokenKind::Caret => {
                self.check_operand(left_type, number_type, operator_token);
                self.check_operand(right_type, number_type, operator_token);
                number_type
            }
            TokenKind::Xor => {
                self.check_operand(left_type, bool_type, operator_token);
                self.check_operand(right_type, bool_type, operator_token);
                bool_type
            }
            TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::Less
            | TokenKind::LessEqual => {
                self.check_operand(left_type, number_type, operator_token);
                self.check_operand(right_type, number_type, operator_token);
                bool_type
            }
            TokenKind::EqualEqual | TokenKind::BangEqual => bool_type,
            _ => number_type,
        };

        Expression::Binary(BinaryNode {
            data: NodeData::typed(operator_token, result_type),
            left,
            operator,
            right: self.arena.alloc(right),
        })
    }

    fn and(&mut self, left: &'a Expression<'a>) -> Expression<'a> {
        let token = self.previous;
        let right = self.parse_precedence(Precedence::And.next(), false);
        let bool_type = self.ctx.registry.bool_type;
        self.check_operand(self.type_of(left), bool_type, token);
        self.check_operand(self.type_of(&right), bool_type, token);
        Expression::And(AndNode {
            data: NodeData::typed(token, bool_type),
            left,
            right: self.arena.alloc(right),
        })
    }

    fn or(&mut self, left: &'a Expression<'a>) -> Expression<'a> {
        let token = self.previous;
        let right = self.parse_precedence(Precedence::Or.next(), false);
        let bool_type = self.ctx.registry.bool_type;
        self.check_operand(self.type_of(left), bool_type, token);
        self.check_operand(self.type_of(&right), bool_type, token);
        Expression::Or(OrNode {
            data: NodeData::typed(token, bool_type),
            left,
            right: self.arena.alloc(right),
        })
    }

    fn is_expression(&mut self, left: &'a Expression<'a>) -> Expression<'a> {
        let token = self.previous;
        let tested = self.parse_type_instance();
        let bool_type = self.ctx.registry.bool_type;
        Expression::Is(IsNode {
            data: NodeData::typed(token, bool_type),
            left,
            constant: tested,
        })
    }

    /// `a ?? b`: the non-optional form of the right operand (or the left
    /// when the right is a placeholder).
    fn null_coalescing(&mut self, left: &'a Expression<'a>) -> Expression<'a> {
        let token = self.previous;
        let right = self.parse_precedence(Precedence::NullCoalescing.next(), false);
        let right_type = self.type_of(&right);
        let left_type = self.type_of(left);
        let result_type = if !self.is_placeholder(right_type) {
            self.ctx.registry.with_optional(right_type, false)
        } else {
            self.ctx.registry.with_optional(left_type, false)
        };
        Expression::Binary(BinaryNode {
            data: NodeData::typed(token, result_type),
            left,
            operator: TokenKind::QuestionQuestion,
            right: self.arena.alloc(right),
        })
    }

    fn unwrap(&mut self, unwrapped: &'a Expression<'a>, force: bool) -> Expression<'a> {
        let token = self.previous;
        let operand_type = self.type_of(unwrapped);
        let result_type = if self.is_placeholder(operand_type) {
            operand_type
        } else if !self.ctx.registry.get(operand_type).optional {
            let text = self.type_name(operand_type);
            self.error_at(
                token,
                format_message(messages::UNWRAP_NON_OPTIONAL, &[&text]),
            );
            operand_type
        } else {
            self.ctx.registry.with_optional(operand_type, false)
        };

        if force {
            Expression::ForceUnwrap(ForceUnwrapNode {
                data: NodeData::typed(token, result_type),
                unwrapped,
            })
        } else {
            Expression::Unwrap(UnwrapNode {
                data: NodeData::typed(token, result_type),
                unwrapped,
            })
        }
    }

    fn subscript(&mut self, subscripted: &'a Expression<'a>, can_assign: bool) -> Expression<'a> {
        let bracket = self.previous;
        let index = self.expression();
        self.consume(TokenKind::RightBracket);

        let subscripted_type = self.type_of(subscripted);
        let index_type = self.type_of(&index);
        let number_type = self.ctx.registry.number_type;
        let string_type = self.ctx.registry.string_type;

        let element_type = match self.ctx.registry.get(subscripted_type).kind {
            TypeKind::List { item } => {
                self.check_operand(index_type, number_type, bracket);
                item
            }
            TypeKind::Map { key, value } => {
                self.check_operand(index_type, key, bracket);
                self.ctx.registry.with_optional(value, true)
            }
            TypeKind::String => {
                self.check_operand(index_type, number_type, bracket);
                string_type
            }
            TypeKind::Placeholder(_) => {
                if !record_use(&mut self.ctx.registry, subscripted_type, Use::Subscriptable) {
                    let text = self.type_name(subscripted_type);
                    self.error_at(bracket, format_message(messages::INCOHERENT_USE, &[&text]));
                }
                if self.is_placeholder(index_type) {
                    let index_orphan = match &self.ctx.registry.get(index_type).kind {
                        TypeKind::Placeholder(def) => def.parent.is_none(),
                        _ => false,
                    };
                    if index_orphan {
                        link(
                            &mut self.ctx.registry,
                            subscripted_type,
                            index_type,
                            Relation::Key,
                        );
                    }
                }
                child_placeholder(
                    &mut self.ctx.registry,
                    subscripted_type,
                    bracket,
                    Relation::Subscript,
                    None,
                )
            }
            _ => {
                let text = self.type_name(subscripted_type);
                self.error_at(
                    bracket,
                    format_message(messages::NOT_SUBSCRIPTABLE, &[&text]),
                );
                self.ctx.registry.void_type
            }
        };

        let value = if can_assign && self.matches(TokenKind::Equal) {
            let equal = self.previous;
            let value = self.expression();
            self.check_assignment(element_type, self.type_of(&value), equal);
            Some(&*self.arena.alloc(value))
        } else {
            None
        };

        Expression::Subscript(SubscriptNode {
            data: NodeData::typed(bracket, element_type),
            subscripted,
            index: self.arena.alloc(index),
            value,
        })
    }

    fn dot(&mut self, callee: &'a Expression<'a>, can_assign: bool) -> Expression<'a> {
        let member_token = self.consume_identifier();
        let member = member_token.lexeme;
        let callee_type = self.type_of(callee);

        let mut assignable_member = false;
        let member_type = match &self.ctx.registry.get(callee_type).kind {
            TypeKind::String => {
                let member_text = self.resolve_str(member);
                self.string_member(&member_text)
                    .unwrap_or_else(|| self.member_error(callee_type, member, member_token))
            }
            TypeKind::List { item } => {
                let item = *item;
                let member_text = self.resolve_str(member);
                self.list_member(item, &member_text)
                    .unwrap_or_else(|| self.member_error(callee_type, member, member_token))
            }
            TypeKind::Map { key, value } => {
                let (key, value) = (*key, *value);
                let member_text = self.resolve_str(member);
                self.map_member(key, value, &member_text)
                    .unwrap_or_else(|| self.member_error(callee_type, member, member_token))
            }
            TypeKind::ObjectInstance { of } => {
                let of = *of;
                assignable_member = true;
                match self.object_member(of, member) {
                    Some(member_type) => member_type,
                    None => self.open_object_member(of, member, member_token, false),
                }
            }
            TypeKind::Object(def) => {
                // Static access through the object's name.
                let static_member = def.static_fields.get(&member).copied();
                let of = callee_type;
                assignable_member = true;
                match static_member {
                    Some(member_type) => member_type,
                    None => self.open_object_member(of, member, member_token, true),
                }
            }
            TypeKind::Enum(def) => {
                let enum_name = def.name;
                let has_case = def.cases.contains(&member);
                if has_case {
                    self.ctx.registry.instance_of(callee_type)
                } else {
                    let enum_text = self.resolve_str(enum_name);
                    let member_text = self.resolve_str(member);
                    self.error_at(
                        member_token,
                        format_message(messages::ENUM_CASE_NOT_FOUND, &[&enum_text, &member_text]),
                    );
                    self.ctx.registry.void_type
                }
            }
            TypeKind::EnumInstance { of } => {
                let of = *of;
                if self.resolve_str(member) == "value" {
                    match &self.ctx.registry.get(of).kind {
                        TypeKind::Enum(def) => def.case_type,
                        _ => self.ctx.registry.void_type,
                    }
                } else {
                    self.member_error(callee_type, member, member_token)
                }
            }
            TypeKind::Placeholder(_) => {
                if !record_use(&mut self.ctx.registry, callee_type, Use::FieldAccessible) {
                    let text = self.type_name(callee_type);
                    self.error_at(
                        member_token,
                        format_message(messages::INCOHERENT_USE, &[&text]),
                    );
                }
                assignable_member = true;
                child_placeholder(
                    &mut self.ctx.registry,
                    callee_type,
                    member_token,
                    Relation::FieldAccess,
                    Some(member),
                )
            }
            _ => self.member_error(callee_type, member, member_token),
        };

        let value = if can_assign && self.matches(TokenKind::Equal) {
            let equal = self.previous;
            if !assignable_member {
                self.error_at(equal, messages::INVALID_ASSIGNMENT_TARGET.to_string());
            }
            let value = self.expression();
            self.check_assignment(member_type, self.type_of(&value), equal);
            Some(&*self.arena.alloc(value))
        } else {
            None
        };

        Expression::Dot(DotNode {
            data: NodeData::typed(member_token, member_type),
            callee,
            identifier: member,
            value,
        })
    }

    /// A member missing from an object that is still being declared becomes
    /// a member placeholder; on a closed object it is an error.
    fn open_object_member(
        &mut self,
        object_def: TypeId,
        member: InternedString,
        member_token: Token,
        is_static: bool,
    ) -> TypeId {
        let open = self
            .current_object
            .as_ref()
            .map(|object| object.def == object_def)
            .unwrap_or(false);
        if !open {
            return self.member_error(object_def, member, member_token);
        }
        // Reuse the placeholder when the member was referenced before.
        if let TypeKind::Object(def) = &self.ctx.registry.get(object_def).kind {
            let existing = if is_static {
                def.static_placeholders.get(&member)
            } else {
                def.placeholders.get(&member)
            };
            if let Some(&placeholder) = existing {
                return placeholder;
            }
        }
        let placeholder = self.new_placeholder(Some(member), member_token);
        if let TypeKind::Object(def) = &mut self.ctx.registry.get_mut(object_def).kind {
            if is_static {
                def.static_placeholders.insert(member, placeholder);
            } else {
                def.placeholders.insert(member, placeholder);
            }
        }
        placeholder
    }

    fn member_error(&mut self, on: TypeId, member: InternedString, at: Token) -> TypeId {
        let type_text = self.type_name(on);
        let member_text = self.resolve_str(member);
        self.error_at(
            at,
            format_message(messages::MEMBER_NOT_FOUND, &[&type_text, &member_text]),
        );
        self.ctx.registry.void_type
    }

    // ------------------------------------------------------------------------
    // Built-in members. The runtime implements these; the front end only
    // knows their signatures.
    // ------------------------------------------------------------------------

    fn builtin_method(
        &mut self,
        name: &str,
        parameters: &[(&str, TypeId)],
        return_type: TypeId,
    ) -> TypeId {
        let name = self.ctx.interner.intern(name);
        let mut params = IndexMap::new();
        let mut has_defaults = FxHashMap::default();
        for (param_name, param_type) in parameters {
            let param_name = self.ctx.interner.intern(param_name);
            params.insert(param_name, *param_type);
            has_defaults.insert(param_name, false);
        }
        self.ctx
            .registry
            .get_or_intern(TypeDef::new(TypeKind::Function(FunctionDef {
                name,
                return_type,
                parameters: params,
                has_defaults,
                kind: FunctionKind::Function,
                lambda: false,
            })))
    }

    fn string_member(&mut self, member: &str) -> Option<TypeId> {
        let number_type = self.ctx.registry.number_type;
        match member {
            "len" => Some(self.builtin_method("len", &[], number_type)),
            _ => None,
        }
    }

    fn list_member(&mut self, item: TypeId, member: &str) -> Option<TypeId> {
        let number_type = self.ctx.registry.number_type;
        let void_type = self.ctx.registry.void_type;
        match member {
            "len" => Some(self.builtin_method("len", &[], number_type)),
            "append" => Some(self.builtin_method("append", &[("value", item)], void_type)),
            _ => None,
        }
    }

    fn map_member(&mut self, key: TypeId, value: TypeId, member: &str) -> Option<TypeId> {
        let number_type = self.ctx.registry.number_type;
        match member {
            "size" => Some(self.builtin_method("size", &[], number_type)),
            "remove" => {
                let optional_value = self.ctx.registry.with_optional(value, true);
                Some(self.builtin_method("remove", &[("key", key)], optional_value))
            }
            "keys" => {
                let list = self
                    .ctx
                    .registry
                    .get_or_intern(TypeDef::new(TypeKind::List { item: key }));
                Some(self.builtin_method("keys", &[], list))
            }
            "values" => {
                let list = self
                    .ctx
                    .registry
                    .get_or_intern(TypeDef::new(TypeKind::List { item: value }));
                Some(self.builtin_method("values", &[], list))
            }
            _ => None,
        }
    }

    // ========================================================================
    // Calls and catch clauses
    // ========================================================================

    fn argument_list(&mut self) -> (Vec<Argument<'a>>, Token) {
        let paren = self.previous;
        let mut arguments: Vec<Argument<'a>> = Vec::new();
        while !self.check(TokenKind::RightParen) && !self.check(TokenKind::Eof) {
            if arguments.len() >= MAX_ARGUMENTS {
                self.error_at_current(messages::TOO_MANY_ARGUMENTS.to_string());
            }
            let name = if self.check(TokenKind::Identifier) && self.peek(0).kind == TokenKind::Colon
            {
                let name = self.consume_identifier().lexeme;
                self.consume(TokenKind::Colon);
                Some(name)
            } else {
                None
            };
            let value = self.expression();
            arguments.push(Argument {
                name,
                value: self.arena.alloc(value),
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightParen);
        (arguments, paren)
    }

    fn call(&mut self, callee: &'a Expression<'a>) -> Expression<'a> {
        let (arguments, paren) = self.argument_list();
        let callee_type = self.type_of(callee);
        let result_type = self.check_call(callee_type, &arguments, paren);

        let catches = if self.matches(TokenKind::Catch) {
            self.catch_clauses(result_type)
        } else {
            Vec::new()
        };

        Expression::Call(CallNode {
            data: NodeData::typed(paren, result_type),
            callee,
            arguments: self.arena.alloc_slice_fill_iter(arguments),
            catches: self.arena.alloc_slice_fill_iter(catches),
        })
    }

    /// Validate a call against the callee's type; returns the result type.
    fn check_call(
        &mut self,
        callee_type: TypeId,
        arguments: &[Argument<'a>],
        paren: Token,
    ) -> TypeId {
        match &self.ctx.registry.get(callee_type).kind {
            TypeKind::Function(def) => {
                let fn_name = def.name;
                let return_type = def.return_type;
                let parameters: Vec<(InternedString, TypeId)> =
                    def.parameters.iter().map(|(k, v)| (*k, *v)).collect();
                let defaulted: FxHashSet<InternedString> = def
                    .has_defaults
                    .iter()
                    .filter(|(_, &has)| has)
                    .map(|(k, _)| *k)
                    .collect();

                let mut satisfied = vec![false; parameters.len()];
                let mut positional = 0usize;
                for argument in arguments {
                    let at = argument.value.data().location;
                    let value_type = self.type_of(argument.value);
                    match argument.name {
                        None => {
                            if positional >= parameters.len() {
                                self.error_at(
                                    paren,
                                    format_message(
                                        messages::ARGUMENT_COUNT,
                                        &[
                                            &parameters.len().to_string(),
                                            &arguments.len().to_string(),
                                        ],
                                    ),
                                );
                                break;
                            }
                            let (_, parameter_type) = parameters[positional];
                            self.check_operand(value_type, parameter_type, at);
                            satisfied[positional] = true;
                            positional += 1;
                        }
                        Some(argument_name) => {
                            match parameters.iter().position(|(n, _)| *n == argument_name) {
                                Some(index) => {
                                    let (_, parameter_type) = parameters[index];
                                    self.check_operand(value_type, parameter_type, at);
                                    satisfied[index] = true;
                                }
                                None => {
                                    let fn_text = self.resolve_str(fn_name);
                                    let arg_text = self.resolve_str(argument_name);
                                    self.error_at(
                                        at,
                                        format_message(
                                            messages::UNKNOWN_ARGUMENT,
                                            &[&fn_text, &arg_text],
                                        ),
                                    );
                                }
                            }
                        }
                    }
                }
                let missing = parameters
                    .iter()
                    .zip(satisfied.iter())
                    .any(|((name, _), &ok)| !ok && !defaulted.contains(name));
                if missing {
                    self.error_at(
                        paren,
                        format_message(
                            messages::ARGUMENT_COUNT,
                            &[&parameters.len().to_string(), &arguments.len().to_string()],
                        ),
                    );
                }
                return_type
            }
            TypeKind::Placeholder(_) => {
                if !record_use(&mut self.ctx.registry, callee_type, Use::Callable) {
                    let text = self.type_name(callee_type);
                    self.error_at(paren, format_message(messages::INCOHERENT_USE, &[&text]));
                }
                child_placeholder(
                    &mut self.ctx.registry,
                    callee_type,
                    paren,
                    Relation::Call,
                    None,
                )
            }
            _ => {
                let text = self.type_name(callee_type);
                self.error_at(paren, format_message(messages::NOT_CALLABLE, &[&text]));
                self.new_placeholder(None, paren)
            }
        }
    }

    /// `catch { handler, … }` or `catch <default-expression>` after a call.
    /// Closure handlers are functions of kind `Catch`; their return type
    /// defaults to the call's result type.
    fn catch_clauses(&mut self, call_type: TypeId) -> Vec<CatchNode<'a>> {
        let mut catches: Vec<CatchNode<'a>> = Vec::new();
        if self.matches(TokenKind::LeftBrace) {
            while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
                if catches.len() >= MAX_CATCH_CLAUSES {
                    self.error_at_current(messages::TOO_MANY_CATCH_CLAUSES.to_string());
                }
                catches.push(self.catch_clause(call_type));
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
            self.consume(TokenKind::RightBrace);
        } else {
            catches.push(self.catch_clause(call_type));
        }
        catches
    }

    fn catch_clause(&mut self, call_type: TypeId) -> CatchNode<'a> {
        if self.matches(TokenKind::Fun) {
            let token = self.previous;
            let name = self.ctx.interner.intern("");
            let function = self.function(token, name, FunctionKind::Catch, Some(call_type));
            let function_type = function.data.type_def;
            let value = &*self.arena.alloc(Expression::Function(function));
            CatchNode {
                data: NodeData {
                    location: token,
                    type_def: function_type,
                },
                value,
            }
        } else {
            // A plain default value.
            let value = self.expression();
            let at = value.data().location;
            self.check_operand(self.type_of(&value), call_type, at);
            let type_def = value.type_def();
            CatchNode {
                data: NodeData {
                    location: at,
                    type_def,
                },
                value: self.arena.alloc(value),
            }
        }
    }
}

/// The library name of a script: its file stem.
fn library_name(script: &str) -> String {
    std::path::Path::new(script)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| script.to_string())
}
