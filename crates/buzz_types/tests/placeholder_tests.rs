//! Placeholder engine integration tests.
//!
//! Exercises linking, resolution through every relation, idempotency and
//! diagnostic localization without going through the parser.

use buzz_core::intern::StringInterner;
use buzz_diagnostics::DiagnosticCollection;
use buzz_scanner::{Token, TokenKind};
use buzz_types::{
    assume_type, child_placeholder, is_coherent, record_use, resolve, EnumDef, FunctionDef,
    FunctionKind, ObjectDef, PlaceholderDef, Relation, TypeDef, TypeId, TypeKind, TypeRegistry,
    Use,
};
use indexmap::IndexMap;

struct Setup {
    interner: StringInterner,
    registry: TypeRegistry,
    diagnostics: DiagnosticCollection,
}

impl Setup {
    fn new() -> Self {
        let interner = StringInterner::new();
        let registry = TypeRegistry::new(interner.clone());
        Self {
            interner,
            registry,
            diagnostics: DiagnosticCollection::new(),
        }
    }

    fn token_at(&self, line: u32, column: u32) -> Token {
        Token {
            kind: TokenKind::Identifier,
            lexeme: self.interner.intern("x"),
            line,
            column,
            literal_number: None,
            literal_string: None,
            script: self.interner.intern("test.buzz"),
        }
    }

    fn placeholder(&mut self, name: &str, line: u32, column: u32) -> TypeId {
        let name = self.interner.intern(name);
        let token = self.token_at(line, column);
        self.registry.add(TypeDef::new(TypeKind::Placeholder(
            PlaceholderDef::new(Some(name), token),
        )))
    }

    fn function_returning(&mut self, name: &str, return_type: TypeId) -> TypeId {
        let name = self.interner.intern(name);
        self.registry
            .get_or_intern(TypeDef::new(TypeKind::Function(FunctionDef {
                name,
                return_type,
                parameters: IndexMap::new(),
                has_defaults: Default::default(),
                kind: FunctionKind::Function,
                lambda: false,
            })))
    }
}

#[test]
fn call_relation_resolves_to_return_type() {
    let mut s = Setup::new();
    let callee = s.placeholder("fact", 0, 4);
    let tok1 = s.token_at(2, 15);
    let result = child_placeholder(&mut s.registry, callee, tok1, Relation::Call, None);

    let number = s.registry.number_type;
    let function = s.function_returning("fact", number);
    resolve(&mut s.registry, callee, function, true, &mut s.diagnostics);

    assert!(s.diagnostics.is_empty());
    assert_eq!(s.registry.canonical(callee), "Function fact() > num");
    assert_eq!(s.registry.canonical(result), "num");
}

#[test]
fn call_relation_on_object_yields_instance() {
    let mut s = Setup::new();
    let callee = s.placeholder("Point", 0, 0);
    let tok2 = s.token_at(0, 0);
    let result = child_placeholder(&mut s.registry, callee, tok2, Relation::Call, None);

    let name = s.interner.intern("Point");
    let object = s
        .registry
        .get_or_intern(TypeDef::new(TypeKind::Object(ObjectDef::new(name, false))));
    resolve(&mut s.registry, callee, object, true, &mut s.diagnostics);

    assert!(s.diagnostics.is_empty());
    assert_eq!(s.registry.canonical(result), "Point");
}

#[test]
fn calling_a_number_is_reported_at_the_use_site() {
    let mut s = Setup::new();
    let callee = s.placeholder("n", 0, 0);
    let tok3 = s.token_at(4, 9);
    let _result = child_placeholder(&mut s.registry, callee, tok3, Relation::Call, None);

    let number = s.registry.number_type;
    resolve(&mut s.registry, callee, number, false, &mut s.diagnostics);

    assert_eq!(s.diagnostics.len(), 1);
    let diag = &s.diagnostics.diagnostics()[0];
    assert_eq!((diag.line, diag.column), (4, 9));
    assert!(diag.message.contains("not callable"));
}

#[test]
fn subscript_relation_list_and_map() {
    let mut s = Setup::new();
    let number = s.registry.number_type;
    let string = s.registry.string_type;

    let xs = s.placeholder("xs", 0, 0);
    let tok4 = s.token_at(1, 2);
    let element = child_placeholder(&mut s.registry, xs, tok4, Relation::Subscript, None);
    let list = s
        .registry
        .get_or_intern(TypeDef::new(TypeKind::List { item: number }));
    resolve(&mut s.registry, xs, list, false, &mut s.diagnostics);
    assert_eq!(s.registry.canonical(element), "num");

    let m = s.placeholder("m", 0, 0);
    let tok5 = s.token_at(2, 2);
    let value = child_placeholder(&mut s.registry, m, tok5, Relation::Subscript, None);
    let tok6 = s.token_at(2, 4);
    let key = child_placeholder(&mut s.registry, m, tok6, Relation::Key, None);
    let map = s.registry.get_or_intern(TypeDef::new(TypeKind::Map {
        key: string,
        value: number,
    }));
    resolve(&mut s.registry, m, map, false, &mut s.diagnostics);

    assert!(s.diagnostics.is_empty());
    // Subscripting a map yields an optional value.
    assert_eq!(s.registry.canonical(value), "num?");
    assert_eq!(s.registry.canonical(key), "str");
}

#[test]
fn field_access_looks_up_fields_then_methods() {
    let mut s = Setup::new();
    let string = s.registry.string_type;
    let field = s.interner.intern("field");

    let u = s.placeholder("u", 0, 0);
    let tok_u = s.token_at(1, 6);
    let access = child_placeholder(
        &mut s.registry,
        u,
        tok_u,
        Relation::FieldAccess,
        Some(field),
    );

    let name = s.interner.intern("Unknown");
    let mut def = ObjectDef::new(name, false);
    def.fields.insert(field, string);
    let object = s
        .registry
        .get_or_intern(TypeDef::new(TypeKind::Object(def)));
    let instance = s.registry.instance_of(object);

    resolve(&mut s.registry, u, instance, false, &mut s.diagnostics);
    assert!(s.diagnostics.is_empty());
    assert_eq!(s.registry.canonical(access), "str");
}

#[test]
fn missing_enum_case_is_an_error() {
    let mut s = Setup::new();
    let number = s.registry.number_type;
    let color = s.interner.intern("Color");
    let red = s.interner.intern("red");
    let blue = s.interner.intern("blue");

    let e = s.placeholder("Color", 0, 0);
    let tok_good = s.token_at(1, 0);
    let good = child_placeholder(
        &mut s.registry,
        e,
        tok_good,
        Relation::FieldAccess,
        Some(red),
    );
    let tok_bad = s.token_at(2, 0);
    let _bad = child_placeholder(
        &mut s.registry,
        e,
        tok_bad,
        Relation::FieldAccess,
        Some(blue),
    );

    let enum_type = s.registry.get_or_intern(TypeDef::new(TypeKind::Enum(EnumDef {
        name: color,
        case_type: number,
        cases: vec![red],
    })));
    resolve(&mut s.registry, e, enum_type, true, &mut s.diagnostics);

    assert_eq!(s.registry.canonical(good), "Color");
    assert_eq!(s.diagnostics.len(), 1);
    assert!(s.diagnostics.diagnostics()[0].message.contains("blue"));
}

#[test]
fn assignment_to_constant_fails() {
    let mut s = Setup::new();
    let target = s.placeholder("fact", 0, 0);
    let tok_target = s.token_at(3, 0);
    let _value = child_placeholder(
        &mut s.registry,
        target,
        tok_target,
        Relation::Assignment,
        None,
    );

    let number = s.registry.number_type;
    let function = s.function_returning("fact", number);
    resolve(&mut s.registry, target, function, true, &mut s.diagnostics);

    assert_eq!(s.diagnostics.len(), 1);
    assert!(s.diagnostics.diagnostics()[0]
        .message
        .contains("constant"));
}

#[test]
fn resolution_is_idempotent() {
    let mut s = Setup::new();
    let p = s.placeholder("x", 0, 0);
    let number = s.registry.number_type;
    let string = s.registry.string_type;

    resolve(&mut s.registry, p, number, false, &mut s.diagnostics);
    assert_eq!(s.registry.canonical(p), "num");

    // The slot is no longer a placeholder; a second resolve is a no-op.
    resolve(&mut s.registry, p, string, false, &mut s.diagnostics);
    assert_eq!(s.registry.canonical(p), "num");
    assert!(s.diagnostics.is_empty());
}

#[test]
fn resolving_to_a_placeholder_waits() {
    let mut s = Setup::new();
    let p = s.placeholder("a", 0, 0);
    let q = s.placeholder("b", 0, 0);

    resolve(&mut s.registry, p, q, false, &mut s.diagnostics);
    assert!(s.registry.is_placeholder(p));
}

#[test]
fn assumptions_are_checked_on_resolution() {
    let mut s = Setup::new();
    let p = s.placeholder("field", 0, 0);
    let number = s.registry.number_type;
    let plus = s.token_at(1, 12);
    assume_type(&mut s.registry, p, number, plus);

    let string = s.registry.string_type;
    resolve(&mut s.registry, p, string, false, &mut s.diagnostics);

    assert_eq!(s.diagnostics.len(), 1);
    let diag = &s.diagnostics.diagnostics()[0];
    assert_eq!(diag.message, "Expected `num`, got `str`.");
    assert_eq!((diag.line, diag.column), (1, 12));
}

#[test]
fn incoherent_usage_is_detected() {
    let mut s = Setup::new();
    let p = s.placeholder("x", 0, 0);
    assert!(record_use(&mut s.registry, p, Use::Callable));
    assert!(!record_use(&mut s.registry, p, Use::Subscriptable));

    if let TypeKind::Placeholder(def) = &s.registry.get(p).kind {
        assert!(!is_coherent(def));
    } else {
        panic!("expected a placeholder");
    }
}

#[test]
fn chained_placeholders_resolve_transitively() {
    let mut s = Setup::new();
    let number = s.registry.number_type;

    // xs[0] + 1 while xs has unknown type X, then X turns out to be [num].
    let xs = s.placeholder("X", 0, 0);
    let tok7 = s.token_at(1, 2);
    let element = child_placeholder(&mut s.registry, xs, tok7, Relation::Subscript, None);
    let tok8 = s.token_at(1, 8);
    assume_type(&mut s.registry, element, number, tok8);

    let list = s
        .registry
        .get_or_intern(TypeDef::new(TypeKind::List { item: number }));
    resolve(&mut s.registry, xs, list, false, &mut s.diagnostics);

    assert!(s.diagnostics.is_empty());
    assert_eq!(s.registry.canonical(element), "num");
}
