//! Parser integration tests.
//!
//! Each test parses buzz source from a string, then inspects diagnostics,
//! the global table and the type annotations the single pass produced.

use bumpalo::Bump;
use buzz_diagnostics::Diagnostic;
use buzz_module::{NoNatives, StaticNatives};
use buzz_parser::{CompileContext, Global, Parser};

struct Parsed {
    ok: bool,
    diagnostics: Vec<Diagnostic>,
    globals: Vec<(String, String, Option<String>, bool)>,
    json: Option<serde_json::Value>,
}

/// Parse `source` as the root script and distill the result into owned data
/// so the arena can be dropped.
fn parse(source: &str) -> Parsed {
    let arena = Bump::new();
    let mut ctx = CompileContext::new(Box::new(NoNatives));
    let result = Parser::parse(&arena, &mut ctx, source, "test.buzz", false);
    distill(&ctx, result.function.map(|f| f.to_json(&ctx.registry)), &result.globals, result.diagnostics.into_diagnostics())
}

fn distill(
    ctx: &CompileContext<'_>,
    json: Option<serde_json::Value>,
    globals: &[Global],
    diagnostics: Vec<Diagnostic>,
) -> Parsed {
    let globals = globals
        .iter()
        .map(|g| {
            (
                ctx.interner.resolve(g.name).to_string(),
                ctx.registry.canonical(g.type_def),
                g.prefix.map(|p| ctx.interner.resolve(p).to_string()),
                g.hidden,
            )
        })
        .collect();
    Parsed {
        ok: json.is_some(),
        diagnostics,
        globals,
        json,
    }
}

fn assert_clean(parsed: &Parsed) {
    assert!(
        parsed.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        parsed.diagnostics
    );
    assert!(parsed.ok);
}

fn global_type<'p>(parsed: &'p Parsed, name: &str) -> &'p str {
    &parsed
        .globals
        .iter()
        .find(|(n, _, _, hidden)| n == name && !hidden)
        .unwrap_or_else(|| panic!("no global named `{}`", name))
        .1
}

/// Walk a JSON AST collecting every node of a given kind.
fn collect_nodes<'v>(value: &'v serde_json::Value, kind: &str, out: &mut Vec<&'v serde_json::Value>) {
    match value {
        serde_json::Value::Object(map) => {
            if map.get("node").and_then(|n| n.as_str()) == Some(kind) {
                out.push(value);
            }
            for child in map.values() {
                collect_nodes(child, kind, out);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_nodes(item, kind, out);
            }
        }
        _ => {}
    }
}

// ============================================================================
// Declarations and simple statements
// ============================================================================

#[test]
fn variable_declarations() {
    let parsed = parse("num x = 1; str s = \"hi\"; bool b = true; num? maybe = null;");
    assert_clean(&parsed);
    assert_eq!(global_type(&parsed, "x"), "num");
    assert_eq!(global_type(&parsed, "s"), "str");
    assert_eq!(global_type(&parsed, "maybe"), "num?");
}

#[test]
fn list_and_map_declarations_have_their_own_node_kinds() {
    let parsed = parse("[num] xs = [1, 2, 3]; {str,num} m = { \"a\": 1 };");
    assert_clean(&parsed);
    assert_eq!(global_type(&parsed, "xs"), "[num]");
    assert_eq!(global_type(&parsed, "m"), "{str,num}");

    let json = parsed.json.unwrap();
    let mut lists = Vec::new();
    collect_nodes(&json, "ListDeclaration", &mut lists);
    assert_eq!(lists.len(), 1);
    let mut maps = Vec::new();
    collect_nodes(&json, "MapDeclaration", &mut maps);
    assert_eq!(maps.len(), 1);
}

#[test]
fn initializer_type_mismatch_is_reported() {
    let parsed = parse("num x = \"hello\";");
    assert!(!parsed.ok);
    assert_eq!(parsed.diagnostics.len(), 1);
    assert_eq!(parsed.diagnostics[0].message, "Expected `num`, got `str`.");
}

#[test]
fn reading_a_global_in_its_own_initializer_fails() {
    let parsed = parse("num x = x;");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0]
        .message
        .contains("in its own initializer"));
}

#[test]
fn reading_a_local_in_its_own_initializer_fails() {
    let parsed = parse("fun f() > void { num a = 1; { num a = a; } }");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0]
        .message
        .contains("in its own initializer"));
}

#[test]
fn shadowing_in_the_same_scope_fails() {
    let parsed = parse("fun f() > void { num a = 1; num a = 2; }");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("already exists"));
}

#[test]
fn assigning_to_a_constant_fails() {
    let parsed = parse("const num x = 1; fun f() > void { x = 2; }");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("constant"));
}

#[test]
fn invalid_assignment_target() {
    let parsed = parse("fun f() > void { 1 + 2 = 3; }");
    assert!(!parsed.ok);
    assert!(parsed
        .diagnostics
        .iter()
        .any(|d| d.message == "Invalid assignment target."));
}

// ============================================================================
// Scenario: recursive function
// ============================================================================

#[test]
fn recursive_function_resolves_through_its_own_placeholder() {
    let parsed =
        parse("fun fact(num n) > num { if (n == 0) return 1; return n * fact(n - 1); }");
    assert_clean(&parsed);
    assert_eq!(global_type(&parsed, "fact"), "Function fact(num) > num");

    // The recursive call site observed the resolved signature: its Call
    // node is typed `num`.
    let json = parsed.json.unwrap();
    let mut calls = Vec::new();
    collect_nodes(&json, "Call", &mut calls);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["type_def"], "num");
}

// ============================================================================
// Scenario: forward-referenced object
// ============================================================================

#[test]
fn forward_referenced_object_resolves() {
    let parsed = parse(
        "fun make() > Point { return Point{ x = 0, y = 0 }; } object Point { num x, num y, }",
    );
    assert_clean(&parsed);
    assert_eq!(global_type(&parsed, "make"), "Function make() > Point");
    assert_eq!(global_type(&parsed, "Point"), "object Point");

    let json = parsed.json.unwrap();
    let mut inits = Vec::new();
    collect_nodes(&json, "ObjectInit", &mut inits);
    assert_eq!(inits.len(), 1);
    assert_eq!(inits[0]["type_def"], "Point");
}

// ============================================================================
// Scenario: type mismatch through a placeholder chain
// ============================================================================

#[test]
fn mismatch_through_chain_is_reported_at_the_use_site() {
    let source = "fun use(Unknown u) > void { u.field + 1; } object Unknown { str field, }";
    let parsed = parse(source);
    assert!(!parsed.ok);
    assert_eq!(parsed.diagnostics.len(), 1);
    let diagnostic = &parsed.diagnostics[0];
    assert_eq!(diagnostic.message, "Expected `num`, got `str`.");
    // Reported at the `+` token, not at the declaration of `Unknown`.
    assert_eq!(diagnostic.line, 0);
    assert_eq!(diagnostic.column as usize, source.find('+').unwrap());
}

// ============================================================================
// Scenario: subscript on a placeholder, then resolution
// ============================================================================

#[test]
fn subscript_on_placeholder_resolves_to_element_type() {
    let parsed = parse("fun f(X xs) > void { xs[0] + 1; } [num] X;");
    assert_clean(&parsed);
    assert_eq!(global_type(&parsed, "X"), "[num]");

    let json = parsed.json.unwrap();
    let mut subscripts = Vec::new();
    collect_nodes(&json, "Subscript", &mut subscripts);
    assert_eq!(subscripts.len(), 1);
    assert_eq!(subscripts[0]["type_def"], "num");
}

#[test]
fn subscript_mismatch_through_placeholder_is_an_error() {
    let parsed = parse("fun f(X xs) > void { xs[0] + 1; } [str] X;");
    assert!(!parsed.ok);
    assert!(parsed
        .diagnostics
        .iter()
        .any(|d| d.message == "Expected `num`, got `str`."));
}

// ============================================================================
// Scenario: JSON AST dump
// ============================================================================

#[test]
fn dumping_ast_to_json() {
    let parsed = parse("str yo = \"hello\"; fun main([str] args) > num { return 1; }");
    assert_clean(&parsed);

    let json = parsed.json.unwrap();
    assert_eq!(json["node"], "Function");
    assert_eq!(json["type"], "ScriptEntryPoint");

    let mut declarations = Vec::new();
    collect_nodes(&json, "VarDeclaration", &mut declarations);
    let yo = declarations
        .iter()
        .find(|d| d["identifier"] == "yo")
        .expect("yo declaration");
    assert!(yo["type_def"].as_str().unwrap().starts_with("str"));
    assert_eq!(yo["constant"], false);

    let mut functions = Vec::new();
    collect_nodes(&json, "Function", &mut functions);
    let main = functions
        .iter()
        .find(|f| f["name"] == "main")
        .expect("main function");
    assert_eq!(main["type"], "EntryPoint");
    assert_eq!(
        main["type_def"],
        "Function main([str]) > num"
    );
}

#[test]
fn every_dumped_node_carries_a_type_def_field() {
    let parsed = parse("fun f(num a) > num { return a + 1; }");
    assert_clean(&parsed);
    let json = parsed.json.unwrap();
    for kind in ["Function", "Return", "Binary", "NamedVariable", "Number"] {
        let mut nodes = Vec::new();
        collect_nodes(&json, kind, &mut nodes);
        assert!(!nodes.is_empty(), "no {} node", kind);
        for node in nodes {
            assert!(node.get("type_def").is_some(), "{} lacks type_def", kind);
        }
    }
}

// ============================================================================
// Objects, classes, enums
// ============================================================================

#[test]
fn method_can_use_fields_declared_later() {
    let parsed = parse(
        "object Point {\n fun norm() > num { return this.x * this.x + this.y * this.y; }\n num x, num y,\n}",
    );
    assert_clean(&parsed);
}

#[test]
fn unknown_member_through_this_is_an_error() {
    let parsed = parse("object Point { fun broken() > num { return this.z; } num x, }");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("no member `z`"));
}

#[test]
fn duplicate_member_is_rejected() {
    let parsed = parse("object Point { num x, str x, }");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("already exists"));
}

#[test]
fn object_must_be_top_level() {
    let parsed = parse("fun f() > void { object Inner { num x, } }");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("top level"));
}

#[test]
fn class_inheritance_and_super_calls() {
    let parsed = parse(
        "class Animal { fun noise() > str { return \"...\"; } }\n\
         class Dog < Animal { fun bark() > str { return super.noise(); } }",
    );
    assert_clean(&parsed);
    assert_eq!(global_type(&parsed, "Dog"), "object Dog");
}

#[test]
fn object_is_not_inheritable() {
    let parsed = parse("object Animal { num age, } class Dog < Animal { }");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("not inheritable"));
}

#[test]
fn enum_declaration_and_case_access() {
    let parsed = parse(
        "enum Color { red, green, blue }\n\
         fun main([str] args) > num { Color c = Color.red; return 0; }",
    );
    assert_clean(&parsed);
    assert_eq!(global_type(&parsed, "Color"), "enum Color");

    let json = parsed.json.unwrap();
    let mut enums = Vec::new();
    collect_nodes(&json, "Enum", &mut enums);
    assert_eq!(enums.len(), 1);
    assert_eq!(enums[0]["cases"].as_array().unwrap().len(), 3);
}

#[test]
fn enum_with_string_cases() {
    let parsed = parse("enum(str) Name { joe = \"joe\", bill = \"bill\" }");
    assert_clean(&parsed);
}

#[test]
fn empty_enum_is_rejected() {
    let parsed = parse("enum Nothing { }");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("no cases"));
}

#[test]
fn missing_enum_case_is_an_error() {
    let parsed = parse("enum Color { red } fun f() > void { Color.purple; }");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("purple"));
}

#[test]
fn forward_referenced_enum_case_resolves() {
    let parsed = parse("fun pick() > Color { return Color.red; } enum Color { red, green }");
    assert_clean(&parsed);
    assert_eq!(global_type(&parsed, "pick"), "Function pick() > Color");
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn loops_parse_and_type_check() {
    let parsed = parse(
        "fun f() > num {\n\
           num total = 0;\n\
           for (num i = 0; i < 10; i = i + 1) { total = total + i; }\n\
           while (total > 100) { total = total - 1; }\n\
           do { total = total + 2; } until (total > 5)\n\
           foreach (num i, num v in [1, 2, 3]) { total = total + v; }\n\
           return total;\n\
         }",
    );
    assert_clean(&parsed);
}

#[test]
fn foreach_over_map_checks_key_and_value_types() {
    let parsed = parse(
        "fun f({str,num} m) > void { foreach (str k, num v in m) { v + 1; } }",
    );
    assert_clean(&parsed);
}

#[test]
fn foreach_over_non_iterable_is_an_error() {
    let parsed = parse("fun f() > void { foreach (num v in true) { } }");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("not iterable"));
}

#[test]
fn condition_must_be_bool() {
    let parsed = parse("fun f() > void { if (1) { } }");
    assert!(!parsed.ok);
    assert_eq!(parsed.diagnostics[0].message, "Expected `bool`, got `num`.");
}

// ============================================================================
// Expressions and operators
// ============================================================================

#[test]
fn precedence_is_respected() {
    let parsed = parse("num x = 1 + 2 * 3;");
    assert_clean(&parsed);
    let json = parsed.json.unwrap();
    let mut binaries = Vec::new();
    collect_nodes(&json, "Binary", &mut binaries);
    // Root binary is `+`, its right child is `*`.
    let plus = binaries.iter().find(|b| b["operator"] == "+").unwrap();
    assert_eq!(plus["right"]["operator"], "*");
}

#[test]
fn string_concatenation() {
    let parsed = parse("str s = \"a\" + \"b\";");
    assert_clean(&parsed);
}

#[test]
fn string_interpolation_builds_parts() {
    let parsed = parse("str name = \"world\"; str s = \"hello {name}!\";");
    assert_clean(&parsed);
    let json = parsed.json.unwrap();
    let mut strings = Vec::new();
    collect_nodes(&json, "String", &mut strings);
    assert_eq!(strings.len(), 1);
    let elements = strings[0]["elements"].as_array().unwrap();
    assert_eq!(elements.len(), 3);
    assert_eq!(elements[0]["node"], "StringLiteral");
    assert_eq!(elements[1]["node"], "NamedVariable");
    assert_eq!(elements[2]["node"], "StringLiteral");
}

#[test]
fn escaped_braces_are_not_interpolation() {
    let parsed = parse("str s = \"a \\{literal} b\";");
    assert!(parsed.ok, "diagnostics: {:?}", parsed.diagnostics);
    let json = parsed.json.unwrap();
    let mut strings = Vec::new();
    collect_nodes(&json, "String", &mut strings);
    assert!(strings.is_empty());
}

#[test]
fn adding_a_string_to_a_number_fails() {
    let parsed = parse("num x = 1 + \"a\";");
    assert!(!parsed.ok);
    assert_eq!(parsed.diagnostics[0].message, "Expected `num`, got `str`.");
}

#[test]
fn comparison_and_logic_produce_bool() {
    let parsed = parse("bool b = 1 < 2 and 3 >= 2 or false;");
    assert_clean(&parsed);
}

#[test]
fn null_coalescing_strips_optional() {
    let parsed = parse("num? maybe = null; num x = maybe ?? 0;");
    assert_clean(&parsed);
}

#[test]
fn force_unwrap_strips_optional() {
    let parsed = parse("num? maybe = 1; num x = maybe!;");
    assert_clean(&parsed);
}

#[test]
fn unwrapping_a_non_optional_fails() {
    let parsed = parse("num x = 1; num y = x!;");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("non-optional"));
}

#[test]
fn is_expression_produces_bool() {
    let parsed = parse("bool b = 1 is num;");
    assert_clean(&parsed);
    let json = parsed.json.unwrap();
    let mut nodes = Vec::new();
    collect_nodes(&json, "Is", &mut nodes);
    assert_eq!(nodes[0]["constant"], "num");
    assert_eq!(nodes[0]["type_def"], "bool");
}

#[test]
fn named_arguments_are_checked() {
    let parsed = parse("fun add(num a, num b) > num { return a + b; } num x = add(a: 1, b: 2);");
    assert_clean(&parsed);

    let parsed = parse("fun add(num a, num b) > num { return a + b; } num x = add(c: 1, b: 2);");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("no parameter named `c`"));
}

#[test]
fn missing_argument_without_default_is_an_error() {
    let parsed = parse("fun add(num a, num b = 2) > num { return a + b; } num x = add(1);");
    assert_clean(&parsed);

    let parsed = parse("fun add(num a, num b) > num { return a + b; } num x = add(1);");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("arguments"));
}

#[test]
fn calling_a_number_fails() {
    let parsed = parse("num x = 1; fun f() > void { x(); }");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("not callable"));
}

#[test]
fn lambdas_capture_upvalues() {
    let parsed = parse(
        "fun outer() > void {\n\
           num captured = 1;\n\
           fun inner() > num { return captured; }\n\
         }",
    );
    assert_clean(&parsed);
}

#[test]
fn builtin_members_on_strings_lists_maps() {
    let parsed = parse(
        "fun f([num] xs, {str,num} m, str s) > num {\n\
           xs.append(1);\n\
           return xs.len() + m.size() + s.len();\n\
         }",
    );
    assert_clean(&parsed);
}

#[test]
fn catch_clauses_attach_to_calls() {
    let parsed = parse(
        "fun risky() > num { return 1; }\n\
         fun f() > num { return risky() catch 0; }",
    );
    assert_clean(&parsed);
    let json = parsed.json.unwrap();
    let mut catches = Vec::new();
    collect_nodes(&json, "Catch", &mut catches);
    assert_eq!(catches.len(), 1);
}

#[test]
fn catch_closure_infers_the_call_result_type() {
    let parsed = parse(
        "fun risky() > num { return 1; }\n\
         fun f() > num { return risky() catch { fun (str error) { return 0; } }; }",
    );
    assert_clean(&parsed);
}

#[test]
fn catch_default_of_wrong_type_fails() {
    let parsed = parse(
        "fun risky() > num { return 1; }\n\
         fun f() > num { return risky() catch \"oops\"; }",
    );
    assert!(!parsed.ok);
    assert_eq!(parsed.diagnostics[0].message, "Expected `num`, got `str`.");
}

// ============================================================================
// Placeholders and failure modes
// ============================================================================

#[test]
fn unresolved_global_is_reported_at_end_of_unit() {
    let parsed = parse("fun main([str] args) > num { print(\"hello\"); return 0; }");
    assert!(!parsed.ok);
    assert!(parsed
        .diagnostics
        .iter()
        .any(|d| d.message.contains("Unknown symbol `print`")));
}

#[test]
fn incoherent_placeholder_usage_is_detected() {
    // `thing` is called and subscripted; no type satisfies both.
    let parsed = parse("fun f() > void { thing(); thing[0]; } fun thing() > void { }");
    assert!(!parsed.ok);
    assert!(parsed
        .diagnostics
        .iter()
        .any(|d| d.message.contains("Incoherent use")));
}

#[test]
fn panic_mode_recovers_at_statement_boundary() {
    let parsed = parse("fun f() > void { 1 +; } fun g() > void { }");
    assert!(!parsed.ok);
    // The second declaration still parses; only one error for the first.
    assert_eq!(parsed.diagnostics.len(), 1);
}

#[test]
fn too_many_parameters_is_reported() {
    let parameters = (0..256)
        .map(|i| format!("num p{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let source = format!("fun f({}) > void {{ }}", parameters);
    let parsed = parse(&source);
    assert!(!parsed.ok);
    assert!(parsed
        .diagnostics
        .iter()
        .any(|d| d.message.contains("255 parameters")));
}

#[test]
fn too_many_locals_is_reported() {
    let body = (0..256)
        .map(|i| format!("num l{} = {};", i, i))
        .collect::<Vec<_>>()
        .join(" ");
    let source = format!("fun f() > void {{ {} }}", body);
    let parsed = parse(&source);
    assert!(!parsed.ok);
    assert!(parsed
        .diagnostics
        .iter()
        .any(|d| d.message.contains("255 local variables")));
}

// ============================================================================
// Extern functions
// ============================================================================

#[test]
fn extern_fun_resolves_through_the_symbol_resolver() {
    let arena = Bump::new();
    let mut natives = StaticNatives::new();
    natives.register("test", "assert", 0x1);
    let mut ctx = CompileContext::new(Box::new(natives));
    let result = Parser::parse(
        &arena,
        &mut ctx,
        "extern fun assert(bool condition, str message) > void;",
        "test.buzz",
        false,
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics.diagnostics());
    assert!(result.function.is_some());
}

#[test]
fn missing_native_symbol_is_an_error() {
    let parsed = parse("extern fun missing() > void;");
    assert!(!parsed.ok);
    assert!(parsed.diagnostics[0].message.contains("missing"));
}

// ============================================================================
// Tests as declarations
// ============================================================================

#[test]
fn test_blocks_get_synthetic_names() {
    let parsed = parse("test \"it works\" { num a = 1; } test \"it still works\" { }");
    assert_clean(&parsed);
    assert!(parsed.globals.iter().any(|(n, _, _, _)| n == "$test#0"));
    assert!(parsed.globals.iter().any(|(n, _, _, _)| n == "$test#1"));
}

// ============================================================================
// Canonical round-trips through declared types
// ============================================================================

#[test]
fn canonical_forms_round_trip_through_annotations() {
    let parsed = parse(
        "[{str,num}] table = []; {str,[num]} index = {}; num? maybe = null; [str] names = [];",
    );
    assert_clean(&parsed);
    assert_eq!(global_type(&parsed, "table"), "[{str,num}]");
    assert_eq!(global_type(&parsed, "index"), "{str,[num]}");
    assert_eq!(global_type(&parsed, "maybe"), "num?");
    assert_eq!(global_type(&parsed, "names"), "[str]");
}
