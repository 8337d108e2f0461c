//! Import loader integration tests.
//!
//! These tests write scripts into a scratch directory and point `BUZZ_PATH`
//! at it. Everything lives in a single test function because the environment
//! variable is process-global and tests run in parallel.

use bumpalo::Bump;
use buzz_module::NoNatives;
use buzz_parser::{CompileContext, Parser};
use std::fs;
use std::path::PathBuf;

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("buzz-import-tests-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

fn write_script(dir: &PathBuf, name: &str, source: &str) {
    fs::write(dir.join(name), source).expect("write script");
}

struct Outcome {
    ok: bool,
    messages: Vec<String>,
    /// (prefix, name, hidden) for every merged global.
    globals: Vec<(Option<String>, String, bool)>,
}

fn parse_root(source: &str) -> Outcome {
    let arena = Bump::new();
    let mut ctx = CompileContext::new(Box::new(NoNatives));
    let result = Parser::parse(&arena, &mut ctx, source, "main.buzz", false);
    Outcome {
        ok: result.function.is_some(),
        messages: result
            .diagnostics
            .diagnostics()
            .iter()
            .map(|d| d.message.clone())
            .collect(),
        globals: result
            .globals
            .iter()
            .map(|g| {
                (
                    g.prefix.map(|p| ctx.interner.resolve(p).to_string()),
                    ctx.interner.resolve(g.name).to_string(),
                    g.hidden,
                )
            })
            .collect(),
    }
}

#[test]
fn import_semantics() {
    let dir = scratch_dir();
    write_script(
        &dir,
        "a.buzz",
        "export fun hello() > void { }\nfun secret() > num { return 1; }\n",
    );
    write_script(
        &dir,
        "c.buzz",
        "export fun one() > void { }\nexport fun two() > void { }\n",
    );
    write_script(&dir, "d.buzz", "fun hi() > void { }\nexport hi as greet;\n");
    std::env::set_var("BUZZ_PATH", &dir);

    // Prefixed import: one visible entry, {prefix: "A", name: "hello"};
    // the non-exported `secret` is merged hidden.
    let outcome = parse_root("import \"a\" as A;\nfun main([str] args) > num { A.hello(); return 0; }");
    assert!(outcome.ok, "diagnostics: {:?}", outcome.messages);
    let visible: Vec<_> = outcome
        .globals
        .iter()
        .filter(|(prefix, _, hidden)| !hidden && prefix.is_some())
        .collect();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].0.as_deref(), Some("A"));
    assert_eq!(visible[0].1, "hello");
    assert!(outcome
        .globals
        .iter()
        .any(|(_, name, hidden)| name == "secret" && *hidden));

    // Unprefixed import: the exported symbol resolves bare.
    let outcome = parse_root("import \"a\";\nfun main([str] args) > num { hello(); return 0; }");
    assert!(outcome.ok, "diagnostics: {:?}", outcome.messages);

    // A hidden global never resolves from the importing unit.
    let outcome = parse_root("import \"a\";\nfun main([str] args) > num { secret(); return 0; }");
    assert!(!outcome.ok);
    assert!(outcome
        .messages
        .iter()
        .any(|m| m.contains("Unknown symbol `secret`")));

    // Selective import: symbols outside the list stay hidden.
    let outcome =
        parse_root("import { one } from \"c\";\nfun main([str] args) > num { one(); return 0; }");
    assert!(outcome.ok, "diagnostics: {:?}", outcome.messages);
    let outcome =
        parse_root("import { one } from \"c\";\nfun main([str] args) > num { two(); return 0; }");
    assert!(!outcome.ok);
    assert!(outcome
        .messages
        .iter()
        .any(|m| m.contains("Unknown symbol `two`")));

    // Requesting a symbol the script does not export is an error.
    let outcome = parse_root("import { three } from \"c\";");
    assert!(!outcome.ok);
    assert!(outcome
        .messages
        .iter()
        .any(|m| m.contains("does not export")));

    // A re-export alias renames the importing unit's view.
    let outcome = parse_root("import \"d\";\nfun main([str] args) > num { greet(); return 0; }");
    assert!(outcome.ok, "diagnostics: {:?}", outcome.messages);
    let outcome = parse_root("import \"d\";\nfun main([str] args) > num { hi(); return 0; }");
    assert!(!outcome.ok);

    // Missing scripts are reported at the path token.
    let outcome = parse_root("import \"nope\";");
    assert!(!outcome.ok);
    assert!(outcome
        .messages
        .iter()
        .any(|m| m.contains("Could not find script `nope`")));

    // A two-script cycle trips the in-flight guard instead of recursing
    // forever.
    write_script(&dir, "x.buzz", "import \"y\";\n");
    write_script(&dir, "y.buzz", "import \"x\";\n");
    let outcome = parse_root("import \"x\";");
    assert!(!outcome.ok);
    assert!(outcome
        .messages
        .iter()
        .any(|m| m.contains("Circular import")));

    std::env::remove_var("BUZZ_PATH");
    let _ = fs::remove_dir_all(&dir);
}
