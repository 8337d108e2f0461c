//! buzz: the buzz compiler front end CLI.
//!
//! Usage:
//!   buzz check <file>   parse and report diagnostics
//!   buzz ast <file>     parse and dump the AST as JSON
//!
//! `BUZZ_PATH` locates imported scripts and native libraries.

use bumpalo::Bump;
use buzz_diagnostics::DiagnosticCollection;
use buzz_module::NoNatives;
use buzz_parser::{CompileContext, Parser};
use clap::{Parser as ClapParser, Subcommand};
use std::process;

#[derive(ClapParser, Debug)]
#[command(name = "buzz", about = "The buzz compiler front end", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a script and report diagnostics.
    Check {
        /// The script to check.
        file: String,
    },
    /// Parse a script and print its AST as JSON.
    Ast {
        /// The script to dump.
        file: String,
    },
}

const RED: &str = "\x1b[31m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn main() {
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Command::Check { file } => run_check(&file),
        Command::Ast { file } => run_ast(&file),
    };
    process::exit(exit_code);
}

fn read_source(file: &str) -> Option<String> {
    match std::fs::read_to_string(file) {
        Ok(source) => Some(source),
        Err(error) => {
            eprintln!("{}{}error{}: could not read `{}`: {}", BOLD, RED, RESET, file, error);
            None
        }
    }
}

fn print_diagnostics(diagnostics: &DiagnosticCollection, ctx: &CompileContext<'_>) {
    for diagnostic in diagnostics.diagnostics() {
        match ctx.sources.get(&diagnostic.file) {
            Some(source) => eprint!("{}", diagnostic.render(source)),
            None => eprintln!("{}", diagnostic),
        }
    }
}

fn run_check(file: &str) -> i32 {
    let Some(source) = read_source(file) else {
        return 74;
    };
    let arena = Bump::new();
    let mut ctx = CompileContext::new(Box::new(NoNatives));
    let result = Parser::parse(&arena, &mut ctx, &source, file, false);

    let mut diagnostics = result.diagnostics;
    diagnostics.sort();
    print_diagnostics(&diagnostics, &ctx);

    if diagnostics.has_errors() {
        eprintln!(
            "{}{}{} error(s){}",
            BOLD,
            RED,
            diagnostics.len(),
            RESET
        );
        65
    } else {
        0
    }
}

fn run_ast(file: &str) -> i32 {
    let Some(source) = read_source(file) else {
        return 74;
    };
    let arena = Bump::new();
    let mut ctx = CompileContext::new(Box::new(NoNatives));
    let result = Parser::parse(&arena, &mut ctx, &source, file, false);

    let mut diagnostics = result.diagnostics;
    diagnostics.sort();
    print_diagnostics(&diagnostics, &ctx);

    match result.function {
        Some(function) => {
            let json = function.to_json(&ctx.registry);
            match serde_json::to_string_pretty(&json) {
                Ok(text) => println!("{}", text),
                Err(error) => {
                    eprintln!("{}{}error{}: {}", BOLD, RED, RESET, error);
                    return 70;
                }
            }
            0
        }
        None => 65,
    }
}
