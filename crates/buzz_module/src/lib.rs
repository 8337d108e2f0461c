//! buzz_module: locating scripts and native libraries.
//!
//! `import "pkg"` opens `$BUZZ_PATH/pkg.buzz`, falling back to `./pkg.buzz`.
//! Native libraries for `extern` functions are searched the same way with
//! the platform shared-library suffix. Actually loading a library is out of
//! scope for the front end; callers hand the parser a [`NativeResolver`].

use rustc_hash::FxHashMap;
use std::env;
use std::path::PathBuf;

/// Source files end with this suffix.
pub const SCRIPT_EXTENSION: &str = ".buzz";

/// Environment variable naming the single search path. Defaults to `.`.
pub const PATH_VARIABLE: &str = "BUZZ_PATH";

/// The shared-library suffix of the platform we compile natives for.
pub fn library_extension() -> &'static str {
    if cfg!(target_os = "macos") {
        ".dylib"
    } else if cfg!(target_os = "windows") {
        ".dll"
    } else {
        ".so"
    }
}

fn search_path() -> PathBuf {
    env::var(PATH_VARIABLE)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Locate the script `name` (no extension): `$BUZZ_PATH/<name>.buzz`, then
/// `./<name>.buzz`.
pub fn resolve_script(name: &str) -> Option<PathBuf> {
    let file_name = format!("{}{}", name, SCRIPT_EXTENSION);
    let candidate = search_path().join(&file_name);
    if candidate.exists() {
        return Some(candidate);
    }
    let local = PathBuf::from(".").join(&file_name);
    if local.exists() {
        return Some(local);
    }
    None
}

/// Locate the native library `name`: `$BUZZ_PATH/lib<name><ext>`, then
/// `./lib<name><ext>`.
pub fn resolve_library(name: &str) -> Option<PathBuf> {
    let file_name = format!("lib{}{}", name, library_extension());
    let candidate = search_path().join(&file_name);
    if candidate.exists() {
        return Some(candidate);
    }
    let local = PathBuf::from(".").join(&file_name);
    if local.exists() {
        return Some(local);
    }
    None
}

/// An opaque handle to a native function symbol.
pub type NativeHandle = usize;

/// Resolves `extern fun` bodies to native handles. The dynamic loader that
/// backs this in the full toolchain lives behind this seam; the front end
/// only needs the lookup.
pub trait NativeResolver {
    fn resolve(&self, lib_name: &str, symbol: &str) -> Result<NativeHandle, String>;
}

/// A resolver that knows no symbols. Every `extern fun` fails with a
/// diagnostic.
#[derive(Debug, Default)]
pub struct NoNatives;

impl NativeResolver for NoNatives {
    fn resolve(&self, lib_name: &str, symbol: &str) -> Result<NativeHandle, String> {
        Err(format!("no native library `{}` (symbol `{}`)", lib_name, symbol))
    }
}

/// A table-backed resolver, for tests and tooling that pre-register symbols.
#[derive(Debug, Default)]
pub struct StaticNatives {
    symbols: FxHashMap<(String, String), NativeHandle>,
}

impl StaticNatives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, lib_name: &str, symbol: &str, handle: NativeHandle) {
        self.symbols
            .insert((lib_name.to_string(), symbol.to_string()), handle);
    }
}

impl NativeResolver for StaticNatives {
    fn resolve(&self, lib_name: &str, symbol: &str) -> Result<NativeHandle, String> {
        self.symbols
            .get(&(lib_name.to_string(), symbol.to_string()))
            .copied()
            .ok_or_else(|| format!("symbol `{}` not found in `{}`", symbol, lib_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_extension_is_platform_specific() {
        let ext = library_extension();
        assert!(ext == ".so" || ext == ".dylib" || ext == ".dll");
    }

    #[test]
    fn static_natives_resolve_registered_symbols() {
        let mut natives = StaticNatives::new();
        natives.register("test", "assert", 0xdead);
        assert_eq!(natives.resolve("test", "assert"), Ok(0xdead));
        assert!(natives.resolve("test", "missing").is_err());
    }

    #[test]
    fn no_natives_always_fails() {
        assert!(NoNatives.resolve("std", "print").is_err());
    }
}
