//! Best-effort symbol demangling.

use cpp_demangle::{DemangleOptions, Symbol};
use rustc_demangle::try_demangle;

/// Human-readable form of a possibly mangled symbol.
///
/// Tries Rust (v0 and legacy) first, then Itanium C++. Anything that fails to
/// demangle is returned unchanged; this never errors.
pub fn demangle_symbol(raw: &str) -> String {
    if let Ok(demangled) = try_demangle(raw) {
        return format!("{demangled:#}");
    }
    if raw.starts_with("_Z") {
        if let Some(demangled) = demangle_cpp(raw) {
            return demangled;
        }
    }
    raw.to_string()
}

fn demangle_cpp(raw: &str) -> Option<String> {
    let symbol = Symbol::new(raw.as_bytes()).ok()?;
    symbol.demangle(&DemangleOptions::default()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demangles_legacy_rust_without_hash() {
        assert_eq!(demangle_symbol("_ZN4core3fmt5write17h0123456789abcdefE"), "core::fmt::write");
    }

    #[test]
    fn demangles_itanium_cpp() {
        assert_eq!(demangle_symbol("_Z3addii"), "add(int, int)");
    }

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(demangle_symbol("main"), "main");
        assert_eq!(demangle_symbol("div_op"), "div_op");
    }

    #[test]
    fn undecodable_mangling_is_kept_verbatim() {
        assert_eq!(demangle_symbol("_R"), "_R");
        assert_eq!(demangle_symbol("_Z"), "_Z");
    }
}
