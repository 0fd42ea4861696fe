//! Structural entry contract for tenant scripts.
//!
//! Two independent textual checks run before a script is accepted:
//!
//! 1. exactly one `fn handle_request(<param>)` declaration with one parameter;
//! 2. exactly one `export` statement, and it is
//!    `export const handler = Fn("handle_request");`.
//!
//! Passing is a structural guarantee only. Whether the script parses, and
//! whether the export really resolves to the entry function, is verified by
//! the engine at compile time.

use crate::error::CompileError;
use regex::Regex;
use std::sync::LazyLock;

/// Name of the entry function every script must declare.
pub const ENTRY_FN: &str = "handle_request";

/// Name of the exported binding that must point at [`ENTRY_FN`].
pub const EXPORT_NAME: &str = "handler";

static ANY_ENTRY_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:private\s+)?fn\s+handle_request\s*\(").expect("valid regex")
});

static ONE_PARAM_ENTRY_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*fn\s+handle_request\s*\(\s*[A-Za-z_][A-Za-z0-9_]*\s*\)")
        .expect("valid regex")
});

static ANY_EXPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*export\b").expect("valid regex"));

static HANDLER_EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*export\s+const\s+handler\s*=\s*Fn\(\s*"handle_request"\s*\)\s*;"#)
        .expect("valid regex")
});

/// Check the entry declaration only.
pub fn check_entry(source: &str) -> Result<(), CompileError> {
    match ANY_ENTRY_DECL.find_iter(source).count() {
        0 => {
            return Err(CompileError::new(format!(
                "script must declare `fn {ENTRY_FN}(ctx)`"
            )));
        }
        1 => {}
        n => {
            return Err(CompileError::new(format!(
                "script declares `{ENTRY_FN}` {n} times, expected exactly once"
            )));
        }
    }
    if ONE_PARAM_ENTRY_DECL.find_iter(source).count() != 1 {
        return Err(CompileError::new(format!(
            "`{ENTRY_FN}` must be public and take exactly one parameter"
        )));
    }
    Ok(())
}

/// Check the export statement only.
pub fn check_export(source: &str) -> Result<(), CompileError> {
    let exports = ANY_EXPORT.find_iter(source).count();
    if exports != 1 {
        return Err(CompileError::new(format!(
            "script must contain exactly one export statement, found {exports}"
        )));
    }
    if HANDLER_EXPORT.find_iter(source).count() != 1 {
        return Err(CompileError::new(format!(
            "the only export must be `export const {EXPORT_NAME} = Fn(\"{ENTRY_FN}\");`"
        )));
    }
    Ok(())
}

/// Run both structural checks.
pub fn check(source: &str) -> Result<(), CompileError> {
    check_entry(source)?;
    check_export(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
fn handle_request(ctx) {
    ctx.send("hello");
}

export const handler = Fn("handle_request");
"#;

    #[test]
    fn test_valid_script_passes() {
        assert!(check(VALID).is_ok());
    }

    #[test]
    fn test_missing_entry_rejected_even_with_export() {
        let src = r#"
fn other(ctx) {}
export const handler = Fn("handle_request");
"#;
        assert!(check_entry(src).is_err());
        assert!(check_export(src).is_ok());
    }

    #[test]
    fn test_missing_export_rejected_even_with_entry() {
        let src = "fn handle_request(ctx) {}\n";
        assert!(check_entry(src).is_ok());
        assert!(check_export(src).is_err());
    }

    #[test]
    fn test_entry_arity_enforced() {
        for src in [
            "fn handle_request() {}\nexport const handler = Fn(\"handle_request\");",
            "fn handle_request(a, b) {}\nexport const handler = Fn(\"handle_request\");",
            "private fn handle_request(a) {}\nexport const handler = Fn(\"handle_request\");",
        ] {
            assert!(check(src).is_err(), "{src}");
        }
    }

    #[test]
    fn test_duplicate_entry_rejected() {
        let src = format!("{VALID}\nfn handle_request(other) {{}}\n");
        assert!(check_entry(&src).is_err());
    }

    #[test]
    fn test_extra_or_wrong_export_rejected() {
        let extra = format!("{VALID}\nexport const version = 2;\n");
        assert!(check_export(&extra).is_err());

        let wrong = "fn handle_request(ctx) {}\nexport const handler = Fn(\"other\");";
        assert!(check_export(wrong).is_err());

        let not_const = "fn handle_request(ctx) {}\nexport let handler = Fn(\"handle_request\");";
        assert!(check_export(not_const).is_err());
    }
}
