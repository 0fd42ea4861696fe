//! Turning Rhai evaluation errors into [`TenantError`]s.
//!
//! Rhai reports a failure as a chain of `ErrorInFunctionCall` /
//! `ErrorInModule` wrappers around the innermost error. Only frames that
//! belong to the tenant script are kept: a frame is the tenant's if its source
//! is the script's origin, or if it carries no source and names one of the
//! functions declared in the tenant AST.

use rhai::{EvalAltResult, Position};
use runlet_core::TenantError;
use std::collections::HashSet;

fn location(origin: &str, pos: Position) -> String {
    match (pos.line(), pos.position()) {
        (Some(line), Some(col)) => format!("{origin}:{line}:{col}"),
        (Some(line), None) => format!("{origin}:{line}"),
        _ => origin.to_string(),
    }
}

fn message_of(err: &EvalAltResult) -> String {
    match err {
        EvalAltResult::ErrorRuntime(value, _) => value.to_string(),
        other => other.to_string(),
    }
}

/// Tenant frames of `err`, innermost first.
fn tenant_frames<'a>(
    err: &'a EvalAltResult,
    origin: &str,
    tenant_fns: &HashSet<String>,
) -> (Vec<String>, &'a EvalAltResult) {
    let mut frames = Vec::new();
    let mut current = err;
    // Top-level code of the handler's AST is tenant code.
    let mut innermost_is_tenant = true;

    loop {
        match current {
            EvalAltResult::ErrorInFunctionCall(name, source, inner, pos) => {
                let is_tenant =
                    source == origin || (source.is_empty() && tenant_fns.contains(name));
                if is_tenant {
                    frames.push(format!("{name} ({})", location(origin, *pos)));
                }
                innermost_is_tenant = is_tenant;
                current = inner.as_ref();
            }
            EvalAltResult::ErrorInModule(name, inner, pos) => {
                if innermost_is_tenant {
                    frames.push(format!("import {name} ({})", location(origin, *pos)));
                }
                innermost_is_tenant = false;
                current = inner.as_ref();
            }
            _ => break,
        }
    }

    if innermost_is_tenant && !current.position().is_none() {
        frames.push(location(origin, current.position()));
    }
    frames.reverse();
    (frames, current)
}

/// Wrap an invocation error in a frame for the entry function.
///
/// `call_fn` reports failures without a frame for the function it was asked
/// to call, so the entry would otherwise never show up in a stack.
pub(crate) fn with_entry_frame(
    err: Box<EvalAltResult>,
    entry: &str,
    origin: &str,
) -> Box<EvalAltResult> {
    if matches!(&*err, EvalAltResult::ErrorInFunctionCall(name, ..) if name == entry) {
        return err;
    }
    Box::new(EvalAltResult::ErrorInFunctionCall(
        entry.to_string(),
        origin.to_string(),
        err,
        Position::NONE,
    ))
}

/// Build the error reported for a failed invocation.
pub(crate) fn tenant_error(
    err: &EvalAltResult,
    origin: &str,
    tenant_fns: &HashSet<String>,
    debug: bool,
) -> TenantError {
    let (frames, innermost) = tenant_frames(err, origin, tenant_fns);
    let error = TenantError::new(message_of(innermost));
    if debug { error.with_stack(frames) } else { error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::Dynamic;

    const ORIGIN: &str = "lambda:acme/hello";

    fn thrown(message: &str) -> Box<EvalAltResult> {
        Box::new(EvalAltResult::ErrorRuntime(
            Dynamic::from(message.to_string()),
            Position::new(3, 5),
        ))
    }

    fn fns(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_thrown_value_is_the_message() {
        let err = tenant_error(&thrown("boom"), ORIGIN, &fns(&[]), false);
        assert_eq!(err.message, "boom");
        assert!(err.stack.is_none());
    }

    #[test]
    fn test_module_frames_are_dropped() {
        let err = EvalAltResult::ErrorInFunctionCall(
            "handle_request".to_string(),
            ORIGIN.to_string(),
            Box::new(EvalAltResult::ErrorInFunctionCall(
                "helper_in_module".to_string(),
                "module:greeting".to_string(),
                thrown("inside module"),
                Position::new(2, 1),
            )),
            Position::new(7, 9),
        );
        let err = tenant_error(&err, ORIGIN, &fns(&["handle_request"]), true);
        assert_eq!(err.message, "inside module");
        let stack = err.stack.unwrap();
        assert_eq!(stack, vec![format!("handle_request ({ORIGIN}:7:9)")]);
    }

    #[test]
    fn test_sourceless_frames_kept_only_for_tenant_functions() {
        let err = EvalAltResult::ErrorInFunctionCall(
            "validate".to_string(),
            String::new(),
            thrown("bad input"),
            Position::new(10, 2),
        );
        let kept = tenant_error(&err, ORIGIN, &fns(&["validate"]), true);
        assert_eq!(kept.stack.unwrap().len(), 2);

        let dropped = tenant_error(&err, ORIGIN, &fns(&[]), true);
        assert!(dropped.stack.unwrap().is_empty());
    }

    #[test]
    fn test_entry_frame_is_outermost() {
        let err = Box::new(EvalAltResult::ErrorInFunctionCall(
            "check".to_string(),
            String::new(),
            thrown("value required"),
            Position::new(8, 5),
        ));
        let err = with_entry_frame(err, "handle_request", ORIGIN);
        let stack = tenant_error(&err, ORIGIN, &fns(&["check", "handle_request"]), true)
            .stack
            .unwrap();
        assert_eq!(
            stack,
            vec![
                format!("{ORIGIN}:3:5"),
                format!("check ({ORIGIN}:8:5)"),
                format!("handle_request ({ORIGIN})"),
            ]
        );
    }

    #[test]
    fn test_entry_frame_added_once() {
        let err = with_entry_frame(thrown("x"), "handle_request", ORIGIN);
        let err = with_entry_frame(err, "handle_request", ORIGIN);
        let stack = tenant_error(&err, ORIGIN, &fns(&[]), true).stack.unwrap();
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_innermost_location_first() {
        let err = EvalAltResult::ErrorInFunctionCall(
            "handle_request".to_string(),
            ORIGIN.to_string(),
            thrown("x"),
            Position::new(8, 1),
        );
        let stack = tenant_error(&err, ORIGIN, &fns(&[]), true).stack.unwrap();
        assert_eq!(
            stack,
            vec![format!("{ORIGIN}:3:5"), format!("handle_request ({ORIGIN}:8:1)")]
        );
    }
}
