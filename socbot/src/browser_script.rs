//! Wrapping scripts for evaluation and interpreting what the page sends back.

use crate::errors::AutomationError;
use serde_json::Value;
use tracing::{debug, error};

/// Turns a function body into a single expression that applies it to `args`.
///
/// The body sees its arguments through `arguments`, exactly as a WebDriver-style
/// `execute_script` would expose them.
pub fn wrap_function(body: &str, args: &[Value]) -> Result<String, AutomationError> {
    let args = serde_json::to_string(args)?;
    debug!(
        script_bytes = body.len(),
        args_bytes = args.len(),
        "Preparing browser script"
    );
    Ok(format!("(function() {{\n{body}\n}}).apply(null, {args})"))
}

/// Raises script-level failures reported by the page as errors.
///
/// Handles an `ERROR:` string prefix (optionally followed by a JSON error object)
/// and structured results with `success: false` or `status: "failed" | "error"`.
pub fn check_script_result(result: Value) -> Result<Value, AutomationError> {
    if let Value::String(text) = &result {
        if let Some(raw) = text.trim_start().strip_prefix("ERROR:") {
            let raw = raw.trim();
            return match serde_json::from_str::<Value>(raw) {
                Ok(val) => {
                    let msg = val
                        .get("message")
                        .and_then(|v| v.as_str())
                        .unwrap_or("JavaScript execution error");
                    let code = val
                        .get("code")
                        .and_then(|v| v.as_str())
                        .unwrap_or("EVAL_ERROR");
                    error!(message = %msg, code = %code, "Browser script error");
                    Err(AutomationError::ScriptError(format!(
                        "JavaScript execution failed: {msg} ({code})"
                    )))
                }
                Err(_) => {
                    error!("Browser script error: {}", raw);
                    Err(AutomationError::ScriptError(format!(
                        "JavaScript execution error: {raw}"
                    )))
                }
            };
        }
    }

    let is_failure = result.get("success") == Some(&Value::Bool(false))
        || matches!(
            result.get("status").and_then(|v| v.as_str()),
            Some("failed") | Some("error")
        );
    if is_failure {
        let error_msg = result
            .get("message")
            .or_else(|| result.get("error"))
            .or_else(|| result.get("reason"))
            .and_then(|v| v.as_str())
            .unwrap_or("JavaScript returned failure status");
        error!("Browser script returned failure: {}", error_msg);
        return Err(AutomationError::ScriptError(format!(
            "JavaScript operation failed: {error_msg}"
        )));
    }

    Ok(result)
}

/// Unwraps the `{ok, data}` / `{ok: false, error}` envelope of the widget bridge.
pub fn interpret_envelope(op: &str, result: Value) -> Result<Value, AutomationError> {
    let result = check_script_result(result)?;
    match result.get("ok").and_then(|v| v.as_bool()) {
        Some(true) => Ok(result.get("data").cloned().unwrap_or(Value::Null)),
        Some(false) => {
            let msg = result
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown page error");
            Err(AutomationError::ScriptError(format!("{op}: {msg}")))
        }
        None => Err(AutomationError::ScriptError(format!(
            "{op}: page returned no result envelope: {result}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wraps_body_with_json_arguments() {
        let js = wrap_function("return arguments[0].op;", &[json!({"op": "pageState"})]).unwrap();
        assert!(js.starts_with("(function() {"));
        assert!(js.ends_with(r#".apply(null, [{"op":"pageState"}])"#));
    }

    #[test]
    fn error_prefix_becomes_script_error() {
        let err = check_script_result(json!("ERROR: {\"message\":\"boom\",\"code\":\"E1\"}"))
            .unwrap_err();
        assert!(matches!(err, AutomationError::ScriptError(m) if m.contains("boom (E1)")));

        let err = check_script_result(json!("ERROR: plain text")).unwrap_err();
        assert!(err.to_string().contains("plain text"));
    }

    #[test]
    fn structured_failures_are_detected() {
        assert!(check_script_result(json!({"success": false, "message": "nope"})).is_err());
        assert!(check_script_result(json!({"status": "failed"})).is_err());
        assert!(check_script_result(json!({"status": "done"})).is_ok());
        assert!(check_script_result(json!(42)).is_ok());
    }

    #[test]
    fn envelope_unwrapping() {
        assert_eq!(
            interpret_envelope("dataItems", json!({"ok": true, "data": [1, 2]})).unwrap(),
            json!([1, 2])
        );
        assert_eq!(
            interpret_envelope("notice", json!({"ok": true})).unwrap(),
            Value::Null
        );
        let err = interpret_envelope("setValue", json!({"ok": false, "error": "widget X is not initialized"}))
            .unwrap_err();
        assert!(err.to_string().contains("setValue: widget X"));
        assert!(interpret_envelope("pageState", Value::Null).is_err());
    }
}
