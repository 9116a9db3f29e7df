//! Bridging between engine values and text/JSON.

use boa_engine::{js_string, Context, JsError, JsNativeError, JsResult, JsString, JsValue};

/// Text used for one `console.log` argument: strings verbatim, other
/// primitives in their JS form, objects as compact JSON.
pub fn display_value(value: &JsValue, ctx: &mut Context) -> String {
    if let Some(s) = value.as_string() {
        return s.to_std_string_escaped();
    }
    if let Some(obj) = value.as_object() {
        if obj.is_callable() {
            return value.display().to_string();
        }
        return match value.to_json(ctx) {
            Ok(json) => normalize_json(json).to_string(),
            Err(_) => value.display().to_string(),
        };
    }
    match value.to_string(ctx) {
        Ok(s) => s.to_std_string_escaped(),
        Err(_) => value.display().to_string(),
    }
}

/// Rendering of a returned value; `undefined` means nothing was returned.
pub fn render_returned(value: &JsValue, ctx: &mut Context) -> Option<String> {
    if value.is_undefined() {
        None
    } else {
        Some(display_value(value, ctx))
    }
}

/// JSON form of a value, never failing: `undefined` becomes `null` and
/// values without a JSON form fall back to their display text.
pub fn to_json_lossy(value: &JsValue, ctx: &mut Context) -> serde_json::Value {
    if value.is_undefined() {
        return serde_json::Value::Null;
    }
    value
        .to_json(ctx)
        .map(normalize_json)
        .unwrap_or_else(|_| serde_json::Value::String(value.display().to_string()))
}

/// Rewrites integral floats as integers so `2.0` prints as `2`, the way JS
/// prints numbers.
pub fn normalize_json(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(f as i64),
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_json).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, normalize_json(v))).collect()),
        other => other,
    }
}

/// Message carried by a thrown value: `error.message` for error objects,
/// the display text for anything else.
pub fn thrown_message(value: &JsValue, ctx: &mut Context) -> String {
    if let Some(obj) = value.as_object() {
        if let Ok(message) = obj.get(js_string!("message"), ctx) {
            if let Some(s) = message.as_string() {
                return s.to_std_string_escaped();
            }
        }
    }
    display_value(value, ctx)
}

pub fn error_message(err: JsError, ctx: &mut Context) -> String {
    let opaque = err.to_opaque(ctx);
    thrown_message(&opaque, ctx)
}

pub fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or_default()
}

pub fn string_arg(args: &[JsValue], index: usize, what: &str, ctx: &mut Context) -> JsResult<String> {
    let value = arg(args, index);
    if value.is_undefined() || value.is_null() {
        return Err(type_error(format!("missing argument '{}'", what)));
    }
    Ok(value.to_string(ctx)?.to_std_string_escaped())
}

pub fn optional_string_arg(args: &[JsValue], index: usize, ctx: &mut Context) -> JsResult<Option<String>> {
    let value = arg(args, index);
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    Ok(Some(value.to_string(ctx)?.to_std_string_escaped()))
}

pub fn json_arg(args: &[JsValue], index: usize, ctx: &mut Context) -> serde_json::Value {
    to_json_lossy(&arg(args, index), ctx)
}

pub fn text(s: impl AsRef<str>) -> JsValue {
    JsValue::from(JsString::from(s.as_ref()))
}

pub fn from_json(value: serde_json::Value, ctx: &mut Context) -> JsResult<JsValue> {
    JsValue::from_json(&normalize_json(value), ctx)
}

pub fn type_error(message: impl Into<String>) -> JsError {
    JsNativeError::typ().with_message(message.into()).into()
}

pub fn range_error(message: impl Into<String>) -> JsError {
    JsNativeError::range().with_message(message.into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;

    fn eval(src: &str, ctx: &mut Context) -> JsValue {
        ctx.eval(Source::from_bytes(src)).unwrap()
    }

    #[test]
    fn primitives_and_objects() {
        let mut ctx = Context::default();
        let v = eval("'hi'", &mut ctx);
        assert_eq!(display_value(&v, &mut ctx), "hi");
        let v = eval("1 + 1", &mut ctx);
        assert_eq!(display_value(&v, &mut ctx), "2");
        let v = eval("0.5", &mut ctx);
        assert_eq!(display_value(&v, &mut ctx), "0.5");
        let v = eval("true", &mut ctx);
        assert_eq!(display_value(&v, &mut ctx), "true");
        let v = eval("({a: [1, 2]})", &mut ctx);
        assert_eq!(display_value(&v, &mut ctx), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn returned_values() {
        let mut ctx = Context::default();
        assert_eq!(render_returned(&JsValue::undefined(), &mut ctx), None);
        assert_eq!(render_returned(&JsValue::null(), &mut ctx).as_deref(), Some("null"));
    }

    #[test]
    fn thrown_error_messages() {
        let mut ctx = Context::default();
        let v = eval("new Error('boom')", &mut ctx);
        assert_eq!(thrown_message(&v, &mut ctx), "boom");
        let v = eval("'plain'", &mut ctx);
        assert_eq!(thrown_message(&v, &mut ctx), "plain");
    }

    #[test]
    fn integral_floats_print_like_js() {
        let mut ctx = Context::default();
        let v = from_json(serde_json::json!([2.0, 0.5]), &mut ctx).unwrap();
        assert_eq!(display_value(&v, &mut ctx), "[2,0.5]");
    }
}
