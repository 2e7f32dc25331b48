//! Helper functions available in every template.
//!
//! | Function    | Result                                               |
//! |-------------|------------------------------------------------------|
//! | `seq(x, y)` | integers `x..=y`, empty when `x > y`, at most [`MAX_SEQ_LEN`] |
//! | `type(v)`   | type tag: null, bool, int, float, string, array, object |
//! | `toInt(v)`  | integer from an int, a float (truncated) or a string |
//!
//! ```jinja
//! {% for i in seq(1, 5) %}{{ i }}{% endfor %}
//! {{ type(Data.profile) }}
//! {{ toInt("42") + 1 }}
//! ```

use minijinja::{Environment, Error, ErrorKind, Value};
use std::num::ParseIntError;

#[derive(Debug, thiserror::Error)]
pub enum CoercionError {
    #[error("cannot convert {0} to int")]
    Unsupported(&'static str),

    #[error("cannot convert string {0:?} to int")]
    InvalidString(String, #[source] ParseIntError),

    #[error("number {0} is out of range for int")]
    OutOfRange(String),
}

/// Longest sequence `seq` will build.
pub const MAX_SEQ_LEN: u64 = 1_000_000;

/// Register the helper functions on a template environment.
pub fn register(env: &mut Environment<'_>) {
    env.add_function("seq", seq);
    env.add_function("type", |value: Value| -> Result<String, Error> {
        Ok(type_name(&to_json(&value)?).to_owned())
    });
    env.add_function("toInt", |value: Value| -> Result<i64, Error> {
        to_int(&to_json(&value)?).map_err(|err| {
            Error::new(ErrorKind::InvalidOperation, "toInt failed").with_source(err)
        })
    });
}

/// Ascending integers from `x` to `y` inclusive.
///
/// Fails instead of allocating when the range holds more than
/// [`MAX_SEQ_LEN`] integers.
pub fn seq(x: i64, y: i64) -> Result<Vec<i64>, Error> {
    if x > y {
        return Ok(Vec::new());
    }
    let len = y.abs_diff(x).checked_add(1);
    if len.is_none_or(|len| len > MAX_SEQ_LEN) {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("seq({x}, {y}) exceeds {MAX_SEQ_LEN} elements"),
        ));
    }
    Ok((x..=y).collect())
}

/// Human-readable tag for a dynamic value.
pub fn type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value as Json;

    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(n) if n.is_f64() => "float",
        Json::Number(_) => "int",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Coerce a dynamic value to an integer. Floats truncate toward zero.
pub fn to_int(value: &serde_json::Value) -> Result<i64, CoercionError> {
    use serde_json::Value as Json;

    match value {
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64().filter(|f| n.is_f64() && f.is_finite()) {
                let truncated = f.trunc();
                if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                    return Err(CoercionError::OutOfRange(n.to_string()));
                }
                Ok(truncated as i64)
            } else {
                Err(CoercionError::OutOfRange(n.to_string()))
            }
        }
        Json::String(s) => s
            .parse()
            .map_err(|err| CoercionError::InvalidString(s.clone(), err)),
        other => Err(CoercionError::Unsupported(type_name(other))),
    }
}

/// Bridge a template value into JSON so the helpers see one value model.
fn to_json(value: &Value) -> Result<serde_json::Value, Error> {
    serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::InvalidOperation, "unsupported template value").with_source(err)
    })
}
