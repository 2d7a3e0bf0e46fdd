//! Builtin filters
//!
//! `format_number` and `pad_zero` are the NC-specific formatting filters and
//! never fail: input they cannot interpret is passed through unchanged.

use crate::value::Value;

/// Largest `decimals` or `width` the formatting filters honour. Beyond it the
/// value is passed through unchanged.
pub const MAX_FORMAT_WIDTH: usize = 512;

/// Fixed-point formatting with trailing zeros and a trailing point removed.
///
/// `format_number(3.0, 3)` gives `"3"` and `format_number(3.14159, 2)` gives
/// `"3.14"`. Numeric strings are accepted; anything else is returned as its
/// display form, as is any value when `decimals` exceeds
/// [`MAX_FORMAT_WIDTH`].
pub fn format_number(value: &Value, decimals: usize) -> String {
    let Some(n) = value.as_f64().filter(|_| decimals <= MAX_FORMAT_WIDTH) else {
        return value.to_string();
    };
    let fixed = format!("{:.*}", decimals, n);
    let trimmed = if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.')
    } else {
        fixed.as_str()
    };
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Zero-pad the integer form of `value` to `width` digits, keeping a minus
/// sign in front. Floats are truncated; strings must hold an integer. Wider
/// numbers are never cut and other input is returned as its display form, as
/// is any value when `width` exceeds [`MAX_FORMAT_WIDTH`].
pub fn pad_zero(value: &Value, width: usize) -> String {
    match value.as_truncated_i64().filter(|_| width <= MAX_FORMAT_WIDTH) {
        Some(i) if i < 0 => format!("-{:0>w$}", i.unsigned_abs(), w = width.saturating_sub(1)),
        Some(i) => format!("{:0>w$}", i, w = width),
        None => value.to_string(),
    }
}

/// Evaluated filter arguments
#[derive(Debug, Default)]
pub(crate) struct FilterArgs {
    pub positional: Vec<Value>,
    pub keyword: Vec<(String, Value)>,
}

impl FilterArgs {
    /// Argument by position or by keyword
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.keyword
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
            .or_else(|| self.positional.get(index))
    }

    /// Reject extra positional arguments and unknown keywords
    pub fn check(&self, filter: &str, names: &[&str]) -> Result<(), String> {
        if self.positional.len() > names.len() {
            return Err(format!(
                "filter '{}' takes at most {} argument(s), got {}",
                filter,
                names.len(),
                self.positional.len()
            ));
        }
        match self.keyword.iter().find(|(k, _)| !names.contains(&k.as_str())) {
            Some((k, _)) => Err(format!("filter '{}' has no argument '{}'", filter, k)),
            None => Ok(()),
        }
    }

    fn count(&self, index: usize, name: &str, default: usize) -> Result<usize, String> {
        match self.get(index, name) {
            None => Ok(default),
            Some(v) => v
                .as_i64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| format!("argument '{}' must be a non-negative integer, got '{}'", name, v)),
        }
    }
}

/// Names accepted by [`apply`], plus `default` which the evaluator handles
pub const FILTER_NAMES: &[&str] = &[
    "format_number",
    "pad_zero",
    "default",
    "upper",
    "lower",
    "trim",
    "round",
    "int",
    "float",
    "abs",
    "string",
    "length",
    "join",
];

/// Apply a builtin filter to an already evaluated value
pub(crate) fn apply(name: &str, value: Value, args: &FilterArgs) -> Result<Value, String> {
    match name {
        "format_number" => {
            args.check(name, &["decimals"])?;
            let decimals = args.count(0, "decimals", 3)?;
            Ok(match value.as_f64() {
                Some(_) if decimals <= MAX_FORMAT_WIDTH => Value::Str(format_number(&value, decimals)),
                _ => value,
            })
        }
        "pad_zero" => {
            args.check(name, &["width"])?;
            let width = args.count(0, "width", 4)?;
            Ok(match value.as_truncated_i64() {
                Some(_) if width <= MAX_FORMAT_WIDTH => Value::Str(pad_zero(&value, width)),
                _ => value,
            })
        }
        "upper" => {
            args.check(name, &[])?;
            Ok(Value::Str(value.to_string().to_uppercase()))
        }
        "lower" => {
            args.check(name, &[])?;
            Ok(Value::Str(value.to_string().to_lowercase()))
        }
        "trim" => {
            args.check(name, &[])?;
            Ok(Value::Str(value.to_string().trim().to_string()))
        }
        "round" => {
            args.check(name, &["precision", "method"])?;
            let precision = args.count(0, "precision", 0)?;
            let method = match args.get(1, "method") {
                Some(m) => m.to_string(),
                None => "common".to_string(),
            };
            round(&value, precision, &method)
        }
        "int" => {
            args.check(name, &["default"])?;
            let fallback = args.get(0, "default").cloned().unwrap_or(Value::Int(0));
            Ok(to_int(&value).map(Value::Int).unwrap_or(fallback))
        }
        "float" => {
            args.check(name, &["default"])?;
            let fallback = args.get(0, "default").cloned().unwrap_or(Value::Float(0.0));
            Ok(to_float(&value).map(Value::Float).unwrap_or(fallback))
        }
        "abs" => {
            args.check(name, &[])?;
            match value {
                Value::Int(i) => i
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| "integer overflow in abs".to_string()),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(format!("filter 'abs' expects a number, got {}", other.type_name())),
            }
        }
        "string" => {
            args.check(name, &[])?;
            Ok(Value::Str(value.to_string()))
        }
        "length" => {
            args.check(name, &[])?;
            let len = match &value {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(map) => map.len(),
                other => return Err(format!("filter 'length' expects a string, list or map, got {}", other.type_name())),
            };
            Ok(Value::Int(len as i64))
        }
        "join" => {
            args.check(name, &["d"])?;
            let separator = args.get(0, "d").map(|v| v.to_string()).unwrap_or_default();
            match value {
                Value::List(items) => Ok(Value::Str(
                    items.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(&separator),
                )),
                Value::Str(s) => Ok(Value::Str(
                    s.chars().map(String::from).collect::<Vec<_>>().join(&separator),
                )),
                other => Err(format!("filter 'join' expects a list, got {}", other.type_name())),
            }
        }
        other => Err(format!("unknown filter '{}'", other)),
    }
}

fn round(value: &Value, precision: usize, method: &str) -> Result<Value, String> {
    let n = match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        other => return Err(format!("filter 'round' expects a number, got {}", other.type_name())),
    };
    let factor = 10f64.powi(precision.min(15) as i32);
    let scaled = n * factor;
    let rounded = match method {
        "common" => scaled.round(),
        "ceil" => scaled.ceil(),
        "floor" => scaled.floor(),
        other => return Err(format!("round method must be common, ceil or floor, got '{}'", other)),
    };
    Ok(Value::Float(rounded / factor))
}

fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Str(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| Value::Float(trimmed.parse::<f64>().ok()?).as_truncated_i64())
        }
        other => other.as_truncated_i64(),
    }
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        other => other.as_f64(),
    }
}
