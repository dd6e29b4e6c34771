// src/payload.rs
//! Helpers for reading loosely-typed upstream payloads with
//! optional-chaining semantics: a missing nested field is `None`, never a
//! panic and never zero.

use serde_json::Value;

pub(crate) fn get<'a>(v: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(v, |acc, key| acc.get(*key))
}

pub(crate) fn get_f64(v: &Value, path: &[&str]) -> Option<f64> {
    get(v, path).and_then(Value::as_f64)
}

pub(crate) fn get_str<'a>(v: &'a Value, path: &[&str]) -> Option<&'a str> {
    get(v, path).and_then(Value::as_str)
}

pub(crate) fn get_array<'a>(v: &'a Value, path: &[&str]) -> Option<&'a Vec<Value>> {
    get(v, path).and_then(Value::as_array)
}

/// Render a JSON number the way it came in: integers without a decimal
/// point, anything else with one decimal place.
pub(crate) fn fmt_num(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{x:.1}")
    }
}

pub(crate) fn fmt_opt(x: Option<f64>) -> String {
    x.map(fmt_num).unwrap_or_else(|| "unknown".to_string())
}

/// Comma-grouped dollar amount for integral values.
pub(crate) fn fmt_money(x: f64) -> String {
    if x.fract() != 0.0 || x.abs() >= 1e15 {
        return format!("{x:.2}");
    }
    let negative = x < 0.0;
    let digits = format!("{}", (x.abs()) as i64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_lookup_degrades_to_none() {
        let v = json!({"a": {"b": 2}});
        assert_eq!(get_f64(&v, &["a", "b"]), Some(2.0));
        assert_eq!(get_f64(&v, &["a", "missing"]), None);
        assert_eq!(get_f64(&v, &["x", "b"]), None);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(fmt_num(42.0), "42");
        assert_eq!(fmt_num(12.34), "12.3");
        assert_eq!(fmt_opt(None), "unknown");
        assert_eq!(fmt_money(1250000.0), "1,250,000");
        assert_eq!(fmt_money(950.0), "950");
    }
}
