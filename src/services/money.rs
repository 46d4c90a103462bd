//! Lenient parsing for money and quantity fields from the ERP API.
//!
//! The remote API mixes locale formats ("1.234,56", "1,234.56", "R$ 10,00"),
//! nullable fields and the occasional garbage string, so every numeric field
//! goes through here instead of a plain deserialize.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

lazy_static! {
    // Everything that is not a digit, separator or sign
    static ref NON_NUMERIC: Regex = Regex::new(r"[^0-9,.\-]").unwrap();
}

/// Parse a JSON value into a Decimal, falling back to zero.
///
/// Accepts numbers and strings in either thousands convention. Null and
/// absent values are treated as zero silently; anything unparseable is
/// logged and also becomes zero, so downstream math never sees NaN or
/// infinity.
pub fn lenient_decimal(value: &serde_json::Value, field: &str) -> Decimal {
    match try_decimal(value) {
        Some(d) => d,
        None => {
            if !value.is_null() {
                tracing::warn!("Unparseable {} value {:?}, using 0", field, value);
            }
            Decimal::ZERO
        }
    }
}

fn try_decimal(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(Decimal::from(i));
            }
            n.as_f64().and_then(Decimal::from_f64_retain)
        }
        serde_json::Value::String(s) => parse_decimal_str(s),
        _ => None,
    }
}

/// Parse a currency-ish string ("R$ 1.234,56", "1,234.56", "10") into a Decimal.
pub fn parse_decimal_str(raw: &str) -> Option<Decimal> {
    let stripped = NON_NUMERIC.replace_all(raw, "");
    let stripped = stripped.trim();
    if stripped.is_empty() || stripped == "-" {
        return None;
    }

    let normalized = normalize_separators(stripped);
    Decimal::from_str(&normalized).ok()
}

/// Reduce a digit string with mixed `.`/`,` separators to a plain
/// `1234.56` form. The rightmost separator wins as the decimal point when
/// both appear; a lone comma is a decimal point only when it looks like
/// cents (one comma, at most two trailing digits).
fn normalize_separators(s: &str) -> String {
    let last_dot = s.rfind('.');
    let last_comma = s.rfind(',');

    match (last_dot, last_comma) {
        (Some(d), Some(c)) => {
            if c > d {
                // "1.234,56" — comma is decimal
                s.replace('.', "").replace(',', ".")
            } else {
                // "1,234.56" — dot is decimal
                s.replace(',', "")
            }
        }
        (None, Some(c)) => {
            let decimals = s.len() - c - 1;
            let comma_count = s.matches(',').count();
            if comma_count == 1 && decimals <= 2 {
                // "10,5" or "10,50" — decimal comma
                s.replace(',', ".")
            } else {
                // "1,234,567" — thousands commas
                s.replace(',', "")
            }
        }
        (Some(d), None) => {
            let decimals = s.len() - d - 1;
            let dot_count = s.matches('.').count();
            if dot_count == 1 && decimals <= 2 {
                s.to_string()
            } else {
                // "1.234.567" — thousands dots
                s.replace('.', "")
            }
        }
        (None, None) => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_brazilian_format() {
        assert_eq!(parse_decimal_str("1.234,56"), Some(dec!(1234.56)));
        assert_eq!(parse_decimal_str("R$ 10,00"), Some(dec!(10.00)));
        assert_eq!(parse_decimal_str("R$ 1.234.567,89"), Some(dec!(1234567.89)));
    }

    #[test]
    fn test_english_format() {
        assert_eq!(parse_decimal_str("1,234.56"), Some(dec!(1234.56)));
        assert_eq!(parse_decimal_str("1,234,567"), Some(dec!(1234567)));
        assert_eq!(parse_decimal_str("$99.90"), Some(dec!(99.90)));
    }

    #[test]
    fn test_plain_numbers() {
        assert_eq!(parse_decimal_str("10"), Some(dec!(10)));
        assert_eq!(parse_decimal_str("10,5"), Some(dec!(10.5)));
        assert_eq!(parse_decimal_str("-42.10"), Some(dec!(-42.10)));
    }

    #[test]
    fn test_garbage_is_none() {
        assert_eq!(parse_decimal_str(""), None);
        assert_eq!(parse_decimal_str("   "), None);
        assert_eq!(parse_decimal_str("n/a"), None);
        assert_eq!(parse_decimal_str("--"), None);
    }

    #[test]
    fn test_lenient_decimal_always_finite() {
        for v in [
            json!(""),
            json!("1.234,56"),
            json!(null),
            json!("R$ 10,00"),
            json!("garbage"),
            json!(true),
            json!([1, 2]),
        ] {
            // Decimal has no NaN/infinity; the point is that every input
            // yields a usable value instead of an error.
            let _ = lenient_decimal(&v, "total");
        }
        assert_eq!(lenient_decimal(&json!(null), "total"), Decimal::ZERO);
        assert_eq!(lenient_decimal(&json!("1.234,56"), "total"), dec!(1234.56));
        assert_eq!(lenient_decimal(&json!(15), "total"), dec!(15));
        assert_eq!(lenient_decimal(&json!(2.5), "total"), dec!(2.5));
    }
}
