//! Cell normalization rules applied before anything is typed.

use crate::core::types::CellValue;

/// Literal that means "advance focus without typing".
pub const SKIP_SENTINEL: &str = "T";

/// Render a cell as the trimmed text that would be typed.
///
/// Missing values become the empty string. Integral numbers render without a
/// fractional part.
pub fn normalize(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Text(text) => text.trim().to_string(),
        CellValue::Number(number) => format_number(*number),
    }
}

/// True when the normalized value is the skip sentinel (case-insensitive).
pub fn is_skip(normalized: &str) -> bool {
    normalized.eq_ignore_ascii_case(SKIP_SENTINEL)
}

/// Convert decimal points to decimal commas for the target locale.
pub fn format_amount(normalized: &str) -> String {
    normalized.replace('.', ",")
}

fn format_number(number: f64) -> String {
    if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        format!("{number}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_text_and_maps_empty() {
        assert_eq!(normalize(&CellValue::Text("  OP1 ".to_string())), "OP1");
        assert_eq!(normalize(&CellValue::Empty), "");
    }

    #[test]
    fn normalize_numbers_without_trailing_zero() {
        assert_eq!(normalize(&CellValue::Number(10.0)), "10");
        assert_eq!(normalize(&CellValue::Number(1234.56)), "1234.56");
        assert_eq!(normalize(&CellValue::Number(-3.5)), "-3.5");
    }

    #[test]
    fn skip_sentinel_is_case_insensitive_and_exact() {
        assert!(is_skip("T"));
        assert!(is_skip("t"));
        assert!(!is_skip("TT"));
        assert!(!is_skip(""));
        assert!(!is_skip("Tab"));
    }

    #[test]
    fn amount_uses_decimal_comma() {
        assert_eq!(format_amount("1234.56"), "1234,56");
        assert_eq!(format_amount("1234,56"), "1234,56");
        assert_eq!(format_amount("42"), "42");
        assert_eq!(format_amount("1.234.56"), "1,234,56");
    }
}
