use std::sync::LazyLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// Grade policy constants
// ---------------------------------------------------------------------------

/// A parsed grade at or above this mark is a pass.
pub const PASS_MARK: f64 = 5.0;

/// Row averages strictly below this value are flagged for highlighting.
pub const LOW_AVERAGE_THRESHOLD: f64 = 4.0;

/// Whether a parsed grade counts as failed.
pub fn is_failing(grade: f64) -> bool {
    grade < PASS_MARK
}

// ---------------------------------------------------------------------------
// Locale-aware parsing
// ---------------------------------------------------------------------------

/// Parse grade text as exported by the school system.
///
/// The export writes decimals with a comma (`"7,5"`), but dot decimals are
/// accepted as well. Only the first comma is treated as the decimal
/// separator, and the longest leading numeric prefix is used, so `"8 (rec)"`
/// parses as `8.0`. Empty or non-numeric text yields `None`: a missing grade
/// is never the same as a zero.
pub fn parse_grade(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = trimmed.replacen(',', ".", 1);
    let prefix = NUMERIC_PREFIX.find(&normalized)?;
    prefix.as_str().parse::<f64>().ok()
}

/// Leading `[+-]digits[.digits][e[+-]digits]`, or a bare `.digits` fraction.
static NUMERIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?").unwrap()
});

// ---------------------------------------------------------------------------
// Display formatting
// ---------------------------------------------------------------------------

/// Render a number for table display: integral values without decimals,
/// everything else with two decimals. `None` renders as empty text.
pub fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => {
            if v.fract() == 0.0 {
                format!("{v:.0}")
            } else {
                format!("{v:.2}")
            }
        }
        _ => String::new(),
    }
}

/// Render a percentage: the number as in [`format_number`] followed by `%`.
pub fn format_percent(value: Option<f64>) -> String {
    let text = format_number(value);
    if text.is_empty() {
        text
    } else {
        format!("{text}%")
    }
}

/// Arithmetic mean of `values`, `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Share of passing grades in `values` as a percentage, `None` when empty.
pub fn pass_rate(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let passed = values.iter().filter(|&&g| !is_failing(g)).count();
    Some(passed as f64 / values.len() as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_and_dot_decimals() {
        assert_eq!(parse_grade("7,5"), Some(7.5));
        assert_eq!(parse_grade("7.5"), Some(7.5));
        assert_eq!(parse_grade(" 10 "), Some(10.0));
        assert_eq!(parse_grade("0"), Some(0.0));
    }

    #[test]
    fn empty_or_text_is_no_value() {
        assert_eq!(parse_grade(""), None);
        assert_eq!(parse_grade("   "), None);
        assert_eq!(parse_grade("abc"), None);
        assert_eq!(parse_grade("NP"), None);
        assert_eq!(parse_grade(","), None);
        assert_eq!(parse_grade("-"), None);
    }

    #[test]
    fn uses_leading_numeric_prefix() {
        assert_eq!(parse_grade("8 (rec)"), Some(8.0));
        assert_eq!(parse_grade("6,25abc"), Some(6.25));
        assert_eq!(parse_grade(".5"), Some(0.5));
        assert_eq!(parse_grade("5."), Some(5.0));
        assert_eq!(parse_grade("4e"), Some(4.0));
        assert_eq!(parse_grade("7,5e1"), Some(75.0));
        assert_eq!(parse_grade("-2,5 puntos"), Some(-2.5));
    }

    #[test]
    fn only_first_comma_is_a_separator() {
        assert_eq!(parse_grade("1,5,2"), Some(1.5));
    }

    #[test]
    fn formats_integral_and_fractional_values() {
        assert_eq!(format_number(Some(7.0)), "7");
        assert_eq!(format_number(Some(7.5)), "7.50");
        assert_eq!(format_number(Some(2.0 / 3.0)), "0.67");
        assert_eq!(format_number(None), "");
        assert_eq!(format_number(Some(f64::NAN)), "");
        assert_eq!(format_percent(Some(75.0)), "75%");
        assert_eq!(format_percent(Some(200.0 / 3.0)), "66.67%");
        assert_eq!(format_percent(None), "");
    }

    #[test]
    fn pass_rate_counts_five_as_pass() {
        assert_eq!(pass_rate(&[5.0, 4.99]), Some(50.0));
        assert_eq!(pass_rate(&[]), None);
        assert_eq!(mean(&[8.0, 4.0]), Some(6.0));
        assert_eq!(mean(&[]), None);
    }
}
