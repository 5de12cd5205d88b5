use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, TallyError};

/// Conversion factor: 1 display unit = 10,000 minor units (4 decimal places).
pub const SCALE: i64 = 10_000;

fn amount_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.\d{1,4})?$").unwrap())
}

/// Parse a user-entered decimal string into minor units.
///
/// Accepts at most 4 fractional digits; anything else is rejected before
/// conversion. Parsing is integer-only, so any accepted input round-trips
/// exactly through `to_display_string`.
pub fn parse_amount(input: &str) -> Result<i64> {
    let trimmed = input.trim();
    if !amount_pattern().is_match(trimmed) {
        return Err(TallyError::InvalidArgument(format!(
            "malformed amount '{input}': expected digits with at most 4 decimal places"
        )));
    }
    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };
    let whole: i64 = int_part
        .parse()
        .map_err(|_| TallyError::InvalidArgument(format!("amount '{input}' out of range")))?;
    let mut frac: i64 = 0;
    if !frac_part.is_empty() {
        frac = frac_part
            .parse()
            .map_err(|_| TallyError::InvalidArgument(format!("amount '{input}' out of range")))?;
        for _ in frac_part.len()..4 {
            frac *= 10;
        }
    }
    whole
        .checked_mul(SCALE)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| TallyError::InvalidArgument(format!("amount '{input}' out of range")))
}

/// Convert a display-unit float to minor units, rounding half-up.
pub fn to_minor_units(display: f64) -> i64 {
    (display * SCALE as f64).round() as i64
}

/// Convert minor units back to a display-unit float.
pub fn to_display(minor: i64) -> f64 {
    minor as f64 / SCALE as f64
}

/// Render minor units with exactly two decimal digits, truncating the
/// 3rd and 4th stored decimals. Display only; stored precision stays 4.
pub fn to_display_string(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.abs();
    let cents = abs / (SCALE / 100);
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

/// Render minor units with all four decimal digits, for round-tripping.
pub fn to_full_string(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.abs();
    format!("{sign}{}.{:04}", abs / SCALE, abs % SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!(parse_amount("0").unwrap(), 0);
        assert_eq!(parse_amount("12").unwrap(), 120_000);
        assert_eq!(parse_amount("12.3").unwrap(), 123_000);
        assert_eq!(parse_amount("12.34").unwrap(), 123_400);
        assert_eq!(parse_amount("12.3456").unwrap(), 123_456);
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for bad in ["", "abc", "12.", ".5", "12.34567", "1,200", "-5", "1.2.3", "1e3"] {
            let err = parse_amount(bad).unwrap_err();
            assert_eq!(err.code(), "invalid_argument", "accepted {bad:?}");
        }
    }

    #[test]
    fn test_round_trip_preserves_four_decimals() {
        for s in ["0.0001", "1.5", "99.99", "1234.5678", "7.0"] {
            let minor = parse_amount(s).unwrap();
            let back = to_full_string(minor);
            let reparsed = parse_amount(&back).unwrap();
            assert_eq!(minor, reparsed, "round trip drifted for {s}");
        }
    }

    #[test]
    fn test_float_conversion_rounds_to_nearest() {
        assert_eq!(to_minor_units(1.23456), 12_346);
        assert_eq!(to_minor_units(1.23454), 12_345);
        assert_eq!(to_display(123_456), 12.3456);
    }

    #[test]
    fn test_display_string_truncates_to_two_decimals() {
        assert_eq!(to_display_string(123_456), "12.34");
        assert_eq!(to_display_string(123_499), "12.34");
        assert_eq!(to_display_string(500_000), "50.00");
        assert_eq!(to_display_string(-70_000), "-7.00");
    }
}
