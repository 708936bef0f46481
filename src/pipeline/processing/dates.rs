//! Packed transaction-date decoding.
//!
//! Bulk contribution files carry dates as bare digits with no separators, so the
//! month width can only be inferred from the total digit count. Exactly two widths
//! are recognised; anything else decodes to [`FALLBACK_DATE`].

use std::fmt;
use std::ops::Range;

/// Returned for missing, short or otherwise undecodable input
pub const FALLBACK_DATE: PackedDate = PackedDate {
    year: 2024,
    month: 1,
    day: 1,
};

/// A decoded (year, month, day) triple.
///
/// No calendar validation is applied: day 31 of a 30-day month survives decoding
/// and is only rejected later, when the value is parsed as a real date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedDate {
    pub year: u32,
    pub month: u32,
    pub day: u32,
}

impl fmt::Display for PackedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Why a raw value fell back to [`FALLBACK_DATE`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedDate {
    Missing,
    TooShort,
    NotNumeric,
    UnsupportedWidth(usize),
}

impl MalformedDate {
    pub fn as_str(&self) -> &'static str {
        match self {
            MalformedDate::Missing => "missing",
            MalformedDate::TooShort => "too_short",
            MalformedDate::NotNumeric => "not_numeric",
            MalformedDate::UnsupportedWidth(_) => "unsupported_width",
        }
    }
}

/// Where month and day sit inside a packed value of a given digit count.
/// The year is always the trailing four digits.
#[derive(Debug, Clone)]
pub struct DigitRule {
    pub digits: usize,
    pub month: Range<usize>,
    pub day: Range<usize>,
}

/// MDDYYYY and MMDDYYYY
pub static DIGIT_RULES: [DigitRule; 2] = [
    DigitRule {
        digits: 7,
        month: 0..1,
        day: 1..3,
    },
    DigitRule {
        digits: 8,
        month: 0..2,
        day: 2..4,
    },
];

const MIN_RAW_LEN: usize = 7;

fn rule_for(digits: usize) -> Option<&'static DigitRule> {
    DIGIT_RULES.iter().find(|rule| rule.digits == digits)
}

/// Decode a raw packed date, reporting why decoding failed.
pub fn try_normalize_date(raw: Option<&str>) -> Result<PackedDate, MalformedDate> {
    let raw = raw.filter(|s| !s.is_empty()).ok_or(MalformedDate::Missing)?;
    // Length counts surrounding whitespace; the numeric parse ignores it.
    if raw.chars().count() < MIN_RAW_LEN {
        return Err(MalformedDate::TooShort);
    }

    // "1152024.0" -> "1152024"
    let value: f64 = raw.trim().parse().map_err(|_| MalformedDate::NotNumeric)?;
    if !value.is_finite() || value < 0.0 {
        return Err(MalformedDate::NotNumeric);
    }
    let digits = format!("{}", value.trunc() as u64);

    let rule = rule_for(digits.len()).ok_or(MalformedDate::UnsupportedWidth(digits.len()))?;
    let year_start = digits.len() - 4;
    let field = |range: Range<usize>| -> Result<u32, MalformedDate> {
        digits[range].parse().map_err(|_| MalformedDate::NotNumeric)
    };

    Ok(PackedDate {
        year: field(year_start..digits.len())?,
        month: field(rule.month.clone())?,
        day: field(rule.day.clone())?,
    })
}

/// Decode a raw packed date into `YYYY-MM-DD`, falling back to `2024-01-01`.
pub fn normalize_date(raw: Option<&str>) -> String {
    try_normalize_date(raw).unwrap_or(FALLBACK_DATE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eight_digit_dates_use_two_digit_month() {
        assert_eq!(normalize_date(Some("11152024")), "2024-11-15");
        assert_eq!(normalize_date(Some("03012023")), "2023-03-01");
    }

    #[test]
    fn test_seven_digit_dates_pad_single_digit_month() {
        assert_eq!(normalize_date(Some("1152024")), "2024-01-15");
        assert_eq!(normalize_date(Some("9302022")), "2022-09-30");
    }

    #[test]
    fn test_fractional_suffix_is_stripped() {
        assert_eq!(normalize_date(Some("1152024.0")), "2024-01-15");
        assert_eq!(normalize_date(Some("12312023.0")), "2023-12-31");
    }

    #[test]
    fn test_missing_and_short_inputs_fall_back() {
        assert_eq!(normalize_date(None), "2024-01-01");
        assert_eq!(normalize_date(Some("")), "2024-01-01");
        assert_eq!(normalize_date(Some("123")), "2024-01-01");
        assert_eq!(try_normalize_date(Some("123")), Err(MalformedDate::TooShort));
        assert_eq!(try_normalize_date(None), Err(MalformedDate::Missing));
    }

    #[test]
    fn test_length_check_counts_padding() {
        assert_eq!(try_normalize_date(Some("  11524")), Err(MalformedDate::UnsupportedWidth(5)));
        assert_eq!(try_normalize_date(Some(" 12345")), Err(MalformedDate::TooShort));
        assert_eq!(normalize_date(Some(" 1152024 ")), "2024-01-15");
    }

    #[test]
    fn test_unsupported_widths_fall_back() {
        assert_eq!(
            try_normalize_date(Some("123452024")),
            Err(MalformedDate::UnsupportedWidth(9))
        );
        // Long enough as text, but only six digits once the fraction is gone
        assert_eq!(
            try_normalize_date(Some("152024.0")),
            Err(MalformedDate::UnsupportedWidth(6))
        );
        assert_eq!(normalize_date(Some("152024.0")), "2024-01-01");
    }

    #[test]
    fn test_non_numeric_input_falls_back() {
        assert_eq!(try_normalize_date(Some("2024-01-15")), Err(MalformedDate::NotNumeric));
        assert_eq!(try_normalize_date(Some("-1152024")), Err(MalformedDate::NotNumeric));
        assert_eq!(normalize_date(Some("NULL-DATE")), "2024-01-01");
    }

    #[test]
    fn test_no_calendar_validation() {
        assert_eq!(normalize_date(Some("02312024")), "2024-02-31");
    }

    #[test]
    fn test_rule_table_is_keyed_by_digit_count() {
        assert_eq!(rule_for(7).map(|r| r.month.clone()), Some(0..1));
        assert_eq!(rule_for(8).map(|r| r.day.clone()), Some(2..4));
        assert!(rule_for(6).is_none());
    }
}
