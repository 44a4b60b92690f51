//! String helpers shared by the row splitter and the bundled rules
//!
//! All helpers borrow from their input; none of them allocate.

/// Trim surrounding whitespace only when the first or last character is
/// whitespace, returning the input untouched otherwise.
pub fn trim_if_needed(s: &str) -> &str {
    let starts = s.chars().next().is_some_and(char::is_whitespace);
    let ends = s.chars().next_back().is_some_and(char::is_whitespace);
    if starts || ends {
        s.trim()
    } else {
        s
    }
}

/// Drop a trailing `.0` so integral values exported as floats parse as integers
pub fn trim_trailing_decimal(s: &str) -> &str {
    match s.strip_suffix(".0") {
        Some(head) if !head.is_empty() => head,
        _ => s,
    }
}

/// Parse an integer that may have been written as `N.0`
pub fn formatted_string_to_int(s: &str) -> Result<i64, std::num::ParseIntError> {
    trim_trailing_decimal(s).parse()
}
