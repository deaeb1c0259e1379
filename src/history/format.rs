//! Literal rendering for history statements
//!
//! Decimals are written as double-quoted canonical strings so the database
//! stores exactly the value the engine computed. Free text is escaped the way
//! a MySQL string literal parser expects.

use std::fmt::Write as _;

use rust_decimal::Decimal;

use super::error::HistoryError;

/// Escaped text must fit a 10 KiB buffer (terminator included)
pub const MAX_ESCAPED_TEXT_LEN: usize = 10 * 1024 - 1;

/// Render a decimal as a quoted literal: `1.500` -> `"1.500"`
///
/// The canonical string keeps the scale, so `Decimal::from_str` on the body
/// yields an identical value, trailing zeros included.
pub fn format_decimal(value: &Decimal) -> String {
    let mut out = String::with_capacity(32);
    push_decimal(&mut out, value);
    out
}

/// Append a quoted decimal literal to `sql`
pub fn push_decimal(sql: &mut String, value: &Decimal) {
    sql.push('"');
    sql.push_str(&value.to_string());
    sql.push('"');
}

/// Append a timestamp in seconds with microsecond precision
///
/// NaN and infinities have no SQL literal and are rejected.
pub fn push_time(sql: &mut String, time: f64) -> Result<(), HistoryError> {
    if !time.is_finite() {
        return Err(HistoryError::InvalidTime(time));
    }
    let _ = write!(sql, "{:.6}", time);
    Ok(())
}

/// Escape `value` and wrap it in double quotes
pub fn escape_text(value: &str) -> Result<String, HistoryError> {
    let mut out = String::with_capacity(value.len() + 2);
    push_text(&mut out, value)?;
    Ok(out)
}

/// Append an escaped, quoted text literal to `sql`
///
/// On `TextTooLong` nothing is written.
pub fn push_text(sql: &mut String, value: &str) -> Result<(), HistoryError> {
    let escaped = escape_body(value);
    if escaped.len() > MAX_ESCAPED_TEXT_LEN {
        return Err(HistoryError::TextTooLong {
            len: escaped.len(),
            max: MAX_ESCAPED_TEXT_LEN,
        });
    }
    sql.push('"');
    sql.push_str(&escaped);
    sql.push('"');
    Ok(())
}

fn escape_body(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            _ => out.push(c),
        }
    }
    out
}
