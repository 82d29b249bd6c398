// src/gps/fixed.rs
//! Decimal text to scaled integer conversion

use crate::error::DecodeError;

/// Parse an optionally signed decimal string into `value * scale`.
///
/// `scale` is a power of ten. Leading spaces are skipped, surplus fraction
/// digits are truncated, and a string without any digit yields `0`.
///
/// ```
/// use gps_stream::gps::fixed::parse_fixed_point;
///
/// assert_eq!(parse_fixed_point("1234.5678", 1_000_000), 1_234_567_800);
/// assert_eq!(parse_fixed_point("-0.5", 100), -50);
/// assert_eq!(parse_fixed_point("", 1000), 0);
/// ```
pub fn parse_fixed_point(text: &str, scale: i64) -> i64 {
    scan(text, scale).0
}

/// Like [`parse_fixed_point`], but a field without digits is an error.
pub fn try_parse_fixed_point(text: &str, scale: i64, index: usize) -> Result<i64, DecodeError> {
    match scan(text, scale) {
        (value, true) => Ok(value),
        (_, false) => Err(DecodeError::MalformedField { index }),
    }
}

// Returns the scaled value and whether any digit was seen
fn scan(text: &str, scale: i64) -> (i64, bool) {
    let mut bytes = text.as_bytes().iter().copied().skip_while(|&b| b == b' ').peekable();

    let negative = match bytes.peek() {
        Some(b'-') => {
            bytes.next();
            true
        }
        Some(b'+') => {
            bytes.next();
            false
        }
        _ => false,
    };

    let mut result: i64 = 0;
    let mut remaining = scale.max(1);
    let mut seen_digit = false;

    while let Some(d) = bytes.peek().copied().filter(u8::is_ascii_digit) {
        result = push_digit(result, d);
        seen_digit = true;
        bytes.next();
    }

    if bytes.peek() == Some(&b'.') {
        bytes.next();
        while let Some(d) = bytes.peek().copied().filter(u8::is_ascii_digit) {
            seen_digit = true;
            if remaining > 1 {
                result = push_digit(result, d);
                remaining /= 10;
            }
            bytes.next();
        }
    }

    while remaining > 1 {
        result = result.saturating_mul(10);
        remaining /= 10;
    }

    (if negative { -result } else { result }, seen_digit)
}

fn push_digit(acc: i64, digit: u8) -> i64 {
    acc.saturating_mul(10).saturating_add((digit - b'0') as i64)
}
