//! Fixed-point number helpers shared by the parsers and generators.
//!
//! Coordinates are stored as integers in thousandths of a millimeter. These
//! helpers convert between that representation and decimal text without
//! going through floating point.

/// Number of fractional digits of the internal unit (micrometers per mm).
pub const MICRONS_DIGITS: usize = 3;

/// Formats a micrometer value as millimeters, trimming trailing zeros.
///
/// `1500` becomes `"1.5"`, `-250` becomes `"-0.25"`, `2000` becomes `"2"`.
pub fn coordinate_to_string(coordinate: i64) -> String {
    let magnitude = coordinate.unsigned_abs();
    let whole = magnitude / 1000;
    let fraction = format!("{:03}", magnitude % 1000);
    let fraction = fraction.trim_end_matches('0');

    let sign = if coordinate < 0 { "-" } else { "" };
    if fraction.is_empty() {
        format!("{sign}{whole}")
    } else {
        format!("{sign}{whole}.{fraction}")
    }
}

/// Formats a floating-point setting with three decimals, trailing zeros trimmed.
///
/// Used for machine heights and depths that come from configuration rather
/// than from parsed geometry.
pub fn decimal_to_string(value: f64) -> String {
    let text = format!("{value:.3}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Splits an optional leading `+`/`-` from a numeric token.
///
/// Returns `true` for negative values together with the unsigned remainder.
pub fn split_sign(raw: &str) -> (bool, &str) {
    match (raw.strip_prefix('-'), raw.strip_prefix('+')) {
        (Some(rest), _) => (true, rest),
        (None, Some(rest)) => (false, rest),
        (None, None) => (false, raw),
    }
}

/// Combines an integer part and a fractional part into a fixed-point integer
/// with `digits` fractional digits.
///
/// Extra fractional digits are truncated and missing ones padded with zeros.
/// An empty integer part counts as zero. Returns `None` on non-digit input
/// or overflow.
pub fn scale_decimal(integer: &str, fraction: &str, digits: usize) -> Option<i64> {
    if !is_digits(integer) || !is_digits(fraction) {
        return None;
    }

    let whole = if integer.is_empty() {
        0
    } else {
        integer.parse::<i64>().ok()?
    };

    let mut padded: String = fraction.chars().take(digits).collect();
    while padded.len() < digits {
        padded.push('0');
    }
    let fractional = if padded.is_empty() {
        0
    } else {
        padded.parse::<i64>().ok()?
    };

    let scale = 10_i64.checked_pow(u32::try_from(digits).ok()?)?;
    whole.checked_mul(scale)?.checked_add(fractional)
}

/// Parses signed digits, keeping at most the rightmost `keep` digits.
///
/// Returns `None` for an empty or non-numeric token.
pub fn parse_rightmost_digits(digits: &str, keep: usize) -> Option<i64> {
    if digits.is_empty() || !is_digits(digits) {
        return None;
    }
    let skip = digits.len().saturating_sub(keep);
    digits.get(skip..)?.parse::<i64>().ok()
}

/// Parses a millimeter string such as `"-1.25"` back into micrometers.
///
/// This is the inverse of [`coordinate_to_string`].
pub fn parse_millimeters(text: &str) -> Option<i64> {
    let (negative, unsigned) = split_sign(text.trim());
    if unsigned.is_empty() {
        return None;
    }
    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let value = scale_decimal(integer, fraction, MICRONS_DIGITS)?;
    Some(if negative { -value } else { value })
}

fn is_digits(text: &str) -> bool {
    text.bytes().all(|b| b.is_ascii_digit())
}
