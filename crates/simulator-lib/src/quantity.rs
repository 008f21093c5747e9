//! Kubernetes resource quantity parsing
//!
//! Quantities such as `250m`, `1.5`, `512Mi` or `1e3` are converted to
//! integer milli-units, rounding up the way the API machinery's
//! `MilliValue` does.

use crate::error::SourceError;

/// Largest mantissa we accept; quantities are capped far below this by the API server
const MAX_DIGITS: usize = 30;

/// Parse a quantity string into milli-units
pub fn parse_milli(value: &str) -> Result<i64, SourceError> {
    let invalid = |reason: &str| SourceError::InvalidQuantity {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let s = value.trim();
    if s.is_empty() {
        return Err(invalid("empty quantity"));
    }

    let s = s.strip_prefix('+').unwrap_or(s);
    if s.starts_with('-') {
        return Err(invalid("negative quantities are not supported"));
    }

    let number_end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(number_end);

    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid("missing number"));
    }
    if frac_part.contains('.') {
        return Err(invalid("more than one decimal point"));
    }

    let digits = format!("{}{}", int_part, frac_part);
    let digits = digits.trim_start_matches('0');
    if digits.len() > MAX_DIGITS {
        return Err(invalid("too many digits"));
    }
    let mantissa: i128 = if digits.is_empty() {
        0
    } else {
        digits.parse().map_err(|_| invalid("malformed number"))?
    };

    let (exp10, binary_shift) = parse_suffix(suffix).ok_or_else(|| invalid("unknown suffix"))?;

    // milli-units: shift the decimal exponent by 3
    let exp10 = exp10 + 3 - frac_part.len() as i32;
    let numerator = mantissa
        .checked_mul(1i128 << binary_shift)
        .ok_or_else(|| invalid("quantity too large"))?;

    let milli = if exp10 >= 0 {
        10i128
            .checked_pow(exp10 as u32)
            .and_then(|scale| numerator.checked_mul(scale))
            .ok_or_else(|| invalid("quantity too large"))?
    } else {
        match 10i128.checked_pow(exp10.unsigned_abs()) {
            Some(scale) => (numerator + scale - 1) / scale,
            None => i128::from(numerator > 0),
        }
    };

    i64::try_from(milli).map_err(|_| invalid("quantity too large"))
}

/// Returns (decimal exponent, binary shift) for a quantity suffix
fn parse_suffix(suffix: &str) -> Option<(i32, u32)> {
    let parsed = match suffix {
        "" => (0, 0),
        "n" => (-9, 0),
        "u" => (-6, 0),
        "m" => (-3, 0),
        "k" => (3, 0),
        "M" => (6, 0),
        "G" => (9, 0),
        "T" => (12, 0),
        "P" => (15, 0),
        "E" => (18, 0),
        "Ki" => (0, 10),
        "Mi" => (0, 20),
        "Gi" => (0, 30),
        "Ti" => (0, 40),
        "Pi" => (0, 50),
        "Ei" => (0, 60),
        _ => {
            let exponent = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))?;
            let exponent: i32 = exponent.parse().ok()?;
            if exponent.abs() > 40 {
                return None;
            }
            (exponent, 0)
        }
    };
    Some(parsed)
}
