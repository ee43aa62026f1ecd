//! Integer conversion of Kubernetes resource quantities
//!
//! Accepts the canonical quantity forms: a decimal number with an optional
//! fraction, followed by a binary suffix (`Ki` .. `Ei`), a decimal suffix
//! (`n` .. `E`) or a decimal exponent (`e3`, `E-2`). A quantity converts only
//! when its value is an exact integer that fits in `i64`.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Scale of a quantity suffix: `base ^ exponent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scale {
    Binary(u32),
    Decimal(i32),
}

fn parse_suffix(suffix: &str) -> Option<Scale> {
    let scale = match suffix {
        "" => Scale::Decimal(0),
        "n" => Scale::Decimal(-9),
        "u" => Scale::Decimal(-6),
        "m" => Scale::Decimal(-3),
        "k" => Scale::Decimal(3),
        "M" => Scale::Decimal(6),
        "G" => Scale::Decimal(9),
        "T" => Scale::Decimal(12),
        "P" => Scale::Decimal(15),
        "E" => Scale::Decimal(18),
        "Ki" => Scale::Binary(10),
        "Mi" => Scale::Binary(20),
        "Gi" => Scale::Binary(30),
        "Ti" => Scale::Binary(40),
        "Pi" => Scale::Binary(50),
        "Ei" => Scale::Binary(60),
        _ => {
            let exponent = suffix.strip_prefix(['e', 'E'])?;
            Scale::Decimal(exponent.parse().ok()?)
        }
    };
    Some(scale)
}

fn pow10(exponent: i32) -> Option<i128> {
    10i128.checked_pow(exponent.unsigned_abs())
}

/// Convert a quantity to an integer, `None` when it is malformed, fractional
/// or out of range
pub fn quantity_as_i64(quantity: &Quantity) -> Option<i64> {
    let value = quantity.0.trim();
    let (negative, value) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };

    let number_end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, suffix) = value.split_at(number_end);

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return None;
    }

    let digits = format!("{whole}{fraction}");
    // 30 decimal digits always fit in i128
    if digits.len() > 30 {
        return None;
    }
    let mantissa: i128 = digits.parse().ok()?;
    let fraction_digits = i32::try_from(fraction.len()).ok()?;

    let (numerator, denominator) = match parse_suffix(suffix)? {
        Scale::Binary(bits) => (
            mantissa.checked_mul(1i128.checked_shl(bits)?)?,
            pow10(fraction_digits)?,
        ),
        Scale::Decimal(exponent) => {
            let shift = exponent.checked_sub(fraction_digits)?;
            if shift >= 0 {
                (mantissa.checked_mul(pow10(shift)?)?, 1)
            } else {
                (mantissa, pow10(shift)?)
            }
        }
    };

    if numerator % denominator != 0 {
        return None;
    }
    let value = numerator / denominator;
    i64::try_from(if negative { -value } else { value }).ok()
}
