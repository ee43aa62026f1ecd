//! Distribution of pool-wide bounds over the zones of a pool
//!
//! The first `total % zones` zones receive one extra machine. Percentages are
//! resolved against their base before distribution and rounded up, the same
//! way the Kubernetes deployment controller resolves `maxSurge` and
//! `maxUnavailable`.

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::error::ControllerError;

/// Share of `total` assigned to the zone at `zone_index` (zero based)
///
/// `zones` must be at least one; a pool without zones never reaches this.
pub fn distribute_over_zones(zone_index: i32, total: i32, zones: i32) -> i32 {
    debug_assert!(zones >= 1, "a pool spans at least one zone");
    if zones < 1 {
        return 0;
    }
    let share = total / zones;
    if zone_index < total % zones {
        share + 1
    } else {
        share
    }
}

/// Share of an absolute or percentage value assigned to the zone at
/// `zone_index`
///
/// Percentages are taken of `base` (the pool maximum for surge, the pool
/// minimum for unavailability) and rounded up.
pub fn distribute_int_or_percent(
    zone_index: i32,
    value: &IntOrString,
    zones: i32,
    base: i32,
) -> Result<i32, ControllerError> {
    let total = match value {
        IntOrString::Int(total) => non_negative("absolute value", *total)?,
        IntOrString::String(percent) => scaled_percentage(percent, base)?,
    };
    Ok(distribute_over_zones(zone_index, total, zones))
}

/// `value` unless it is negative
pub fn non_negative(field: &str, value: i32) -> Result<i32, ControllerError> {
    if value < 0 {
        return Err(ControllerError::InvalidValue(format!("{field} must not be negative, got {value}")));
    }
    Ok(value)
}

fn scaled_percentage(value: &str, base: i32) -> Result<i32, ControllerError> {
    let percent: i64 = value
        .strip_suffix('%')
        .and_then(|p| p.parse().ok())
        .filter(|p| *p >= 0)
        .ok_or_else(|| ControllerError::InvalidValue(format!("invalid percentage {value:?}")))?;

    let product = percent
        .checked_mul(i64::from(base))
        .ok_or_else(|| ControllerError::InvalidValue(format!("{value} of {base} is out of range")))?;
    let resolved = product.div_euclid(100) + i64::from(product.rem_euclid(100) != 0);

    i32::try_from(resolved)
        .map_err(|e| ControllerError::InvalidValue(format!("{value} of {base} is out of range: {e}")))
}
