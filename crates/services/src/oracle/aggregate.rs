// Path: crates/services/src/oracle/aggregate.rs
//! The fixed set of batch aggregation functions.
//!
//! Values arrive from JSON, so NaN and the infinities cannot occur.

/// Whether `name` refers to a supported aggregation function.
pub(crate) fn is_supported(name: &str) -> bool {
    matches!(name, "max" | "min" | "avg")
}

/// Applies the named function, or `None` for unknown names or empty input.
pub(crate) fn apply(name: &str, values: &[f64]) -> Option<f64> {
    let (&first, rest) = values.split_first()?;
    match name {
        "max" => Some(rest.iter().copied().fold(first, f64::max)),
        "min" => Some(rest.iter().copied().fold(first, f64::min)),
        "avg" => Some(values.iter().sum::<f64>() / values.len() as f64),
        _ => None,
    }
}
