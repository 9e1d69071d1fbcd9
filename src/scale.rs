// Axis domain computation

/// Min/max over finite values, or `None` when there are none.
pub fn min_max<I>(values: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = f64>,
{
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.into_iter().filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min <= max {
        Some((min, max))
    } else {
        None
    }
}

/// Pad a range by 5% on each side; widen degenerate ranges by one unit.
pub fn pad_range(min: f64, max: f64) -> (f64, f64) {
    if min == max {
        (min - 1.0, max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding, max + padding)
    }
}

/// Padded continuous domain, falling back to (0, 1) without data.
pub fn continuous_domain<I>(values: I) -> (f64, f64)
where
    I: IntoIterator<Item = f64>,
{
    match min_max(values) {
        Some((min, max)) => pad_range(min, max),
        None => (0.0, 1.0),
    }
}

/// Domain for bar-like marks: always includes zero, padded at the far end.
pub fn zero_based_domain<I>(values: I) -> (f64, f64)
where
    I: IntoIterator<Item = f64>,
{
    let (min, max) = min_max(values).unwrap_or((0.0, 1.0));
    let min = min.min(0.0);
    let max = max.max(0.0);
    if min == max {
        return (0.0, 1.0);
    }
    let padding = (max - min) * 0.05;
    (
        if min < 0.0 { min - padding } else { 0.0 },
        if max > 0.0 { max + padding } else { 0.0 },
    )
}

/// Map `v` from `domain` to [0, 1]; constant domains map to 0.5.
pub fn normalize(v: f64, domain: (f64, f64)) -> f64 {
    let (lo, hi) = domain;
    if hi == lo {
        0.5
    } else {
        (v - lo) / (hi - lo)
    }
}
