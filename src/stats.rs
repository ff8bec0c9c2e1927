//! Summary statistics over score histories.

/// Arithmetic mean, `NaN` for an empty sample.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation, `NaN` for an empty sample.
pub fn std_dev(data: &[f64]) -> f64 {
    let mean = mean(data);
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// Percentile using rank `percent / 100 * n`.
///
/// A whole rank picks that element of the sorted sample, a fractional rank averages the two
/// neighbours. Ranks below one fall back to the smallest value.
pub fn percentile(data: &[f64], percent: f64) -> f64 {
    match data.len() {
        0 => return f64::NAN,
        1 => return data[0],
        _ => {}
    }

    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);

    let percent = percent.clamp(0.0, 100.0);
    let index = percent / 100.0 * sorted.len() as f64;
    let whole = index as usize;

    if index < 1.0 {
        sorted[0]
    } else if index == whole as f64 {
        sorted[whole - 1]
    } else {
        (sorted[whole - 1] + sorted[whole]) / 2.0
    }
}
