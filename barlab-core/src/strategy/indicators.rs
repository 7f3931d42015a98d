//! Small indicator helpers over `f64` close/high/low windows.
//!
//! All functions look back over the tail of the slice and return `None`
//! when the window is too short.

/// Simple moving average of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Sample standard deviation of the last `period` values.
pub fn std_dev(values: &[f64], period: usize) -> Option<f64> {
    if period < 2 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
    Some(var.sqrt())
}

/// Donchian channel over the last `period` bars: `(upper, lower)`.
pub fn donchian(highs: &[f64], lows: &[f64], period: usize) -> Option<(f64, f64)> {
    if period == 0 || highs.len() < period || lows.len() < period {
        return None;
    }
    let upper = highs[highs.len() - period..]
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max);
    let lower = lows[lows.len() - period..]
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min);
    Some((upper, lower))
}

/// RSI over simple averages of the last `period` gains and losses.
/// Needs `period + 1` values for the deltas.
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }
    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let tail = &deltas[deltas.len() - period..];
    let avg_gain = tail.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
    let avg_loss = tail.iter().filter(|d| **d < 0.0).map(|d| -d).sum::<f64>() / period as f64;
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Z-score of the last value against the mean/std of the last `period`
/// values. Zero when the window has no dispersion.
pub fn zscore(values: &[f64], period: usize) -> Option<f64> {
    if period < 2 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let std = std_dev(values, period)?;
    if std == 0.0 {
        return Some(0.0);
    }
    Some((window[window.len() - 1] - mean) / std)
}
