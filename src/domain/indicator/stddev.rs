//! Return volatility.
//!
//! Sample standard deviation of bar-to-bar percentage returns:
//! R[i] = (C[i] - C[i-1]) / C[i-1]
//! VOL = sqrt(sum((R - mean(R))^2) / (n - 1)) over the last n returns.
//! Undefined until two returns are available.

/// Sample standard deviation (n - 1 denominator).
pub fn sample_stddev<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let values: Vec<f64> = values.into_iter().collect();
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1) as f64;
    Some(variance.sqrt())
}

pub fn pct_return(prev_close: f64, close: f64) -> Option<f64> {
    if prev_close == 0.0 {
        None
    } else {
        Some((close - prev_close) / prev_close)
    }
}
