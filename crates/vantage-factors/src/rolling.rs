//! Rolling-window kernels over nullable series.
//!
//! A window containing any missing value yields `None`: every statistic
//! requires its full window of observations.

/// Apply `f` to every full window of `window` consecutive values.
pub fn rolling<F>(values: &[Option<f64>], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }
    let mut buf = Vec::with_capacity(window);
    for end in window..=values.len() {
        buf.clear();
        let complete = values[end - window..end].iter().all(|v| match v {
            Some(x) => {
                buf.push(*x);
                true
            }
            None => false,
        });
        if complete {
            out[end - 1] = f(&buf);
        }
    }
    out
}

/// Rolling arithmetic mean.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| Some(w.iter().sum::<f64>() / w.len() as f64))
}

/// Rolling sum.
pub fn rolling_sum(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| Some(w.iter().sum()))
}

/// Rolling sample standard deviation (N-1).
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, sample_std)
}

/// Rolling bias-corrected sample skewness.
pub fn rolling_skew(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, skewness)
}

/// Rolling bias-corrected excess kurtosis.
pub fn rolling_kurt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, excess_kurtosis)
}

fn central_sums(w: &[f64]) -> (f64, f64, f64, f64) {
    let n = w.len() as f64;
    let m = w.iter().sum::<f64>() / n;
    w.iter().fold((0.0, 0.0, 0.0, 0.0), |(s2, s3, s4, _), x| {
        let d = x - m;
        (s2 + d * d, s3 + d * d * d, s4 + d * d * d * d, m)
    })
}

fn sample_std(w: &[f64]) -> Option<f64> {
    if w.len() < 2 {
        return None;
    }
    let (s2, ..) = central_sums(w);
    Some((s2 / (w.len() - 1) as f64).sqrt())
}

fn skewness(w: &[f64]) -> Option<f64> {
    let n = w.len() as f64;
    if n < 3.0 {
        return None;
    }
    let (s2, s3, ..) = central_sums(w);
    let m2 = s2 / n;
    if m2 <= 1e-14 {
        return None;
    }
    let g1 = (s3 / n) / m2.powf(1.5);
    Some((n * (n - 1.0)).sqrt() / (n - 2.0) * g1)
}

fn excess_kurtosis(w: &[f64]) -> Option<f64> {
    let n = w.len() as f64;
    if n < 4.0 {
        return None;
    }
    let (s2, _, s4, _) = central_sums(w);
    if s2 <= 1e-14 {
        return None;
    }
    let lead = (n + 1.0) * n * (n - 1.0) / ((n - 2.0) * (n - 3.0)) * s4 / (s2 * s2);
    let adj = 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));
    Some(lead - adj)
}

/// `values[t] / values[t - periods] - 1`.
pub fn pct_change(values: &[f64], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| {
            let prev = values[t.checked_sub(periods)?];
            (prev != 0.0).then(|| values[t] / prev - 1.0)
        })
        .collect()
}

/// Shift a series backwards: `out[t] = values[t + periods]`.
pub fn lead(values: &[Option<f64>], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| values.get(t + periods).copied().flatten())
        .collect()
}

/// Recursive exponential mean with smoothing `alpha`, seeded with the first
/// value, reported once `min_periods` values have been seen.
pub fn ewm_mean(values: &[f64], alpha: f64, min_periods: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut state: Option<f64> = None;
    for (i, &x) in values.iter().enumerate() {
        let next = match state {
            None => x,
            Some(prev) => (1.0 - alpha) * prev + alpha * x,
        };
        state = Some(next);
        out.push((i + 1 >= min_periods).then_some(next));
    }
    out
}

/// Element-wise combination of two nullable series.
pub fn zip_with<F>(a: &[Option<f64>], b: &[Option<f64>], f: F) -> Vec<Option<f64>>
where
    F: Fn(f64, f64) -> Option<f64>,
{
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => f(*x, *y),
            _ => None,
        })
        .collect()
}
