//! Lag Diagnostics
//!
//! Sample autocorrelation and partial autocorrelation of a sales series, used
//! to choose a lag order before windowing.
//!
//! # Formula
//!
//! ```text
//! r_k = sum_{t=k}^{n-1} (x_t - m)(x_{t-k} - m) / sum_{t=0}^{n-1} (x_t - m)^2
//! ```
//!
//! Partial autocorrelations follow the Durbin-Levinson recursion over `r_k`.

use crate::error::FeatureError;

/// Two-sided 95% normal quantile for the significance band.
const CONFIDENCE_Z: f64 = 1.96;

fn check_input(values: &[f64], max_lag: usize) -> Result<(), FeatureError> {
    if max_lag == 0 {
        return Err(FeatureError::InvalidParameter(
            "max lag must be at least 1".to_string(),
        ));
    }
    if values.len() <= max_lag {
        return Err(FeatureError::InsufficientHistory {
            required: max_lag + 1,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Sample autocorrelation for lags `0..=max_lag`; element 0 is always 1.
///
/// # Errors
/// - [`FeatureError::InvalidParameter`] if `max_lag` is zero
/// - [`FeatureError::InsufficientHistory`] if the series has `max_lag` values or fewer
/// - [`FeatureError::ConstantSeries`] if the series has zero variance
pub fn autocorrelation(values: &[f64], max_lag: usize) -> Result<Vec<f64>, FeatureError> {
    check_input(values, max_lag)?;

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let deviations: Vec<f64> = values.iter().map(|v| v - mean).collect();
    let denominator: f64 = deviations.iter().map(|d| d * d).sum();

    if denominator == 0.0 {
        return Err(FeatureError::ConstantSeries);
    }

    let acf = (0..=max_lag)
        .map(|k| {
            let numerator: f64 = deviations[k..]
                .iter()
                .zip(&deviations[..n - k])
                .map(|(a, b)| a * b)
                .sum();
            numerator / denominator
        })
        .collect();

    Ok(acf)
}

/// Partial autocorrelation for lags `0..=max_lag`; element 0 is always 1.
///
/// # Errors
/// Same conditions as [`autocorrelation`].
pub fn partial_autocorrelation(values: &[f64], max_lag: usize) -> Result<Vec<f64>, FeatureError> {
    let r = autocorrelation(values, max_lag)?;

    let mut pacf = vec![1.0; max_lag + 1];
    let mut phi: Vec<f64> = Vec::with_capacity(max_lag);

    for k in 1..=max_lag {
        let numerator = r[k] - (1..k).map(|j| phi[j - 1] * r[k - j]).sum::<f64>();
        let denominator = 1.0 - (1..k).map(|j| phi[j - 1] * r[j]).sum::<f64>();
        let phi_kk = if denominator.abs() < f64::EPSILON {
            0.0
        } else {
            numerator / denominator
        };

        let previous = phi.clone();
        for j in 1..k {
            phi[j - 1] = previous[j - 1] - phi_kk * previous[k - j - 1];
        }
        phi.push(phi_kk);
        pacf[k] = phi_kk;
    }

    Ok(pacf)
}

/// Lags in `1..=max_lag` whose partial autocorrelation lies outside the
/// `1.96 / sqrt(n)` band, ascending.
///
/// # Errors
/// Same conditions as [`autocorrelation`].
pub fn significant_lags(values: &[f64], max_lag: usize) -> Result<Vec<usize>, FeatureError> {
    let pacf = partial_autocorrelation(values, max_lag)?;
    let band = CONFIDENCE_Z / (values.len() as f64).sqrt();

    let lags = pacf
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, p)| p.abs() > band)
        .map(|(k, _)| k)
        .collect::<Vec<_>>();

    tracing::debug!(n = values.len(), band, ?lags, "significant partial autocorrelations");

    Ok(lags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_acf_linear_trend() {
        let acf = autocorrelation(&[1.0, 2.0, 3.0, 4.0, 5.0], 2).unwrap();
        assert_relative_eq!(acf[0], 1.0);
        assert_relative_eq!(acf[1], 0.4, epsilon = 1e-12);
        assert_relative_eq!(acf[2], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_pacf_durbin_levinson() {
        let pacf = partial_autocorrelation(&[1.0, 2.0, 3.0, 4.0, 5.0], 2).unwrap();
        assert_relative_eq!(pacf[1], 0.4, epsilon = 1e-12);
        assert_relative_eq!(pacf[2], -0.26 / 0.84, epsilon = 1e-12);
    }

    #[test]
    fn test_alternating_series_lag_one_significant() {
        let values: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let acf = autocorrelation(&values, 2).unwrap();
        assert_relative_eq!(acf[1], -39.0 / 40.0, epsilon = 1e-12);

        let lags = significant_lags(&values, 2).unwrap();
        assert_eq!(lags, vec![1]);
    }

    #[test]
    fn test_constant_series() {
        assert_eq!(
            autocorrelation(&[3.0; 10], 2).unwrap_err(),
            FeatureError::ConstantSeries
        );
    }

    #[test]
    fn test_parameter_checks() {
        assert!(matches!(
            autocorrelation(&[1.0, 2.0], 0),
            Err(FeatureError::InvalidParameter(_))
        ));
        assert_eq!(
            partial_autocorrelation(&[1.0, 2.0, 3.0], 3).unwrap_err(),
            FeatureError::InsufficientHistory {
                required: 4,
                actual: 3
            }
        );
    }
}
