//! Scoring linear action-value functions.
use super::{LinearStatistics, StatisticsError};
use crate::features::Features;
use crate::simulation::Probe;
use ndarray::{Array1, ArrayView1};
use ndarray_stats::DeviationExt;

/// Mean-squared Bellman projected error of the linear value function with weights `weights`.
///
/// With `r = A w + b` this is `rᵀ M⁻¹ r`.
///
/// # Errors
/// [`StatisticsError::DimensionMismatch`] if `weights` does not match the statistics dimension.
pub fn msbpe(weights: ArrayView1<f64>, stats: &LinearStatistics) -> Result<f64, StatisticsError> {
    check_dimension(stats.dimension(), weights.len())?;
    let residual = stats.a.dot(&weights) + &stats.b;
    Ok(residual.dot(&stats.m_inv.dot(&residual)))
}

/// Mean squared error between the linear value estimates and reference values at the probes.
///
/// # Errors
/// [`StatisticsError::DimensionMismatch`] if `weights` does not match the feature dimension or
/// if the number of reference values differs from the number of probes.
/// [`StatisticsError::EmptyDataset`] if there are no probes.
pub fn value_error<S, A, F>(
    weights: ArrayView1<f64>,
    features: &F,
    probes: &[Probe<S, A>],
    reference: &[f64],
) -> Result<f64, StatisticsError>
where
    F: Features<S, A> + ?Sized,
{
    check_dimension(features.dimension(), weights.len())?;
    check_dimension(probes.len(), reference.len())?;
    if probes.is_empty() {
        return Err(StatisticsError::EmptyDataset);
    }
    let estimates: Array1<f64> = probes
        .iter()
        .map(|probe| {
            let phi = features.feature(&probe.state, &probe.action);
            check_dimension(weights.len(), phi.len())?;
            Ok(phi.dot(&weights))
        })
        .collect::<Result<_, StatisticsError>>()?;
    let reference = ArrayView1::from(reference);
    estimates
        .mean_sq_err(&reference)
        .map_err(|_| StatisticsError::DimensionMismatch {
            expected: reference.len(),
            actual: estimates.len(),
        })
}

const fn check_dimension(expected: usize, actual: usize) -> Result<(), StatisticsError> {
    if expected == actual {
        Ok(())
    } else {
        Err(StatisticsError::DimensionMismatch { expected, actual })
    }
}
